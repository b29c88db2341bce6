use config::{Config, ConfigError, File};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    pub auth: Option<AuthConfig>,
    pub api_keys: Option<ApiKeysConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StorageConfig {
    pub sessions_dir: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SessionsConfig {
    /// Idle time before a session is evicted
    pub timeout_secs: u64,
    /// How often the eviction sweep runs
    pub sweep_interval_secs: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 3600,
            sweep_interval_secs: 60,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LlmConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-5-20250929".to_string(),
            max_tokens: 2000,
            temperature: 0.3,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AuthConfig {
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ApiKeysConfig {
    pub anthropic_api_key: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            storage: StorageConfig {
                sessions_dir: default_sessions_dir(),
            },
            sessions: SessionsConfig::default(),
            llm: LlmConfig::default(),
            auth: None,
            api_keys: None,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = get_config_path();

        // Create config directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigError::Message(format!("Failed to create config directory: {e}"))
            })?;
        }

        // Create default config file if it doesn't exist
        if !config_path.exists() {
            let default_config = r#"
[server]
host = "127.0.0.1"
port = 3000

[storage]
sessions_dir = "~/.local/share/clarify/sessions"

[sessions]
# Idle timeout before a session is evicted, and how often the sweep runs.
timeout_secs = 3600
sweep_interval_secs = 60

[llm]
model = "claude-sonnet-4-5-20250929"
max_tokens = 2000
temperature = 0.3

[auth]
# Bearer token required on every route except /health.
# Generated automatically on first start when missing.
# api_key = "change-this-to-a-secure-random-string"

[api_keys]
# Falls back to the ANTHROPIC_API_KEY environment variable.
# anthropic_api_key = "your-anthropic-key"
"#;
            std::fs::write(&config_path, default_config).map_err(|e| {
                ConfigError::Message(format!("Failed to write default config: {e}"))
            })?;
        }

        let builder = Config::builder()
            .add_source(File::from(config_path.clone()))
            .build()?;

        let mut config: AppConfig = builder.try_deserialize()?;
        expand_sessions_dir(&mut config);

        // Generate and persist a bearer key when none is configured, so a
        // fresh install is authenticated out of the box.
        let api_key_missing = config
            .auth
            .as_ref()
            .and_then(|a| a.api_key.as_ref())
            .is_none();

        if api_key_missing {
            let new_key = generate_api_key();
            tracing::info!("Generated new API key for bearer authentication");

            if let Some(ref mut auth) = config.auth {
                auth.api_key = Some(new_key.clone());
            } else {
                config.auth = Some(AuthConfig {
                    api_key: Some(new_key.clone()),
                });
            }

            if let Err(e) = update_config_file_with_api_key(&config_path, &new_key) {
                tracing::warn!("Failed to save API key to config file: {e}");
                tracing::warn!("The API key will be regenerated on next restart");
            }
        }

        apply_env_overrides(&mut config);
        Ok(config)
    }

    pub fn load_from_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::Message(format!(
                "Configuration file not found: {}",
                config_path.display()
            )));
        }

        let builder = Config::builder()
            .add_source(File::from(config_path.to_path_buf()))
            .build()?;

        let mut config: AppConfig = builder.try_deserialize()?;
        expand_sessions_dir(&mut config);
        apply_env_overrides(&mut config);

        Ok(config)
    }

    /// Provider credential: environment first, then config file.
    pub fn anthropic_api_key(&self) -> Option<String> {
        std::env::var("ANTHROPIC_API_KEY")
            .ok()
            .filter(|key| !key.is_empty())
            .or_else(|| {
                self.api_keys
                    .as_ref()
                    .and_then(|keys| keys.anthropic_api_key.clone())
            })
    }

    /// Bearer token required by the HTTP surface. None disables auth.
    pub fn bearer_key(&self) -> Option<String> {
        self.auth.as_ref().and_then(|a| a.api_key.clone())
    }
}

fn apply_env_overrides(config: &mut AppConfig) {
    if let Ok(key) = std::env::var("CLARIFY_API_KEY") {
        if !key.is_empty() {
            config.auth = Some(AuthConfig { api_key: Some(key) });
        }
    }
}

fn expand_sessions_dir(config: &mut AppConfig) {
    if config.storage.sessions_dir.starts_with("~") {
        if let Some(home) = home::home_dir() {
            let path_str = config.storage.sessions_dir.to_string_lossy();
            let expanded = path_str.replacen('~', &home.to_string_lossy(), 1);
            config.storage.sessions_dir = PathBuf::from(expanded);
        }
    }
}

fn get_config_path() -> PathBuf {
    if let Some(home) = home::home_dir() {
        home.join(".config/clarify/server.toml")
    } else {
        PathBuf::from("server.toml")
    }
}

fn default_sessions_dir() -> PathBuf {
    if let Some(home) = home::home_dir() {
        home.join(".local/share/clarify/sessions")
    } else {
        PathBuf::from("sessions")
    }
}

/// Generates a random bearer key, equivalent to `openssl rand -base64 32`
fn generate_api_key() -> String {
    let mut rng = rand::rng();
    let random_bytes: Vec<u8> = (0..32).map(|_| rng.random()).collect();
    base64::Engine::encode(&base64::engine::general_purpose::STANDARD, &random_bytes)
}

/// Updates the config file with a newly generated API key
fn update_config_file_with_api_key(
    config_path: &Path,
    api_key: &str,
) -> Result<(), std::io::Error> {
    let content = std::fs::read_to_string(config_path)?;
    let mut lines: Vec<String> = content.lines().map(|s| s.to_string()).collect();

    let mut in_auth_section = false;
    let mut key_updated = false;

    for i in 0..lines.len() {
        let line = lines[i].trim();

        if line == "[auth]" {
            in_auth_section = true;
            continue;
        }

        // Next section begins: insert before it if we never found the key line
        if in_auth_section && line.starts_with('[') && line.ends_with(']') {
            if !key_updated {
                lines.insert(i, format!("api_key = \"{}\"", api_key));
                key_updated = true;
            }
            break;
        }

        if in_auth_section && (line.starts_with("api_key") || line.starts_with("# api_key")) {
            lines[i] = format!("api_key = \"{}\"", api_key);
            key_updated = true;
            break;
        }
    }

    if in_auth_section && !key_updated {
        lines.push(format!("api_key = \"{}\"", api_key));
    }

    let updated_content = lines.join("\n") + "\n";
    std::fs::write(config_path, updated_content)?;

    Ok(())
}
