use actix_web::{middleware::Logger, web, App, HttpServer};
use clap::{Arg, Command};
use clarify_llm_sdk::AnthropicClient;
use clarify_server::config::AppConfig;
use clarify_server::error::{AppError, AppResult};
use clarify_server::generator::QuestionGenerator;
use clarify_server::handlers::AppState;
use clarify_server::mcp;
use clarify_server::middleware::ApiKeyAuth;
use clarify_server::routes::configure_routes;
use clarify_server::store::SessionStore;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[actix_web::main]
async fn main() -> AppResult<()> {
    let matches = Command::new("clarify-server")
        .version(env!("CARGO_PKG_VERSION"))
        .about("clarify - AI clarifying-question server (MCP + HTTP/SSE)")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .help("Path to configuration file")
                .value_name("FILE"),
        )
        .arg(
            Arg::new("transport")
                .help("Transport to serve: stdio (MCP) or http")
                .value_name("TRANSPORT")
                .default_value("stdio"),
        )
        .get_matches();

    let transport = matches
        .get_one::<String>("transport")
        .map(String::as_str)
        .unwrap_or("stdio");

    // The stdio transport owns stdout for protocol framing; logs go to stderr.
    init_tracing(transport == "stdio");

    let config = match matches.get_one::<String>("config") {
        Some(path) => AppConfig::load_from_file(Path::new(path))?,
        None => AppConfig::load()?,
    };
    tracing::info!("Configuration loaded");

    // Checked once at launch; running without a provider credential would
    // silently serve nothing but fallback questions.
    let provider_key = config.anthropic_api_key().ok_or_else(|| {
        AppError::Startup(
            "no Anthropic API key configured; set ANTHROPIC_API_KEY or [api_keys] anthropic_api_key"
                .to_string(),
        )
    })?;

    let client = AnthropicClient::new(provider_key, config.llm.model.clone())?;
    let generator = Arc::new(QuestionGenerator::new(Arc::new(client), config.llm.clone()));

    let store = Arc::new(SessionStore::load(
        &config.storage.sessions_dir,
        Duration::from_secs(config.sessions.timeout_secs),
    )?);
    store.start_sweep(Duration::from_secs(config.sessions.sweep_interval_secs));

    match transport {
        "http" => run_http(config, Arc::clone(&store), generator).await?,
        "stdio" => mcp::serve_stdio(Arc::clone(&store), generator).await?,
        other => {
            store.shutdown();
            return Err(AppError::Startup(format!(
                "unknown transport '{other}' (expected 'stdio' or 'http')"
            )));
        }
    }

    store.shutdown();
    Ok(())
}

fn init_tracing(to_stderr: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("clarify_server=info,clarify_llm_sdk=info"));
    if to_stderr {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry().with(fmt::layer()).with(filter).init();
    }
}

async fn run_http(
    config: AppConfig,
    store: Arc<SessionStore>,
    generator: Arc<QuestionGenerator>,
) -> AppResult<()> {
    let app_state = web::Data::new(AppState {
        store,
        generator,
        config: Arc::new(config.clone()),
        start_time: SystemTime::now(),
    });
    let mcp_sessions = web::Data::new(mcp::http::McpSessionManager::new());

    let server_addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("Starting HTTP server on {}", server_addr);

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .app_data(mcp_sessions.clone())
            .wrap(Logger::default())
            .wrap(ApiKeyAuth)
            .configure(configure_routes)
    })
    .bind(&server_addr)?
    .run()
    .await?;

    Ok(())
}
