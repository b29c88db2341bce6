//! Session ownership: lifecycle, persistence, and expiry.
//!
//! One store instance is constructed at startup, loads every persisted
//! session from disk, and owns the background sweep task. All mutation goes
//! through it; each mutating call rewrites the session's file (whole-file
//! overwrite). Persistence failures are logged and swallowed so the
//! in-memory state stays authoritative for the life of the process.

use crate::error::{AppError, AppResult};
use chrono::Utc;
use clarify_types::{Question, Session, TaskContext};
use rand::Rng;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::task::JoinHandle;

pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    sessions_dir: PathBuf,
    timeout: chrono::Duration,
    sweep_handle: Mutex<Option<JoinHandle<()>>>,
}

impl SessionStore {
    /// Load every persisted session from `sessions_dir`, creating the
    /// directory if needed. Unreadable files are skipped with a warning.
    pub fn load(sessions_dir: &Path, timeout: Duration) -> AppResult<Self> {
        std::fs::create_dir_all(sessions_dir)?;

        let mut sessions = HashMap::new();
        for entry in std::fs::read_dir(sessions_dir)? {
            let path = entry?.path();
            if path.extension().map(|ext| ext == "json") != Some(true) {
                continue;
            }
            let session = match std::fs::read_to_string(&path) {
                Ok(raw) => match serde_json::from_str::<Session>(&raw) {
                    Ok(session) => session,
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "skipping unreadable session file");
                        continue;
                    }
                },
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable session file");
                    continue;
                }
            };
            sessions.insert(session.id.clone(), session);
        }

        tracing::info!(
            count = sessions.len(),
            dir = %sessions_dir.display(),
            "session store loaded"
        );

        Ok(Self {
            sessions: RwLock::new(sessions),
            sessions_dir: sessions_dir.to_path_buf(),
            timeout: chrono::Duration::from_std(timeout)
                .unwrap_or_else(|_| chrono::Duration::hours(1)),
            sweep_handle: Mutex::new(None),
        })
    }

    fn read_lock(&self) -> AppResult<RwLockReadGuard<'_, HashMap<String, Session>>> {
        self.sessions
            .read()
            .map_err(|e| AppError::Internal(format!("session lock poisoned: {e}")))
    }

    fn write_lock(&self) -> AppResult<RwLockWriteGuard<'_, HashMap<String, Session>>> {
        self.sessions
            .write()
            .map_err(|e| AppError::Internal(format!("session lock poisoned: {e}")))
    }

    fn session_path(&self, id: &str) -> PathBuf {
        self.sessions_dir.join(format!("{id}.json"))
    }

    fn new_session_id() -> String {
        const CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
        let mut rng = rand::rng();
        let suffix: String = (0..8)
            .map(|_| CHARS[rng.random_range(0..CHARS.len())] as char)
            .collect();
        format!("sess_{}_{}", Utc::now().timestamp_millis(), suffix)
    }

    /// Persist one session; write failures are logged and swallowed.
    async fn persist(&self, session: &Session) {
        let path = self.session_path(&session.id);
        match serde_json::to_vec_pretty(session) {
            Ok(bytes) => {
                if let Err(e) = tokio::fs::write(&path, bytes).await {
                    tracing::warn!(session_id = %session.id, error = %e, "failed to persist session");
                }
            }
            Err(e) => {
                tracing::warn!(session_id = %session.id, error = %e, "failed to serialize session");
            }
        }
    }

    /// Create a session around a freshly generated question list. The
    /// session is persisted before it is returned, so it is queryable and
    /// durable the moment the caller sees it.
    pub async fn create_session(
        &self,
        task_description: &str,
        questions: Vec<Question>,
    ) -> AppResult<Session> {
        let now = Utc::now();
        let session = Session {
            id: Self::new_session_id(),
            task_description: task_description.to_string(),
            questions,
            responses: HashMap::new(),
            created_at: now,
            updated_at: now,
        };

        {
            let mut sessions = self.write_lock()?;
            sessions.insert(session.id.clone(), session.clone());
        }
        self.persist(&session).await;
        Ok(session)
    }

    pub fn get_session(&self, id: &str) -> AppResult<Option<Session>> {
        Ok(self.read_lock()?.get(id).cloned())
    }

    /// Record an answer. Returns the updated session, or None when either
    /// the session or the question id is unknown; the unknown-question path
    /// leaves the session untouched.
    pub async fn add_response(
        &self,
        id: &str,
        question_id: &str,
        answer: &str,
    ) -> AppResult<Option<Session>> {
        let updated = {
            let mut sessions = self.write_lock()?;
            let Some(session) = sessions.get_mut(id) else {
                return Ok(None);
            };
            if !session.has_question(question_id) {
                return Ok(None);
            }
            session
                .responses
                .insert(question_id.to_string(), answer.to_string());
            // monotonic even if the wall clock steps backwards
            session.updated_at = Utc::now().max(session.updated_at);
            session.clone()
        };
        self.persist(&updated).await;
        Ok(Some(updated))
    }

    pub fn get_task_context(&self, id: &str) -> AppResult<Option<TaskContext>> {
        Ok(self.read_lock()?.get(id).map(TaskContext::from_session))
    }

    pub fn get_all_sessions(&self) -> AppResult<Vec<TaskContext>> {
        Ok(self
            .read_lock()?
            .values()
            .map(TaskContext::from_session)
            .collect())
    }

    /// Evict every session idle past the timeout and delete its file. File
    /// deletion failures are swallowed; expiry must never take the process
    /// down.
    pub async fn sweep_expired(&self) {
        let cutoff = Utc::now() - self.timeout;
        let expired: Vec<String> = match self.read_lock() {
            Ok(sessions) => sessions
                .values()
                .filter(|s| s.updated_at < cutoff)
                .map(|s| s.id.clone())
                .collect(),
            Err(e) => {
                tracing::warn!(error = %e, "expiry sweep skipped");
                return;
            }
        };
        if expired.is_empty() {
            return;
        }

        if let Ok(mut sessions) = self.write_lock() {
            for id in &expired {
                sessions.remove(id);
            }
        }
        for id in &expired {
            tracing::info!(session_id = %id, "evicting expired session");
            if let Err(e) = tokio::fs::remove_file(self.session_path(id)).await {
                tracing::warn!(session_id = %id, error = %e, "failed to delete session file");
            }
        }
    }

    /// Start the recurring expiry sweep. The handle is owned by the store
    /// and cancelled by `shutdown`.
    pub fn start_sweep(self: &Arc<Self>, interval: Duration) {
        let store = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                store.sweep_expired().await;
            }
        });
        if let Ok(mut slot) = self.sweep_handle.lock() {
            if let Some(previous) = slot.replace(handle) {
                previous.abort();
            }
        }
    }

    /// Stop the background sweep task.
    pub fn shutdown(&self) {
        if let Ok(mut slot) = self.sweep_handle.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
    }
}
