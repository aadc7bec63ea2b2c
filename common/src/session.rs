//! The session abstraction shared by `terminal-service` and `file-service`.
//!
//! A session pins a client to a working directory and a set of environment
//! variables on the host. Both services wrap the same [`SessionCore`] in a
//! service-specific type (`TerminalSession` owns background processes,
//! `FileSession` owns nothing extra) that implements [`SessionOwner`], and
//! share one [`SessionRegistry`] implementation for creation, lookup with
//! sliding expiry, deletion, and the periodic expiry sweep.
//!
//! Lock ordering: registry lock, then a session's own lock, then (in
//! `terminal-service`) a process's output-buffer lock. Never the reverse —
//! see the component design notes for the deadlock this avoids.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

const ACTIVITY_LOG_CAPACITY: usize = 100;
const SESSION_TTL_HOURS: i64 = 24;

/// Fields common to every session, regardless of which service owns it.
pub struct SessionCore {
    pub id: String,
    pub created_at: DateTime<Utc>,
    last_active: Mutex<DateTime<Utc>>,
    expires_at: Mutex<DateTime<Utc>>,
    working_dir: Mutex<Option<PathBuf>>,
    env_vars: Mutex<HashMap<String, String>>,
    activity_log: Mutex<VecDeque<String>>,
}

impl SessionCore {
    fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            last_active: Mutex::new(now),
            expires_at: Mutex::new(now + chrono::Duration::hours(SESSION_TTL_HOURS)),
            working_dir: Mutex::new(None),
            env_vars: Mutex::new(HashMap::new()),
            activity_log: Mutex::new(VecDeque::with_capacity(ACTIVITY_LOG_CAPACITY)),
        }
    }

    /// Slide `last_active`/`expires_at` forward. Called on every access via
    /// the session, not just explicit API calls.
    pub async fn touch(&self) {
        let now = Utc::now();
        *self.last_active.lock().await = now;
        *self.expires_at.lock().await = now + chrono::Duration::hours(SESSION_TTL_HOURS);
    }

    pub async fn is_expired(&self) -> bool {
        Utc::now() > *self.expires_at.lock().await
    }

    pub async fn working_dir(&self) -> Option<PathBuf> {
        self.working_dir.lock().await.clone()
    }

    pub async fn set_working_dir(&self, path: PathBuf) {
        *self.working_dir.lock().await = Some(path);
    }

    pub async fn env_snapshot(&self) -> HashMap<String, String> {
        self.env_vars.lock().await.clone()
    }

    pub async fn env_get(&self, key: &str) -> Option<String> {
        self.env_vars.lock().await.get(key).cloned()
    }

    pub async fn env_set(&self, key: String, value: String) {
        self.env_vars.lock().await.insert(key, value);
    }

    pub async fn env_set_batch(&self, vars: HashMap<String, String>) {
        self.env_vars.lock().await.extend(vars);
    }

    pub async fn env_unset(&self, key: &str) {
        self.env_vars.lock().await.remove(key);
    }

    /// Append a timestamped line to the per-session activity log, evicting
    /// the oldest entry once full. Never call this while holding the
    /// registry lock.
    pub async fn log_activity(&self, line: impl Into<String>) {
        let mut log = self.activity_log.lock().await;
        if log.len() >= ACTIVITY_LOG_CAPACITY {
            log.pop_front();
        }
        log.push_back(format!("{} {}", Utc::now().to_rfc3339(), line.into()));
    }

    pub async fn activity_log(&self) -> Vec<String> {
        self.activity_log.lock().await.iter().cloned().collect()
    }

    pub async fn to_view(&self) -> SessionView {
        SessionView {
            id: self.id.clone(),
            created_at: self.created_at.to_rfc3339(),
            last_active: self.last_active.lock().await.to_rfc3339(),
            expires_at: self.expires_at.lock().await.to_rfc3339(),
            working_dir: self.working_dir().await.map(|p| p.to_string_lossy().into_owned()),
            is_active: true,
            env_vars: self.env_snapshot().await,
        }
    }
}

/// The public JSON shape of a session (§6 `Session`).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub id: String,
    pub created_at: String,
    pub last_active: String,
    pub expires_at: String,
    pub working_dir: Option<String>,
    pub is_active: bool,
    pub env_vars: HashMap<String, String>,
}

/// Per-service extension point. `terminal-service`'s impl force-kills owned
/// background processes on `terminate`; `file-service`'s impl is a no-op.
#[async_trait::async_trait]
pub trait SessionOwner: Send + Sync + 'static {
    fn core(&self) -> &SessionCore;

    fn from_core(core: SessionCore) -> Self
    where
        Self: Sized;

    /// Called once, outside the registry lock, when the session is deleted
    /// or swept for expiry. Must not panic.
    async fn terminate(&self);

    /// Called once, right after insertion into the registry, for
    /// service-specific async setup (e.g. seeding a default `SHELL` env
    /// entry). Default is a no-op.
    async fn post_create(&self) {}
}

/// Generic session store, one instance per service, parameterized over the
/// service's session-extension type.
pub struct SessionRegistry<S: SessionOwner> {
    sessions: RwLock<HashMap<String, Arc<S>>>,
}

impl<S: SessionOwner> Default for SessionRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: SessionOwner> SessionRegistry<S> {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Create a new session and insert it. Holds the write lock across the
    /// whole operation; no I/O happens while it's held.
    pub async fn create(&self) -> Arc<S> {
        let session = Arc::new(S::from_core(SessionCore::new()));
        let id = session.core().id.clone();
        self.sessions.write().await.insert(id, session.clone());
        session.post_create().await;
        session
    }

    /// Look up a session, sliding its expiry forward. `NotFound` if absent.
    pub async fn get(&self, id: &str) -> Result<Arc<S>, crate::error::ApiError> {
        let session = self
            .sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| crate::error::ApiError::not_found(format!("session {id} not found")))?;
        session.core().touch().await;
        Ok(session)
    }

    /// List all sessions without sliding expiry (used for the listing
    /// endpoint, which is read-only and shouldn't keep idle sessions alive).
    pub async fn list(&self) -> Vec<Arc<S>> {
        self.sessions.read().await.values().cloned().collect()
    }

    /// Remove a session and terminate it outside the registry lock.
    pub async fn delete(&self, id: &str) -> Result<(), crate::error::ApiError> {
        let removed = self.sessions.write().await.remove(id);
        match removed {
            Some(session) => {
                session.terminate().await;
                Ok(())
            }
            None => Err(crate::error::ApiError::not_found(format!(
                "session {id} not found"
            ))),
        }
    }

    /// Run one pass of the expiry sweep: snapshot expired ids under a read
    /// lock, drop the lock, then delete each one. A single slow `terminate`
    /// cannot block unrelated registry reads while the sweep runs.
    pub async fn sweep(&self) -> usize {
        let expired: Vec<String> = {
            let sessions = self.sessions.read().await;
            let mut ids = Vec::new();
            for (id, session) in sessions.iter() {
                if session.core().is_expired().await {
                    ids.push(id.clone());
                }
            }
            ids
        };

        let count = expired.len();
        for id in expired {
            if let Err(err) = self.delete(&id).await {
                tracing::warn!(session_id = %id, error = %err, "sweep: failed to delete expired session");
            } else {
                tracing::info!(session_id = %id, "sweep: expired session removed");
            }
        }
        count
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
