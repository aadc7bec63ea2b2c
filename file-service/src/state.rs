//! Shared application state handed to every route handler.

use std::sync::Arc;

use agentfs_common::SessionRegistry;

use crate::config::Config;
use crate::session::FileSession;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: Arc<SessionRegistry<FileSession>>,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            sessions: Arc::new(SessionRegistry::new()),
            start_time: std::time::Instant::now(),
        }
    }
}
