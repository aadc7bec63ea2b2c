//! `file-service`'s session extension. Unlike `terminal-service`, a file
//! session owns no background processes, so `terminate` is a no-op — but it
//! still seeds the shared `SHELL` env entry on creation, same as
//! `TerminalSession`, since that's part of every session's data model, not
//! just the terminal service's.

use agentfs_common::{SessionCore, SessionOwner};

pub struct FileSession {
    core: SessionCore,
}

#[async_trait::async_trait]
impl SessionOwner for FileSession {
    fn core(&self) -> &SessionCore {
        &self.core
    }

    fn from_core(core: SessionCore) -> Self {
        Self { core }
    }

    /// Seed the session's `SHELL` entry, same as `TerminalSession`'s
    /// `post_create` — §3's data model initializes every session's
    /// `env_vars` to a single `SHELL` entry regardless of which service
    /// created it, even though `file-service` never spawns a shell itself.
    async fn post_create(&self) {
        let shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/bash".to_string());
        self.core.env_set("SHELL".to_string(), shell).await;
    }

    async fn terminate(&self) {}
}

#[cfg(test)]
mod tests {
    use agentfs_common::SessionRegistry;

    use super::*;

    #[tokio::test]
    async fn post_create_seeds_a_default_shell() {
        let registry: SessionRegistry<FileSession> = SessionRegistry::new();
        let session = registry.create().await;
        assert!(session.core().env_get("SHELL").await.is_some());
    }
}
