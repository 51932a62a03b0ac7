//! Seam between the session controller and wherever the session persists.

use anyhow::Result;
use async_trait::async_trait;
use storage::{Storage, StoredSession};
use tokio::sync::Mutex;

use crate::session::Session;

/// Persistence for the three session fields. Only the session controller
/// writes through this trait.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self) -> Result<Session>;
    async fn save(&self, session: &Session) -> Result<()>;
    async fn clear(&self) -> Result<()>;
}

#[async_trait]
impl SessionStore for Storage {
    async fn load(&self) -> Result<Session> {
        Ok(self.load_session().await?.into())
    }

    async fn save(&self, session: &Session) -> Result<()> {
        self.save_session(&StoredSession::from(session)).await
    }

    async fn clear(&self) -> Result<()> {
        self.clear_session().await
    }
}

/// Process-local store; nothing survives a restart.
#[derive(Default)]
pub struct MemorySessionStore {
    session: Mutex<Session>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        Self {
            session: Mutex::new(session),
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self) -> Result<Session> {
        Ok(self.session.lock().await.clone())
    }

    async fn save(&self, session: &Session) -> Result<()> {
        *self.session.lock().await = session.clone();
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.session.lock().await = Session::default();
        Ok(())
    }
}
