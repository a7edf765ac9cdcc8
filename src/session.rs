mod errors;

pub use errors::SessionError;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use time::UtcDateTime;
use tokio::sync::RwLock;

use crate::cache::{CacheImpl, CacheIo, ProductionCacheIo};
use crate::config::AppConfig;
use crate::data::Session;

pub type SessionManager = SessionManagerImpl<ProductionCacheIo>;

/// Bearer-token lifecycle: installation after the host's OAuth flow,
/// restoration at startup, expiry with a safety margin, and the logout
/// epoch that in-flight sync operations check before committing results.
pub struct SessionManagerImpl<Io: CacheIo> {
    cache: Arc<CacheImpl<Io>>,
    current: RwLock<Option<Session>>,
    epoch: AtomicU64,
    safety_margin: time::Duration,
}

impl<Io: CacheIo> SessionManagerImpl<Io> {
    pub fn new(
        config: &AppConfig,
        cache: Arc<CacheImpl<Io>>,
    ) -> SessionManagerImpl<Io> {
        SessionManagerImpl {
            cache,
            current: RwLock::new(None),
            epoch: AtomicU64::new(0),
            safety_margin: config.session_safety_margin(),
        }
    }

    pub async fn login(&self, session: Session) -> Result<(), SessionError> {
        self.cache.store_session(&session).await?;
        *self.current.write().await = Some(session);
        Ok(())
    }

    /// Rebuilds the session from the persisted token iff it is still
    /// safely within its lifetime; otherwise the stale token is discarded
    /// and re-authentication is required.
    pub async fn restore(&self) -> Result<Option<Session>, SessionError> {
        let Some(session) = self.cache.load_session().await? else {
            return Ok(None);
        };
        if !self.is_usable(&session) {
            self.cache.clear_session().await?;
            return Ok(None);
        }
        *self.current.write().await = Some(session.clone());
        Ok(Some(session))
    }

    pub async fn logout(&self) -> Result<(), SessionError> {
        // bump before touching storage so in-flight operations observe
        // the logout even if clearing the persisted session fails
        self.epoch.fetch_add(1, Ordering::SeqCst);
        *self.current.write().await = None;
        self.cache.clear_session().await?;
        Ok(())
    }

    pub async fn token(&self) -> Result<String, SessionError> {
        match self.current.read().await.as_ref() {
            Some(session) if self.is_usable(session) =>
                Ok(session.access_token.clone()),
            Some(_) => Err(SessionError::Expired),
            None => Err(SessionError::NotLoggedIn),
        }
    }

    pub async fn current(&self) -> Option<Session> {
        self.current.read().await.clone()
    }

    pub async fn is_logged_in(&self) -> bool {
        self.token().await.is_ok()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    fn is_usable(&self, session: &Session) -> bool {
        UtcDateTime::now() < session.expires_at - self.safety_margin
    }
}
