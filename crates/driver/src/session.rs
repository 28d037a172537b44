//! Login and session-cookie persistence.
//!
//! A run authenticates once; the captured cookie set is persisted through a
//! [`SessionStore`] and re-applied before every date so later dates skip the
//! login form.

use crate::error::SessionError;
use crate::safe_ops::SafeOps;
use async_trait::async_trait;
use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use simdrive_core::{
    Locator, RemoteUiDriver, RetryConfig, SessionCookie, SimulationRequest, SiteLayout,
    TimingConfig,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Login credentials. The password never appears in `Debug` output.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub phone: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(phone: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            phone: phone.into(),
            password: SecretString::from(password.into()),
        }
    }
}

impl From<&SimulationRequest> for Credentials {
    fn from(request: &SimulationRequest) -> Self {
        Self::new(request.phone_number.clone(), request.password.clone())
    }
}

/// Opaque authenticated session: the cookie set captured after login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken {
    pub cookies: Vec<SessionCookie>,
}

/// Single-slot persistence for the session token.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self) -> Result<Option<SessionToken>, SessionError>;

    async fn save(&self, token: &SessionToken) -> Result<(), SessionError>;

    async fn clear(&self) -> Result<(), SessionError>;
}

/// Stores the cookie set as a JSON array on disk.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

fn store_error(context: &str, e: impl std::fmt::Display) -> SessionError {
    SessionError::Store(format!("{context}: {e}"))
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self) -> Result<Option<SessionToken>, SessionError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(store_error("read cookie file", e)),
        };
        let token = serde_json::from_slice(&bytes).map_err(|e| store_error("parse cookie file", e))?;
        Ok(Some(token))
    }

    async fn save(&self, token: &SessionToken) -> Result<(), SessionError> {
        let json = serde_json::to_vec_pretty(token).map_err(|e| store_error("encode cookies", e))?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| store_error("write cookie file", e))
    }

    async fn clear(&self) -> Result<(), SessionError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(store_error("remove cookie file", e)),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    slot: Mutex<Option<SessionToken>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self) -> Result<Option<SessionToken>, SessionError> {
        Ok(self.slot.lock().clone())
    }

    async fn save(&self, token: &SessionToken) -> Result<(), SessionError> {
        *self.slot.lock() = Some(token.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), SessionError> {
        *self.slot.lock() = None;
        Ok(())
    }
}

pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    site: SiteLayout,
    timing: TimingConfig,
    max_attempts: u32,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn SessionStore>,
        site: SiteLayout,
        timing: TimingConfig,
        retry: &RetryConfig,
    ) -> Self {
        Self {
            store,
            site,
            timing,
            max_attempts: retry.login_max_attempts.max(1),
        }
    }

    /// Logs in through the form and persists the resulting cookie set.
    ///
    /// Any failed step restarts the login from navigation after a short
    /// backoff.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::AttemptsExhausted`] once every attempt failed,
    /// or a store/driver error if the cookies cannot be captured or saved.
    pub async fn authenticate(
        &self,
        ops: &SafeOps,
        credentials: &Credentials,
    ) -> Result<SessionToken, SessionError> {
        let mut last_failure = String::new();
        for attempt in 1..=self.max_attempts {
            if attempt > 1 {
                tokio::time::sleep(self.timing.login_retry_backoff).await;
            }
            match self.submit_login(ops, credentials).await {
                Ok(()) => {
                    tokio::time::sleep(self.timing.post_login_pause).await;
                    let token = SessionToken {
                        cookies: ops.driver().cookies().await?,
                    };
                    self.persist(&token).await?;
                    info!(attempt, cookies = token.cookies.len(), "logged in");
                    return Ok(token);
                }
                Err(reason) => {
                    warn!(attempt, max_attempts = self.max_attempts, %reason, "login attempt failed");
                    last_failure = reason;
                }
            }
        }
        Err(SessionError::AttemptsExhausted {
            attempts: self.max_attempts,
            last_failure,
        })
    }

    async fn submit_login(&self, ops: &SafeOps, credentials: &Credentials) -> Result<(), String> {
        ops.driver()
            .navigate(&self.site.login_url)
            .await
            .map_err(|e| format!("open login page: {e}"))?;
        tokio::time::sleep(self.timing.page_settle).await;

        let phone = Locator::css(&self.site.phone_input);
        if !ops.type_text(&phone, &credentials.phone, "phone number").await {
            return Err("could not type phone number".to_string());
        }
        let password = Locator::css(&self.site.password_input);
        if !ops
            .type_text(&password, credentials.password.expose_secret(), "password")
            .await
        {
            return Err("could not type password".to_string());
        }
        let submit = Locator::css(&self.site.login_button);
        if !ops.click(&submit, "login button").await {
            return Err("could not click login".to_string());
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub async fn persist(&self, token: &SessionToken) -> Result<(), SessionError> {
        self.store.save(token).await
    }

    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn restore(&self) -> Result<Option<SessionToken>, SessionError> {
        self.store.load().await
    }

    /// Installs a token's cookies into the live driver.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver rejects the cookies.
    pub async fn apply(
        &self,
        driver: &dyn RemoteUiDriver,
        token: &SessionToken,
    ) -> Result<(), SessionError> {
        driver.set_cookies(&token.cookies).await?;
        debug!(cookies = token.cookies.len(), "session cookies applied");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the store cannot be cleared.
    pub async fn clear(&self) -> Result<(), SessionError> {
        self.store.clear().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeSimulator;
    use simdrive_core::BusyPolicy;

    fn cookie(name: &str) -> SessionCookie {
        SessionCookie {
            name: name.to_string(),
            value: "v".to_string(),
            domain: None,
            path: Some("/".to_string()),
            secure: true,
            http_only: false,
        }
    }

    fn manager(store: Arc<dyn SessionStore>, max_attempts: u32) -> SessionManager {
        let retry = RetryConfig {
            login_max_attempts: max_attempts,
            ..RetryConfig::default()
        };
        SessionManager::new(store, SiteLayout::default(), TimingConfig::immediate(), &retry)
    }

    fn ops(fake: &Arc<FakeSimulator>) -> SafeOps {
        SafeOps::new(
            fake.clone(),
            &SiteLayout::default().busy_indicator,
            &TimingConfig::immediate(),
            BusyPolicy::BestEffort,
        )
    }

    #[tokio::test]
    async fn test_file_store_roundtrip_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().join("cookies.json"));
        assert!(store.load().await.unwrap().is_none());

        let token = SessionToken {
            cookies: vec![cookie("sid")],
        };
        store.save(&token).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(token));

        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_file_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.json");
        std::fs::write(&path, "not json").unwrap();
        let err = FileSessionStore::new(path).load().await.unwrap_err();
        assert!(matches!(err, SessionError::Store(_)));
    }

    #[tokio::test]
    async fn test_authenticate_persists_cookies() {
        let fake = Arc::new(FakeSimulator::new(SiteLayout::default()));
        let store = Arc::new(MemorySessionStore::new());
        let sessions = manager(store.clone(), 3);

        let token = sessions
            .authenticate(&ops(&fake), &Credentials::new("9999999999", "hunter2"))
            .await
            .unwrap();

        assert_eq!(fake.stats().logins, 1);
        assert!(!token.cookies.is_empty());
        assert_eq!(store.load().await.unwrap(), Some(token));
    }

    #[tokio::test]
    async fn test_authenticate_is_bounded() {
        let site = SiteLayout::default();
        let fake = Arc::new(FakeSimulator::new(site.clone()));
        fake.fail_locator(&site.password_input);
        let sessions = manager(Arc::new(MemorySessionStore::new()), 3);

        let err = sessions
            .authenticate(&ops(&fake), &Credentials::new("9999999999", "hunter2"))
            .await
            .unwrap_err();

        match err {
            SessionError::AttemptsExhausted { attempts, last_failure } => {
                assert_eq!(attempts, 3);
                assert!(last_failure.contains("password"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(fake.stats().navigations, 3);
        assert_eq!(fake.stats().logins, 0);
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let creds = Credentials::new("9999999999", "hunter2");
        assert!(!format!("{creds:?}").contains("hunter2"));
    }
}
