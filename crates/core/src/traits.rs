use crate::error::DriverResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// How a control is found in the remote document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Locator {
    Css(String),
    XPath(String),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Css(s) | Self::XPath(s) => s,
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One browser cookie, in a form that can be persisted between sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
}

/// Capability surface of a remote, dynamically rendered document.
///
/// Implementations report failures as [`DriverError`](crate::DriverError).
/// Page interactions normally go through the safe-operation layer, which
/// turns these into `false`/`None`.
#[async_trait]
pub trait RemoteUiDriver: Send + Sync {
    async fn navigate(&self, url: &str) -> DriverResult<()>;

    async fn reload(&self) -> DriverResult<()>;

    /// Waits until `locator` is present, up to `timeout`.
    async fn wait_for(&self, locator: &Locator, timeout: Duration) -> DriverResult<()>;

    async fn is_present(&self, locator: &Locator) -> DriverResult<bool>;

    async fn click(&self, locator: &Locator) -> DriverResult<()>;

    async fn type_text(&self, locator: &Locator, value: &str) -> DriverResult<()>;

    async fn select_option(&self, locator: &Locator, value: &str) -> DriverResult<()>;

    async fn read_text(&self, locator: &Locator) -> DriverResult<String>;

    async fn read_attribute(&self, locator: &Locator, name: &str) -> DriverResult<Option<String>>;

    /// Runs `script` in the page; positional `args` are exposed as `arguments`.
    async fn evaluate(&self, script: &str, args: Vec<Value>) -> DriverResult<Value>;

    async fn cookies(&self) -> DriverResult<Vec<SessionCookie>>;

    async fn set_cookies(&self, cookies: &[SessionCookie]) -> DriverResult<()>;

    async fn clear_cookies(&self) -> DriverResult<()>;

    async fn close(&self) -> DriverResult<()>;
}

/// Opens remote sessions. One session serves a whole run.
#[async_trait]
pub trait DriverFactory: Send + Sync {
    async fn open(&self) -> DriverResult<Arc<dyn RemoteUiDriver>>;
}
