//! [`RemoteUiDriver`] over the W3C WebDriver protocol.
//!
//! Talks to chromedriver (or any WebDriver endpoint) through `fantoccini`.
//! One [`FantocciniDriver`] is one browser session.

use async_trait::async_trait;
use fantoccini::cookies::Cookie;
use fantoccini::error::CmdError;
use fantoccini::{Client, ClientBuilder};
use serde_json::{json, Map, Value};
use simdrive_core::{
    DriverError, DriverFactory, DriverResult, Locator, RemoteUiDriver, SessionCookie,
    WebDriverConfig,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

fn wd_locator(locator: &Locator) -> fantoccini::Locator<'_> {
    match locator {
        Locator::Css(s) => fantoccini::Locator::Css(s),
        Locator::XPath(s) => fantoccini::Locator::XPath(s),
    }
}

fn map_err(locator: &str, e: CmdError) -> DriverError {
    if e.is_no_such_element() {
        return DriverError::not_found(locator);
    }
    match e {
        CmdError::WaitTimeout => DriverError::timeout(locator),
        other => DriverError::Session(other.to_string()),
    }
}

fn to_session_cookie(cookie: &Cookie<'_>) -> SessionCookie {
    SessionCookie {
        name: cookie.name().to_string(),
        value: cookie.value().to_string(),
        domain: cookie.domain().map(str::to_string),
        path: cookie.path().map(str::to_string),
        secure: cookie.secure().unwrap_or(false),
        http_only: cookie.http_only().unwrap_or(false),
    }
}

fn to_wd_cookie(cookie: &SessionCookie) -> Cookie<'static> {
    let mut out = Cookie::new(cookie.name.clone(), cookie.value.clone());
    if let Some(domain) = &cookie.domain {
        out.set_domain(domain.clone());
    }
    if let Some(path) = &cookie.path {
        out.set_path(path.clone());
    }
    out.set_secure(cookie.secure);
    out.set_http_only(cookie.http_only);
    out
}

/// Chrome capabilities for the configured browser flags.
#[must_use]
pub fn capabilities(config: &WebDriverConfig) -> Map<String, Value> {
    let mut args = config.browser_args.clone();
    if config.headless {
        args.push("--headless=new".to_string());
    }
    if let Some(user_agent) = &config.user_agent {
        args.push(format!("--user-agent={user_agent}"));
    }
    let mut chrome = json!({ "args": args });
    if let Some(binary) = &config.browser_binary {
        chrome["binary"] = json!(binary);
    }
    let mut caps = Map::new();
    caps.insert("goog:chromeOptions".to_string(), chrome);
    caps
}

pub struct FantocciniDriver {
    client: Client,
}

impl FantocciniDriver {
    /// Opens a browser session on the configured WebDriver endpoint.
    ///
    /// # Errors
    /// Returns [`DriverError::Session`] if the endpoint refuses the session.
    pub async fn connect(config: &WebDriverConfig) -> DriverResult<Self> {
        let mut builder = ClientBuilder::native();
        builder.capabilities(capabilities(config));
        let client = builder
            .connect(&config.url)
            .await
            .map_err(|e| DriverError::Session(format!("could not start browser session: {e}")))?;
        info!(url = %config.url, headless = config.headless, "browser session opened");
        Ok(Self { client })
    }

    async fn find(&self, locator: &Locator) -> DriverResult<fantoccini::elements::Element> {
        self.client
            .find(wd_locator(locator))
            .await
            .map_err(|e| map_err(locator.as_str(), e))
    }
}

#[async_trait]
impl RemoteUiDriver for FantocciniDriver {
    async fn navigate(&self, url: &str) -> DriverResult<()> {
        debug!(url, "navigate");
        self.client.goto(url).await.map_err(|e| map_err(url, e))
    }

    async fn reload(&self) -> DriverResult<()> {
        self.client.refresh().await.map_err(|e| map_err("reload", e))
    }

    async fn wait_for(&self, locator: &Locator, timeout: Duration) -> DriverResult<()> {
        self.client
            .wait()
            .at_most(timeout)
            .for_element(wd_locator(locator))
            .await
            .map(|_| ())
            .map_err(|e| map_err(locator.as_str(), e))
    }

    async fn is_present(&self, locator: &Locator) -> DriverResult<bool> {
        self.client
            .find_all(wd_locator(locator))
            .await
            .map(|found| !found.is_empty())
            .map_err(|e| map_err(locator.as_str(), e))
    }

    async fn click(&self, locator: &Locator) -> DriverResult<()> {
        self.find(locator)
            .await?
            .click()
            .await
            .map_err(|e| map_err(locator.as_str(), e))
    }

    async fn type_text(&self, locator: &Locator, value: &str) -> DriverResult<()> {
        let element = self.find(locator).await?;
        element.clear().await.map_err(|e| map_err(locator.as_str(), e))?;
        element
            .send_keys(value)
            .await
            .map_err(|e| map_err(locator.as_str(), e))
    }

    async fn select_option(&self, locator: &Locator, value: &str) -> DriverResult<()> {
        self.find(locator)
            .await?
            .select_by_value(value)
            .await
            .map_err(|e| map_err(locator.as_str(), e))
    }

    async fn read_text(&self, locator: &Locator) -> DriverResult<String> {
        self.find(locator)
            .await?
            .text()
            .await
            .map_err(|e| map_err(locator.as_str(), e))
    }

    async fn read_attribute(&self, locator: &Locator, name: &str) -> DriverResult<Option<String>> {
        self.find(locator)
            .await?
            .attr(name)
            .await
            .map_err(|e| map_err(locator.as_str(), e))
    }

    async fn evaluate(&self, script: &str, args: Vec<Value>) -> DriverResult<Value> {
        self.client
            .execute(script, args)
            .await
            .map_err(|e| DriverError::Script(e.to_string()))
    }

    async fn cookies(&self) -> DriverResult<Vec<SessionCookie>> {
        let cookies = self
            .client
            .get_all_cookies()
            .await
            .map_err(|e| map_err("cookies", e))?;
        Ok(cookies.iter().map(to_session_cookie).collect())
    }

    async fn set_cookies(&self, cookies: &[SessionCookie]) -> DriverResult<()> {
        for cookie in cookies {
            self.client
                .add_cookie(to_wd_cookie(cookie))
                .await
                .map_err(|e| map_err(&cookie.name, e))?;
        }
        Ok(())
    }

    async fn clear_cookies(&self) -> DriverResult<()> {
        self.client
            .delete_all_cookies()
            .await
            .map_err(|e| map_err("cookies", e))
    }

    async fn close(&self) -> DriverResult<()> {
        self.client
            .clone()
            .close()
            .await
            .map_err(|e| map_err("close", e))?;
        info!("browser session closed");
        Ok(())
    }
}

/// Opens one browser session per call.
pub struct WebDriverFactory {
    config: WebDriverConfig,
}

impl WebDriverFactory {
    #[must_use]
    pub const fn new(config: WebDriverConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl DriverFactory for WebDriverFactory {
    async fn open(&self) -> DriverResult<Arc<dyn RemoteUiDriver>> {
        Ok(Arc::new(FantocciniDriver::connect(&self.config).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_carry_flags() {
        let config = WebDriverConfig {
            browser_binary: Some("/usr/bin/chromium".to_string()),
            ..WebDriverConfig::default()
        };
        let caps = capabilities(&config);
        let chrome = &caps["goog:chromeOptions"];
        let args: Vec<&str> = chrome["args"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();

        assert!(args.contains(&"--no-sandbox"));
        assert!(args.contains(&"--window-size=1920,1080"));
        assert!(args.contains(&"--headless=new"));
        assert!(args.iter().any(|a| a.starts_with("--user-agent=Mozilla/5.0")));
        assert_eq!(chrome["binary"], "/usr/bin/chromium");
    }

    #[test]
    fn test_headful_session_has_no_headless_flag() {
        let config = WebDriverConfig {
            headless: false,
            user_agent: None,
            ..WebDriverConfig::default()
        };
        let caps = capabilities(&config);
        let args = caps["goog:chromeOptions"]["args"].as_array().unwrap();
        assert!(!args.iter().any(|a| a == "--headless=new"));
        assert!(caps["goog:chromeOptions"].get("binary").is_none());
    }

    #[test]
    fn test_error_mapping() {
        use fantoccini::error::{ErrorStatus, WebDriver};

        let missing = CmdError::Standard(WebDriver::new(ErrorStatus::NoSuchElement, "gone"));
        assert_eq!(
            map_err("#ltp", missing),
            DriverError::LocatorNotFound("#ltp".to_string())
        );
        assert_eq!(
            map_err("#ltp", CmdError::WaitTimeout),
            DriverError::Timeout("#ltp".to_string())
        );
        assert!(matches!(
            map_err("#ltp", CmdError::NotJson("<html>".to_string())),
            DriverError::Session(_)
        ));
    }

    #[test]
    fn test_cookie_conversion_keeps_flags() {
        let original = SessionCookie {
            name: "sid".to_string(),
            value: "abc".to_string(),
            domain: Some("www.stockmock.in".to_string()),
            path: Some("/".to_string()),
            secure: true,
            http_only: true,
        };
        let back = to_session_cookie(&to_wd_cookie(&original));
        assert_eq!(back, original);
    }
}
