//! Uniform wrapper around every remote-UI interaction.
//!
//! Each operation first waits for the busy indicator to clear, then for the
//! target control, then acts. Failures are logged and returned as `false` or
//! `None`; nothing here ever returns an error to the caller. Call sites decide
//! whether a failed interaction is fatal, transient or ignorable.
//! [`SafeOps::peek_text`] and [`SafeOps::is_present`] skip the target wait,
//! for controls that are legitimately absent at times.

use serde_json::Value;
use simdrive_core::{BusyPolicy, Locator, RemoteUiDriver, TimingConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct SafeOps {
    driver: Arc<dyn RemoteUiDriver>,
    busy: Locator,
    busy_timeout: Duration,
    busy_poll: Duration,
    find_timeout: Duration,
    policy: BusyPolicy,
}

impl SafeOps {
    #[must_use]
    pub fn new(
        driver: Arc<dyn RemoteUiDriver>,
        busy_indicator: &str,
        timing: &TimingConfig,
        policy: BusyPolicy,
    ) -> Self {
        Self {
            driver,
            busy: Locator::css(busy_indicator),
            busy_timeout: timing.busy_timeout,
            busy_poll: timing.busy_poll,
            find_timeout: timing.find_timeout,
            policy,
        }
    }

    #[must_use]
    pub fn driver(&self) -> &Arc<dyn RemoteUiDriver> {
        &self.driver
    }

    /// Polls until the busy indicator is gone. Returns false on timeout.
    pub async fn wait_for_idle(&self) -> bool {
        let deadline = Instant::now() + self.busy_timeout;
        loop {
            match self.driver.is_present(&self.busy).await {
                Ok(false) => return true,
                Ok(true) => {}
                Err(e) => debug!(error = %e, "busy indicator check failed"),
            }
            if Instant::now() >= deadline {
                warn!(timeout = ?self.busy_timeout, "busy indicator did not clear");
                return false;
            }
            tokio::time::sleep(self.busy_poll).await;
        }
    }

    /// Applies the busy policy before an interaction. Returns false only when
    /// the interaction must not be attempted.
    async fn gate(&self, label: &str) -> bool {
        if self.wait_for_idle().await {
            return true;
        }
        match self.policy {
            BusyPolicy::BestEffort => {
                warn!(target_label = label, "page still busy, attempting anyway");
                true
            }
            BusyPolicy::Strict => {
                warn!(target_label = label, "page still busy, skipping interaction");
                false
            }
        }
    }

    async fn locate(&self, locator: &Locator, label: &str) -> bool {
        match self.driver.wait_for(locator, self.find_timeout).await {
            Ok(()) => true,
            Err(e) => {
                warn!(target_label = label, error = %e, "control not found");
                false
            }
        }
    }

    /// Waits for a control without interacting with it.
    pub async fn wait_for(&self, locator: &Locator, label: &str) -> bool {
        self.gate(label).await && self.locate(locator, label).await
    }

    pub async fn click(&self, locator: &Locator, label: &str) -> bool {
        if !self.wait_for(locator, label).await {
            return false;
        }
        match self.driver.click(locator).await {
            Ok(()) => {
                debug!(target_label = label, "clicked");
                true
            }
            Err(e) => {
                warn!(target_label = label, error = %e, "could not click");
                false
            }
        }
    }

    pub async fn type_text(&self, locator: &Locator, value: &str, label: &str) -> bool {
        if !self.wait_for(locator, label).await {
            return false;
        }
        match self.driver.type_text(locator, value).await {
            Ok(()) => {
                debug!(target_label = label, "typed");
                true
            }
            Err(e) => {
                warn!(target_label = label, error = %e, "could not type");
                false
            }
        }
    }

    pub async fn select(&self, locator: &Locator, value: &str, label: &str) -> bool {
        if !self.wait_for(locator, label).await {
            return false;
        }
        match self.driver.select_option(locator, value).await {
            Ok(()) => {
                debug!(target_label = label, value, "selected");
                true
            }
            Err(e) => {
                warn!(target_label = label, value, error = %e, "could not select");
                false
            }
        }
    }

    /// Reads text of a control that may legitimately be absent.
    pub async fn read_text(&self, locator: &Locator, label: &str) -> Option<String> {
        if !self.wait_for(locator, label).await {
            return None;
        }
        self.text_of(locator, label).await
    }

    /// Reads a control that may not be rendered, without waiting for it.
    pub async fn peek_text(&self, locator: &Locator, label: &str) -> Option<String> {
        if !self.gate(label).await {
            return None;
        }
        self.text_of(locator, label).await
    }

    async fn text_of(&self, locator: &Locator, label: &str) -> Option<String> {
        match self.driver.read_text(locator).await {
            Ok(text) => Some(text),
            Err(e) if e.is_missing() => {
                debug!(target_label = label, "nothing to read");
                None
            }
            Err(e) => {
                warn!(target_label = label, error = %e, "read failed");
                None
            }
        }
    }

    pub async fn read_attribute(&self, locator: &Locator, name: &str, label: &str) -> Option<String> {
        if !self.wait_for(locator, label).await {
            return None;
        }
        match self.driver.read_attribute(locator, name).await {
            Ok(value) => value,
            Err(e) => {
                debug!(target_label = label, attribute = name, error = %e, "attribute read failed");
                None
            }
        }
    }

    pub async fn is_present(&self, locator: &Locator, label: &str) -> bool {
        if !self.gate(label).await {
            return false;
        }
        match self.driver.is_present(locator).await {
            Ok(present) => present,
            Err(e) => {
                debug!(target_label = label, error = %e, "presence check failed");
                false
            }
        }
    }

    pub async fn evaluate(&self, script: &str, args: Vec<Value>, label: &str) -> Option<Value> {
        if !self.gate(label).await {
            return None;
        }
        match self.driver.evaluate(script, args).await {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(target_label = label, error = %e, "script failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeSimulator;
    use simdrive_core::SiteLayout;

    fn ops(fake: &Arc<FakeSimulator>, policy: BusyPolicy) -> SafeOps {
        let site = SiteLayout::default();
        SafeOps::new(fake.clone(), &site.busy_indicator, &TimingConfig::immediate(), policy)
    }

    #[tokio::test]
    async fn test_failed_click_is_false_not_error() {
        let fake = Arc::new(FakeSimulator::new(SiteLayout::default()));
        let missing = Locator::css("#does-not-exist");
        assert!(!ops(&fake, BusyPolicy::BestEffort).click(&missing, "missing").await);
    }

    #[tokio::test]
    async fn test_failing_locator_reads_none() {
        let site = SiteLayout::default();
        let fake = Arc::new(FakeSimulator::new(site.clone()));
        fake.fail_locator(&site.phone_input);
        let ops = ops(&fake, BusyPolicy::BestEffort);
        let phone = Locator::css(&site.phone_input);
        assert!(!ops.type_text(&phone, "999", "phone").await);
        assert!(ops.read_text(&phone, "phone").await.is_none());
    }

    #[tokio::test]
    async fn test_read_waits_for_target_and_peek_does_not() {
        let site = SiteLayout::default();
        let fake = Arc::new(FakeSimulator::new(site.clone()));
        fake.open_simulator();
        let ops = ops(&fake, BusyPolicy::BestEffort);
        let hour = SiteLayout::selected_option(&site.clock_hour_select);
        let loss_badge = Locator::css(&site.pnl_loss);

        assert_eq!(ops.read_text(&hour, "hour").await.as_deref(), Some("9"));
        assert!(ops.read_text(&loss_badge, "PnL").await.is_none());
        assert!(ops.peek_text(&loss_badge, "PnL").await.is_none());

        fake.fail_locator(hour.as_str());
        assert!(ops.read_text(&hour, "hour").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_best_effort_attempts_while_busy() {
        let site = SiteLayout::default();
        let fake = Arc::new(FakeSimulator::new(site.clone()));
        fake.set_busy(true);
        let phone = Locator::css(&site.phone_input);
        fake.open_login();

        assert!(ops(&fake, BusyPolicy::BestEffort).type_text(&phone, "999", "phone").await);
        assert!(!ops(&fake, BusyPolicy::Strict).type_text(&phone, "999", "phone").await);
    }
}
