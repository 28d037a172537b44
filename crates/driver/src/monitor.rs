//! Background watchers for a stuck loader and a lost connection.
//!
//! Both poll the live page on a fixed cadence, never interact with it, and
//! report through a channel. Faults are swallowed while the shared
//! [`MonitorPause`] is set.

use crate::pause::MonitorPause;
use simdrive_core::{Locator, RemoteUiDriver, SiteLayout, TimingConfig};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorFault {
    /// The busy indicator stayed visible past the stuck threshold.
    LoadingStuck,
    ConnectionLost,
}

impl fmt::Display for MonitorFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoadingStuck => write!(f, "page stuck loading"),
            Self::ConnectionLost => write!(f, "connection to the simulator lost"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub busy_indicator: Locator,
    pub connection_status: Locator,
    pub connection_lost_text: String,
    pub interval: Duration,
    pub stuck_threshold: Duration,
}

impl MonitorSettings {
    #[must_use]
    pub fn new(site: &SiteLayout, timing: &TimingConfig) -> Self {
        Self {
            busy_indicator: Locator::css(&site.busy_indicator),
            connection_status: Locator::css(&site.connection_status),
            connection_lost_text: site.connection_lost_text.clone(),
            interval: timing.monitor_interval,
            stuck_threshold: timing.stuck_threshold,
        }
    }
}

/// Owns both watcher tasks. Dropping the handle stops them.
pub struct MonitorHandle {
    busy: JoinHandle<()>,
    connection: JoinHandle<()>,
}

impl MonitorHandle {
    pub fn spawn(
        driver: Arc<dyn RemoteUiDriver>,
        settings: MonitorSettings,
        pause: MonitorPause,
        faults: mpsc::Sender<MonitorFault>,
    ) -> Self {
        let busy = tokio::spawn(watch_busy(
            driver.clone(),
            settings.clone(),
            pause.clone(),
            faults.clone(),
        ));
        let connection = tokio::spawn(watch_connection(driver, settings, pause, faults));
        Self { busy, connection }
    }

    pub fn stop(&self) {
        self.busy.abort();
        self.connection.abort();
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

fn ticker(period: Duration) -> tokio::time::Interval {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn watch_busy(
    driver: Arc<dyn RemoteUiDriver>,
    settings: MonitorSettings,
    pause: MonitorPause,
    faults: mpsc::Sender<MonitorFault>,
) {
    let mut interval = ticker(settings.interval);
    let mut stuck_since: Option<Instant> = None;
    loop {
        interval.tick().await;
        if pause.is_paused() {
            continue;
        }
        let busy = match driver.is_present(&settings.busy_indicator).await {
            Ok(busy) => busy,
            Err(e) => {
                debug!(error = %e, "busy watcher read failed");
                continue;
            }
        };
        if !busy {
            stuck_since = None;
            continue;
        }
        let since = *stuck_since.get_or_insert_with(Instant::now);
        if since.elapsed() >= settings.stuck_threshold {
            warn!(stuck_for = ?since.elapsed(), "loader stuck");
            stuck_since = None;
            if faults.send(MonitorFault::LoadingStuck).await.is_err() {
                return;
            }
        }
    }
}

async fn watch_connection(
    driver: Arc<dyn RemoteUiDriver>,
    settings: MonitorSettings,
    pause: MonitorPause,
    faults: mpsc::Sender<MonitorFault>,
) {
    let mut interval = ticker(settings.interval);
    loop {
        interval.tick().await;
        if pause.is_paused() {
            continue;
        }
        let Ok(text) = driver.read_text(&settings.connection_status).await else {
            continue;
        };
        if text.contains(&settings.connection_lost_text) {
            warn!("connection lost banner shown");
            let _ = faults.send(MonitorFault::ConnectionLost).await;
            return;
        }
    }
}
