//! Runs a validated date range through one browser session.

use crate::events::StreamEvent;
use crate::sink::EventSink;
use anyhow::{Context, Result};
use simdrive_core::{
    AppConfig, CalendarDate, DriverFactory, RemoteUiDriver, RunRequest, SimulationOutcome,
};
use simdrive_driver::{
    Credentials, MonitorHandle, MonitorPause, MonitorSettings, SafeOps, SessionManager,
    SessionStore, SimulationDriver, SimulationError,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Per-run tally of outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub completed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunSummary {
    fn record(&mut self, outcome: &SimulationOutcome) {
        match outcome {
            SimulationOutcome::Completed(_) => self.completed += 1,
            SimulationOutcome::Skipped { .. } => self.skipped += 1,
            SimulationOutcome::Failed { .. } => self.failed += 1,
        }
    }

    #[must_use]
    pub const fn total(&self) -> usize {
        self.completed + self.skipped + self.failed
    }
}

/// Live remote session shared by every date of a run.
struct LiveSession {
    driver: Arc<dyn RemoteUiDriver>,
    ops: SafeOps,
    authenticated: bool,
}

pub struct RunCoordinator {
    config: Arc<AppConfig>,
    factory: Arc<dyn DriverFactory>,
    sessions: Arc<SessionManager>,
}

impl RunCoordinator {
    #[must_use]
    pub fn new(
        config: Arc<AppConfig>,
        factory: Arc<dyn DriverFactory>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        let sessions = Arc::new(SessionManager::new(
            store,
            config.site.clone(),
            config.timing.clone(),
            &config.retry,
        ));
        Self {
            config,
            factory,
            sessions,
        }
    }

    /// Validates `request`, simulates every date in its range and streams the
    /// results to `sink`. Always ends the stream with one terminal event.
    pub async fn run(&self, request: RunRequest, sink: &EventSink) -> RunSummary {
        let request = match request.validate() {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "rejected run request");
                sink.emit(StreamEvent::from(&e)).await;
                return RunSummary::default();
            }
        };
        let dates = match request.dates() {
            Ok(dates) => dates,
            Err(e) => {
                warn!(error = %e, start = %request.start_date, end = %request.end_date, "empty date range");
                sink.emit(StreamEvent::from(&e)).await;
                return RunSummary::default();
            }
        };

        info!(dates = dates.len(), start = %request.start_date, end = %request.end_date, "run started");
        sink.emit(StreamEvent::start(dates.len())).await;

        let credentials = Credentials::from(&request);
        let mut summary = RunSummary::default();
        match self.run_dates(&dates, &credentials, sink, &mut summary).await {
            Ok(()) => {
                info!(?summary, client_connected = !sink.is_disconnected(), "run finished");
                sink.emit(StreamEvent::complete()).await;
            }
            Err(e) => {
                error!(error = %e, ?summary, "run aborted");
                sink.emit(StreamEvent::error(format!("Simulation run failed: {e:#}"), None)).await;
            }
        }
        summary
    }

    async fn open_session(&self) -> Result<LiveSession> {
        let driver = self
            .factory
            .open()
            .await
            .context("could not open a browser session")?;
        let ops = SafeOps::new(
            driver.clone(),
            &self.config.site.busy_indicator,
            &self.config.timing,
            self.config.retry.busy_policy,
        );
        Ok(LiveSession {
            driver,
            ops,
            authenticated: false,
        })
    }

    async fn run_dates(
        &self,
        dates: &[CalendarDate],
        credentials: &Credentials,
        sink: &EventSink,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let pause = MonitorPause::new();
        let mut live = self.open_session().await?;
        let total = dates.len();

        for (index, &date) in dates.iter().enumerate() {
            sink.emit(StreamEvent::progress(format!(
                "Simulating {date} ({}/{total})",
                index + 1
            )))
            .await;

            let outcome = self.simulate_date(&mut live, credentials, &pause, date).await;
            // a restart's pause window must not carry into the next date
            pause.resume();
            match &outcome {
                SimulationOutcome::Failed { error, .. } => warn!(%date, %error, "date failed"),
                SimulationOutcome::Skipped { .. } => info!(%date, "date skipped"),
                SimulationOutcome::Completed(_) => info!(%date, "date completed"),
            }
            summary.record(&outcome);
            sink.emit(StreamEvent::update(&outcome)).await;

            if index + 1 < total {
                tokio::time::sleep(self.config.timing.date_cooldown).await;
            }
        }

        self.teardown(&live).await
    }

    async fn simulate_date(
        &self,
        live: &mut LiveSession,
        credentials: &Credentials,
        pause: &MonitorPause,
        date: CalendarDate,
    ) -> SimulationOutcome {
        if !live.authenticated {
            match self.sessions.authenticate(&live.ops, credentials).await {
                Ok(_) => live.authenticated = true,
                Err(e) => return SimulationOutcome::failed(date, e.to_string()),
            }
        }

        let timing = &self.config.timing;
        let simulation =
            SimulationDriver::new(live.ops.clone(), self.sessions.clone(), &self.config.site, timing);
        let max_attempts = self.config.retry.max_date_attempts.max(1);
        let mut last_fault = String::new();

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                pause.pause_for(timing.reload_pause_window);
                if let Err(e) = live.driver.reload().await {
                    warn!(%date, error = %e, "reload before restart failed");
                }
            }

            let (fault_tx, mut fault_rx) = mpsc::channel(4);
            let monitors = MonitorHandle::spawn(
                live.driver.clone(),
                MonitorSettings::new(&self.config.site, timing),
                pause.clone(),
                fault_tx,
            );
            let result = tokio::select! {
                result = simulation.run(date) => result,
                Some(fault) = fault_rx.recv() => Err(SimulationError::transient(fault.to_string())),
            };
            monitors.stop();

            match result {
                Ok(outcome) => return outcome,
                Err(e) if e.is_transient() => {
                    warn!(%date, attempt, max_attempts, error = %e, "restarting date");
                    last_fault = e.to_string();
                }
                Err(e) => return SimulationOutcome::failed(date, e.to_string()),
            }
        }

        SimulationOutcome::failed(
            date,
            format!("restart budget exhausted after {max_attempts} attempts: {last_fault}"),
        )
    }

    async fn teardown(&self, live: &LiveSession) -> Result<()> {
        tokio::time::sleep(self.config.timing.teardown_pause).await;
        if let Err(e) = live.driver.clear_cookies().await {
            warn!(error = %e, "could not clear browser cookies");
        }
        if let Err(e) = self.sessions.clear().await {
            warn!(error = %e, "could not clear saved session");
        }
        live.driver
            .close()
            .await
            .context("could not close the browser session")?;
        info!("browser session torn down");
        Ok(())
    }
}
