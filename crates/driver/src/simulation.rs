//! Per-date simulation state machine.
//!
//! One call to [`SimulationDriver::run`] walks a single trading day from the
//! simulator landing page to a summarized report. Skips are outcomes; anything
//! that should restart the date comes back as [`SimulationError::Transient`].

use crate::error::SimulationError;
use crate::page::SimulatorPage;
use crate::safe_ops::SafeOps;
use crate::session::SessionManager;
use crate::strategy::{
    imbalance, straddle_premium, Imbalance, Leg, LegSlots, PnlTracker, ENTRY_TIME, EXIT_TIME,
    LOOP_START, POLL_STEP, REBALANCE_STEP,
};
use simdrive_core::{
    CalendarDate, Locator, SimClock, SimulationOutcome, SimulationReport, SiteLayout, TimingConfig,
};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Init,
    Authenticated,
    Navigated,
    DateSelected,
    InitialPositionsOpened,
    EntryLtpCaptured,
    PollLoop,
    Exiting,
    Summarized,
    Skipped,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::Authenticated => "authenticated",
            Self::Navigated => "navigated",
            Self::DateSelected => "date_selected",
            Self::InitialPositionsOpened => "initial_positions_opened",
            Self::EntryLtpCaptured => "entry_ltp_captured",
            Self::PollLoop => "poll_loop",
            Self::Exiting => "exiting",
            Self::Summarized => "summarized",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

fn enter(date: CalendarDate, phase: Phase) {
    info!(%date, %phase, "simulation phase");
}

/// Terminal phase of an attempt; a completed date already entered `Summarized`.
fn closing_phase(result: &Result<SimulationOutcome, SimulationError>) -> Option<Phase> {
    match result {
        Ok(SimulationOutcome::Completed(_)) => None,
        Ok(SimulationOutcome::Skipped { .. }) => Some(Phase::Skipped),
        Ok(SimulationOutcome::Failed { .. }) | Err(_) => Some(Phase::Failed),
    }
}

pub struct SimulationDriver {
    page: SimulatorPage,
    sessions: Arc<SessionManager>,
    simulator_url: String,
    ready_marker: Locator,
    ready_timeout: Duration,
    page_settle: Duration,
}

fn missing(what: &str, at: Option<SimClock>) -> SimulationError {
    match at {
        Some(clock) => SimulationError::transient(format!("{what} unavailable at {clock}")),
        None => SimulationError::transient(format!("{what} unavailable")),
    }
}

impl SimulationDriver {
    #[must_use]
    pub fn new(
        ops: SafeOps,
        sessions: Arc<SessionManager>,
        site: &SiteLayout,
        timing: &TimingConfig,
    ) -> Self {
        Self {
            page: SimulatorPage::new(ops, site.clone(), timing.clone()),
            sessions,
            simulator_url: site.simulator_url.clone(),
            ready_marker: Locator::css(&site.ready_marker),
            ready_timeout: timing.ready_timeout,
            page_settle: timing.page_settle,
        }
    }

    /// Runs one attempt at simulating `date`.
    ///
    /// # Errors
    ///
    /// [`SimulationError::Transient`] when a required reading or a post-entry
    /// action failed and the date should be restarted; any other variant when
    /// the date cannot be simulated in this run.
    pub async fn run(&self, date: CalendarDate) -> Result<SimulationOutcome, SimulationError> {
        enter(date, Phase::Init);
        let result = self.walk(date).await;
        if let Some(phase) = closing_phase(&result) {
            enter(date, phase);
        }
        result
    }

    async fn walk(&self, date: CalendarDate) -> Result<SimulationOutcome, SimulationError> {
        self.open_simulator(date).await?;
        enter(date, Phase::Navigated);

        if !self.page.select_date(date).await {
            return Ok(SimulationOutcome::skipped(
                date,
                format!("Skipped simulation for {date}: Date was disabled or could not be selected."),
            ));
        }
        enter(date, Phase::DateSelected);

        for leg in [Leg::Call, Leg::Put] {
            if !self.page.sell_atm(leg).await {
                warn!(%date, %leg, "initial ATM sell failed");
            }
        }
        enter(date, Phase::InitialPositionsOpened);

        if !self.page.set_clock(ENTRY_TIME).await {
            return Err(SimulationError::fatal(format!(
                "could not move the simulator clock to {ENTRY_TIME}"
            )));
        }
        for leg in [Leg::Call, Leg::Put] {
            if !self.page.atm_leg_active(leg).await && !self.page.sell_atm(leg).await {
                warn!(%date, %leg, "ATM leg still not open at entry");
            }
        }
        let margin_estimate = self.page.margin_estimate().await;
        let call_entry = self
            .page
            .leg_ltp(Leg::Call)
            .await
            .ok_or_else(|| missing("call LTP", Some(ENTRY_TIME)))?;
        let put_entry = self
            .page
            .leg_ltp(Leg::Put)
            .await
            .ok_or_else(|| missing("put LTP", Some(ENTRY_TIME)))?;
        info!(%date, %call_entry, %put_entry, margin = ?margin_estimate, "entry captured");
        enter(date, Phase::EntryLtpCaptured);

        if !self.page.set_clock(LOOP_START).await {
            return Err(SimulationError::transient(format!(
                "could not move the simulator clock to {LOOP_START}"
            )));
        }
        enter(date, Phase::PollLoop);
        let tracker = self.poll_until_exit(date).await?;
        enter(date, Phase::Summarized);

        Ok(SimulationOutcome::Completed(SimulationReport {
            date,
            entry_time: ENTRY_TIME,
            margin_estimate,
            straddle_premium: straddle_premium(call_entry, put_entry),
            call_entry_ltp: Some(call_entry),
            put_entry_ltp: Some(put_entry),
            checkpoints: tracker.checkpoints(),
            max_pnl: tracker.max(),
            min_pnl: tracker.min(),
        }))
    }

    async fn open_simulator(&self, date: CalendarDate) -> Result<(), SimulationError> {
        let driver = self.page.ops().driver();
        match self.sessions.restore().await {
            Ok(Some(token)) => match self.sessions.apply(driver.as_ref(), &token).await {
                Ok(()) => enter(date, Phase::Authenticated),
                Err(e) => warn!(error = %e, "could not apply saved session, continuing without it"),
            },
            Ok(None) => debug!("no saved session"),
            Err(e) => warn!(error = %e, "could not load saved session, continuing without it"),
        }

        driver.navigate(&self.simulator_url).await?;
        tokio::time::sleep(self.page_settle).await;
        self.page.ops().wait_for_idle().await;
        driver
            .wait_for(&self.ready_marker, self.ready_timeout)
            .await
            .map_err(|e| SimulationError::fatal(format!("simulator page did not load: {e}")))
    }

    async fn poll_until_exit(&self, date: CalendarDate) -> Result<PnlTracker, SimulationError> {
        let mut tracker = PnlTracker::new();
        let mut slots = LegSlots::default();
        let mut previous: Option<SimClock> = None;

        loop {
            let call = self
                .page
                .leg_ltp(Leg::Call)
                .await
                .ok_or_else(|| missing("call LTP", previous))?;
            let put = self
                .page
                .leg_ltp(Leg::Put)
                .await
                .ok_or_else(|| missing("put LTP", previous))?;
            let clock = self
                .page
                .clock()
                .await
                .ok_or_else(|| missing("simulator clock", previous))?;
            if previous.is_some_and(|p| clock <= p) {
                return Err(SimulationError::transient(format!(
                    "simulator clock stuck at {clock}"
                )));
            }
            let pnl = self
                .page
                .total_pnl()
                .await
                .ok_or_else(|| missing("total PnL", Some(clock)))?;
            tracker.observe(clock, pnl);
            debug!(%date, %clock, %call, %put, %pnl, "tick");

            let step = match imbalance(call, put) {
                Some(breach) => {
                    slots = self.rebalance(date, clock, breach, slots).await?;
                    REBALANCE_STEP
                }
                None => POLL_STEP,
            };

            if clock >= EXIT_TIME {
                enter(date, Phase::Exiting);
                if !self.page.exit_all().await {
                    return Err(SimulationError::transient(format!(
                        "could not exit positions at {clock}"
                    )));
                }
                return Ok(tracker);
            }

            let next = clock.advance(step);
            if !self.page.set_clock(next).await {
                return Err(SimulationError::transient(format!(
                    "could not advance the simulator clock to {next}"
                )));
            }
            previous = Some(clock);
        }
    }

    async fn rebalance(
        &self,
        date: CalendarDate,
        clock: SimClock,
        breach: Imbalance,
        slots: LegSlots,
    ) -> Result<LegSlots, SimulationError> {
        if self.page.atm_leg_active(breach.richer).await {
            debug!(%date, %clock, richer = %breach.richer, "richer leg already at ATM");
            return Ok(slots);
        }
        let cheaper = breach.cheaper;
        let slot = slots.slot(cheaper);
        if !self.page.exit_leg(slot).await {
            return Err(SimulationError::transient(format!(
                "could not exit {cheaper} leg in row {slot} at {clock}"
            )));
        }
        if !self.page.sell_atm(cheaper).await {
            return Err(SimulationError::transient(format!(
                "could not reopen {cheaper} leg at ATM at {clock}"
            )));
        }
        let slots = slots.after_reopen(cheaper);
        info!(%date, %clock, leg = %cheaper, call_slot = slots.call, put_slot = slots.put, "leg rolled to ATM");
        Ok(slots)
    }
}
