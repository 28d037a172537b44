//! Per-date simulation outcomes and the textual report shipped to clients.

use crate::calendar::CalendarDate;
use crate::clock::SimClock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

const NOT_AVAILABLE: &str = "N/A";

/// PnL value observed at a fixed clock checkpoint, if the loop saw it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PnlCheckpoint {
    pub at: SimClock,
    pub pnl_pct: Option<Decimal>,
}

/// An extremum of the PnL series and when it was first seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PnlExtreme {
    pub pnl_pct: Decimal,
    pub at: SimClock,
}

/// Everything captured during one completed simulated session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationReport {
    pub date: CalendarDate,
    pub entry_time: SimClock,
    pub margin_estimate: Option<String>,
    pub straddle_premium: Decimal,
    pub call_entry_ltp: Option<Decimal>,
    pub put_entry_ltp: Option<Decimal>,
    pub checkpoints: Vec<PnlCheckpoint>,
    pub max_pnl: Option<PnlExtreme>,
    pub min_pnl: Option<PnlExtreme>,
}

fn or_na<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| NOT_AVAILABLE.to_string(), |v| v.to_string())
}

fn extreme(value: Option<&PnlExtreme>) -> String {
    value.map_or_else(
        || NOT_AVAILABLE.to_string(),
        |e| format!("{}% at {}", e.pnl_pct, e.at),
    )
}

impl SimulationReport {
    /// Fixed multi-line summary used as the `result` of a successful update.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Simulation for {}", self.date);
        let _ = writeln!(out, "Margin: {}", or_na(self.margin_estimate.as_deref()));
        let _ = writeln!(out, "Straddle premium: {}", self.straddle_premium);
        let _ = writeln!(out, "Call LTP @ {}: {}", self.entry_time, or_na(self.call_entry_ltp));
        let _ = writeln!(out, "Put LTP @ {}: {}", self.entry_time, or_na(self.put_entry_ltp));
        for checkpoint in &self.checkpoints {
            let value = checkpoint
                .pnl_pct
                .map_or_else(|| NOT_AVAILABLE.to_string(), |v| format!("{v}%"));
            let _ = writeln!(out, "PnL @ {}: {}", checkpoint.at, value);
        }
        let _ = writeln!(out, "Max PnL: {}", extreme(self.max_pnl.as_ref()));
        let _ = write!(out, "Min PnL: {}", extreme(self.min_pnl.as_ref()));
        out
    }
}

/// Exactly one of these is produced for every date of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimulationOutcome {
    Completed(SimulationReport),
    /// The remote calendar would not let the day be selected.
    Skipped { date: CalendarDate, reason: String },
    Failed { date: CalendarDate, error: String },
}

impl SimulationOutcome {
    pub fn skipped(date: CalendarDate, reason: impl Into<String>) -> Self {
        Self::Skipped {
            date,
            reason: reason.into(),
        }
    }

    pub fn failed(date: CalendarDate, error: impl Into<String>) -> Self {
        Self::Failed {
            date,
            error: error.into(),
        }
    }

    #[must_use]
    pub fn date(&self) -> CalendarDate {
        match self {
            Self::Completed(report) => report.date,
            Self::Skipped { date, .. } | Self::Failed { date, .. } => *date,
        }
    }

    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Text shown to the client for this date.
    #[must_use]
    pub fn result_text(&self) -> String {
        match self {
            Self::Completed(report) => report.render(),
            Self::Skipped { reason, .. } => reason.clone(),
            Self::Failed { date, error } => format!("--- Failed simulation for {date}: {error} ---"),
        }
    }
}
