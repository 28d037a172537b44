//! The fixed short-straddle rule driven through the simulator.
//!
//! Sell the ATM call and put at 09:17, then step the session clock from 09:20
//! until 15:00. Whenever one leg's price runs past twice the other's, the cheap
//! leg is closed and re-opened at the current ATM strike.

use rust_decimal::Decimal;
use simdrive_core::{PnlCheckpoint, PnlExtreme, SimClock};
use std::fmt;

pub const ENTRY_TIME: SimClock = SimClock::new(9, 17);
pub const LOOP_START: SimClock = SimClock::new(9, 20);
pub const EXIT_TIME: SimClock = SimClock::new(15, 0);
pub const PNL_CHECKPOINTS: [SimClock; 3] = [
    SimClock::new(14, 0),
    SimClock::new(14, 30),
    SimClock::new(15, 0),
];

/// Minutes the clock advances when nothing needs adjusting.
pub const POLL_STEP: u32 = 1;
/// Minutes the clock advances after an imbalance was handled.
pub const REBALANCE_STEP: u32 = 5;
pub const IMBALANCE_RATIO: Decimal = Decimal::TWO;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Leg {
    Call,
    Put,
}

impl Leg {
    #[must_use]
    pub fn other(self) -> Self {
        match self {
            Self::Call => Self::Put,
            Self::Put => Self::Call,
        }
    }
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Call => write!(f, "CE"),
            Self::Put => write!(f, "PE"),
        }
    }
}

/// Rows the two open legs occupy in the simulator's position table.
///
/// A freshly opened position is appended last, so re-opening one leg moves it
/// to row 3 and the surviving leg to row 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegSlots {
    pub call: u8,
    pub put: u8,
}

impl Default for LegSlots {
    fn default() -> Self {
        Self { call: 2, put: 3 }
    }
}

impl LegSlots {
    #[must_use]
    pub fn slot(self, leg: Leg) -> u8 {
        match leg {
            Leg::Call => self.call,
            Leg::Put => self.put,
        }
    }

    #[must_use]
    pub fn after_reopen(self, leg: Leg) -> Self {
        match leg {
            Leg::Call => Self { call: 3, put: 2 },
            Leg::Put => Self { call: 2, put: 3 },
        }
    }
}

/// A breach of the imbalance ratio between the two legs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Imbalance {
    pub richer: Leg,
    pub cheaper: Leg,
}

/// Returns the breach, if one leg trades above twice the other.
#[must_use]
pub fn imbalance(call_ltp: Decimal, put_ltp: Decimal) -> Option<Imbalance> {
    let richer = if call_ltp > put_ltp * IMBALANCE_RATIO {
        Leg::Call
    } else if put_ltp > call_ltp * IMBALANCE_RATIO {
        Leg::Put
    } else {
        return None;
    };
    Some(Imbalance {
        richer,
        cheaper: richer.other(),
    })
}

#[must_use]
pub fn straddle_premium(call_ltp: Decimal, put_ltp: Decimal) -> Decimal {
    call_ltp + put_ltp
}

/// Running PnL statistics for one date.
#[derive(Debug, Clone, Default)]
pub struct PnlTracker {
    max: Option<PnlExtreme>,
    min: Option<PnlExtreme>,
    checkpoints: Vec<(SimClock, Decimal)>,
}

impl PnlTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, at: SimClock, pnl_pct: Decimal) {
        if self.max.map_or(true, |m| pnl_pct > m.pnl_pct) {
            self.max = Some(PnlExtreme { pnl_pct, at });
        }
        if self.min.map_or(true, |m| pnl_pct < m.pnl_pct) {
            self.min = Some(PnlExtreme { pnl_pct, at });
        }
        if PNL_CHECKPOINTS.contains(&at) && !self.checkpoints.iter().any(|(c, _)| *c == at) {
            self.checkpoints.push((at, pnl_pct));
        }
    }

    #[must_use]
    pub fn max(&self) -> Option<PnlExtreme> {
        self.max
    }

    #[must_use]
    pub fn min(&self) -> Option<PnlExtreme> {
        self.min
    }

    /// One entry per fixed checkpoint, `None` where the clock never landed on it.
    #[must_use]
    pub fn checkpoints(&self) -> Vec<PnlCheckpoint> {
        PNL_CHECKPOINTS
            .iter()
            .map(|at| PnlCheckpoint {
                at: *at,
                pnl_pct: self
                    .checkpoints
                    .iter()
                    .find(|(c, _)| c == at)
                    .map(|(_, v)| *v),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_extrema_keep_first_occurrence() {
        let mut tracker = PnlTracker::new();
        tracker.observe(SimClock::new(9, 20), dec!(1.5));
        tracker.observe(SimClock::new(9, 21), dec!(-0.5));
        tracker.observe(SimClock::new(9, 22), dec!(1.5));
        tracker.observe(SimClock::new(9, 23), dec!(-0.5));

        assert_eq!(tracker.max().unwrap().at, SimClock::new(9, 20));
        assert_eq!(tracker.min().unwrap().at, SimClock::new(9, 21));
    }

    #[test]
    fn test_checkpoints_only_on_exact_match() {
        let mut tracker = PnlTracker::new();
        tracker.observe(SimClock::new(13, 59), dec!(0.1));
        tracker.observe(SimClock::new(14, 0), dec!(0.2));
        tracker.observe(SimClock::new(14, 29), dec!(0.3));
        tracker.observe(SimClock::new(14, 31), dec!(0.4));

        let checkpoints = tracker.checkpoints();
        assert_eq!(checkpoints.len(), 3);
        assert_eq!(checkpoints[0].pnl_pct, Some(dec!(0.2)));
        assert_eq!(checkpoints[1].pnl_pct, None);
        assert_eq!(checkpoints[2].pnl_pct, None);
    }

    #[test]
    fn test_imbalance_needs_strictly_more_than_double() {
        assert_eq!(imbalance(dec!(100), dec!(50)), None);
        assert_eq!(
            imbalance(dec!(100.5), dec!(50)),
            Some(Imbalance { richer: Leg::Call, cheaper: Leg::Put })
        );
        assert_eq!(
            imbalance(dec!(20), dec!(41)),
            Some(Imbalance { richer: Leg::Put, cheaper: Leg::Call })
        );
    }

    #[test]
    fn test_reopened_leg_moves_to_last_row() {
        let slots = LegSlots::default();
        assert_eq!(slots.slot(Leg::Call), 2);
        let slots = slots.after_reopen(Leg::Call);
        assert_eq!((slots.call, slots.put), (3, 2));
        let slots = slots.after_reopen(Leg::Put);
        assert_eq!((slots.call, slots.put), (2, 3));
    }

    #[test]
    fn test_leg_display() {
        assert_eq!(Leg::Call.to_string(), "CE");
        assert_eq!(Leg::Put.other(), Leg::Call);
    }
}
