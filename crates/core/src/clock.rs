use serde::{Deserialize, Serialize};
use std::fmt;

/// Time of day on the remote simulator's session clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SimClock {
    pub hour: u32,
    pub minute: u32,
}

impl SimClock {
    #[must_use]
    pub const fn new(hour: u32, minute: u32) -> Self {
        Self { hour, minute }
    }

    /// Moves the clock forward, carrying minutes into hours.
    #[must_use]
    pub const fn advance(self, minutes: u32) -> Self {
        let total = self.hour * 60 + self.minute + minutes;
        Self {
            hour: total / 60,
            minute: total % 60,
        }
    }
}

impl fmt::Display for SimClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}
