use serde::{Deserialize, Serialize};
use simdrive_core::{SimulationOutcome, ValidationError};

/// Outcome class of an `update` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateStatus {
    Success,
    Error,
}

/// Typed progress event of one run.
///
/// A run emits `Start` before any `Update`, and ends with exactly one of
/// `Complete` or `Error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum StreamEvent {
    Start {
        message: String,
    },
    Update {
        date: String,
        status: UpdateStatus,
        result: String,
    },
    Progress {
        message: String,
    },
    Complete {
        message: String,
    },
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<String>,
    },
}

impl StreamEvent {
    #[must_use]
    pub fn start(date_count: usize) -> Self {
        Self::Start {
            message: format!("Starting simulation for {date_count} dates."),
        }
    }

    pub fn progress(message: impl Into<String>) -> Self {
        Self::Progress {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn complete() -> Self {
        Self::Complete {
            message: "All simulations completed.".to_string(),
        }
    }

    pub fn error(message: impl Into<String>, details: Option<String>) -> Self {
        Self::Error {
            message: message.into(),
            details,
        }
    }

    /// Skipped dates count as successes; only failures are errors.
    #[must_use]
    pub fn update(outcome: &SimulationOutcome) -> Self {
        let status = if outcome.is_failure() {
            UpdateStatus::Error
        } else {
            UpdateStatus::Success
        };
        Self::Update {
            date: outcome.date().to_string(),
            status,
            result: outcome.result_text(),
        }
    }

    /// SSE event name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::Update { .. } => "update",
            Self::Progress { .. } => "progress",
            Self::Complete { .. } => "complete",
            Self::Error { .. } => "error",
        }
    }

    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Error { .. })
    }

    /// JSON payload of the `data:` line.
    ///
    /// # Errors
    /// Returns an error if the payload cannot be serialized.
    pub fn data(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// The complete `event:`/`data:` frame, terminated by a blank line.
    ///
    /// # Errors
    /// Returns an error if the payload cannot be serialized.
    pub fn to_frame(&self) -> serde_json::Result<String> {
        Ok(format!("event: {}\ndata: {}\n\n", self.name(), self.data()?))
    }
}

impl From<&ValidationError> for StreamEvent {
    fn from(err: &ValidationError) -> Self {
        Self::error(err.to_string(), err.details())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simdrive_core::CalendarDate;

    #[test]
    fn test_start_frame() {
        let frame = StreamEvent::start(3).to_frame().unwrap();
        assert_eq!(
            frame,
            "event: start\ndata: {\"message\":\"Starting simulation for 3 dates.\"}\n\n"
        );
    }

    #[test]
    fn test_error_details_are_optional() {
        let missing = StreamEvent::from(&ValidationError::MissingFields);
        assert_eq!(
            missing.data().unwrap(),
            "{\"message\":\"Phone number, password, start date, and end date are required.\"}"
        );

        let empty = StreamEvent::from(&ValidationError::EmptyRange {
            start: "2024-03-02".to_string(),
            end: "2024-03-01".to_string(),
        });
        let data: serde_json::Value = serde_json::from_str(&empty.data().unwrap()).unwrap();
        assert_eq!(data["details"], "Start: 2024-03-02, End: 2024-03-01");
        assert!(empty.is_terminal());
    }

    #[test]
    fn test_update_status_per_outcome() {
        let date = CalendarDate::new(2024, 1, 2).unwrap();

        let skipped = StreamEvent::update(&SimulationOutcome::skipped(date, "disabled"));
        let data: serde_json::Value = serde_json::from_str(&skipped.data().unwrap()).unwrap();
        assert_eq!(data["status"], "success");
        assert_eq!(data["date"], "02-01-2024");

        let failed = StreamEvent::update(&SimulationOutcome::failed(date, "boom"));
        let data: serde_json::Value = serde_json::from_str(&failed.data().unwrap()).unwrap();
        assert_eq!(data["status"], "error");
        assert_eq!(data["result"], "--- Failed simulation for 02-01-2024: boom ---");
        assert!(!failed.is_terminal());
    }
}
