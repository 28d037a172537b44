//! Error types for the remote UI boundary.

use thiserror::Error;

/// Errors raised by a [`RemoteUiDriver`](crate::traits::RemoteUiDriver).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// The target control is not in the document.
    #[error("locator not found: {0}")]
    LocatorNotFound(String),

    /// A bounded wait elapsed.
    #[error("timed out: {0}")]
    Timeout(String),

    /// The in-page script failed or returned something unusable.
    #[error("script error: {0}")]
    Script(String),

    /// The browser session itself failed (connection lost, closed, refused).
    #[error("session error: {0}")]
    Session(String),
}

impl DriverError {
    pub fn not_found(locator: impl Into<String>) -> Self {
        Self::LocatorNotFound(locator.into())
    }

    pub fn timeout(what: impl Into<String>) -> Self {
        Self::Timeout(what.into())
    }

    /// Returns true if the document simply lacks the control.
    #[must_use]
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::LocatorNotFound(_))
    }
}

/// Result type alias for driver operations.
pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// Request validation failures. These end the stream before any work starts.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Phone number, password, start date, and end date are required.")]
    MissingFields,

    #[error("No valid dates found in the specified range or invalid date format.")]
    EmptyRange { start: String, end: String },
}

impl ValidationError {
    /// Extra context shipped alongside the message in the `error` event.
    #[must_use]
    pub fn details(&self) -> Option<String> {
        match self {
            Self::MissingFields => None,
            Self::EmptyRange { start, end } => Some(format!("Start: {start}, End: {end}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_error_display() {
        let err = DriverError::not_found("#login");
        assert!(err.is_missing());
        assert!(err.to_string().contains("#login"));
        assert!(!DriverError::timeout("ready marker").is_missing());
    }

    #[test]
    fn test_empty_range_details() {
        let err = ValidationError::EmptyRange {
            start: "2024-03-02".to_string(),
            end: "2024-03-01".to_string(),
        };
        assert_eq!(err.details().as_deref(), Some("Start: 2024-03-02, End: 2024-03-01"));
        assert!(ValidationError::MissingFields.details().is_none());
    }
}
