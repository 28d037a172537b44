use crate::calendar::{expand_range, CalendarDate};
use crate::error::ValidationError;
use serde::Deserialize;

/// Inbound run request as it arrives on the wire. Every field is optional so
/// that a missing field becomes a validation event rather than a rejection.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
}

/// A request that passed validation.
#[derive(Clone)]
pub struct SimulationRequest {
    pub phone_number: String,
    pub password: String,
    pub start_date: String,
    pub end_date: String,
}

impl std::fmt::Debug for SimulationRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationRequest")
            .field("phone_number", &self.phone_number)
            .field("password", &"[REDACTED]")
            .field("start_date", &self.start_date)
            .field("end_date", &self.end_date)
            .finish()
    }
}

fn required(field: Option<String>) -> Result<String, ValidationError> {
    field
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or(ValidationError::MissingFields)
}

impl RunRequest {
    /// Checks that every field is present and non-blank.
    ///
    /// # Errors
    /// Returns [`ValidationError::MissingFields`] if any field is absent.
    pub fn validate(self) -> Result<SimulationRequest, ValidationError> {
        Ok(SimulationRequest {
            phone_number: required(self.phone_number)?,
            password: required(self.password)?,
            start_date: required(self.start_date)?,
            end_date: required(self.end_date)?,
        })
    }
}

impl SimulationRequest {
    /// Expands the requested range.
    ///
    /// # Errors
    /// Returns [`ValidationError::EmptyRange`] if no date survives expansion.
    pub fn dates(&self) -> Result<Vec<CalendarDate>, ValidationError> {
        let dates = expand_range(&self.start_date, &self.end_date);
        if dates.is_empty() {
            return Err(ValidationError::EmptyRange {
                start: self.start_date.clone(),
                end: self.end_date.clone(),
            });
        }
        Ok(dates)
    }
}
