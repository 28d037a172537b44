pub mod calendar;
pub mod clock;
pub mod config;
pub mod config_loader;
pub mod error;
pub mod outcome;
pub mod request;
pub mod traits;

pub use calendar::{expand_range, CalendarDate};
pub use clock::SimClock;
pub use config::{
    AppConfig, BusyPolicy, RetryConfig, ServerConfig, SessionConfig, SiteLayout, TimingConfig,
    WebDriverConfig,
};
pub use config_loader::ConfigLoader;
pub use error::{DriverError, DriverResult, ValidationError};
pub use outcome::{PnlCheckpoint, PnlExtreme, SimulationOutcome, SimulationReport};
pub use request::{RunRequest, SimulationRequest};
pub use traits::{DriverFactory, Locator, RemoteUiDriver, SessionCookie};
