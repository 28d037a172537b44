//! Drives one trading day through the remote simulator.
//!
//! Layers, bottom-up: [`SafeOps`] turns every remote interaction into a
//! `bool`/`Option`; [`SimulatorPage`] names the screen's controls;
//! [`SimulationDriver`] is the per-date state machine. [`SessionManager`]
//! and [`MonitorHandle`] are used by the run coordinator around it.

pub mod error;
pub mod monitor;
pub mod page;
pub mod pause;
pub mod safe_ops;
pub mod scripts;
pub mod session;
pub mod simulation;
pub mod strategy;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use error::{SessionError, SimulationError};
pub use monitor::{MonitorFault, MonitorHandle, MonitorSettings};
pub use page::SimulatorPage;
pub use pause::MonitorPause;
pub use safe_ops::SafeOps;
pub use session::{
    Credentials, FileSessionStore, MemorySessionStore, SessionManager, SessionStore, SessionToken,
};
pub use simulation::SimulationDriver;
pub use strategy::{Leg, LegSlots, PnlTracker};
