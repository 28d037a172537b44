pub mod coordinator;
pub mod events;
pub mod sink;

pub use coordinator::{RunCoordinator, RunSummary};
pub use events::{StreamEvent, UpdateStatus};
pub use sink::EventSink;
