pub mod server;
pub mod sse;

pub use server::ApiServer;
pub use sse::AppState;
