//! HTTP file browser and status API
//!
//! - GET /health - Health check
//! - GET /status - Pipeline state, offset and counters
//! - GET /recordings - List stored events
//! - GET /recordings/:name - Download one WAV file
//! - DELETE /recordings/:name - Delete one WAV file

mod handlers;
mod routes;
mod state;

pub use handlers::StatusResponse;
pub use routes::{bind_listener, create_router};
pub use state::AppState;
