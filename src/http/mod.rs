//! HTTP API for controlling the recorder
//!
//! - POST /api/start - Start a recording
//! - POST /api/stop - Stop and export; responds when the file is written
//! - GET /api/status - Recording state and frame count
//! - GET /api/settings - Most recently applied settings
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use handlers::ErrorResponse;
pub use routes::create_router;
pub use state::AppState;
