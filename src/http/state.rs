use crate::session::SessionOrchestrator;
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub recorder: Arc<SessionOrchestrator>,
}

impl AppState {
    pub fn new(recorder: SessionOrchestrator) -> Self {
        Self {
            recorder: Arc::new(recorder),
        }
    }
}
