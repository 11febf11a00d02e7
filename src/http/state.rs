//! Application state for the HTTP server.

use std::sync::Arc;

use crate::orchestrator::{SearchError, SearchOrchestrator};
use crate::provider::HotelsProvider;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    providers: Arc<[Arc<dyn HotelsProvider>]>,
    max_in_flight: Option<usize>,
}

impl AppState {
    pub fn new(providers: Vec<Arc<dyn HotelsProvider>>, max_in_flight: Option<usize>) -> Self {
        Self {
            providers: providers.into(),
            max_in_flight,
        }
    }

    /// Builds the per-request fan-out over the configured providers.
    pub fn orchestrator(&self) -> Result<SearchOrchestrator, SearchError> {
        SearchOrchestrator::new(self.providers.to_vec())
            .map(|orchestrator| orchestrator.with_max_in_flight(self.max_in_flight))
    }
}
