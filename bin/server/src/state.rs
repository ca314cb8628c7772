//! Server application state management

use drive::StorageService;
use std::sync::Arc;
use storage::ObjectStore;

/// Shared state handed to every request handler
pub struct AppState {
    pub storage: StorageService,
}

impl AppState {
    pub fn new(store: Arc<dyn ObjectStore>, workers: usize) -> Self {
        Self {
            storage: StorageService::new(store, workers),
        }
    }
}
