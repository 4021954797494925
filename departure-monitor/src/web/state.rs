//! Application state for the web layer.

use std::sync::Arc;

use crate::coordinator::{RequestCoordinator, TimetableSource};
use crate::store::DepartureStore;

/// Shared application state.
pub struct AppState<S> {
    /// Coordinator owning the departure store
    pub coordinator: Arc<RequestCoordinator<S>>,
}

impl<S: TimetableSource> AppState<S> {
    /// Create a new app state.
    pub fn new(coordinator: Arc<RequestCoordinator<S>>) -> Self {
        Self { coordinator }
    }

    pub fn store(&self) -> &Arc<DepartureStore> {
        self.coordinator.store()
    }
}

// Derived Clone would require `S: Clone`.
impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            coordinator: Arc::clone(&self.coordinator),
        }
    }
}
