//! Application state.

use fetchbox_registry::FileRegistry;
use std::sync::Arc;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<FileRegistry>,
}

impl AppState {
    pub fn new(registry: FileRegistry) -> Self {
        Self { registry: Arc::new(registry) }
    }
}
