//! Shared application state.

use std::sync::Arc;

use crate::auth::MemoryAuth;
use crate::executor::ExecutionBackend;
use crate::store::SessionStore;

/// Shared application state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SessionStore>,
    pub auth: Arc<MemoryAuth>,
    pub executor: Arc<dyn ExecutionBackend>,
}

impl AppState {
    pub fn new(executor: Arc<dyn ExecutionBackend>) -> Self {
        Self {
            store: Arc::new(SessionStore::new()),
            auth: Arc::new(MemoryAuth::new()),
            executor,
        }
    }
}
