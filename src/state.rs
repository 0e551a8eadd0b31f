use std::sync::Arc;

use crate::database::SharedStore;
use crate::services::{AssignmentService, CatalogService, IntegrityService};

/// Shared application context, injected as a request extension so both
/// handlers and guard middlewares can reach it.
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub catalog: Arc<CatalogService>,
    pub assignments: Arc<AssignmentService>,
    pub integrity: Arc<IntegrityService>,
}

impl AppState {
    pub fn new(store: SharedStore) -> Self {
        Self {
            catalog: Arc::new(CatalogService::new(store.clone())),
            assignments: Arc::new(AssignmentService::new(store.clone())),
            integrity: Arc::new(IntegrityService::new(store.clone())),
            store,
        }
    }
}
