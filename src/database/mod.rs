pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;

pub use memory::MemoryAuthStore;
pub use postgres::PgAuthStore;
pub use store::{AuthStore, StoreError};

use std::sync::Arc;

/// The handle everything above the storage seam is written against.
pub type SharedStore = Arc<dyn AuthStore>;
