pub mod assignment;
pub mod catalog;
pub mod integrity;

pub use assignment::{AssignmentOutcome, AssignmentService};
pub use catalog::{CatalogError, CatalogService, GrantBuckets};
pub use integrity::{
    CheckResult, HealthStatus, IntegrityReport, IntegrityService, IsolationReport, Verdict,
};
