pub mod audit;
pub mod auth;
pub mod guards;
pub mod response;
pub mod scope;

pub use audit::emit_denial;
pub use auth::{authenticate, AuthUser};
pub use guards::{
    require_all_permissions, require_any_permission, require_permission, require_super_admin,
    require_super_admin_or_role_in, SuperAdminContext,
};
pub use response::{ApiResponse, ApiResult};
pub use scope::{assert_row_in_scope, validate_scope, ScopeViolation, ValidatedScope};
