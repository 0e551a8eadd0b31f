pub mod audit;
pub mod permission;
pub mod role;
pub mod session;
pub mod tenant;
pub mod user;

pub use audit::AccessDenialEvent;
pub use permission::{Permission, PermissionGrant, RolePermission};
pub use role::{AssignedRole, Role, UserRole};
pub use session::Session;
pub use tenant::{Client, Project, ProjectMembership, ScopedResource};
pub use user::User;
