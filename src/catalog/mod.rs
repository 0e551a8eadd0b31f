pub mod seed;

pub use seed::{
    derive_resource_action, PermissionDef, RoleDef, ADMINISTRATIVE_ROLES, PERMISSIONS,
    SUPER_ADMIN, SYSTEM_ROLES,
};
