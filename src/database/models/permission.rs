use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Permission {
    pub id: i64,
    /// Dotted or single-word permission name, e.g. `users.create`.
    pub name: String,
    pub resource: String,
    pub action: String,
    pub category: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One role_permissions edge. `granted = false` reads the same as no row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RolePermission {
    pub role_id: i64,
    pub permission_id: i64,
    pub granted: bool,
}

/// Grants-view row for one role: every catalog permission tagged with
/// whether the role currently holds it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PermissionGrant {
    pub permission_id: i64,
    pub name: String,
    pub category: String,
    pub description: Option<String>,
    pub granted: bool,
}
