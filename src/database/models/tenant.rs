use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Top-level tenant. Every scoped row hangs off a client.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Client {
    pub id: i64,
    pub name: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Project {
    pub id: i64,
    pub client_id: i64,
    pub name: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Grants a tenant-bound user access to one project.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProjectMembership {
    pub user_id: Uuid,
    pub project_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Generic tenant-scoped row. Stands in for every per-tenant domain table;
/// `kind` names the table it would be, `logical_key` is unique per scope.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ScopedResource {
    pub id: i64,
    /// Scope columns are nullable so the integrity auditor can surface
    /// orphaned rows instead of the database rejecting them.
    pub client_id: Option<i64>,
    pub project_id: Option<i64>,
    pub kind: String,
    pub logical_key: String,
    pub payload: serde_json::Value,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
