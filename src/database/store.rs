//! Storage seam for the authorization core.
//!
//! Everything above this module talks to the backing store through these
//! interface-segregated traits. Two implementations ship: `PgAuthStore`
//! (sqlx/Postgres) and `MemoryAuthStore` (in-process tables for tests and
//! local development). Behavior must match across both except where a check
//! is inherently engine-specific (index inspection).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::models::{
    AccessDenialEvent, AssignedRole, Client, Permission, PermissionGrant, Project, Role,
    ScopedResource, Session, User,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("store connection failed: {0}")]
    Connection(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error("store error: {0}")]
    Internal(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// True when the error is a unique-constraint violation. Seed paths
    /// treat these as successful no-ops.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            StoreError::Conflict(_) => true,
            StoreError::Sqlx(sqlx::Error::Database(db)) => {
                db.code().as_deref() == Some("23505")
            }
            _ => false,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Insert payload for a user row. The id is allocated by the store.
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub email: &'a str,
    pub password_hash: &'a str,
    pub display_name: &'a str,
    pub role: Option<&'a str>,
    pub client_id: Option<i64>,
}

/// Insert payload for a permission row.
#[derive(Debug, Clone)]
pub struct NewPermission<'a> {
    pub name: &'a str,
    pub resource: &'a str,
    pub action: &'a str,
    pub category: &'a str,
    pub description: Option<&'a str>,
}

/// Insert payload for a tenant-scoped row. Scope columns are optional so the
/// integrity fixtures can plant the broken rows the auditor looks for;
/// request handlers always pass the validated path scope.
#[derive(Debug, Clone)]
pub struct NewResource<'a> {
    pub client_id: Option<i64>,
    pub project_id: Option<i64>,
    pub kind: &'a str,
    pub logical_key: &'a str,
    pub payload: serde_json::Value,
    pub created_by: Option<Uuid>,
}

/// One group of rows sharing a `(client_id, project_id, kind, logical_key)`
/// that should be unique.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DuplicateKeyGroup {
    pub client_id: Option<i64>,
    pub project_id: Option<i64>,
    pub kind: String,
    pub logical_key: String,
    pub occurrences: i64,
}

/// Users and sessions.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn insert_user(&self, user: NewUser<'_>) -> StoreResult<User>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn set_user_active(&self, id: Uuid, active: bool) -> StoreResult<bool>;
    async fn list_users(&self) -> StoreResult<Vec<User>>;

    async fn insert_session(&self, session: &Session) -> StoreResult<()>;
    async fn find_session_by_digest(&self, digest: &str) -> StoreResult<Option<Session>>;
    async fn revoke_session(&self, id: Uuid) -> StoreResult<bool>;
}

/// Roles, permissions, and role-permission grants.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Insert-if-absent keyed on the unique role name; returns the stored
    /// row either way.
    async fn upsert_role(
        &self,
        name: &str,
        description: Option<&str>,
        is_system: bool,
    ) -> StoreResult<Role>;

    /// Plain insert; duplicate names surface as `Conflict`.
    async fn insert_role(&self, name: &str, description: Option<&str>) -> StoreResult<Role>;

    /// Remove a role and its grant/assignment edges.
    async fn delete_role(&self, id: i64) -> StoreResult<bool>;

    async fn role_by_name(&self, name: &str) -> StoreResult<Option<Role>>;
    async fn role_by_id(&self, id: i64) -> StoreResult<Option<Role>>;
    async fn list_roles(&self) -> StoreResult<Vec<Role>>;

    /// Insert-if-absent keyed on the unique permission name.
    async fn upsert_permission(&self, permission: NewPermission<'_>) -> StoreResult<Permission>;
    async fn permission_by_name(&self, name: &str) -> StoreResult<Option<Permission>>;
    async fn permission_by_id(&self, id: i64) -> StoreResult<Option<Permission>>;
    /// Ordered by `(category, name)` for stable display.
    async fn list_permissions(&self) -> StoreResult<Vec<Permission>>;

    /// Upsert on `(role_id, permission_id)`, overwriting `granted`.
    async fn set_role_permission(
        &self,
        role_id: i64,
        permission_id: i64,
        granted: bool,
    ) -> StoreResult<()>;

    /// Ensure a `granted = true` edge from the role to every permission in
    /// the catalog. Returns the number of rows written or flipped.
    async fn grant_all_to_role(&self, role_id: i64) -> StoreResult<u64>;

    /// Left-join view: every catalog permission with this role's grant state.
    async fn role_grants(&self, role_id: i64) -> StoreResult<Vec<PermissionGrant>>;
}

/// user_roles edges and the two predicates guards are built from.
#[async_trait]
pub trait AssignmentStore: Send + Sync {
    /// Idempotent insert; returns whether a row was created.
    async fn insert_user_role(
        &self,
        user_id: Uuid,
        role_id: i64,
        assigned_by: Option<Uuid>,
    ) -> StoreResult<bool>;

    /// Returns whether a row was removed.
    async fn delete_user_role(&self, user_id: Uuid, role_id: i64) -> StoreResult<bool>;

    async fn roles_for_user(&self, user_id: Uuid) -> StoreResult<Vec<AssignedRole>>;
    async fn user_has_role(&self, user_id: Uuid, role_name: &str) -> StoreResult<bool>;

    /// True iff some held role carries a `granted = true` edge to the named
    /// permission. Unions across all held roles.
    async fn user_has_permission(&self, user_id: Uuid, permission_name: &str)
        -> StoreResult<bool>;
}

/// Clients, projects, memberships, tenant-scoped rows, and the integrity
/// scan queries over them.
#[async_trait]
pub trait TenancyStore: Send + Sync {
    async fn insert_client(&self, name: &str) -> StoreResult<Client>;
    async fn client_by_id(&self, id: i64) -> StoreResult<Option<Client>>;
    async fn list_clients(&self) -> StoreResult<Vec<Client>>;

    async fn insert_project(&self, client_id: i64, name: &str) -> StoreResult<Project>;
    async fn project_by_id(&self, id: i64) -> StoreResult<Option<Project>>;
    async fn list_projects(&self, client_id: i64) -> StoreResult<Vec<Project>>;

    async fn insert_membership(&self, user_id: Uuid, project_id: i64) -> StoreResult<bool>;
    async fn user_is_member(&self, user_id: Uuid, project_id: i64) -> StoreResult<bool>;

    async fn insert_resource(&self, resource: NewResource<'_>) -> StoreResult<ScopedResource>;
    async fn resource_by_id(&self, id: i64) -> StoreResult<Option<ScopedResource>>;
    async fn list_resources(
        &self,
        client_id: i64,
        project_id: i64,
        kind: Option<&str>,
    ) -> StoreResult<Vec<ScopedResource>>;
    async fn delete_resource(&self, id: i64) -> StoreResult<bool>;

    /// Exact-scope count for the isolation probe.
    async fn count_resources_in_scope(
        &self,
        kind: &str,
        logical_key: &str,
        client_id: i64,
        project_id: i64,
    ) -> StoreResult<i64>;

    /// Unconditional probe cleanup, regardless of what scope the rows ended
    /// up under.
    async fn delete_resources_by_key(&self, kind: &str, logical_key: &str) -> StoreResult<u64>;

    // Integrity scan queries.

    /// Rows with a null client_id or project_id.
    async fn count_resources_missing_scope(&self) -> StoreResult<i64>;

    /// Rows whose project does not exist or belongs to a different client.
    async fn count_scope_fk_mismatches(&self) -> StoreResult<i64>;

    /// Groups of rows violating per-scope `(kind, logical_key)` uniqueness.
    async fn duplicate_scoped_keys(&self) -> StoreResult<Vec<DuplicateKeyGroup>>;

    /// Row ids appearing under more than one client. Impossible under the
    /// current primary-key design; kept as a tripwire for migration damage.
    async fn count_cross_tenant_id_collisions(&self) -> StoreResult<i64>;

    /// Active non-administrative users holding zero project memberships.
    async fn count_active_users_without_membership(&self) -> StoreResult<i64>;

    /// Hot tenant-scoped tables lacking a `(client_id, project_id)` index.
    /// Engine-specific; the memory store reports none missing.
    async fn tables_missing_scope_index(&self) -> StoreResult<Vec<String>>;
}

/// Denial log.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn record_denial(
        &self,
        actor_id: Option<Uuid>,
        resource: &str,
        reason: &str,
    ) -> StoreResult<()>;

    async fn count_denials_since(&self, cutoff: DateTime<Utc>) -> StoreResult<i64>;
    async fn recent_denials(&self, limit: i64) -> StoreResult<Vec<AccessDenialEvent>>;
}

/// The full store surface the service layer is built against.
#[async_trait]
pub trait AuthStore:
    CredentialStore + CatalogStore + AssignmentStore + TenancyStore + AuditStore
{
    /// Liveness probe for the health endpoint.
    async fn ping(&self) -> StoreResult<()>;
}
