//! Postgres-backed store.
//!
//! Runtime-bound queries only, so the crate builds without a live database.
//! Unique indexes enforce the catalog constraints; `ON CONFLICT DO NOTHING`
//! makes every seed path safe under concurrent startup.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::config::config;

use super::models::{
    AccessDenialEvent, AssignedRole, Client, Permission, PermissionGrant, Project, Role,
    ScopedResource, Session, User,
};
use super::store::{
    AssignmentStore, AuditStore, AuthStore, CatalogStore, CredentialStore, DuplicateKeyGroup,
    NewPermission, NewResource, NewUser, StoreError, StoreResult, TenancyStore,
};

/// Tenant-scoped tables that must carry a `(client_id, project_id)` index.
const HOT_SCOPED_TABLES: [&str; 1] = ["resources"];

const SCHEMA_DDL: [&str; 12] = [
    r#"CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        display_name TEXT NOT NULL,
        role TEXT,
        client_id BIGINT,
        active BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS roles (
        id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        description TEXT,
        is_system BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS permissions (
        id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        resource TEXT NOT NULL,
        action TEXT NOT NULL,
        category TEXT NOT NULL,
        description TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS role_permissions (
        role_id BIGINT NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
        permission_id BIGINT NOT NULL REFERENCES permissions(id) ON DELETE CASCADE,
        granted BOOLEAN NOT NULL DEFAULT TRUE,
        PRIMARY KEY (role_id, permission_id)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS user_roles (
        user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        role_id BIGINT NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
        assigned_by UUID,
        assigned_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        PRIMARY KEY (user_id, role_id)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS clients (
        id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL,
        active BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS projects (
        id BIGSERIAL PRIMARY KEY,
        client_id BIGINT NOT NULL REFERENCES clients(id),
        name TEXT NOT NULL,
        active BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS project_memberships (
        user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        project_id BIGINT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        PRIMARY KEY (user_id, project_id)
    )"#,
    // Scope columns stay nullable and unconstrained: the auditor exists to
    // find rows that arrived broken (migrations, manual edits), and the
    // isolation fixtures need to plant them.
    r#"CREATE TABLE IF NOT EXISTS resources (
        id BIGSERIAL PRIMARY KEY,
        client_id BIGINT,
        project_id BIGINT,
        kind TEXT NOT NULL,
        logical_key TEXT NOT NULL,
        payload JSONB NOT NULL DEFAULT '{}'::jsonb,
        created_by UUID,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE INDEX IF NOT EXISTS idx_resources_scope
        ON resources (client_id, project_id)"#,
    r#"CREATE TABLE IF NOT EXISTS sessions (
        id UUID PRIMARY KEY,
        user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        refresh_digest TEXT NOT NULL UNIQUE,
        roles_snapshot JSONB NOT NULL DEFAULT '[]'::jsonb,
        issued_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        expires_at TIMESTAMPTZ NOT NULL,
        revoked_at TIMESTAMPTZ
    )"#,
    r#"CREATE TABLE IF NOT EXISTS access_denials (
        id BIGSERIAL PRIMARY KEY,
        actor_id UUID,
        resource TEXT NOT NULL,
        reason TEXT NOT NULL,
        occurred_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
];

pub struct PgAuthStore {
    pool: PgPool,
}

impl PgAuthStore {
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let db = &config().database;
        let pool = PgPoolOptions::new()
            .max_connections(db.max_connections)
            .acquire_timeout(Duration::from_secs(db.connect_timeout_secs))
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create any missing tables and indexes. Safe to run on every startup.
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        for ddl in SCHEMA_DDL {
            sqlx::query(ddl).execute(&self.pool).await?;
        }
        tracing::debug!("schema ensured ({} statements)", SCHEMA_DDL.len());
        Ok(())
    }

    fn map_unique(err: sqlx::Error, what: &str) -> StoreError {
        match &err {
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                StoreError::Conflict(format!("{} already exists", what))
            }
            _ => StoreError::Sqlx(err),
        }
    }

    async fn require_role(&self, role_id: i64) -> StoreResult<()> {
        if self.role_by_id(role_id).await?.is_none() {
            return Err(StoreError::not_found("role", role_id));
        }
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for PgAuthStore {
    async fn insert_user(&self, user: NewUser<'_>) -> StoreResult<User> {
        sqlx::query_as::<_, User>(
            r#"INSERT INTO users (id, email, password_hash, display_name, role, client_id)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(user.email.to_lowercase())
        .bind(user.password_hash)
        .bind(user.display_name)
        .bind(user.role)
        .bind(user.client_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Self::map_unique(e, "user email"))
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
                .bind(email.to_lowercase())
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn set_user_active(&self, id: Uuid, active: bool) -> StoreResult<bool> {
        let result =
            sqlx::query("UPDATE users SET active = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(active)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY email")
            .fetch_all(&self.pool)
            .await?)
    }

    async fn insert_session(&self, session: &Session) -> StoreResult<()> {
        sqlx::query(
            r#"INSERT INTO sessions
               (id, user_id, refresh_digest, roles_snapshot, issued_at, expires_at, revoked_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
        )
        .bind(session.id)
        .bind(session.user_id)
        .bind(&session.refresh_digest)
        .bind(&session.roles_snapshot)
        .bind(session.issued_at)
        .bind(session.expires_at)
        .bind(session.revoked_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_session_by_digest(&self, digest: &str) -> StoreResult<Option<Session>> {
        Ok(
            sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE refresh_digest = $1")
                .bind(digest)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn revoke_session(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE sessions SET revoked_at = NOW() WHERE id = $1 AND revoked_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl CatalogStore for PgAuthStore {
    async fn upsert_role(
        &self,
        name: &str,
        description: Option<&str>,
        is_system: bool,
    ) -> StoreResult<Role> {
        let inserted = sqlx::query_as::<_, Role>(
            r#"INSERT INTO roles (name, description, is_system)
               VALUES ($1, $2, $3)
               ON CONFLICT (name) DO NOTHING
               RETURNING *"#,
        )
        .bind(name)
        .bind(description)
        .bind(is_system)
        .fetch_optional(&self.pool)
        .await?;
        if let Some(role) = inserted {
            return Ok(role);
        }
        // Lost the race (or the row predates this call); read the winner.
        self.role_by_name(name)
            .await?
            .ok_or_else(|| StoreError::Internal(format!("role '{}' vanished during upsert", name)))
    }

    async fn insert_role(&self, name: &str, description: Option<&str>) -> StoreResult<Role> {
        sqlx::query_as::<_, Role>(
            r#"INSERT INTO roles (name, description, is_system)
               VALUES ($1, $2, FALSE)
               RETURNING *"#,
        )
        .bind(name)
        .bind(description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Self::map_unique(e, "role name"))
    }

    async fn delete_role(&self, id: i64) -> StoreResult<bool> {
        // Edge rows go with it via ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn role_by_name(&self, name: &str) -> StoreResult<Option<Role>> {
        Ok(sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn role_by_id(&self, id: i64) -> StoreResult<Option<Role>> {
        Ok(sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_roles(&self) -> StoreResult<Vec<Role>> {
        Ok(sqlx::query_as::<_, Role>("SELECT * FROM roles ORDER BY name")
            .fetch_all(&self.pool)
            .await?)
    }

    async fn upsert_permission(&self, permission: NewPermission<'_>) -> StoreResult<Permission> {
        let inserted = sqlx::query_as::<_, Permission>(
            r#"INSERT INTO permissions (name, resource, action, category, description)
               VALUES ($1, $2, $3, $4, $5)
               ON CONFLICT (name) DO NOTHING
               RETURNING *"#,
        )
        .bind(permission.name)
        .bind(permission.resource)
        .bind(permission.action)
        .bind(permission.category)
        .bind(permission.description)
        .fetch_optional(&self.pool)
        .await?;
        if let Some(row) = inserted {
            return Ok(row);
        }
        self.permission_by_name(permission.name).await?.ok_or_else(|| {
            StoreError::Internal(format!(
                "permission '{}' vanished during upsert",
                permission.name
            ))
        })
    }

    async fn permission_by_name(&self, name: &str) -> StoreResult<Option<Permission>> {
        Ok(
            sqlx::query_as::<_, Permission>("SELECT * FROM permissions WHERE name = $1")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn permission_by_id(&self, id: i64) -> StoreResult<Option<Permission>> {
        Ok(
            sqlx::query_as::<_, Permission>("SELECT * FROM permissions WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn list_permissions(&self) -> StoreResult<Vec<Permission>> {
        Ok(sqlx::query_as::<_, Permission>(
            "SELECT * FROM permissions ORDER BY category, name",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn set_role_permission(
        &self,
        role_id: i64,
        permission_id: i64,
        granted: bool,
    ) -> StoreResult<()> {
        self.require_role(role_id).await?;
        if self.permission_by_id(permission_id).await?.is_none() {
            return Err(StoreError::not_found("permission", permission_id));
        }
        sqlx::query(
            r#"INSERT INTO role_permissions (role_id, permission_id, granted)
               VALUES ($1, $2, $3)
               ON CONFLICT (role_id, permission_id) DO UPDATE SET granted = EXCLUDED.granted"#,
        )
        .bind(role_id)
        .bind(permission_id)
        .bind(granted)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn grant_all_to_role(&self, role_id: i64) -> StoreResult<u64> {
        self.require_role(role_id).await?;
        let result = sqlx::query(
            r#"INSERT INTO role_permissions (role_id, permission_id, granted)
               SELECT $1, p.id, TRUE FROM permissions p
               ON CONFLICT (role_id, permission_id)
               DO UPDATE SET granted = TRUE WHERE role_permissions.granted = FALSE"#,
        )
        .bind(role_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn role_grants(&self, role_id: i64) -> StoreResult<Vec<PermissionGrant>> {
        self.require_role(role_id).await?;
        Ok(sqlx::query_as::<_, PermissionGrant>(
            r#"SELECT p.id AS permission_id, p.name, p.category, p.description,
                      COALESCE(rp.granted, FALSE) AS granted
               FROM permissions p
               LEFT JOIN role_permissions rp
                 ON rp.permission_id = p.id AND rp.role_id = $1
               ORDER BY p.category, p.name"#,
        )
        .bind(role_id)
        .fetch_all(&self.pool)
        .await?)
    }
}

#[async_trait]
impl AssignmentStore for PgAuthStore {
    async fn insert_user_role(
        &self,
        user_id: Uuid,
        role_id: i64,
        assigned_by: Option<Uuid>,
    ) -> StoreResult<bool> {
        if self.find_user_by_id(user_id).await?.is_none() {
            return Err(StoreError::not_found("user", user_id));
        }
        self.require_role(role_id).await?;
        let result = sqlx::query(
            r#"INSERT INTO user_roles (user_id, role_id, assigned_by)
               VALUES ($1, $2, $3)
               ON CONFLICT (user_id, role_id) DO NOTHING"#,
        )
        .bind(user_id)
        .bind(role_id)
        .bind(assigned_by)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_user_role(&self, user_id: Uuid, role_id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM user_roles WHERE user_id = $1 AND role_id = $2")
            .bind(user_id)
            .bind(role_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn roles_for_user(&self, user_id: Uuid) -> StoreResult<Vec<AssignedRole>> {
        Ok(sqlx::query_as::<_, AssignedRole>(
            r#"SELECT r.id AS role_id, r.name, r.description, ur.assigned_at
               FROM user_roles ur
               JOIN roles r ON r.id = ur.role_id
               WHERE ur.user_id = $1
               ORDER BY r.name"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn user_has_role(&self, user_id: Uuid, role_name: &str) -> StoreResult<bool> {
        Ok(sqlx::query_scalar::<_, bool>(
            r#"SELECT EXISTS (
                   SELECT 1 FROM user_roles ur
                   JOIN roles r ON r.id = ur.role_id
                   WHERE ur.user_id = $1 AND r.name = $2
               )"#,
        )
        .bind(user_id)
        .bind(role_name)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn user_has_permission(
        &self,
        user_id: Uuid,
        permission_name: &str,
    ) -> StoreResult<bool> {
        Ok(sqlx::query_scalar::<_, bool>(
            r#"SELECT EXISTS (
                   SELECT 1 FROM user_roles ur
                   JOIN role_permissions rp
                     ON rp.role_id = ur.role_id AND rp.granted = TRUE
                   JOIN permissions p ON p.id = rp.permission_id
                   WHERE ur.user_id = $1 AND p.name = $2
               )"#,
        )
        .bind(user_id)
        .bind(permission_name)
        .fetch_one(&self.pool)
        .await?)
    }
}

#[async_trait]
impl TenancyStore for PgAuthStore {
    async fn insert_client(&self, name: &str) -> StoreResult<Client> {
        Ok(
            sqlx::query_as::<_, Client>("INSERT INTO clients (name) VALUES ($1) RETURNING *")
                .bind(name)
                .fetch_one(&self.pool)
                .await?,
        )
    }

    async fn client_by_id(&self, id: i64) -> StoreResult<Option<Client>> {
        Ok(sqlx::query_as::<_, Client>("SELECT * FROM clients WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_clients(&self) -> StoreResult<Vec<Client>> {
        Ok(sqlx::query_as::<_, Client>("SELECT * FROM clients ORDER BY id")
            .fetch_all(&self.pool)
            .await?)
    }

    async fn insert_project(&self, client_id: i64, name: &str) -> StoreResult<Project> {
        if self.client_by_id(client_id).await?.is_none() {
            return Err(StoreError::not_found("client", client_id));
        }
        Ok(sqlx::query_as::<_, Project>(
            "INSERT INTO projects (client_id, name) VALUES ($1, $2) RETURNING *",
        )
        .bind(client_id)
        .bind(name)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn project_by_id(&self, id: i64) -> StoreResult<Option<Project>> {
        Ok(sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_projects(&self, client_id: i64) -> StoreResult<Vec<Project>> {
        Ok(
            sqlx::query_as::<_, Project>(
                "SELECT * FROM projects WHERE client_id = $1 ORDER BY id",
            )
            .bind(client_id)
            .fetch_all(&self.pool)
            .await?,
        )
    }

    async fn insert_membership(&self, user_id: Uuid, project_id: i64) -> StoreResult<bool> {
        if self.find_user_by_id(user_id).await?.is_none() {
            return Err(StoreError::not_found("user", user_id));
        }
        if self.project_by_id(project_id).await?.is_none() {
            return Err(StoreError::not_found("project", project_id));
        }
        let result = sqlx::query(
            r#"INSERT INTO project_memberships (user_id, project_id)
               VALUES ($1, $2)
               ON CONFLICT (user_id, project_id) DO NOTHING"#,
        )
        .bind(user_id)
        .bind(project_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn user_is_member(&self, user_id: Uuid, project_id: i64) -> StoreResult<bool> {
        Ok(sqlx::query_scalar::<_, bool>(
            r#"SELECT EXISTS (
                   SELECT 1 FROM project_memberships
                   WHERE user_id = $1 AND project_id = $2
               )"#,
        )
        .bind(user_id)
        .bind(project_id)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn insert_resource(&self, resource: NewResource<'_>) -> StoreResult<ScopedResource> {
        Ok(sqlx::query_as::<_, ScopedResource>(
            r#"INSERT INTO resources
               (client_id, project_id, kind, logical_key, payload, created_by)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING *"#,
        )
        .bind(resource.client_id)
        .bind(resource.project_id)
        .bind(resource.kind)
        .bind(resource.logical_key)
        .bind(resource.payload)
        .bind(resource.created_by)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn resource_by_id(&self, id: i64) -> StoreResult<Option<ScopedResource>> {
        Ok(
            sqlx::query_as::<_, ScopedResource>("SELECT * FROM resources WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn list_resources(
        &self,
        client_id: i64,
        project_id: i64,
        kind: Option<&str>,
    ) -> StoreResult<Vec<ScopedResource>> {
        // Both scope columns always appear in the WHERE clause, validated
        // path scope or not.
        let rows = match kind {
            Some(kind) => {
                sqlx::query_as::<_, ScopedResource>(
                    r#"SELECT * FROM resources
                       WHERE client_id = $1 AND project_id = $2 AND kind = $3
                       ORDER BY id"#,
                )
                .bind(client_id)
                .bind(project_id)
                .bind(kind)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, ScopedResource>(
                    r#"SELECT * FROM resources
                       WHERE client_id = $1 AND project_id = $2
                       ORDER BY id"#,
                )
                .bind(client_id)
                .bind(project_id)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(rows)
    }

    async fn delete_resource(&self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM resources WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_resources_in_scope(
        &self,
        kind: &str,
        logical_key: &str,
        client_id: i64,
        project_id: i64,
    ) -> StoreResult<i64> {
        Ok(sqlx::query_scalar::<_, i64>(
            r#"SELECT COUNT(*) FROM resources
               WHERE kind = $1 AND logical_key = $2
                 AND client_id = $3 AND project_id = $4"#,
        )
        .bind(kind)
        .bind(logical_key)
        .bind(client_id)
        .bind(project_id)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn delete_resources_by_key(&self, kind: &str, logical_key: &str) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM resources WHERE kind = $1 AND logical_key = $2")
            .bind(kind)
            .bind(logical_key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn count_resources_missing_scope(&self) -> StoreResult<i64> {
        Ok(sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM resources WHERE client_id IS NULL OR project_id IS NULL",
        )
        .fetch_one(&self.pool)
        .await?)
    }

    async fn count_scope_fk_mismatches(&self) -> StoreResult<i64> {
        Ok(sqlx::query_scalar::<_, i64>(
            r#"SELECT COUNT(*) FROM resources r
               LEFT JOIN projects p ON p.id = r.project_id
               WHERE r.project_id IS NOT NULL
                 AND (p.id IS NULL OR r.client_id IS DISTINCT FROM p.client_id)"#,
        )
        .fetch_one(&self.pool)
        .await?)
    }

    async fn duplicate_scoped_keys(&self) -> StoreResult<Vec<DuplicateKeyGroup>> {
        Ok(sqlx::query_as::<_, DuplicateKeyGroup>(
            r#"SELECT client_id, project_id, kind, logical_key, COUNT(*) AS occurrences
               FROM resources
               GROUP BY client_id, project_id, kind, logical_key
               HAVING COUNT(*) > 1
               ORDER BY kind, logical_key"#,
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn count_cross_tenant_id_collisions(&self) -> StoreResult<i64> {
        Ok(sqlx::query_scalar::<_, i64>(
            r#"SELECT COUNT(*) FROM (
                   SELECT id FROM resources
                   GROUP BY id
                   HAVING COUNT(DISTINCT client_id) > 1
               ) AS collisions"#,
        )
        .fetch_one(&self.pool)
        .await?)
    }

    async fn count_active_users_without_membership(&self) -> StoreResult<i64> {
        Ok(sqlx::query_scalar::<_, i64>(
            r#"SELECT COUNT(*) FROM users u
               WHERE u.active = TRUE
                 AND NOT EXISTS (
                     SELECT 1 FROM user_roles ur
                     JOIN roles r ON r.id = ur.role_id
                     WHERE ur.user_id = u.id AND r.name IN ('super_admin', 'admin')
                 )
                 AND (
                     EXISTS (SELECT 1 FROM user_roles ur WHERE ur.user_id = u.id)
                     OR COALESCE(u.role, '') NOT IN ('super_admin', 'admin')
                 )
                 AND NOT EXISTS (
                     SELECT 1 FROM project_memberships pm WHERE pm.user_id = u.id
                 )"#,
        )
        .fetch_one(&self.pool)
        .await?)
    }

    async fn tables_missing_scope_index(&self) -> StoreResult<Vec<String>> {
        let mut missing = Vec::new();
        for table in HOT_SCOPED_TABLES {
            let row = sqlx::query(
                r#"SELECT EXISTS (
                       SELECT 1 FROM pg_indexes
                       WHERE schemaname = 'public'
                         AND tablename = $1
                         AND indexdef LIKE '%client_id, project_id%'
                   ) AS covered"#,
            )
            .bind(table)
            .fetch_one(&self.pool)
            .await?;
            let covered: bool = row.try_get("covered")?;
            if !covered {
                missing.push(table.to_string());
            }
        }
        Ok(missing)
    }
}

#[async_trait]
impl AuditStore for PgAuthStore {
    async fn record_denial(
        &self,
        actor_id: Option<Uuid>,
        resource: &str,
        reason: &str,
    ) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO access_denials (actor_id, resource, reason) VALUES ($1, $2, $3)",
        )
        .bind(actor_id)
        .bind(resource)
        .bind(reason)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn count_denials_since(&self, cutoff: DateTime<Utc>) -> StoreResult<i64> {
        Ok(sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM access_denials WHERE occurred_at >= $1",
        )
        .bind(cutoff)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn recent_denials(&self, limit: i64) -> StoreResult<Vec<AccessDenialEvent>> {
        Ok(sqlx::query_as::<_, AccessDenialEvent>(
            "SELECT * FROM access_denials ORDER BY occurred_at DESC, id DESC LIMIT $1",
        )
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await?)
    }
}

#[async_trait]
impl AuthStore for PgAuthStore {
    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
