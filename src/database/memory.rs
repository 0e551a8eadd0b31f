//! In-process store used by the test suites and local development.
//!
//! Mirrors the Postgres schema: the same unique constraints, the same
//! insert-if-absent semantics, serial id allocation per table. Everything
//! lives behind one `tokio::sync::RwLock` so constraint checks and inserts
//! happen under the same write guard.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::catalog::seed::ADMINISTRATIVE_ROLES;

use super::models::{
    AccessDenialEvent, AssignedRole, Client, Permission, PermissionGrant, Project,
    ProjectMembership, Role, ScopedResource, Session, User, UserRole,
};
use super::store::{
    AssignmentStore, AuditStore, AuthStore, CatalogStore, CredentialStore, DuplicateKeyGroup,
    NewPermission, NewResource, NewUser, StoreError, StoreResult, TenancyStore,
};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    sessions: HashMap<Uuid, Session>,
    roles: HashMap<i64, Role>,
    permissions: HashMap<i64, Permission>,
    role_permissions: HashMap<(i64, i64), bool>,
    user_roles: HashMap<(Uuid, i64), UserRole>,
    clients: HashMap<i64, Client>,
    projects: HashMap<i64, Project>,
    memberships: HashMap<(Uuid, i64), ProjectMembership>,
    resources: HashMap<i64, ScopedResource>,
    denials: Vec<AccessDenialEvent>,
}

pub struct MemoryAuthStore {
    tables: RwLock<Tables>,
    next_role_id: AtomicI64,
    next_permission_id: AtomicI64,
    next_client_id: AtomicI64,
    next_project_id: AtomicI64,
    next_resource_id: AtomicI64,
    next_denial_id: AtomicI64,
}

impl MemoryAuthStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            next_role_id: AtomicI64::new(1),
            next_permission_id: AtomicI64::new(1),
            next_client_id: AtomicI64::new(1),
            next_project_id: AtomicI64::new(1),
            next_resource_id: AtomicI64::new(1),
            next_denial_id: AtomicI64::new(1),
        }
    }

    fn alloc(counter: &AtomicI64) -> i64 {
        counter.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for MemoryAuthStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialStore for MemoryAuthStore {
    async fn insert_user(&self, user: NewUser<'_>) -> StoreResult<User> {
        let email = user.email.to_lowercase();
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email == email) {
            return Err(StoreError::Conflict(format!(
                "user with email '{}' already exists",
                email
            )));
        }
        let now = Utc::now();
        let row = User {
            id: Uuid::new_v4(),
            email,
            password_hash: user.password_hash.to_string(),
            display_name: user.display_name.to_string(),
            role: user.role.map(str::to_string),
            client_id: user.client_id,
            active: true,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let email = email.to_lowercase();
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.get(&id).cloned())
    }

    async fn set_user_active(&self, id: Uuid, active: bool) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.users.get_mut(&id) {
            Some(user) => {
                user.active = active;
                user.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let tables = self.tables.read().await;
        let mut users: Vec<User> = tables.users.values().cloned().collect();
        users.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(users)
    }

    async fn insert_session(&self, session: &Session) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn find_session_by_digest(&self, digest: &str) -> StoreResult<Option<Session>> {
        let tables = self.tables.read().await;
        Ok(tables
            .sessions
            .values()
            .find(|s| s.refresh_digest == digest)
            .cloned())
    }

    async fn revoke_session(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.sessions.get_mut(&id) {
            Some(session) if session.revoked_at.is_none() => {
                session.revoked_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl CatalogStore for MemoryAuthStore {
    async fn upsert_role(
        &self,
        name: &str,
        description: Option<&str>,
        is_system: bool,
    ) -> StoreResult<Role> {
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables.roles.values().find(|r| r.name == name) {
            return Ok(existing.clone());
        }
        let row = Role {
            id: Self::alloc(&self.next_role_id),
            name: name.to_string(),
            description: description.map(str::to_string),
            is_system,
            created_at: Utc::now(),
        };
        tables.roles.insert(row.id, row.clone());
        Ok(row)
    }

    async fn insert_role(&self, name: &str, description: Option<&str>) -> StoreResult<Role> {
        let mut tables = self.tables.write().await;
        if tables.roles.values().any(|r| r.name == name) {
            return Err(StoreError::Conflict(format!(
                "role '{}' already exists",
                name
            )));
        }
        let row = Role {
            id: Self::alloc(&self.next_role_id),
            name: name.to_string(),
            description: description.map(str::to_string),
            is_system: false,
            created_at: Utc::now(),
        };
        tables.roles.insert(row.id, row.clone());
        Ok(row)
    }

    async fn delete_role(&self, id: i64) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.roles.remove(&id).is_none() {
            return Ok(false);
        }
        tables.role_permissions.retain(|(role_id, _), _| *role_id != id);
        tables.user_roles.retain(|(_, role_id), _| *role_id != id);
        Ok(true)
    }

    async fn role_by_name(&self, name: &str) -> StoreResult<Option<Role>> {
        let tables = self.tables.read().await;
        Ok(tables.roles.values().find(|r| r.name == name).cloned())
    }

    async fn role_by_id(&self, id: i64) -> StoreResult<Option<Role>> {
        let tables = self.tables.read().await;
        Ok(tables.roles.get(&id).cloned())
    }

    async fn list_roles(&self) -> StoreResult<Vec<Role>> {
        let tables = self.tables.read().await;
        let mut roles: Vec<Role> = tables.roles.values().cloned().collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn upsert_permission(&self, permission: NewPermission<'_>) -> StoreResult<Permission> {
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables
            .permissions
            .values()
            .find(|p| p.name == permission.name)
        {
            return Ok(existing.clone());
        }
        let row = Permission {
            id: Self::alloc(&self.next_permission_id),
            name: permission.name.to_string(),
            resource: permission.resource.to_string(),
            action: permission.action.to_string(),
            category: permission.category.to_string(),
            description: permission.description.map(str::to_string),
            created_at: Utc::now(),
        };
        tables.permissions.insert(row.id, row.clone());
        Ok(row)
    }

    async fn permission_by_name(&self, name: &str) -> StoreResult<Option<Permission>> {
        let tables = self.tables.read().await;
        Ok(tables.permissions.values().find(|p| p.name == name).cloned())
    }

    async fn permission_by_id(&self, id: i64) -> StoreResult<Option<Permission>> {
        let tables = self.tables.read().await;
        Ok(tables.permissions.get(&id).cloned())
    }

    async fn list_permissions(&self) -> StoreResult<Vec<Permission>> {
        let tables = self.tables.read().await;
        let mut permissions: Vec<Permission> = tables.permissions.values().cloned().collect();
        permissions.sort_by(|a, b| (&a.category, &a.name).cmp(&(&b.category, &b.name)));
        Ok(permissions)
    }

    async fn set_role_permission(
        &self,
        role_id: i64,
        permission_id: i64,
        granted: bool,
    ) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if !tables.roles.contains_key(&role_id) {
            return Err(StoreError::not_found("role", role_id));
        }
        if !tables.permissions.contains_key(&permission_id) {
            return Err(StoreError::not_found("permission", permission_id));
        }
        tables.role_permissions.insert((role_id, permission_id), granted);
        Ok(())
    }

    async fn grant_all_to_role(&self, role_id: i64) -> StoreResult<u64> {
        let mut tables = self.tables.write().await;
        if !tables.roles.contains_key(&role_id) {
            return Err(StoreError::not_found("role", role_id));
        }
        let permission_ids: Vec<i64> = tables.permissions.keys().copied().collect();
        let mut changed = 0;
        for permission_id in permission_ids {
            let slot = tables
                .role_permissions
                .entry((role_id, permission_id))
                .or_insert(false);
            if !*slot {
                *slot = true;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn role_grants(&self, role_id: i64) -> StoreResult<Vec<PermissionGrant>> {
        let tables = self.tables.read().await;
        if !tables.roles.contains_key(&role_id) {
            return Err(StoreError::not_found("role", role_id));
        }
        let mut grants: Vec<PermissionGrant> = tables
            .permissions
            .values()
            .map(|p| PermissionGrant {
                permission_id: p.id,
                name: p.name.clone(),
                category: p.category.clone(),
                description: p.description.clone(),
                granted: tables
                    .role_permissions
                    .get(&(role_id, p.id))
                    .copied()
                    .unwrap_or(false),
            })
            .collect();
        grants.sort_by(|a, b| (&a.category, &a.name).cmp(&(&b.category, &b.name)));
        Ok(grants)
    }
}

#[async_trait]
impl AssignmentStore for MemoryAuthStore {
    async fn insert_user_role(
        &self,
        user_id: Uuid,
        role_id: i64,
        assigned_by: Option<Uuid>,
    ) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&user_id) {
            return Err(StoreError::not_found("user", user_id));
        }
        if !tables.roles.contains_key(&role_id) {
            return Err(StoreError::not_found("role", role_id));
        }
        if tables.user_roles.contains_key(&(user_id, role_id)) {
            return Ok(false);
        }
        tables.user_roles.insert(
            (user_id, role_id),
            UserRole {
                user_id,
                role_id,
                assigned_by,
                assigned_at: Utc::now(),
            },
        );
        Ok(true)
    }

    async fn delete_user_role(&self, user_id: Uuid, role_id: i64) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables.user_roles.remove(&(user_id, role_id)).is_some())
    }

    async fn roles_for_user(&self, user_id: Uuid) -> StoreResult<Vec<AssignedRole>> {
        let tables = self.tables.read().await;
        let mut assigned: Vec<AssignedRole> = tables
            .user_roles
            .values()
            .filter(|ur| ur.user_id == user_id)
            .filter_map(|ur| {
                tables.roles.get(&ur.role_id).map(|r| AssignedRole {
                    role_id: r.id,
                    name: r.name.clone(),
                    description: r.description.clone(),
                    assigned_at: ur.assigned_at,
                })
            })
            .collect();
        assigned.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(assigned)
    }

    async fn user_has_role(&self, user_id: Uuid, role_name: &str) -> StoreResult<bool> {
        let tables = self.tables.read().await;
        Ok(tables.user_roles.values().any(|ur| {
            ur.user_id == user_id
                && tables
                    .roles
                    .get(&ur.role_id)
                    .is_some_and(|r| r.name == role_name)
        }))
    }

    async fn user_has_permission(
        &self,
        user_id: Uuid,
        permission_name: &str,
    ) -> StoreResult<bool> {
        let tables = self.tables.read().await;
        let Some(permission) = tables
            .permissions
            .values()
            .find(|p| p.name == permission_name)
        else {
            return Ok(false);
        };
        Ok(tables
            .user_roles
            .values()
            .filter(|ur| ur.user_id == user_id)
            .any(|ur| {
                tables
                    .role_permissions
                    .get(&(ur.role_id, permission.id))
                    .copied()
                    .unwrap_or(false)
            }))
    }
}

#[async_trait]
impl TenancyStore for MemoryAuthStore {
    async fn insert_client(&self, name: &str) -> StoreResult<Client> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let row = Client {
            id: Self::alloc(&self.next_client_id),
            name: name.to_string(),
            active: true,
            created_at: now,
            updated_at: now,
        };
        tables.clients.insert(row.id, row.clone());
        Ok(row)
    }

    async fn client_by_id(&self, id: i64) -> StoreResult<Option<Client>> {
        let tables = self.tables.read().await;
        Ok(tables.clients.get(&id).cloned())
    }

    async fn list_clients(&self) -> StoreResult<Vec<Client>> {
        let tables = self.tables.read().await;
        let mut clients: Vec<Client> = tables.clients.values().cloned().collect();
        clients.sort_by_key(|c| c.id);
        Ok(clients)
    }

    async fn insert_project(&self, client_id: i64, name: &str) -> StoreResult<Project> {
        let mut tables = self.tables.write().await;
        if !tables.clients.contains_key(&client_id) {
            return Err(StoreError::not_found("client", client_id));
        }
        let now = Utc::now();
        let row = Project {
            id: Self::alloc(&self.next_project_id),
            client_id,
            name: name.to_string(),
            active: true,
            created_at: now,
            updated_at: now,
        };
        tables.projects.insert(row.id, row.clone());
        Ok(row)
    }

    async fn project_by_id(&self, id: i64) -> StoreResult<Option<Project>> {
        let tables = self.tables.read().await;
        Ok(tables.projects.get(&id).cloned())
    }

    async fn list_projects(&self, client_id: i64) -> StoreResult<Vec<Project>> {
        let tables = self.tables.read().await;
        let mut projects: Vec<Project> = tables
            .projects
            .values()
            .filter(|p| p.client_id == client_id)
            .cloned()
            .collect();
        projects.sort_by_key(|p| p.id);
        Ok(projects)
    }

    async fn insert_membership(&self, user_id: Uuid, project_id: i64) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&user_id) {
            return Err(StoreError::not_found("user", user_id));
        }
        if !tables.projects.contains_key(&project_id) {
            return Err(StoreError::not_found("project", project_id));
        }
        if tables.memberships.contains_key(&(user_id, project_id)) {
            return Ok(false);
        }
        tables.memberships.insert(
            (user_id, project_id),
            ProjectMembership {
                user_id,
                project_id,
                created_at: Utc::now(),
            },
        );
        Ok(true)
    }

    async fn user_is_member(&self, user_id: Uuid, project_id: i64) -> StoreResult<bool> {
        let tables = self.tables.read().await;
        Ok(tables.memberships.contains_key(&(user_id, project_id)))
    }

    async fn insert_resource(&self, resource: NewResource<'_>) -> StoreResult<ScopedResource> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let row = ScopedResource {
            id: Self::alloc(&self.next_resource_id),
            client_id: resource.client_id,
            project_id: resource.project_id,
            kind: resource.kind.to_string(),
            logical_key: resource.logical_key.to_string(),
            payload: resource.payload,
            created_by: resource.created_by,
            created_at: now,
            updated_at: now,
        };
        tables.resources.insert(row.id, row.clone());
        Ok(row)
    }

    async fn resource_by_id(&self, id: i64) -> StoreResult<Option<ScopedResource>> {
        let tables = self.tables.read().await;
        Ok(tables.resources.get(&id).cloned())
    }

    async fn list_resources(
        &self,
        client_id: i64,
        project_id: i64,
        kind: Option<&str>,
    ) -> StoreResult<Vec<ScopedResource>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<ScopedResource> = tables
            .resources
            .values()
            .filter(|r| r.client_id == Some(client_id) && r.project_id == Some(project_id))
            .filter(|r| kind.map_or(true, |k| r.kind == k))
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.id);
        Ok(rows)
    }

    async fn delete_resource(&self, id: i64) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables.resources.remove(&id).is_some())
    }

    async fn count_resources_in_scope(
        &self,
        kind: &str,
        logical_key: &str,
        client_id: i64,
        project_id: i64,
    ) -> StoreResult<i64> {
        let tables = self.tables.read().await;
        Ok(tables
            .resources
            .values()
            .filter(|r| {
                r.kind == kind
                    && r.logical_key == logical_key
                    && r.client_id == Some(client_id)
                    && r.project_id == Some(project_id)
            })
            .count() as i64)
    }

    async fn delete_resources_by_key(&self, kind: &str, logical_key: &str) -> StoreResult<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.resources.len();
        tables
            .resources
            .retain(|_, r| !(r.kind == kind && r.logical_key == logical_key));
        Ok((before - tables.resources.len()) as u64)
    }

    async fn count_resources_missing_scope(&self) -> StoreResult<i64> {
        let tables = self.tables.read().await;
        Ok(tables
            .resources
            .values()
            .filter(|r| r.client_id.is_none() || r.project_id.is_none())
            .count() as i64)
    }

    async fn count_scope_fk_mismatches(&self) -> StoreResult<i64> {
        let tables = self.tables.read().await;
        Ok(tables
            .resources
            .values()
            .filter(|r| match r.project_id {
                Some(project_id) => match tables.projects.get(&project_id) {
                    Some(project) => r.client_id != Some(project.client_id),
                    None => true,
                },
                None => false,
            })
            .count() as i64)
    }

    async fn duplicate_scoped_keys(&self) -> StoreResult<Vec<DuplicateKeyGroup>> {
        let tables = self.tables.read().await;
        let mut groups: HashMap<(Option<i64>, Option<i64>, String, String), i64> = HashMap::new();
        for r in tables.resources.values() {
            *groups
                .entry((
                    r.client_id,
                    r.project_id,
                    r.kind.clone(),
                    r.logical_key.clone(),
                ))
                .or_insert(0) += 1;
        }
        let mut duplicates: Vec<DuplicateKeyGroup> = groups
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(
                |((client_id, project_id, kind, logical_key), occurrences)| DuplicateKeyGroup {
                    client_id,
                    project_id,
                    kind,
                    logical_key,
                    occurrences,
                },
            )
            .collect();
        duplicates.sort_by(|a, b| (&a.kind, &a.logical_key).cmp(&(&b.kind, &b.logical_key)));
        Ok(duplicates)
    }

    async fn count_cross_tenant_id_collisions(&self) -> StoreResult<i64> {
        // Resources are keyed by id here, so one id cannot sit under two
        // clients. The check still runs as a tripwire, matching the SQL store.
        let tables = self.tables.read().await;
        let mut clients_by_id: HashMap<i64, Vec<Option<i64>>> = HashMap::new();
        for r in tables.resources.values() {
            clients_by_id.entry(r.id).or_default().push(r.client_id);
        }
        Ok(clients_by_id
            .values()
            .filter(|clients| {
                let mut distinct: Vec<_> = clients.iter().collect();
                distinct.sort();
                distinct.dedup();
                distinct.len() > 1
            })
            .count() as i64)
    }

    async fn count_active_users_without_membership(&self) -> StoreResult<i64> {
        let tables = self.tables.read().await;
        let count = tables
            .users
            .values()
            .filter(|u| u.active)
            .filter(|u| {
                let held: Vec<&Role> = tables
                    .user_roles
                    .values()
                    .filter(|ur| ur.user_id == u.id)
                    .filter_map(|ur| tables.roles.get(&ur.role_id))
                    .collect();
                let admin_by_table = held
                    .iter()
                    .any(|r| ADMINISTRATIVE_ROLES.contains(&r.name.as_str()));
                if admin_by_table {
                    return false;
                }
                // Legacy column only counts while the role table is empty.
                if held.is_empty()
                    && u.role
                        .as_deref()
                        .is_some_and(|r| ADMINISTRATIVE_ROLES.contains(&r))
                {
                    return false;
                }
                !tables.memberships.keys().any(|(uid, _)| *uid == u.id)
            })
            .count();
        Ok(count as i64)
    }

    async fn tables_missing_scope_index(&self) -> StoreResult<Vec<String>> {
        // No physical indexes to inspect.
        Ok(Vec::new())
    }
}

#[async_trait]
impl AuditStore for MemoryAuthStore {
    async fn record_denial(
        &self,
        actor_id: Option<Uuid>,
        resource: &str,
        reason: &str,
    ) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let event = AccessDenialEvent {
            id: Self::alloc(&self.next_denial_id),
            actor_id,
            resource: resource.to_string(),
            reason: reason.to_string(),
            occurred_at: Utc::now(),
        };
        tables.denials.push(event);
        Ok(())
    }

    async fn count_denials_since(&self, cutoff: DateTime<Utc>) -> StoreResult<i64> {
        let tables = self.tables.read().await;
        Ok(tables
            .denials
            .iter()
            .filter(|d| d.occurred_at >= cutoff)
            .count() as i64)
    }

    async fn recent_denials(&self, limit: i64) -> StoreResult<Vec<AccessDenialEvent>> {
        let tables = self.tables.read().await;
        let mut denials = tables.denials.clone();
        denials.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at).then(b.id.cmp(&a.id)));
        denials.truncate(limit.max(0) as usize);
        Ok(denials)
    }
}

#[async_trait]
impl AuthStore for MemoryAuthStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
