//! Role/permission catalog service.
//!
//! Construction does no I/O. `initialize()` runs the seed and the
//! super-admin auto-grant exactly once per process; until it completes,
//! every query method fails closed with `CatalogError::NotInitialized`.

use std::collections::BTreeMap;

use serde::Serialize;
use tokio::sync::OnceCell;

use crate::catalog::seed::{self, derive_resource_action, PERMISSIONS, SYSTEM_ROLES};
use crate::database::models::{Permission, PermissionGrant, Role};
use crate::database::store::{NewPermission, StoreError};
use crate::database::SharedStore;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog not initialized")]
    NotInitialized,

    #[error("role '{0}' not found")]
    RoleNotFound(String),

    #[error("system role '{0}' cannot be modified")]
    SystemRoleImmutable(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Per-category grant view for one role. Every catalog permission lands in
/// exactly one bucket; no grant row means `denied`.
#[derive(Debug, Default, Clone, Serialize)]
pub struct GrantBuckets {
    pub granted: Vec<PermissionGrant>,
    pub denied: Vec<PermissionGrant>,
}

pub struct CatalogService {
    store: SharedStore,
    init: OnceCell<()>,
}

impl CatalogService {
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            init: OnceCell::new(),
        }
    }

    /// Seed the catalog once. Idempotent and safe under concurrent callers:
    /// the cell admits one seeding run, and the seed statements themselves
    /// are insert-if-absent for the multi-instance case.
    pub async fn initialize(&self) -> Result<(), CatalogError> {
        self.init
            .get_or_try_init(|| async {
                self.seed_defaults().await?;
                Ok::<(), CatalogError>(())
            })
            .await?;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.init.get().is_some()
    }

    fn ensure_ready(&self) -> Result<(), CatalogError> {
        if self.init.get().is_none() {
            return Err(CatalogError::NotInitialized);
        }
        Ok(())
    }

    /// Insert the system roles and the fixed permission list, then re-assert
    /// the super-admin grant over whatever the permission table now holds.
    pub async fn seed_defaults(&self) -> Result<(), CatalogError> {
        for role in SYSTEM_ROLES {
            self.store
                .upsert_role(role.name, Some(role.description), true)
                .await?;
        }
        for def in PERMISSIONS {
            let (resource, action) = derive_resource_action(def.name, def.category);
            self.store
                .upsert_permission(NewPermission {
                    name: def.name,
                    resource: &resource,
                    action: &action,
                    category: def.category,
                    description: Some(def.description),
                })
                .await?;
        }
        let granted = self.grant_all_permissions_to_role(seed::SUPER_ADMIN).await?;
        tracing::info!(
            roles = SYSTEM_ROLES.len(),
            permissions = PERMISSIONS.len(),
            new_super_admin_grants = granted,
            "catalog seeded"
        );
        Ok(())
    }

    /// Ensure the named role holds a granted edge to every permission in the
    /// catalog. Called from seeding and after every permission insert so
    /// super-admin coverage never lags the permission list.
    pub async fn grant_all_permissions_to_role(
        &self,
        role_name: &str,
    ) -> Result<u64, CatalogError> {
        let role = self
            .store
            .role_by_name(role_name)
            .await?
            .ok_or_else(|| CatalogError::RoleNotFound(role_name.to_string()))?;
        Ok(self.store.grant_all_to_role(role.id).await?)
    }

    pub async fn role_by_name(&self, name: &str) -> Result<Option<Role>, CatalogError> {
        self.ensure_ready()?;
        Ok(self.store.role_by_name(name).await?)
    }

    pub async fn all_roles(&self) -> Result<Vec<Role>, CatalogError> {
        self.ensure_ready()?;
        Ok(self.store.list_roles().await?)
    }

    pub async fn all_permissions(&self) -> Result<Vec<Permission>, CatalogError> {
        self.ensure_ready()?;
        Ok(self.store.list_permissions().await?)
    }

    /// Left-join presentation view: category → granted/denied buckets.
    pub async fn role_permissions(
        &self,
        role_id: i64,
    ) -> Result<BTreeMap<String, GrantBuckets>, CatalogError> {
        self.ensure_ready()?;
        let grants = self.store.role_grants(role_id).await?;
        let mut by_category: BTreeMap<String, GrantBuckets> = BTreeMap::new();
        for grant in grants {
            let buckets = by_category.entry(grant.category.clone()).or_default();
            if grant.granted {
                buckets.granted.push(grant);
            } else {
                buckets.denied.push(grant);
            }
        }
        Ok(by_category)
    }

    /// Register a permission outside the seed list. Re-runs the super-admin
    /// grant so coverage holds immediately.
    pub async fn create_permission(
        &self,
        name: &str,
        category: &str,
        description: Option<&str>,
    ) -> Result<Permission, CatalogError> {
        self.ensure_ready()?;
        if self.store.permission_by_name(name).await?.is_some() {
            return Err(CatalogError::Store(StoreError::Conflict(format!(
                "permission '{}' already exists",
                name
            ))));
        }
        let (resource, action) = derive_resource_action(name, category);
        let permission = self
            .store
            .upsert_permission(NewPermission {
                name,
                resource: &resource,
                action: &action,
                category,
                description,
            })
            .await?;
        self.grant_all_permissions_to_role(seed::SUPER_ADMIN).await?;
        Ok(permission)
    }

    /// Create a custom (non-system) role.
    pub async fn create_role(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Role, CatalogError> {
        self.ensure_ready()?;
        Ok(self.store.insert_role(name, description).await?)
    }

    /// Delete a custom role. System roles are immutable.
    pub async fn delete_role(&self, role_id: i64) -> Result<(), CatalogError> {
        self.ensure_ready()?;
        let role = self
            .store
            .role_by_id(role_id)
            .await?
            .ok_or_else(|| CatalogError::RoleNotFound(role_id.to_string()))?;
        if role.is_system {
            return Err(CatalogError::SystemRoleImmutable(role.name));
        }
        self.store.delete_role(role_id).await?;
        Ok(())
    }

    /// Set one grant edge. `granted = false` is an explicit deny, read the
    /// same as no row.
    pub async fn set_grant(
        &self,
        role_id: i64,
        permission_id: i64,
        granted: bool,
    ) -> Result<(), CatalogError> {
        self.ensure_ready()?;
        Ok(self
            .store
            .set_role_permission(role_id, permission_id, granted)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::database::store::CatalogStore;
    use crate::database::MemoryAuthStore;

    fn service() -> CatalogService {
        CatalogService::new(Arc::new(MemoryAuthStore::new()))
    }

    #[tokio::test]
    async fn queries_fail_closed_before_initialize() {
        let catalog = service();
        assert!(matches!(
            catalog.all_roles().await,
            Err(CatalogError::NotInitialized)
        ));
        assert!(matches!(
            catalog.role_by_name("super_admin").await,
            Err(CatalogError::NotInitialized)
        ));
    }

    #[tokio::test]
    async fn initialize_seeds_roles_permissions_and_super_admin_grants() {
        let catalog = service();
        catalog.initialize().await.unwrap();

        let roles = catalog.all_roles().await.unwrap();
        let names: Vec<&str> = roles.iter().map(|r| r.name.as_str()).collect();
        for expected in ["admin", "agent", "super_admin", "user"] {
            assert!(names.contains(&expected));
        }
        assert!(roles.iter().all(|r| r.is_system));

        let permissions = catalog.all_permissions().await.unwrap();
        assert_eq!(permissions.len(), PERMISSIONS.len());

        let super_admin = catalog.role_by_name("super_admin").await.unwrap().unwrap();
        let view = catalog.role_permissions(super_admin.id).await.unwrap();
        let denied: usize = view.values().map(|b| b.denied.len()).sum();
        assert_eq!(denied, 0);
    }

    #[tokio::test]
    async fn initialize_is_idempotent() {
        let catalog = service();
        catalog.initialize().await.unwrap();
        catalog.initialize().await.unwrap();
        assert_eq!(
            catalog.all_permissions().await.unwrap().len(),
            PERMISSIONS.len()
        );
    }

    #[tokio::test]
    async fn concurrent_initialize_seeds_once() {
        let catalog = Arc::new(service());
        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let catalog = catalog.clone();
                tokio::spawn(async move { catalog.initialize().await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert_eq!(
            catalog.all_roles().await.unwrap().len(),
            SYSTEM_ROLES.len()
        );
        assert_eq!(
            catalog.all_permissions().await.unwrap().len(),
            PERMISSIONS.len()
        );
    }

    #[tokio::test]
    async fn concurrent_grant_all_settles_on_one_edge_per_permission() {
        let store = Arc::new(MemoryAuthStore::new());
        let catalog = Arc::new(CatalogService::new(store.clone()));
        catalog.initialize().await.unwrap();

        // One permission the seed pass has not granted yet, so the two
        // runs contend for the same missing edge.
        store
            .upsert_permission(NewPermission {
                name: "exports.run",
                resource: "exports",
                action: "run",
                category: "exports",
                description: None,
            })
            .await
            .unwrap();

        let tasks: Vec<_> = (0..2)
            .map(|_| {
                let catalog = catalog.clone();
                tokio::spawn(async move {
                    catalog
                        .grant_all_permissions_to_role(seed::SUPER_ADMIN)
                        .await
                })
            })
            .collect();
        let mut new_edges = 0;
        for task in tasks {
            new_edges += task.await.unwrap().unwrap();
        }
        assert_eq!(new_edges, 1);

        let super_admin = catalog
            .role_by_name(seed::SUPER_ADMIN)
            .await
            .unwrap()
            .unwrap();
        let view = catalog.role_permissions(super_admin.id).await.unwrap();
        let granted: usize = view.values().map(|b| b.granted.len()).sum();
        let denied: usize = view.values().map(|b| b.denied.len()).sum();
        assert_eq!(granted, PERMISSIONS.len() + 1);
        assert_eq!(denied, 0);
    }

    #[tokio::test]
    async fn new_permission_is_granted_to_super_admin() {
        let catalog = service();
        catalog.initialize().await.unwrap();
        catalog
            .create_permission("reports.read", "reports", Some("tenant reports"))
            .await
            .unwrap();

        let super_admin = catalog.role_by_name("super_admin").await.unwrap().unwrap();
        let view = catalog.role_permissions(super_admin.id).await.unwrap();
        let reports = view.get("reports").expect("category present");
        assert_eq!(reports.granted.len(), 1);
        assert_eq!(reports.granted[0].name, "reports.read");
        assert!(reports.denied.is_empty());
    }

    #[tokio::test]
    async fn grants_view_defaults_to_denied() {
        let catalog = service();
        catalog.initialize().await.unwrap();
        let user_role = catalog.role_by_name("user").await.unwrap().unwrap();
        let view = catalog.role_permissions(user_role.id).await.unwrap();
        let granted: usize = view.values().map(|b| b.granted.len()).sum();
        let denied: usize = view.values().map(|b| b.denied.len()).sum();
        assert_eq!(granted, 0);
        assert_eq!(denied, PERMISSIONS.len());
    }

    #[tokio::test]
    async fn system_roles_cannot_be_deleted() {
        let catalog = service();
        catalog.initialize().await.unwrap();
        let admin = catalog.role_by_name("admin").await.unwrap().unwrap();
        assert!(matches!(
            catalog.delete_role(admin.id).await,
            Err(CatalogError::SystemRoleImmutable(name)) if name == "admin"
        ));

        let custom = catalog.create_role("analyst", None).await.unwrap();
        catalog.delete_role(custom.id).await.unwrap();
        assert!(catalog.role_by_name("analyst").await.unwrap().is_none());
    }
}
