//! User-role assignment service.
//!
//! The role table is the authority. The legacy `users.role` string is a
//! migration-era fallback: it only contributes to the effective role set
//! when a user holds zero role rows, and it can never confer super admin.

use serde::Serialize;
use uuid::Uuid;

use crate::catalog::seed::SUPER_ADMIN;
use crate::database::models::{AssignedRole, User};
use crate::database::store::StoreError;
use crate::database::SharedStore;

/// Result of an assign call. `created = false` means the user already held
/// the role; callers can tell a no-op from a new grant.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AssignmentOutcome {
    pub created: bool,
}

pub struct AssignmentService {
    store: SharedStore,
}

impl AssignmentService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Idempotent: assigning a role the user already holds succeeds without
    /// writing a row.
    pub async fn assign_role(
        &self,
        user_id: Uuid,
        role_id: i64,
        assigned_by: Option<Uuid>,
    ) -> Result<AssignmentOutcome, StoreError> {
        let created = self
            .store
            .insert_user_role(user_id, role_id, assigned_by)
            .await?;
        if created {
            tracing::debug!(%user_id, role_id, "role assigned");
        }
        Ok(AssignmentOutcome { created })
    }

    pub async fn remove_role(&self, user_id: Uuid, role_id: i64) -> Result<bool, StoreError> {
        let removed = self.store.delete_user_role(user_id, role_id).await?;
        if removed {
            tracing::debug!(%user_id, role_id, "role revoked");
        }
        Ok(removed)
    }

    pub async fn roles_for_user(&self, user_id: Uuid) -> Result<Vec<AssignedRole>, StoreError> {
        self.store.roles_for_user(user_id).await
    }

    /// Role-table only. A legacy `role = "super_admin"` string without the
    /// role row does not count.
    pub async fn is_super_admin(&self, user_id: Uuid) -> Result<bool, StoreError> {
        self.store.user_has_role(user_id, SUPER_ADMIN).await
    }

    /// Union across all held roles.
    pub async fn has_permission(
        &self,
        user_id: Uuid,
        permission_name: &str,
    ) -> Result<bool, StoreError> {
        self.store.user_has_permission(user_id, permission_name).await
    }

    /// The role names guards reason about. Role-table names win outright;
    /// the legacy string is merged only when no role rows exist, and a
    /// legacy `super_admin` is discarded rather than trusted.
    pub async fn resolve_effective_roles(&self, user: &User) -> Result<Vec<String>, StoreError> {
        let assigned = self.store.roles_for_user(user.id).await?;
        let mut names: Vec<String> = assigned.into_iter().map(|r| r.name).collect();
        if names.is_empty() {
            if let Some(legacy) = user.role.as_deref() {
                if !legacy.is_empty() && legacy != SUPER_ADMIN {
                    names.push(legacy.to_string());
                }
            }
        }
        Ok(names)
    }
}
