//! Fixed role and permission vocabulary.
//!
//! Other parts of the platform reference these entries by name, so the list
//! is a wire contract: names must never be renamed, only added to. Seeding
//! is insert-if-absent and safe to run on every startup.

pub const SUPER_ADMIN: &str = "super_admin";
pub const ADMIN: &str = "admin";
pub const AGENT: &str = "agent";
pub const USER: &str = "user";

/// Roles treated as administrative by the tenant scope guard: they may cross
/// client boundaries without a membership row.
pub const ADMINISTRATIVE_ROLES: [&str; 2] = [SUPER_ADMIN, ADMIN];

#[derive(Debug, Clone, Copy)]
pub struct RoleDef {
    pub name: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct PermissionDef {
    pub name: &'static str,
    pub category: &'static str,
    pub description: &'static str,
}

pub const SYSTEM_ROLES: [RoleDef; 4] = [
    RoleDef {
        name: SUPER_ADMIN,
        description: "Full platform access, all permissions granted automatically",
    },
    RoleDef {
        name: ADMIN,
        description: "Agency administrator",
    },
    RoleDef {
        name: AGENT,
        description: "Agency staff working across assigned clients",
    },
    RoleDef {
        name: USER,
        description: "Client-side account bound to a single tenant",
    },
];

pub const PERMISSIONS: [PermissionDef; 24] = [
    // system
    PermissionDef {
        name: "system.manage",
        category: "system",
        description: "Manage platform-wide system settings",
    },
    PermissionDef {
        name: "system.view_health",
        category: "system",
        description: "View system health and integrity reports",
    },
    PermissionDef {
        name: "system.view_logs",
        category: "system",
        description: "View system logs",
    },
    PermissionDef {
        name: "system.backup",
        category: "system",
        description: "Trigger and download system backups",
    },
    // users
    PermissionDef {
        name: "users.create",
        category: "users",
        description: "Create user accounts",
    },
    PermissionDef {
        name: "users.read",
        category: "users",
        description: "View user accounts",
    },
    PermissionDef {
        name: "users.update",
        category: "users",
        description: "Update user accounts",
    },
    PermissionDef {
        name: "users.delete",
        category: "users",
        description: "Deactivate or delete user accounts",
    },
    PermissionDef {
        name: "user_management",
        category: "users",
        description: "Assign and revoke user roles",
    },
    // roles
    PermissionDef {
        name: "roles.create",
        category: "roles",
        description: "Create roles",
    },
    PermissionDef {
        name: "roles.read",
        category: "roles",
        description: "View roles and their permissions",
    },
    PermissionDef {
        name: "roles.update",
        category: "roles",
        description: "Update roles and grants",
    },
    PermissionDef {
        name: "roles.delete",
        category: "roles",
        description: "Delete custom roles",
    },
    // settings
    PermissionDef {
        name: "settings.read",
        category: "settings",
        description: "View agency settings",
    },
    PermissionDef {
        name: "settings.update",
        category: "settings",
        description: "Update agency settings",
    },
    // platform
    PermissionDef {
        name: "platform.settings.write",
        category: "platform",
        description: "Write platform-level settings",
    },
    PermissionDef {
        name: "platform.logs.read",
        category: "platform",
        description: "Read platform access and denial logs",
    },
    PermissionDef {
        name: "system_backup",
        category: "platform",
        description: "Legacy backup permission, kept for existing grants",
    },
    // agents
    PermissionDef {
        name: "agents.manage",
        category: "agents",
        description: "Manage agency staff",
    },
    PermissionDef {
        name: "agents.view",
        category: "agents",
        description: "View agency staff",
    },
    // accompagnement
    PermissionDef {
        name: "accompagnement.create",
        category: "accompagnement",
        description: "Create client accompagnement records",
    },
    PermissionDef {
        name: "accompagnement.read",
        category: "accompagnement",
        description: "View client accompagnement records",
    },
    PermissionDef {
        name: "accompagnement.update",
        category: "accompagnement",
        description: "Update client accompagnement records",
    },
    PermissionDef {
        name: "accompagnement.delete",
        category: "accompagnement",
        description: "Delete client accompagnement records",
    },
];

/// Split a permission name into `(resource, action)`: the last dotted
/// segment is the action, everything before it the resource. Single-word
/// names fall back to their category with action `manage`.
pub fn derive_resource_action(name: &str, category: &str) -> (String, String) {
    match name.rsplit_once('.') {
        Some((resource, action)) => (resource.to_string(), action.to_string()),
        None => (category.to_string(), "manage".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn permission_names_are_unique() {
        let names: HashSet<&str> = PERMISSIONS.iter().map(|p| p.name).collect();
        assert_eq!(names.len(), PERMISSIONS.len());
    }

    #[test]
    fn role_names_are_unique() {
        let names: HashSet<&str> = SYSTEM_ROLES.iter().map(|r| r.name).collect();
        assert_eq!(names.len(), SYSTEM_ROLES.len());
    }

    #[test]
    fn catalog_contains_the_contracted_names() {
        let names: HashSet<&str> = PERMISSIONS.iter().map(|p| p.name).collect();
        for required in [
            "system.manage",
            "system.backup",
            "system_backup",
            "user_management",
            "platform.settings.write",
            "platform.logs.read",
            "agents.view",
            "accompagnement.delete",
        ] {
            assert!(names.contains(required), "missing {}", required);
        }
        assert_eq!(PERMISSIONS.len(), 24);
    }

    #[test]
    fn resource_action_derivation() {
        assert_eq!(
            derive_resource_action("users.create", "users"),
            ("users".to_string(), "create".to_string())
        );
        assert_eq!(
            derive_resource_action("platform.settings.write", "platform"),
            ("platform.settings".to_string(), "write".to_string())
        );
        assert_eq!(
            derive_resource_action("user_management", "users"),
            ("users".to_string(), "manage".to_string())
        );
    }
}
