//! Core permission and role catalog
//!
//! Plugin permissions are declared by manifests and are not listed here.

pub const ORG_READ: &str = "org:read";
pub const ORG_UPDATE: &str = "org:update";
pub const ORG_DELETE: &str = "org:delete";

pub const USERS_READ: &str = "users:read";
pub const USERS_CREATE: &str = "users:create";
pub const USERS_UPDATE: &str = "users:update";
pub const USERS_DELETE: &str = "users:delete";

pub const ROLES_READ: &str = "roles:read";
pub const ROLES_MANAGE: &str = "roles:manage";

pub const PLUGINS_READ: &str = "plugins:read";
pub const PLUGINS_INSTALL: &str = "plugins:install";
pub const PLUGINS_MANAGE: &str = "plugins:manage";

pub const SETTINGS_READ: &str = "settings:read";
pub const SETTINGS_UPDATE: &str = "settings:update";

pub const AUDIT_READ: &str = "audit:read";

pub const CORE_PERMISSIONS: &[&str] = &[
    ORG_READ,
    ORG_UPDATE,
    ORG_DELETE,
    USERS_READ,
    USERS_CREATE,
    USERS_UPDATE,
    USERS_DELETE,
    ROLES_READ,
    ROLES_MANAGE,
    PLUGINS_READ,
    PLUGINS_INSTALL,
    PLUGINS_MANAGE,
    SETTINGS_READ,
    SETTINGS_UPDATE,
    AUDIT_READ,
];

pub const OWNER: &str = "owner";
pub const ADMIN: &str = "admin";
pub const MEMBER: &str = "member";
pub const VIEWER: &str = "viewer";

pub const SYSTEM_ROLES: &[&str] = &[OWNER, ADMIN, MEMBER, VIEWER];

/// Display grouping of the core permissions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionGroup {
    pub key: &'static str,
    pub label: &'static str,
    pub permissions: &'static [&'static str],
}

pub const PERMISSION_GROUPS: &[PermissionGroup] = &[
    PermissionGroup {
        key: "organization",
        label: "Organization",
        permissions: &[ORG_READ, ORG_UPDATE, ORG_DELETE],
    },
    PermissionGroup {
        key: "users",
        label: "Users",
        permissions: &[USERS_READ, USERS_CREATE, USERS_UPDATE, USERS_DELETE],
    },
    PermissionGroup {
        key: "roles",
        label: "Roles",
        permissions: &[ROLES_READ, ROLES_MANAGE],
    },
    PermissionGroup {
        key: "plugins",
        label: "Plugins",
        permissions: &[PLUGINS_READ, PLUGINS_INSTALL, PLUGINS_MANAGE],
    },
    PermissionGroup {
        key: "settings",
        label: "Settings",
        permissions: &[SETTINGS_READ, SETTINGS_UPDATE],
    },
    PermissionGroup {
        key: "audit",
        label: "Audit Logs",
        permissions: &[AUDIT_READ],
    },
];

/// Roles that receive every permission a published plugin declares
pub const PLUGIN_PERMISSION_ROLES: &[&str] = &[OWNER, ADMIN];

/// Permissions seeded for a system role by the reference store.
/// Unknown roles get nothing.
pub fn default_role_permissions(role: &str) -> &'static [&'static str] {
    match role {
        OWNER => CORE_PERMISSIONS,
        ADMIN => &[
            ORG_READ,
            ORG_UPDATE,
            USERS_READ,
            USERS_CREATE,
            USERS_UPDATE,
            USERS_DELETE,
            ROLES_READ,
            ROLES_MANAGE,
            PLUGINS_READ,
            PLUGINS_INSTALL,
            PLUGINS_MANAGE,
            SETTINGS_READ,
            SETTINGS_UPDATE,
            AUDIT_READ,
        ],
        MEMBER => &[ORG_READ, USERS_READ, PLUGINS_READ, SETTINGS_READ],
        VIEWER => &[ORG_READ, PLUGINS_READ],
        _ => &[],
    }
}
