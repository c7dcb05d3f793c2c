//! Expose-or-suppress decisions over an [`AccessSnapshot`]

use super::resolver::AccessSnapshot;
use crate::error::{CoreError, CoreResult};

/// How a multi-permission gate combines its list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GateMode {
    #[default]
    Any,
    All,
}

/// Gate over one or more permissions. Fails closed: loading snapshots and
/// empty permission lists are denied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionGate {
    permissions: Vec<String>,
    mode: GateMode,
}

impl PermissionGate {
    pub fn single(permission: impl Into<String>) -> Self {
        Self {
            permissions: vec![permission.into()],
            mode: GateMode::Any,
        }
    }

    pub fn any<I, S>(permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            permissions: permissions.into_iter().map(Into::into).collect(),
            mode: GateMode::Any,
        }
    }

    pub fn all<I, S>(permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            permissions: permissions.into_iter().map(Into::into).collect(),
            mode: GateMode::All,
        }
    }

    pub fn mode(&self) -> GateMode {
        self.mode
    }

    pub fn allows(&self, snapshot: &AccessSnapshot) -> bool {
        let required: Vec<&str> = self.permissions.iter().map(String::as_str).collect();
        match (required.as_slice(), self.mode) {
            ([], _) => false,
            ([single], _) => snapshot.has_permission(single),
            (many, GateMode::Any) => snapshot.has_any_permission(many),
            (many, GateMode::All) => snapshot.has_all_permissions(many),
        }
    }

    /// Run `f` only when allowed
    pub fn guard<T>(&self, snapshot: &AccessSnapshot, f: impl FnOnce() -> T) -> Option<T> {
        self.allows(snapshot).then(f)
    }

    pub fn guard_or<T>(
        &self,
        snapshot: &AccessSnapshot,
        f: impl FnOnce() -> T,
        fallback: impl FnOnce() -> T,
    ) -> T {
        if self.allows(snapshot) {
            f()
        } else {
            fallback()
        }
    }

    /// Turn a denial into [`CoreError::PermissionDenied`]
    pub fn require(&self, snapshot: &AccessSnapshot) -> CoreResult<()> {
        if self.allows(snapshot) {
            return Ok(());
        }
        let joiner = match self.mode {
            GateMode::Any => " or ",
            GateMode::All => " and ",
        };
        Err(CoreError::PermissionDenied(self.permissions.join(joiner)))
    }
}

/// Gate that allows when any listed role is held
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleGate {
    roles: Vec<String>,
}

impl RoleGate {
    pub fn new<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    pub fn allows(&self, snapshot: &AccessSnapshot) -> bool {
        self.roles.iter().any(|role| snapshot.has_role(role))
    }

    pub fn guard<T>(&self, snapshot: &AccessSnapshot, f: impl FnOnce() -> T) -> Option<T> {
        self.allows(snapshot).then(f)
    }

    pub fn require(&self, snapshot: &AccessSnapshot) -> CoreResult<()> {
        if self.allows(snapshot) {
            Ok(())
        } else {
            Err(CoreError::PermissionDenied(format!(
                "role {}",
                self.roles.join(" or ")
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::model::{AccessView, Organization, Profile};

    fn snapshot(permissions: &[&str]) -> AccessSnapshot {
        AccessSnapshot::from_view(
            Profile {
                id: "u1".into(),
                org_id: "o1".into(),
                email: "u1@example.com".into(),
                full_name: None,
                avatar_url: None,
            },
            Organization {
                id: "o1".into(),
                name: "Acme".into(),
                slug: "acme".into(),
            },
            AccessView {
                roles: vec!["admin".into()],
                permissions: permissions.iter().map(|p| p.to_string()).collect(),
            },
        )
    }

    #[test]
    fn any_and_all_modes() {
        let s = snapshot(&["plugins:read", "plugins:install"]);

        assert!(PermissionGate::any(["plugins:manage", "plugins:read"]).allows(&s));
        assert!(!PermissionGate::all(["plugins:manage", "plugins:read"]).allows(&s));
        assert!(PermissionGate::all(["plugins:install", "plugins:read"]).allows(&s));
    }

    #[test]
    fn single_permission_ignores_mode() {
        let s = snapshot(&["org:read"]);
        assert!(PermissionGate::all(["org:read"]).allows(&s));
        assert!(!PermissionGate::single("org:update").allows(&s));
    }

    #[test]
    fn fails_closed() {
        let s = snapshot(&["org:read"]);
        assert!(!PermissionGate::all(Vec::<String>::new()).allows(&s));
        assert!(!PermissionGate::single("org:read").allows(&AccessSnapshot::pending()));
        assert!(!PermissionGate::single("org:read").allows(&AccessSnapshot::default()));
    }

    #[test]
    fn guard_renders_or_falls_back() {
        let s = snapshot(&["settings:read"]);
        let gate = PermissionGate::single("settings:read");

        assert_eq!(gate.guard(&s, || "panel"), Some("panel"));
        assert_eq!(PermissionGate::single("audit:read").guard(&s, || "panel"), None);
        assert_eq!(
            PermissionGate::single("audit:read").guard_or(&s, || "log", || "denied"),
            "denied"
        );
    }

    #[test]
    fn require_reports_missing_permissions() {
        let s = snapshot(&[]);
        let err = PermissionGate::any(["a", "b"]).require(&s).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
        assert_eq!(err.to_string(), "permission denied: requires a or b");
    }

    #[test]
    fn role_gate() {
        let s = snapshot(&[]);
        assert!(RoleGate::new(["owner", "admin"]).allows(&s));
        assert!(!RoleGate::new(["owner"]).allows(&s));
        assert!(RoleGate::new(["owner"]).require(&s).is_err());
        assert!(!RoleGate::new(["admin"]).allows(&AccessSnapshot::pending()));
    }
}
