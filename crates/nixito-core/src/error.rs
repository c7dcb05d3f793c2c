//! Error taxonomy shared by the access and plugin subsystems
//!
//! Every failure surfaced by the core falls into one of four classes:
//! - NotFound: a referenced row is absent
//! - Precondition: required local context (principal, organization) is missing
//! - Conflict: a uniqueness or state-transition violation in storage
//! - Transport: anything else coming back from the storage collaborator

use thiserror::Error;

/// Coarse classification used by callers that only care about the class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Precondition,
    Conflict,
    PermissionDenied,
    Transport,
}

/// Errors returned by the core.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Referenced row does not exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Operation invoked without the context it needs
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// Uniqueness or state-transition violation reported by storage
    #[error("conflict: {0}")]
    Conflict(String),

    /// Lifecycle call on a plugin with no installation row for the organization
    #[error("plugin '{plugin_id}' is not installed")]
    NotInstalled { plugin_id: String },

    /// Permission gate denied the action
    #[error("permission denied: requires {0}")]
    PermissionDenied(String),

    /// Any other failure from the storage collaborator
    #[error("storage error: {0}")]
    Transport(String),
}

impl CoreError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn no_organization() -> Self {
        CoreError::Precondition("no organization context".to_string())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::NotFound { .. } => ErrorKind::NotFound,
            CoreError::Precondition(_) => ErrorKind::Precondition,
            CoreError::Conflict(_) | CoreError::NotInstalled { .. } => ErrorKind::Conflict,
            CoreError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            CoreError::Transport(_) => ErrorKind::Transport,
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(ref code, ref msg)
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                CoreError::Conflict(msg.clone().unwrap_or_else(|| err.to_string()))
            }
            other => CoreError::Transport(other.to_string()),
        }
    }
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_installed_is_conflict_class() {
        let err = CoreError::NotInstalled {
            plugin_id: "notes".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(err.to_string(), "plugin 'notes' is not installed");
    }

    #[test]
    fn non_constraint_sqlite_errors_are_transport() {
        let err: CoreError = rusqlite::Error::QueryReturnedNoRows.into();
        assert_eq!(err.kind(), ErrorKind::Transport);
    }
}
