//! SQLite connection and schema

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use rusqlite::Connection;

/// Database handle shared between async tasks. Never hold the guard across `.await`.
pub type SharedDatabase = Arc<Mutex<Database>>;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS organizations (
    id         TEXT PRIMARY KEY,
    name       TEXT NOT NULL,
    slug       TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS profiles (
    id         TEXT PRIMARY KEY,
    org_id     TEXT NOT NULL REFERENCES organizations(id),
    email      TEXT NOT NULL,
    full_name  TEXT,
    avatar_url TEXT,
    created_at TEXT NOT NULL
);

CREATE TRIGGER IF NOT EXISTS profiles_org_id_immutable
BEFORE UPDATE OF org_id ON profiles
WHEN NEW.org_id IS NOT OLD.org_id
BEGIN
    SELECT RAISE(ABORT, 'profile org_id is immutable');
END;

CREATE TABLE IF NOT EXISTS roles (
    name        TEXT PRIMARY KEY,
    description TEXT
);

CREATE TABLE IF NOT EXISTS role_permissions (
    role_name  TEXT NOT NULL REFERENCES roles(name) ON DELETE CASCADE,
    permission TEXT NOT NULL,
    PRIMARY KEY (role_name, permission)
);

CREATE TABLE IF NOT EXISTS user_roles (
    user_id    TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
    role_name  TEXT NOT NULL REFERENCES roles(name) ON DELETE CASCADE,
    granted_at TEXT NOT NULL,
    PRIMARY KEY (user_id, role_name)
);

CREATE VIEW IF NOT EXISTS v_user_access AS
SELECT ur.user_id AS user_id,
       ur.role_name AS role_name,
       rp.permission AS permission,
       ur.granted_at AS granted_at
FROM user_roles ur
LEFT JOIN role_permissions rp ON rp.role_name = ur.role_name;

CREATE TABLE IF NOT EXISTS plugins (
    id          TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    description TEXT,
    version     TEXT NOT NULL,
    author      TEXT,
    nav_items   TEXT NOT NULL DEFAULT '[]',
    permissions TEXT NOT NULL DEFAULT '[]',
    is_active   INTEGER NOT NULL DEFAULT 1,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS plugin_installations (
    org_id       TEXT NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
    plugin_id    TEXT NOT NULL REFERENCES plugins(id),
    state        TEXT NOT NULL CHECK (state IN ('installed', 'disabled', 'enabled', 'error')),
    version      TEXT NOT NULL,
    config       TEXT NOT NULL DEFAULT '{}',
    installed_at TEXT NOT NULL,
    enabled_at   TEXT,
    last_error   TEXT,
    PRIMARY KEY (org_id, plugin_id)
);
";

/// SQLite database with the tenant and plugin schema applied
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the database at `path` and apply the schema
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database {}", path.display()))?;
        Self::from_connection(conn)
    }

    /// In-memory database, used by tests and ephemeral deployments
    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA).context("failed to apply schema")?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    pub fn into_shared(self) -> SharedDatabase {
        Arc::new(Mutex::new(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn schema_is_idempotent() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("nested").join("test.db");

        Database::new(&db_path).expect("first open");
        let db = Database::new(&db_path).expect("second open");

        let tables: i64 = db
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name LIKE 'plugin%'",
                [],
                |row| row.get(0),
            )
            .expect("count tables");
        assert_eq!(tables, 2);
    }
}
