//! SQLite-backed implementation of [`AccessStore`]
//!
//! Plays the part of the remote storage collaborator for self-hosted
//! deployments and tests. Plugin state transitions are enforced here, the
//! same way a remote RPC layer would enforce them.

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use serde_json::Value;

use super::database::{Database, SharedDatabase};
use super::store::AccessStore;
use crate::access::permissions::{default_role_permissions, PLUGIN_PERMISSION_ROLES, SYSTEM_ROLES};
use crate::error::{CoreError, CoreResult};
use crate::identity::Principal;
use crate::model::{
    AccessView, OnboardRequest, Organization, OrganizationUpdate, Profile, ProfileUpdate,
};
use crate::plugins::{PluginInstallation, PluginManifest, PluginState, PluginSummary};
use crate::slug::{is_valid_slug, slugify};

pub struct SqliteStore {
    db: SharedDatabase,
}

impl SqliteStore {
    /// Wrap an existing handle. Call [`SqliteStore::seed_system_roles`]
    /// before onboarding anyone.
    pub fn new(db: SharedDatabase) -> Self {
        Self { db }
    }

    /// Open the database at `path` and seed the system roles
    pub fn open(path: &Path) -> Result<Self> {
        let store = Self::new(Database::new(path)?.into_shared());
        store.seed_system_roles()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let store = Self::new(Database::in_memory()?.into_shared());
        store.seed_system_roles()?;
        Ok(store)
    }

    pub fn db(&self) -> &SharedDatabase {
        &self.db
    }

    /// Insert the owner/admin/member/viewer roles with their default grants.
    /// Existing grants are left alone.
    pub fn seed_system_roles(&self) -> CoreResult<()> {
        let mut db = self.db.lock();
        let tx = db.conn_mut().transaction()?;
        for role in SYSTEM_ROLES {
            tx.execute(
                "INSERT OR IGNORE INTO roles (name, description) VALUES (?1, ?2)",
                params![role, format!("System role: {}", role)],
            )?;
            for permission in default_role_permissions(role) {
                tx.execute(
                    "INSERT OR IGNORE INTO role_permissions (role_name, permission) VALUES (?1, ?2)",
                    params![role, permission],
                )?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Publish (or refresh) a catalog entry from a manifest. The manifest's
    /// declared permissions are granted to the owner and admin roles.
    pub fn upsert_catalog_plugin(&self, manifest: &PluginManifest, active: bool) -> CoreResult<()> {
        let nav = serde_json::to_string(&manifest.nav)
            .map_err(|e| CoreError::Transport(e.to_string()))?;
        let permissions = serde_json::to_string(&manifest.permissions)
            .map_err(|e| CoreError::Transport(e.to_string()))?;

        let mut db = self.db.lock();
        let tx = db.conn_mut().transaction()?;
        tx.execute(
            "INSERT INTO plugins (id, name, description, version, author, nav_items, permissions, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 description = excluded.description,
                 version = excluded.version,
                 author = excluded.author,
                 nav_items = excluded.nav_items,
                 permissions = excluded.permissions,
                 is_active = excluded.is_active",
            params![
                manifest.id,
                manifest.name,
                manifest.description,
                manifest.version,
                manifest.author,
                nav,
                permissions,
                active as i32,
                Utc::now().to_rfc3339(),
            ],
        )?;
        // Roles that were never seeded are skipped
        for role in PLUGIN_PERMISSION_ROLES {
            for permission in &manifest.permissions {
                tx.execute(
                    "INSERT OR IGNORE INTO role_permissions (role_name, permission)
                     SELECT name, ?2 FROM roles WHERE name = ?1",
                    params![role, permission],
                )?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Grant a role to a profile
    pub fn grant_role(&self, user_id: &str, role: &str) -> CoreResult<()> {
        self.db.lock().conn().execute(
            "INSERT OR IGNORE INTO user_roles (user_id, role_name, granted_at) VALUES (?1, ?2, ?3)",
            params![user_id, role, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn installation_state(
        conn: &rusqlite::Connection,
        org_id: &str,
        plugin_id: &str,
    ) -> CoreResult<Option<PluginState>> {
        let state: Option<String> = conn
            .query_row(
                "SELECT state FROM plugin_installations WHERE org_id = ?1 AND plugin_id = ?2",
                params![org_id, plugin_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(state.map(|s| PluginState::parse(&s).unwrap_or(PluginState::Error)))
    }

    fn map_summary_row(row: &rusqlite::Row) -> rusqlite::Result<PluginSummary> {
        let nav_json: String = row.get(5)?;
        let permissions_json: String = row.get(6)?;
        Ok(PluginSummary {
            plugin_id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            latest_version: row.get(3)?,
            author: row.get(4)?,
            nav_items: serde_json::from_str(&nav_json).unwrap_or_default(),
            declared_permissions: serde_json::from_str(&permissions_json).unwrap_or_default(),
        })
    }

    fn map_installation_row(row: &rusqlite::Row) -> rusqlite::Result<PluginInstallation> {
        let state: String = row.get(2)?;
        let config: String = row.get(4)?;
        let installed_at: String = row.get(5)?;
        let enabled_at: Option<String> = row.get(6)?;
        Ok(PluginInstallation {
            org_id: row.get(0)?,
            plugin_id: row.get(1)?,
            state: PluginState::parse(&state).unwrap_or(PluginState::Error),
            version: row.get(3)?,
            config: serde_json::from_str(&config)
                .unwrap_or_else(|_| Value::Object(Default::default())),
            installed_at: parse_timestamp(&installed_at),
            enabled_at: enabled_at.as_deref().map(parse_timestamp),
            last_error: row.get(7)?,
        })
    }
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Deduplicate while keeping first-seen order
fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}

#[async_trait]
impl AccessStore for SqliteStore {
    async fn get_profile(&self, principal_id: &str) -> CoreResult<Profile> {
        self.db
            .lock()
            .conn()
            .query_row(
                "SELECT id, org_id, email, full_name, avatar_url FROM profiles WHERE id = ?1",
                [principal_id],
                |row| {
                    Ok(Profile {
                        id: row.get(0)?,
                        org_id: row.get(1)?,
                        email: row.get(2)?,
                        full_name: row.get(3)?,
                        avatar_url: row.get(4)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| CoreError::not_found("profile", principal_id))
    }

    async fn get_access_view(&self, principal_id: &str) -> CoreResult<AccessView> {
        let db = self.db.lock();
        let conn = db.conn();

        let exists: Option<i64> = conn
            .query_row("SELECT 1 FROM profiles WHERE id = ?1", [principal_id], |row| {
                row.get(0)
            })
            .optional()?;
        if exists.is_none() {
            return Err(CoreError::not_found("access view", principal_id));
        }

        let mut stmt = conn.prepare(
            "SELECT role_name, permission FROM v_user_access
             WHERE user_id = ?1 ORDER BY granted_at, role_name, permission",
        )?;
        let rows = stmt
            .query_map([principal_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut view = AccessView::default();
        for (role, permission) in rows {
            push_unique(&mut view.roles, role);
            if let Some(permission) = permission {
                push_unique(&mut view.permissions, permission);
            }
        }
        Ok(view)
    }

    async fn get_organization(&self, org_id: &str) -> CoreResult<Organization> {
        self.db
            .lock()
            .conn()
            .query_row(
                "SELECT id, name, slug FROM organizations WHERE id = ?1",
                [org_id],
                |row| {
                    Ok(Organization {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        slug: row.get(2)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| CoreError::not_found("organization", org_id))
    }

    async fn list_catalog_plugins(&self, active_only: bool) -> CoreResult<Vec<PluginSummary>> {
        let db = self.db.lock();
        let mut stmt = db.conn().prepare(
            "SELECT id, name, description, version, author, nav_items, permissions
             FROM plugins WHERE (?1 = 0 OR is_active = 1)
             ORDER BY created_at, id",
        )?;
        let plugins = stmt
            .query_map([active_only as i32], Self::map_summary_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(plugins)
    }

    async fn list_installations(&self, org_id: &str) -> CoreResult<Vec<PluginInstallation>> {
        let db = self.db.lock();
        let mut stmt = db.conn().prepare(
            "SELECT org_id, plugin_id, state, version, config, installed_at, enabled_at, last_error
             FROM plugin_installations WHERE org_id = ?1
             ORDER BY installed_at, plugin_id",
        )?;
        let rows = stmt
            .query_map([org_id], Self::map_installation_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    async fn install_plugin(&self, org_id: &str, plugin_id: &str) -> CoreResult<()> {
        let db = self.db.lock();
        let conn = db.conn();

        let version: Option<String> = conn
            .query_row(
                "SELECT version FROM plugins WHERE id = ?1 AND is_active = 1",
                [plugin_id],
                |row| row.get(0),
            )
            .optional()?;
        let version = version.ok_or_else(|| CoreError::not_found("plugin", plugin_id))?;

        // A row already present is left alone unless it is in `error`,
        // in which case installing again resets it.
        conn.execute(
            "INSERT INTO plugin_installations (org_id, plugin_id, state, version, config, installed_at)
             VALUES (?1, ?2, 'installed', ?3, '{}', ?4)
             ON CONFLICT(org_id, plugin_id) DO UPDATE SET
                 state = 'installed',
                 version = excluded.version,
                 installed_at = excluded.installed_at,
                 enabled_at = NULL,
                 last_error = NULL
             WHERE plugin_installations.state = 'error'",
            params![org_id, plugin_id, version, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    async fn enable_plugin(&self, org_id: &str, plugin_id: &str) -> CoreResult<()> {
        let db = self.db.lock();
        let conn = db.conn();

        match Self::installation_state(conn, org_id, plugin_id)? {
            None => Err(CoreError::NotInstalled {
                plugin_id: plugin_id.to_string(),
            }),
            Some(PluginState::Enabled) => Ok(()),
            Some(state) if state.can_enable() => {
                conn.execute(
                    "UPDATE plugin_installations SET state = 'enabled', enabled_at = ?3
                     WHERE org_id = ?1 AND plugin_id = ?2",
                    params![org_id, plugin_id, Utc::now().to_rfc3339()],
                )?;
                Ok(())
            }
            Some(state) => Err(CoreError::Conflict(format!(
                "cannot enable plugin '{}' from state {}",
                plugin_id, state
            ))),
        }
    }

    async fn disable_plugin(&self, org_id: &str, plugin_id: &str) -> CoreResult<()> {
        let db = self.db.lock();
        let conn = db.conn();

        match Self::installation_state(conn, org_id, plugin_id)? {
            None => Err(CoreError::NotInstalled {
                plugin_id: plugin_id.to_string(),
            }),
            Some(PluginState::Disabled) => Ok(()),
            Some(state) if state.can_disable() => {
                conn.execute(
                    "UPDATE plugin_installations SET state = 'disabled'
                     WHERE org_id = ?1 AND plugin_id = ?2",
                    params![org_id, plugin_id],
                )?;
                Ok(())
            }
            Some(state) => Err(CoreError::Conflict(format!(
                "cannot disable plugin '{}' from state {}",
                plugin_id, state
            ))),
        }
    }

    async fn mark_plugin_error(
        &self,
        org_id: &str,
        plugin_id: &str,
        message: &str,
    ) -> CoreResult<()> {
        let updated = self.db.lock().conn().execute(
            "UPDATE plugin_installations SET state = 'error', last_error = ?3
             WHERE org_id = ?1 AND plugin_id = ?2",
            params![org_id, plugin_id, message],
        )?;
        if updated == 0 {
            return Err(CoreError::NotInstalled {
                plugin_id: plugin_id.to_string(),
            });
        }
        Ok(())
    }

    async fn update_profile(&self, principal_id: &str, fields: &ProfileUpdate) -> CoreResult<()> {
        let updated = self.db.lock().conn().execute(
            "UPDATE profiles SET
                 full_name = COALESCE(?2, full_name),
                 avatar_url = COALESCE(?3, avatar_url)
             WHERE id = ?1",
            params![principal_id, fields.full_name, fields.avatar_url],
        )?;
        if updated == 0 {
            return Err(CoreError::not_found("profile", principal_id));
        }
        Ok(())
    }

    async fn update_organization(
        &self,
        org_id: &str,
        fields: &OrganizationUpdate,
    ) -> CoreResult<()> {
        if let Some(name) = &fields.name {
            if name.trim().is_empty() {
                return Err(CoreError::Precondition(
                    "organization name cannot be empty".to_string(),
                ));
            }
        }

        let updated = self.db.lock().conn().execute(
            "UPDATE organizations SET name = COALESCE(?2, name) WHERE id = ?1",
            params![org_id, fields.name.as_deref().map(str::trim)],
        )?;
        if updated == 0 {
            return Err(CoreError::not_found("organization", org_id));
        }
        Ok(())
    }

    async fn onboard(
        &self,
        principal: &Principal,
        request: &OnboardRequest,
    ) -> CoreResult<Organization> {
        let slug = match request.org_slug.as_deref() {
            Some(explicit) if !explicit.trim().is_empty() => slugify(explicit),
            _ => slugify(&request.org_name),
        };
        if request.org_name.trim().is_empty() || !is_valid_slug(&slug) {
            return Err(CoreError::Precondition(
                "organization name must contain at least one letter or digit".to_string(),
            ));
        }

        let org = Organization {
            id: uuid::Uuid::new_v4().to_string(),
            name: request.org_name.trim().to_string(),
            slug,
        };
        let now = Utc::now().to_rfc3339();

        let mut db = self.db.lock();
        let tx = db.conn_mut().transaction()?;

        let existing: Option<String> = tx
            .query_row(
                "SELECT org_id FROM profiles WHERE id = ?1",
                [&principal.id],
                |row| row.get(0),
            )
            .optional()?;
        if existing.is_some() {
            return Err(CoreError::Conflict(format!(
                "principal {} already belongs to an organization",
                principal.id
            )));
        }

        tx.execute(
            "INSERT INTO organizations (id, name, slug, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![org.id, org.name, org.slug, now],
        )?;
        tx.execute(
            "INSERT INTO profiles (id, org_id, email, full_name, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                principal.id,
                org.id,
                principal.email.clone().unwrap_or_default(),
                request.full_name,
                now
            ],
        )?;
        tx.execute(
            "INSERT INTO user_roles (user_id, role_name, granted_at) VALUES (?1, 'owner', ?2)",
            params![principal.id, now],
        )?;
        tx.commit()?;

        tracing::info!(org_id = %org.id, slug = %org.slug, principal = %principal.id, "Onboarded organization");
        Ok(org)
    }
}
