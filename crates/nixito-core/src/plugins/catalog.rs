//! Reader for the global plugin catalog and an organization's installations

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::warn;

use super::types::{InstalledPlugin, PluginSummary};
use crate::error::{CoreError, CoreResult};
use crate::model::Organization;
use crate::storage::AccessStore;

/// Last-known-good catalog data plus loading flag and one error slot per view
#[derive(Debug, Clone, Default)]
pub struct CatalogState {
    pub catalog: Vec<PluginSummary>,
    pub installed: Vec<InstalledPlugin>,
    pub loading: bool,
    pub catalog_error: Option<Arc<CoreError>>,
    pub installed_error: Option<Arc<CoreError>>,
}

impl CatalogState {
    /// First failure of either view, catalog first
    pub fn error(&self) -> Option<&CoreError> {
        self.catalog_error
            .as_deref()
            .or(self.installed_error.as_deref())
    }
}

/// Catalog entries whose id has no installation row, in catalog order
pub fn not_installed(catalog: &[PluginSummary], installed: &[InstalledPlugin]) -> Vec<PluginSummary> {
    let installed_ids: HashSet<&str> = installed.iter().map(InstalledPlugin::plugin_id).collect();
    catalog
        .iter()
        .filter(|p| !installed_ids.contains(p.plugin_id.as_str()))
        .cloned()
        .collect()
}

pub struct PluginCatalog {
    store: Arc<dyn AccessStore>,
    state: RwLock<CatalogState>,
}

impl PluginCatalog {
    pub fn new(store: Arc<dyn AccessStore>) -> Self {
        Self {
            store,
            state: RwLock::new(CatalogState::default()),
        }
    }

    pub fn state(&self) -> CatalogState {
        self.state.read().clone()
    }

    pub fn catalog(&self) -> Vec<PluginSummary> {
        self.state.read().catalog.clone()
    }

    pub fn installed(&self) -> Vec<InstalledPlugin> {
        self.state.read().installed.clone()
    }

    /// Catalog minus installed ids, recomputed on every call
    pub fn available(&self) -> Vec<PluginSummary> {
        let state = self.state.read();
        not_installed(&state.catalog, &state.installed)
    }

    pub fn enabled(&self) -> Vec<InstalledPlugin> {
        self.state
            .read()
            .installed
            .iter()
            .filter(|p| p.is_enabled())
            .cloned()
            .collect()
    }

    /// Reload active catalog entries. Returns false when the read failed;
    /// the error is kept in the state and previous data stays in place.
    pub async fn reload_catalog(&self) -> bool {
        self.state.write().loading = true;
        let result = self.store.list_catalog_plugins(true).await;

        let mut state = self.state.write();
        state.loading = false;
        match result {
            Ok(catalog) => {
                state.catalog = catalog;
                state.catalog_error = None;
                true
            }
            Err(err) => {
                warn!(error = %err, "Failed to load plugin catalog");
                state.catalog_error = Some(Arc::new(err));
                false
            }
        }
    }

    /// Reload the organization's installation rows joined with catalog
    /// display fields. With no organization the installed view is empty.
    pub async fn reload_installed(&self, org: Option<&Organization>) -> bool {
        let Some(org) = org else {
            let mut state = self.state.write();
            state.installed.clear();
            state.installed_error = None;
            state.loading = false;
            return true;
        };

        self.state.write().loading = true;
        let result = self.load_installed(&org.id).await;

        let mut state = self.state.write();
        state.loading = false;
        match result {
            Ok(installed) => {
                state.installed = installed;
                state.installed_error = None;
                true
            }
            Err(err) => {
                warn!(org_id = %org.id, error = %err, "Failed to load installed plugins");
                state.installed_error = Some(Arc::new(err));
                false
            }
        }
    }

    /// Reload both views
    pub async fn reload(&self, org: Option<&Organization>) -> bool {
        let catalog_ok = self.reload_catalog().await;
        let installed_ok = self.reload_installed(org).await;
        catalog_ok && installed_ok
    }

    async fn load_installed(&self, org_id: &str) -> CoreResult<Vec<InstalledPlugin>> {
        // Inactive catalog entries still provide display fields for rows
        // installed before they were retired.
        let (rows, catalog) = futures::try_join!(
            self.store.list_installations(org_id),
            self.store.list_catalog_plugins(false)
        )?;
        let by_id: HashMap<&str, &PluginSummary> =
            catalog.iter().map(|p| (p.plugin_id.as_str(), p)).collect();

        Ok(rows
            .into_iter()
            .map(|row| {
                let summary = by_id.get(row.plugin_id.as_str()).copied();
                InstalledPlugin::from_parts(row, summary)
            })
            .collect())
    }
}
