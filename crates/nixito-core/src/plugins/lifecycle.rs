//! Install/enable/disable against the storage collaborator
//!
//! One remote call per operation: no optimistic local state and no retry.
//! Gating happens at the call site, and callers reload the installed view.

use std::sync::Arc;

use tracing::info;

use crate::error::{CoreError, CoreResult};
use crate::model::Organization;
use crate::storage::AccessStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    Install,
    Enable,
    Disable,
}

impl LifecycleAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleAction::Install => "install",
            LifecycleAction::Enable => "enable",
            LifecycleAction::Disable => "disable",
        }
    }

    /// Event emitted to the runtime registry after a successful mutation
    pub fn event_type(&self) -> &'static str {
        match self {
            LifecycleAction::Install => "plugin.installed",
            LifecycleAction::Enable => "plugin.enabled",
            LifecycleAction::Disable => "plugin.disabled",
        }
    }
}

pub struct PluginLifecycle {
    store: Arc<dyn AccessStore>,
}

impl PluginLifecycle {
    pub fn new(store: Arc<dyn AccessStore>) -> Self {
        Self { store }
    }

    pub async fn install(&self, org: Option<&Organization>, plugin_id: &str) -> CoreResult<()> {
        self.apply(LifecycleAction::Install, org, plugin_id).await
    }

    pub async fn enable(&self, org: Option<&Organization>, plugin_id: &str) -> CoreResult<()> {
        self.apply(LifecycleAction::Enable, org, plugin_id).await
    }

    pub async fn disable(&self, org: Option<&Organization>, plugin_id: &str) -> CoreResult<()> {
        self.apply(LifecycleAction::Disable, org, plugin_id).await
    }

    pub async fn apply(
        &self,
        action: LifecycleAction,
        org: Option<&Organization>,
        plugin_id: &str,
    ) -> CoreResult<()> {
        let org = org.ok_or_else(CoreError::no_organization)?;

        match action {
            LifecycleAction::Install => self.store.install_plugin(&org.id, plugin_id).await?,
            LifecycleAction::Enable => self.store.enable_plugin(&org.id, plugin_id).await?,
            LifecycleAction::Disable => self.store.disable_plugin(&org.id, plugin_id).await?,
        }

        info!(org_id = %org.id, plugin_id = %plugin_id, action = action.as_str(), "Plugin lifecycle change");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::identity::Principal;
    use crate::model::OnboardRequest;
    use crate::plugins::{PluginManifest, PluginState};
    use crate::storage::SqliteStore;

    #[tokio::test]
    async fn missing_organization_never_reaches_storage() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let lifecycle = PluginLifecycle::new(store);

        let err = lifecycle.install(None, "notes").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Precondition);
    }

    #[tokio::test]
    async fn state_machine_through_controller() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        store
            .upsert_catalog_plugin(&PluginManifest::new("a", "A", "1.0.0"), true)
            .unwrap();
        let org = store
            .onboard(
                &Principal::new("u1"),
                &OnboardRequest {
                    org_name: "Acme".into(),
                    org_slug: None,
                    full_name: None,
                },
            )
            .await
            .unwrap();
        let lifecycle = PluginLifecycle::new(store.clone());

        let err = lifecycle.enable(Some(&org), "a").await.unwrap_err();
        assert!(matches!(err, CoreError::NotInstalled { .. }));

        lifecycle.install(Some(&org), "a").await.unwrap();
        let err = lifecycle.disable(Some(&org), "a").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        lifecycle.enable(Some(&org), "a").await.unwrap();
        lifecycle.disable(Some(&org), "a").await.unwrap();
        lifecycle.enable(Some(&org), "a").await.unwrap();

        let rows = store.list_installations(&org.id).await.unwrap();
        assert_eq!(rows[0].state, PluginState::Enabled);
    }
}
