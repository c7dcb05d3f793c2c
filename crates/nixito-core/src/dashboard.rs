//! Composition root tying access resolution to plugin management
//!
//! A [`Dashboard`] owns one resolver, one catalog reader and one lifecycle
//! controller for a session, and shares the process-wide
//! [`PluginRegistry`]. Gates are applied here, never inside the
//! components it composes.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::json;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::access::permissions::{ORG_UPDATE, PLUGINS_INSTALL, PLUGINS_MANAGE};
use crate::access::{AccessResolver, AccessSnapshot, PermissionGate, ResolveOutcome};
use crate::error::{CoreError, CoreResult};
use crate::identity::Principal;
use crate::model::{OnboardRequest, Organization, OrganizationUpdate, ProfileUpdate};
use crate::plugins::{
    sort_nav_items, InstalledPlugin, LifecycleAction, PluginCatalog, PluginLifecycle,
    PluginNavItem, PluginRegistry, PluginRoute, PluginSummary,
};
use crate::storage::AccessStore;

pub struct Dashboard {
    store: Arc<dyn AccessStore>,
    resolver: AccessResolver,
    catalog: PluginCatalog,
    lifecycle: PluginLifecycle,
    registry: Arc<PluginRegistry>,
}

impl Dashboard {
    pub fn new(store: Arc<dyn AccessStore>, registry: Arc<PluginRegistry>) -> Self {
        Self {
            resolver: AccessResolver::new(store.clone()),
            catalog: PluginCatalog::new(store.clone()),
            lifecycle: PluginLifecycle::new(store.clone()),
            store,
            registry,
        }
    }

    pub fn resolver(&self) -> &AccessResolver {
        &self.resolver
    }

    pub fn catalog(&self) -> &PluginCatalog {
        &self.catalog
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    pub fn access(&self) -> AccessSnapshot {
        self.resolver.snapshot()
    }

    /// Resolve access for `principal`, then reload the plugin views for the
    /// resulting organization.
    pub async fn switch_principal(&self, principal: Option<Principal>) -> ResolveOutcome {
        let outcome = self.resolver.resolve(principal).await;
        self.reload_plugins().await;
        outcome
    }

    /// Follow an identity channel until its sender is dropped
    pub async fn follow_identity(&self, mut identity: watch::Receiver<Option<Principal>>) {
        loop {
            let principal = identity.borrow_and_update().clone();
            self.switch_principal(principal).await;
            if identity.changed().await.is_err() {
                break;
            }
        }
    }

    pub async fn reload_plugins(&self) -> bool {
        let access = self.resolver.snapshot();
        self.catalog.reload(access.organization()).await
    }

    pub fn installed_plugins(&self) -> Vec<InstalledPlugin> {
        self.catalog.installed()
    }

    pub fn available_plugins(&self) -> Vec<PluginSummary> {
        self.catalog.available()
    }

    pub async fn install_plugin(&self, plugin_id: &str) -> CoreResult<()> {
        self.mutate(LifecycleAction::Install, PLUGINS_INSTALL, plugin_id)
            .await
    }

    pub async fn enable_plugin(&self, plugin_id: &str) -> CoreResult<()> {
        self.mutate(LifecycleAction::Enable, PLUGINS_MANAGE, plugin_id)
            .await
    }

    pub async fn disable_plugin(&self, plugin_id: &str) -> CoreResult<()> {
        self.mutate(LifecycleAction::Disable, PLUGINS_MANAGE, plugin_id)
            .await
    }

    async fn mutate(
        &self,
        action: LifecycleAction,
        permission: &str,
        plugin_id: &str,
    ) -> CoreResult<()> {
        let access = self.resolver.snapshot();
        PermissionGate::single(permission).require(&access)?;
        let org = access.organization();

        self.lifecycle.apply(action, org, plugin_id).await?;

        match action {
            LifecycleAction::Enable => {
                if let Err(e) = self.registry.activate(plugin_id).await {
                    return self.fail_enable(org, plugin_id, e).await;
                }
            }
            LifecycleAction::Disable => {
                if let Err(e) = self.registry.deactivate(plugin_id).await {
                    warn!(plugin_id = %plugin_id, error = %e, "Plugin on_disable hook failed");
                }
            }
            LifecycleAction::Install => {}
        }

        self.catalog.reload_installed(org).await;
        self.registry
            .emit(
                action.event_type(),
                json!({
                    "org_id": org.map(|o| o.id.as_str()),
                    "plugin_id": plugin_id,
                }),
            )
            .await;
        Ok(())
    }

    async fn fail_enable(
        &self,
        org: Option<&Organization>,
        plugin_id: &str,
        cause: anyhow::Error,
    ) -> CoreResult<()> {
        let org = org.ok_or_else(CoreError::no_organization)?;
        let message = cause.to_string();
        warn!(org_id = %org.id, plugin_id = %plugin_id, error = %message, "Plugin on_enable hook failed");

        self.store
            .mark_plugin_error(&org.id, plugin_id, &message)
            .await?;
        self.catalog.reload_installed(Some(org)).await;
        Err(CoreError::Conflict(format!(
            "plugin '{}' failed to enable: {}",
            plugin_id, message
        )))
    }

    /// Nav items of plugins that are both enabled for the organization and
    /// registered in this process, stably sorted by `order`.
    pub fn nav_items(&self) -> Vec<PluginNavItem> {
        let enabled = self.enabled_ids();
        let mut items: Vec<PluginNavItem> = self
            .registry
            .manifests()
            .into_iter()
            .filter(|m| enabled.contains(&m.id))
            .flat_map(|m| m.nav)
            .collect();
        sort_nav_items(&mut items);
        items
    }

    /// Routes of enabled, registered plugins the current principal may view
    pub fn visible_routes(&self) -> Vec<(String, PluginRoute)> {
        let enabled = self.enabled_ids();
        let access = self.resolver.snapshot();
        self.registry
            .all_routes()
            .into_iter()
            .filter(|(plugin_id, _)| enabled.contains(plugin_id))
            .filter(|(_, route)| match &route.permission {
                Some(permission) => access.has_permission(permission),
                None => !access.is_loading(),
            })
            .collect()
    }

    fn enabled_ids(&self) -> HashSet<String> {
        self.catalog
            .enabled()
            .into_iter()
            .map(|p| p.summary.plugin_id)
            .collect()
    }

    /// Update the current principal's own profile
    pub async fn save_profile(&self, update: &ProfileUpdate) -> CoreResult<()> {
        let principal = self
            .resolver
            .principal()
            .ok_or_else(|| CoreError::Precondition("not signed in".to_string()))?;
        self.store.update_profile(&principal.id, update).await?;
        self.resolver.refresh().await;
        Ok(())
    }

    /// Update the current organization; requires `org:update`
    pub async fn save_organization(&self, update: &OrganizationUpdate) -> CoreResult<()> {
        let access = self.resolver.snapshot();
        PermissionGate::single(ORG_UPDATE).require(&access)?;
        let org = access.require_organization()?;

        self.store.update_organization(&org.id, update).await?;
        info!(org_id = %org.id, "Organization settings updated");
        self.resolver.refresh().await;
        Ok(())
    }

    /// First-run setup: create an organization owned by the current principal
    pub async fn onboard(&self, request: &OnboardRequest) -> CoreResult<Organization> {
        let principal = self
            .resolver
            .principal()
            .ok_or_else(|| CoreError::Precondition("not signed in".to_string()))?;

        let org = self.store.onboard(&principal, request).await?;
        self.switch_principal(Some(principal.clone())).await;
        self.registry
            .emit(
                "user.created",
                json!({ "user_id": principal.id, "org_id": org.id }),
            )
            .await;
        Ok(org)
    }
}
