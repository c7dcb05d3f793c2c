//! Data-access surface consumed from the storage collaborator

use async_trait::async_trait;

use crate::error::CoreResult;
use crate::identity::Principal;
use crate::model::{
    AccessView, OnboardRequest, Organization, OrganizationUpdate, Profile, ProfileUpdate,
};
use crate::plugins::{PluginInstallation, PluginSummary};

/// Request/response pairs the core relies on. Implementations own
/// uniqueness enforcement and their own authorization.
#[async_trait]
pub trait AccessStore: Send + Sync {
    async fn get_profile(&self, principal_id: &str) -> CoreResult<Profile>;

    async fn get_access_view(&self, principal_id: &str) -> CoreResult<AccessView>;

    async fn get_organization(&self, org_id: &str) -> CoreResult<Organization>;

    async fn list_catalog_plugins(&self, active_only: bool) -> CoreResult<Vec<PluginSummary>>;

    async fn list_installations(&self, org_id: &str) -> CoreResult<Vec<PluginInstallation>>;

    /// Idempotent per `(org_id, plugin_id)`
    async fn install_plugin(&self, org_id: &str, plugin_id: &str) -> CoreResult<()>;

    /// Fails with `NotInstalled` when no row exists
    async fn enable_plugin(&self, org_id: &str, plugin_id: &str) -> CoreResult<()>;

    /// Accepts an already-disabled row
    async fn disable_plugin(&self, org_id: &str, plugin_id: &str) -> CoreResult<()>;

    async fn mark_plugin_error(&self, org_id: &str, plugin_id: &str, message: &str)
        -> CoreResult<()>;

    async fn update_profile(&self, principal_id: &str, fields: &ProfileUpdate) -> CoreResult<()>;

    async fn update_organization(&self, org_id: &str, fields: &OrganizationUpdate)
        -> CoreResult<()>;

    /// Create an organization and an owner profile for a new principal
    async fn onboard(&self, principal: &Principal, request: &OnboardRequest)
        -> CoreResult<Organization>;
}
