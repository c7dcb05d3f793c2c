//! Request and response types for the API

use serde::{Deserialize, Serialize};

use nixito_core::model::{Organization, Profile};
use nixito_core::plugins::{PluginNavItem, PluginRoute};
use nixito_core::AccessSnapshot;

// ============================================================================
// Access Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
    pub principal_id: String,
    pub profile: Option<Profile>,
    pub organization: Option<Organization>,
    pub roles: Vec<String>,
    /// Sorted for stable output
    pub permissions: Vec<String>,
    /// Set when the last resolution failed
    pub error: Option<String>,
}

impl MeResponse {
    pub fn new(principal_id: impl Into<String>, snapshot: &AccessSnapshot) -> Self {
        let mut permissions: Vec<String> = snapshot.permissions().iter().cloned().collect();
        permissions.sort();
        Self {
            principal_id: principal_id.into(),
            profile: snapshot.profile().cloned(),
            organization: snapshot.organization().cloned(),
            roles: snapshot.roles().to_vec(),
            permissions,
            error: snapshot.error().map(|e| e.to_string()),
        }
    }
}

// ============================================================================
// Plugin Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct RouteResponse {
    pub plugin_id: String,
    #[serde(flatten)]
    pub route: PluginRoute,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NavResponse {
    pub items: Vec<PluginNavItem>,
    pub routes: Vec<RouteResponse>,
}
