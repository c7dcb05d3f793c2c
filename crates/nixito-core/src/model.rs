//! Tenant records shared by the resolver and the storage collaborator

use serde::{Deserialize, Serialize};

/// Durable per-principal profile. `org_id` never changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub org_id: String,
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Tenant boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
    pub slug: String,
}

/// Pre-resolved roles and permissions for a principal
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccessView {
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// Editable profile fields. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Editable organization fields. The slug is not editable here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrganizationUpdate {
    #[serde(default)]
    pub name: Option<String>,
}

/// First-run setup for a freshly signed-up principal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnboardRequest {
    pub org_name: String,
    /// Explicit slug; derived from `org_name` when absent or blank
    #[serde(default)]
    pub org_slug: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
}
