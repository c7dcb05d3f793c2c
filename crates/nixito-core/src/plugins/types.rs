//! Plugin manifests, installation rows and the catalog views built from them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Navigation item injected by a plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginNavItem {
    pub label: String,
    pub href: String,
    pub icon: String,
    #[serde(default)]
    pub parent: Option<String>,
    /// Sort key; missing is treated as 0
    #[serde(default)]
    pub order: Option<i32>,
}

impl PluginNavItem {
    pub fn new(label: impl Into<String>, href: impl Into<String>, icon: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            href: href.into(),
            icon: icon.into(),
            parent: None,
            order: None,
        }
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = Some(order);
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn sort_key(&self) -> i32 {
        self.order.unwrap_or(0)
    }
}

/// Stable sort by `order`, missing orders as 0, ties keep input order.
pub fn sort_nav_items(items: &mut [PluginNavItem]) {
    items.sort_by_key(PluginNavItem::sort_key);
}

/// Static plugin descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginManifest {
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub homepage: Option<String>,
    /// Permissions this plugin declares
    #[serde(default)]
    pub permissions: Vec<String>,
    /// Reserved; no ordering or resolution is derived from it
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub nav: Vec<PluginNavItem>,
    /// Schema name for plugin data
    pub schema: String,
    #[serde(default, alias = "configSchema")]
    pub config_schema: Option<Value>,
}

impl PluginManifest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, version: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            schema: format!("plugin_{}", id.replace(['-', '.'], "_")),
            id,
            name: name.into(),
            version: version.into(),
            description: None,
            author: None,
            homepage: None,
            permissions: Vec::new(),
            dependencies: Vec::new(),
            nav: Vec::new(),
            config_schema: None,
        }
    }
}

/// Per-organization adoption state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginState {
    Installed,
    Disabled,
    Enabled,
    Error,
}

impl PluginState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PluginState::Installed => "installed",
            PluginState::Disabled => "disabled",
            PluginState::Enabled => "enabled",
            PluginState::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "installed" => Some(PluginState::Installed),
            "disabled" => Some(PluginState::Disabled),
            "enabled" => Some(PluginState::Enabled),
            "error" => Some(PluginState::Error),
            _ => None,
        }
    }

    pub fn can_enable(&self) -> bool {
        matches!(
            self,
            PluginState::Installed | PluginState::Disabled | PluginState::Enabled
        )
    }

    pub fn can_disable(&self) -> bool {
        matches!(self, PluginState::Enabled | PluginState::Disabled)
    }
}

impl std::fmt::Display for PluginState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Installation record, unique per `(org_id, plugin_id)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginInstallation {
    pub org_id: String,
    pub plugin_id: String,
    pub state: PluginState,
    pub version: String,
    #[serde(default)]
    pub config: Value,
    pub installed_at: DateTime<Utc>,
    #[serde(default)]
    pub enabled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_error: Option<String>,
}

/// Catalog-level definition of an installable plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginSummary {
    pub plugin_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub latest_version: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub nav_items: Vec<PluginNavItem>,
    #[serde(default)]
    pub declared_permissions: Vec<String>,
}

impl From<&PluginManifest> for PluginSummary {
    fn from(manifest: &PluginManifest) -> Self {
        Self {
            plugin_id: manifest.id.clone(),
            name: manifest.name.clone(),
            description: manifest.description.clone(),
            latest_version: manifest.version.clone(),
            author: manifest.author.clone(),
            nav_items: manifest.nav.clone(),
            declared_permissions: manifest.permissions.clone(),
        }
    }
}

/// Installation row denormalized with catalog display fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstalledPlugin {
    #[serde(flatten)]
    pub summary: PluginSummary,
    pub state: PluginState,
    pub installed_version: String,
    pub installed_at: DateTime<Utc>,
    #[serde(default)]
    pub enabled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_error: Option<String>,
}

impl InstalledPlugin {
    pub fn plugin_id(&self) -> &str {
        &self.summary.plugin_id
    }

    pub fn is_enabled(&self) -> bool {
        self.state == PluginState::Enabled
    }

    /// Join an installation row with its catalog entry. Rows whose plugin is
    /// missing from the catalog fall back to the bare id for display.
    pub fn from_parts(row: PluginInstallation, summary: Option<&PluginSummary>) -> Self {
        let summary = summary.cloned().unwrap_or_else(|| PluginSummary {
            plugin_id: row.plugin_id.clone(),
            name: row.plugin_id.clone(),
            description: None,
            latest_version: row.version.clone(),
            author: None,
            nav_items: Vec::new(),
            declared_permissions: Vec::new(),
        });
        Self {
            summary,
            state: row.state,
            installed_version: row.version,
            installed_at: row.installed_at,
            enabled_at: row.enabled_at,
            last_error: row.last_error,
        }
    }
}
