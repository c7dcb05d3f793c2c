//! Plugin catalog, lifecycle and runtime registry
//!
//! - [`PluginCatalog`] reads the global catalog and an organization's
//!   installation rows
//! - [`PluginLifecycle`] performs install/enable/disable against storage
//! - [`PluginRegistry`] holds in-process plugin implementations and fans
//!   out events to their handlers

mod catalog;
mod lifecycle;
pub mod notes;
mod registry;
mod types;

pub use catalog::{not_installed, CatalogState, PluginCatalog};
pub use lifecycle::{LifecycleAction, PluginLifecycle};
pub use notes::register_builtin_plugins;
pub use registry::{
    handler_fn, EmitReport, EventHandler, HandlerFailure, PluginHooks, PluginRegistry,
    PluginRoute, PluginRuntime, RegisterOutcome, Subscription,
};
pub use types::{
    sort_nav_items, InstalledPlugin, PluginInstallation, PluginManifest, PluginNavItem,
    PluginState, PluginSummary,
};
