//! Nixito core: tenant access resolution and plugin management
//!
//! - [`identity`]: principal session boundary
//! - [`access`]: resolver, permission gates, core permission catalog
//! - [`plugins`]: catalog reader, lifecycle controller, runtime registry
//! - [`storage`]: storage collaborator trait and the SQLite reference store
//! - [`dashboard`]: composition root

pub mod access;
pub mod dashboard;
pub mod error;
pub mod identity;
pub mod model;
pub mod paths;
pub mod plugins;
pub mod slug;
pub mod storage;

pub use access::{AccessResolver, AccessSnapshot, PermissionGate, ResolveOutcome, RoleGate};
pub use dashboard::Dashboard;
pub use error::{CoreError, CoreResult, ErrorKind};
pub use identity::{IdentityProvider, IdentitySession, Principal};
pub use plugins::{PluginRegistry, PluginRuntime};
pub use storage::{AccessStore, SqliteStore};
