//! In-process registry of runtime plugin implementations
//!
//! Plugins register a [`PluginRuntime`] (manifest, routes, event
//! subscriptions, optional lifecycle hooks). The registry is an explicit
//! instance shared by `Arc`; it never touches storage.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::future::join_all;
use futures::FutureExt;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::types::{sort_nav_items, PluginManifest, PluginNavItem};

/// Handler invoked for every emitted event of a subscribed type
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, payload: Value) -> Result<()>;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> EventHandler for FnHandler<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    async fn handle(&self, payload: Value) -> Result<()> {
        (self.0)(payload).await
    }
}

/// Wrap an async closure as an [`EventHandler`]
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn EventHandler>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

/// Optional enable/disable callbacks
#[async_trait]
pub trait PluginHooks: Send + Sync {
    async fn on_enable(&self) -> Result<()> {
        Ok(())
    }

    async fn on_disable(&self) -> Result<()> {
        Ok(())
    }
}

/// Route contributed by a plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginRoute {
    pub path: String,
    /// Capability required to view the route
    #[serde(default)]
    pub permission: Option<String>,
}

impl PluginRoute {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            permission: None,
        }
    }

    pub fn requires(mut self, permission: impl Into<String>) -> Self {
        self.permission = Some(permission.into());
        self
    }
}

#[derive(Clone)]
pub struct Subscription {
    pub event_type: String,
    pub handler: Arc<dyn EventHandler>,
}

/// Runtime entry for one plugin, keyed by `manifest.id`
#[derive(Clone)]
pub struct PluginRuntime {
    pub manifest: PluginManifest,
    pub routes: Vec<PluginRoute>,
    pub subscriptions: Vec<Subscription>,
    pub hooks: Option<Arc<dyn PluginHooks>>,
}

impl PluginRuntime {
    pub fn new(manifest: PluginManifest) -> Self {
        Self {
            manifest,
            routes: Vec::new(),
            subscriptions: Vec::new(),
            hooks: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.manifest.id
    }

    pub fn with_route(mut self, route: PluginRoute) -> Self {
        self.routes.push(route);
        self
    }

    pub fn subscribe(mut self, event_type: impl Into<String>, handler: Arc<dyn EventHandler>) -> Self {
        self.subscriptions.push(Subscription {
            event_type: event_type.into(),
            handler,
        });
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn PluginHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }
}

/// What [`PluginRegistry::register`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    Registered,
    Replaced {
        previous_id: String,
        previous_version: String,
    },
}

/// A handler that returned an error or panicked during [`PluginRegistry::emit`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerFailure {
    pub plugin_id: String,
    pub event_type: String,
    pub message: String,
}

/// Summary of one emission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EmitReport {
    pub invoked: usize,
    pub failed: usize,
}

#[derive(Clone)]
struct BoundHandler {
    plugin_id: String,
    handler: Arc<dyn EventHandler>,
}

#[derive(Default)]
struct RegistryState {
    /// Plugin ids in first-registration order
    order: Vec<String>,
    entries: HashMap<String, Arc<PluginRuntime>>,
    /// event type -> handlers in subscription order
    handlers: HashMap<String, Vec<BoundHandler>>,
}

impl RegistryState {
    fn remove_handlers_of(&mut self, plugin_id: &str) {
        for list in self.handlers.values_mut() {
            list.retain(|h| h.plugin_id != plugin_id);
        }
        self.handlers.retain(|_, list| !list.is_empty());
    }

    fn ordered_entries(&self) -> impl Iterator<Item = &Arc<PluginRuntime>> {
        self.order.iter().filter_map(|id| self.entries.get(id))
    }
}

/// Registry of runtime plugins with dynamic (un)registration and event fan-out
#[derive(Default)]
pub struct PluginRegistry {
    state: RwLock<RegistryState>,
    failures: Option<mpsc::UnboundedSender<HandlerFailure>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry that also forwards every handler failure to `tx`
    pub fn with_failure_reporter(tx: mpsc::UnboundedSender<HandlerFailure>) -> Self {
        Self {
            state: RwLock::default(),
            failures: Some(tx),
        }
    }

    /// Register or replace a plugin. A replaced plugin's handlers are all
    /// removed before the new ones are bound; it keeps its position.
    pub fn register(&self, runtime: PluginRuntime) -> RegisterOutcome {
        let id = runtime.id().to_string();
        let version = runtime.manifest.version.clone();
        let runtime = Arc::new(runtime);

        let mut state = self.state.write();
        let outcome = match state.entries.insert(id.clone(), runtime.clone()) {
            Some(previous) => {
                state.remove_handlers_of(&id);
                RegisterOutcome::Replaced {
                    previous_id: previous.manifest.id.clone(),
                    previous_version: previous.manifest.version.clone(),
                }
            }
            None => {
                state.order.push(id.clone());
                RegisterOutcome::Registered
            }
        };

        for sub in &runtime.subscriptions {
            state
                .handlers
                .entry(sub.event_type.clone())
                .or_default()
                .push(BoundHandler {
                    plugin_id: id.clone(),
                    handler: sub.handler.clone(),
                });
        }
        drop(state);

        match &outcome {
            RegisterOutcome::Registered => {
                info!(plugin_id = %id, version = %version, "Registered plugin")
            }
            RegisterOutcome::Replaced {
                previous_version, ..
            } => warn!(
                plugin_id = %id,
                previous_version = %previous_version,
                version = %version,
                "Plugin re-registered, replacing previous entry"
            ),
        }
        outcome
    }

    /// Remove a plugin and all of its handlers. Returns false if absent.
    pub fn unregister(&self, plugin_id: &str) -> bool {
        let mut state = self.state.write();
        if state.entries.remove(plugin_id).is_none() {
            return false;
        }
        state.order.retain(|id| id != plugin_id);
        state.remove_handlers_of(plugin_id);
        drop(state);

        info!(plugin_id = %plugin_id, "Unregistered plugin");
        true
    }

    pub fn get(&self, plugin_id: &str) -> Option<Arc<PluginRuntime>> {
        self.state.read().entries.get(plugin_id).cloned()
    }

    pub fn has(&self, plugin_id: &str) -> bool {
        self.state.read().entries.contains_key(plugin_id)
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Manifests in registration order
    pub fn manifests(&self) -> Vec<PluginManifest> {
        self.state
            .read()
            .ordered_entries()
            .map(|e| e.manifest.clone())
            .collect()
    }

    /// `(plugin_id, route)` pairs in registration order
    pub fn all_routes(&self) -> Vec<(String, PluginRoute)> {
        self.state
            .read()
            .ordered_entries()
            .flat_map(|e| e.routes.iter().map(move |r| (e.manifest.id.clone(), r.clone())))
            .collect()
    }

    /// Nav items of every registered plugin, stably sorted by `order`
    pub fn get_all_nav_items(&self) -> Vec<PluginNavItem> {
        let mut items: Vec<PluginNavItem> = self
            .state
            .read()
            .ordered_entries()
            .flat_map(|e| e.manifest.nav.iter().cloned())
            .collect();
        sort_nav_items(&mut items);
        items
    }

    /// Invoke every handler subscribed to `event_type` concurrently.
    ///
    /// Failures are logged and reported individually and never propagate.
    /// The handler list is snapshotted first, so handlers may call back
    /// into the registry.
    pub async fn emit(&self, event_type: &str, payload: Value) -> EmitReport {
        let handlers = self
            .state
            .read()
            .handlers
            .get(event_type)
            .cloned()
            .unwrap_or_default();

        if handlers.is_empty() {
            return EmitReport::default();
        }

        let invocations = handlers.into_iter().map(|bound| {
            let payload = payload.clone();
            async move {
                let result = AssertUnwindSafe(bound.handler.handle(payload))
                    .catch_unwind()
                    .await;
                let failure = match result {
                    Ok(Ok(())) => None,
                    Ok(Err(e)) => Some(e.to_string()),
                    Err(panic) => Some(format!("handler panicked: {}", panic_message(&*panic))),
                };
                (bound.plugin_id, failure)
            }
        });

        let results = join_all(invocations).await;
        let mut report = EmitReport {
            invoked: results.len(),
            failed: 0,
        };

        for (plugin_id, failure) in results {
            let Some(message) = failure else { continue };
            report.failed += 1;
            error!(
                plugin_id = %plugin_id,
                event_type = %event_type,
                error = %message,
                "Plugin event handler failed"
            );
            if let Some(tx) = &self.failures {
                let _ = tx.send(HandlerFailure {
                    plugin_id,
                    event_type: event_type.to_string(),
                    message,
                });
            }
        }
        report
    }

    /// Run the plugin's `on_enable` hook. Absent plugin or hook is a no-op.
    pub async fn activate(&self, plugin_id: &str) -> Result<()> {
        let Some(hooks) = self.hooks_of(plugin_id) else {
            return Ok(());
        };
        run_hook(AssertUnwindSafe(async move { hooks.on_enable().await })).await
    }

    /// Run the plugin's `on_disable` hook. Absent plugin or hook is a no-op.
    pub async fn deactivate(&self, plugin_id: &str) -> Result<()> {
        let Some(hooks) = self.hooks_of(plugin_id) else {
            return Ok(());
        };
        run_hook(AssertUnwindSafe(async move { hooks.on_disable().await })).await
    }

    fn hooks_of(&self, plugin_id: &str) -> Option<Arc<dyn PluginHooks>> {
        self.state
            .read()
            .entries
            .get(plugin_id)
            .and_then(|e| e.hooks.clone())
    }
}

async fn run_hook<F>(hook: AssertUnwindSafe<F>) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    match hook.catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(anyhow!("hook panicked: {}", panic_message(&*panic))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
