//! Built-in Notes plugin
//!
//! Sample plugin that exercises every runtime hook point: nav, routes, an
//! event subscription, and enable/disable callbacks.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use super::registry::{handler_fn, PluginHooks, PluginRegistry, PluginRoute, PluginRuntime};
use super::types::{PluginManifest, PluginNavItem};

pub const NOTES_PLUGIN_ID: &str = "notes";

pub const NOTES_READ: &str = "notes:read";
pub const NOTES_WRITE: &str = "notes:write";

pub fn notes_manifest() -> PluginManifest {
    let mut manifest = PluginManifest::new(NOTES_PLUGIN_ID, "Notes", "1.0.0");
    manifest.description = Some("Shared notes for your organization".to_string());
    manifest.author = Some("Nixito".to_string());
    manifest.permissions = vec![NOTES_READ.to_string(), NOTES_WRITE.to_string()];
    manifest.nav = vec![
        PluginNavItem::new("Notes", "/notes", "file-text").with_order(10),
        PluginNavItem::new("New note", "/notes/new", "plus")
            .with_parent("Notes")
            .with_order(11),
    ];
    manifest
}

struct NotesHooks;

#[async_trait]
impl PluginHooks for NotesHooks {
    async fn on_enable(&self) -> Result<()> {
        tracing::info!(plugin_id = NOTES_PLUGIN_ID, "Notes plugin enabled");
        Ok(())
    }

    async fn on_disable(&self) -> Result<()> {
        tracing::info!(plugin_id = NOTES_PLUGIN_ID, "Notes plugin disabled");
        Ok(())
    }
}

pub fn notes_runtime() -> PluginRuntime {
    PluginRuntime::new(notes_manifest())
        .with_route(PluginRoute::new("/notes").requires(NOTES_READ))
        .with_route(PluginRoute::new("/notes/new").requires(NOTES_WRITE))
        .with_route(PluginRoute::new("/notes/:id").requires(NOTES_READ))
        .subscribe(
            "user.created",
            handler_fn(|payload: Value| async move {
                tracing::debug!(plugin_id = NOTES_PLUGIN_ID, %payload, "New user created");
                Ok(())
            }),
        )
        .with_hooks(Arc::new(NotesHooks))
}

/// Register every plugin compiled into this crate
pub fn register_builtin_plugins(registry: &PluginRegistry) {
    registry.register(notes_runtime());
}
