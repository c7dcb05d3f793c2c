//! Nixito Server
//!
//! Self-hosted JSON API over the tenant access and plugin core.
//! This is a library crate; the server is started via `start_server()`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{http::Method, middleware, routing::get, Json, Router};
use serde::Serialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use nixito_core::plugins::{notes, register_builtin_plugins, PluginRegistry};
use nixito_core::{paths, AccessStore, Dashboard, Principal, SqliteStore};

pub mod auth;
pub mod error;
pub mod routes;
pub mod types;

const DEFAULT_PORT: u16 = 3000;

/// Configuration for starting the server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on (default: 3000).
    pub port: u16,
    /// SQLite database backing the reference store.
    pub db_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            db_path: paths::default_db_path(),
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by `NIXITO_PORT` (or `PORT`) and `NIXITO_DB_PATH`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        let port = lookup("NIXITO_PORT").or_else(|| lookup("PORT"));
        if let Some(raw) = port {
            match raw.trim().parse() {
                Ok(port) => config.port = port,
                Err(_) => tracing::warn!("Ignoring invalid port '{}'", raw),
            }
        }

        if let Some(path) = lookup("NIXITO_DB_PATH").filter(|p| !p.trim().is_empty()) {
            config.db_path = PathBuf::from(path);
        }

        config
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Storage collaborator shared by every request.
    pub store: Arc<dyn AccessStore>,
    /// Process-wide runtime plugin registry.
    pub registry: Arc<PluginRegistry>,
}

impl AppState {
    pub fn new(store: Arc<dyn AccessStore>, registry: Arc<PluginRegistry>) -> Self {
        Self { store, registry }
    }

    /// Dashboard resolved for `principal`, with its plugin views loaded.
    pub async fn dashboard_for(&self, principal: Principal) -> Dashboard {
        let dashboard = Dashboard::new(self.store.clone(), self.registry.clone());
        dashboard.switch_principal(Some(principal)).await;
        dashboard
    }
}

/// Open the store, publish built-in plugins to the catalog and register
/// their runtimes.
pub fn init_state(store: SqliteStore) -> anyhow::Result<AppState> {
    let registry = Arc::new(PluginRegistry::new());
    register_builtin_plugins(&registry);
    store.upsert_catalog_plugin(&notes::notes_manifest(), true)?;

    tracing::info!(plugins = registry.len(), "Built-in plugins registered");
    Ok(AppState::new(Arc::new(store), registry))
}

/// Build the Axum router over an existing state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .nest(
            "/api",
            routes::api_router().layer(middleware::from_fn(auth::auth_middleware)),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Build the Axum router with all routes.
pub fn build_router(config: &ServerConfig) -> anyhow::Result<(Router, AppState)> {
    let store = SqliteStore::open(&config.db_path)?;
    tracing::info!("Using database {}", config.db_path.display());

    let state = init_state(store)?;
    Ok((router(state.clone()), state))
}

/// Start the Nixito server and block until shutdown.
pub async fn start_server(config: ServerConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    let (app, _state) = build_router(&config)?;

    tracing::info!("Nixito server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app() -> Router {
        let store = SqliteStore::in_memory().expect("in-memory store");
        router(init_state(store).expect("state"))
    }

    async fn call(
        app: &Router,
        method: &str,
        uri: &str,
        user: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(auth::USER_ID_HEADER, user);
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[test]
    fn config_reads_environment_overrides() {
        let config = ServerConfig::from_lookup(|key| match key {
            "PORT" => Some("8080".to_string()),
            "NIXITO_DB_PATH" => Some("/tmp/nixito-test.db".to_string()),
            _ => None,
        });
        assert_eq!(config.port, 8080);
        assert_eq!(config.db_path, PathBuf::from("/tmp/nixito-test.db"));

        let config = ServerConfig::from_lookup(|key| match key {
            "NIXITO_PORT" => Some("not-a-port".to_string()),
            _ => None,
        });
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[tokio::test]
    async fn health_is_public() {
        let (status, body) = call(&app(), "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn api_requires_user_header() {
        let (status, body) = call(&app(), "GET", "/api/me", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn onboarding_then_plugin_lifecycle() {
        let app = app();

        let (status, me) = call(&app, "GET", "/api/me", Some("u1"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(me["organization"].is_null());
        assert!(me["error"].is_string());

        let (status, org) = call(
            &app,
            "POST",
            "/api/onboarding",
            Some("u1"),
            Some(json!({"org_name": "Acme  Inc.!!"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(org["slug"], "acme-inc");

        let (_, me) = call(&app, "GET", "/api/me", Some("u1"), None).await;
        assert_eq!(me["roles"], json!(["owner"]));

        let (status, available) =
            call(&app, "GET", "/api/plugins/available", Some("u1"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(available[0]["plugin_id"], "notes");

        let (status, _) = call(&app, "POST", "/api/plugins/notes/enable", Some("u1"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = call(&app, "POST", "/api/plugins/notes/install", Some("u1"), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, installed) =
            call(&app, "POST", "/api/plugins/notes/enable", Some("u1"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(installed[0]["state"], "enabled");

        let (_, nav) = call(&app, "GET", "/api/nav", Some("u1"), None).await;
        assert_eq!(nav["items"][0]["href"], "/notes");
        let routes = nav["routes"].as_array().unwrap();
        assert_eq!(routes.len(), 3);
        assert_eq!(routes[0]["plugin_id"], "notes");
        assert_eq!(routes[0]["path"], "/notes");

        let (_, me) = call(&app, "GET", "/api/me", Some("u1"), None).await;
        assert!(me["permissions"]
            .as_array()
            .unwrap()
            .contains(&json!("notes:read")));

        let (status, _) = call(
            &app,
            "POST",
            "/api/plugins/missing/install",
            Some("u1"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn settings_updates_return_fresh_access() {
        let app = app();
        call(
            &app,
            "POST",
            "/api/onboarding",
            Some("u1"),
            Some(json!({"org_name": "Acme", "full_name": "Ada"})),
        )
        .await;

        let (status, me) = call(
            &app,
            "PATCH",
            "/api/settings/organization",
            Some("u1"),
            Some(json!({"name": "Acme Labs"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["organization"]["name"], "Acme Labs");

        let (status, me) = call(
            &app,
            "PATCH",
            "/api/settings/profile",
            Some("u1"),
            Some(json!({"full_name": "Ada L."})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["profile"]["full_name"], "Ada L.");

        let (status, _) = call(
            &app,
            "PATCH",
            "/api/settings/organization",
            Some("stranger"),
            Some(json!({"name": "Mine now"})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}
