// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
};
use plughost_core::HostError;
use plughost_registry::PluginRegistry;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::{AuthConfig, auth_middleware};
use crate::handlers;

/// Allowance for multipart boundaries and part headers on top of the
/// upload cap. The exact cap is enforced on the `file` field itself.
pub const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub registry: Arc<PluginRegistry>,
    /// Directory uploads are written to and scans read from.
    pub plugin_dir: PathBuf,
    /// Accepted upload extension, without the dot.
    pub bundle_extension: String,
    pub auth: AuthConfig,
    pub max_upload_bytes: usize,
    pub start_time: Instant,
}

impl GatewayState {
    pub fn new(registry: Arc<PluginRegistry>, plugin_dir: impl Into<PathBuf>) -> Self {
        let bundle_extension = registry.scanner().extension().to_string();
        Self {
            registry,
            plugin_dir: plugin_dir.into(),
            bundle_extension,
            auth: AuthConfig::default(),
            max_upload_bytes: 16 * 1024 * 1024,
            start_time: Instant::now(),
        }
    }

    pub fn with_bearer_token(mut self, token: Option<String>) -> Self {
        self.auth = AuthConfig {
            bearer_token: token,
        };
        self
    }

    pub fn with_max_upload_bytes(mut self, bytes: usize) -> Self {
        self.max_upload_bytes = bytes;
        self
    }
}

/// Gateway server configuration (mirrors `GatewayConfig` from plughost-config).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Builds the gateway router.
///
/// - GET /health (public)
/// - GET /api/plugins, GET /api/plugins/{name}
/// - POST /api/plugins/{name}/execute | enable | disable
/// - POST /api/plugins/upload (multipart field `file`)
/// - POST /api/plugins/scan
pub fn router(state: GatewayState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/api/plugins", get(handlers::list_plugins))
        .route("/api/plugins/upload", post(handlers::upload_plugin))
        .route("/api/plugins/scan", post(handlers::scan_plugins))
        .route("/api/plugins/{name}", get(handlers::get_plugin))
        .route("/api/plugins/{name}/execute", post(handlers::execute_plugin))
        .route("/api/plugins/{name}/enable", post(handlers::enable_plugin))
        .route("/api/plugins/{name}/disable", post(handlers::disable_plugin))
        .layer(DefaultBodyLimit::max(
            state.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES),
        ))
        .route_layer(axum_middleware::from_fn_with_state(
            state.auth.clone(),
            auth_middleware,
        ))
        .with_state(state);

    Router::new().merge(public_routes).merge(api_routes).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    )
}

/// Binds to `host:port` and serves the gateway until `shutdown` resolves.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), HostError> {
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| HostError::Config(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("Gateway server listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| HostError::Internal(format!("gateway server error: {e}")))?;

    Ok(())
}
