// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the plugin management API.

use std::io::Write;
use std::path::Path as FsPath;

use axum::{
    Json,
    body::Bytes,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use plughost_core::HostError;
use plughost_registry::{PluginSnapshot, ScanFailure};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::server::GatewayState;

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Number of registry entries.
    pub plugins: usize,
    pub uptime_secs: u64,
}

#[derive(Debug, Serialize)]
pub struct ExecuteResponse {
    pub success: bool,
    pub result: Value,
}

/// Response body for enable/disable.
#[derive(Debug, Serialize)]
pub struct ToggleResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub file_name: String,
}

#[derive(Debug, Serialize)]
pub struct ScanResponse {
    pub success: bool,
    pub loaded: Vec<String>,
    pub failures: Vec<ScanFailure>,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

/// Errors returned by handlers.
#[derive(Debug)]
pub enum ApiError {
    Host(HostError),
    BadRequest(String),
    PayloadTooLarge(String),
}

impl From<HostError> for ApiError {
    fn from(err: HostError) -> Self {
        ApiError::Host(err)
    }
}

/// HTTP status for a registry error.
pub fn status_for(err: &HostError) -> StatusCode {
    match err {
        HostError::NotFound { .. } => StatusCode::NOT_FOUND,
        HostError::Load(_)
        | HostError::StartFailed { .. }
        | HostError::ExecutionFailed { .. }
        | HostError::NotStarted { .. } => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::Host(err) => (status_for(&err), err.to_string()),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::PayloadTooLarge(message) => (StatusCode::PAYLOAD_TOO_LARGE, message),
        };
        (
            status,
            Json(ErrorResponse {
                success: false,
                error,
            }),
        )
            .into_response()
    }
}

/// GET /health
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        plugins: state.registry.len().await,
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// GET /api/plugins
pub async fn list_plugins(State(state): State<GatewayState>) -> Json<Vec<PluginSnapshot>> {
    Json(state.registry.snapshot().await)
}

/// GET /api/plugins/{name}
pub async fn get_plugin(
    State(state): State<GatewayState>,
    Path(name): Path<String>,
) -> Result<Json<PluginSnapshot>, ApiError> {
    Ok(Json(state.registry.snapshot_of(&name).await?))
}

/// POST /api/plugins/{name}/execute
///
/// The body is handed to the plugin untouched; an empty body means `null`.
pub async fn execute_plugin(
    State(state): State<GatewayState>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Json<ExecuteResponse>, ApiError> {
    let input = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("request body is not valid JSON: {e}")))?
    };

    let result = state.registry.execute(&name, input).await?;
    Ok(Json(ExecuteResponse {
        success: true,
        result,
    }))
}

/// POST /api/plugins/{name}/enable
pub async fn enable_plugin(
    State(state): State<GatewayState>,
    Path(name): Path<String>,
) -> Json<ToggleResponse> {
    let success = state.registry.enable(&name).await;
    let message = if success {
        format!("plugin '{name}' enabled")
    } else {
        format!("plugin '{name}' could not be enabled")
    };
    Json(ToggleResponse { success, message })
}

/// POST /api/plugins/{name}/disable
pub async fn disable_plugin(
    State(state): State<GatewayState>,
    Path(name): Path<String>,
) -> Json<ToggleResponse> {
    let success = state.registry.disable(&name).await;
    let message = if success {
        format!("plugin '{name}' disabled")
    } else {
        format!("plugin '{name}' was not running")
    };
    Json(ToggleResponse { success, message })
}

/// POST /api/plugins/upload
///
/// Stores the `file` field in the plugin directory (written to a `.part` file
/// and renamed into place), then loads it.
pub async fn upload_plugin(
    State(state): State<GatewayState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("invalid multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().map(str::to_string).unwrap_or_default();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("failed to read upload: {e}")))?;
        upload = Some((file_name, bytes));
        break;
    }

    let Some((raw_name, bytes)) = upload else {
        return Err(ApiError::BadRequest("missing multipart field 'file'".to_string()));
    };
    let file_name = sanitize_file_name(&raw_name, &state.bundle_extension)?;
    if bytes.is_empty() {
        return Err(ApiError::BadRequest(format!("uploaded file '{file_name}' is empty")));
    }
    if bytes.len() > state.max_upload_bytes {
        return Err(ApiError::PayloadTooLarge(format!(
            "uploaded file '{file_name}' is {} bytes, the limit is {}",
            bytes.len(),
            state.max_upload_bytes
        )));
    }

    tokio::fs::create_dir_all(&state.plugin_dir)
        .await
        .map_err(HostError::from)?;
    let target = state.plugin_dir.join(&file_name);
    persist_upload(&state.plugin_dir, &target, bytes.clone()).await?;
    info!(file = %file_name, size = bytes.len(), "bundle uploaded");

    let metadata = state.registry.load(&target).await.inspect_err(|e| {
        warn!(file = %file_name, error = %e, "uploaded bundle failed to load");
    })?;

    Ok(Json(UploadResponse {
        success: true,
        message: format!("plugin '{}' uploaded and started", metadata.name),
        file_name,
    }))
}

/// Writes `bytes` to a uniquely named temp file in `dir`, then renames it
/// onto `target`. Concurrent uploads of one name never share a temp file.
async fn persist_upload(dir: &FsPath, target: &FsPath, bytes: Bytes) -> Result<(), HostError> {
    let dir = dir.to_path_buf();
    let target = target.to_path_buf();
    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        let mut partial = tempfile::Builder::new()
            .prefix(".upload-")
            .suffix(".part")
            .tempfile_in(&dir)?;
        partial.write_all(&bytes)?;
        partial.as_file().sync_all()?;
        partial.persist(&target).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(|e| HostError::Internal(format!("upload writer panicked: {e}")))?
    .map_err(HostError::from)
}

/// Reduces an uploaded file name to a bare name with the bundle extension.
pub fn sanitize_file_name(raw: &str, extension: &str) -> Result<String, ApiError> {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    if base.is_empty() || base.starts_with('.') {
        return Err(ApiError::BadRequest(format!("invalid file name '{raw}'")));
    }
    let has_extension = FsPath::new(base)
        .extension()
        .is_some_and(|ext| ext == extension);
    if !has_extension {
        return Err(ApiError::BadRequest(format!(
            "only .{extension} bundles are accepted, got '{base}'"
        )));
    }
    Ok(base.to_string())
}

/// POST /api/plugins/scan
pub async fn scan_plugins(
    State(state): State<GatewayState>,
) -> Result<Json<ScanResponse>, ApiError> {
    let report = state.registry.rescan(&state.plugin_dir).await?;
    Ok(Json(ScanResponse {
        success: true,
        loaded: report.loaded,
        failures: report.failures,
    }))
}
