// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Route-level tests driving the gateway router in-process.

use std::path::Path;
use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use plughost_gateway::{GatewayState, router};
use plughost_loader::{LoaderOptions, WasmBundleLoader};
use plughost_registry::PluginRegistry;
use plughost_test_utils::fixtures::CALCULATOR_WAT;
use plughost_test_utils::{MockLoader, MockSpec, single_unit};
use serde_json::{Value, json};
use tower::ServiceExt;

const BOUNDARY: &str = "plughost-test-boundary";

fn mock_app(dir: &Path) -> (Router, Arc<PluginRegistry>, MockLoader) {
    let loader = MockLoader::new();
    let registry = Arc::new(PluginRegistry::new(Arc::new(loader.clone())));
    let state = GatewayState::new(Arc::clone(&registry), dir);
    (router(state), registry, loader)
}

fn wasm_app(dir: &Path) -> (Router, Arc<PluginRegistry>) {
    let loader = WasmBundleLoader::new(LoaderOptions::default()).unwrap();
    let registry = Arc::new(PluginRegistry::new(Arc::new(loader)));
    let state = GatewayState::new(Arc::clone(&registry), dir);
    (router(state), registry)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_empty(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn multipart_upload(field: &str, file_name: &str, bytes: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/plugins/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn health_reports_plugin_count() {
    let dir = tempfile::tempdir().unwrap();
    let (app, registry, _) = mock_app(dir.path());
    let path = MockSpec::new("alpha", "1.0.0").write_to(dir.path(), "alpha.bundle");
    registry.load(&path).await.unwrap();

    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["plugins"], 1);
}

#[tokio::test]
async fn list_and_get_plugins() {
    let dir = tempfile::tempdir().unwrap();
    let (app, registry, _) = mock_app(dir.path());
    for name in ["beta", "alpha"] {
        let path = MockSpec::new(name, "1.0.0").write_to(dir.path(), &format!("{name}.bundle"));
        registry.load(&path).await.unwrap();
    }

    let (status, body) = send(&app, get("/api/plugins")).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["alpha", "beta"]);

    let (status, body) = send(&app, get("/api/plugins/alpha")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["version"], "1.0.0");
    assert_eq!(body["enabled"], true);
    assert_eq!(body["state"], "started");

    let (status, body) = send(&app, get("/api/plugins/missing")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn execute_passes_body_through() {
    let dir = tempfile::tempdir().unwrap();
    let (app, registry, _) = mock_app(dir.path());
    let path = MockSpec::new("alpha", "1.0.0").write_to(dir.path(), "alpha.bundle");
    registry.load(&path).await.unwrap();

    let (status, body) = send(&app, post_json("/api/plugins/alpha/execute", r#"{"x":1}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["result"], json!({"plugin": "alpha", "input": {"x": 1}}));

    let (status, body) = send(&app, post_empty("/api/plugins/alpha/execute")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["input"], Value::Null);
}

#[tokio::test]
async fn execute_error_statuses() {
    let dir = tempfile::tempdir().unwrap();
    let (app, registry, _) = mock_app(dir.path());
    let path = MockSpec::new("broken", "1.0.0")
        .failing_execute("bad input")
        .write_to(dir.path(), "broken.bundle");
    registry.load(&path).await.unwrap();

    let (status, body) = send(&app, post_json("/api/plugins/broken/execute", "{}")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("bad input"));

    let (status, _) = send(&app, post_json("/api/plugins/broken/execute", "{not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, post_json("/api/plugins/ghost/execute", "{}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn disable_then_enable() {
    let dir = tempfile::tempdir().unwrap();
    let (app, registry, loader) = mock_app(dir.path());
    let path = MockSpec::new("alpha", "1.0.0").write_to(dir.path(), "alpha.bundle");
    registry.load(&path).await.unwrap();

    let (status, body) = send(&app, post_empty("/api/plugins/alpha/disable")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(loader.live_scopes(), 0);

    let (status, _) = send(&app, post_json("/api/plugins/alpha/execute", "1")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = send(&app, post_empty("/api/plugins/alpha/disable")).await;
    assert_eq!(body["success"], false);

    let (status, body) = send(&app, post_empty("/api/plugins/alpha/enable")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(loader.live_scopes(), 1);

    let (_, body) = send(&app, post_empty("/api/plugins/ghost/enable")).await;
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn scan_loads_new_bundles() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _, _) = mock_app(dir.path());
    MockSpec::new("alpha", "1.0.0").write_to(dir.path(), "alpha.bundle");
    std::fs::write(dir.path().join("junk.bundle"), b"not json").unwrap();

    let (status, body) = send(&app, post_empty("/api/plugins/scan")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["loaded"], json!(["alpha"]));
    assert_eq!(body["failures"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn upload_rejects_bad_requests() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _, _) = mock_app(dir.path());

    let (status, _) = send(&app, multipart_upload("file", "calc.jar", b"bytes")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, multipart_upload("file", "calc.bundle", b"")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, multipart_upload("other", "calc.bundle", b"x")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("file"));
}

#[tokio::test]
async fn upload_corrupt_bundle_reports_load_error() {
    let dir = tempfile::tempdir().unwrap();
    let (app, registry) = wasm_app(dir.path());

    let (status, body) =
        send(&app, multipart_upload("file", "junk.bundle", b"definitely not a tar")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(registry.is_empty().await);
    assert!(dir.path().join("junk.bundle").exists());
}

#[tokio::test]
async fn upload_and_execute_calculator() {
    let dir = tempfile::tempdir().unwrap();
    let plugins = dir.path().join("plugins");
    let (app, _) = wasm_app(&plugins);
    let bytes = single_unit("calculator_plugin", CALCULATOR_WAT).to_bytes();

    let (status, body) =
        send(&app, multipart_upload("file", "../../calc.bundle", &bytes)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true);
    assert_eq!(body["file_name"], "calc.bundle");
    assert!(plugins.join("calc.bundle").exists());
    let parts = std::fs::read_dir(&plugins)
        .unwrap()
        .filter(|e| e.as_ref().unwrap().path().extension().is_some_and(|x| x == "part"))
        .count();
    assert_eq!(parts, 0);

    let (status, body) = send(
        &app,
        post_json(
            "/api/plugins/Calculator%20Plugin/execute",
            r#"{"operation":"add","a":10,"b":5}"#,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["result"]["result"], json!(15));

    let (status, body) = send(
        &app,
        post_json(
            "/api/plugins/Calculator%20Plugin/execute",
            r#"{"operation":"divide","a":1,"b":0}"#,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("division by zero"));
}

#[tokio::test]
async fn upload_cap_applies_to_the_file_not_the_envelope() {
    let dir = tempfile::tempdir().unwrap();
    let bytes = MockSpec::new("alpha", "1.0.0").to_bytes();
    let registry = Arc::new(PluginRegistry::new(Arc::new(MockLoader::new())));
    let state =
        GatewayState::new(Arc::clone(&registry), dir.path()).with_max_upload_bytes(bytes.len());
    let app = router(state);

    let (status, body) = send(&app, multipart_upload("file", "alpha.bundle", &bytes)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(registry.get("alpha").await.is_ok());

    let mut oversized = bytes.clone();
    oversized.push(b'\n');
    let (status, body) = send(&app, multipart_upload("file", "big.bundle", &oversized)).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["success"], false);
    assert!(!dir.path().join("big.bundle").exists());
}

#[tokio::test]
async fn concurrent_uploads_of_one_name_never_mix_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _, _) = mock_app(dir.path());
    let bundles: Vec<Vec<u8>> = (0..6u8)
        .map(|i| {
            let filler = char::from(b'a' + i).to_string().repeat(256 * 1024);
            MockSpec::new("alpha", &format!("1.0.{i}"))
                .described(&filler)
                .to_bytes()
        })
        .collect();

    let uploads = bundles.iter().map(|bytes| {
        let app = app.clone();
        let request = multipart_upload("file", "alpha.bundle", bytes);
        async move { send(&app, request).await }
    });
    for (status, body) in futures::future::join_all(uploads).await {
        assert_eq!(status, StatusCode::OK, "{body}");
    }

    let written = std::fs::read(dir.path().join("alpha.bundle")).unwrap();
    assert!(bundles.contains(&written));
    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .filter(|n| n != "alpha.bundle")
        .collect();
    assert!(leftovers.is_empty(), "{leftovers:?}");
}

#[tokio::test]
async fn bearer_token_guards_api_routes() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(PluginRegistry::new(Arc::new(MockLoader::new())));
    let state = GatewayState::new(registry, dir.path()).with_bearer_token(Some("s3cret".into()));
    let app = router(state);

    let (status, _) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, get("/api/plugins")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .uri("/api/plugins")
        .header(header::AUTHORIZATION, "Bearer s3cret")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}
