// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end lifecycle tests with real wasm bundles.

use std::sync::Arc;

use plughost_core::{HostError, LifecycleState};
use plughost_loader::{LoaderOptions, WasmBundleLoader};
use plughost_registry::PluginRegistry;
use plughost_test_utils::fixtures::{
    CALCULATOR_WAT, ECHO_WAT, FAILING_START_WAT, TRAPPING_WAT, plugin_wat,
};
use plughost_test_utils::single_unit;
use serde_json::json;

fn setup() -> (PluginRegistry, WasmBundleLoader) {
    let loader = WasmBundleLoader::new(LoaderOptions::default()).unwrap();
    (PluginRegistry::new(Arc::new(loader.clone())), loader)
}

#[tokio::test]
async fn calculator_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let path = single_unit("calculator_plugin", CALCULATOR_WAT).write_to(dir.path(), "calc.bundle");
    let (registry, _) = setup();

    let metadata = registry.load(&path).await.unwrap();
    assert_eq!(metadata.name, "Calculator Plugin");
    assert_eq!(metadata.version, "1.0.0");
    assert!(metadata.enabled);

    let out = registry
        .execute("Calculator Plugin", json!({"operation": "add", "a": 10, "b": 5}))
        .await
        .unwrap();
    assert_eq!(out["result"], json!(15));

    let err = registry
        .execute("Calculator Plugin", json!({"operation": "divide", "a": 10, "b": 0}))
        .await
        .unwrap_err();
    match err {
        HostError::ExecutionFailed { cause, .. } => assert_eq!(cause.message(), "division by zero"),
        other => panic!("expected ExecutionFailed, got {other:?}"),
    }
    assert_eq!(
        registry.status("Calculator Plugin").await.unwrap().state,
        LifecycleState::Started
    );
}

#[tokio::test]
async fn loading_the_same_bundle_twice_keeps_one_entry() {
    let dir = tempfile::tempdir().unwrap();
    let path = single_unit("echo_plugin", ECHO_WAT).write_to(dir.path(), "echo.bundle");
    let (registry, loader) = setup();

    registry.load(&path).await.unwrap();
    registry.load(&path).await.unwrap();

    assert_eq!(registry.list().await.len(), 1);
    assert_eq!(loader.live_scopes(), 1);
}

#[tokio::test]
async fn start_failure_leaves_no_live_scope() {
    let dir = tempfile::tempdir().unwrap();
    let path = single_unit("failing_plugin", FAILING_START_WAT).write_to(dir.path(), "f.bundle");
    let (registry, loader) = setup();

    let err = registry.load(&path).await.unwrap_err();
    assert!(matches!(err, HostError::StartFailed { .. }), "{err}");
    assert_eq!(loader.live_scopes(), 0);

    let status = registry.status("Failing Plugin").await.unwrap();
    assert_eq!(status.state, LifecycleState::Failed);
    assert_eq!(status.last_error.as_deref(), Some("database unavailable"));
    assert!(!registry.get("Failing Plugin").await.unwrap().enabled);
}

#[tokio::test]
async fn disable_enable_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = single_unit("echo_plugin", ECHO_WAT).write_to(dir.path(), "echo.bundle");
    let (registry, loader) = setup();
    let original = registry.load(&path).await.unwrap();

    assert!(registry.disable("Echo Plugin").await);
    assert_eq!(loader.live_scopes(), 0);
    let err = registry.execute("Echo Plugin", json!(1)).await.unwrap_err();
    assert!(matches!(err, HostError::NotStarted { .. }));

    assert!(registry.enable("Echo Plugin").await);
    assert_eq!(registry.get("Echo Plugin").await.unwrap(), original);
    assert_eq!(registry.execute("Echo Plugin", json!([1])).await.unwrap(), json!([1]));
}

#[tokio::test]
async fn rescan_loads_valid_bundles_and_reports_corrupt_ones() {
    let dir = tempfile::tempdir().unwrap();
    single_unit("alpha_plugin", &plugin_wat("alpha", "1.0.0")).write_to(dir.path(), "alpha.bundle");
    single_unit("beta_plugin", &plugin_wat("beta", "2.0.0"))
        .gzip()
        .write_to(dir.path(), "beta.bundle");
    std::fs::write(dir.path().join("corrupt.bundle"), b"this is not an archive at all").unwrap();
    std::fs::write(dir.path().join("readme.txt"), b"ignored").unwrap();
    let (registry, _) = setup();

    let report = registry.rescan(dir.path()).await.unwrap();
    assert_eq!(report.loaded, vec!["alpha", "beta"]);
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].path.ends_with("corrupt.bundle"));
    assert_eq!(registry.list().await.len(), 2);

    // A second scan leaves recorded bundles alone.
    let again = registry.rescan(dir.path()).await.unwrap();
    assert!(again.loaded.is_empty());
    assert_eq!(again.skipped.len(), 2);
    assert_eq!(again.failures.len(), 1);
}

#[tokio::test]
async fn rescan_keeps_entries_whose_bundle_disappeared() {
    let dir = tempfile::tempdir().unwrap();
    let path = single_unit("alpha_plugin", &plugin_wat("alpha", "1.0.0"))
        .write_to(dir.path(), "alpha.bundle");
    let (registry, _) = setup();
    registry.rescan(dir.path()).await.unwrap();

    std::fs::remove_file(&path).unwrap();
    let report = registry.rescan(dir.path()).await.unwrap();
    assert!(report.loaded.is_empty());
    assert_eq!(
        registry.status("alpha").await.unwrap().state,
        LifecycleState::Started
    );
    assert_eq!(
        registry.execute("alpha", json!(null)).await.unwrap(),
        json!({"plugin": "alpha"})
    );
}

#[tokio::test]
async fn trapping_plugin_does_not_affect_others() {
    let dir = tempfile::tempdir().unwrap();
    let trap = single_unit("trap_plugin", TRAPPING_WAT).write_to(dir.path(), "trap.bundle");
    let echo = single_unit("echo_plugin", ECHO_WAT).write_to(dir.path(), "echo.bundle");
    let (registry, _) = setup();
    registry.load(&trap).await.unwrap();
    registry.load(&echo).await.unwrap();

    let err = registry.execute("Trap Plugin", json!({})).await.unwrap_err();
    assert!(matches!(err, HostError::ExecutionFailed { .. }));
    assert_eq!(
        registry.execute("Echo Plugin", json!("still here")).await.unwrap(),
        json!("still here")
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_executes_on_distinct_plugins() {
    let dir = tempfile::tempdir().unwrap();
    let calc = single_unit("calculator_plugin", CALCULATOR_WAT).write_to(dir.path(), "calc.bundle");
    let echo = single_unit("echo_plugin", ECHO_WAT).write_to(dir.path(), "echo.bundle");
    let loader = WasmBundleLoader::new(LoaderOptions::default()).unwrap();
    let registry = Arc::new(PluginRegistry::new(Arc::new(loader.clone())));
    registry.load(&calc).await.unwrap();
    registry.load(&echo).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..20 {
        let registry = Arc::clone(&registry);
        handles.push(tokio::spawn(async move {
            if i % 2 == 0 {
                let out = registry
                    .execute("Calculator Plugin", json!({"operation": "multiply", "a": i, "b": 2}))
                    .await
                    .unwrap();
                assert_eq!(out["result"], json!(i * 2));
            } else {
                let out = registry.execute("Echo Plugin", json!({"i": i})).await.unwrap();
                assert_eq!(out, json!({"i": i}));
            }
        }));
    }
    for result in futures::future::join_all(handles).await {
        result.unwrap();
    }

    assert_eq!(registry.shutdown().await, 2);
    assert_eq!(loader.live_scopes(), 0);
}
