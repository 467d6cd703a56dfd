// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `plughost serve` command implementation.
//!
//! Builds the wasm loader and registry from configuration, scans the plugin
//! directory, serves the HTTP gateway and stops every plugin on shutdown.

use std::sync::Arc;

use plughost_config::PlughostConfig;
use plughost_core::HostError;
use plughost_gateway::{GatewayState, ServerConfig, start_server};
use plughost_loader::{LoaderOptions, WasmBundleLoader};
use plughost_registry::{PluginRegistry, ScanReport};
use tracing::{info, warn};

const MIB: usize = 1024 * 1024;

/// Loader options derived from the `[plugins]` section.
pub fn loader_options(config: &PlughostConfig) -> LoaderOptions {
    LoaderOptions {
        bundle_extension: config.plugins.bundle_extension.clone(),
        manifest_file: config.plugins.manifest_file.clone(),
        candidate_token: config.plugins.candidate_token.clone(),
        max_memory_bytes: config.plugins.max_memory_mb as usize * MIB,
        ..LoaderOptions::default()
    }
}

/// Creates a registry backed by a wasm loader configured from `config`.
pub fn build_registry(config: &PlughostConfig) -> Result<PluginRegistry, HostError> {
    let loader = WasmBundleLoader::new(loader_options(config))?;
    Ok(PluginRegistry::new(Arc::new(loader)))
}

/// Logs the outcome of a directory scan.
pub fn log_scan_report(report: &ScanReport) {
    info!(
        loaded = report.loaded.len(),
        skipped = report.skipped.len(),
        failed = report.failures.len(),
        "plugin directory scanned"
    );
    for failure in &report.failures {
        warn!(path = %failure.path.display(), error = %failure.error, "bundle not loaded");
    }
}

/// Runs the `plughost serve` command.
pub async fn run_serve(config: PlughostConfig) -> Result<(), HostError> {
    info!("starting plughost serve");

    let registry = Arc::new(build_registry(&config)?);
    let plugin_dir = config.plugins.directory.clone();

    if config.plugins.scan_on_startup {
        let report = registry.rescan(&plugin_dir).await?;
        log_scan_report(&report);
    }

    let state = GatewayState::new(Arc::clone(&registry), plugin_dir)
        .with_bearer_token(config.gateway.bearer_token.clone())
        .with_max_upload_bytes(config.gateway.max_upload_mb as usize * MIB);
    let server_config = ServerConfig {
        host: config.gateway.host.clone(),
        port: config.gateway.port,
    };

    let served = start_server(&server_config, state, shutdown_signal()).await;

    let stopped = registry.shutdown().await;
    info!(stopped, "plughost stopped");
    served
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c, shutdown only via process kill");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loader_options_follow_plugins_section() {
        let config = plughost_config::load_and_validate_str(
            r#"
[plugins]
bundle_extension = "plug"
manifest_file = "manifest.toml"
candidate_token = "ext"
max_memory_mb = 8
"#,
        )
        .unwrap();
        let options = loader_options(&config);
        assert_eq!(options.bundle_extension, "plug");
        assert_eq!(options.manifest_file, "manifest.toml");
        assert_eq!(options.candidate_token, "ext");
        assert_eq!(options.max_memory_bytes, 8 * MIB);
    }

    #[tokio::test]
    async fn registry_scans_with_configured_extension() {
        let dir = tempfile::tempdir().unwrap();
        plughost_test_utils::single_unit(
            "alpha_plugin",
            &plughost_test_utils::fixtures::plugin_wat("alpha", "1.0.0"),
        )
        .write_to(dir.path(), "alpha.plug");
        plughost_test_utils::single_unit(
            "beta_plugin",
            &plughost_test_utils::fixtures::plugin_wat("beta", "1.0.0"),
        )
        .write_to(dir.path(), "beta.bundle");

        let config =
            plughost_config::load_and_validate_str("[plugins]\nbundle_extension = \"plug\"\n")
                .unwrap();
        let registry = build_registry(&config).unwrap();
        let report = registry.rescan(dir.path()).await.unwrap();
        assert_eq!(report.loaded, vec!["alpha"]);
        assert_eq!(registry.shutdown().await, 1);
    }
}
