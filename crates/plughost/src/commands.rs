// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-shot commands: `list`, `exec` and `inspect`.
//!
//! `list` and `exec` build a throwaway registry over the plugin directory and
//! shut it down before returning.

use std::path::Path;

use anyhow::{Context, Result};
use plughost_config::PlughostConfig;
use plughost_loader::{BundleInspection, WasmBundleLoader};
use plughost_registry::{PluginSnapshot, ScanReport};
use serde_json::Value;

use crate::serve::{build_registry, loader_options};

/// Runs `plughost list`.
pub async fn run_list(config: &PlughostConfig) -> Result<()> {
    let registry = build_registry(config)?;
    let report = registry
        .rescan(&config.plugins.directory)
        .await
        .with_context(|| format!("failed to scan {}", config.plugins.directory.display()))?;

    print!("{}", render_list(&registry.snapshot().await, &report));
    registry.shutdown().await;
    Ok(())
}

/// Runs `plughost exec <name> [--input <json>]`.
pub async fn run_exec(config: &PlughostConfig, name: &str, input: Option<&str>) -> Result<()> {
    let input = parse_input(input)?;
    let registry = build_registry(config)?;
    registry
        .rescan(&config.plugins.directory)
        .await
        .with_context(|| format!("failed to scan {}", config.plugins.directory.display()))?;

    let result = registry.execute(name, input).await;
    registry.shutdown().await;

    let output = result?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Runs `plughost inspect <bundle>`.
pub fn run_inspect(config: &PlughostConfig, bundle: &Path) -> Result<()> {
    let loader = WasmBundleLoader::new(loader_options(config))?;
    let inspection = loader.inspect(bundle)?;
    print!("{}", render_inspection(bundle, &inspection));
    Ok(())
}

/// Parses the `--input` argument. Absent input is `null`.
pub fn parse_input(input: Option<&str>) -> Result<Value> {
    match input {
        None => Ok(Value::Null),
        Some(raw) => serde_json::from_str(raw).context("--input is not valid JSON"),
    }
}

pub fn render_list(plugins: &[PluginSnapshot], report: &ScanReport) -> String {
    let mut out = String::new();
    if plugins.is_empty() {
        out.push_str("no plugins installed\n");
    }
    for plugin in plugins {
        let meta = &plugin.metadata;
        out.push_str(&format!(
            "{:<24} {:<10} {:<9} {}\n",
            meta.name, meta.version, plugin.status.state, meta.description
        ));
        if let Some(error) = &plugin.status.last_error {
            out.push_str(&format!("    error: {error}\n"));
        }
    }
    for failure in &report.failures {
        out.push_str(&format!(
            "failed: {} ({})\n",
            failure.path.display(),
            failure.error
        ));
    }
    out
}

pub fn render_inspection(bundle: &Path, inspection: &BundleInspection) -> String {
    let mut out = format!("bundle: {}\n", bundle.display());
    if let Some(manifest) = &inspection.manifest {
        if let Some(entry) = &manifest.entry {
            out.push_str(&format!("manifest entry: {entry}\n"));
        }
        if let Some(version) = &manifest.min_host_version {
            out.push_str(&format!("requires host: >= {version}\n"));
        }
        if let Some(author) = &manifest.author {
            out.push_str(&format!("author: {author}\n"));
        }
    }
    out.push_str("units:\n");
    for unit in &inspection.units {
        let marker = if unit.implements_contract { "contract" } else { "-" };
        out.push_str(&format!("  {:<40} {marker}\n", unit.path));
    }
    match &inspection.selected {
        Ok(path) => out.push_str(&format!("selected: {path}\n")),
        Err(e) => out.push_str(&format!("selected: none ({e})\n")),
    }
    out
}
