// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the plughost extension host.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level plughost configuration.
///
/// Every section is optional and defaults to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PlughostConfig {
    /// Process-wide settings.
    #[serde(default)]
    pub host: HostConfig,

    /// Plugin directory, bundle format, and sandbox limits.
    #[serde(default)]
    pub plugins: PluginsConfig,

    /// HTTP host boundary settings.
    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Process-wide settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HostConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Plugin discovery and loading configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PluginsConfig {
    /// Managed directory scanned for bundles and used for uploads.
    #[serde(default = "default_plugins_directory")]
    pub directory: PathBuf,

    /// Bundle file extension, without the leading dot.
    #[serde(default = "default_bundle_extension")]
    pub bundle_extension: String,

    /// Name of the manifest entry at the root of a bundle.
    #[serde(default = "default_manifest_file")]
    pub manifest_file: String,

    /// Token a unit's file stem must contain to be picked by the naming heuristic.
    #[serde(default = "default_candidate_token")]
    pub candidate_token: String,

    /// Linear memory ceiling per isolation scope, in MiB.
    #[serde(default = "default_max_memory_mb")]
    pub max_memory_mb: u32,

    /// Scan the directory when the host starts.
    #[serde(default = "default_true")]
    pub scan_on_startup: bool,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            directory: default_plugins_directory(),
            bundle_extension: default_bundle_extension(),
            manifest_file: default_manifest_file(),
            candidate_token: default_candidate_token(),
            max_memory_mb: default_max_memory_mb(),
            scan_on_startup: true,
        }
    }
}

fn default_plugins_directory() -> PathBuf {
    PathBuf::from("plugins")
}

fn default_bundle_extension() -> String {
    "bundle".to_string()
}

fn default_manifest_file() -> String {
    "plugin.toml".to_string()
}

fn default_candidate_token() -> String {
    "plugin".to_string()
}

fn default_max_memory_mb() -> u32 {
    64
}

fn default_true() -> bool {
    true
}

/// HTTP host boundary configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Address to bind.
    #[serde(default = "default_gateway_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bearer token required on `/api/*`. `None` leaves the API open.
    #[serde(default)]
    pub bearer_token: Option<String>,

    /// Upper bound on uploaded bundle size, in MiB.
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
            bearer_token: None,
            max_upload_mb: default_max_upload_mb(),
        }
    }
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    8700
}

fn default_max_upload_mb() -> u32 {
    16
}
