// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./plughost.toml` > `~/.config/plughost/plughost.toml`
//! > `/etc/plughost/plughost.toml`, with `PLUGHOST_` environment overrides.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::PlughostConfig;

/// System-wide config file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/plughost/plughost.toml";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "plughost.toml";

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/plughost/plughost.toml`
/// 3. `~/.config/plughost/plughost.toml`
/// 4. `./plughost.toml`
/// 5. `PLUGHOST_*` environment variables
pub fn load_config() -> Result<PlughostConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<PlughostConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PlughostConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<PlughostConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PlughostConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for the XDG lookup, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(PlughostConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("plughost/plughost.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file(LOCAL_CONFIG_FILE))
        .merge(env_provider())
}

/// Environment provider mapping `PLUGHOST_SECTION_KEY` to `section.key`.
///
/// Uses `Env::map()` rather than `Env::split("_")` because keys themselves
/// contain underscores (`PLUGHOST_PLUGINS_BUNDLE_EXTENSION` is
/// `plugins.bundle_extension`).
fn env_provider() -> Env {
    Env::prefixed("PLUGHOST_").map(|key| map_env_key(key.as_str()).into())
}

fn map_env_key(key: &str) -> String {
    for section in ["host", "plugins", "gateway"] {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_map_to_sections() {
        assert_eq!(map_env_key("plugins_bundle_extension"), "plugins.bundle_extension");
        assert_eq!(map_env_key("gateway_bearer_token"), "gateway.bearer_token");
        assert_eq!(map_env_key("host_log_level"), "host.log_level");
    }

    #[test]
    fn string_overrides_defaults() {
        let config = load_config_from_str("[gateway]\nport = 9000\n").unwrap();
        assert_eq!(config.gateway.port, 9000);
        assert_eq!(config.gateway.host, "127.0.0.1");
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = load_config_from_path(Path::new("/nonexistent/plughost.toml")).unwrap();
        assert_eq!(config.plugins.bundle_extension, "bundle");
    }
}
