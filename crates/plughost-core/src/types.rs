// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the loader, the registry, and the host boundary.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// What a plugin instance reports about itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginIdentity {
    pub name: String,
    pub version: String,
    pub description: String,
}

/// Metadata record describing an installed plugin.
///
/// `name` is the registry's primary key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginMetadata {
    /// Unique plugin name, as reported by the instance.
    pub name: String,
    /// Version string reported by the instance.
    pub version: String,
    /// Human-readable description reported by the instance.
    pub description: String,
    /// Path of the selected compiled unit inside its bundle.
    pub implementation_locator: String,
    /// Absolute path of the bundle the plugin was loaded from.
    pub bundle_path: PathBuf,
    /// True while a live instance exists.
    pub enabled: bool,
}

impl PluginMetadata {
    /// Builds a (not yet enabled) metadata record from an identity.
    pub fn from_identity(
        identity: PluginIdentity,
        implementation_locator: impl Into<String>,
        bundle_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: identity.name,
            version: identity.version,
            description: identity.description,
            implementation_locator: implementation_locator.into(),
            bundle_path: bundle_path.into(),
            enabled: false,
        }
    }
}

/// Lifecycle state of a registry entry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    /// No live instance. Clean and re-loadable.
    Unloaded,
    /// A bundle has been materialized and `start` is running.
    Loading,
    /// `start` succeeded; `execute` is allowed.
    Started,
    /// The instance has been detached and is being torn down.
    Stopping,
    /// `start` raised an error. Queryable, not executable.
    Failed,
}

impl LifecycleState {
    /// Only `Started` entries accept `execute`.
    pub fn is_executable(self) -> bool {
        self == LifecycleState::Started
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn lifecycle_state_display_and_parse() {
        let states = [
            LifecycleState::Unloaded,
            LifecycleState::Loading,
            LifecycleState::Started,
            LifecycleState::Stopping,
            LifecycleState::Failed,
        ];
        for state in states {
            let parsed = LifecycleState::from_str(&state.to_string()).unwrap();
            assert_eq!(parsed, state);
        }
        assert_eq!(LifecycleState::Started.to_string(), "started");
    }

    #[test]
    fn only_started_is_executable() {
        assert!(LifecycleState::Started.is_executable());
        assert!(!LifecycleState::Failed.is_executable());
        assert!(!LifecycleState::Loading.is_executable());
    }

    #[test]
    fn metadata_from_identity_starts_disabled() {
        let meta = PluginMetadata::from_identity(
            PluginIdentity {
                name: "Calculator Plugin".into(),
                version: "1.0.0".into(),
                description: "math".into(),
            },
            "calculator_plugin.wasm",
            "/srv/plugins/calc.bundle",
        );
        assert_eq!(meta.name, "Calculator Plugin");
        assert_eq!(meta.implementation_locator, "calculator_plugin.wasm");
        assert!(!meta.enabled);
    }

    #[test]
    fn metadata_serializes_with_snake_case_fields() {
        let meta = PluginMetadata {
            name: "echo".into(),
            version: "0.1.0".into(),
            description: String::new(),
            implementation_locator: "echo_plugin.wasm".into(),
            bundle_path: PathBuf::from("/p/echo.bundle"),
            enabled: true,
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["implementation_locator"], "echo_plugin.wasm");
        assert_eq!(json["bundle_path"], "/p/echo.bundle");
        assert_eq!(json["enabled"], true);
    }
}
