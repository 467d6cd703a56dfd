// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bundle manifest parsing from `plugin.toml`.
//!
//! The manifest is optional. When present it may pin the implementation unit
//! (`entry`) and declare the oldest host version the bundle runs on.

use plughost_core::LoadErrorKind;
use semver::{Version, VersionReq};
use serde::Deserialize;

/// Parsed bundle manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleManifest {
    /// Archive path of the unit implementing the contract.
    pub entry: Option<String>,
    /// Oldest host version this bundle supports.
    pub min_host_version: Option<Version>,
    pub author: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestFile {
    plugin: ManifestSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestSection {
    entry: Option<String>,
    min_host_version: Option<String>,
    author: Option<String>,
}

/// Parse a bundle manifest from TOML content.
pub fn parse_manifest(toml_content: &str) -> Result<BundleManifest, LoadErrorKind> {
    let file: ManifestFile =
        toml::from_str(toml_content).map_err(|e| LoadErrorKind::Manifest(e.to_string()))?;
    let section = file.plugin;

    let entry = match section.entry {
        Some(entry) if entry.trim().is_empty() => {
            return Err(LoadErrorKind::Manifest(
                "entry must not be empty".to_string(),
            ));
        }
        Some(entry) => Some(entry.trim_start_matches("./").to_string()),
        None => None,
    };

    let min_host_version = section
        .min_host_version
        .map(|v| {
            Version::parse(&v).map_err(|e| {
                LoadErrorKind::Manifest(format!("min_host_version '{v}' is not semver: {e}"))
            })
        })
        .transpose()?;

    Ok(BundleManifest {
        entry,
        min_host_version,
        author: section.author,
    })
}

impl BundleManifest {
    /// Fails with `IncompatibleHost` when `running` is older than required.
    pub fn check_host_version(&self, running: &Version) -> Result<(), LoadErrorKind> {
        let Some(required) = &self.min_host_version else {
            return Ok(());
        };
        let req = VersionReq::parse(&format!(">={required}"))
            .map_err(|e| LoadErrorKind::Manifest(e.to_string()))?;
        if req.matches(running) {
            Ok(())
        } else {
            Err(LoadErrorKind::IncompatibleHost {
                required: required.to_string(),
                running: running.to_string(),
            })
        }
    }
}
