// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Discovery of bundle files in the plugin directory.

use std::path::{Path, PathBuf};

use plughost_core::HostError;
use serde::Serialize;
use tracing::{debug, info};

/// Lists bundle files in a directory.
#[derive(Debug, Clone)]
pub struct DiscoveryScanner {
    extension: String,
}

impl DiscoveryScanner {
    /// `extension` is matched against file extensions, without the dot.
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
        }
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Regular files in `directory` carrying the bundle extension, sorted by
    /// file name. A missing directory is created and yields no bundles.
    pub async fn discover(&self, directory: &Path) -> Result<Vec<PathBuf>, HostError> {
        if !tokio::fs::try_exists(directory).await? {
            tokio::fs::create_dir_all(directory).await?;
            info!(dir = %directory.display(), "created plugin directory");
            return Ok(Vec::new());
        }

        let mut found = Vec::new();
        let mut entries = tokio::fs::read_dir(directory).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if self.matches(&path) {
                found.push(path);
            } else {
                debug!(path = %path.display(), "skipping non-bundle file");
            }
        }
        found.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(found)
    }

    /// True when the path carries the bundle extension.
    pub fn matches(&self, path: &Path) -> bool {
        path.extension().is_some_and(|ext| ext == self.extension.as_str())
    }
}

/// A bundle that failed during a scan.
#[derive(Debug, Clone, Serialize)]
pub struct ScanFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Outcome of a directory rescan.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    /// Names of plugins loaded and started by this scan.
    pub loaded: Vec<String>,
    /// Bundles already recorded in the registry, left untouched.
    pub skipped: Vec<PathBuf>,
    pub failures: Vec<ScanFailure>,
}

impl ScanReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}
