// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Builder for bundle archives used in tests.

use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;

/// Assembles a bundle (tar, optionally gzip-compressed) in memory.
///
/// Test-only helper: malformed WAT or I/O errors panic.
#[derive(Debug, Clone, Default)]
pub struct BundleBuilder {
    files: Vec<(String, Vec<u8>)>,
    gzip: bool,
}

impl BundleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a unit compiled from WAT source.
    pub fn wat(self, path: &str, source: &str) -> Self {
        let bytes = wat::parse_str(source)
            .unwrap_or_else(|e| panic!("fixture {path} is not valid WAT: {e}"));
        self.file(path, bytes)
    }

    /// Adds `plugin.toml` with the given content.
    pub fn manifest(self, toml: &str) -> Self {
        self.file("plugin.toml", toml.as_bytes().to_vec())
    }

    /// Adds an arbitrary file.
    pub fn file(mut self, path: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.files.push((path.to_string(), bytes.into()));
        self
    }

    /// Compresses the archive with gzip.
    pub fn gzip(mut self) -> Self {
        self.gzip = true;
        self
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (path, data) in &self.files {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, path, data.as_slice())
                .unwrap_or_else(|e| panic!("failed to append {path}: {e}"));
        }
        let tar = builder
            .into_inner()
            .unwrap_or_else(|e| panic!("failed to finish tar archive: {e}"));

        if !self.gzip {
            return tar;
        }
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(&tar)
            .unwrap_or_else(|e| panic!("failed to gzip bundle: {e}"));
        encoder
            .finish()
            .unwrap_or_else(|e| panic!("failed to gzip bundle: {e}"))
    }

    /// Writes the bundle to `dir/file_name` and returns the path.
    pub fn write_to(&self, dir: &Path, file_name: &str) -> PathBuf {
        let path = dir.join(file_name);
        std::fs::write(&path, self.to_bytes())
            .unwrap_or_else(|e| panic!("failed to write {}: {e}", path.display()));
        path
    }
}

/// A bundle holding a single fixture unit named `<stem>.wasm`.
pub fn single_unit(stem: &str, wat_source: &str) -> BundleBuilder {
    BundleBuilder::new().wat(&format!("{stem}.wasm"), wat_source)
}
