// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bundle archive reading.
//!
//! A bundle is a tar archive, optionally gzip-compressed, holding compiled
//! units (`*.wasm`) and an optional manifest at its root. The whole archive is
//! read into memory; no file handle is kept once [`BundleArchive::open`]
//! returns.

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;
use plughost_core::LoadErrorKind;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// File extension of compiled units inside a bundle.
pub const UNIT_EXTENSION: &str = ".wasm";

/// A compiled unit as stored in the archive.
#[derive(Debug, Clone)]
pub struct UnitFile {
    /// Normalized archive path, `/`-separated, without a leading `./`.
    pub path: String,
    pub bytes: Vec<u8>,
}

/// The decoded contents of a bundle.
#[derive(Debug, Clone, Default)]
pub struct BundleArchive {
    /// Compiled units in archive order.
    pub units: Vec<UnitFile>,
    /// Raw manifest text, when the bundle carries one.
    pub manifest: Option<String>,
}

impl BundleArchive {
    /// Reads and decodes a bundle file.
    pub fn open(path: &Path, manifest_file: &str) -> Result<Self, LoadErrorKind> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes, manifest_file)
    }

    /// Decodes bundle bytes. Gzip is detected by its magic number.
    pub fn from_bytes(bytes: &[u8], manifest_file: &str) -> Result<Self, LoadErrorKind> {
        if bytes.is_empty() {
            return Err(LoadErrorKind::Archive("bundle file is empty".to_string()));
        }
        if bytes.starts_with(&GZIP_MAGIC) {
            read_entries(GzDecoder::new(bytes), manifest_file)
        } else {
            read_entries(bytes, manifest_file)
        }
    }
}

fn read_entries<R: Read>(reader: R, manifest_file: &str) -> Result<BundleArchive, LoadErrorKind> {
    let mut archive = tar::Archive::new(reader);
    let mut bundle = BundleArchive::default();
    let mut seen = HashSet::new();
    let mut entry_count = 0usize;

    for entry in archive.entries().map_err(archive_err)? {
        let mut entry = entry.map_err(archive_err)?;
        entry_count += 1;
        if !entry.header().entry_type().is_file() {
            continue;
        }

        let path = normalize_entry_path(&entry.path().map_err(archive_err)?);
        if path == manifest_file {
            let mut text = String::new();
            entry
                .read_to_string(&mut text)
                .map_err(|e| LoadErrorKind::Manifest(format!("{manifest_file} is not UTF-8: {e}")))?;
            bundle.manifest = Some(text);
        } else if path.ends_with(UNIT_EXTENSION) {
            if !seen.insert(path.clone()) {
                return Err(LoadErrorKind::Archive(format!(
                    "duplicate compiled unit '{path}'"
                )));
            }
            let mut bytes = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut bytes).map_err(archive_err)?;
            bundle.units.push(UnitFile { path, bytes });
        }
    }

    if entry_count == 0 {
        return Err(LoadErrorKind::Archive("archive has no entries".to_string()));
    }
    Ok(bundle)
}

/// `./lib/util.wasm` and `lib\util.wasm` both become `lib/util.wasm`.
pub fn normalize_entry_path(path: &Path) -> String {
    let raw = path.to_string_lossy().replace('\\', "/");
    raw.trim_start_matches("./").trim_start_matches('/').to_string()
}

fn archive_err(e: std::io::Error) -> LoadErrorKind {
    LoadErrorKind::Archive(e.to_string())
}
