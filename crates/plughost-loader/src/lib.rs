// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Isolated bundle loading for the plughost extension host.
//!
//! A bundle is a tar(.gz) archive of wasm units. [`WasmBundleLoader`] reads
//! it, picks the unit implementing the plugin contract (manifest `entry` or a
//! [`LocatorStrategy`]), and instantiates it inside its own wasmtime store so
//! that its code and memory stay separate from every other bundle.

pub mod archive;
pub mod host;
pub mod loader;
pub mod locator;
pub mod manifest;
pub mod plugin;
pub mod scope;

pub use archive::{BundleArchive, UnitFile};
pub use loader::{BundleInspection, LoaderOptions, WasmBundleLoader, implements_contract};
pub use locator::{
    LocatorStrategy, NamingHeuristic, SoleImplementation, UnitDescriptor, select_implementation,
};
pub use manifest::{BundleManifest, parse_manifest};
pub use plugin::WasmPlugin;
pub use scope::{ScopeTracker, WasmScope};
