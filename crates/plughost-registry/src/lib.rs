// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lifecycle registry for the plughost extension host.
//!
//! Provides the `PluginRegistry` owning every installed plugin and the
//! `DiscoveryScanner` that finds bundles in the plugin directory.

pub mod registry;
pub mod scanner;

pub use registry::{EntryStatus, PluginRegistry, PluginSnapshot};
pub use scanner::{DiscoveryScanner, ScanFailure, ScanReport};
