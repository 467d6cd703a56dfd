// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait seams of the extension host.
//!
//! The registry depends only on these traits; concrete plugins and loaders
//! live in other crates and use `#[async_trait]` for dynamic dispatch.

pub mod loader;
pub mod plugin;

pub use loader::{BundleLoader, IsolationScope, LoadedPlugin};
pub use plugin::Plugin;
