// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the plughost extension host.
//!
//! Defines the plugin contract every unit implements, the metadata and
//! lifecycle types the registry keeps, the loader/scope seams, and the
//! error taxonomy shared by every crate in the workspace.

pub mod error;
pub mod traits;
pub mod types;

pub use error::{HostError, LoadError, LoadErrorKind, PluginFault};
pub use traits::{BundleLoader, IsolationScope, LoadedPlugin, Plugin};
pub use types::{LifecycleState, PluginIdentity, PluginMetadata};
