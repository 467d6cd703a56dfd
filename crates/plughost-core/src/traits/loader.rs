// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Loader and isolation-scope seams.
//!
//! A [`BundleLoader`] turns a bundle on disk into a [`LoadedPlugin`]: the live
//! instance plus the [`IsolationScope`] its code was materialized in. The
//! registry owns both and releases the scope when the plugin is unloaded.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::LoadError;
use crate::traits::plugin::Plugin;

/// The loader context a bundle's code was bound in.
///
/// Releasing the scope frees everything it opened. Implementations must wait
/// for calls currently executing inside the scope before freeing anything.
#[async_trait]
pub trait IsolationScope: Send + Sync {
    /// Process-unique identifier, for logging.
    fn id(&self) -> u64;

    /// The bundle this scope was created from.
    fn bundle_path(&self) -> &Path;

    /// Releases the scope and every resource it holds.
    async fn release(self: Box<Self>);
}

/// A freshly materialized plugin, not yet started.
pub struct LoadedPlugin {
    pub instance: Arc<dyn Plugin>,
    pub scope: Box<dyn IsolationScope>,
    /// Path of the selected compiled unit inside the bundle.
    pub implementation_locator: String,
}

impl std::fmt::Debug for LoadedPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedPlugin")
            .field("identity", &self.instance.identity())
            .field("scope", &self.scope.id())
            .field("implementation_locator", &self.implementation_locator)
            .finish()
    }
}

/// Turns bundle files into live plugin instances.
#[async_trait]
pub trait BundleLoader: Send + Sync + 'static {
    /// File extension (without the dot) of bundles this loader accepts.
    fn bundle_extension(&self) -> &str;

    /// Loads a bundle. On failure nothing is left behind: a scope opened
    /// during the attempt is released before the error is returned.
    async fn load(&self, bundle_path: &Path) -> Result<LoadedPlugin, LoadError>;
}
