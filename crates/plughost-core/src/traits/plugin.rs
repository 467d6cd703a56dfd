// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The capability set every plugin unit implements.

use async_trait::async_trait;

use crate::error::PluginFault;
use crate::types::PluginIdentity;

/// A loaded plugin instance.
///
/// The registry calls `start` once after loading and `stop` once before the
/// instance is discarded. `execute` is only forwarded between the two.
/// Input and output are opaque JSON values; the host never inspects them.
#[async_trait]
pub trait Plugin: Send + Sync + 'static {
    /// Name, version, and description of this plugin.
    fn identity(&self) -> PluginIdentity;

    /// Called once per load cycle before any `execute`.
    async fn start(&self) -> Result<(), PluginFault>;

    /// Called once per load cycle after the last `execute`.
    async fn stop(&self) -> Result<(), PluginFault>;

    /// The plugin's single functional entrypoint.
    async fn execute(&self, input: serde_json::Value) -> Result<serde_json::Value, PluginFault>;
}
