// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! [`Plugin`] implementation backed by a wasm instance.

use async_trait::async_trait;
use plughost_core::{Plugin, PluginFault, PluginIdentity};
use serde_json::Value;

use crate::scope::{Hook, SharedCell};

/// A plugin whose hooks run inside a wasm isolation scope.
///
/// Calls are serialized per instance by the scope mutex and run on the
/// blocking pool so guest code never stalls the async runtime.
pub struct WasmPlugin {
    identity: PluginIdentity,
    cell: SharedCell,
}

impl WasmPlugin {
    pub(crate) fn new(identity: PluginIdentity, cell: SharedCell) -> Self {
        Self { identity, cell }
    }

    async fn run(&self, hook: Hook, input: Value) -> Result<Value, PluginFault> {
        let mut guard = self.cell.clone().lock_owned().await;
        tokio::task::spawn_blocking(move || match guard.as_mut() {
            Some(cell) => cell.invoke(hook, input),
            None => Err(PluginFault::new("isolation scope has been released")),
        })
        .await
        .map_err(|e| PluginFault::new(format!("plugin task failed: {e}")))?
    }
}

#[async_trait]
impl Plugin for WasmPlugin {
    fn identity(&self) -> PluginIdentity {
        self.identity.clone()
    }

    async fn start(&self) -> Result<(), PluginFault> {
        self.run(Hook::Start, Value::Null).await.map(|_| ())
    }

    async fn stop(&self) -> Result<(), PluginFault> {
        self.run(Hook::Stop, Value::Null).await.map(|_| ())
    }

    async fn execute(&self, input: Value) -> Result<Value, PluginFault> {
        self.run(Hook::Execute, input).await
    }
}
