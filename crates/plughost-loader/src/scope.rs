// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wasmtime-backed isolation scopes.
//!
//! Each loaded bundle gets its own `Store`: linear memories, globals and
//! instances of one bundle are unreachable from any other bundle. The store is
//! shared between the [`WasmScope`] (owned by the registry) and the plugin
//! handle behind a mutex; releasing the scope takes the store out and drops it.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use plughost_core::{IsolationScope, PluginFault};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;
use wasmtime::{Store, TypedFunc};

use crate::host::HostState;

/// Counts isolation scopes that are still holding resources.
#[derive(Debug, Clone, Default)]
pub struct ScopeTracker {
    live: Arc<AtomicUsize>,
    next_id: Arc<AtomicU64>,
}

impl ScopeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new scope. The count drops again when the ticket drops.
    pub fn open(&self) -> ScopeTicket {
        self.live.fetch_add(1, Ordering::SeqCst);
        ScopeTicket {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            live: Arc::clone(&self.live),
        }
    }

    /// Number of scopes opened and not yet released.
    pub fn live_scopes(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

/// Proof that a scope is open. Dropping it marks the scope released.
#[derive(Debug)]
pub struct ScopeTicket {
    id: u64,
    live: Arc<AtomicUsize>,
}

impl ScopeTicket {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for ScopeTicket {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// The lifecycle exports a plugin unit provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    Start,
    Stop,
    Execute,
}

impl Hook {
    fn as_str(self) -> &'static str {
        match self {
            Hook::Start => "start",
            Hook::Stop => "stop",
            Hook::Execute => "execute",
        }
    }
}

/// Everything a live scope owns: the store and its cached entrypoints.
pub struct ScopeCell {
    store: Store<HostState>,
    start: TypedFunc<(), i32>,
    stop: TypedFunc<(), i32>,
    execute: TypedFunc<(), i32>,
    _ticket: ScopeTicket,
}

impl ScopeCell {
    pub(crate) fn new(
        store: Store<HostState>,
        start: TypedFunc<(), i32>,
        stop: TypedFunc<(), i32>,
        execute: TypedFunc<(), i32>,
        ticket: ScopeTicket,
    ) -> Self {
        Self {
            store,
            start,
            stop,
            execute,
            _ticket: ticket,
        }
    }

    /// Runs one hook to completion on the current thread.
    pub(crate) fn invoke(&mut self, hook: Hook, input: Value) -> Result<Value, PluginFault> {
        self.store.data_mut().begin_call(input);
        let func = match hook {
            Hook::Start => &self.start,
            Hook::Stop => &self.stop,
            Hook::Execute => &self.execute,
        };

        let code = func
            .call(&mut self.store, ())
            .map_err(|e| PluginFault::new(format!("{} trapped: {e:#}", hook.as_str())))?;

        let state = self.store.data_mut();
        if code != 0 {
            let message = state
                .take_error()
                .unwrap_or_else(|| format!("{} returned error code {code}", hook.as_str()));
            return Err(PluginFault::new(message));
        }
        state.take_output()
    }
}

/// Shared slot holding a scope's resources until release.
pub(crate) type SharedCell = Arc<Mutex<Option<ScopeCell>>>;

/// Registry-side handle of a wasm isolation scope.
pub struct WasmScope {
    id: u64,
    bundle_path: PathBuf,
    cell: SharedCell,
}

impl WasmScope {
    pub(crate) fn new(id: u64, bundle_path: PathBuf, cell: SharedCell) -> Self {
        Self {
            id,
            bundle_path,
            cell,
        }
    }
}

#[async_trait]
impl IsolationScope for WasmScope {
    fn id(&self) -> u64 {
        self.id
    }

    fn bundle_path(&self) -> &Path {
        &self.bundle_path
    }

    async fn release(self: Box<Self>) {
        // Waits for a call holding the cell to finish.
        let cell = self.cell.lock().await.take();
        if cell.is_some() {
            drop(cell);
            debug!(scope = self.id, bundle = %self.bundle_path.display(), "isolation scope released");
        }
    }
}
