// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock loader and plugin for deterministic registry tests.
//!
//! A mock bundle is a JSON file holding a [`MockSpec`]. [`MockLoader`] parses
//! it and hands out a [`MockPlugin`] configured by it. Lifecycle
//! events from every plugin and scope go to one shared, ordered event log.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use plughost_core::{
    BundleLoader, IsolationScope, LoadError, LoadErrorKind, LoadedPlugin, Plugin, PluginFault,
    PluginIdentity,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Behaviour of a mock plugin, stored as the bundle file's content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MockSpec {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub fail_start: Option<String>,
    #[serde(default)]
    pub fail_stop: Option<String>,
    #[serde(default)]
    pub fail_execute: Option<String>,
    /// Time `execute` takes, in milliseconds.
    #[serde(default)]
    pub delay_ms: u64,
}

impl MockSpec {
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            ..Default::default()
        }
    }

    pub fn failing_start(mut self, message: &str) -> Self {
        self.fail_start = Some(message.to_string());
        self
    }

    pub fn failing_stop(mut self, message: &str) -> Self {
        self.fail_stop = Some(message.to_string());
        self
    }

    pub fn failing_execute(mut self, message: &str) -> Self {
        self.fail_execute = Some(message.to_string());
        self
    }

    pub fn delay(mut self, millis: u64) -> Self {
        self.delay_ms = millis;
        self
    }

    /// Describes the plugin in its bundle text.
    pub fn described(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// Bundle file contents for this description.
    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec_pretty(self)
            .unwrap_or_else(|e| panic!("failed to serialize mock spec: {e}"))
    }

    /// Writes this description as a bundle file and returns its path.
    pub fn write_to(&self, dir: &Path, file_name: &str) -> PathBuf {
        let path = dir.join(file_name);
        std::fs::write(&path, self.to_bytes())
            .unwrap_or_else(|e| panic!("failed to write {}: {e}", path.display()));
        path
    }
}

/// Ordered log of lifecycle events, shared by a loader and its plugins.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    fn push(&self, event: String) {
        if let Ok(mut events) = self.0.lock() {
            events.push(event);
        }
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.0.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Position of the first event equal to `event`.
    pub fn position(&self, event: &str) -> Option<usize> {
        self.snapshot().iter().position(|e| e == event)
    }

    pub fn count(&self, event: &str) -> usize {
        self.snapshot().iter().filter(|e| *e == event).count()
    }
}

/// A plugin driven by a [`MockSpec`].
///
/// `execute` returns `{"plugin": <name>, "input": <input>}` after the
/// configured delay. Events: `start:<name>`, `stop:<name>`,
/// `execute:begin:<name>`, `execute:end:<name>`.
pub struct MockPlugin {
    spec: MockSpec,
    events: EventLog,
}

impl MockPlugin {
    pub fn new(spec: MockSpec, events: EventLog) -> Self {
        Self { spec, events }
    }
}

#[async_trait]
impl Plugin for MockPlugin {
    fn identity(&self) -> PluginIdentity {
        PluginIdentity {
            name: self.spec.name.clone(),
            version: self.spec.version.clone(),
            description: self.spec.description.clone(),
        }
    }

    async fn start(&self) -> Result<(), PluginFault> {
        self.events.push(format!("start:{}", self.spec.name));
        match &self.spec.fail_start {
            Some(message) => Err(PluginFault::new(message.clone())),
            None => Ok(()),
        }
    }

    async fn stop(&self) -> Result<(), PluginFault> {
        self.events.push(format!("stop:{}", self.spec.name));
        match &self.spec.fail_stop {
            Some(message) => Err(PluginFault::new(message.clone())),
            None => Ok(()),
        }
    }

    async fn execute(&self, input: Value) -> Result<Value, PluginFault> {
        self.events.push(format!("execute:begin:{}", self.spec.name));
        if self.spec.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.spec.delay_ms)).await;
        }
        self.events.push(format!("execute:end:{}", self.spec.name));
        match &self.spec.fail_execute {
            Some(message) => Err(PluginFault::new(message.clone())),
            None => Ok(json!({ "plugin": self.spec.name, "input": input })),
        }
    }
}

/// Scope handed out by [`MockLoader`]; release decrements the live count.
pub struct MockScope {
    id: u64,
    bundle_path: PathBuf,
    live: Arc<AtomicUsize>,
    events: EventLog,
    name: String,
}

#[async_trait]
impl IsolationScope for MockScope {
    fn id(&self) -> u64 {
        self.id
    }

    fn bundle_path(&self) -> &Path {
        &self.bundle_path
    }

    async fn release(self: Box<Self>) {
        self.live.fetch_sub(1, Ordering::SeqCst);
        self.events.push(format!("release:{}", self.name));
    }
}

/// Loader reading [`MockSpec`] JSON files.
#[derive(Clone, Default)]
pub struct MockLoader {
    live: Arc<AtomicUsize>,
    loads: Arc<AtomicUsize>,
    next_id: Arc<AtomicU64>,
    events: EventLog,
}

impl MockLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scopes handed out and not yet released.
    pub fn live_scopes(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Successful loads so far.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> EventLog {
        self.events.clone()
    }
}

#[async_trait]
impl BundleLoader for MockLoader {
    fn bundle_extension(&self) -> &str {
        "bundle"
    }

    async fn load(&self, bundle_path: &Path) -> Result<LoadedPlugin, LoadError> {
        let bytes = tokio::fs::read(bundle_path)
            .await
            .map_err(|e| LoadError::new(bundle_path, e))?;
        let spec: MockSpec = serde_json::from_slice(&bytes).map_err(|e| {
            LoadError::new(bundle_path, LoadErrorKind::Archive(e.to_string()))
        })?;

        self.live.fetch_add(1, Ordering::SeqCst);
        self.loads.fetch_add(1, Ordering::SeqCst);
        let scope = MockScope {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            bundle_path: bundle_path.to_path_buf(),
            live: Arc::clone(&self.live),
            events: self.events.clone(),
            name: spec.name.clone(),
        };
        let locator = format!("{}.mock", spec.name);
        Ok(LoadedPlugin {
            instance: Arc::new(MockPlugin::new(spec, self.events.clone())),
            scope: Box::new(scope),
            implementation_locator: locator,
        })
    }
}
