// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The lifecycle registry.
//!
//! `PluginRegistry` is the single authority over installed plugins: it keys
//! entries by plugin name, owns every live instance together with the
//! isolation scope it runs in, and drives the `start`/`stop` hooks.
//!
//! Structural operations (load, enable, disable, rescan, shutdown) are
//! serialized by one mutation lock. The entry table sits behind a read/write
//! lock that is only held for lookups and short updates, never across a call
//! into plugin code. Each live slot carries a call gate: `execute` holds a
//! read guard for the duration of the call, teardown takes the write guard
//! before stopping the instance, so a plugin is never stopped or released
//! while one of its calls is still running.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use plughost_core::{
    BundleLoader, HostError, IsolationScope, LifecycleState, LoadError, LoadedPlugin, Plugin,
    PluginMetadata,
};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::scanner::{DiscoveryScanner, ScanFailure, ScanReport};

/// Lifecycle view of one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryStatus {
    pub state: LifecycleState,
    /// Most recent load/start error, cleared by a successful start.
    pub last_error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
}

/// Metadata and status of one entry, read together.
#[derive(Debug, Clone, Serialize)]
pub struct PluginSnapshot {
    #[serde(flatten)]
    pub metadata: PluginMetadata,
    #[serde(flatten)]
    pub status: EntryStatus,
}

/// A started instance and everything needed to tear it down.
struct LiveSlot {
    instance: Arc<dyn Plugin>,
    scope: Box<dyn IsolationScope>,
    gate: Arc<RwLock<()>>,
}

struct RegistryEntry {
    metadata: PluginMetadata,
    state: LifecycleState,
    last_error: Option<String>,
    started_at: Option<DateTime<Utc>>,
    slot: Option<LiveSlot>,
}

impl RegistryEntry {
    fn status(&self) -> EntryStatus {
        EntryStatus {
            state: self.state,
            last_error: self.last_error.clone(),
            started_at: self.started_at,
        }
    }
}

/// Registry of installed plugins, keyed by plugin name.
pub struct PluginRegistry {
    loader: Arc<dyn BundleLoader>,
    scanner: DiscoveryScanner,
    entries: RwLock<HashMap<String, RegistryEntry>>,
    mutations: Mutex<()>,
}

impl PluginRegistry {
    /// Create an empty registry loading bundles through `loader`.
    pub fn new(loader: Arc<dyn BundleLoader>) -> Self {
        let scanner = DiscoveryScanner::new(loader.bundle_extension());
        Self {
            loader,
            scanner,
            entries: RwLock::new(HashMap::new()),
            mutations: Mutex::new(()),
        }
    }

    pub fn scanner(&self) -> &DiscoveryScanner {
        &self.scanner
    }

    /// Load a bundle and start the plugin it contains.
    ///
    /// A live instance already registered under the same name is stopped and
    /// its scope released before the new one is started. When `start` fails
    /// the entry is kept in the `Failed` state and `StartFailed` is returned.
    pub async fn load(&self, bundle_path: &Path) -> Result<PluginMetadata, HostError> {
        let _mutation = self.mutations.lock().await;
        self.load_locked(bundle_path).await
    }

    async fn load_locked(&self, bundle_path: &Path) -> Result<PluginMetadata, HostError> {
        let (path, loaded) = self.materialize(bundle_path).await?;
        self.install_locked(path, loaded).await
    }

    /// Canonicalize the path and ask the loader for a fresh instance.
    async fn materialize(&self, bundle_path: &Path) -> Result<(PathBuf, LoadedPlugin), HostError> {
        let path = tokio::fs::canonicalize(bundle_path)
            .await
            .map_err(|e| LoadError::new(bundle_path, e))?;

        match self.loader.load(&path).await {
            Ok(loaded) => Ok((path, loaded)),
            Err(err) => {
                warn!(bundle = %path.display(), error = %err, "bundle failed to load");
                self.record_load_failure(&path, &err).await;
                Err(err.into())
            }
        }
    }

    /// Register a materialized plugin and start it, replacing a live
    /// instance of the same name.
    async fn install_locked(
        &self,
        path: PathBuf,
        loaded: LoadedPlugin,
    ) -> Result<PluginMetadata, HostError> {
        let LoadedPlugin {
            instance,
            scope,
            implementation_locator,
        } = loaded;

        let mut metadata =
            PluginMetadata::from_identity(instance.identity(), implementation_locator, &path);
        let name = metadata.name.clone();

        if self.teardown(&name).await {
            info!(plugin = %name, "replacing running plugin");
        }

        self.entries.write().await.insert(
            name.clone(),
            RegistryEntry {
                metadata: metadata.clone(),
                state: LifecycleState::Loading,
                last_error: None,
                started_at: None,
                slot: None,
            },
        );

        match instance.start().await {
            Ok(()) => {
                metadata.enabled = true;
                let mut entries = self.entries.write().await;
                entries.insert(
                    name.clone(),
                    RegistryEntry {
                        metadata: metadata.clone(),
                        state: LifecycleState::Started,
                        last_error: None,
                        started_at: Some(Utc::now()),
                        slot: Some(LiveSlot {
                            instance,
                            scope,
                            gate: Arc::new(RwLock::new(())),
                        }),
                    },
                );
                info!(
                    plugin = %name,
                    version = %metadata.version,
                    bundle = %path.display(),
                    "plugin started"
                );
                Ok(metadata)
            }
            Err(cause) => {
                scope.release().await;
                drop(instance);
                warn!(plugin = %name, error = %cause, "plugin failed to start");
                let mut entries = self.entries.write().await;
                entries.insert(
                    name.clone(),
                    RegistryEntry {
                        metadata,
                        state: LifecycleState::Failed,
                        last_error: Some(cause.to_string()),
                        started_at: None,
                        slot: None,
                    },
                );
                Err(HostError::StartFailed { name, cause })
            }
        }
    }

    /// Entries recorded for `path` keep their state but remember the error.
    async fn record_load_failure(&self, path: &Path, err: &LoadError) {
        let mut entries = self.entries.write().await;
        for entry in entries
            .values_mut()
            .filter(|e| e.metadata.bundle_path == path)
        {
            entry.last_error = Some(err.to_string());
        }
    }

    /// Detach the live slot of `name`, wait for in-flight calls, then stop the
    /// instance and release its scope. Returns false when nothing was live.
    async fn teardown(&self, name: &str) -> bool {
        let slot = {
            let mut entries = self.entries.write().await;
            let Some(entry) = entries.get_mut(name) else {
                return false;
            };
            let Some(slot) = entry.slot.take() else {
                return false;
            };
            entry.state = LifecycleState::Stopping;
            entry.metadata.enabled = false;
            entry.started_at = None;
            slot
        };

        let LiveSlot {
            instance,
            scope,
            gate,
        } = slot;
        let drained = gate.write().await;
        if let Err(cause) = instance.stop().await {
            let err = HostError::StopFailed {
                name: name.to_string(),
                cause,
            };
            warn!(plugin = %name, error = %err, "stop failed, releasing scope anyway");
        }
        drop(instance);
        scope.release().await;
        drop(drained);

        if let Some(entry) = self.entries.write().await.get_mut(name) {
            entry.state = LifecycleState::Unloaded;
        }
        info!(plugin = %name, "plugin unloaded");
        true
    }

    /// Metadata of the named plugin.
    pub async fn get(&self, name: &str) -> Result<PluginMetadata, HostError> {
        self.entries
            .read()
            .await
            .get(name)
            .map(|e| e.metadata.clone())
            .ok_or_else(|| not_found(name))
    }

    /// All entries' metadata, ordered by plugin name.
    pub async fn list(&self) -> Vec<PluginMetadata> {
        let entries = self.entries.read().await;
        let mut list: Vec<PluginMetadata> = entries.values().map(|e| e.metadata.clone()).collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        list
    }

    /// Lifecycle status of the named plugin.
    pub async fn status(&self, name: &str) -> Result<EntryStatus, HostError> {
        self.entries
            .read()
            .await
            .get(name)
            .map(RegistryEntry::status)
            .ok_or_else(|| not_found(name))
    }

    /// Metadata plus status of every entry, ordered by plugin name.
    pub async fn snapshot(&self) -> Vec<PluginSnapshot> {
        let entries = self.entries.read().await;
        let mut list: Vec<PluginSnapshot> = entries
            .values()
            .map(|e| PluginSnapshot {
                metadata: e.metadata.clone(),
                status: e.status(),
            })
            .collect();
        list.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));
        list
    }

    /// Metadata plus status of one entry.
    pub async fn snapshot_of(&self, name: &str) -> Result<PluginSnapshot, HostError> {
        self.entries
            .read()
            .await
            .get(name)
            .map(|e| PluginSnapshot {
                metadata: e.metadata.clone(),
                status: e.status(),
            })
            .ok_or_else(|| not_found(name))
    }

    /// Run the named plugin's `execute` with an opaque JSON input.
    ///
    /// Plugin failures become `ExecutionFailed` and leave the entry started.
    pub async fn execute(&self, name: &str, input: Value) -> Result<Value, HostError> {
        let (instance, _permit) = {
            let entries = self.entries.read().await;
            let entry = entries.get(name).ok_or_else(|| not_found(name))?;
            let not_started = || HostError::NotStarted {
                name: name.to_string(),
                state: entry.state,
            };
            let slot = match &entry.slot {
                Some(slot) if entry.state.is_executable() => slot,
                _ => return Err(not_started()),
            };
            let permit = Arc::clone(&slot.gate)
                .try_read_owned()
                .map_err(|_| not_started())?;
            (Arc::clone(&slot.instance), permit)
        };

        debug!(plugin = %name, "executing plugin");
        instance
            .execute(input)
            .await
            .map_err(|cause| HostError::ExecutionFailed {
                name: name.to_string(),
                cause,
            })
    }

    /// Reload a plugin that is not running from its recorded bundle.
    ///
    /// Returns false if the entry is unknown, already started, its bundle is
    /// gone, or the reload fails. The reloaded plugin is registered under the
    /// name its bundle reports now, which leaves the old entry `Unloaded` when
    /// the two differ.
    pub async fn enable(&self, name: &str) -> bool {
        let _mutation = self.mutations.lock().await;

        let bundle_path = {
            let entries = self.entries.read().await;
            match entries.get(name) {
                None => return false,
                Some(entry) if entry.state == LifecycleState::Started => return false,
                Some(entry) => entry.metadata.bundle_path.clone(),
            }
        };

        if !tokio::fs::try_exists(&bundle_path).await.unwrap_or(false) {
            warn!(plugin = %name, bundle = %bundle_path.display(), "bundle file is missing");
            if let Some(entry) = self.entries.write().await.get_mut(name) {
                entry.last_error = Some(format!(
                    "bundle file is missing: {}",
                    bundle_path.display()
                ));
            }
            return false;
        }

        let (path, loaded) = match self.materialize(&bundle_path).await {
            Ok(materialized) => materialized,
            Err(err) => {
                warn!(plugin = %name, error = %err, "enable failed");
                return false;
            }
        };

        let reported = loaded.instance.identity().name;
        if reported != name {
            info!(
                plugin = %name,
                reported = %reported,
                "bundle now reports a different plugin name"
            );
        }

        match self.install_locked(path, loaded).await {
            Ok(_) => true,
            Err(err) => {
                warn!(plugin = %name, error = %err, "enable failed");
                false
            }
        }
    }

    /// Stop the named plugin and release its scope.
    ///
    /// Returns false if the entry was not loaded.
    pub async fn disable(&self, name: &str) -> bool {
        let _mutation = self.mutations.lock().await;
        self.teardown(name).await
    }

    /// Load every bundle in `directory` not already recorded.
    ///
    /// Entries whose bundle disappeared are left as they are. Per-bundle
    /// failures are collected in the report and never abort the scan.
    pub async fn rescan(&self, directory: &Path) -> Result<ScanReport, HostError> {
        let _mutation = self.mutations.lock().await;
        let bundles = self.scanner.discover(directory).await?;

        let known: HashSet<PathBuf> = self
            .entries
            .read()
            .await
            .values()
            .map(|e| e.metadata.bundle_path.clone())
            .collect();

        let mut report = ScanReport::default();
        for path in bundles {
            let canonical = tokio::fs::canonicalize(&path).await.unwrap_or_else(|_| path.clone());
            if known.contains(&canonical) {
                report.skipped.push(canonical);
                continue;
            }
            match self.load_locked(&path).await {
                Ok(metadata) => report.loaded.push(metadata.name),
                Err(err) => report.failures.push(ScanFailure {
                    path,
                    error: err.to_string(),
                }),
            }
        }

        info!(
            dir = %directory.display(),
            loaded = report.loaded.len(),
            skipped = report.skipped.len(),
            failed = report.failures.len(),
            "plugin directory scanned"
        );
        Ok(report)
    }

    /// Disable every started plugin. Returns how many were stopped.
    pub async fn shutdown(&self) -> usize {
        let _mutation = self.mutations.lock().await;
        let names: Vec<String> = self
            .entries
            .read()
            .await
            .iter()
            .filter(|(_, e)| e.slot.is_some())
            .map(|(name, _)| name.clone())
            .collect();

        let mut stopped = 0;
        for name in names {
            if self.teardown(&name).await {
                stopped += 1;
            }
        }
        info!(stopped, "registry shut down");
        stopped
    }

    /// Number of entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

fn not_found(name: &str) -> HostError {
    HostError::NotFound {
        name: name.to_string(),
    }
}
