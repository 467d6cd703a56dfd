// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The wasm bundle loader.
//!
//! Loading runs in five steps: read the archive, parse the manifest, compile
//! every unit, pick the implementation, then bind it in a fresh isolation
//! scope and ask it for its identity. Everything runs on the blocking pool.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use plughost_core::{
    BundleLoader, HostError, LoadError, LoadErrorKind, LoadedPlugin, PluginIdentity,
};
use semver::Version;
use tokio::sync::Mutex;
use tracing::{debug, info};
use wasmtime::{Config, Engine, ExternType, Linker, Module, Store, StoreLimitsBuilder, ValType};

use crate::archive::BundleArchive;
use crate::host::{HOST_MODULE, HostState, define_host_functions};
use crate::locator::{LocatorStrategy, NamingHeuristic, UnitDescriptor, select_implementation};
use crate::manifest::{BundleManifest, parse_manifest};
use crate::plugin::WasmPlugin;
use crate::scope::{ScopeCell, ScopeTracker, WasmScope};

/// Tunables for [`WasmBundleLoader`].
#[derive(Debug, Clone)]
pub struct LoaderOptions {
    /// Bundle file extension, without the dot.
    pub bundle_extension: String,
    /// Manifest file name at the archive root.
    pub manifest_file: String,
    /// Token for the default naming heuristic.
    pub candidate_token: String,
    /// Linear memory cap per isolation scope.
    pub max_memory_bytes: usize,
    /// Version compared against `min_host_version` in manifests.
    pub host_version: Version,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            bundle_extension: "bundle".to_string(),
            manifest_file: "plugin.toml".to_string(),
            candidate_token: "plugin".to_string(),
            max_memory_bytes: 64 * 1024 * 1024,
            host_version: Version::parse(env!("CARGO_PKG_VERSION"))
                .unwrap_or_else(|_| Version::new(0, 0, 0)),
        }
    }
}

/// Loads wasm bundles into per-bundle wasmtime stores.
#[derive(Clone)]
pub struct WasmBundleLoader {
    engine: Engine,
    options: LoaderOptions,
    strategy: Arc<dyn LocatorStrategy>,
    tracker: ScopeTracker,
}

impl WasmBundleLoader {
    /// Creates a loader using the naming heuristic as its fallback strategy.
    pub fn new(options: LoaderOptions) -> Result<Self, HostError> {
        let strategy = Arc::new(NamingHeuristic::new(options.candidate_token.clone()));
        Self::with_locator(options, strategy)
    }

    /// Creates a loader with a custom fallback locator strategy.
    pub fn with_locator(
        options: LoaderOptions,
        strategy: Arc<dyn LocatorStrategy>,
    ) -> Result<Self, HostError> {
        let config = Config::new();
        let engine = Engine::new(&config)
            .map_err(|e| HostError::Internal(format!("failed to create wasmtime engine: {e}")))?;

        info!(
            locator = %strategy.describe(),
            max_memory_bytes = options.max_memory_bytes,
            "wasm bundle loader initialized"
        );

        Ok(Self {
            engine,
            options,
            strategy,
            tracker: ScopeTracker::new(),
        })
    }

    /// Number of isolation scopes currently holding resources.
    pub fn live_scopes(&self) -> usize {
        self.tracker.live_scopes()
    }

    pub fn tracker(&self) -> &ScopeTracker {
        &self.tracker
    }

    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    /// Reads a bundle and reports what it contains without instantiating it.
    pub fn inspect(&self, bundle_path: &Path) -> Result<BundleInspection, LoadError> {
        let err = |kind: LoadErrorKind| LoadError::new(bundle_path, kind);
        let archive = BundleArchive::open(bundle_path, &self.options.manifest_file).map_err(err)?;
        let manifest = archive.manifest.as_deref().map(parse_manifest).transpose().map_err(err)?;
        let compiled = self.compile_units(&archive).map_err(err)?;
        let units: Vec<UnitDescriptor> = compiled
            .iter()
            .map(|(path, module)| UnitDescriptor::new(path.clone(), implements_contract(module)))
            .collect();
        let selected =
            select_implementation(manifest.as_ref(), self.strategy.as_ref(), &units);
        Ok(BundleInspection {
            units,
            manifest,
            selected,
        })
    }

    fn compile_units(&self, archive: &BundleArchive) -> Result<Vec<(String, Module)>, LoadErrorKind> {
        archive
            .units
            .iter()
            .map(|unit| {
                Module::new(&self.engine, &unit.bytes)
                    .map(|module| (unit.path.clone(), module))
                    .map_err(|e| LoadErrorKind::Compile {
                        unit: unit.path.clone(),
                        message: format!("{e:#}"),
                    })
            })
            .collect()
    }

    /// Synchronous part of loading. Runs on the blocking pool.
    fn materialize(&self, bundle_path: &Path) -> Result<Materialized, LoadErrorKind> {
        let archive = BundleArchive::open(bundle_path, &self.options.manifest_file)?;
        let manifest: Option<BundleManifest> =
            archive.manifest.as_deref().map(parse_manifest).transpose()?;
        if let Some(manifest) = &manifest {
            manifest.check_host_version(&self.options.host_version)?;
        }

        let compiled = self.compile_units(&archive)?;
        let units: Vec<UnitDescriptor> = compiled
            .iter()
            .map(|(path, module)| UnitDescriptor::new(path.clone(), implements_contract(module)))
            .collect();
        let locator = select_implementation(manifest.as_ref(), self.strategy.as_ref(), &units)?;
        debug!(bundle = %bundle_path.display(), unit = %locator, "implementation selected");

        // From here on the ticket is released by drop on every error path.
        let ticket = self.tracker.open();
        let label = bundle_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let limits = StoreLimitsBuilder::new()
            .memory_size(self.options.max_memory_bytes)
            .build();
        let mut store = Store::new(&self.engine, HostState::new(label, limits));
        store.limiter(|state| &mut state.limits);

        let mut linker: Linker<HostState> = Linker::new(&self.engine);
        define_host_functions(&mut linker)?;

        let mut main = None;
        let mut siblings = Vec::new();
        for (path, module) in compiled {
            if path == locator {
                main = Some(module);
            } else {
                siblings.push((unit_stem(&path).to_string(), module));
            }
        }
        let main = main.ok_or_else(|| {
            LoadErrorKind::Instantiation(format!("selected unit '{locator}' was not compiled"))
        })?;

        link_siblings(&mut linker, &mut store, siblings)?;

        let instance = linker
            .instantiate(&mut store, &main)
            .map_err(|e| LoadErrorKind::Instantiation(format!("{e:#}")))?;
        let typed = |store: &mut Store<HostState>, name: &str| {
            instance
                .get_typed_func::<(), i32>(store, name)
                .map_err(|e| LoadErrorKind::Instantiation(format!("export '{name}': {e:#}")))
        };
        let start = typed(&mut store, "start")?;
        let stop = typed(&mut store, "stop")?;
        let execute = typed(&mut store, "execute")?;
        let identity_fn = instance
            .get_typed_func::<(), ()>(&mut store, "identity")
            .map_err(|e| LoadErrorKind::Instantiation(format!("export 'identity': {e:#}")))?;

        identity_fn
            .call(&mut store, ())
            .map_err(|e| LoadErrorKind::Identity(format!("identity trapped: {e:#}")))?;
        let identity = store.data_mut().take_identity().ok_or_else(|| {
            LoadErrorKind::Identity("identity did not call set_identity".to_string())
        })?;
        validate_identity(&identity)?;

        let scope_id = ticket.id();
        Ok(Materialized {
            identity,
            locator,
            scope_id,
            cell: ScopeCell::new(store, start, stop, execute, ticket),
        })
    }
}

struct Materialized {
    identity: PluginIdentity,
    locator: String,
    scope_id: u64,
    cell: ScopeCell,
}

/// What [`WasmBundleLoader::inspect`] found in a bundle.
#[derive(Debug)]
pub struct BundleInspection {
    pub units: Vec<UnitDescriptor>,
    pub manifest: Option<BundleManifest>,
    /// Outcome of implementation selection.
    pub selected: Result<String, LoadErrorKind>,
}

#[async_trait]
impl BundleLoader for WasmBundleLoader {
    fn bundle_extension(&self) -> &str {
        &self.options.bundle_extension
    }

    async fn load(&self, bundle_path: &Path) -> Result<LoadedPlugin, LoadError> {
        let loader = self.clone();
        let path: PathBuf = bundle_path.to_path_buf();
        let materialized = tokio::task::spawn_blocking(move || loader.materialize(&path))
            .await
            .map_err(|e| {
                LoadError::new(
                    bundle_path,
                    LoadErrorKind::Instantiation(format!("loader task failed: {e}")),
                )
            })?
            .map_err(|kind| LoadError::new(bundle_path, kind))?;

        let Materialized {
            identity,
            locator,
            scope_id,
            cell,
        } = materialized;

        info!(
            plugin = %identity.name,
            version = %identity.version,
            unit = %locator,
            scope = scope_id,
            "bundle materialized"
        );

        let cell = Arc::new(Mutex::new(Some(cell)));
        Ok(LoadedPlugin {
            instance: Arc::new(WasmPlugin::new(identity, Arc::clone(&cell))),
            scope: Box::new(WasmScope::new(scope_id, bundle_path.to_path_buf(), cell)),
            implementation_locator: locator,
        })
    }
}

/// True when the module exports memory plus the four contract functions.
pub fn implements_contract(module: &Module) -> bool {
    let mut found = HashSet::new();
    for export in module.exports() {
        let ok = match (export.name(), export.ty()) {
            ("memory", ExternType::Memory(_)) => true,
            ("identity", ExternType::Func(f)) => f.params().len() == 0 && f.results().len() == 0,
            ("start" | "stop" | "execute", ExternType::Func(f)) => {
                let mut results = f.results();
                f.params().len() == 0
                    && results.len() == 1
                    && matches!(results.next(), Some(ValType::I32))
            }
            _ => false,
        };
        if ok {
            found.insert(export.name().to_string());
        }
    }
    ["memory", "identity", "start", "stop", "execute"]
        .iter()
        .all(|name| found.contains(*name))
}

fn unit_stem(path: &str) -> &str {
    let file = path.rsplit('/').next().unwrap_or(path);
    file.strip_suffix(crate::archive::UNIT_EXTENSION).unwrap_or(file)
}

/// Instantiates sibling units in dependency order and registers each one
/// under its file stem. Units whose imports never resolve stay unlinked; the
/// selected unit fails to instantiate if it needs one of them.
fn link_siblings(
    linker: &mut Linker<HostState>,
    store: &mut Store<HostState>,
    siblings: Vec<(String, Module)>,
) -> Result<(), LoadErrorKind> {
    let mut linked: HashSet<String> = HashSet::from([HOST_MODULE.to_string()]);
    let mut pending: HashMap<String, Module> = HashMap::new();
    for (stem, module) in siblings {
        if linked.contains(&stem) || pending.contains_key(&stem) {
            return Err(LoadErrorKind::Instantiation(format!(
                "two units share the link name '{stem}'"
            )));
        }
        pending.insert(stem, module);
    }

    loop {
        let ready: Vec<String> = pending
            .iter()
            .filter(|(_, module)| module.imports().all(|i| linked.contains(i.module())))
            .map(|(stem, _)| stem.clone())
            .collect();
        if ready.is_empty() {
            break;
        }
        for stem in ready {
            let Some(module) = pending.remove(&stem) else {
                continue;
            };
            let instance = linker
                .instantiate(&mut *store, &module)
                .map_err(|e| LoadErrorKind::Instantiation(format!("unit '{stem}': {e:#}")))?;
            linker
                .instance(&mut *store, &stem, instance)
                .map_err(|e| LoadErrorKind::Instantiation(format!("unit '{stem}': {e:#}")))?;
            debug!(unit = %stem, "sibling unit linked");
            linked.insert(stem);
        }
    }

    for stem in pending.keys() {
        debug!(unit = %stem, "sibling unit has unresolved imports, not linked");
    }
    Ok(())
}

fn validate_identity(identity: &PluginIdentity) -> Result<(), LoadErrorKind> {
    if identity.name.trim().is_empty() {
        return Err(LoadErrorKind::Identity("plugin name must not be empty".to_string()));
    }
    if identity.version.trim().is_empty() {
        return Err(LoadErrorKind::Identity(format!(
            "plugin '{}' reported an empty version",
            identity.name
        )));
    }
    Ok(())
}
