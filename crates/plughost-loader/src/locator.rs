// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Implementation locator strategies.
//!
//! A bundle may carry several compiled units. Exactly one of them implements
//! the plugin contract; the manifest can name it, otherwise a
//! [`LocatorStrategy`] picks it from the unit descriptors.

use plughost_core::LoadErrorKind;

use crate::manifest::BundleManifest;

/// What a locator strategy knows about one compiled unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitDescriptor {
    /// Normalized archive path.
    pub path: String,
    /// True when the unit exports every item of the contract.
    pub implements_contract: bool,
}

impl UnitDescriptor {
    pub fn new(path: impl Into<String>, implements_contract: bool) -> Self {
        Self {
            path: path.into(),
            implements_contract,
        }
    }

    /// File name without directory and without the `.wasm` extension.
    pub fn stem(&self) -> &str {
        let file = self.path.rsplit('/').next().unwrap_or(&self.path);
        file.strip_suffix(crate::archive::UNIT_EXTENSION).unwrap_or(file)
    }

    /// Units below a directory inside the archive.
    pub fn is_nested(&self) -> bool {
        self.path.contains('/')
    }

    /// Units with no usable name: an empty stem or a generated `$` name.
    pub fn is_anonymous(&self) -> bool {
        let stem = self.stem();
        stem.is_empty() || stem.contains('$')
    }
}

/// Picks the implementation unit when the manifest does not.
pub trait LocatorStrategy: Send + Sync {
    /// Short description used in `NoCandidate` errors and logs.
    fn describe(&self) -> String;

    /// Returns the path of the selected unit.
    fn locate(&self, units: &[UnitDescriptor]) -> Result<String, LoadErrorKind>;
}

/// Accepts top-level, named units whose stem contains a token.
#[derive(Debug, Clone)]
pub struct NamingHeuristic {
    token: String,
}

impl NamingHeuristic {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into().to_ascii_lowercase(),
        }
    }
}

impl Default for NamingHeuristic {
    fn default() -> Self {
        Self::new("plugin")
    }
}

impl LocatorStrategy for NamingHeuristic {
    fn describe(&self) -> String {
        format!("naming heuristic, token '{}'", self.token)
    }

    fn locate(&self, units: &[UnitDescriptor]) -> Result<String, LoadErrorKind> {
        let candidates: Vec<&UnitDescriptor> = units
            .iter()
            .filter(|u| u.implements_contract && !u.is_nested() && !u.is_anonymous())
            .filter(|u| u.stem().to_ascii_lowercase().contains(&self.token))
            .collect();
        single_candidate(candidates, || self.describe())
    }
}

/// Accepts any unit implementing the contract, as long as there is only one.
#[derive(Debug, Clone, Copy, Default)]
pub struct SoleImplementation;

impl LocatorStrategy for SoleImplementation {
    fn describe(&self) -> String {
        "sole implementation".to_string()
    }

    fn locate(&self, units: &[UnitDescriptor]) -> Result<String, LoadErrorKind> {
        let candidates: Vec<&UnitDescriptor> =
            units.iter().filter(|u| u.implements_contract).collect();
        single_candidate(candidates, || self.describe())
    }
}

fn single_candidate(
    candidates: Vec<&UnitDescriptor>,
    describe: impl FnOnce() -> String,
) -> Result<String, LoadErrorKind> {
    match candidates.as_slice() {
        [] => Err(LoadErrorKind::NoCandidate {
            strategy: describe(),
        }),
        [only] => Ok(only.path.clone()),
        many => Err(LoadErrorKind::AmbiguousCandidates {
            candidates: many.iter().map(|u| u.path.clone()).collect(),
        }),
    }
}

/// Chooses the implementation unit for a bundle.
///
/// A manifest `entry` takes precedence over the fallback strategy; the named
/// unit must exist and implement the contract.
pub fn select_implementation(
    manifest: Option<&BundleManifest>,
    fallback: &dyn LocatorStrategy,
    units: &[UnitDescriptor],
) -> Result<String, LoadErrorKind> {
    let Some(entry) = manifest.and_then(|m| m.entry.as_deref()) else {
        return fallback.locate(units);
    };

    match units.iter().find(|u| u.path == entry) {
        Some(unit) if unit.implements_contract => Ok(unit.path.clone()),
        Some(_) => Err(LoadErrorKind::Manifest(format!(
            "entry '{entry}' does not implement the plugin contract"
        ))),
        None => Err(LoadErrorKind::Manifest(format!(
            "entry '{entry}' is not present in the bundle"
        ))),
    }
}
