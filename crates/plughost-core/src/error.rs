// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the plughost extension host.
//!
//! Three layers of error exist:
//! - [`PluginFault`] is raised by a plugin's own lifecycle hook or `execute`.
//! - [`LoadError`] is raised by a bundle loader and always names the bundle.
//! - [`HostError`] is what registry operations return to their callers.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::types::LifecycleState;

/// A failure reported by plugin code itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct PluginFault {
    message: String,
}

impl PluginFault {
    /// Creates a fault with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The message the plugin reported.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Why a bundle could not be turned into a live plugin.
#[derive(Debug, Error)]
pub enum LoadErrorKind {
    /// The bundle file could not be read.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The archive is corrupt or in an unsupported format.
    #[error("invalid archive: {0}")]
    Archive(String),

    /// The bundle manifest exists but is invalid.
    #[error("invalid manifest: {0}")]
    Manifest(String),

    /// The manifest requires a newer host.
    #[error("bundle requires host >= {required}, running {running}")]
    IncompatibleHost { required: String, running: String },

    /// No compiled unit implements the plugin contract.
    #[error("no plugin implementation found ({strategy})")]
    NoCandidate { strategy: String },

    /// More than one compiled unit qualifies as the implementation.
    #[error("ambiguous plugin implementation, candidates: {}", candidates.join(", "))]
    AmbiguousCandidates { candidates: Vec<String> },

    /// A compiled unit failed to compile.
    #[error("failed to compile unit '{unit}': {message}")]
    Compile { unit: String, message: String },

    /// The implementation could not be instantiated.
    #[error("instantiation failed: {0}")]
    Instantiation(String),

    /// The instance did not report a usable identity.
    #[error("invalid plugin identity: {0}")]
    Identity(String),
}

/// A bundle failed to load. Carries the bundle path and the cause.
#[derive(Debug, Error)]
#[error("failed to load bundle {}: {kind}", bundle_path.display())]
pub struct LoadError {
    pub bundle_path: PathBuf,
    #[source]
    pub kind: LoadErrorKind,
}

impl LoadError {
    pub fn new(bundle_path: impl AsRef<Path>, kind: impl Into<LoadErrorKind>) -> Self {
        Self {
            bundle_path: bundle_path.as_ref().to_path_buf(),
            kind: kind.into(),
        }
    }
}

/// The primary error type returned by registry operations.
#[derive(Debug, Error)]
pub enum HostError {
    /// Configuration errors (invalid values, unusable directories).
    #[error("configuration error: {0}")]
    Config(String),

    /// A bundle could not be loaded.
    #[error(transparent)]
    Load(#[from] LoadError),

    /// No entry exists under the requested name.
    #[error("plugin not found: {name}")]
    NotFound { name: String },

    /// The entry exists but is not in the `Started` state.
    #[error("plugin '{name}' is not started (state: {state})")]
    NotStarted { name: String, state: LifecycleState },

    /// The plugin's `start` hook failed; the entry is now `Failed`.
    #[error("plugin '{name}' failed to start: {cause}")]
    StartFailed { name: String, cause: PluginFault },

    /// The plugin's `execute` failed. The entry stays `Started`.
    #[error("plugin '{name}' execution failed: {cause}")]
    ExecutionFailed { name: String, cause: PluginFault },

    /// The plugin's `stop` hook failed. Logged during teardown, never fatal.
    #[error("plugin '{name}' failed to stop: {cause}")]
    StopFailed { name: String, cause: PluginFault },

    /// Filesystem errors outside bundle loading (plugin directory, uploads).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl HostError {
    /// Returns true when the error means the named plugin does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, HostError::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_error_names_bundle_and_cause() {
        let err = LoadError::new(
            "/plugins/calc.bundle",
            LoadErrorKind::NoCandidate {
                strategy: "naming heuristic".into(),
            },
        );
        let msg = err.to_string();
        assert!(msg.contains("/plugins/calc.bundle"));
        assert!(msg.contains("no plugin implementation found"));
    }

    #[test]
    fn ambiguous_candidates_are_listed() {
        let kind = LoadErrorKind::AmbiguousCandidates {
            candidates: vec!["a_plugin.wasm".into(), "b_plugin.wasm".into()],
        };
        assert_eq!(
            kind.to_string(),
            "ambiguous plugin implementation, candidates: a_plugin.wasm, b_plugin.wasm"
        );
    }

    #[test]
    fn io_errors_convert_into_load_error_kind() {
        let kind: LoadErrorKind = std::io::Error::other("denied").into();
        assert!(matches!(kind, LoadErrorKind::Io(_)));
    }

    #[test]
    fn host_error_wraps_load_error_transparently() {
        let err: HostError = LoadError::new("x.bundle", LoadErrorKind::Archive("bad".into())).into();
        assert_eq!(err.to_string(), "failed to load bundle x.bundle: invalid archive: bad");
        assert!(!err.is_not_found());
    }

    #[test]
    fn not_started_reports_state() {
        let err = HostError::NotStarted {
            name: "Calculator Plugin".into(),
            state: LifecycleState::Unloaded,
        };
        assert_eq!(
            err.to_string(),
            "plugin 'Calculator Plugin' is not started (state: unloaded)"
        );
    }

    #[test]
    fn execution_failed_keeps_plugin_message() {
        let err = HostError::ExecutionFailed {
            name: "calc".into(),
            cause: PluginFault::new("division by zero"),
        };
        assert!(err.to_string().ends_with("division by zero"));
        assert!(HostError::NotFound { name: "x".into() }.is_not_found());
    }
}
