// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for plughost integration tests.
//!
//! # Components
//!
//! - [`fixtures`] - WAT sources of plugins implementing the wasm contract
//! - [`BundleBuilder`] - assembles tar / tar.gz bundles in memory
//! - [`MockLoader`] - JSON-described plugins for fast registry tests

pub mod bundle;
pub mod fixtures;
pub mod mock;

pub use bundle::{BundleBuilder, single_unit};
pub use mock::{EventLog, MockLoader, MockPlugin, MockScope, MockSpec};
