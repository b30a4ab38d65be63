// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Evaluator binding
//!
//! The loader never compiles or executes script text itself; the
//! embedding engine implements [`Evaluator`] and the loader drives it.
//! During ES module graph traversal the engine calls back into the
//! loader through [`ImportHooks`] to obtain resolved dependencies and
//! to populate synthetic module bindings at evaluation time.

use crate::error::Result;
use crate::value::{FunctionRef, Value};

/// Opaque handle the engine uses to identify a compiled ES module or
/// a synthetic module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleHandle(pub u64);

/// Callbacks the engine invokes while traversing an ES module graph.
/// Implemented by the module loader.
pub trait ImportHooks {
    /// Resolve and load a static import, returning the dependency's
    /// module handle.
    fn static_import(&self, specifier: &str, referrer: &str) -> Result<ModuleHandle>;

    /// Resolve, load, and instantiate a dynamic import.
    fn dynamic_import(&self, specifier: &str, referrer: &str) -> Result<ModuleHandle>;

    /// Populate a synthetic module's bindings from its wrapped
    /// exports. Invoked by the engine exactly once per synthetic
    /// module, at evaluation time.
    fn evaluate(&self, identifier: &str) -> Result<()>;
}

/// The compile-and-execute surface an embedding engine provides.
///
/// All calls are synchronous; failures are propagated to the loader's
/// caller unmodified.
pub trait Evaluator: Send + Sync {
    /// Compile an imperative module body into a callable taking the
    /// given parameter names.
    fn create_function(
        &self,
        identifier: &str,
        params: &[&str],
        source: &str,
    ) -> Result<FunctionRef>;

    /// Compile source text into a not-yet-instantiated ES module.
    fn create_module(&self, identifier: &str, source: &str) -> Result<ModuleHandle>;

    /// Create a synthetic module exposing the given export names.
    fn create_synthetic_module(
        &self,
        identifier: &str,
        export_names: &[String],
    ) -> Result<ModuleHandle>;

    /// Instantiate a module, resolving its imports through `hooks`.
    fn instantiate_module(&self, handle: ModuleHandle, hooks: &dyn ImportHooks) -> Result<()>;

    /// Evaluate an instantiated module and its graph.
    fn run_module(&self, handle: ModuleHandle, hooks: &dyn ImportHooks) -> Result<()>;

    /// Set one export binding on a synthetic module.
    fn set_export(&self, handle: ModuleHandle, name: &str, value: Value) -> Result<()>;

    /// The namespace object of an evaluated module.
    fn module_namespace(&self, handle: ModuleHandle) -> Result<Value>;

    /// Release the engine's module context. Called once when the
    /// loader is dropped.
    fn destroy(&self) {}
}
