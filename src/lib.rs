// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # keel
//!
//! A module loading and resolution engine for embeddable JavaScript
//! runtimes.
//!
//! Given a dependency specifier and a referring module, keel finds the
//! canonical module identity, reads its content through a pluggable
//! protocol, dispatches to a format handler, and caches the resulting
//! record so repeated requests are idempotent. CommonJS and ES modules
//! can require and import each other transparently:
//!
//! - CommonJS `require()` with `module.exports` and circular-require
//!   semantics
//! - ES modules with their own instantiate/evaluate lifecycle, driven
//!   by the embedding engine
//! - Synthetic wrappers so `import { x }` works against a CommonJS
//!   exports object, and namespaces so `require()` works against an
//!   ES module
//! - `package.json` resolution (`main`, `type`) and ancestor
//!   `node_modules` search
//! - Pluggable protocols (`file:` by default), format handlers, and
//!   builtins
//!
//! The engine itself stays outside: embedders implement [`Evaluator`]
//! to compile and execute script text, and keel drives it.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use keel::{LoadOptions, ModuleLoader};
//! use std::sync::Arc;
//!
//! let loader = ModuleLoader::new(Arc::new(MyEngine::new()));
//! let main = loader.resolve("./src/app", "/proj", Default::default())?;
//! loader.set_main(&main);
//! let record = loader.load(&main, None, LoadOptions::default())?;
//! println!("{:?}", record.read().exports);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bundle;
pub mod cache;
pub mod error;
pub mod evaluator;
pub mod formats;
pub mod loader;
pub mod paths;
pub mod protocol;
pub mod resolver;
pub mod value;

mod interop;

// Re-exports
pub use bundle::{BundleOpener, BundleProtocol, MountedBundle};
pub use cache::{ModuleCache, ModuleFormat, ModuleRecord, ModuleRef};
pub use error::{Error, Result};
pub use evaluator::{Evaluator, ImportHooks, ModuleHandle};
pub use formats::FormatHandler;
pub use loader::{LoadOptions, ModuleLoader, ResolveOptions};
pub use protocol::{FileProtocol, MemoryProtocol, Protocol, Source};
pub use resolver::{DEP_DIR, FILE_EXTENSIONS};
pub use value::{FunctionRef, NativeFn, ObjectRef, Value};

/// Version of the keel engine
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
