// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module loader - orchestrates resolution, dispatch, and caching

use crate::bundle::BundleOpener;
use crate::cache::{ModuleCache, ModuleRecord, ModuleRef};
use crate::error::{Error, Result};
use crate::evaluator::Evaluator;
use crate::formats::{self, FormatHandler};
use crate::paths;
use crate::protocol::{FileProtocol, Protocol, Source};
use crate::value::Value;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::{Arc, Weak};

/// Scheme assigned to plain paths
pub const FILE_SCHEME: &str = "file:";

/// Handler used when a specifier's extension is not registered
pub const DEFAULT_EXTENSION: &str = ".js";

/// Directory-level metadata file name
pub const PACKAGE_DESCRIPTOR: &str = "package.json";

/// Pluggable native addon loader
pub type AddonLoader = dyn Fn(&str) -> Result<Value> + Send + Sync;

/// Options for [`ModuleLoader::load`]
#[derive(Clone, Default)]
pub struct LoadOptions {
    /// The requesting module, absent for a root load
    pub referrer: Option<ModuleRef>,
    /// Explicit protocol override
    pub protocol: Option<Arc<dyn Protocol>>,
}

/// Options for [`ModuleLoader::resolve`]
#[derive(Clone, Default)]
pub struct ResolveOptions {
    /// Explicit protocol override
    pub protocol: Option<Arc<dyn Protocol>>,
}

/// The central loading context: cache, registries, and the evaluator
/// binding, with clear construction and teardown so embedders and
/// tests get isolated state instead of process globals.
pub struct ModuleLoader {
    weak: Weak<ModuleLoader>,
    evaluator: Arc<dyn Evaluator>,
    cache: ModuleCache,
    builtins: DashMap<String, Value>,
    formats: DashMap<String, Arc<dyn FormatHandler>>,
    protocols: DashMap<String, Arc<dyn Protocol>>,
    addon_loader: RwLock<Option<Arc<AddonLoader>>>,
    bundle_opener: RwLock<Option<Arc<dyn BundleOpener>>>,
    main: RwLock<Option<String>>,
}

impl ModuleLoader {
    /// Create a loader bound to an evaluator, with the built-in
    /// format handlers and the filesystem protocol registered.
    pub fn new(evaluator: Arc<dyn Evaluator>) -> Arc<Self> {
        let loader = Arc::new_cyclic(|weak| Self {
            weak: weak.clone(),
            evaluator,
            cache: ModuleCache::new(),
            builtins: DashMap::new(),
            formats: DashMap::new(),
            protocols: DashMap::new(),
            addon_loader: RwLock::new(None),
            bundle_opener: RwLock::new(None),
            main: RwLock::new(None),
        });
        loader.register_protocol(FILE_SCHEME, Arc::new(FileProtocol::new()));
        formats::register_defaults(&loader);
        loader
    }

    /// Load a module, returning its record.
    ///
    /// `source` optionally supplies the content, bypassing the
    /// protocol read. Loading is idempotent: a cached identifier is
    /// returned as-is after interop synthesis against the new
    /// referrer, and its content never re-executes.
    pub fn load(&self, specifier: &str, source: Option<Source>, opts: LoadOptions) -> Result<ModuleRef> {
        if let Some(existing) = self.cache.get(specifier) {
            tracing::debug!(specifier, "module cache hit");
            self.synthesize(&existing, opts.referrer.as_ref())?;
            return Ok(existing);
        }

        // Builtins bypass the descriptor walk and format dispatch
        // entirely; their exports are the registered value.
        if let Some(exports) = self.builtins.get(specifier).map(|entry| entry.value().clone()) {
            let record = ModuleRecord::shared(specifier);
            record.write().exports = Some(exports);
            self.cache.insert(specifier, Arc::clone(&record));
            self.synthesize(&record, opts.referrer.as_ref())?;
            return Ok(record);
        }

        let protocol = self.select_protocol(specifier, opts.protocol.clone())?;

        // The record enters the cache before its handler runs so a
        // cyclic request observes the partially populated record
        // instead of recursing forever.
        let record = ModuleRecord::shared(specifier);
        record.write().protocol = Some(Arc::clone(&protocol));
        self.cache.insert(specifier, Arc::clone(&record));

        let dirname = record.read().dirname.clone();
        let info = self.find_package_info(&dirname, &protocol);
        record.write().info = info;

        let extension = {
            let ext = paths::extname(specifier);
            if self.formats.contains_key(&ext) {
                ext
            } else {
                DEFAULT_EXTENSION.to_string()
            }
        };
        let handler = self
            .formats
            .get(&extension)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| Error::evaluator(format!("no format handler for '{extension}'")))?;
        tracing::debug!(specifier, %extension, "dispatching format handler");
        handler.handle(self, &record, specifier, source, opts.referrer.as_ref(), &protocol)?;

        self.synthesize(&record, opts.referrer.as_ref())?;
        Ok(record)
    }

    /// Resolve a specifier to a canonical, existing identifier.
    ///
    /// Builtin names resolve to themselves without any probing.
    pub fn resolve(&self, specifier: &str, dirname: &str, opts: ResolveOptions) -> Result<String> {
        if self.is_builtin(specifier) {
            return Ok(specifier.to_string());
        }
        let protocol = self.select_protocol(specifier, opts.protocol)?;
        let mapped = protocol.map(specifier, dirname);
        match self.resolve_any(&mapped, dirname, &protocol) {
            Some(resolved) => {
                tracing::debug!(specifier, %resolved, "resolved");
                Ok(resolved)
            }
            None => Err(Error::resolve(specifier, dirname)),
        }
    }

    /// Whether `name` is a registered builtin
    pub fn is_builtin(&self, name: &str) -> bool {
        self.builtins.contains_key(name)
    }

    /// Names of all registered builtins
    pub fn builtin_names(&self) -> Vec<String> {
        self.builtins.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Register a builtin module under `name`
    pub fn register_builtin(&self, name: impl Into<String>, exports: Value) {
        self.builtins.insert(name.into(), exports);
    }

    /// Register a format handler for an extension (e.g. `".wasm"`)
    pub fn register_format(&self, extension: impl Into<String>, handler: Arc<dyn FormatHandler>) {
        self.formats.insert(extension.into(), handler);
    }

    /// Register a protocol under a scheme prefix (e.g. `"zip:"`)
    pub fn register_protocol(&self, scheme: impl Into<String>, protocol: Arc<dyn Protocol>) {
        self.protocols.insert(scheme.into(), protocol);
    }

    /// Install the native addon loader used by the `.node` handler
    pub fn set_addon_loader(&self, loader: impl Fn(&str) -> Result<Value> + Send + Sync + 'static) {
        *self.addon_loader.write() = Some(Arc::new(loader));
    }

    /// Install the opener used by the `.bundle` handler
    pub fn set_bundle_opener(&self, opener: Arc<dyn BundleOpener>) {
        *self.bundle_opener.write() = Some(opener);
    }

    /// The module cache
    pub fn cache(&self) -> &ModuleCache {
        &self.cache
    }

    /// The bound evaluator
    pub fn evaluator(&self) -> &Arc<dyn Evaluator> {
        &self.evaluator
    }

    /// Mark the entry module of the embedding program
    pub fn set_main(&self, identifier: impl Into<String>) {
        *self.main.write() = Some(identifier.into());
    }

    /// Whether `identifier` is the marked entry module
    pub fn is_main(&self, identifier: &str) -> bool {
        self.main.read().as_deref() == Some(identifier)
    }

    /// The marked entry module, if any
    pub fn main(&self) -> Option<String> {
        self.main.read().clone()
    }

    pub(crate) fn shared(&self) -> Arc<Self> {
        self.weak.upgrade().expect("module loader context dropped")
    }

    pub(crate) fn addon_loader(&self) -> Option<Arc<AddonLoader>> {
        self.addon_loader.read().clone()
    }

    pub(crate) fn bundle_opener(&self) -> Option<Arc<dyn BundleOpener>> {
        self.bundle_opener.read().clone()
    }

    pub(crate) fn format(&self, extension: &str) -> Option<Arc<dyn FormatHandler>> {
        self.formats.get(extension).map(|entry| Arc::clone(entry.value()))
    }

    /// Pick the protocol for a specifier: a registered scheme always
    /// wins, plain paths fall back to `file:` unless an explicit
    /// override was given.
    pub(crate) fn select_protocol(
        &self,
        specifier: &str,
        explicit: Option<Arc<dyn Protocol>>,
    ) -> Result<Arc<dyn Protocol>> {
        let scheme = scheme_of(specifier);
        let lookup = match scheme {
            Some(scheme) => Some(scheme),
            None if explicit.is_none() => Some(FILE_SCHEME),
            None => None,
        };
        if let Some(key) = lookup {
            if let Some(protocol) = self.protocols.get(key) {
                return Ok(Arc::clone(protocol.value()));
            }
        }
        explicit.ok_or_else(|| Error::UnknownScheme(scheme.unwrap_or(FILE_SCHEME).to_string()))
    }

    /// Walk upward from `dirname` to the nearest directory holding a
    /// package descriptor and load it through the loader itself.
    /// Unreadable or malformed descriptors are tolerated; the module
    /// proceeds without package metadata.
    fn find_package_info(&self, dirname: &str, protocol: &Arc<dyn Protocol>) -> Option<Value> {
        let mut dir = dirname.to_string();
        loop {
            let descriptor = paths::join(&[&dir, PACKAGE_DESCRIPTOR]);
            if protocol.exists(&descriptor) {
                let opts = LoadOptions {
                    referrer: None,
                    protocol: Some(Arc::clone(protocol)),
                };
                return match self.load(&descriptor, None, opts) {
                    Ok(record) => record.read().exports.clone(),
                    Err(error) => {
                        tracing::debug!(%descriptor, %error, "ignoring unreadable package descriptor");
                        None
                    }
                };
            }
            if dir == "/" || dir == "." {
                return None;
            }
            dir = paths::dirname(&dir);
        }
    }
}

impl Drop for ModuleLoader {
    fn drop(&mut self) {
        self.evaluator.destroy();
    }
}

/// The scheme prefix of a specifier including the trailing colon, if
/// it has one (`"zip:"` for `"zip:/a/b"`).
fn scheme_of(specifier: &str) -> Option<&str> {
    let colon = specifier.find(':')?;
    if colon == 0 {
        return None;
    }
    let prefix = &specifier[..colon];
    if !prefix
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    {
        return None;
    }
    Some(&specifier[..=colon])
}
