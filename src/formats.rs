// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Format handlers
//!
//! One handler per file extension, dispatched by the loader. A handler
//! must set `record.format` and `record.exports` (or `record.handle`
//! for ES modules) before returning. New formats register through
//! [`ModuleLoader::register_format`] without touching the dispatcher.

use crate::bundle::BundleProtocol;
use crate::cache::{ModuleFormat, ModuleRef};
use crate::error::{Error, Result};
use crate::loader::{LoadOptions, ModuleLoader, ResolveOptions};
use crate::protocol::{Protocol, Source};
use crate::value::{FunctionRef, ObjectRef, Value};
use std::sync::Arc;

/// A format-specific load handler
pub trait FormatHandler: Send + Sync {
    /// Populate `record` from the content behind `identifier`
    fn handle(
        &self,
        loader: &ModuleLoader,
        record: &ModuleRef,
        identifier: &str,
        source: Option<Source>,
        referrer: Option<&ModuleRef>,
        protocol: &Arc<dyn Protocol>,
    ) -> Result<()>;
}

pub(crate) fn register_defaults(loader: &Arc<ModuleLoader>) {
    loader.register_format(".js", Arc::new(JsHandler));
    loader.register_format(".cjs", Arc::new(CjsHandler));
    loader.register_format(".mjs", Arc::new(MjsHandler));
    loader.register_format(".json", Arc::new(JsonHandler));
    loader.register_format(".node", Arc::new(AddonHandler));
    loader.register_format(".bundle", Arc::new(BundleHandler));
}

fn read_text(
    source: Option<Source>,
    identifier: &str,
    protocol: &Arc<dyn Protocol>,
) -> Result<String> {
    let source = match source {
        Some(source) => source,
        None => protocol.read(identifier)?,
    };
    source.into_text(identifier)
}

/// Generic script handler: picks CommonJS or ESM from the nearest
/// package descriptor's `type` field. Format is a function of ambient
/// directory metadata here, not of the extension alone.
pub struct JsHandler;

impl FormatHandler for JsHandler {
    fn handle(
        &self,
        loader: &ModuleLoader,
        record: &ModuleRef,
        identifier: &str,
        source: Option<Source>,
        referrer: Option<&ModuleRef>,
        protocol: &Arc<dyn Protocol>,
    ) -> Result<()> {
        let delegate = if record.read().package_type().as_deref() == Some("module") {
            ".mjs"
        } else {
            ".cjs"
        };
        let handler = loader
            .format(delegate)
            .ok_or_else(|| Error::evaluator(format!("no format handler for '{delegate}'")))?;
        handler.handle(loader, record, identifier, source, referrer, protocol)
    }
}

/// CommonJS: compile the body with the conventional five parameters
/// and execute it synchronously against a fresh exports object.
pub struct CjsHandler;

impl FormatHandler for CjsHandler {
    fn handle(
        &self,
        loader: &ModuleLoader,
        record: &ModuleRef,
        identifier: &str,
        source: Option<Source>,
        _referrer: Option<&ModuleRef>,
        protocol: &Arc<dyn Protocol>,
    ) -> Result<()> {
        let source_text = read_text(source, identifier, protocol)?;

        let exports = ObjectRef::new();
        let dirname = {
            let mut guard = record.write();
            guard.format = Some(ModuleFormat::CommonJs);
            guard.protocol = Some(Arc::clone(protocol));
            guard.exports = Some(Value::Object(exports.clone()));
            guard.dirname.clone()
        };

        let module_object = ObjectRef::new();
        module_object.set("filename", Value::String(identifier.to_string()));
        module_object.set("dirname", Value::String(dirname.clone()));
        module_object.set("exports", Value::Object(exports.clone()));

        let require = make_require(loader, record, protocol);
        let function = loader.evaluator().create_function(
            identifier,
            &["require", "module", "exports", "__filename", "__dirname"],
            &source_text,
        )?;
        function.call(&[
            Value::Function(require),
            Value::Object(module_object.clone()),
            Value::Object(exports),
            Value::String(identifier.to_string()),
            Value::String(dirname),
        ])?;

        // The body may have reassigned module.exports.
        if let Some(reassigned) = module_object.get("exports") {
            record.write().exports = Some(reassigned);
        }
        Ok(())
    }
}

/// Build the dependency-require function handed to a CommonJS body,
/// with `resolve` and `cache` hung off it for introspection.
fn make_require(loader: &ModuleLoader, record: &ModuleRef, protocol: &Arc<dyn Protocol>) -> FunctionRef {
    let shared = loader.shared();
    let dirname = record.read().dirname.clone();

    let resolve = {
        let shared = Arc::clone(&shared);
        let protocol = Arc::clone(protocol);
        let dirname = dirname.clone();
        FunctionRef::new(move |args| {
            let specifier = require_arg(args)?;
            let opts = ResolveOptions {
                protocol: Some(Arc::clone(&protocol)),
            };
            Ok(Value::String(shared.resolve(specifier, &dirname, opts)?))
        })
    };

    let require = {
        let shared = Arc::clone(&shared);
        let protocol = Arc::clone(protocol);
        let referrer = Arc::clone(record);
        FunctionRef::new(move |args| {
            let specifier = require_arg(args)?;
            let resolve_opts = ResolveOptions {
                protocol: Some(Arc::clone(&protocol)),
            };
            let resolved = shared.resolve(specifier, &dirname, resolve_opts)?;
            let load_opts = LoadOptions {
                referrer: Some(Arc::clone(&referrer)),
                protocol: Some(Arc::clone(&protocol)),
            };
            let dep = shared.load(&resolved, None, load_opts)?;
            let exports = dep.read().exports.clone();
            Ok(exports.unwrap_or_default())
        })
    };

    require.properties().set("resolve", Value::Function(resolve));
    require
        .properties()
        .set("cache", Value::Object(cache_snapshot(&shared)));
    require
}

fn require_arg(args: &[Value]) -> Result<&str> {
    args.first()
        .and_then(Value::as_str)
        .ok_or_else(|| Error::type_error("require expects a specifier string"))
}

fn cache_snapshot(loader: &ModuleLoader) -> ObjectRef {
    let snapshot = ObjectRef::new();
    for identifier in loader.cache().keys() {
        if let Some(record) = loader.cache().get(&identifier) {
            let exports = record.read().exports.clone().unwrap_or_default();
            snapshot.set(identifier, exports);
        }
    }
    snapshot
}

/// ES module: compile to an engine handle. A root or CJS-requested
/// module runs to completion here; an ESM-requested one is left to
/// the engine's own graph traversal.
pub struct MjsHandler;

impl FormatHandler for MjsHandler {
    fn handle(
        &self,
        loader: &ModuleLoader,
        record: &ModuleRef,
        identifier: &str,
        source: Option<Source>,
        referrer: Option<&ModuleRef>,
        protocol: &Arc<dyn Protocol>,
    ) -> Result<()> {
        let source_text = read_text(source, identifier, protocol)?;

        {
            let mut guard = record.write();
            guard.format = Some(ModuleFormat::Esm);
            guard.protocol = Some(Arc::clone(protocol));
            guard.exports = None;
        }

        let handle = loader.evaluator().create_module(identifier, &source_text)?;
        record.write().handle = Some(handle);

        let eager = match referrer {
            None => true,
            Some(referrer) => referrer.read().format != Some(ModuleFormat::Esm),
        };
        if eager {
            loader.evaluator().instantiate_module(handle, loader)?;
            loader.evaluator().run_module(handle, loader)?;
        }
        Ok(())
    }
}

/// JSON: parse and expose the value, no execution
pub struct JsonHandler;

impl FormatHandler for JsonHandler {
    fn handle(
        &self,
        _loader: &ModuleLoader,
        record: &ModuleRef,
        identifier: &str,
        source: Option<Source>,
        _referrer: Option<&ModuleRef>,
        protocol: &Arc<dyn Protocol>,
    ) -> Result<()> {
        let text = read_text(source, identifier, protocol)?;
        let parsed: serde_json::Value = serde_json::from_str(&text)?;

        let mut guard = record.write();
        guard.format = Some(ModuleFormat::Json);
        guard.protocol = Some(Arc::clone(protocol));
        guard.exports = Some(Value::from_json(&parsed));
        Ok(())
    }
}

/// Native addon, delegated to the installed addon loader
pub struct AddonHandler;

impl FormatHandler for AddonHandler {
    fn handle(
        &self,
        loader: &ModuleLoader,
        record: &ModuleRef,
        identifier: &str,
        _source: Option<Source>,
        _referrer: Option<&ModuleRef>,
        protocol: &Arc<dyn Protocol>,
    ) -> Result<()> {
        let addon_loader = loader
            .addon_loader()
            .ok_or_else(|| Error::AddonUnsupported(identifier.to_string()))?;
        let exports = addon_loader(identifier)?;

        let mut guard = record.write();
        guard.format = Some(ModuleFormat::Addon);
        guard.protocol = Some(Arc::clone(protocol));
        guard.exports = Some(exports);
        Ok(())
    }
}

/// Bundle: mount the container, wrap it in an ephemeral protocol, and
/// load its entry module through that protocol. The bundle record
/// adopts whatever the entry resolved to.
pub struct BundleHandler;

impl FormatHandler for BundleHandler {
    fn handle(
        &self,
        loader: &ModuleLoader,
        record: &ModuleRef,
        identifier: &str,
        source: Option<Source>,
        _referrer: Option<&ModuleRef>,
        protocol: &Arc<dyn Protocol>,
    ) -> Result<()> {
        let bytes = match source {
            Some(source) => source.into_bytes(),
            None => protocol.read(identifier)?.into_bytes(),
        };
        let opener = loader
            .bundle_opener()
            .ok_or_else(|| Error::BundleUnsupported(identifier.to_string()))?;
        let mounted = opener.open(&bytes, identifier)?;
        let main = mounted.main().to_string();

        let bundle_protocol: Arc<dyn Protocol> = Arc::new(BundleProtocol::new(mounted));
        record.write().protocol = Some(Arc::clone(&bundle_protocol));

        let entry_source = bundle_protocol.read(&main)?;
        let opts = LoadOptions {
            referrer: None,
            protocol: Some(Arc::clone(&bundle_protocol)),
        };
        let entry = loader.load(&main, Some(entry_source), opts)?;

        let (format, exports, handle) = {
            let guard = entry.read();
            (guard.format, guard.exports.clone(), guard.handle)
        };
        let mut guard = record.write();
        guard.format = format;
        guard.exports = exports;
        guard.handle = handle;
        Ok(())
    }
}
