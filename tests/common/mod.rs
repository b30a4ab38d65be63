// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Scripted fakes for exercising the loader without a real engine.

#![allow(dead_code)]

use keel::{
    BundleOpener, Error, Evaluator, FunctionRef, ImportHooks, ModuleHandle, MountedBundle,
    ObjectRef, Protocol, Result, Source, Value,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Opt-in log output for debugging test runs: `RUST_LOG=keel=debug`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// A mock engine interpreting a line-oriented stand-in for script
/// bodies.
///
/// CommonJS bodies:
/// - `export <name> = <json>`
/// - `module.exports = <json>`
/// - `require <specifier>`
/// - `require <specifier> as <name>`
/// - `require <specifier> get <key> as <name>`
///
/// ES module bodies:
/// - `import <specifier>`
/// - `export <name> = <json>`
#[derive(Default)]
pub struct MockEvaluator {
    state: Mutex<MockState>,
    compiled: Mutex<Vec<String>>,
    destroyed: Arc<AtomicBool>,
}

#[derive(Default)]
struct MockState {
    next_handle: u64,
    modules: HashMap<u64, MockModule>,
}

#[derive(Default, Clone)]
struct MockModule {
    identifier: String,
    synthetic: bool,
    export_names: Vec<String>,
    imports: Vec<String>,
    own_exports: Vec<(String, Value)>,
    deps: Vec<ModuleHandle>,
    instantiated: bool,
    evaluated: bool,
    bindings: HashMap<String, Value>,
}

impl MockEvaluator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Identifiers of every body compiled through `create_function`
    pub fn compiled(&self) -> Vec<String> {
        self.compiled.lock().clone()
    }

    pub fn destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Snapshot of a module's bindings by identifier
    pub fn bindings(&self, identifier: &str) -> Option<HashMap<String, Value>> {
        let state = self.state.lock();
        state
            .modules
            .values()
            .find(|module| module.identifier == identifier)
            .map(|module| module.bindings.clone())
    }

    /// Declared export names of a synthetic module by identifier
    pub fn synthetic_names(&self, identifier: &str) -> Option<Vec<String>> {
        let state = self.state.lock();
        state
            .modules
            .values()
            .find(|module| module.identifier == identifier && module.synthetic)
            .map(|module| module.export_names.clone())
    }

    fn alloc(&self, module: MockModule) -> ModuleHandle {
        let mut state = self.state.lock();
        state.next_handle += 1;
        let handle = state.next_handle;
        state.modules.insert(handle, module);
        ModuleHandle(handle)
    }

    fn with_module<T>(&self, handle: ModuleHandle, f: impl FnOnce(&mut MockModule) -> T) -> Result<T> {
        let mut state = self.state.lock();
        let module = state
            .modules
            .get_mut(&handle.0)
            .ok_or_else(|| Error::evaluator(format!("unknown module handle {}", handle.0)))?;
        Ok(f(module))
    }
}

fn parse_json_value(text: &str) -> Result<Value> {
    let parsed: serde_json::Value = serde_json::from_str(text.trim())
        .map_err(|err| Error::evaluator(format!("bad literal in mock body: {err}")))?;
    Ok(Value::from_json(&parsed))
}

fn member(value: &Value, key: &str) -> Value {
    value
        .own_entries()
        .into_iter()
        .find(|(name, _)| name == key)
        .map(|(_, v)| v)
        .unwrap_or_default()
}

/// Run one CommonJS mock statement against the host-provided
/// `require`, `module`, and `exports` arguments.
fn run_cjs_line(line: &str, require: &FunctionRef, module: &ObjectRef, exports: &ObjectRef) -> Result<()> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(());
    }
    if let Some(rest) = line.strip_prefix("module.exports =") {
        module.set("exports", parse_json_value(rest)?);
        return Ok(());
    }
    if let Some(rest) = line.strip_prefix("export ") {
        let (name, literal) = rest
            .split_once('=')
            .ok_or_else(|| Error::evaluator(format!("bad export statement: {line}")))?;
        exports.set(name.trim(), parse_json_value(literal)?);
        return Ok(());
    }
    if let Some(rest) = line.strip_prefix("require ") {
        let tokens: Vec<&str> = rest.split_whitespace().collect();
        let result = require.call(&[Value::String(tokens[0].to_string())])?;
        match tokens.as_slice() {
            [_] => {}
            [_, "as", name] => exports.set(*name, result),
            [_, "get", key, "as", name] => exports.set(*name, member(&result, key)),
            _ => return Err(Error::evaluator(format!("bad require statement: {line}"))),
        }
        return Ok(());
    }
    Err(Error::evaluator(format!("unknown mock statement: {line}")))
}

impl Evaluator for MockEvaluator {
    fn create_function(&self, identifier: &str, params: &[&str], source: &str) -> Result<FunctionRef> {
        assert_eq!(
            params,
            ["require", "module", "exports", "__filename", "__dirname"]
        );
        self.compiled.lock().push(identifier.to_string());

        let body = source.to_string();
        Ok(FunctionRef::new(move |args| {
            let require = args[0]
                .as_function()
                .ok_or_else(|| Error::evaluator("mock body expects a require function"))?;
            let module = args[1]
                .as_object()
                .ok_or_else(|| Error::evaluator("mock body expects a module object"))?;
            let exports = args[2]
                .as_object()
                .ok_or_else(|| Error::evaluator("mock body expects an exports object"))?;
            for line in body.lines() {
                run_cjs_line(line, require, module, exports)?;
            }
            Ok(Value::Undefined)
        }))
    }

    fn create_module(&self, identifier: &str, source: &str) -> Result<ModuleHandle> {
        let mut imports = Vec::new();
        let mut own_exports = Vec::new();
        for line in source.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(spec) = line.strip_prefix("import ") {
                imports.push(spec.trim().to_string());
            } else if let Some(rest) = line.strip_prefix("export ") {
                let (name, literal) = rest
                    .split_once('=')
                    .ok_or_else(|| Error::evaluator(format!("bad export statement: {line}")))?;
                own_exports.push((name.trim().to_string(), parse_json_value(literal)?));
            } else {
                return Err(Error::evaluator(format!("unknown mock statement: {line}")));
            }
        }
        Ok(self.alloc(MockModule {
            identifier: identifier.to_string(),
            imports,
            own_exports,
            ..Default::default()
        }))
    }

    fn create_synthetic_module(&self, identifier: &str, export_names: &[String]) -> Result<ModuleHandle> {
        Ok(self.alloc(MockModule {
            identifier: identifier.to_string(),
            synthetic: true,
            export_names: export_names.to_vec(),
            instantiated: true,
            ..Default::default()
        }))
    }

    fn instantiate_module(&self, handle: ModuleHandle, hooks: &dyn ImportHooks) -> Result<()> {
        let (identifier, imports, done) = self.with_module(handle, |module| {
            (module.identifier.clone(), module.imports.clone(), module.instantiated)
        })?;
        if done {
            return Ok(());
        }
        self.with_module(handle, |module| module.instantiated = true)?;

        for specifier in imports {
            let dep = hooks.static_import(&specifier, &identifier)?;
            self.with_module(handle, |module| module.deps.push(dep))?;
            let (dep_synthetic, dep_instantiated) =
                self.with_module(dep, |module| (module.synthetic, module.instantiated))?;
            if !dep_synthetic && !dep_instantiated {
                self.instantiate_module(dep, hooks)?;
            }
        }
        Ok(())
    }

    fn run_module(&self, handle: ModuleHandle, hooks: &dyn ImportHooks) -> Result<()> {
        let done = self.with_module(handle, |module| {
            let done = module.evaluated;
            module.evaluated = true;
            done
        })?;
        if done {
            return Ok(());
        }

        let deps = self.with_module(handle, |module| module.deps.clone())?;
        for dep in deps {
            let (dep_identifier, dep_synthetic, dep_evaluated) = self.with_module(dep, |module| {
                (module.identifier.clone(), module.synthetic, module.evaluated)
            })?;
            if dep_evaluated {
                continue;
            }
            if dep_synthetic {
                self.with_module(dep, |module| module.evaluated = true)?;
                hooks.evaluate(&dep_identifier)?;
            } else {
                self.run_module(dep, hooks)?;
            }
        }

        let own_exports = self.with_module(handle, |module| module.own_exports.clone())?;
        self.with_module(handle, |module| {
            for (name, value) in own_exports {
                module.bindings.insert(name, value);
            }
        })?;
        Ok(())
    }

    fn set_export(&self, handle: ModuleHandle, name: &str, value: Value) -> Result<()> {
        self.with_module(handle, |module| {
            module.bindings.insert(name.to_string(), value);
        })
    }

    fn module_namespace(&self, handle: ModuleHandle) -> Result<Value> {
        let bindings = self.with_module(handle, |module| module.bindings.clone())?;
        Ok(Value::Object(bindings.into_iter().collect()))
    }

    fn destroy(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
    }
}

/// Protocol wrapper that records every existence probe and read, for
/// asserting candidate order and builtin bypass.
pub struct RecordingProtocol {
    inner: Arc<dyn Protocol>,
    probes: Mutex<Vec<String>>,
    reads: Mutex<Vec<String>>,
}

impl RecordingProtocol {
    pub fn new(inner: Arc<dyn Protocol>) -> Self {
        Self {
            inner,
            probes: Mutex::new(Vec::new()),
            reads: Mutex::new(Vec::new()),
        }
    }

    pub fn probes(&self) -> Vec<String> {
        self.probes.lock().clone()
    }

    pub fn reads(&self) -> Vec<String> {
        self.reads.lock().clone()
    }
}

impl Protocol for RecordingProtocol {
    fn map(&self, specifier: &str, dirname: &str) -> String {
        self.inner.map(specifier, dirname)
    }

    fn exists(&self, identifier: &str) -> bool {
        self.probes.lock().push(identifier.to_string());
        self.inner.exists(identifier)
    }

    fn read(&self, identifier: &str) -> Result<Source> {
        self.reads.lock().push(identifier.to_string());
        self.inner.read(identifier)
    }
}

/// Bundle opener serving a fixed in-memory file table, mounted at
/// whatever identifier the loader passes.
pub struct StaticBundleOpener {
    main: String,
    files: HashMap<String, String>,
    imports: HashMap<String, String>,
}

impl StaticBundleOpener {
    pub fn new(main: &str) -> Self {
        Self {
            main: main.to_string(),
            files: HashMap::new(),
            imports: HashMap::new(),
        }
    }

    /// Add a file at a mount-relative path
    pub fn file(mut self, path: &str, content: &str) -> Self {
        self.files.insert(path.to_string(), content.to_string());
        self
    }

    /// Declare a bundle-local import alias
    pub fn import(mut self, alias: &str, target: &str) -> Self {
        self.imports.insert(alias.to_string(), target.to_string());
        self
    }
}

impl BundleOpener for StaticBundleOpener {
    fn open(&self, _bytes: &[u8], mount: &str) -> Result<Box<dyn MountedBundle>> {
        Ok(Box::new(StaticMount {
            mount: mount.to_string(),
            main: format!("{}/{}", mount, self.main),
            files: self.files.clone(),
            imports: self.imports.clone(),
        }))
    }
}

struct StaticMount {
    mount: String,
    main: String,
    files: HashMap<String, String>,
    imports: HashMap<String, String>,
}

impl StaticMount {
    fn relative<'a>(&self, identifier: &'a str) -> Option<&'a str> {
        identifier
            .strip_prefix(self.mount.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
    }
}

impl MountedBundle for StaticMount {
    fn main(&self) -> &str {
        &self.main
    }

    fn map_import(&self, alias: &str) -> Option<String> {
        self.imports
            .get(alias)
            .map(|target| format!("{}/{}", self.mount, target))
    }

    fn exists(&self, identifier: &str) -> bool {
        self.relative(identifier)
            .is_some_and(|rest| self.files.contains_key(rest))
    }

    fn read(&self, identifier: &str) -> Result<Source> {
        self.relative(identifier)
            .and_then(|rest| self.files.get(rest))
            .map(|content| Source::Text(content.clone()))
            .ok_or_else(|| Error::evaluator(format!("not in bundle: {identifier}")))
    }
}
