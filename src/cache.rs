// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module records and the module cache

use crate::evaluator::ModuleHandle;
use crate::paths;
use crate::protocol::Protocol;
use crate::value::Value;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;

/// Execution format of a loaded module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleFormat {
    /// CommonJS: imperative body, mutable exports, synchronous
    CommonJs,
    /// ES module: static bindings, instantiate/evaluate lifecycle
    Esm,
    /// Parsed JSON data, no execution
    Json,
    /// Native addon
    Addon,
}

/// A shared, lockable module record
pub type ModuleRef = Arc<RwLock<ModuleRecord>>;

/// One record per canonical identifier, created on first load and
/// mutated only while that load is in flight.
#[derive(Debug)]
pub struct ModuleRecord {
    /// Canonical identifier; the cache key
    pub identifier: String,
    /// Containing directory, the resolution base for relative deps
    pub dirname: String,
    /// Execution format; `None` until a handler has run
    pub format: Option<ModuleFormat>,
    /// Nearest ancestor package descriptor's parsed exports
    pub info: Option<Value>,
    /// The module's exports; shape depends on `format`
    pub exports: Option<Value>,
    /// Engine handle for ES and synthetic modules
    pub handle: Option<ModuleHandle>,
    /// The protocol that produced this record
    pub protocol: Option<Arc<dyn Protocol>>,
}

impl ModuleRecord {
    /// Create an empty record for `identifier`
    pub fn new(identifier: impl Into<String>) -> Self {
        let identifier = identifier.into();
        let dirname = paths::dirname(&identifier);
        Self {
            identifier,
            dirname,
            format: None,
            info: None,
            exports: None,
            handle: None,
            protocol: None,
        }
    }

    /// Wrap a fresh record for shared use
    pub fn shared(identifier: impl Into<String>) -> ModuleRef {
        Arc::new(RwLock::new(Self::new(identifier)))
    }

    /// The `type` field of the nearest package descriptor, if any
    pub fn package_type(&self) -> Option<String> {
        let info = self.info.as_ref()?.as_object()?.get("type")?;
        info.as_str().map(|s| s.to_string())
    }
}

/// Cache mapping canonical identifiers to module records.
///
/// At most one record exists per identifier for the lifetime of the
/// owning loader; re-requesting an identifier never re-executes its
/// content.
#[derive(Default)]
pub struct ModuleCache {
    records: DashMap<String, ModuleRef>,
}

impl ModuleCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a cached record by identifier
    pub fn get(&self, identifier: &str) -> Option<ModuleRef> {
        self.records.get(identifier).map(|entry| Arc::clone(&entry))
    }

    /// Whether a record exists for `identifier`
    pub fn contains(&self, identifier: &str) -> bool {
        self.records.contains_key(identifier)
    }

    /// Insert a record
    pub fn insert(&self, identifier: impl Into<String>, record: ModuleRef) {
        self.records.insert(identifier.into(), record);
    }

    /// Remove a record, returning it if present
    pub fn remove(&self, identifier: &str) -> Option<ModuleRef> {
        self.records.remove(identifier).map(|(_, record)| record)
    }

    /// Drop every record
    pub fn clear(&self) {
        self.records.clear();
    }

    /// All cached identifiers
    pub fn keys(&self) -> Vec<String> {
        self.records.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Number of cached records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the cache holds no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
