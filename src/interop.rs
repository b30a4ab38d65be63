// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! CommonJS / ES module interop
//!
//! A loaded record is reconciled with its referrer once per request:
//! an ES module importing anything else gets a synthetic module whose
//! named bindings mirror the exports object, and a CommonJS module
//! requiring an ES module gets the module's namespace as a plain
//! exports value. The synthetic bindings themselves are filled in by
//! the engine at evaluation time through [`ImportHooks::evaluate`].

use crate::cache::{ModuleFormat, ModuleRef};
use crate::error::{Error, Result};
use crate::evaluator::{ImportHooks, ModuleHandle};
use crate::loader::{LoadOptions, ModuleLoader, ResolveOptions};

impl ModuleLoader {
    /// Reconcile a record with its referrer. Runs after every load;
    /// a no-op without a referrer, and free of side effects beyond
    /// wrapper creation and namespace extraction.
    pub(crate) fn synthesize(&self, record: &ModuleRef, referrer: Option<&ModuleRef>) -> Result<()> {
        let Some(referrer) = referrer else {
            return Ok(());
        };
        if std::sync::Arc::ptr_eq(record, referrer) {
            return Ok(());
        }
        let referrer_format = referrer.read().format;

        if referrer_format == Some(ModuleFormat::Esm) {
            let (identifier, format, handle, exports) = {
                let guard = record.read();
                (guard.identifier.clone(), guard.format, guard.handle, guard.exports.clone())
            };
            if format != Some(ModuleFormat::Esm) && handle.is_none() {
                let mut names = vec!["default".to_string()];
                if let Some(exports) = &exports {
                    for (name, _) in exports.own_entries() {
                        if name != "default" {
                            names.push(name);
                        }
                    }
                }
                let handle = self.evaluator().create_synthetic_module(&identifier, &names)?;
                record.write().handle = Some(handle);
            }
        }

        if referrer_format == Some(ModuleFormat::CommonJs) {
            let (format, handle, has_exports) = {
                let guard = record.read();
                (guard.format, guard.handle, guard.exports.is_some())
            };
            if format == Some(ModuleFormat::Esm) && !has_exports {
                if let Some(handle) = handle {
                    let namespace = self.evaluator().module_namespace(handle)?;
                    record.write().exports = Some(namespace);
                }
            }
        }

        Ok(())
    }
}

impl ImportHooks for ModuleLoader {
    fn static_import(&self, specifier: &str, referrer: &str) -> Result<ModuleHandle> {
        let referrer = self.cache().get(referrer);

        let (specifier, protocol) = match &referrer {
            Some(record) => {
                let (dirname, protocol) = {
                    let guard = record.read();
                    (guard.dirname.clone(), guard.protocol.clone())
                };
                let opts = ResolveOptions {
                    protocol: protocol.clone(),
                };
                (self.resolve(specifier, &dirname, opts)?, protocol)
            }
            None => (specifier.to_string(), None),
        };

        let record = self.load(&specifier, None, LoadOptions { referrer, protocol })?;
        let handle = record.read().handle;
        handle.ok_or_else(|| {
            Error::evaluator(format!("module '{specifier}' has no instantiable handle"))
        })
    }

    fn dynamic_import(&self, specifier: &str, referrer: &str) -> Result<ModuleHandle> {
        let handle = self.static_import(specifier, referrer)?;
        self.evaluator().instantiate_module(handle, self)?;
        Ok(handle)
    }

    /// Pull `default` and every own key of the wrapped exports into
    /// the synthetic module's bindings. The engine invokes this once
    /// per synthetic module, at evaluation time.
    fn evaluate(&self, identifier: &str) -> Result<()> {
        let record = self
            .cache()
            .get(identifier)
            .ok_or_else(|| Error::evaluator(format!("no module record for '{identifier}'")))?;

        let (handle, exports) = {
            let guard = record.read();
            (guard.handle, guard.exports.clone())
        };
        let handle = handle
            .ok_or_else(|| Error::evaluator(format!("module '{identifier}' was never wrapped")))?;
        let exports = exports.unwrap_or_default();

        self.evaluator().set_export(handle, "default", exports.clone())?;
        for (name, value) in exports.own_entries() {
            self.evaluator().set_export(handle, &name, value)?;
        }
        Ok(())
    }
}
