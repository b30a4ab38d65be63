// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Specifier resolution
//!
//! Candidates are enumerated in a fixed priority order and probed with
//! `Protocol::exists`, short-circuiting on the first hit: file
//! candidates before directory candidates, extensions in a fixed
//! order, dependency directories nearest-ancestor first. Resolution is
//! therefore deterministic for a given content snapshot regardless of
//! directory-listing order.

use crate::loader::{LoadOptions, ModuleLoader, PACKAGE_DESCRIPTOR};
use crate::paths;
use crate::protocol::Protocol;
use std::sync::Arc;

/// Extension probe order for file resolution. The order is part of
/// the resolution contract: it decides which sibling wins when
/// several extensions exist for the same basename.
pub const FILE_EXTENSIONS: [&str; 6] = [".js", ".cjs", ".mjs", ".json", ".node", ".bundle"];

/// Conventional dependency directory probed during bare-specifier
/// resolution
pub const DEP_DIR: &str = "node_modules";

impl ModuleLoader {
    /// Resolve an already-mapped specifier. `None` means no candidate
    /// exists.
    pub(crate) fn resolve_any(
        &self,
        specifier: &str,
        dirname: &str,
        protocol: &Arc<dyn Protocol>,
    ) -> Option<String> {
        if self.is_builtin(specifier) {
            return Some(specifier.to_string());
        }

        if specifier.starts_with('/') || specifier.starts_with('.') {
            let filename = if specifier.starts_with('.') {
                paths::join(&[dirname, specifier])
            } else {
                paths::normalize(specifier)
            };
            return self
                .resolve_file(&filename, protocol)
                .or_else(|| self.resolve_directory(&filename, protocol));
        }

        self.resolve_dep_dirs(specifier, dirname, protocol)
    }

    /// Probe a literal path, then the path with each extension
    /// appended.
    fn resolve_file(&self, filename: &str, protocol: &Arc<dyn Protocol>) -> Option<String> {
        if protocol.exists(filename) {
            return Some(filename.to_string());
        }
        for extension in FILE_EXTENSIONS {
            let candidate = format!("{filename}{extension}");
            if protocol.exists(&candidate) {
                return Some(candidate);
            }
        }
        None
    }

    fn resolve_index(&self, dirname: &str, protocol: &Arc<dyn Protocol>) -> Option<String> {
        self.resolve_file(&paths::join(&[dirname, "index"]), protocol)
    }

    /// Treat a path as a directory: honor the package descriptor's
    /// entry-point field when declared, otherwise fall back to an
    /// index file. A declared entry point that resolves to nothing
    /// does not fall back to the index.
    fn resolve_directory(&self, dirname: &str, protocol: &Arc<dyn Protocol>) -> Option<String> {
        let descriptor = paths::join(&[dirname, PACKAGE_DESCRIPTOR]);
        if protocol.exists(&descriptor) {
            let opts = LoadOptions {
                referrer: None,
                protocol: Some(Arc::clone(protocol)),
            };
            let info = self
                .load(&descriptor, None, opts)
                .ok()
                .and_then(|record| record.read().exports.clone());
            let main = info
                .as_ref()
                .and_then(|value| value.as_object())
                .and_then(|object| object.get("main"))
                .and_then(|value| value.as_str().map(str::to_string));
            if let Some(main) = main.filter(|main| !main.is_empty()) {
                let entry = paths::join(&[dirname, &main]);
                return self
                    .resolve_file(&entry, protocol)
                    .or_else(|| self.resolve_index(&entry, protocol));
            }
        }
        self.resolve_index(dirname, protocol)
    }

    /// Walk every ancestor's dependency directory, nearest first,
    /// applying file then directory resolution at each level.
    fn resolve_dep_dirs(
        &self,
        specifier: &str,
        dirname: &str,
        protocol: &Arc<dyn Protocol>,
    ) -> Option<String> {
        for root in dep_dir_candidates(dirname) {
            let filename = paths::join(&[&root, specifier]);
            let hit = self
                .resolve_file(&filename, protocol)
                .or_else(|| self.resolve_directory(&filename, protocol));
            if hit.is_some() {
                return hit;
            }
        }
        None
    }
}

/// Ordered dependency-directory roots for an ancestor walk starting
/// at `dirname`. Directories themselves named as the dependency
/// directory are skipped as search roots.
fn dep_dir_candidates(dirname: &str) -> Vec<String> {
    let mut roots = Vec::new();
    let mut dir = paths::normalize(dirname);
    loop {
        if paths::basename(&dir) != DEP_DIR {
            roots.push(paths::join(&[&dir, DEP_DIR]));
        }
        if dir == "/" || dir == "." {
            break;
        }
        dir = paths::dirname(&dir);
    }
    roots
}
