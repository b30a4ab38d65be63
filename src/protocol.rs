// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Content protocols
//!
//! A protocol is the loader's only view of where module bytes come
//! from: the real filesystem, an in-memory tree, or a mounted bundle.
//! Protocols register against URI scheme prefixes (`file:` is the
//! default for plain paths) and are inherited by everything loaded
//! through a top-level call unless a callee supplies its own.

use crate::error::{Error, Result};
use crate::paths;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;

/// Module content as produced by a protocol read
#[derive(Debug, Clone)]
pub enum Source {
    /// Text content
    Text(String),
    /// Raw bytes
    Binary(Vec<u8>),
}

impl Source {
    /// Decode into text, failing for non-UTF-8 binary content.
    /// `identifier` names the module for the error message.
    pub fn into_text(self, identifier: &str) -> Result<String> {
        match self {
            Source::Text(text) => Ok(text),
            Source::Binary(bytes) => String::from_utf8(bytes).map_err(|_| Error::Utf8 {
                identifier: identifier.to_string(),
            }),
        }
    }

    /// The raw bytes of the content
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Source::Text(text) => text.into_bytes(),
            Source::Binary(bytes) => bytes,
        }
    }
}

/// Uniform interface over a content source.
///
/// `exists` must answer `false` rather than erroring for a well-formed
/// identifier that does not exist, and answers for files only: the
/// resolver distinguishes files from directories by probing candidate
/// file names, never by listing.
pub trait Protocol: Send + Sync {
    /// Rewrite an import alias to a resolvable specifier. The default
    /// is the identity mapping.
    fn map(&self, specifier: &str, _dirname: &str) -> String {
        specifier.to_string()
    }

    /// Whether `identifier` names existing content
    fn exists(&self, identifier: &str) -> bool;

    /// Read the content behind `identifier`
    fn read(&self, identifier: &str) -> Result<Source>;
}

impl std::fmt::Debug for dyn Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Protocol")
    }
}

/// Protocol backed by the process filesystem
#[derive(Debug, Default)]
pub struct FileProtocol;

impl FileProtocol {
    /// Create a filesystem protocol
    pub fn new() -> Self {
        Self
    }
}

impl Protocol for FileProtocol {
    fn exists(&self, identifier: &str) -> bool {
        Path::new(identifier).is_file()
    }

    fn read(&self, identifier: &str) -> Result<Source> {
        Ok(Source::Binary(std::fs::read(identifier)?))
    }
}

/// Protocol backed by an in-memory tree, for tests and for embedders
/// that preload their sources.
#[derive(Debug, Default)]
pub struct MemoryProtocol {
    files: RwLock<HashMap<String, Source>>,
}

impl MemoryProtocol {
    /// Create an empty in-memory protocol
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a text file at `path`
    pub fn insert(&self, path: &str, text: impl Into<String>) {
        self.files
            .write()
            .insert(paths::normalize(path), Source::Text(text.into()));
    }

    /// Add a binary file at `path`
    pub fn insert_binary(&self, path: &str, bytes: Vec<u8>) {
        self.files
            .write()
            .insert(paths::normalize(path), Source::Binary(bytes));
    }
}

impl Protocol for MemoryProtocol {
    fn exists(&self, identifier: &str) -> bool {
        self.files.read().contains_key(&paths::normalize(identifier))
    }

    fn read(&self, identifier: &str) -> Result<Source> {
        self.files
            .read()
            .get(&paths::normalize(identifier))
            .cloned()
            .ok_or_else(|| {
                Error::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    identifier.to_string(),
                ))
            })
    }
}
