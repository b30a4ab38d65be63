// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Bundle mounting
//!
//! The container format itself lives in the embedding application;
//! the loader only needs to open raw bytes into a mount, then serve
//! the mount's contents through an ephemeral [`Protocol`] so the
//! bundle's entry module and its dependencies load like any others.

use crate::error::Result;
use crate::protocol::{Protocol, Source};

/// Opens raw bundle bytes into a mount rooted at an identifier.
/// Installed on the loader by the embedder.
pub trait BundleOpener: Send + Sync {
    /// Open `bytes` as a bundle mounted at `mount`
    fn open(&self, bytes: &[u8], mount: &str) -> Result<Box<dyn MountedBundle>>;
}

/// A bundle mounted at an identifier prefix
pub trait MountedBundle: Send + Sync {
    /// The bundle's declared entry specifier
    fn main(&self) -> &str;

    /// Rewrite a bundle-local import alias, if the bundle declares one
    fn map_import(&self, alias: &str) -> Option<String>;

    /// Whether `identifier` names a file inside the bundle
    fn exists(&self, identifier: &str) -> bool;

    /// Read a file from inside the bundle
    fn read(&self, identifier: &str) -> Result<Source>;
}

/// Ephemeral protocol serving one mounted bundle. Created by the
/// bundle format handler and inherited by everything the bundle's
/// entry module loads.
pub struct BundleProtocol {
    bundle: Box<dyn MountedBundle>,
}

impl BundleProtocol {
    /// Wrap a mount in a protocol
    pub fn new(bundle: Box<dyn MountedBundle>) -> Self {
        Self { bundle }
    }

    /// The mount's entry specifier
    pub fn main(&self) -> &str {
        self.bundle.main()
    }
}

impl Protocol for BundleProtocol {
    fn map(&self, specifier: &str, _dirname: &str) -> String {
        match self.bundle.map_import(specifier) {
            Some(mapped) => mapped,
            None => specifier.to_string(),
        }
    }

    fn exists(&self, identifier: &str) -> bool {
        self.bundle.exists(identifier)
    }

    fn read(&self, identifier: &str) -> Result<Source> {
        self.bundle.read(identifier)
    }
}
