// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for the module engine

use thiserror::Error;

/// Result type for module engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while resolving or loading modules
#[derive(Debug, Error)]
pub enum Error {
    /// No resolution candidate exists for a specifier
    #[error("Cannot resolve '{specifier}' from '{dirname}'")]
    Resolve {
        /// The original, unmapped specifier
        specifier: String,
        /// The directory resolution started from
        dirname: String,
    },

    /// Specifier names a scheme with no registered protocol
    #[error("No protocol registered for scheme '{0}'")]
    UnknownScheme(String),

    /// A `.node` module was requested but no addon loader is installed
    #[error("Native addons are not supported: '{0}'")]
    AddonUnsupported(String),

    /// A `.bundle` module was requested but no bundle opener is installed
    #[error("Bundles are not supported: '{0}'")]
    BundleUnsupported(String),

    /// Binary source is not valid UTF-8 where text is required
    #[error("Module source is not valid UTF-8: '{identifier}'")]
    Utf8 {
        /// The module that carried the invalid source
        identifier: String,
    },

    /// File system error
    #[error("File system error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Type error (wrong argument shape at a host boundary)
    #[error("TypeError: {0}")]
    Type(String),

    /// Failure propagated unmodified from the evaluator
    #[error("{0}")]
    Evaluator(String),
}

impl Error {
    /// Create a resolution error
    pub fn resolve(specifier: impl Into<String>, dirname: impl Into<String>) -> Self {
        Self::Resolve {
            specifier: specifier.into(),
            dirname: dirname.into(),
        }
    }

    /// Create a new TypeError
    pub fn type_error(msg: impl Into<String>) -> Self {
        Self::Type(msg.into())
    }

    /// Create an evaluator error
    pub fn evaluator(msg: impl Into<String>) -> Self {
        Self::Evaluator(msg.into())
    }
}
