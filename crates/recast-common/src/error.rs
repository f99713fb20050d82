//! Unified error types for the recast workspace.
//!
//! Library crates return [`Result`]; the CLI wraps these in `anyhow` with
//! the project name and path attached.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum RecastError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// A required resource was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing resource.
        kind: &'static str,
        /// Identifier of the missing resource.
        id: String,
    },

    /// A template failed to parse or execute.
    #[error("template {template}: {message}")]
    Template {
        /// Name or path of the failing template.
        template: String,
        /// Description of the failure, including the engine's cause chain.
        message: String,
    },

    /// An external version or digest lookup failed.
    #[error("unable to resolve {material}: {message}")]
    Resolver {
        /// The material (or lookup subject) being resolved.
        material: String,
        /// Description of the failure.
        message: String,
    },

    /// The dependency graph could not be linearized.
    #[error(
        "could not find any satisfied dependencies - is there a loop? \
         pending: {pending:?}, placed: {placed:?}{detail}"
    )]
    Ordering {
        /// Projects that could not be placed.
        pending: Vec<String>,
        /// Projects placed before the orderer got stuck.
        placed: Vec<String>,
        /// Extra diagnosis (detected cycles, unknown references).
        detail: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl RecastError {
    /// Builds a resolver error for the given material.
    pub fn resolver(material: impl Into<String>, message: impl ToString) -> Self {
        Self::Resolver {
            material: material.into(),
            message: message.to_string(),
        }
    }

    /// Returns true if this error came from an external lookup.
    #[must_use]
    pub const fn is_resolver(&self) -> bool {
        matches!(self, Self::Resolver { .. })
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, RecastError>;
