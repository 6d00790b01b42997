//! Error types for schema validation, configuration and document loading.

use std::path::PathBuf;

use thiserror::Error;

use crate::value::{PathSegment, Value};

/// Plugin contract violations detected while configuring a session.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("plugin name must not be empty")]
    EmptyPluginName,

    #[error("plugin '{plugin}' declares type '{name}', which is a built-in type")]
    ReservedTypeName { plugin: String, name: String },

    #[error("type '{name}' is provided by both '{first}' and '{second}'")]
    DuplicateType {
        name: String,
        first: String,
        second: String,
    },

    #[error("plugin '{plugin}' declares a type with an empty name")]
    EmptyTypeName { plugin: String },
}

impl ConfigError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        2
    }
}

/// A value could not be rewritten during prevalidation.
///
/// Aborts the whole validation call; the session converts it into a single
/// [`ValidationError`] anchored at `path`.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{}: {message}", display_path(.path))]
pub struct TransformError {
    pub path: String,
    pub message: String,
    /// Location of the failing schema node, filled in by the prevalidation
    /// pipeline. Empty means the root.
    pub segments: Vec<PathSegment>,
}

impl TransformError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            segments: Vec::new(),
        }
    }

    /// Anchor the error at the node identified by `segments`, unless an
    /// inner node already did.
    pub(crate) fn anchored(mut self, segments: &[PathSegment]) -> Self {
        if self.segments.is_empty() {
            self.segments = segments.to_vec();
        }
        self
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() {
        "(root)"
    } else {
        path
    }
}

/// Errors while loading schema documents.
#[derive(Debug, Error)]
pub enum LoadError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    // Parse errors (exit code 2)
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid schema document at {path}: {message}")]
    InvalidDocument { path: String, message: String },

    #[error("remote loading is disabled: {url}")]
    RemoteDisabled { url: String },
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. } | LoadError::ReadError { .. } => 3,
            #[cfg(feature = "remote")]
            LoadError::NetworkError { .. } => 3,
            _ => 2,
        }
    }

    pub(crate) fn document(path: &str, message: impl Into<String>) -> Self {
        LoadError::InvalidDocument {
            path: if path.is_empty() {
                "/".to_string()
            } else {
                path.to_string()
            },
            message: message.into(),
        }
    }
}

/// Single validation failure anchored at a dotted path.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ValidationError {
    /// Dotted path to the offending node (empty for the root).
    pub path: String,
    /// Human-readable error message.
    pub message: String,
    /// Display name of the expected type.
    pub expected: String,
    /// Display name of the received type.
    pub received: String,
    /// The offending value, when there is one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl ValidationError {
    pub fn new(
        path: impl Into<String>,
        message: impl Into<String>,
        expected: impl Into<String>,
        received: impl Into<String>,
        value: Option<Value>,
    ) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            expected: expected.into(),
            received: received.into(),
            value,
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", display_path(&self.path), self.message)
    }
}
