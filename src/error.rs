//! Error types for the build pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a build. None of them are retried.
#[derive(Debug, Error)]
pub enum BuildError {
    /// A template or static fragment could not be read.
    #[error("Template error for '{path}': {source}")]
    Template {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Template '{path}' references unknown placeholder '%({key})s'")]
    UnknownPlaceholder { path: PathBuf, key: String },

    /// The project model could not supply programs, variables or locations.
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// An external tool exited with an unexpected status.
    #[error("{tool} of {subject} failed")]
    Tool {
        tool: String,
        subject: String,
        code: Option<i32>,
        output: String,
    },

    #[error("Failed to start '{program}': {source}")]
    ToolSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A pipeline step whose tool could not be started.
    #[error("{tool} of {subject} failed: cannot start '{program}': {source}")]
    ToolUnavailable {
        tool: String,
        subject: String,
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("File operation failed for '{path}': {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Nothing to link: no object files were produced")]
    NothingToLink,
}

impl BuildError {
    pub fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BuildError::Filesystem {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = BuildError> = std::result::Result<T, E>;
