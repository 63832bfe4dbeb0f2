//! Error types shared by every stage

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::types::{EntityId, RelationId};

/// Errors raised while indexing, allocating, training or evaluating
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed record in a persisted artifact
    #[error("Parse error in {}:{line}: {message}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// Entity key or id not present in the index
    #[error("Entity not found: {0}")]
    MissingEntity(String),

    /// Relation name or id not present in the index
    #[error("Relation not found: {0}")]
    MissingRelation(String),

    /// NaN or infinity in a committed vector
    #[error("Non-finite {table} vector {id} at epoch {epoch}, batch {batch}")]
    NumericalFault {
        table: &'static str,
        id: usize,
        epoch: usize,
        batch: usize,
    },

    /// Negative sampling gave up
    #[error(
        "No negative found for ({head}, {relation}, {tail}) after {attempts} attempts; \
         the graph is too small or too dense"
    )]
    CorruptionExhausted {
        head: EntityId,
        relation: RelationId,
        tail: EntityId,
        attempts: usize,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Build a parse error for `path` at 1-based `line`
    pub fn parse(path: &Path, line: usize, message: impl Into<String>) -> Self {
        Error::Parse {
            path: path.to_path_buf(),
            line,
            message: message.into(),
        }
    }

    /// Row-level problems that are logged and skipped instead of aborting
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::MissingEntity(_) | Error::MissingRelation(_))
    }
}

/// Result type alias for path-embed
pub type Result<T> = std::result::Result<T, Error>;
