//! Error types for the rollup engine

use std::fmt;
use thiserror::Error;

/// Key and location parsing failures raised while planning
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("malformed store location '{0}': expected [scheme://]container[/prefix]")]
    MalformedLocation(String),

    #[error("object key '{key}' does not start with prefix '{prefix}'")]
    PrefixMismatch { prefix: String, key: String },

    #[error("no YYYY-MM-DD-HH-m timestamp found in '{0}'")]
    UnrecognizedTimestamp(String),

    #[error("destination '{dest_prefix}' lies within source '{source_prefix}'; rollups would be read back as sources")]
    OverlappingLocations {
        source_prefix: String,
        dest_prefix: String,
    },
}

/// Object store operation, used to label store errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    List,
    Get,
    Put,
    Delete,
}

impl StoreOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreOp::List => "list",
            StoreOp::Get => "get",
            StoreOp::Put => "put",
            StoreOp::Delete => "delete",
        }
    }
}

impl fmt::Display for StoreOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error classification for programmatic handling.
///
/// `NotFound` is the only kind the engine treats as benign (destination reads
/// and deletes). `Transient` errors are eligible for retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    NotFound,
    Transient,
    Other,
}

/// A failed object store call
#[derive(Debug, Clone, Error)]
#[error("{op} '{location}' failed: {message}")]
pub struct StoreError {
    kind: StoreErrorKind,
    op: StoreOp,
    location: String,
    message: String,
}

impl StoreError {
    pub fn new(
        kind: StoreErrorKind,
        op: StoreOp,
        location: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            op,
            location: location.into(),
            message: message.into(),
        }
    }

    /// Classify an OpenDAL error by its kind, never by its message.
    pub fn from_opendal(op: StoreOp, location: impl Into<String>, err: opendal::Error) -> Self {
        let kind = if err.kind() == opendal::ErrorKind::NotFound {
            StoreErrorKind::NotFound
        } else if err.is_temporary() {
            StoreErrorKind::Transient
        } else {
            StoreErrorKind::Other
        };
        Self::new(kind, op, location, err.to_string())
    }

    pub fn kind(&self) -> StoreErrorKind {
        self.kind
    }

    pub fn op(&self) -> StoreOp {
        self.op
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == StoreErrorKind::NotFound
    }

    pub fn is_transient(&self) -> bool {
        self.kind == StoreErrorKind::Transient
    }
}

/// A destination group that could not be rolled up
#[derive(Debug, Clone)]
pub struct GroupFailure {
    pub destination: String,
    pub error: RollupError,
}

/// Errors that abort planning or fail a rollup run
#[derive(Debug, Clone, Error)]
pub enum RollupError {
    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{} of {total} rollup groups failed (first: {})", .failures.len(), first_failure(.failures))]
    GroupsFailed {
        total: usize,
        failures: Vec<GroupFailure>,
    },
}

fn first_failure(failures: &[GroupFailure]) -> String {
    failures
        .first()
        .map(|f| format!("{}: {}", f.destination, f.error))
        .unwrap_or_default()
}

/// Result type alias for RollupError
pub type Result<T> = std::result::Result<T, RollupError>;
