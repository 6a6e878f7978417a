//! Error types for swap collection

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification used in logs and self-metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The OS facility could not be opened or queried
    Unavailable,
    /// A single record could not be parsed
    Malformed,
    /// Aggregated figures contradict each other
    Inconsistent,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::Malformed => "malformed",
            ErrorKind::Inconsistent => "inconsistent",
        }
    }
}

/// Failure of a single collection cycle. Never fatal to the process.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{call} failed: {source}")]
    Syscall {
        call: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("{source_name} is missing the {field} field")]
    MissingField {
        source_name: &'static str,
        field: &'static str,
    },

    #[error("swap figures out of range (total {total}, free {free}, cached {cached})")]
    OutOfRange { total: u64, free: u64, cached: u64 },

    #[error("total swap space ({total}) is less than used swap space ({used})")]
    InconsistentAggregate { total: i64, used: i64 },

    #[error("requested {requested} swap entries but the kernel returned {returned}")]
    CountMismatch { requested: usize, returned: usize },

    #[error("swap statistics query failed: {0}")]
    Query(String),

    #[error("collection worker failed: {0}")]
    Worker(String),
}

impl CollectError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CollectError::Read { .. }
            | CollectError::Syscall { .. }
            | CollectError::Query(_)
            | CollectError::Worker(_) => ErrorKind::Unavailable,
            CollectError::MissingField { .. } => ErrorKind::Malformed,
            CollectError::OutOfRange { .. }
            | CollectError::InconsistentAggregate { .. }
            | CollectError::CountMismatch { .. } => ErrorKind::Inconsistent,
        }
    }
}

/// Failure during plugin initialization. Fatal: no cycles run.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("could not determine the system page size")]
    PageSize,

    #[error("failed to open {what}: {reason}")]
    Handle { what: &'static str, reason: String },
}

/// Failure reported by a sink while dispatching one family
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to write family {family}: {source}")]
    Write {
        family: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode family {family}: {source}")]
    Encode {
        family: &'static str,
        #[source]
        source: serde_json::Error,
    },
}
