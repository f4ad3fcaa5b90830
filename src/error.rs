use std::fmt;

use arrow::error::ArrowError;
use parquet::errors::ParquetError;

/// Stage of an invocation a fatal error surfaced in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Config,
    Connectivity,
    Read,
    Query,
    Write,
    Publish,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Config => "config",
            Phase::Connectivity => "connectivity",
            Phase::Read => "read",
            Phase::Query => "query",
            Phase::Write => "write",
            Phase::Publish => "publish",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration value `{0}` is not set")]
    MissingConfig(String),
    #[error("invalid configuration value `{name}`: {reason}")]
    InvalidConfig { name: String, reason: String },
    #[error("table `{table}` is not queryable: {reason}")]
    TableUnavailable { table: String, reason: String },
    #[error("invalid event payload: {0}")]
    InvalidEvent(String),
    #[error("column `{column}` is missing from {object}")]
    MissingColumn { column: String, object: String },
    #[error("malformed record in {object}: {reason}")]
    MalformedRecord { object: String, reason: String },
    #[error("invalid partition: {0}")]
    InvalidPartition(String),
    #[error("invalid object uri `{0}`")]
    InvalidUri(String),
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("stream `{0}` does not exist")]
    UnknownStream(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("arrow error: {0}")]
    Arrow(#[from] ArrowError),
    #[error("parquet error: {0}")]
    Parquet(#[from] ParquetError),
    #[error("{phase} failed: {source}")]
    Phase {
        phase: Phase,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Short name of the originating failure, used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::MissingConfig(_) => "MissingConfig",
            Error::InvalidConfig { .. } => "InvalidConfig",
            Error::TableUnavailable { .. } => "TableUnavailable",
            Error::InvalidEvent(_) => "InvalidEvent",
            Error::MissingColumn { .. } => "MissingColumn",
            Error::MalformedRecord { .. } => "MalformedRecord",
            Error::InvalidPartition(_) => "InvalidPartition",
            Error::InvalidUri(_) => "InvalidUri",
            Error::NotFound(_) => "NotFound",
            Error::UnknownStream(_) => "UnknownStream",
            Error::Io(_) => "Io",
            Error::Csv(_) => "Csv",
            Error::Json(_) => "Json",
            Error::Arrow(_) => "Arrow",
            Error::Parquet(_) => "Parquet",
            Error::Phase { source, .. } => source.kind(),
        }
    }

    /// Phase the error was tagged with by a handler, if any.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Error::Phase { phase, .. } => Some(*phase),
            _ => None,
        }
    }

    pub fn in_phase(self, phase: Phase) -> Self {
        match self {
            Error::Phase { .. } => self,
            other => Error::Phase {
                phase,
                source: Box::new(other),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
