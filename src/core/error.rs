use thiserror::Error;

use super::segment::{ContentId, Dbid};

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Reconciliation rejected: {0}")]
    Validation(#[from] ValidationError),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Invalid segment: {0}")]
    InvalidSegment(String),

    #[error("Invalid topology: {0}")]
    InvalidTopology(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("I/O error: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, ReconcileError>;

impl From<std::io::Error> for ReconcileError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Identity of a validator rule, for callers that branch on which check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationRule {
    PrimaryChangeAuthorization,
    UniquePreferredRole,
    MirrorCoverage,
    CoreChangeTarget,
}

/// A violated cluster invariant. Raised by the validator before any mutation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("operation may not add/remove primary segment {dbid}")]
    PrimaryChangeNotAuthorized { dbid: Dbid },

    #[error(
        "segments sharing a content id may not have same preferred role \
         (content {content_id}, dbids {existing} and {conflicting})"
    )]
    DuplicatePreferredRole {
        content_id: ContentId,
        existing: Dbid,
        conflicting: Dbid,
    },

    #[error("primary must have mirror when mirroring enabled (content {content_id})")]
    PrimaryWithoutMirror { content_id: ContentId },

    #[error("can only change core details of segments, not coordinator/standby (dbid {dbid})")]
    CoreChangeOfDispatcher { dbid: Dbid },

    #[error("can only change core details of mirrors, not primaries (dbid {dbid})")]
    CoreChangeOfPrimary { dbid: Dbid },

    #[error("cannot change core details of mirrors in utility mode (dbid {dbid})")]
    CoreChangeInUtilityMode { dbid: Dbid },
}

impl ValidationError {
    pub fn rule(&self) -> ValidationRule {
        match self {
            Self::PrimaryChangeNotAuthorized { .. } => ValidationRule::PrimaryChangeAuthorization,
            Self::DuplicatePreferredRole { .. } => ValidationRule::UniquePreferredRole,
            Self::PrimaryWithoutMirror { .. } => ValidationRule::MirrorCoverage,
            Self::CoreChangeOfDispatcher { .. }
            | Self::CoreChangeOfPrimary { .. }
            | Self::CoreChangeInUtilityMode { .. } => ValidationRule::CoreChangeTarget,
        }
    }
}

/// Failure of a single remote command. Collected per command, never raised by the fan-out.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteExecutionError {
    #[error("transport failure on host '{host}': {message}")]
    Transport { host: String, message: String },

    #[error("command was halted before it started")]
    Halted,

    #[error("worker panicked: {0}")]
    WorkerPanicked(String),
}
