use thiserror::Error;

/// Failures scoped to one unit of work (one session update, one
/// student scan). Nothing here is fatal to the process.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Malformed update rejected synchronously; never retried.
    #[error("invalid session update: {0}")]
    InvalidUpdate(String),

    /// Update referenced a session the store does not know.
    #[error("unknown session: {0}")]
    UnknownSession(String),

    /// A collaborator (document/session/submission store, notification
    /// sink) was unavailable. Surfaced to the triggering call.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors produced by collaborator stores and sinks.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
