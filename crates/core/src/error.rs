//! Internal error taxonomy for the session orchestrator.
//!
//! These variants are never handed to the caller directly, per the
//! propagation policy, every layer translates the error it produces into a
//! [`QuitReason`](crate::quit::QuitReason) as soon as it has enough context.
//! [`SessionError`] is returned only from the handful of setup calls that can
//! fail before a `Session` exists to carry a quit reason (address resolution,
//! construction).
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Host name/address resolution failed during `ConnectInfo` construction.
    #[error("address resolution failed: {0}")]
    ParseAddr(String),

    /// Low-level I/O failure not covered by a more specific variant.
    #[error("network error: {0}")]
    Network(#[from] std::io::Error),

    /// TCP connect was rejected by the peer.
    #[error("connection refused")]
    ConnectionRefused,

    /// A message was present but malformed or missing a required field.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Session-request outcome: retry with a different target, or fail
    /// outright if the policy's retries are exhausted.
    #[error("protocol version mismatch")]
    VersionMismatch,

    /// A blocking operation was unblocked by `stop()` rather than completing
    /// normally. Not a real error, callers map this straight to
    /// `QuitReason::Stopped`.
    #[error("canceled")]
    Canceled,

    /// The remote end closed its side of a running stream.
    #[error("remote disconnected: {0}")]
    Disconnected(String),

    /// Catch-all for collaborator failures that don't fit the above.
    #[error("unknown error: {0}")]
    Unknown(String),
}

/// Convenience alias for `Result<T, SessionError>`.
pub type Result<T> = std::result::Result<T, SessionError>;
