//! Error taxonomy shared by every groupcache crate.
//!
//! The variants mirror the error kinds named in the wire protocol and the
//! orchestrator's retry whitelist: callers match on [`ErrorKind`] rather than
//! on the `Error` enum directly, since the same kind can arise from several
//! causes (a local breaker trip vs. a mapped HTTP status, for instance).

use std::fmt;

/// Coarse-grained error classification used by the retry engine (C4), the
/// circuit breaker (C7) and the wire protocol's status mapping (C11).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The owner peer has no such group registered.
    GroupNotFound,
    /// The owner's admission limiter rejected the request.
    ServerBusy,
    /// Unhandled failure on the server side.
    InternalServerError,
    /// Transport could not reach the peer at all.
    ConnectFailure,
    /// The local circuit breaker refused the call without attempting it.
    BreakerOpen,
    /// The outbound request to a peer exceeded its deadline.
    Timeout,
    /// The retry engine exhausted its attempt budget.
    ExhaustedRetry,
    /// The entry validator rejected the payload.
    ValidationFailed,
    /// The caller's cancellation token fired.
    Cancelled,
}

impl ErrorKind {
    /// The whitelist consulted by the orchestrator's replica retry loop
    /// (`spec.md` §4.9, §7): these kinds are retryable across replicas, all
    /// others short-circuit immediately.
    pub fn is_retryable_across_replicas(self) -> bool {
        matches!(
            self,
            ErrorKind::InternalServerError
                | ErrorKind::ServerBusy
                | ErrorKind::GroupNotFound
                | ErrorKind::ConnectFailure
                | ErrorKind::Timeout
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::GroupNotFound => "group-not-found",
            ErrorKind::ServerBusy => "server-busy",
            ErrorKind::InternalServerError => "internal-server-error",
            ErrorKind::ConnectFailure => "connect-failure",
            ErrorKind::BreakerOpen => "breaker-open",
            ErrorKind::Timeout => "timeout",
            ErrorKind::ExhaustedRetry => "exhausted-retry",
            ErrorKind::ValidationFailed => "validation-failed",
            ErrorKind::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// The error type returned by every fallible groupcache operation.
///
/// `Clone` is required so a single origin-loader failure can be fanned out
/// verbatim to every caller coalesced behind the same single-flight slot
/// (`spec.md` §4.3: "errors are propagated identically to all waiters").
/// That's also why [`std::io::Error`] (not `Clone`) is captured as a
/// formatted string rather than wrapped directly.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("group not found: {0}")]
    GroupNotFound(String),

    #[error("server busy")]
    ServerBusy,

    #[error("internal server error: {0}")]
    InternalServerError(String),

    #[error("failed to connect to peer: {0}")]
    ConnectFailure(String),

    #[error("circuit breaker open for peer {0}")]
    BreakerOpen(String),

    #[error("request to peer {0} timed out")]
    Timeout(String),

    #[error("retry exhausted after {attempts} attempt(s): {source}")]
    ExhaustedRetry {
        attempts: usize,
        #[source]
        source: Box<Error>,
    },

    #[error("validation failed for key {key:?}: {reason}")]
    ValidationFailed { key: String, reason: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("origin loader failed: {0}")]
    Origin(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("malformed request: missing field {0:?}")]
    MalformedRequest(&'static str),

    #[error("transport error: {0}")]
    Transport(String),
}

impl Error {
    /// Classifies this error into the coarse taxonomy used for retry
    /// whitelisting and wire-status mapping.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::GroupNotFound(_) => ErrorKind::GroupNotFound,
            Error::ServerBusy => ErrorKind::ServerBusy,
            Error::InternalServerError(_) => ErrorKind::InternalServerError,
            Error::ConnectFailure(_) => ErrorKind::ConnectFailure,
            Error::BreakerOpen(_) => ErrorKind::BreakerOpen,
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::ExhaustedRetry { .. } => ErrorKind::ExhaustedRetry,
            Error::ValidationFailed { .. } => ErrorKind::ValidationFailed,
            Error::Cancelled => ErrorKind::Cancelled,
            // Origin, Io, MalformedRequest and Transport do not appear in the
            // replica retry whitelist; they are surfaced as internal errors
            // wherever a caller needs a kind.
            Error::Origin(_) | Error::Io(_) | Error::MalformedRequest(_) | Error::Transport(_) => {
                ErrorKind::InternalServerError
            }
        }
    }

    pub fn is_retryable_across_replicas(&self) -> bool {
        self.kind().is_retryable_across_replicas()
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
