use thiserror::Error;

/// Convenience alias for `Result<T, SableError>`.
pub type SableResult<T> = Result<T, SableError>;

/// Error classification for retry/escalation decisions.
///
/// - `UserError`   — bad input (empty key, malformed arguments)
/// - `Retryable`   — transaction conflict; client SHOULD retry
/// - `InternalBug` — wiring bug or on-disk corruption; should never happen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UserError,
    Retryable,
    InternalBug,
}

/// Top-level error type shared by every sable crate.
///
/// Collaborator-originated errors pass through unmodified; nothing in the
/// sorted-set core suppresses or retries on its own.
#[derive(Error, Debug)]
pub enum SableError {
    /// Operation invoked with an empty set key. Returned before any
    /// transaction starts.
    #[error("key is empty")]
    KeyEmpty,

    /// A transaction or snapshot handle of an unexpected underlying kind
    /// was supplied. Signals a collaborator wiring bug; unreachable in a
    /// correct integration.
    #[error("backend handle of unexpected type")]
    BackendType,

    /// Malformed physical key or value encountered while decoding.
    /// Aborts the enclosing scan or transaction.
    #[error("decode failed: {reason}")]
    Decode { reason: String },

    /// Recorded cardinality does not cover the observed records — treated
    /// as corruption; the enclosing transaction aborts without committing.
    #[error("invalid metadata: deleting {deleting} entries but cardinality is {cardinality}")]
    InvalidMeta { deleting: u64, cardinality: u64 },

    /// Transaction conflict that survived the collaborator's retry budget.
    #[error("transaction conflict after {retries} retries")]
    Conflict { retries: u32 },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl SableError {
    pub fn decode(reason: impl Into<String>) -> Self {
        SableError::Decode {
            reason: reason.into(),
        }
    }

    /// Classify this error for retry/escalation decisions.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SableError::KeyEmpty => ErrorKind::UserError,
            SableError::Conflict { .. } => ErrorKind::Retryable,
            SableError::BackendType
            | SableError::Decode { .. }
            | SableError::InvalidMeta { .. }
            | SableError::Io(_)
            | SableError::Internal(_) => ErrorKind::InternalBug,
        }
    }

    /// Returns true if the client should retry this operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Retryable)
    }

    /// Returns true if this is a user/input error.
    pub fn is_user_error(&self) -> bool {
        matches!(self.kind(), ErrorKind::UserError)
    }
}
