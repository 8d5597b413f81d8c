//! Poll results and wait outcomes.

use std::time::Duration;

use thiserror::Error;

/// One observation of remote state: the state label plus the payload it came with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observed<T> {
    pub state: String,
    pub raw: T,
}

impl<T> Observed<T> {
    pub fn new(state: impl Into<String>, raw: T) -> Self {
        Self {
            state: state.into(),
            raw,
        }
    }
}

/// Result of a single poll. `Err` means the state could not be read at all.
pub type PollResult<T, E> = Result<Observed<T>, E>;

/// Terminal result of [`wait`](crate::wait).
#[derive(Debug)]
pub enum WaitOutcome<T, E> {
    /// The target state was observed.
    Success(T),

    /// The resource left the pending set without reaching the target.
    Failure { state: String, raw: T },

    /// The deadline passed while the resource was still pending.
    Timeout {
        elapsed: Duration,
        last_state: Option<String>,
    },

    /// The poll function itself failed. Never retried.
    PollError(E),

    /// The caller cancelled the wait.
    Cancelled,
}

impl<T, E> WaitOutcome<T, E> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Convert into a `Result`, dropping the payload of a failure.
    pub fn into_result(self) -> Result<T, WaitError<E>> {
        match self {
            Self::Success(raw) => Ok(raw),
            Self::Failure { state, .. } => Err(WaitError::Failure { state }),
            Self::Timeout {
                elapsed,
                last_state,
            } => Err(WaitError::Timeout {
                elapsed,
                last_state,
            }),
            Self::PollError(e) => Err(WaitError::Poll(e)),
            Self::Cancelled => Err(WaitError::Cancelled),
        }
    }
}

/// Non-success outcomes as an error type.
#[derive(Debug, Error)]
pub enum WaitError<E> {
    #[error("resource reached unexpected state '{state}'")]
    Failure { state: String },

    #[error(
        "timed out after {elapsed:?} (last observed state: {})",
        .last_state.as_deref().unwrap_or("none")
    )]
    Timeout {
        elapsed: Duration,
        last_state: Option<String>,
    },

    #[error("failed to read state: {0}")]
    Poll(#[source] E),

    #[error("wait cancelled")]
    Cancelled,
}
