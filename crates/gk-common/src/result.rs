//! Three-valued acquisition result.

use crate::error::LockError;
use crate::info::LockInfo;

/// Outcome of a lock request.
///
/// Both success variants permit the caller to proceed; the second obliges it
/// to first cancel the peer(s) named inside the error and release their
/// locks. `Failure` means the request was rejected and nothing changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireResult {
    /// No conflict; proceed.
    Success,
    /// Proceed after cancelling the victims carried by the error.
    SuccessWithPrecedingCancellation(LockError),
    /// Rejected; do not proceed.
    Failure(LockError),
}

impl AcquireResult {
    /// Plain success with no preceding cancellation.
    pub fn is_success(&self) -> bool {
        matches!(self, AcquireResult::Success)
    }

    /// Either success variant: the caller may run its operation.
    pub fn should_proceed(&self) -> bool {
        !matches!(self, AcquireResult::Failure(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, AcquireResult::Failure(_))
    }

    /// The error carried by either non-plain variant.
    pub fn error(&self) -> Option<&LockError> {
        match self {
            AcquireResult::Success => None,
            AcquireResult::SuccessWithPrecedingCancellation(err)
            | AcquireResult::Failure(err) => Some(err),
        }
    }

    /// Victims the caller must cancel before proceeding. Empty unless the
    /// result is `SuccessWithPrecedingCancellation`.
    pub fn victims(&self) -> Vec<&LockInfo> {
        match self {
            AcquireResult::SuccessWithPrecedingCancellation(err) => err.victim_info(),
            _ => Vec::new(),
        }
    }

    /// Stable label for log records.
    pub fn outcome_label(&self) -> &'static str {
        match self {
            AcquireResult::Success => "success",
            AcquireResult::SuccessWithPrecedingCancellation(_) => "success_with_cancellation",
            AcquireResult::Failure(_) => "failure",
        }
    }
}
