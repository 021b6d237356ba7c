//! Transport-level error type carrying the native completion and reason codes.

use thiserror::Error;

use super::reason::{CompletionCode, ReasonCode};

/// Failure reported by a queue-manager transport call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{verb}: completion code {comp_code:?}, reason {reason}")]
pub struct TransportError {
    /// Transport verb that failed (`MQPUT1`, `MQGET`, ...).
    pub verb: &'static str,
    /// Completion code.
    pub comp_code: CompletionCode,
    /// Native reason code.
    pub reason: ReasonCode,
    /// Length of the message when the reason is `TRUNCATED_MSG_FAILED`.
    pub data_length: Option<usize>,
}

impl TransportError {
    /// A failed call with the given reason.
    #[must_use]
    pub fn failed(verb: &'static str, reason: ReasonCode) -> Self {
        Self {
            verb,
            comp_code: CompletionCode::Failed,
            reason,
            data_length: None,
        }
    }

    /// A get that could not fit the message into the supplied buffer.
    #[must_use]
    pub fn truncated(verb: &'static str, data_length: usize) -> Self {
        Self {
            verb,
            comp_code: CompletionCode::Warning,
            reason: ReasonCode::TRUNCATED_MSG_FAILED,
            data_length: Some(data_length),
        }
    }

    /// Whether this error just means the queue had nothing to return.
    #[must_use]
    pub fn is_no_message(&self) -> bool {
        self.reason == ReasonCode::NO_MSG_AVAILABLE
    }
}
