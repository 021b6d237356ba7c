//! Messaging runtime error type.
//!
//! Every error carries a human-readable reason, an error code and, where one
//! exists, the linked cause it was derived from (a transport failure, a
//! selector syntax error, or another [`Error`]).

use std::fmt;

use thiserror::Error;

use crate::transport::{AsyncStatus, ReasonCode, SelectorError, TransportError};

/// Boxed linked cause.
pub type LinkedError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error code used for synthesized asynchronous put failures.
pub const ASYNC_PUT_FAILURE_CODE: &str = "AsyncPutFailure";

/// Error code used for selector syntax errors.
pub const INVALID_SELECTOR_CODE: &str = "MQJMS0004";

/// Error code used when a receive loop gives up.
pub const NO_MESSAGE_RECEIVED_CODE: &str = "NoMessageReceived";

/// Error code used when a receive loop is cancelled.
pub const CANCELLED_CODE: &str = "ReceiveCancelled";

/// Category of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Connecting, or opening a destination, failed.
    Connection,
    /// Message selector is malformed.
    InvalidSelector,
    /// Putting a message failed.
    Send,
    /// Asynchronous puts were reported as failed by a status query.
    AsyncPutFailure,
    /// Getting a message failed.
    Receive,
    /// Commit or rollback failed.
    Transaction,
    /// Allocating a message property handle failed.
    MessageHandle,
    /// A bounded receive loop found no message.
    NoMessageReceived,
    /// A receive loop was cancelled or ran past its deadline.
    Cancelled,
    /// Connection parameters are invalid.
    Config,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connection => "connection error",
            Self::InvalidSelector => "invalid selector",
            Self::Send => "send error",
            Self::AsyncPutFailure => "async put failure",
            Self::Receive => "receive error",
            Self::Transaction => "transaction error",
            Self::MessageHandle => "message handle error",
            Self::NoMessageReceived => "no message received",
            Self::Cancelled => "cancelled",
            Self::Config => "configuration error",
        };
        f.write_str(name)
    }
}

/// Messaging runtime error.
#[derive(Error, Debug)]
#[error("{kind}: {reason} [{error_code}]")]
pub struct Error {
    kind: ErrorKind,
    reason: String,
    error_code: String,
    #[source]
    linked: Option<LinkedError>,
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Build an error without a linked cause.
    pub fn new(kind: ErrorKind, reason: impl Into<String>, error_code: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
            error_code: error_code.into(),
            linked: None,
        }
    }

    /// Attach the cause this error was derived from.
    #[must_use]
    pub fn with_linked(mut self, linked: impl Into<LinkedError>) -> Self {
        self.linked = Some(linked.into());
        self
    }

    /// Translate a transport failure: the reason is the symbolic reason-code
    /// name, the error code its number, and the transport error is linked.
    #[must_use]
    pub fn from_transport(kind: ErrorKind, err: TransportError) -> Self {
        Self::new(kind, err.reason.name(), err.reason.value().to_string()).with_linked(err)
    }

    /// Outer error for asynchronous put problems reported by a status query.
    ///
    /// The linked error carries the first failure's reason name and
    /// completion code.
    #[must_use]
    pub fn async_put_failure(status: &AsyncStatus) -> Self {
        let detail = Self::new(
            ErrorKind::AsyncPutFailure,
            status.reason.name(),
            status.comp_code.as_i32().to_string(),
        );
        Self::new(
            ErrorKind::AsyncPutFailure,
            format!(
                "{} failures and {} warnings for asynchronous message put",
                status.put_failure_count, status.put_warning_count
            ),
            ASYNC_PUT_FAILURE_CODE,
        )
        .with_linked(detail)
    }

    /// Selector failed to parse.
    #[must_use]
    pub fn invalid_selector(err: SelectorError) -> Self {
        Self::new(
            ErrorKind::InvalidSelector,
            "Invalid selector syntax",
            INVALID_SELECTOR_CODE,
        )
        .with_linked(err)
    }

    /// Receive loop exhausted its attempts.
    #[must_use]
    pub fn no_message_received() -> Self {
        Self::new(
            ErrorKind::NoMessageReceived,
            "No message received",
            NO_MESSAGE_RECEIVED_CODE,
        )
    }

    /// Receive loop stopped by its cancel token or deadline.
    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cancelled, reason, CANCELLED_CODE)
    }

    /// Invalid connection parameter.
    pub fn config(reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, reason, "InvalidConfiguration")
    }

    /// Category of the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Human-readable reason.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Error code: a native reason-code number or a symbolic code.
    #[must_use]
    pub fn error_code(&self) -> &str {
        &self.error_code
    }

    /// Linked cause, if any.
    #[must_use]
    pub fn linked(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.linked.as_deref()
    }

    /// Linked cause when it is another runtime error.
    #[must_use]
    pub fn linked_error(&self) -> Option<&Error> {
        self.linked()?.downcast_ref::<Error>()
    }

    /// Linked cause when it is a transport failure.
    #[must_use]
    pub fn transport_error(&self) -> Option<&TransportError> {
        self.linked()?.downcast_ref::<TransportError>()
    }

    /// Native reason code of the linked transport failure.
    #[must_use]
    pub fn reason_code(&self) -> Option<ReasonCode> {
        self.transport_error().map(|err| err.reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::CompletionCode;
    use std::error::Error as _;

    #[test]
    fn test_from_transport_triple() {
        let err = Error::from_transport(
            ErrorKind::Send,
            TransportError::failed("MQPUT1", ReasonCode::Q_FULL),
        );
        assert_eq!(err.kind(), ErrorKind::Send);
        assert_eq!(err.reason(), "MQRC_Q_FULL");
        assert_eq!(err.error_code(), "2053");
        assert_eq!(err.reason_code(), Some(ReasonCode::Q_FULL));
        assert!(err.source().is_some());
        assert_eq!(err.to_string(), "send error: MQRC_Q_FULL [2053]");
    }

    #[test]
    fn test_async_put_failure_wraps_detail() {
        let status = AsyncStatus {
            comp_code: CompletionCode::Failed,
            reason: ReasonCode::PUT_INHIBITED,
            put_failure_count: 3,
            put_warning_count: 1,
            ..AsyncStatus::default()
        };
        let err = Error::async_put_failure(&status);
        assert_eq!(err.error_code(), ASYNC_PUT_FAILURE_CODE);
        assert_eq!(
            err.reason(),
            "3 failures and 1 warnings for asynchronous message put"
        );
        let detail = err.linked_error().unwrap();
        assert_eq!(detail.reason(), "MQRC_PUT_INHIBITED");
        assert_eq!(detail.error_code(), "2");
    }

    #[test]
    fn test_invalid_selector_code() {
        let selector_err = crate::transport::Selector::parse("A =").unwrap_err();
        let err = Error::invalid_selector(selector_err);
        assert_eq!(err.kind(), ErrorKind::InvalidSelector);
        assert_eq!(err.error_code(), INVALID_SELECTOR_CODE);
        assert!(err.linked().unwrap().downcast_ref::<SelectorError>().is_some());
    }
}
