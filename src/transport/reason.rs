//! Native queue-manager completion and reason codes.

use std::fmt;

/// Completion code reported alongside every reason code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum CompletionCode {
    /// Call completed successfully
    Ok = 0,
    /// Call completed partially
    Warning = 1,
    /// Call failed
    Failed = 2,
}

impl CompletionCode {
    /// Convert to the native numeric value
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }
}

/// Native reason code (`MQRC_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReasonCode(i32);

impl ReasonCode {
    /// No reason to report
    pub const NONE: Self = Self(0);
    /// Unit of work backed out
    pub const BACKED_OUT: Self = Self(2003);
    /// Connection to the queue manager lost
    pub const CONNECTION_BROKEN: Self = Self(2009);
    /// Queue is get-inhibited
    pub const GET_INHIBITED: Self = Self(2016);
    /// Connection handle not valid
    pub const HCONN_ERROR: Self = Self(2018);
    /// Object handle not valid
    pub const HOBJ_ERROR: Self = Self(2019);
    /// Message is larger than the channel allows
    pub const MSG_TOO_BIG_FOR_CHANNEL: Self = Self(2218);
    /// Not authorized for access
    pub const NOT_AUTHORIZED: Self = Self(2035);
    /// Object not open for input
    pub const NOT_OPEN_FOR_INPUT: Self = Self(2037);
    /// Object not open for browse
    pub const NOT_OPEN_FOR_BROWSE: Self = Self(2036);
    /// No message available
    pub const NO_MSG_AVAILABLE: Self = Self(2033);
    /// Option value not valid
    pub const OPTIONS_ERROR: Self = Self(2046);
    /// Queue is put-inhibited
    pub const PUT_INHIBITED: Self = Self(2051);
    /// Queue already contains its maximum number of messages
    pub const Q_FULL: Self = Self(2053);
    /// Queue-manager name not valid or not known
    pub const Q_MGR_NAME_ERROR: Self = Self(2058);
    /// Queue manager not available for connection
    pub const Q_MGR_NOT_AVAILABLE: Self = Self(2059);
    /// Message truncated because the buffer was too small
    pub const TRUNCATED_MSG_FAILED: Self = Self(2080);
    /// Object name not known
    pub const UNKNOWN_OBJECT_NAME: Self = Self(2085);
    /// Client channel definition not valid
    pub const CD_ERROR: Self = Self(2277);
    /// Security parameters not valid
    pub const CSP_ERROR: Self = Self(2595);
    /// Selection string syntax not valid
    pub const SELECTOR_SYNTAX_ERROR: Self = Self(2459);
    /// Message handle not valid
    pub const HMSG_ERROR: Self = Self(2460);

    /// Wrap a raw numeric reason code.
    #[must_use]
    pub const fn new(value: i32) -> Self {
        Self(value)
    }

    /// Raw numeric value.
    #[must_use]
    pub const fn value(self) -> i32 {
        self.0
    }

    /// Symbolic name, e.g. `MQRC_NO_MSG_AVAILABLE`.
    ///
    /// Codes without a known name render as `MQRC_<number>`.
    #[must_use]
    pub fn name(self) -> String {
        let name = match self {
            Self::NONE => "MQRC_NONE",
            Self::BACKED_OUT => "MQRC_BACKED_OUT",
            Self::CONNECTION_BROKEN => "MQRC_CONNECTION_BROKEN",
            Self::GET_INHIBITED => "MQRC_GET_INHIBITED",
            Self::HCONN_ERROR => "MQRC_HCONN_ERROR",
            Self::HOBJ_ERROR => "MQRC_HOBJ_ERROR",
            Self::MSG_TOO_BIG_FOR_CHANNEL => "MQRC_MSG_TOO_BIG_FOR_CHANNEL",
            Self::NOT_AUTHORIZED => "MQRC_NOT_AUTHORIZED",
            Self::NOT_OPEN_FOR_INPUT => "MQRC_NOT_OPEN_FOR_INPUT",
            Self::NOT_OPEN_FOR_BROWSE => "MQRC_NOT_OPEN_FOR_BROWSE",
            Self::NO_MSG_AVAILABLE => "MQRC_NO_MSG_AVAILABLE",
            Self::OPTIONS_ERROR => "MQRC_OPTIONS_ERROR",
            Self::PUT_INHIBITED => "MQRC_PUT_INHIBITED",
            Self::Q_FULL => "MQRC_Q_FULL",
            Self::Q_MGR_NAME_ERROR => "MQRC_Q_MGR_NAME_ERROR",
            Self::Q_MGR_NOT_AVAILABLE => "MQRC_Q_MGR_NOT_AVAILABLE",
            Self::TRUNCATED_MSG_FAILED => "MQRC_TRUNCATED_MSG_FAILED",
            Self::UNKNOWN_OBJECT_NAME => "MQRC_UNKNOWN_OBJECT_NAME",
            Self::CD_ERROR => "MQRC_CD_ERROR",
            Self::CSP_ERROR => "MQRC_CSP_ERROR",
            Self::SELECTOR_SYNTAX_ERROR => "MQRC_SELECTOR_SYNTAX_ERROR",
            Self::HMSG_ERROR => "MQRC_HMSG_ERROR",
            Self(other) => return format!("MQRC_{other}"),
        };
        name.to_string()
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.name(), self.0)
    }
}

impl From<i32> for ReasonCode {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_names() {
        assert_eq!(ReasonCode::NO_MSG_AVAILABLE.name(), "MQRC_NO_MSG_AVAILABLE");
        assert_eq!(ReasonCode::new(2085).name(), "MQRC_UNKNOWN_OBJECT_NAME");
    }

    #[test]
    fn test_unknown_name_falls_back_to_number() {
        assert_eq!(ReasonCode::new(9999).name(), "MQRC_9999");
        assert_eq!(ReasonCode::new(9999).to_string(), "MQRC_9999 [9999]");
    }
}
