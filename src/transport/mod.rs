//! Queue-manager transport boundary.
//!
//! The messaging runtime talks to a queue manager only through the
//! [`Connector`] and [`Session`] traits and the plain structures defined here.
//! [`memory::QueueManager`] is an in-process implementation.

mod error;
pub mod memory;
mod reason;
mod selector;
mod session;
mod structures;

pub use error::TransportError;
pub use reason::{CompletionCode, ReasonCode};
pub use selector::{CompareOp, Expr, Field, Literal, MAX_NESTING, Selector, SelectorError};
pub use session::{Connector, Session};
pub use structures::{
    AsyncStatus, Binding, BrowseCursor, ChannelDefinition, ConnectOptions, Credentials,
    EXPIRY_UNLIMITED, FORMAT_NONE, FORMAT_STRING, GetOptions, ID_LEN, MessageDescriptor,
    MessageHandle, ObjectDescriptor, ObjectHandle, OpenOptions, PRIORITY_AS_Q_DEF,
    Persistence, PropertyValue, PutOptions, SslClientAuth, SslConfig, StatType, SyncpointMode,
    decode_id, encode_id, hex,
};
