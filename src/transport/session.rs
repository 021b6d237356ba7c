//! The queue-manager boundary consumed by the messaging runtime.
//!
//! A binding to a real queue manager implements [`Connector`] and [`Session`];
//! the crate ships [`memory::QueueManager`](super::memory::QueueManager) as an
//! in-process implementation.

use super::error::TransportError;
use super::structures::{
    AsyncStatus, ConnectOptions, GetOptions, MessageDescriptor, MessageHandle, ObjectDescriptor,
    ObjectHandle, OpenOptions, PutOptions, StatType,
};

/// Establishes sessions with a queue manager (MQCONNX).
pub trait Connector {
    /// Connect to the named queue manager.
    fn connect(
        &self,
        qmgr_name: &str,
        options: &ConnectOptions,
    ) -> Result<Box<dyn Session>, TransportError>;
}

/// One connection to a queue manager.
///
/// Sessions are driven by a single caller at a time. Implementations use
/// interior mutability where they need it.
pub trait Session: Send {
    /// Open a queue.
    fn open(
        &self,
        od: &ObjectDescriptor,
        options: OpenOptions,
    ) -> Result<ObjectHandle, TransportError>;

    /// Close a previously opened queue.
    fn close(&self, handle: ObjectHandle) -> Result<(), TransportError>;

    /// Open, put one message and close in a single call.
    ///
    /// Output fields of `md` (message id, put time) are filled in on success.
    fn put1(
        &self,
        od: &ObjectDescriptor,
        md: &mut MessageDescriptor,
        pmo: &PutOptions<'_>,
        data: &[u8],
    ) -> Result<(), TransportError>;

    /// Retrieve (or browse) one message without waiting.
    ///
    /// On input `md.correl_id` is the match value when
    /// [`GetOptions::match_correl_id`] is set; on output `md` describes the
    /// message. Properties are copied into `msg_handle`, the body into
    /// `buffer`. Returns the body length.
    fn get(
        &self,
        handle: ObjectHandle,
        md: &mut MessageDescriptor,
        gmo: &GetOptions<'_>,
        msg_handle: &mut MessageHandle,
        buffer: &mut Vec<u8>,
    ) -> Result<usize, TransportError>;

    /// Commit the current unit of work.
    fn commit(&self) -> Result<(), TransportError>;

    /// Back out the current unit of work.
    fn backout(&self) -> Result<(), TransportError>;

    /// Query session status.
    fn stat(&self, kind: StatType) -> Result<AsyncStatus, TransportError>;

    /// Allocate a message handle for properties.
    fn create_message_handle(&self) -> Result<MessageHandle, TransportError>;

    /// Disconnect.
    fn disconnect(&self) -> Result<(), TransportError>;
}
