//! Message producer and the send path.

use std::fmt;

use bytes::Bytes;
use tracing::{debug, instrument, warn};

use super::context::Context;
use super::destination::Queue;
use super::error::{Error, ErrorKind, Result};
use super::message::Message;
use crate::transport::{FORMAT_STRING, ObjectDescriptor, Persistence, PutOptions, SyncpointMode};

/// Priority given to messages when the producer is not told otherwise.
pub const DEFAULT_PRIORITY: i32 = 4;

/// Highest valid message priority.
pub const MAX_PRIORITY: i32 = 9;

/// Whether messages survive a queue-manager restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DeliveryMode {
    /// Lost on restart.
    NonPersistent,
    /// Logged and recovered on restart.
    #[default]
    Persistent,
}

impl DeliveryMode {
    /// Numeric code used by JMS (`1` non-persistent, `2` persistent).
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::NonPersistent => 1,
            Self::Persistent => 2,
        }
    }

    /// Parse a JMS numeric code.
    #[must_use]
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Self::NonPersistent),
            2 => Some(Self::Persistent),
            _ => None,
        }
    }

    fn persistence(self) -> Persistence {
        match self {
            Self::NonPersistent => Persistence::NotPersistent,
            Self::Persistent => Persistence::Persistent,
        }
    }
}

impl fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonPersistent => f.write_str("NON_PERSISTENT"),
            Self::Persistent => f.write_str("PERSISTENT"),
        }
    }
}

/// Sends messages to queues on behalf of a [`Context`].
///
/// A producer carries per-producer send configuration and borrows the
/// context it was created from, so it cannot outlive it.
///
/// ```
/// use mqjms::{ConnectionFactory, DeliveryMode, transport::memory::QueueManager};
///
/// let qm = QueueManager::new("QM1");
/// qm.define_queue("DEV.QUEUE.1");
/// let ctx = ConnectionFactory::default().create_context(&qm)?;
///
/// let mut producer = ctx.create_producer();
/// producer
///     .set_delivery_mode(DeliveryMode::NonPersistent)
///     .set_priority(7)
///     .set_time_to_live(60_000);
/// producer.send_string(&ctx.create_queue("DEV.QUEUE.1"), "hello")?;
/// # Ok::<(), mqjms::Error>(())
/// ```
#[derive(Debug)]
pub struct Producer<'ctx> {
    ctx: &'ctx Context,
    delivery_mode: DeliveryMode,
    priority: i32,
    time_to_live: i64,
}

impl<'ctx> Producer<'ctx> {
    pub(crate) fn new(ctx: &'ctx Context) -> Self {
        Self {
            ctx,
            delivery_mode: DeliveryMode::Persistent,
            priority: DEFAULT_PRIORITY,
            time_to_live: 0,
        }
    }

    /// Current delivery mode.
    #[must_use]
    pub fn delivery_mode(&self) -> DeliveryMode {
        self.delivery_mode
    }

    /// Set the delivery mode for subsequent sends.
    pub fn set_delivery_mode(&mut self, mode: DeliveryMode) -> &mut Self {
        self.delivery_mode = mode;
        self
    }

    /// Current priority.
    #[must_use]
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Set the priority (0-9). Out-of-range values are ignored with a warning.
    pub fn set_priority(&mut self, priority: i32) -> &mut Self {
        if (0..=MAX_PRIORITY).contains(&priority) {
            self.priority = priority;
        } else {
            warn!(priority, current = self.priority, "ignoring out-of-range producer priority");
        }
        self
    }

    /// Current time-to-live in milliseconds; `0` means unlimited.
    #[must_use]
    pub fn time_to_live(&self) -> i64 {
        self.time_to_live
    }

    /// Set the time-to-live in milliseconds. Negative values are ignored
    /// with a warning.
    pub fn set_time_to_live(&mut self, ttl_ms: i64) -> &mut Self {
        if ttl_ms >= 0 {
            self.time_to_live = ttl_ms;
        } else {
            warn!(ttl_ms, current = self.time_to_live, "ignoring negative producer time-to-live");
        }
        self
    }

    /// Send a text message built from `body`.
    pub fn send_string(&self, dest: &Queue, body: &str) -> Result<()> {
        let mut msg = Message::from(self.ctx.create_text_message_with_string(body)?);
        self.send(dest, &mut msg)
    }

    /// Send a bytes message built from `body`.
    pub fn send_bytes(&self, dest: &Queue, body: &[u8]) -> Result<()> {
        let mut msg = Message::from(
            self.ctx
                .create_bytes_message_with_bytes(Bytes::copy_from_slice(body))?,
        );
        self.send(dest, &mut msg)
    }

    /// Send a message to `dest`.
    ///
    /// The message keeps the descriptor the queue manager filled in, so its
    /// message id and applied header fields can be read afterwards.
    ///
    /// When `dest` allows asynchronous puts, put failures are not reported by
    /// the put itself. Outside a transaction the context queries the
    /// queue manager after the first such send and then every
    /// `send_check_count` sends, returning [`ErrorKind::AsyncPutFailure`] if
    /// any failures or warnings were recorded. Inside a transaction,
    /// persistent asynchronous sends are verified when the transaction is
    /// committed; non-persistent ones are not verified at all.
    #[instrument(level = "debug", skip(self, dest, msg), fields(queue = %dest.name()))]
    pub fn send(&self, dest: &Queue, msg: &mut Message) -> Result<()> {
        let session = self.ctx.session(ErrorKind::Send, "MQPUT1")?;

        let syncpoint = if self.ctx.is_transacted() {
            SyncpointMode::Syncpoint
        } else {
            SyncpointMode::NoSyncpoint
        };
        let async_put = dest.is_async_enabled();

        let payload = msg.body_bytes();
        let is_text = matches!(msg, Message::Text(_));
        let core = msg.core_mut();

        let mut md = core.descriptor.take().unwrap_or_default();
        if is_text && md.has_blank_format() {
            md.format = FORMAT_STRING.to_string();
        }
        md.persistence = self.delivery_mode.persistence();
        if self.time_to_live > 0 {
            md.expiry = i32::try_from(self.time_to_live / 100).unwrap_or(i32::MAX);
        }
        md.priority = self.priority;

        let pmo = PutOptions {
            syncpoint,
            new_msg_id: true,
            async_response: async_put,
            fail_if_quiescing: true,
            original_msg_handle: Some(&core.handle),
        };
        let od = ObjectDescriptor::queue(dest.name());
        let put = session.put1(&od, &mut md, &pmo, &payload);
        let persistent = md.persistence == Persistence::Persistent;
        core.descriptor = Some(md);

        if let Err(err) = put {
            debug!(reason = %err.reason, "put failed");
            return Err(Error::from_transport(ErrorKind::Send, err));
        }

        if async_put && syncpoint == SyncpointMode::NoSyncpoint && self.ctx.async_check_due() {
            self.ctx.check_async_status(ErrorKind::Send)?;
        }

        if async_put && syncpoint == SyncpointMode::Syncpoint && persistent {
            self.ctx.mark_transacted_async_put();
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ConnectionFactory;
    use crate::transport::memory::QueueManager;

    fn context() -> (QueueManager, Context) {
        let qm = QueueManager::new("QM1");
        qm.define_queue("DEV.QUEUE.1");
        let ctx = ConnectionFactory::default().create_context(&qm).unwrap();
        (qm, ctx)
    }

    #[test]
    fn test_producer_defaults() {
        let (_qm, ctx) = context();
        let producer = ctx.create_producer();
        assert_eq!(producer.delivery_mode(), DeliveryMode::Persistent);
        assert_eq!(producer.priority(), DEFAULT_PRIORITY);
        assert_eq!(producer.time_to_live(), 0);
    }

    #[test]
    fn test_setters_chain_and_reject() {
        let (_qm, ctx) = context();
        let mut producer = ctx.create_producer();
        producer
            .set_priority(9)
            .set_priority(10)
            .set_time_to_live(1500)
            .set_time_to_live(-1)
            .set_delivery_mode(DeliveryMode::NonPersistent);
        assert_eq!(producer.priority(), 9);
        assert_eq!(producer.time_to_live(), 1500);
        assert_eq!(producer.delivery_mode(), DeliveryMode::NonPersistent);
    }

    #[test]
    fn test_send_applies_producer_settings() {
        let (_qm, ctx) = context();
        let mut producer = ctx.create_producer();
        producer
            .set_delivery_mode(DeliveryMode::NonPersistent)
            .set_priority(2)
            .set_time_to_live(1999);

        let mut msg = Message::from(ctx.create_text_message_with_string("hi").unwrap());
        producer
            .send(&ctx.create_queue("DEV.QUEUE.1"), &mut msg)
            .unwrap();

        let md = msg.descriptor().unwrap();
        assert_eq!(md.persistence, Persistence::NotPersistent);
        assert_eq!(md.expiry, 19);
        assert_eq!(md.priority, 2);
        assert!(md.is_string_format());
        assert!(msg.jms_message_id().is_some());
    }

    #[test]
    fn test_zero_ttl_leaves_expiry_untouched() {
        let (_qm, ctx) = context();
        let mut msg = Message::from(ctx.create_bytes_message().unwrap());
        ctx.create_producer()
            .send(&ctx.create_queue("DEV.QUEUE.1"), &mut msg)
            .unwrap();
        let md = msg.descriptor().unwrap();
        assert_eq!(md.expiry, crate::transport::EXPIRY_UNLIMITED);
        assert!(md.has_blank_format());
    }

    #[test]
    fn test_send_failure_translated() {
        let (_qm, ctx) = context();
        let err = ctx
            .create_producer()
            .send_string(&ctx.create_queue("NO.SUCH.QUEUE"), "x")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Send);
        assert_eq!(err.reason(), "MQRC_UNKNOWN_OBJECT_NAME");
        assert_eq!(err.error_code(), "2085");
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn delivery_mode_strategy() -> impl Strategy<Value = DeliveryMode> {
            prop_oneof![Just(DeliveryMode::NonPersistent), Just(DeliveryMode::Persistent)]
        }

        proptest! {
            /// Property: valid settings are stored, invalid ones keep the prior value
            #[test]
            fn prop_setters_validate(
                first in 0..=MAX_PRIORITY,
                second in any::<i32>(),
                ttl in 0i64..i64::MAX,
                bad_ttl in i64::MIN..0,
                mode in delivery_mode_strategy(),
            ) {
                let (_qm, ctx) = context();
                let mut producer = ctx.create_producer();
                producer
                    .set_priority(first)
                    .set_priority(second)
                    .set_time_to_live(ttl)
                    .set_time_to_live(bad_ttl)
                    .set_delivery_mode(mode);

                let expected = if (0..=MAX_PRIORITY).contains(&second) { second } else { first };
                prop_assert_eq!(producer.priority(), expected);
                prop_assert_eq!(producer.time_to_live(), ttl);
                prop_assert_eq!(producer.delivery_mode(), mode);
            }

            /// Property: expiry is the time-to-live in tenths of a second, rounded down
            #[test]
            fn prop_expiry_from_ttl(ttl in 1i64..100_000_000, mode in delivery_mode_strategy()) {
                let (_qm, ctx) = context();
                let mut producer = ctx.create_producer();
                producer.set_time_to_live(ttl).set_delivery_mode(mode);

                let mut msg = Message::from(ctx.create_text_message_with_string("p").unwrap());
                producer.send(&ctx.create_queue("DEV.QUEUE.1"), &mut msg).unwrap();

                let md = msg.descriptor().unwrap();
                prop_assert_eq!(i64::from(md.expiry), ttl / 100);
                prop_assert_eq!(md.persistence, mode.persistence());
            }
        }
    }

    #[test]
    fn test_delivery_mode_codes() {
        assert_eq!(DeliveryMode::from_code(1), Some(DeliveryMode::NonPersistent));
        assert_eq!(DeliveryMode::from_code(2), Some(DeliveryMode::Persistent));
        assert_eq!(DeliveryMode::from_code(0), None);
        assert_eq!(DeliveryMode::Persistent.code(), 2);
    }
}
