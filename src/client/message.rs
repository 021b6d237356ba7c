//! Text and bytes messages.
//!
//! Messages are created by a [`Context`](super::Context) and handed to a
//! [`Producer`](super::Producer). A message keeps the transport descriptor of
//! its last exchange, so a received message re-sent as a reply keeps its
//! correlation and reply-to fields.

use std::time::{Duration, SystemTime};

use bytes::{Bytes, BytesMut};

use super::destination::Queue;
use super::producer::DeliveryMode;
use crate::transport::{
    ID_LEN, MessageDescriptor, MessageHandle, Persistence, PropertyValue, decode_id, encode_id,
    hex,
};

/// Descriptor and property handle shared by every message variant.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct MessageCore {
    pub(crate) descriptor: Option<MessageDescriptor>,
    pub(crate) handle: MessageHandle,
}

impl MessageCore {
    pub(crate) fn new(handle: MessageHandle) -> Self {
        Self {
            descriptor: None,
            handle,
        }
    }

    fn descriptor_mut(&mut self) -> &mut MessageDescriptor {
        self.descriptor.get_or_insert_with(MessageDescriptor::default)
    }

    fn message_id(&self) -> Option<String> {
        let md = self.descriptor.as_ref()?;
        if md.msg_id == [0u8; ID_LEN] {
            None
        } else {
            Some(format!("ID:{}", hex(&md.msg_id)))
        }
    }

    fn correlation_id(&self) -> Option<String> {
        decode_id(&self.descriptor.as_ref()?.correl_id)
    }

    fn set_correlation_id(&mut self, id: &str) {
        self.descriptor_mut().correl_id = encode_id(id);
    }

    fn reply_to(&self) -> Option<Queue> {
        let name = self.descriptor.as_ref()?.reply_to_q.trim();
        (!name.is_empty()).then(|| Queue::new(name))
    }

    fn set_reply_to(&mut self, queue: Option<&Queue>) {
        let md = self.descriptor_mut();
        md.reply_to_q = queue.map(|q| q.name().to_string()).unwrap_or_default();
        md.reply_to_qmgr.clear();
    }

    fn delivery_mode(&self) -> Option<DeliveryMode> {
        match self.descriptor.as_ref()?.persistence {
            Persistence::Persistent => Some(DeliveryMode::Persistent),
            Persistence::NotPersistent => Some(DeliveryMode::NonPersistent),
            Persistence::AsQueueDef => None,
        }
    }

    fn priority(&self) -> Option<i32> {
        self.descriptor
            .as_ref()
            .map(|md| md.priority)
            .filter(|p| *p >= 0)
    }

    fn expiration(&self) -> Option<Duration> {
        let tenths = u64::try_from(self.descriptor.as_ref()?.expiry).ok()?;
        (tenths > 0).then(|| Duration::from_millis(tenths * 100))
    }

    fn timestamp(&self) -> Option<SystemTime> {
        self.descriptor.as_ref()?.put_time
    }
}

/// Generates the header and property accessors shared by every message type.
macro_rules! message_accessors {
    ($ty:ty) => {
        impl $ty {
            /// Message id assigned by the queue manager on send, as `ID:<hex>`.
            #[must_use]
            pub fn jms_message_id(&self) -> Option<String> {
                self.core().message_id()
            }

            /// Correlation id, if one is set.
            #[must_use]
            pub fn jms_correlation_id(&self) -> Option<String> {
                self.core().correlation_id()
            }

            /// Set the correlation id.
            ///
            /// A 48-digit hex string (optionally `ID:`-prefixed) sets the raw
            /// bytes; other text is stored verbatim, truncated to 24 bytes.
            pub fn set_jms_correlation_id(&mut self, id: &str) {
                self.core_mut().set_correlation_id(id);
            }

            /// Queue replies should be sent to.
            #[must_use]
            pub fn jms_reply_to(&self) -> Option<Queue> {
                self.core().reply_to()
            }

            /// Set or clear the reply-to queue.
            pub fn set_jms_reply_to(&mut self, queue: Option<&Queue>) {
                self.core_mut().set_reply_to(queue);
            }

            /// Delivery mode the message was last sent or received with.
            #[must_use]
            pub fn jms_delivery_mode(&self) -> Option<DeliveryMode> {
                self.core().delivery_mode()
            }

            /// Priority the message was last sent or received with.
            #[must_use]
            pub fn jms_priority(&self) -> Option<i32> {
                self.core().priority()
            }

            /// Remaining lifetime recorded in the descriptor.
            #[must_use]
            pub fn jms_expiration(&self) -> Option<Duration> {
                self.core().expiration()
            }

            /// Time the queue manager accepted the message.
            #[must_use]
            pub fn jms_timestamp(&self) -> Option<SystemTime> {
                self.core().timestamp()
            }

            /// Transport descriptor from the last send or receive.
            #[must_use]
            pub fn descriptor(&self) -> Option<&MessageDescriptor> {
                self.core().descriptor.as_ref()
            }

            /// Set a string property.
            pub fn set_string_property(&mut self, name: impl Into<String>, value: impl Into<String>) {
                self.set_property(name, PropertyValue::String(value.into()));
            }

            /// Set an integer property.
            pub fn set_int_property(&mut self, name: impl Into<String>, value: i64) {
                self.set_property(name, PropertyValue::Int(value));
            }

            /// Set a floating-point property.
            pub fn set_double_property(&mut self, name: impl Into<String>, value: f64) {
                self.set_property(name, PropertyValue::Double(value));
            }

            /// Set a boolean property.
            pub fn set_bool_property(&mut self, name: impl Into<String>, value: bool) {
                self.set_property(name, PropertyValue::Bool(value));
            }

            /// Set a property of any type.
            pub fn set_property(&mut self, name: impl Into<String>, value: PropertyValue) {
                self.core_mut().handle.properties.insert(name.into(), value);
            }

            /// Raw property value.
            #[must_use]
            pub fn property(&self, name: &str) -> Option<&PropertyValue> {
                self.core().handle.properties.get(name)
            }

            /// String property; non-string values are rendered as text.
            #[must_use]
            pub fn string_property(&self, name: &str) -> Option<String> {
                Some(match self.property(name)? {
                    PropertyValue::String(s) => s.clone(),
                    PropertyValue::Int(n) => n.to_string(),
                    PropertyValue::Double(n) => n.to_string(),
                    PropertyValue::Bool(b) => b.to_string(),
                })
            }

            /// Integer property; strings holding a number are parsed.
            #[must_use]
            pub fn int_property(&self, name: &str) -> Option<i64> {
                match self.property(name)? {
                    PropertyValue::Int(n) => Some(*n),
                    PropertyValue::String(s) => s.trim().parse().ok(),
                    PropertyValue::Double(_) | PropertyValue::Bool(_) => None,
                }
            }

            /// Floating-point property; integers widen, strings are parsed.
            #[must_use]
            #[allow(clippy::cast_precision_loss)]
            pub fn double_property(&self, name: &str) -> Option<f64> {
                match self.property(name)? {
                    PropertyValue::Double(n) => Some(*n),
                    PropertyValue::Int(n) => Some(*n as f64),
                    PropertyValue::String(s) => s.trim().parse().ok(),
                    PropertyValue::Bool(_) => None,
                }
            }

            /// Boolean property; `"true"`/`"false"` strings are accepted.
            #[must_use]
            pub fn bool_property(&self, name: &str) -> Option<bool> {
                match self.property(name)? {
                    PropertyValue::Bool(b) => Some(*b),
                    PropertyValue::String(s) => s.trim().to_ascii_lowercase().parse().ok(),
                    PropertyValue::Int(_) | PropertyValue::Double(_) => None,
                }
            }

            /// Whether a property is set.
            #[must_use]
            pub fn property_exists(&self, name: &str) -> bool {
                self.core().handle.properties.contains_key(name)
            }

            /// Names of all properties, sorted.
            #[must_use]
            pub fn property_names(&self) -> Vec<String> {
                self.core().handle.properties.keys().cloned().collect()
            }

            /// Remove every property.
            pub fn clear_properties(&mut self) {
                self.core_mut().handle.properties.clear();
            }
        }
    };
}

/// Message whose body is a string.
#[derive(Debug, Clone, PartialEq)]
pub struct TextMessage {
    pub(crate) core: MessageCore,
    pub(crate) text: Option<String>,
}

impl TextMessage {
    pub(crate) fn new(handle: MessageHandle, text: Option<String>) -> Self {
        Self {
            core: MessageCore::new(handle),
            text,
        }
    }

    /// Body text, if any.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Replace the body text.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = Some(text.into());
    }

    fn core(&self) -> &MessageCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut MessageCore {
        &mut self.core
    }
}

message_accessors!(TextMessage);

/// Message whose body is an opaque byte sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct BytesMessage {
    pub(crate) core: MessageCore,
    pub(crate) body: Option<Bytes>,
}

impl BytesMessage {
    pub(crate) fn new(handle: MessageHandle, body: Option<Bytes>) -> Self {
        Self {
            core: MessageCore::new(handle),
            body,
        }
    }

    /// Body bytes, if any.
    #[must_use]
    pub fn read_bytes(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Append bytes to the body.
    pub fn write_bytes(&mut self, data: &[u8]) {
        self.body = Some(match self.body.take() {
            Some(existing) => {
                let mut buf = BytesMut::with_capacity(existing.len() + data.len());
                buf.extend_from_slice(&existing);
                buf.extend_from_slice(data);
                buf.freeze()
            }
            None => Bytes::copy_from_slice(data),
        });
    }

    /// Body length in bytes.
    #[must_use]
    pub fn body_length(&self) -> usize {
        self.body.as_ref().map_or(0, Bytes::len)
    }

    fn core(&self) -> &MessageCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut MessageCore {
        &mut self.core
    }
}

message_accessors!(BytesMessage);

/// Any message the runtime can send or receive.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// String body.
    Text(TextMessage),
    /// Byte body.
    Bytes(BytesMessage),
}

impl Message {
    /// The text message, if this is one.
    #[must_use]
    pub fn as_text(&self) -> Option<&TextMessage> {
        match self {
            Self::Text(msg) => Some(msg),
            Self::Bytes(_) => None,
        }
    }

    /// The bytes message, if this is one.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&BytesMessage> {
        match self {
            Self::Bytes(msg) => Some(msg),
            Self::Text(_) => None,
        }
    }

    /// Body as raw bytes regardless of variant.
    #[must_use]
    pub fn body_bytes(&self) -> Bytes {
        match self {
            Self::Text(msg) => msg
                .text
                .as_ref()
                .map(|t| Bytes::copy_from_slice(t.as_bytes()))
                .unwrap_or_default(),
            Self::Bytes(msg) => msg.body.clone().unwrap_or_default(),
        }
    }

    fn core(&self) -> &MessageCore {
        match self {
            Self::Text(msg) => &msg.core,
            Self::Bytes(msg) => &msg.core,
        }
    }

    pub(crate) fn core_mut(&mut self) -> &mut MessageCore {
        match self {
            Self::Text(msg) => &mut msg.core,
            Self::Bytes(msg) => &mut msg.core,
        }
    }

    /// Build a received message: string-format bodies become text messages.
    pub(crate) fn from_received(md: MessageDescriptor, handle: MessageHandle, data: Vec<u8>) -> Self {
        let string_format = md.is_string_format();
        let core = MessageCore {
            descriptor: Some(md),
            handle,
        };
        if string_format {
            let text = String::from_utf8(data)
                .unwrap_or_else(|err| String::from_utf8_lossy(err.as_bytes()).into_owned());
            Self::Text(TextMessage {
                core,
                text: Some(text),
            })
        } else {
            Self::Bytes(BytesMessage {
                core,
                body: Some(Bytes::from(data)),
            })
        }
    }
}

message_accessors!(Message);

impl From<TextMessage> for Message {
    fn from(msg: TextMessage) -> Self {
        Self::Text(msg)
    }
}

impl From<BytesMessage> for Message {
    fn from(msg: BytesMessage) -> Self {
        Self::Bytes(msg)
    }
}
