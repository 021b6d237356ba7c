//! Descriptor and option structures exchanged with the queue-manager transport.
//!
//! These mirror the native MQI structures (MQMD, MQOD, MQPMO, MQGMO, MQSTS,
//! MQCNO/MQCD/MQSCO/MQCSP) closely enough for a binding to translate them
//! one-to-one, while staying plain Rust values.

use std::collections::BTreeMap;
use std::fmt;
use std::time::SystemTime;

use super::selector::Selector;

/// Length of message and correlation identifiers.
pub const ID_LEN: usize = 24;

/// Format name marking a character-string body.
pub const FORMAT_STRING: &str = "MQSTR   ";

/// Format name marking "no format" (opaque bytes).
pub const FORMAT_NONE: &str = "        ";

/// Priority value meaning "use the queue's default priority".
pub const PRIORITY_AS_Q_DEF: i32 = -1;

/// Expiry value meaning "never expires".
pub const EXPIRY_UNLIMITED: i32 = -1;

/// Message persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Persistence {
    /// Message is lost on queue-manager restart.
    NotPersistent,
    /// Message survives queue-manager restart.
    Persistent,
    /// Use the queue's default persistence.
    #[default]
    AsQueueDef,
}

/// Per-message envelope (MQMD).
#[derive(Clone, PartialEq)]
pub struct MessageDescriptor {
    /// Persistence of the message.
    pub persistence: Persistence,
    /// Priority (0-9), or [`PRIORITY_AS_Q_DEF`].
    pub priority: i32,
    /// Expiry in tenths of a second, or [`EXPIRY_UNLIMITED`].
    pub expiry: i32,
    /// Message identifier.
    pub msg_id: [u8; ID_LEN],
    /// Correlation identifier.
    pub correl_id: [u8; ID_LEN],
    /// Reply-to queue name.
    pub reply_to_q: String,
    /// Reply-to queue-manager name.
    pub reply_to_qmgr: String,
    /// Format name of the body.
    pub format: String,
    /// Name of the application that put the message.
    pub put_appl_name: String,
    /// Time the queue manager accepted the message.
    pub put_time: Option<SystemTime>,
    /// Number of times the message was backed out.
    pub backout_count: u32,
}

impl Default for MessageDescriptor {
    fn default() -> Self {
        Self {
            persistence: Persistence::AsQueueDef,
            priority: PRIORITY_AS_Q_DEF,
            expiry: EXPIRY_UNLIMITED,
            msg_id: [0u8; ID_LEN],
            correl_id: [0u8; ID_LEN],
            reply_to_q: String::new(),
            reply_to_qmgr: String::new(),
            format: FORMAT_NONE.to_string(),
            put_appl_name: String::new(),
            put_time: None,
            backout_count: 0,
        }
    }
}

impl MessageDescriptor {
    /// Whether the body format is unset.
    #[must_use]
    pub fn has_blank_format(&self) -> bool {
        self.format.trim().is_empty()
    }

    /// Whether the body is a character string.
    #[must_use]
    pub fn is_string_format(&self) -> bool {
        self.format.trim() == FORMAT_STRING.trim()
    }
}

impl fmt::Debug for MessageDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageDescriptor")
            .field("persistence", &self.persistence)
            .field("priority", &self.priority)
            .field("expiry", &self.expiry)
            .field("msg_id", &hex(&self.msg_id))
            .field("correl_id", &hex(&self.correl_id))
            .field("reply_to_q", &self.reply_to_q)
            .field("format", &self.format)
            .field("backout_count", &self.backout_count)
            .finish_non_exhaustive()
    }
}

/// Lower-case hex rendering of an identifier.
#[must_use]
pub fn hex(bytes: &[u8]) -> String {
    use fmt::Write;

    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Pack an application-supplied identifier into a fixed-size id field.
///
/// A 48-character hex string (optionally prefixed with `ID:`) is decoded as
/// raw bytes; anything else is copied as text, truncated or zero-padded.
#[must_use]
pub fn encode_id(value: &str) -> [u8; ID_LEN] {
    let mut id = [0u8; ID_LEN];
    let candidate = value.strip_prefix("ID:").unwrap_or(value);
    if candidate.len() == ID_LEN * 2 && candidate.bytes().all(|b| b.is_ascii_hexdigit()) {
        for (idx, byte) in id.iter_mut().enumerate() {
            let pair = &candidate[idx * 2..idx * 2 + 2];
            *byte = u8::from_str_radix(pair, 16).unwrap_or(0);
        }
        return id;
    }
    let bytes = value.as_bytes();
    let len = bytes.len().min(ID_LEN);
    id[..len].copy_from_slice(&bytes[..len]);
    id
}

/// Render an id field the way an application would have supplied it.
///
/// Printable text ids come back as text; binary ids as `ID:` plus hex.
/// An all-zero id renders as `None`.
#[must_use]
pub fn decode_id(id: &[u8; ID_LEN]) -> Option<String> {
    if id.iter().all(|b| *b == 0) {
        return None;
    }
    let end = id.iter().rposition(|b| *b != 0).map_or(0, |pos| pos + 1);
    let text = &id[..end];
    if text.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
        return Some(String::from_utf8_lossy(text).into_owned());
    }
    Some(format!("ID:{}", hex(id)))
}

/// Identifies the queue an operation targets (MQOD).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectDescriptor {
    /// Queue name.
    pub object_name: String,
    /// Queue-manager name (blank = the connected one).
    pub object_qmgr_name: String,
}

impl ObjectDescriptor {
    /// Descriptor for a local queue.
    #[must_use]
    pub fn queue(name: impl Into<String>) -> Self {
        Self {
            object_name: name.into(),
            object_qmgr_name: String::new(),
        }
    }
}

/// Open options (MQOO).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenOptions {
    /// Open for input using the queue-defined sharing mode.
    pub input_as_q_def: bool,
    /// Open for browse.
    pub browse: bool,
    /// Open for output.
    pub output: bool,
    /// Fail if the queue manager is quiescing.
    pub fail_if_quiescing: bool,
}

/// Handle of an open queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectHandle(pub u32);

/// Whether an operation joins the session's unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncpointMode {
    /// Operation takes effect immediately.
    #[default]
    NoSyncpoint,
    /// Operation is deferred until commit.
    Syncpoint,
}

/// Put message options (MQPMO).
#[derive(Debug, Clone, Default)]
pub struct PutOptions<'a> {
    /// Unit-of-work participation.
    pub syncpoint: SyncpointMode,
    /// Ask the queue manager to generate a unique message id.
    pub new_msg_id: bool,
    /// Fire-and-forget put; failures surface through [`StatType::AsyncError`].
    pub async_response: bool,
    /// Fail if the queue manager is quiescing.
    pub fail_if_quiescing: bool,
    /// Handle holding the message properties.
    pub original_msg_handle: Option<&'a MessageHandle>,
}

/// Browse cursor movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowseCursor {
    /// Position on the first eligible message.
    First,
    /// Advance past the previously browsed message.
    Next,
}

/// Get message options (MQGMO).
#[derive(Debug, Clone)]
pub struct GetOptions<'a> {
    /// Unit-of-work participation.
    pub syncpoint: SyncpointMode,
    /// Browse instead of removing the message.
    pub browse: Option<BrowseCursor>,
    /// Only return messages whose correlation id equals the descriptor's.
    pub match_correl_id: bool,
    /// Selection applied by the queue manager.
    pub selector: Option<&'a Selector>,
    /// Largest body that fits the caller's buffer.
    pub max_length: usize,
    /// Fail if the queue manager is quiescing.
    pub fail_if_quiescing: bool,
}

impl Default for GetOptions<'_> {
    fn default() -> Self {
        Self {
            syncpoint: SyncpointMode::NoSyncpoint,
            browse: None,
            match_correl_id: false,
            selector: None,
            max_length: 32 * 1024,
            fail_if_quiescing: true,
        }
    }
}

/// Kind of status requested from the queue manager (MQSTAT).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatType {
    /// Outcome of asynchronous puts since the previous query.
    AsyncError,
}

/// Status returned by MQSTAT (MQSTS).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsyncStatus {
    /// Completion code of the first failing put.
    pub comp_code: super::CompletionCode,
    /// Reason code of the first failing put.
    pub reason: super::ReasonCode,
    /// Asynchronous puts that succeeded.
    pub put_success_count: u32,
    /// Asynchronous puts that completed with a warning.
    pub put_warning_count: u32,
    /// Asynchronous puts that failed.
    pub put_failure_count: u32,
    /// Queue targeted by the first failing put.
    pub object_name: String,
}

impl Default for AsyncStatus {
    fn default() -> Self {
        Self {
            comp_code: super::CompletionCode::Ok,
            reason: super::ReasonCode::NONE,
            put_success_count: 0,
            put_warning_count: 0,
            put_failure_count: 0,
            object_name: String::new(),
        }
    }
}

impl AsyncStatus {
    /// Whether any asynchronous put reported a problem.
    #[must_use]
    pub fn has_problems(&self) -> bool {
        self.put_warning_count + self.put_failure_count > 0
    }
}

/// Value of a message property.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// String property.
    String(String),
    /// Integer property.
    Int(i64),
    /// Floating-point property.
    Double(f64),
    /// Boolean property.
    Bool(bool),
}

/// Handle carrying message properties alongside a message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageHandle {
    /// Handle identifier allocated by the queue manager.
    pub id: u64,
    /// Properties set on the handle.
    pub properties: BTreeMap<String, PropertyValue>,
}

impl MessageHandle {
    /// An empty handle with the given identifier.
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self {
            id,
            properties: BTreeMap::new(),
        }
    }
}

/// How the application reaches the queue manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Binding {
    /// Network client connection over a channel.
    #[default]
    Client,
    /// Shared-memory connection to a local queue manager.
    Local,
}

/// TLS client-authentication requirement on the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SslClientAuth {
    /// Client certificate required.
    Required,
    /// Client certificate optional.
    Optional,
}

/// Client channel definition (MQCD).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelDefinition {
    /// Server-connection channel name.
    pub channel_name: String,
    /// Connection name, `host(port)`.
    pub connection_name: String,
    /// TLS cipher spec, if the channel is secured.
    pub ssl_cipher_spec: Option<String>,
    /// Client authentication requirement; `None` keeps the channel default.
    pub ssl_client_auth: Option<SslClientAuth>,
    /// Largest message the channel accepts.
    pub max_msg_length: u32,
}

impl Default for ChannelDefinition {
    fn default() -> Self {
        Self {
            channel_name: String::new(),
            connection_name: String::new(),
            ssl_cipher_spec: None,
            ssl_client_auth: None,
            max_msg_length: 4 * 1024 * 1024,
        }
    }
}

/// TLS key repository settings (MQSCO).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SslConfig {
    /// Path to the key repository.
    pub key_repository: String,
    /// Certificate label to present.
    pub certificate_label: Option<String>,
}

/// User credentials (MQCSP).
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// User id.
    pub user_id: String,
    /// Password.
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user_id", &self.user_id)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Connect options (MQCNO).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Client or local binding.
    pub binding: Binding,
    /// Channel definition for client connections.
    pub client_conn: Option<ChannelDefinition>,
    /// TLS key repository settings.
    pub ssl_config: Option<SslConfig>,
    /// User credentials.
    pub security_parms: Option<Credentials>,
    /// Application name reported to the queue manager.
    pub appl_name: String,
}
