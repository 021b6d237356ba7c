//! Connection parameters and context creation.

use std::fmt;
use std::str::FromStr;

use tracing::{debug, instrument};

use super::context::{Context, SessionMode};
use super::error::{Error, ErrorKind, Result};
use crate::transport::{
    Binding, ChannelDefinition, ConnectOptions, Connector, Credentials, SslClientAuth, SslConfig,
};

/// How the client reaches the queue manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TransportType {
    /// Network connection over a server-connection channel.
    #[default]
    Client,
    /// Local connection to a queue manager on the same host.
    Bindings,
}

impl FromStr for TransportType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CLIENT" => Ok(Self::Client),
            "BINDINGS" => Ok(Self::Bindings),
            other => Err(Error::config(format!("unknown transport type '{other}'"))),
        }
    }
}

/// TLS client-certificate requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TlsClientAuth {
    /// A client certificate is presented if one is configured.
    #[default]
    Optional,
    /// A client certificate must be presented.
    Required,
    /// Leave the channel's own setting untouched.
    None,
}

impl FromStr for TlsClientAuth {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "" | "OPTIONAL" => Ok(Self::Optional),
            "REQUIRED" => Ok(Self::Required),
            "NONE" => Ok(Self::None),
            other => Err(Error::config(format!("unknown TLS client auth '{other}'"))),
        }
    }
}

/// Adjustment applied to the connect options before connecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOption {
    /// Largest message the client channel accepts. Ignored for bindings
    /// connections.
    MaxMsgLength(u32),
}

impl ConnectOption {
    fn apply(self, cno: &mut ConnectOptions) {
        match self {
            Self::MaxMsgLength(len) => {
                if let Some(cd) = cno.client_conn.as_mut() {
                    cd.max_msg_length = len;
                }
            }
        }
    }
}

/// Everything needed to connect to a queue manager.
///
/// Fields are public so the factory can be filled in however the
/// application prefers: struct literal, [`from_env`](Self::from_env), or
/// deserialized with the `serde` feature. The password is never serialized.
///
/// ```
/// use mqjms::{ConnectionFactory, transport::memory::QueueManager};
///
/// let qm = QueueManager::new("QM1");
/// let factory = ConnectionFactory {
///     qm_name: "QM1".into(),
///     channel_name: "DEV.APP.SVRCONN".into(),
///     ..ConnectionFactory::default()
/// };
/// let ctx = factory.create_context(&qm)?;
/// assert!(ctx.is_open());
/// # Ok::<(), mqjms::Error>(())
/// ```
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ConnectionFactory {
    /// Queue manager name; empty connects to the default queue manager.
    pub qm_name: String,
    /// Host name or address of the listener.
    pub hostname: String,
    /// Listener port.
    pub port: u16,
    /// Server-connection channel.
    pub channel_name: String,
    /// User id; empty connects without credentials.
    pub user_name: String,
    /// Password for `user_name`.
    #[cfg_attr(feature = "serde", serde(skip_serializing))]
    pub password: String,
    /// Client or bindings connection.
    pub transport_type: TransportType,
    /// TLS cipher spec; empty for a plain channel.
    pub tls_cipher_spec: String,
    /// TLS client-certificate requirement.
    pub tls_client_auth: TlsClientAuth,
    /// Key repository path; empty when TLS keys are not needed.
    pub key_repository: String,
    /// Certificate label within the key repository.
    pub certificate_label: String,
    /// Application name reported to the queue manager.
    pub appl_name: String,
    /// Initial receive buffer size in bytes; `0` uses 32 KiB.
    pub receive_buffer_size: usize,
    /// Asynchronous sends between error checks; `0` disables the checks.
    pub send_check_count: u32,
}

impl Default for ConnectionFactory {
    fn default() -> Self {
        Self {
            qm_name: String::new(),
            hostname: "localhost".to_string(),
            port: crate::DEFAULT_PORT,
            channel_name: String::new(),
            user_name: String::new(),
            password: String::new(),
            transport_type: TransportType::Client,
            tls_cipher_spec: String::new(),
            tls_client_auth: TlsClientAuth::Optional,
            key_repository: String::new(),
            certificate_label: String::new(),
            appl_name: String::new(),
            receive_buffer_size: 0,
            send_check_count: 0,
        }
    }
}

impl fmt::Debug for ConnectionFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionFactory")
            .field("qm_name", &self.qm_name)
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("channel_name", &self.channel_name)
            .field("user_name", &self.user_name)
            .field("password", &"<redacted>")
            .field("transport_type", &self.transport_type)
            .field("tls_cipher_spec", &self.tls_cipher_spec)
            .field("tls_client_auth", &self.tls_client_auth)
            .field("key_repository", &self.key_repository)
            .field("certificate_label", &self.certificate_label)
            .field("appl_name", &self.appl_name)
            .field("receive_buffer_size", &self.receive_buffer_size)
            .field("send_check_count", &self.send_check_count)
            .finish()
    }
}

impl ConnectionFactory {
    /// Read settings from `MQ_*` environment variables.
    ///
    /// See [`from_lookup`](Self::from_lookup) for the variable names.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`, starting from the defaults.
    ///
    /// Recognised keys: `MQ_QMGR`, `MQ_HOST`, `MQ_PORT`, `MQ_CHANNEL`,
    /// `MQ_USER`, `MQ_PASSWORD`, `MQ_APP_NAME`, `MQ_TRANSPORT`,
    /// `MQ_TLS_CIPHER_SPEC`, `MQ_TLS_CLIENT_AUTH`, `MQ_KEY_REPOSITORY`,
    /// `MQ_CERT_LABEL`, `MQ_RECEIVE_BUFFER_SIZE` and `MQ_SEND_CHECK_COUNT`.
    /// Missing keys keep their defaults; malformed values fail with
    /// [`ErrorKind::Config`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut factory = Self::default();
        let strings: [(&str, &mut String); 9] = [
            ("MQ_QMGR", &mut factory.qm_name),
            ("MQ_HOST", &mut factory.hostname),
            ("MQ_CHANNEL", &mut factory.channel_name),
            ("MQ_USER", &mut factory.user_name),
            ("MQ_PASSWORD", &mut factory.password),
            ("MQ_APP_NAME", &mut factory.appl_name),
            ("MQ_TLS_CIPHER_SPEC", &mut factory.tls_cipher_spec),
            ("MQ_KEY_REPOSITORY", &mut factory.key_repository),
            ("MQ_CERT_LABEL", &mut factory.certificate_label),
        ];
        for (key, field) in strings {
            if let Some(value) = lookup(key) {
                *field = value;
            }
        }

        if let Some(value) = lookup("MQ_PORT") {
            factory.port = parse_number("MQ_PORT", &value)?;
        }
        if let Some(value) = lookup("MQ_RECEIVE_BUFFER_SIZE") {
            factory.receive_buffer_size = parse_number("MQ_RECEIVE_BUFFER_SIZE", &value)?;
        }
        if let Some(value) = lookup("MQ_SEND_CHECK_COUNT") {
            factory.send_check_count = parse_number("MQ_SEND_CHECK_COUNT", &value)?;
        }
        if let Some(value) = lookup("MQ_TRANSPORT") {
            factory.transport_type = value.parse()?;
        }
        if let Some(value) = lookup("MQ_TLS_CLIENT_AUTH") {
            factory.tls_client_auth = value.parse()?;
        }
        Ok(factory)
    }

    /// Channel connection name, `host(port)`.
    #[must_use]
    pub fn connection_name(&self) -> String {
        format!("{}({})", self.hostname, self.port)
    }

    /// Connect options describing this factory.
    #[must_use]
    pub fn connect_options(&self) -> ConnectOptions {
        let mut cno = ConnectOptions::default();

        match self.transport_type {
            TransportType::Client => {
                cno.binding = Binding::Client;
                cno.client_conn = Some(ChannelDefinition {
                    channel_name: self.channel_name.clone(),
                    connection_name: self.connection_name(),
                    ssl_cipher_spec: non_empty(&self.tls_cipher_spec),
                    ssl_client_auth: match self.tls_client_auth {
                        TlsClientAuth::Optional => Some(SslClientAuth::Optional),
                        TlsClientAuth::Required => Some(SslClientAuth::Required),
                        TlsClientAuth::None => None,
                    },
                    ..ChannelDefinition::default()
                });
                if !self.key_repository.is_empty() {
                    cno.ssl_config = Some(SslConfig {
                        key_repository: self.key_repository.clone(),
                        certificate_label: non_empty(&self.certificate_label),
                    });
                }
                cno.appl_name.clone_from(&self.appl_name);
            }
            TransportType::Bindings => {
                cno.binding = Binding::Local;
            }
        }

        if !self.user_name.is_empty() {
            cno.security_parms = Some(Credentials {
                user_id: self.user_name.clone(),
                password: self.password.clone(),
            });
        }
        cno
    }

    /// Connect and return an auto-acknowledge context.
    pub fn create_context(&self, connector: &dyn Connector) -> Result<Context> {
        self.create_context_with_options(connector, SessionMode::AutoAcknowledge, &[])
    }

    /// Connect and return a context with the given session mode.
    pub fn create_context_with_session_mode(
        &self,
        connector: &dyn Connector,
        mode: SessionMode,
    ) -> Result<Context> {
        self.create_context_with_options(connector, mode, &[])
    }

    /// Connect with extra connect options applied.
    #[instrument(level = "info", skip(self, connector, options), fields(qmgr = %self.qm_name, transport = ?self.transport_type))]
    pub fn create_context_with_options(
        &self,
        connector: &dyn Connector,
        mode: SessionMode,
        options: &[ConnectOption],
    ) -> Result<Context> {
        let mut cno = self.connect_options();
        for option in options {
            option.apply(&mut cno);
        }

        let session = connector
            .connect(&self.qm_name, &cno)
            .map_err(|err| Error::from_transport(ErrorKind::Connection, err))?;
        debug!(
            connection = %self.connection_name(),
            mode = ?mode,
            send_check_count = self.send_check_count,
            "context created"
        );

        Ok(Context::new(
            session,
            mode,
            self.receive_buffer_size,
            self.send_check_count,
        ))
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::config(format!("{key} must be a number, got '{value}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ReasonCode;
    use crate::transport::memory::QueueManager;
    use std::collections::HashMap;

    #[test]
    fn test_client_connect_options() {
        let factory = ConnectionFactory {
            hostname: "mq.example.com".into(),
            port: 1415,
            channel_name: "DEV.APP.SVRCONN".into(),
            user_name: "app".into(),
            password: "passw0rd".into(),
            tls_cipher_spec: "ANY_TLS12".into(),
            tls_client_auth: TlsClientAuth::Required,
            key_repository: "/var/mqm/key".into(),
            appl_name: "orders".into(),
            ..ConnectionFactory::default()
        };
        let cno = factory.connect_options();
        assert_eq!(cno.binding, Binding::Client);
        let cd = cno.client_conn.unwrap();
        assert_eq!(cd.connection_name, "mq.example.com(1415)");
        assert_eq!(cd.channel_name, "DEV.APP.SVRCONN");
        assert_eq!(cd.ssl_cipher_spec.as_deref(), Some("ANY_TLS12"));
        assert_eq!(cd.ssl_client_auth, Some(SslClientAuth::Required));
        let sco = cno.ssl_config.unwrap();
        assert_eq!(sco.key_repository, "/var/mqm/key");
        assert!(sco.certificate_label.is_none());
        assert_eq!(cno.appl_name, "orders");
        assert_eq!(cno.security_parms.unwrap().user_id, "app");
    }

    #[test]
    fn test_bindings_connect_options() {
        let factory = ConnectionFactory {
            transport_type: TransportType::Bindings,
            appl_name: "ignored".into(),
            ..ConnectionFactory::default()
        };
        let cno = factory.connect_options();
        assert_eq!(cno.binding, Binding::Local);
        assert!(cno.client_conn.is_none());
        assert!(cno.security_parms.is_none());
        assert!(cno.appl_name.is_empty());
    }

    #[test]
    fn test_tls_client_auth_none_leaves_channel_default() {
        let factory = ConnectionFactory {
            tls_client_auth: TlsClientAuth::None,
            ..ConnectionFactory::default()
        };
        let cd = factory.connect_options().client_conn.unwrap();
        assert!(cd.ssl_client_auth.is_none());
    }

    #[test]
    fn test_max_msg_length_option() {
        let qm = QueueManager::new("QM1");
        qm.define_queue("DEV.QUEUE.1");
        let ctx = ConnectionFactory::default()
            .create_context_with_options(
                &qm,
                SessionMode::AutoAcknowledge,
                &[ConnectOption::MaxMsgLength(4)],
            )
            .unwrap();
        let err = ctx
            .create_producer()
            .send_string(&ctx.create_queue("DEV.QUEUE.1"), "too long")
            .unwrap_err();
        assert_eq!(err.reason_code(), Some(ReasonCode::MSG_TOO_BIG_FOR_CHANNEL));
    }

    #[test]
    fn test_connect_failure_translated() {
        let qm = QueueManager::new("QM1");
        let factory = ConnectionFactory {
            qm_name: "QM2".into(),
            ..ConnectionFactory::default()
        };
        let err = factory.create_context(&qm).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connection);
        assert_eq!(err.reason(), "MQRC_Q_MGR_NAME_ERROR");
        assert_eq!(err.error_code(), "2058");
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("MQ_QMGR", "QM1"),
            ("MQ_PORT", "1416"),
            ("MQ_PASSWORD", "secret"),
            ("MQ_TLS_CLIENT_AUTH", "required"),
            ("MQ_SEND_CHECK_COUNT", "10"),
        ]
        .into_iter()
        .collect();
        let factory =
            ConnectionFactory::from_lookup(|key| vars.get(key).map(ToString::to_string)).unwrap();
        assert_eq!(factory.qm_name, "QM1");
        assert_eq!(factory.port, 1416);
        assert_eq!(factory.password, "secret");
        assert_eq!(factory.hostname, "localhost");
        assert_eq!(factory.tls_client_auth, TlsClientAuth::Required);
        assert_eq!(factory.send_check_count, 10);
    }

    #[test]
    fn test_from_lookup_rejects_bad_values() {
        let err = ConnectionFactory::from_lookup(|key| {
            (key == "MQ_PORT").then(|| "not-a-port".to_string())
        })
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);

        let err = ConnectionFactory::from_lookup(|key| {
            (key == "MQ_TLS_CLIENT_AUTH").then(|| "sometimes".to_string())
        })
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_skips_password() {
        let factory = ConnectionFactory {
            qm_name: "QM1".into(),
            password: "hunter2".into(),
            send_check_count: 5,
            ..ConnectionFactory::default()
        };
        let json = serde_json::to_string(&factory).unwrap();
        assert!(!json.contains("hunter2"));

        let restored: ConnectionFactory = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.qm_name, "QM1");
        assert_eq!(restored.send_check_count, 5);
        assert!(restored.password.is_empty());

        let partial: ConnectionFactory =
            serde_json::from_str(r#"{"hostname":"mq1","tls_client_auth":"Required"}"#).unwrap();
        assert_eq!(partial.hostname, "mq1");
        assert_eq!(partial.port, crate::DEFAULT_PORT);
        assert_eq!(partial.tls_client_auth, TlsClientAuth::Required);
    }

    #[test]
    fn test_debug_redacts_password() {
        let factory = ConnectionFactory {
            password: "hunter2".into(),
            ..ConnectionFactory::default()
        };
        assert!(!format!("{factory:?}").contains("hunter2"));
    }
}
