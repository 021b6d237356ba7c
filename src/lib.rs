//! mqjms - JMS-style messaging client runtime over a queue-manager transport
//!
//! This library layers contexts, producers, consumers, browsers and
//! text/bytes messages over a small queue-manager transport boundary. The
//! transport's descriptors and options stay behind a stable object model.
//!
//! # Quick Start
//!
//! ```rust
//! use mqjms::{ConnectionFactory, ReceivePolicy};
//! use mqjms::transport::memory::QueueManager;
//!
//! // In-process queue manager standing in for a real one
//! let qm = QueueManager::new("QM1");
//! qm.define_queue("DEV.QUEUE.1");
//!
//! let factory = ConnectionFactory {
//!     qm_name: "QM1".into(),
//!     ..ConnectionFactory::default()
//! };
//! let mut ctx = factory.create_context(&qm)?;
//! let queue = ctx.create_queue("DEV.QUEUE.1");
//!
//! ctx.create_producer().send_string(&queue, "Hello, queue!")?;
//!
//! let consumer = ctx.create_consumer(&queue)?;
//! let msg = consumer.receive_with(&ReceivePolicy::default())?;
//! assert_eq!(msg.as_text().and_then(|m| m.text()), Some("Hello, queue!"));
//!
//! drop(consumer);
//! ctx.close()?;
//! # Ok::<(), mqjms::Error>(())
//! ```
//!
//! # Features
//!
//! - **Asynchronous put verification** - periodic status checks surface
//!   fire-and-forget put failures
//! - **Transactions** - commit reconciles failed asynchronous puts
//! - **Selectors** - parsed eagerly, evaluated by the queue manager
//! - **Pluggable transport** - implement [`transport::Connector`] and
//!   [`transport::Session`] for a real queue manager
//! - **`serde` feature** - (de)serialize connection settings

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod client;
pub mod transport;

pub use client::{
    Browser, BytesMessage, CancelToken, ConnectOption, ConnectionFactory, Consumer, Context,
    DeliveryMode, Error, ErrorKind, Message, Producer, PutAsyncAllowed, Queue, ReceivePolicy,
    Result, SessionMode, TextMessage, TlsClientAuth, TransportType,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default queue-manager listener port
pub const DEFAULT_PORT: u16 = 1414;
