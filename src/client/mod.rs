//! Messaging runtime: contexts, producers, consumers and messages.

mod consumer;
mod context;
mod destination;
mod error;
mod factory;
mod message;
mod producer;
mod receive;

pub use consumer::{Browser, Consumer};
pub use context::{Context, DEFAULT_RECEIVE_BUFFER_SIZE, SessionMode};
pub use destination::{PutAsyncAllowed, Queue};
pub use error::{
    ASYNC_PUT_FAILURE_CODE, CANCELLED_CODE, Error, ErrorKind, INVALID_SELECTOR_CODE, LinkedError,
    NO_MESSAGE_RECEIVED_CODE, Result,
};
pub use factory::{ConnectOption, ConnectionFactory, TlsClientAuth, TransportType};
pub use message::{BytesMessage, Message, TextMessage};
pub use producer::{DEFAULT_PRIORITY, DeliveryMode, MAX_PRIORITY, Producer};
pub use receive::{
    CancelToken, DEFAULT_RECEIVE_ATTEMPTS, DEFAULT_RECEIVE_INTERVAL, ReceivePolicy,
};
