//! Messaging context: one session to a queue manager.

use std::cell::Cell;
use std::fmt;

use bytes::Bytes;
use tracing::{debug, instrument, trace, warn};

use super::consumer::{Browser, Consumer};
use super::destination::Queue;
use super::error::{Error, ErrorKind, Result};
use super::message::{BytesMessage, TextMessage};
use super::producer::Producer;
use crate::transport::{
    MessageHandle, ObjectDescriptor, ObjectHandle, OpenOptions, ReasonCode, Selector, Session,
    StatType, TransportError,
};

/// Receive buffer used when none is configured.
pub const DEFAULT_RECEIVE_BUFFER_SIZE: usize = 32 * 1024;

/// Acknowledgement mode of a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SessionMode {
    /// Every send and receive completes on its own.
    #[default]
    AutoAcknowledge,
    /// Sends and receives are grouped until [`Context::commit`] or
    /// [`Context::rollback`].
    Transacted,
}

/// Bookkeeping for asynchronous put verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SendCheckState {
    /// Asynchronous sends left before the next status query.
    Countdown(u32),
    /// A persistent asynchronous send happened inside the open transaction.
    TransactedPending,
}

impl Default for SendCheckState {
    fn default() -> Self {
        Self::Countdown(1)
    }
}

/// One logical session to a queue manager.
///
/// Created by a [`ConnectionFactory`](super::ConnectionFactory). Producers,
/// consumers and browsers borrow the context, so it must outlive them and
/// can only be closed once they are gone.
///
/// A context is not `Sync`: use one context per concurrently sending thread.
pub struct Context {
    session: Option<Box<dyn Session>>,
    session_mode: SessionMode,
    receive_buffer_size: usize,
    send_check_count: u32,
    send_check: Cell<SendCheckState>,
}

impl Context {
    pub(crate) fn new(
        session: Box<dyn Session>,
        session_mode: SessionMode,
        receive_buffer_size: usize,
        send_check_count: u32,
    ) -> Self {
        Self {
            session: Some(session),
            session_mode,
            receive_buffer_size: if receive_buffer_size == 0 {
                DEFAULT_RECEIVE_BUFFER_SIZE
            } else {
                receive_buffer_size
            },
            send_check_count,
            send_check: Cell::new(SendCheckState::default()),
        }
    }

    /// Acknowledgement mode.
    #[must_use]
    pub fn session_mode(&self) -> SessionMode {
        self.session_mode
    }

    /// Whether sends and receives are grouped into transactions.
    #[must_use]
    pub fn is_transacted(&self) -> bool {
        self.session_mode == SessionMode::Transacted
    }

    /// Whether the context still holds a session.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// Initial buffer size for receives.
    #[must_use]
    pub fn receive_buffer_size(&self) -> usize {
        self.receive_buffer_size
    }

    /// Number of asynchronous sends between status queries; `0` disables
    /// the queries.
    #[must_use]
    pub fn send_check_count(&self) -> u32 {
        self.send_check_count
    }

    /// Queue with the given name. No queue-manager call is made.
    #[must_use]
    pub fn create_queue(&self, name: &str) -> Queue {
        Queue::new(name)
    }

    /// Producer with persistent delivery, default priority and no expiry.
    #[must_use]
    pub fn create_producer(&self) -> Producer<'_> {
        Producer::new(self)
    }

    /// Consumer that removes messages from `dest`.
    pub fn create_consumer(&self, dest: &Queue) -> Result<Consumer<'_>> {
        self.create_consumer_inner(dest, None)
    }

    /// Consumer that only receives messages matching `selector`.
    ///
    /// The selector is checked before anything is opened; a malformed
    /// selector fails with [`ErrorKind::InvalidSelector`].
    pub fn create_consumer_with_selector(
        &self,
        dest: &Queue,
        selector: &str,
    ) -> Result<Consumer<'_>> {
        let selector = parse_selector(selector)?;
        self.create_consumer_inner(dest, selector)
    }

    fn create_consumer_inner(
        &self,
        dest: &Queue,
        selector: Option<Selector>,
    ) -> Result<Consumer<'_>> {
        let options = OpenOptions {
            input_as_q_def: true,
            fail_if_quiescing: true,
            ..OpenOptions::default()
        };
        let handle = self.open(dest, options)?;
        debug!(queue = dest.name(), selector = ?selector.as_ref().map(Selector::as_str), "consumer created");
        Ok(Consumer::new(self, dest.clone(), handle, selector))
    }

    /// Browser that reads messages from `dest` without removing them.
    pub fn create_browser(&self, dest: &Queue) -> Result<Browser<'_>> {
        self.create_browser_inner(dest, None)
    }

    /// Browser that only sees messages matching `selector`.
    pub fn create_browser_with_selector(
        &self,
        dest: &Queue,
        selector: &str,
    ) -> Result<Browser<'_>> {
        let selector = parse_selector(selector)?;
        self.create_browser_inner(dest, selector)
    }

    fn create_browser_inner(&self, dest: &Queue, selector: Option<Selector>) -> Result<Browser<'_>> {
        let options = OpenOptions {
            browse: true,
            fail_if_quiescing: true,
            ..OpenOptions::default()
        };
        let handle = self.open(dest, options)?;
        debug!(queue = dest.name(), "browser created");
        Ok(Browser::new(self, dest.clone(), handle, selector))
    }

    fn open(&self, dest: &Queue, options: OpenOptions) -> Result<ObjectHandle> {
        self.session(ErrorKind::Connection, "MQOPEN")?
            .open(&ObjectDescriptor::queue(dest.name()), options)
            .map_err(|err| Error::from_transport(ErrorKind::Connection, err))
    }

    /// Empty text message.
    pub fn create_text_message(&self) -> Result<TextMessage> {
        Ok(TextMessage::new(self.message_handle()?, None))
    }

    /// Text message with the given body.
    pub fn create_text_message_with_string(&self, text: impl Into<String>) -> Result<TextMessage> {
        Ok(TextMessage::new(self.message_handle()?, Some(text.into())))
    }

    /// Empty bytes message.
    pub fn create_bytes_message(&self) -> Result<BytesMessage> {
        Ok(BytesMessage::new(self.message_handle()?, None))
    }

    /// Bytes message with the given body.
    pub fn create_bytes_message_with_bytes(&self, body: impl Into<Bytes>) -> Result<BytesMessage> {
        Ok(BytesMessage::new(self.message_handle()?, Some(body.into())))
    }

    fn message_handle(&self) -> Result<MessageHandle> {
        self.session(ErrorKind::MessageHandle, "MQCRTMH")?
            .create_message_handle()
            .map_err(|err| Error::from_transport(ErrorKind::MessageHandle, err))
    }

    /// Commit the current transaction.
    ///
    /// If the commit fails after persistent asynchronous sends, the
    /// queue manager is asked why: recorded put failures are linked to the
    /// returned error. Does nothing on a closed context.
    #[instrument(level = "debug", skip(self))]
    pub fn commit(&self) -> Result<()> {
        let Some(session) = self.session.as_deref() else {
            return Ok(());
        };
        let pending = self.send_check.get() == SendCheckState::TransactedPending;
        let result = session.commit();
        self.reset_transaction_state();

        let Err(commit_err) = result else {
            return Ok(());
        };
        if !pending {
            return Err(Error::from_transport(ErrorKind::Transaction, commit_err));
        }

        match session.stat(StatType::AsyncError) {
            Err(stat_err) => Err(Error::new(
                ErrorKind::Transaction,
                stat_err.reason.name(),
                stat_err.reason.value().to_string(),
            )
            .with_linked(commit_err)),
            Ok(status) if status.has_problems() => Err(Error::new(
                ErrorKind::Transaction,
                commit_err.reason.name(),
                commit_err.reason.value().to_string(),
            )
            .with_linked(Error::async_put_failure(&status))),
            Ok(_) => Err(Error::from_transport(ErrorKind::Transaction, commit_err)),
        }
    }

    /// Roll back the current transaction. Does nothing on a closed context.
    #[instrument(level = "debug", skip(self))]
    pub fn rollback(&self) -> Result<()> {
        let Some(session) = self.session.as_deref() else {
            return Ok(());
        };
        let result = session.backout();
        self.reset_transaction_state();
        result.map_err(|err| Error::from_transport(ErrorKind::Transaction, err))
    }

    /// Roll back any open transaction and disconnect.
    ///
    /// Rollback failures are logged and do not prevent the disconnect.
    /// Closing an already closed context does nothing.
    #[instrument(level = "debug", skip(self))]
    pub fn close(&mut self) -> Result<()> {
        if let Err(err) = self.rollback() {
            warn!(error = %err, "rollback failed while closing context");
        }
        let Some(session) = self.session.take() else {
            return Ok(());
        };
        session
            .disconnect()
            .map_err(|err| Error::from_transport(ErrorKind::Connection, err))
    }

    pub(crate) fn session(&self, kind: ErrorKind, verb: &'static str) -> Result<&dyn Session> {
        self.session.as_deref().ok_or_else(|| {
            Error::from_transport(kind, TransportError::failed(verb, ReasonCode::HCONN_ERROR))
        })
    }

    /// Count one non-transacted asynchronous send; true when a status query
    /// is due.
    pub(crate) fn async_check_due(&self) -> bool {
        if self.send_check_count == 0 {
            return false;
        }
        let remaining = match self.send_check.get() {
            SendCheckState::Countdown(n) => n.saturating_sub(1),
            SendCheckState::TransactedPending => 0,
        };
        if remaining == 0 {
            self.send_check
                .set(SendCheckState::Countdown(self.send_check_count));
            trace!(interval = self.send_check_count, "async put check due");
            true
        } else {
            self.send_check.set(SendCheckState::Countdown(remaining));
            false
        }
    }

    /// Query asynchronous put status and turn recorded problems into an error.
    pub(crate) fn check_async_status(&self, kind: ErrorKind) -> Result<()> {
        let status = self
            .session(kind, "MQSTAT")?
            .stat(StatType::AsyncError)
            .map_err(|err| Error::from_transport(kind, err))?;
        if status.has_problems() {
            debug!(
                failures = status.put_failure_count,
                warnings = status.put_warning_count,
                reason = %status.reason,
                "asynchronous puts reported problems"
            );
            return Err(Error::async_put_failure(&status));
        }
        Ok(())
    }

    pub(crate) fn mark_transacted_async_put(&self) {
        if self.send_check.get() != SendCheckState::TransactedPending {
            trace!("transacted async put pending");
            self.send_check.set(SendCheckState::TransactedPending);
        }
    }

    fn reset_transaction_state(&self) {
        if self.send_check.get() == SendCheckState::TransactedPending {
            self.send_check.set(SendCheckState::default());
        }
    }

    #[cfg(test)]
    pub(crate) fn send_check_state(&self) -> SendCheckState {
        self.send_check.get()
    }
}

/// An unconnected context: every transaction call is a no-op and every
/// queue-manager call fails with `MQRC_HCONN_ERROR`.
impl Default for Context {
    fn default() -> Self {
        Self {
            session: None,
            session_mode: SessionMode::AutoAcknowledge,
            receive_buffer_size: DEFAULT_RECEIVE_BUFFER_SIZE,
            send_check_count: 0,
            send_check: Cell::new(SendCheckState::default()),
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("open", &self.is_open())
            .field("session_mode", &self.session_mode)
            .field("receive_buffer_size", &self.receive_buffer_size)
            .field("send_check_count", &self.send_check_count)
            .field("send_check", &self.send_check.get())
            .finish()
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        if self.is_open() {
            if let Err(err) = self.close() {
                debug!(error = %err, "disconnect failed while dropping context");
            }
        }
    }
}

fn parse_selector(text: &str) -> Result<Option<Selector>> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    Selector::parse(text).map(Some).map_err(Error::invalid_selector)
}
