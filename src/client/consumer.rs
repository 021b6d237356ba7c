//! Consumers and browsers.

use std::cell::Cell;

use bytes::Bytes;
use tracing::{debug, instrument, warn};

use super::context::Context;
use super::destination::Queue;
use super::error::{Error, ErrorKind, Result};
use super::message::Message;
use super::receive::ReceivePolicy;
use crate::transport::{
    BrowseCursor, GetOptions, MessageDescriptor, MessageHandle, ObjectHandle, ReasonCode,
    Selector, SyncpointMode, TransportError,
};

/// Open queue plus the selector applied to every get.
#[derive(Debug)]
struct Reader<'ctx> {
    ctx: &'ctx Context,
    queue: Queue,
    handle: Option<ObjectHandle>,
    selector: Option<Selector>,
}

impl Reader<'_> {
    fn get(&self, browse: Option<BrowseCursor>) -> Result<Option<Message>> {
        let Some(handle) = self.handle else {
            return Err(Error::from_transport(
                ErrorKind::Receive,
                TransportError::failed("MQGET", ReasonCode::HOBJ_ERROR),
            ));
        };
        let session = self.ctx.session(ErrorKind::Receive, "MQGET")?;

        let mut md = MessageDescriptor::default();
        let mut gmo = GetOptions {
            syncpoint: if browse.is_none() && self.ctx.is_transacted() {
                SyncpointMode::Syncpoint
            } else {
                SyncpointMode::NoSyncpoint
            },
            browse,
            selector: self.selector.as_ref(),
            max_length: self.ctx.receive_buffer_size(),
            ..GetOptions::default()
        };
        if let Some(correl_id) = self.selector.as_ref().and_then(Selector::correlation_id) {
            md.correl_id = correl_id;
            gmo.match_correl_id = true;
        }

        let mut handle_props = MessageHandle::default();
        let mut buffer = Vec::with_capacity(gmo.max_length.min(4096));
        let mut result = session.get(handle, &mut md, &gmo, &mut handle_props, &mut buffer);

        let retry_len = match &result {
            Err(err) if err.reason == ReasonCode::TRUNCATED_MSG_FAILED => err.data_length,
            _ => None,
        };
        if let Some(len) = retry_len {
            debug!(len, buffer = gmo.max_length, "receive buffer too small, retrying");
            gmo.max_length = len;
            buffer.reserve(len);
            result = session.get(handle, &mut md, &gmo, &mut handle_props, &mut buffer);
        }

        match result {
            Ok(len) => {
                buffer.truncate(len);
                Ok(Some(Message::from_received(md, handle_props, buffer)))
            }
            Err(err) if err.is_no_message() => Ok(None),
            Err(err) => Err(Error::from_transport(ErrorKind::Receive, err)),
        }
    }

    fn close(&mut self) -> Result<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        self.ctx
            .session(ErrorKind::Connection, "MQCLOSE")?
            .close(handle)
            .map_err(|err| Error::from_transport(ErrorKind::Connection, err))
    }
}

impl Drop for Reader<'_> {
    fn drop(&mut self) {
        if self.handle.is_some() && self.ctx.is_open() {
            if let Err(err) = self.close() {
                warn!(queue = self.queue.name(), error = %err, "failed to close queue");
            }
        }
    }
}

fn string_body(msg: Message) -> String {
    match msg {
        Message::Text(msg) => msg.text.unwrap_or_default(),
        Message::Bytes(msg) => msg
            .body
            .map(|body| String::from_utf8_lossy(&body).into_owned())
            .unwrap_or_default(),
    }
}

fn bytes_body(msg: &Message) -> Bytes {
    msg.body_bytes()
}

/// Removes messages from a queue.
///
/// In a transacted context received messages stay part of the open
/// transaction and return to the queue on rollback.
#[derive(Debug)]
pub struct Consumer<'ctx> {
    reader: Reader<'ctx>,
}

impl<'ctx> Consumer<'ctx> {
    pub(crate) fn new(
        ctx: &'ctx Context,
        queue: Queue,
        handle: ObjectHandle,
        selector: Option<Selector>,
    ) -> Self {
        Self {
            reader: Reader {
                ctx,
                queue,
                handle: Some(handle),
                selector,
            },
        }
    }

    /// Queue this consumer reads from.
    #[must_use]
    pub fn queue(&self) -> &Queue {
        &self.reader.queue
    }

    /// Selector text, if one was given.
    #[must_use]
    pub fn message_selector(&self) -> Option<&str> {
        self.reader.selector.as_ref().map(Selector::as_str)
    }

    /// Take the next available message without waiting.
    #[instrument(level = "trace", skip(self), fields(queue = %self.reader.queue.name()))]
    pub fn receive_no_wait(&self) -> Result<Option<Message>> {
        self.reader.get(None)
    }

    /// Body of the next message as text. Bytes bodies are decoded as UTF-8,
    /// replacing invalid sequences.
    pub fn receive_string_body_no_wait(&self) -> Result<Option<String>> {
        Ok(self.receive_no_wait()?.map(string_body))
    }

    /// Body of the next message as bytes. Text bodies are UTF-8 encoded.
    pub fn receive_bytes_body_no_wait(&self) -> Result<Option<Bytes>> {
        Ok(self.receive_no_wait()?.as_ref().map(bytes_body))
    }

    /// Poll for a message according to `policy`.
    #[instrument(level = "debug", skip(self, policy), fields(queue = %self.reader.queue.name(), attempts = policy.attempts))]
    pub fn receive_with(&self, policy: &ReceivePolicy) -> Result<Message> {
        policy.poll(|| self.receive_no_wait())
    }

    /// Poll for a message body as bytes according to `policy`.
    pub fn receive_bytes_body_with(&self, policy: &ReceivePolicy) -> Result<Bytes> {
        policy.poll(|| self.receive_bytes_body_no_wait())
    }

    /// Close the queue. Closing twice does nothing.
    pub fn close(&mut self) -> Result<()> {
        self.reader.close()
    }
}

/// Reads messages from a queue without removing them.
///
/// The first receive starts at the oldest message; each later receive moves
/// past the one returned before.
#[derive(Debug)]
pub struct Browser<'ctx> {
    reader: Reader<'ctx>,
    started: Cell<bool>,
}

impl<'ctx> Browser<'ctx> {
    pub(crate) fn new(
        ctx: &'ctx Context,
        queue: Queue,
        handle: ObjectHandle,
        selector: Option<Selector>,
    ) -> Self {
        Self {
            reader: Reader {
                ctx,
                queue,
                handle: Some(handle),
                selector,
            },
            started: Cell::new(false),
        }
    }

    /// Queue this browser reads from.
    #[must_use]
    pub fn queue(&self) -> &Queue {
        &self.reader.queue
    }

    /// Selector text, if one was given.
    #[must_use]
    pub fn message_selector(&self) -> Option<&str> {
        self.reader.selector.as_ref().map(Selector::as_str)
    }

    /// Browse the next message without waiting.
    #[instrument(level = "trace", skip(self), fields(queue = %self.reader.queue.name()))]
    pub fn receive_no_wait(&self) -> Result<Option<Message>> {
        let cursor = if self.started.get() {
            BrowseCursor::Next
        } else {
            BrowseCursor::First
        };
        let msg = self.reader.get(Some(cursor))?;
        if msg.is_some() {
            self.started.set(true);
        }
        Ok(msg)
    }

    /// Poll for the next message according to `policy`.
    pub fn receive_with(&self, policy: &ReceivePolicy) -> Result<Message> {
        policy.poll(|| self.receive_no_wait())
    }

    /// Close the queue. Closing twice does nothing.
    pub fn close(&mut self) -> Result<()> {
        self.reader.close()
    }
}

impl Iterator for Browser<'_> {
    type Item = Result<Message>;

    fn next(&mut self) -> Option<Self::Item> {
        self.receive_no_wait().transpose()
    }
}
