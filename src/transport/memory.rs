//! In-process loopback queue manager.
//!
//! Implements [`Connector`] and [`Session`] over shared in-memory queues so the
//! messaging runtime can run without a real queue manager: units of work,
//! asynchronous put status, browse cursors, selectors, expiry and priority
//! ordering all behave the way the runtime expects from a real one.
//!
//! The queue manager also exposes a small administrative surface (queue
//! definition, inhibiting, one-shot failure injection, call counters) used by
//! tests and demos.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant, SystemTime};

use tracing::{debug, trace};
use uuid::Uuid;

use super::error::TransportError;
use super::reason::{CompletionCode, ReasonCode};
use super::session::{Connector, Session};
use super::structures::{
    AsyncStatus, BrowseCursor, ConnectOptions, GetOptions, ID_LEN, MessageDescriptor,
    MessageHandle, ObjectDescriptor, ObjectHandle, OpenOptions, Persistence, PropertyValue,
    PutOptions, StatType, SyncpointMode,
};

/// Default maximum queue depth.
pub const DEFAULT_MAX_DEPTH: usize = 5000;

/// Transport operations that can be counted and failed on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// MQCONNX
    Connect,
    /// MQOPEN
    Open,
    /// MQCLOSE
    Close,
    /// MQPUT1
    Put1,
    /// MQGET
    Get,
    /// MQCMIT
    Commit,
    /// MQBACK
    Backout,
    /// MQSTAT
    Stat,
    /// MQCRTMH
    CreateMessageHandle,
    /// MQDISC
    Disconnect,
}

impl Operation {
    const fn verb(self) -> &'static str {
        match self {
            Self::Connect => "MQCONNX",
            Self::Open => "MQOPEN",
            Self::Close => "MQCLOSE",
            Self::Put1 => "MQPUT1",
            Self::Get => "MQGET",
            Self::Commit => "MQCMIT",
            Self::Backout => "MQBACK",
            Self::Stat => "MQSTAT",
            Self::CreateMessageHandle => "MQCRTMH",
            Self::Disconnect => "MQDISC",
        }
    }
}

#[derive(Debug, Clone)]
struct StoredMessage {
    seq: u64,
    md: MessageDescriptor,
    properties: BTreeMap<String, PropertyValue>,
    data: Vec<u8>,
    put_at: Instant,
}

impl StoredMessage {
    fn is_expired(&self, now: Instant) -> bool {
        let Ok(tenths) = u64::try_from(self.md.expiry) else {
            return false;
        };
        tenths > 0 && now.duration_since(self.put_at) >= Duration::from_millis(tenths * 100)
    }
}

#[derive(Debug)]
struct LocalQueue {
    max_depth: usize,
    put_inhibited: bool,
    get_inhibited: bool,
    messages: Vec<StoredMessage>,
}

impl LocalQueue {
    fn new(max_depth: usize) -> Self {
        Self {
            max_depth,
            put_inhibited: false,
            get_inhibited: false,
            messages: Vec::new(),
        }
    }

    fn purge_expired(&mut self, now: Instant) {
        self.messages.retain(|msg| !msg.is_expired(now));
    }

    /// Reinsert a message at its original arrival position.
    fn restore(&mut self, message: StoredMessage) {
        let pos = self
            .messages
            .iter()
            .position(|m| m.seq > message.seq)
            .unwrap_or(self.messages.len());
        self.messages.insert(pos, message);
    }
}

#[derive(Debug)]
struct OpenObject {
    queue_name: String,
    options: OpenOptions,
    browse_position: Option<u64>,
}

#[derive(Debug, Default)]
struct UnitOfWork {
    puts: Vec<(String, StoredMessage)>,
    gets: Vec<(String, StoredMessage)>,
    async_failed: bool,
}

impl UnitOfWork {
    fn is_empty(&self) -> bool {
        self.puts.is_empty() && self.gets.is_empty() && !self.async_failed
    }
}

#[derive(Debug)]
struct SessionState {
    appl_name: String,
    max_msg_length: usize,
    objects: HashMap<u32, OpenObject>,
    next_object: u32,
    uow: UnitOfWork,
    async_status: AsyncStatus,
}

#[derive(Debug)]
struct State {
    name: String,
    running: bool,
    credentials: Option<(String, String)>,
    queues: HashMap<String, LocalQueue>,
    sessions: HashMap<u32, SessionState>,
    next_conn: u32,
    next_msg_handle: u64,
    next_seq: u64,
    injected: HashMap<Operation, VecDeque<ReasonCode>>,
    calls: HashMap<Operation, u64>,
}

impl State {
    /// Count the call and pop any injected failure for it.
    fn enter(&mut self, op: Operation) -> Result<(), TransportError> {
        *self.calls.entry(op).or_insert(0) += 1;
        match self.injected.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(reason) => {
                debug!(verb = op.verb(), %reason, "injected failure");
                Err(TransportError::failed(op.verb(), reason))
            }
            None => Ok(()),
        }
    }

    fn session_mut(
        &mut self,
        conn: u32,
        op: Operation,
    ) -> Result<&mut SessionState, TransportError> {
        self.sessions
            .get_mut(&conn)
            .ok_or_else(|| TransportError::failed(op.verb(), ReasonCode::HCONN_ERROR))
    }

    fn queue_mut(&mut self, name: &str, op: Operation) -> Result<&mut LocalQueue, TransportError> {
        self.queues
            .get_mut(name)
            .ok_or_else(|| TransportError::failed(op.verb(), ReasonCode::UNKNOWN_OBJECT_NAME))
    }

    /// Syncpoint puts to `queue_name` not yet committed by any session.
    fn uncommitted_puts(&self, queue_name: &str) -> usize {
        self.sessions
            .values()
            .flat_map(|session| &session.uow.puts)
            .filter(|(name, _)| name == queue_name)
            .count()
    }

    fn back_out(&mut self, conn: u32) {
        let Some(session) = self.sessions.get_mut(&conn) else {
            return;
        };
        let uow = std::mem::take(&mut session.uow);
        if uow.is_empty() {
            return;
        }
        debug!(
            conn,
            discarded_puts = uow.puts.len(),
            restored_gets = uow.gets.len(),
            "backing out unit of work"
        );
        for (queue_name, mut message) in uow.gets.into_iter().rev() {
            if let Some(queue) = self.queues.get_mut(&queue_name) {
                message.md.backout_count += 1;
                queue.restore(message);
            }
        }
    }
}

/// Shared in-process queue manager.
///
/// Cloning yields another handle to the same queue manager.
#[derive(Debug, Clone)]
pub struct QueueManager {
    inner: Arc<Mutex<State>>,
}

impl QueueManager {
    /// Create a running queue manager with no queues.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(State {
                name: name.into(),
                running: true,
                credentials: None,
                queues: HashMap::new(),
                sessions: HashMap::new(),
                next_conn: 1,
                next_msg_handle: 1,
                next_seq: 1,
                injected: HashMap::new(),
                calls: HashMap::new(),
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue-manager name.
    #[must_use]
    pub fn name(&self) -> String {
        self.state().name.clone()
    }

    /// Define a local queue with the default maximum depth.
    pub fn define_queue(&self, name: impl Into<String>) {
        self.define_queue_with_max_depth(name, DEFAULT_MAX_DEPTH);
    }

    /// Define a local queue holding at most `max_depth` messages.
    ///
    /// Redefining an existing queue keeps its messages and updates the depth.
    pub fn define_queue_with_max_depth(&self, name: impl Into<String>, max_depth: usize) {
        let mut state = self.state();
        state
            .queues
            .entry(name.into())
            .and_modify(|q| q.max_depth = max_depth)
            .or_insert_with(|| LocalQueue::new(max_depth));
    }

    /// Inhibit or allow puts to a queue. Returns `false` if the queue is unknown.
    pub fn set_put_inhibited(&self, name: &str, inhibited: bool) -> bool {
        self.state()
            .queues
            .get_mut(name)
            .map(|q| q.put_inhibited = inhibited)
            .is_some()
    }

    /// Inhibit or allow gets from a queue. Returns `false` if the queue is unknown.
    pub fn set_get_inhibited(&self, name: &str, inhibited: bool) -> bool {
        self.state()
            .queues
            .get_mut(name)
            .map(|q| q.get_inhibited = inhibited)
            .is_some()
    }

    /// Committed messages on a queue, expired ones excluded.
    #[must_use]
    pub fn depth(&self, name: &str) -> Option<usize> {
        let mut state = self.state();
        let queue = state.queues.get_mut(name)?;
        queue.purge_expired(Instant::now());
        Some(queue.messages.len())
    }

    /// Require these credentials on connect.
    pub fn set_credentials(&self, user_id: impl Into<String>, password: impl Into<String>) {
        self.state().credentials = Some((user_id.into(), password.into()));
    }

    /// Stop accepting connections.
    pub fn stop(&self) {
        self.state().running = false;
    }

    /// Resume accepting connections.
    pub fn start(&self) {
        self.state().running = true;
    }

    /// Make the next call of `op` fail with `reason`.
    ///
    /// Injections queue up: two injections fail the next two calls.
    pub fn inject_failure(&self, op: Operation, reason: ReasonCode) {
        self.state().injected.entry(op).or_default().push_back(reason);
    }

    /// How many times `op` has been invoked across all sessions.
    #[must_use]
    pub fn call_count(&self, op: Operation) -> u64 {
        self.state().calls.get(&op).copied().unwrap_or(0)
    }

    /// Number of connected sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.state().sessions.len()
    }
}

impl Connector for QueueManager {
    fn connect(
        &self,
        qmgr_name: &str,
        options: &ConnectOptions,
    ) -> Result<Box<dyn Session>, TransportError> {
        let op = Operation::Connect;
        let mut state = self.state();
        state.enter(op)?;

        if !state.running {
            return Err(TransportError::failed(op.verb(), ReasonCode::Q_MGR_NOT_AVAILABLE));
        }
        if !qmgr_name.is_empty() && qmgr_name != state.name {
            return Err(TransportError::failed(op.verb(), ReasonCode::Q_MGR_NAME_ERROR));
        }
        if let Some((user, password)) = &state.credentials {
            let authorized = options
                .security_parms
                .as_ref()
                .is_some_and(|c| &c.user_id == user && &c.password == password);
            if !authorized {
                return Err(TransportError::failed(op.verb(), ReasonCode::NOT_AUTHORIZED));
            }
        }

        let max_msg_length = options
            .client_conn
            .as_ref()
            .map_or(usize::MAX, |cd| cd.max_msg_length as usize);

        let conn = state.next_conn;
        state.next_conn += 1;
        state.sessions.insert(
            conn,
            SessionState {
                appl_name: options.appl_name.clone(),
                max_msg_length,
                objects: HashMap::new(),
                next_object: 1,
                uow: UnitOfWork::default(),
                async_status: AsyncStatus::default(),
            },
        );
        debug!(conn, qmgr = %state.name, binding = ?options.binding, "session connected");

        Ok(Box::new(MemorySession {
            conn,
            shared: Arc::clone(&self.inner),
        }))
    }
}

/// A connection to a [`QueueManager`].
#[derive(Debug)]
pub struct MemorySession {
    conn: u32,
    shared: Arc<Mutex<State>>,
}

impl MemorySession {
    fn state(&self) -> MutexGuard<'_, State> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn generate_msg_id(seq: u64) -> [u8; ID_LEN] {
    let mut id = [0u8; ID_LEN];
    id[..16].copy_from_slice(Uuid::new_v4().as_bytes());
    id[16..].copy_from_slice(&seq.to_be_bytes());
    id
}

impl Session for MemorySession {
    fn open(
        &self,
        od: &ObjectDescriptor,
        options: OpenOptions,
    ) -> Result<ObjectHandle, TransportError> {
        let op = Operation::Open;
        let mut state = self.state();
        state.enter(op)?;
        state.session_mut(self.conn, op)?;
        state.queue_mut(&od.object_name, op)?;

        let session = state.session_mut(self.conn, op)?;
        let handle = session.next_object;
        session.next_object += 1;
        session.objects.insert(
            handle,
            OpenObject {
                queue_name: od.object_name.clone(),
                options,
                browse_position: None,
            },
        );
        trace!(conn = self.conn, handle, queue = %od.object_name, "queue opened");
        Ok(ObjectHandle(handle))
    }

    fn close(&self, handle: ObjectHandle) -> Result<(), TransportError> {
        let op = Operation::Close;
        let mut state = self.state();
        state.enter(op)?;
        let session = state.session_mut(self.conn, op)?;
        session
            .objects
            .remove(&handle.0)
            .map(|_| ())
            .ok_or_else(|| TransportError::failed(op.verb(), ReasonCode::HOBJ_ERROR))
    }

    fn put1(
        &self,
        od: &ObjectDescriptor,
        md: &mut MessageDescriptor,
        pmo: &PutOptions<'_>,
        data: &[u8],
    ) -> Result<(), TransportError> {
        let op = Operation::Put1;
        let mut state = self.state();
        state.enter(op)?;

        let (appl_name, max_msg_length) = {
            let session = state.session_mut(self.conn, op)?;
            (session.appl_name.clone(), session.max_msg_length)
        };
        if data.len() > max_msg_length {
            return Err(TransportError::failed(
                op.verb(),
                ReasonCode::MSG_TOO_BIG_FOR_CHANNEL,
            ));
        }

        let seq = state.next_seq;
        state.next_seq += 1;

        let uncommitted = state.uncommitted_puts(&od.object_name);
        let queue = state.queue_mut(&od.object_name, op)?;
        let rejection = if queue.put_inhibited {
            Some(ReasonCode::PUT_INHIBITED)
        } else if queue.messages.len() + uncommitted >= queue.max_depth {
            Some(ReasonCode::Q_FULL)
        } else {
            None
        };

        if let Some(reason) = rejection {
            if !pmo.async_response {
                return Err(TransportError::failed(op.verb(), reason));
            }
            // Async puts report failures through MQSTAT, not inline.
            let session = state.session_mut(self.conn, op)?;
            let status = &mut session.async_status;
            if status.put_failure_count == 0 && status.put_warning_count == 0 {
                status.comp_code = CompletionCode::Failed;
                status.reason = reason;
                status.object_name = od.object_name.clone();
            }
            status.put_failure_count += 1;
            if pmo.syncpoint == SyncpointMode::Syncpoint {
                session.uow.async_failed = true;
            }
            debug!(conn = self.conn, queue = %od.object_name, %reason, "async put failed");
            return Ok(());
        }

        if pmo.new_msg_id {
            md.msg_id = generate_msg_id(seq);
        }
        md.put_time = Some(SystemTime::now());
        md.put_appl_name = appl_name;
        if md.persistence == Persistence::AsQueueDef {
            md.persistence = Persistence::NotPersistent;
        }
        if md.priority < 0 {
            md.priority = 0;
        }

        let message = StoredMessage {
            seq,
            md: md.clone(),
            properties: pmo
                .original_msg_handle
                .map(|h| h.properties.clone())
                .unwrap_or_default(),
            data: data.to_vec(),
            put_at: Instant::now(),
        };

        let session = state.session_mut(self.conn, op)?;
        if pmo.async_response {
            session.async_status.put_success_count += 1;
        }
        match pmo.syncpoint {
            SyncpointMode::Syncpoint => {
                session.uow.puts.push((od.object_name.clone(), message));
            }
            SyncpointMode::NoSyncpoint => {
                state.queue_mut(&od.object_name, op)?.messages.push(message);
            }
        }
        trace!(conn = self.conn, queue = %od.object_name, len = data.len(), "message put");
        Ok(())
    }

    fn get(
        &self,
        handle: ObjectHandle,
        md: &mut MessageDescriptor,
        gmo: &GetOptions<'_>,
        msg_handle: &mut MessageHandle,
        buffer: &mut Vec<u8>,
    ) -> Result<usize, TransportError> {
        let op = Operation::Get;
        let mut state = self.state();
        state.enter(op)?;

        let (queue_name, options, browse_position) = {
            let session = state.session_mut(self.conn, op)?;
            let object = session
                .objects
                .get(&handle.0)
                .ok_or_else(|| TransportError::failed(op.verb(), ReasonCode::HOBJ_ERROR))?;
            (
                object.queue_name.clone(),
                object.options,
                object.browse_position,
            )
        };

        if gmo.browse.is_some() && !options.browse {
            return Err(TransportError::failed(op.verb(), ReasonCode::NOT_OPEN_FOR_BROWSE));
        }
        if gmo.browse.is_none() && !options.input_as_q_def {
            return Err(TransportError::failed(op.verb(), ReasonCode::NOT_OPEN_FOR_INPUT));
        }

        let queue = state.queue_mut(&queue_name, op)?;
        if gmo.browse.is_none() && queue.get_inhibited {
            return Err(TransportError::failed(op.verb(), ReasonCode::GET_INHIBITED));
        }
        queue.purge_expired(Instant::now());

        let wanted_correl = md.correl_id;
        let eligible = |msg: &StoredMessage| {
            (!gmo.match_correl_id || msg.md.correl_id == wanted_correl)
                && gmo
                    .selector
                    .is_none_or(|selector| selector.matches(&msg.md, &msg.properties))
        };

        let index = match gmo.browse {
            // Browse walks arrival order so the cursor only moves forward.
            Some(cursor) => {
                let after = match cursor {
                    BrowseCursor::First => 0,
                    BrowseCursor::Next => browse_position.unwrap_or(0),
                };
                queue
                    .messages
                    .iter()
                    .position(|msg| msg.seq > after && eligible(msg))
            }
            // Destructive gets deliver highest priority first, FIFO within a priority.
            None => queue
                .messages
                .iter()
                .enumerate()
                .filter(|(_, msg)| eligible(msg))
                .max_by(|(_, a), (_, b)| {
                    a.md.priority.cmp(&b.md.priority).then(b.seq.cmp(&a.seq))
                })
                .map(|(idx, _)| idx),
        };

        let Some(index) = index else {
            return Err(TransportError::failed(op.verb(), ReasonCode::NO_MSG_AVAILABLE));
        };

        let len = queue.messages[index].data.len();
        if len > gmo.max_length {
            return Err(TransportError::truncated(op.verb(), len));
        }

        let message = if gmo.browse.is_some() {
            queue.messages[index].clone()
        } else {
            queue.messages.remove(index)
        };

        *md = message.md.clone();
        msg_handle.properties.clone_from(&message.properties);
        buffer.clear();
        buffer.extend_from_slice(&message.data);

        let session = state.session_mut(self.conn, op)?;
        if gmo.browse.is_some() {
            if let Some(object) = session.objects.get_mut(&handle.0) {
                object.browse_position = Some(message.seq);
            }
        } else if gmo.syncpoint == SyncpointMode::Syncpoint {
            session.uow.gets.push((queue_name, message));
        }
        Ok(len)
    }

    fn commit(&self) -> Result<(), TransportError> {
        let op = Operation::Commit;
        let mut state = self.state();
        if let Err(err) = state.enter(op) {
            state.back_out(self.conn);
            return Err(err);
        }

        let session = state.session_mut(self.conn, op)?;
        if session.uow.async_failed {
            state.back_out(self.conn);
            return Err(TransportError::failed(op.verb(), ReasonCode::BACKED_OUT));
        }

        let uow = std::mem::take(&mut session.uow);
        let committed = uow.puts.len();
        for (queue_name, message) in uow.puts {
            if let Some(queue) = state.queues.get_mut(&queue_name) {
                queue.messages.push(message);
            }
        }
        trace!(conn = self.conn, committed, "unit of work committed");
        Ok(())
    }

    fn backout(&self) -> Result<(), TransportError> {
        let op = Operation::Backout;
        let mut state = self.state();
        state.enter(op)?;
        state.session_mut(self.conn, op)?;
        state.back_out(self.conn);
        Ok(())
    }

    fn stat(&self, kind: StatType) -> Result<AsyncStatus, TransportError> {
        let op = Operation::Stat;
        let mut state = self.state();
        state.enter(op)?;
        let session = state.session_mut(self.conn, op)?;
        match kind {
            StatType::AsyncError => Ok(std::mem::take(&mut session.async_status)),
        }
    }

    fn create_message_handle(&self) -> Result<MessageHandle, TransportError> {
        let op = Operation::CreateMessageHandle;
        let mut state = self.state();
        state.enter(op)?;
        state.session_mut(self.conn, op)?;
        let id = state.next_msg_handle;
        state.next_msg_handle += 1;
        Ok(MessageHandle::new(id))
    }

    fn disconnect(&self) -> Result<(), TransportError> {
        let op = Operation::Disconnect;
        let mut state = self.state();
        state.enter(op)?;
        state.session_mut(self.conn, op)?;
        state.back_out(self.conn);
        state.sessions.remove(&self.conn);
        debug!(conn = self.conn, "session disconnected");
        Ok(())
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        let mut state = self.state();
        if state.sessions.contains_key(&self.conn) {
            debug!(conn = self.conn, "session dropped without disconnect");
            state.back_out(self.conn);
            state.sessions.remove(&self.conn);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::selector::Selector;
    use crate::transport::structures::{Credentials, encode_id};

    fn setup() -> (QueueManager, Box<dyn Session>) {
        let qm = QueueManager::new("QM1");
        qm.define_queue("DEV.QUEUE.1");
        let session = qm.connect("QM1", &ConnectOptions::default()).unwrap();
        (qm, session)
    }

    fn put(session: &dyn Session, data: &[u8], pmo: &PutOptions<'_>) -> MessageDescriptor {
        let mut md = MessageDescriptor::default();
        session
            .put1(&ObjectDescriptor::queue("DEV.QUEUE.1"), &mut md, pmo, data)
            .unwrap();
        md
    }

    fn open_input(session: &dyn Session) -> ObjectHandle {
        session
            .open(
                &ObjectDescriptor::queue("DEV.QUEUE.1"),
                OpenOptions {
                    input_as_q_def: true,
                    ..OpenOptions::default()
                },
            )
            .unwrap()
    }

    fn get(
        session: &dyn Session,
        handle: ObjectHandle,
        gmo: &GetOptions<'_>,
    ) -> Result<Vec<u8>, TransportError> {
        let mut md = MessageDescriptor::default();
        let mut mh = MessageHandle::default();
        let mut buffer = Vec::new();
        session.get(handle, &mut md, gmo, &mut mh, &mut buffer)?;
        Ok(buffer)
    }

    #[test]
    fn test_connect_checks() {
        let qm = QueueManager::new("QM1");
        let err = qm.connect("OTHER", &ConnectOptions::default()).err().expect("connect should fail");
        assert_eq!(err.reason, ReasonCode::Q_MGR_NAME_ERROR);

        qm.set_credentials("app", "passw0rd");
        let err = qm.connect("QM1", &ConnectOptions::default()).err().expect("connect should fail");
        assert_eq!(err.reason, ReasonCode::NOT_AUTHORIZED);

        let options = ConnectOptions {
            security_parms: Some(Credentials {
                user_id: "app".into(),
                password: "passw0rd".into(),
            }),
            ..ConnectOptions::default()
        };
        assert!(qm.connect("QM1", &options).is_ok());

        qm.stop();
        let err = qm.connect("QM1", &options).err().expect("connect should fail");
        assert_eq!(err.reason, ReasonCode::Q_MGR_NOT_AVAILABLE);
        assert_eq!(qm.call_count(Operation::Connect), 4);
    }

    #[test]
    fn test_put_get_fifo_and_ids() {
        let (qm, session) = setup();
        let pmo = PutOptions {
            new_msg_id: true,
            ..PutOptions::default()
        };
        let first = put(session.as_ref(), b"one", &pmo);
        let second = put(session.as_ref(), b"two", &pmo);
        assert_ne!(first.msg_id, second.msg_id);
        assert!(first.put_time.is_some());
        assert_eq!(qm.depth("DEV.QUEUE.1"), Some(2));

        let handle = open_input(session.as_ref());
        let gmo = GetOptions::default();
        assert_eq!(get(session.as_ref(), handle, &gmo).unwrap(), b"one");
        assert_eq!(get(session.as_ref(), handle, &gmo).unwrap(), b"two");
        let err = get(session.as_ref(), handle, &gmo).unwrap_err();
        assert!(err.is_no_message());
    }

    #[test]
    fn test_priority_ordering() {
        let (_qm, session) = setup();
        let od = ObjectDescriptor::queue("DEV.QUEUE.1");
        for (body, priority) in [(&b"low"[..], 1), (b"high", 8), (b"mid", 4)] {
            let mut md = MessageDescriptor {
                priority,
                ..MessageDescriptor::default()
            };
            session
                .put1(&od, &mut md, &PutOptions::default(), body)
                .unwrap();
        }
        let handle = open_input(session.as_ref());
        let gmo = GetOptions::default();
        assert_eq!(get(session.as_ref(), handle, &gmo).unwrap(), b"high");
        assert_eq!(get(session.as_ref(), handle, &gmo).unwrap(), b"mid");
        assert_eq!(get(session.as_ref(), handle, &gmo).unwrap(), b"low");
    }

    #[test]
    fn test_syncpoint_put_visible_after_commit() {
        let (qm, session) = setup();
        let pmo = PutOptions {
            syncpoint: SyncpointMode::Syncpoint,
            ..PutOptions::default()
        };
        put(session.as_ref(), b"pending", &pmo);
        assert_eq!(qm.depth("DEV.QUEUE.1"), Some(0));
        session.commit().unwrap();
        assert_eq!(qm.depth("DEV.QUEUE.1"), Some(1));
    }

    #[test]
    fn test_backout_restores_gets_and_discards_puts() {
        let (qm, session) = setup();
        put(session.as_ref(), b"kept", &PutOptions::default());

        let handle = open_input(session.as_ref());
        let gmo = GetOptions {
            syncpoint: SyncpointMode::Syncpoint,
            ..GetOptions::default()
        };
        assert_eq!(get(session.as_ref(), handle, &gmo).unwrap(), b"kept");
        put(
            session.as_ref(),
            b"discarded",
            &PutOptions {
                syncpoint: SyncpointMode::Syncpoint,
                ..PutOptions::default()
            },
        );
        assert_eq!(qm.depth("DEV.QUEUE.1"), Some(0));

        session.backout().unwrap();
        assert_eq!(qm.depth("DEV.QUEUE.1"), Some(1));

        let mut md = MessageDescriptor::default();
        let mut mh = MessageHandle::default();
        let mut buffer = Vec::new();
        session
            .get(handle, &mut md, &GetOptions::default(), &mut mh, &mut buffer)
            .unwrap();
        assert_eq!(buffer, b"kept");
        assert_eq!(md.backout_count, 1);
    }

    #[test]
    fn test_async_put_failure_reported_by_stat() {
        let (qm, session) = setup();
        qm.set_put_inhibited("DEV.QUEUE.1", true);
        let pmo = PutOptions {
            async_response: true,
            ..PutOptions::default()
        };
        put(session.as_ref(), b"lost", &pmo);
        put(session.as_ref(), b"lost", &pmo);

        let status = session.stat(StatType::AsyncError).unwrap();
        assert_eq!(status.put_failure_count, 2);
        assert_eq!(status.reason, ReasonCode::PUT_INHIBITED);
        assert_eq!(status.comp_code, CompletionCode::Failed);
        assert_eq!(status.object_name, "DEV.QUEUE.1");

        // Counters reset after each query.
        let status = session.stat(StatType::AsyncError).unwrap();
        assert!(!status.has_problems());
    }

    #[test]
    fn test_sync_put_failure_is_immediate() {
        let (qm, session) = setup();
        qm.define_queue_with_max_depth("DEV.QUEUE.1", 1);
        put(session.as_ref(), b"fits", &PutOptions::default());
        let mut md = MessageDescriptor::default();
        let err = session
            .put1(
                &ObjectDescriptor::queue("DEV.QUEUE.1"),
                &mut md,
                &PutOptions::default(),
                b"overflow",
            )
            .unwrap_err();
        assert_eq!(err.reason, ReasonCode::Q_FULL);

        let err = session
            .put1(
                &ObjectDescriptor::queue("NO.SUCH.QUEUE"),
                &mut md,
                &PutOptions::default(),
                b"x",
            )
            .unwrap_err();
        assert_eq!(err.reason, ReasonCode::UNKNOWN_OBJECT_NAME);
    }

    #[test]
    fn test_uncommitted_puts_count_towards_max_depth() {
        let (qm, session) = setup();
        qm.define_queue_with_max_depth("DEV.QUEUE.1", 2);
        let other = qm.connect("QM1", &ConnectOptions::default()).unwrap();
        let syncpoint = PutOptions {
            syncpoint: SyncpointMode::Syncpoint,
            ..PutOptions::default()
        };
        put(session.as_ref(), b"first", &syncpoint);
        put(other.as_ref(), b"second", &syncpoint);
        assert_eq!(qm.depth("DEV.QUEUE.1"), Some(0));

        let mut md = MessageDescriptor::default();
        let err = session
            .put1(
                &ObjectDescriptor::queue("DEV.QUEUE.1"),
                &mut md,
                &PutOptions::default(),
                b"third",
            )
            .unwrap_err();
        assert_eq!(err.reason, ReasonCode::Q_FULL);

        // Backing out frees the slot.
        other.backout().unwrap();
        put(session.as_ref(), b"third", &PutOptions::default());
        session.commit().unwrap();
        assert_eq!(qm.depth("DEV.QUEUE.1"), Some(2));
    }

    #[test]
    fn test_commit_backs_out_after_transacted_async_failure() {
        let (qm, session) = setup();
        qm.define_queue("DEV.QUEUE.2");
        qm.set_put_inhibited("DEV.QUEUE.2", true);

        put(
            session.as_ref(),
            b"good",
            &PutOptions {
                syncpoint: SyncpointMode::Syncpoint,
                ..PutOptions::default()
            },
        );
        let mut md = MessageDescriptor::default();
        session
            .put1(
                &ObjectDescriptor::queue("DEV.QUEUE.2"),
                &mut md,
                &PutOptions {
                    syncpoint: SyncpointMode::Syncpoint,
                    async_response: true,
                    ..PutOptions::default()
                },
                b"bad",
            )
            .unwrap();

        let err = session.commit().unwrap_err();
        assert_eq!(err.reason, ReasonCode::BACKED_OUT);
        assert_eq!(qm.depth("DEV.QUEUE.1"), Some(0));
    }

    #[test]
    fn test_browse_is_non_destructive() {
        let (qm, session) = setup();
        put(session.as_ref(), b"a", &PutOptions::default());
        put(session.as_ref(), b"b", &PutOptions::default());

        let handle = session
            .open(
                &ObjectDescriptor::queue("DEV.QUEUE.1"),
                OpenOptions {
                    browse: true,
                    ..OpenOptions::default()
                },
            )
            .unwrap();
        let first = GetOptions {
            browse: Some(BrowseCursor::First),
            ..GetOptions::default()
        };
        let next = GetOptions {
            browse: Some(BrowseCursor::Next),
            ..GetOptions::default()
        };
        assert_eq!(get(session.as_ref(), handle, &first).unwrap(), b"a");
        assert_eq!(get(session.as_ref(), handle, &next).unwrap(), b"b");
        assert!(get(session.as_ref(), handle, &next).unwrap_err().is_no_message());
        assert_eq!(qm.depth("DEV.QUEUE.1"), Some(2));

        let err = get(session.as_ref(), handle, &GetOptions::default()).unwrap_err();
        assert_eq!(err.reason, ReasonCode::NOT_OPEN_FOR_INPUT);
    }

    #[test]
    fn test_selector_and_correlation_matching() {
        let (_qm, session) = setup();
        let od = ObjectDescriptor::queue("DEV.QUEUE.1");
        for id in ["first", "second"] {
            let mut md = MessageDescriptor {
                correl_id: encode_id(id),
                ..MessageDescriptor::default()
            };
            session
                .put1(&od, &mut md, &PutOptions::default(), id.as_bytes())
                .unwrap();
        }
        let handle = open_input(session.as_ref());

        let selector = Selector::parse("JMSCorrelationID = 'second'").unwrap();
        let gmo = GetOptions {
            selector: Some(&selector),
            ..GetOptions::default()
        };
        assert_eq!(get(session.as_ref(), handle, &gmo).unwrap(), b"second");

        let mut md = MessageDescriptor {
            correl_id: encode_id("first"),
            ..MessageDescriptor::default()
        };
        let mut mh = MessageHandle::default();
        let mut buffer = Vec::new();
        let gmo = GetOptions {
            match_correl_id: true,
            ..GetOptions::default()
        };
        session
            .get(handle, &mut md, &gmo, &mut mh, &mut buffer)
            .unwrap();
        assert_eq!(buffer, b"first");
    }

    #[test]
    fn test_truncation_leaves_message_on_queue() {
        let (qm, session) = setup();
        put(session.as_ref(), &[7u8; 64], &PutOptions::default());
        let handle = open_input(session.as_ref());
        let gmo = GetOptions {
            max_length: 16,
            ..GetOptions::default()
        };
        let err = get(session.as_ref(), handle, &gmo).unwrap_err();
        assert_eq!(err.reason, ReasonCode::TRUNCATED_MSG_FAILED);
        assert_eq!(err.data_length, Some(64));
        assert_eq!(qm.depth("DEV.QUEUE.1"), Some(1));
    }

    #[test]
    fn test_expired_messages_are_not_delivered() {
        let (qm, session) = setup();
        let od = ObjectDescriptor::queue("DEV.QUEUE.1");
        let mut md = MessageDescriptor {
            expiry: 1,
            ..MessageDescriptor::default()
        };
        session
            .put1(&od, &mut md, &PutOptions::default(), b"short-lived")
            .unwrap();
        std::thread::sleep(Duration::from_millis(150));
        assert_eq!(qm.depth("DEV.QUEUE.1"), Some(0));
    }

    #[test]
    fn test_injected_failure_and_disconnect() {
        let (qm, session) = setup();
        qm.inject_failure(Operation::Stat, ReasonCode::CONNECTION_BROKEN);
        let err = session.stat(StatType::AsyncError).unwrap_err();
        assert_eq!(err.reason, ReasonCode::CONNECTION_BROKEN);
        assert!(session.stat(StatType::AsyncError).is_ok());

        assert_eq!(qm.session_count(), 1);
        session.disconnect().unwrap();
        assert_eq!(qm.session_count(), 0);
        let err = session.disconnect().unwrap_err();
        assert_eq!(err.reason, ReasonCode::HCONN_ERROR);
    }

    #[test]
    fn test_message_properties_travel_with_message() {
        let (_qm, session) = setup();
        let mut handle = session.create_message_handle().unwrap();
        handle
            .properties
            .insert("Region".into(), PropertyValue::String("EMEA".into()));
        let pmo = PutOptions {
            original_msg_handle: Some(&handle),
            ..PutOptions::default()
        };
        put(session.as_ref(), b"with props", &pmo);

        let input = open_input(session.as_ref());
        let mut md = MessageDescriptor::default();
        let mut received = MessageHandle::default();
        let mut buffer = Vec::new();
        session
            .get(input, &mut md, &GetOptions::default(), &mut received, &mut buffer)
            .unwrap();
        assert_eq!(
            received.properties.get("Region"),
            Some(&PropertyValue::String("EMEA".into()))
        );
    }
}
