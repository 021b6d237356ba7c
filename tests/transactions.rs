use mqjms::transport::ReasonCode;
use mqjms::transport::memory::{Operation, QueueManager};
use mqjms::{
    ConnectionFactory, Context, DeliveryMode, ErrorKind, PutAsyncAllowed, Queue, SessionMode,
};

const QUEUE: &str = "DEV.QUEUE.1";

fn setup() -> (QueueManager, Context, Queue) {
    let qm = QueueManager::new("QM1");
    qm.define_queue(QUEUE);
    let ctx = ConnectionFactory {
        send_check_count: 5,
        ..ConnectionFactory::default()
    }
    .create_context_with_session_mode(&qm, SessionMode::Transacted)
    .expect("context");
    let queue = ctx
        .create_queue(QUEUE)
        .with_put_async_allowed(PutAsyncAllowed::Enabled);
    (qm, ctx, queue)
}

#[test]
fn sends_visible_only_after_commit() {
    let (qm, ctx, queue) = setup();
    assert!(ctx.is_transacted());
    let producer = ctx.create_producer();
    producer.send_string(&queue, "one").expect("send");
    producer.send_string(&queue, "two").expect("send");
    assert_eq!(qm.depth(QUEUE), Some(0));

    ctx.commit().expect("commit");
    assert_eq!(qm.depth(QUEUE), Some(2));
    // Transacted async sends never query status at send time.
    assert_eq!(qm.call_count(Operation::Stat), 0);
}

#[test]
fn rollback_discards_sends() {
    let (qm, ctx, queue) = setup();
    ctx.create_producer()
        .send_string(&queue, "discarded")
        .expect("send");
    ctx.rollback().expect("rollback");
    ctx.commit().expect("empty commit");
    assert_eq!(qm.depth(QUEUE), Some(0));
}

#[test]
fn commit_reports_failed_persistent_async_puts() {
    let (qm, ctx, queue) = setup();
    qm.set_put_inhibited(QUEUE, true);
    ctx.create_producer()
        .send_string(&queue, "lost")
        .expect("async send");

    let err = ctx.commit().expect_err("commit backed out");
    assert_eq!(err.kind(), ErrorKind::Transaction);
    assert_eq!(err.reason(), "MQRC_BACKED_OUT");
    assert_eq!(err.error_code(), "2003");

    let linked = err.linked_error().expect("async put failure linked");
    assert_eq!(linked.kind(), ErrorKind::AsyncPutFailure);
    assert_eq!(
        linked.reason(),
        "1 failures and 0 warnings for asynchronous message put"
    );
    assert_eq!(
        linked.linked_error().map(mqjms::Error::reason),
        Some("MQRC_PUT_INHIBITED")
    );
    assert_eq!(qm.call_count(Operation::Stat), 1);

    // The pending flag does not survive the commit attempt.
    qm.set_put_inhibited(QUEUE, false);
    qm.inject_failure(Operation::Commit, ReasonCode::BACKED_OUT);
    let err = ctx.commit().expect_err("injected");
    assert!(err.linked_error().is_none());
    assert_eq!(qm.call_count(Operation::Stat), 1);
}

#[test]
fn non_persistent_transacted_async_puts_are_not_verified() {
    let (qm, ctx, queue) = setup();
    qm.set_put_inhibited(QUEUE, true);
    let mut producer = ctx.create_producer();
    producer.set_delivery_mode(DeliveryMode::NonPersistent);
    producer.send_string(&queue, "lost").expect("async send");

    let err = ctx.commit().expect_err("commit backed out");
    assert_eq!(err.reason_code(), Some(ReasonCode::BACKED_OUT));
    assert!(err.linked_error().is_none());
    assert_eq!(qm.call_count(Operation::Stat), 0);
}

#[test]
fn commit_failure_with_clean_status_keeps_commit_error() {
    let (qm, ctx, queue) = setup();
    ctx.create_producer().send_string(&queue, "ok").expect("send");
    qm.inject_failure(Operation::Commit, ReasonCode::CONNECTION_BROKEN);

    let err = ctx.commit().expect_err("injected");
    assert_eq!(err.reason(), "MQRC_CONNECTION_BROKEN");
    assert_eq!(err.reason_code(), Some(ReasonCode::CONNECTION_BROKEN));
    assert_eq!(qm.call_count(Operation::Stat), 1);
}

#[test]
fn rollback_failure_is_transaction_error() {
    let (qm, ctx, _) = setup();
    qm.inject_failure(Operation::Backout, ReasonCode::CONNECTION_BROKEN);
    let err = ctx.rollback().expect_err("injected");
    assert_eq!(err.kind(), ErrorKind::Transaction);
    assert_eq!(err.error_code(), "2009");
}

#[test]
fn close_rolls_back_then_disconnects_once() {
    let (qm, mut ctx, queue) = setup();
    ctx.create_producer()
        .send_string(&queue, "uncommitted")
        .expect("send");

    qm.inject_failure(Operation::Backout, ReasonCode::CONNECTION_BROKEN);
    ctx.close().expect("rollback failure does not block disconnect");
    assert!(!ctx.is_open());
    assert_eq!(qm.session_count(), 0);
    assert_eq!(qm.depth(QUEUE), Some(0));

    ctx.close().expect("second close");
    ctx.commit().expect("commit after close");
    ctx.rollback().expect("rollback after close");
    assert_eq!(qm.call_count(Operation::Disconnect), 1);
}

#[test]
fn never_connected_context_closes_cleanly() {
    let mut ctx = Context::default();
    ctx.close().expect("close");
    ctx.close().expect("close again");

    let err = ctx
        .create_producer()
        .send_string(&ctx.create_queue(QUEUE), "x")
        .expect_err("no session");
    assert_eq!(err.reason_code(), Some(ReasonCode::HCONN_ERROR));
}
