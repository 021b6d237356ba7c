//! Request/response load loop against the in-process queue manager.
//!
//! Run with `cargo run --example loopback` (optionally set
//! `MQJMS_DEMO_ITERS` for the number of round trips, and any `MQ_*`
//! connection variable understood by `ConnectionFactory::from_env`).
//!
//! Each iteration writes a bytes message to the request queue, a responder
//! thread echoes it to the reply queue, and the main thread polls the reply
//! queue with the default receive policy.

use std::env;
use std::thread;
use std::time::{Duration, Instant};

use mqjms::transport::memory::QueueManager;
use mqjms::{CancelToken, ConnectionFactory, Context, ErrorKind, ReceivePolicy};

const DEFAULT_ITERATIONS: usize = 1_000;
const REQUEST_QUEUE: &str = "DEV.QUEUE.IN";
const REPLY_QUEUE: &str = "DEV.QUEUE.OUT";

fn main() -> mqjms::Result<()> {
    let iterations = iterations_from_env();
    let factory = ConnectionFactory::from_env()?;

    let qm = QueueManager::new(if factory.qm_name.is_empty() {
        "QM1"
    } else {
        factory.qm_name.as_str()
    });
    qm.define_queue(REQUEST_QUEUE);
    qm.define_queue(REPLY_QUEUE);
    if !factory.user_name.is_empty() {
        qm.set_credentials(factory.user_name.clone(), factory.password.clone());
    }

    println!("mqjms loopback demo - iterations: {iterations}");
    println!("-----------------------------------------------------------------");

    let stop = CancelToken::new();
    let responder = {
        let qm = qm.clone();
        let factory = factory.clone();
        let stop = stop.clone();
        thread::spawn(move || respond(&qm, &factory, &stop))
    };

    let mut ctx = factory.create_context(&qm)?;
    let elapsed = run(&ctx, iterations)?;
    ctx.close()?;

    stop.cancel();
    match responder.join() {
        Ok(result) => result?,
        Err(_) => println!("responder thread panicked"),
    }

    let per_trip = elapsed / u32::try_from(iterations.max(1)).unwrap_or(u32::MAX);
    println!("{iterations} round trips in {elapsed:?} ({per_trip:?} per trip)");
    Ok(())
}

fn run(ctx: &Context, iterations: usize) -> mqjms::Result<Duration> {
    let requests = ctx.create_queue(REQUEST_QUEUE);
    let producer = ctx.create_producer();
    let consumer = ctx.create_consumer(&ctx.create_queue(REPLY_QUEUE))?;
    let policy = ReceivePolicy::default();

    let started = Instant::now();
    for n in 0..iterations {
        producer.send_bytes(&requests, format!("body {n}").as_bytes())?;
        consumer.receive_bytes_body_with(&policy)?;
    }
    Ok(started.elapsed())
}

fn respond(qm: &QueueManager, factory: &ConnectionFactory, stop: &CancelToken) -> mqjms::Result<()> {
    let ctx = factory.create_context(qm)?;
    let replies = ctx.create_queue(REPLY_QUEUE);
    let producer = ctx.create_producer();
    let consumer = ctx.create_consumer(&ctx.create_queue(REQUEST_QUEUE))?;
    let policy = ReceivePolicy::new(u32::MAX, Duration::from_millis(1)).with_cancel(stop.clone());

    loop {
        match consumer.receive_bytes_body_with(&policy) {
            Ok(body) => producer.send_bytes(&replies, &body)?,
            Err(err) if err.kind() == ErrorKind::Cancelled => return Ok(()),
            Err(err) => return Err(err),
        }
    }
}

fn iterations_from_env() -> usize {
    env::var("MQJMS_DEMO_ITERS")
        .ok()
        .and_then(|raw| raw.parse::<usize>().ok())
        .filter(|iters| *iters > 0)
        .unwrap_or(DEFAULT_ITERATIONS)
}
