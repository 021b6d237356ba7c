//! Bounded polling for receives.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tracing::trace;

use super::error::{Error, Result};

/// Attempts made by [`ReceivePolicy::default`].
pub const DEFAULT_RECEIVE_ATTEMPTS: u32 = 100;

/// Pause between attempts made by [`ReceivePolicy::default`].
pub const DEFAULT_RECEIVE_INTERVAL: Duration = Duration::from_millis(10);

/// Shared flag that stops a receive loop from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A token that has not been cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop every loop watching this token.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether [`cancel`](Self::cancel) has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// How long a receive keeps polling for a message.
///
/// Each attempt is a single no-wait get; the loop sleeps `interval` between
/// attempts and gives up after `attempts` tries, at `deadline`, or when
/// `cancel` fires, whichever comes first.
#[derive(Debug, Clone)]
pub struct ReceivePolicy {
    /// Number of gets to try.
    pub attempts: u32,
    /// Sleep between gets.
    pub interval: Duration,
    /// Absolute time after which the loop stops.
    pub deadline: Option<Instant>,
    /// Token that stops the loop early.
    pub cancel: Option<CancelToken>,
}

impl Default for ReceivePolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_RECEIVE_ATTEMPTS,
            interval: DEFAULT_RECEIVE_INTERVAL,
            deadline: None,
            cancel: None,
        }
    }
}

impl ReceivePolicy {
    /// Policy with the given attempt count and interval.
    #[must_use]
    pub fn new(attempts: u32, interval: Duration) -> Self {
        Self {
            attempts,
            interval,
            ..Self::default()
        }
    }

    /// Stop polling once `timeout` has elapsed from now.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// Stop polling at `deadline`.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Stop polling when `token` is cancelled.
    #[must_use]
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// A cancelled token fails with `Cancelled`; a passed deadline ends the
    /// loop the same way running out of attempts does.
    fn interrupted(&self) -> Option<Error> {
        if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            return Some(Error::cancelled("Receive cancelled"));
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            trace!("receive deadline elapsed");
            return Some(Error::no_message_received());
        }
        None
    }

    /// Call `attempt` until it yields a value, fails, or the policy runs out.
    pub(crate) fn poll<T>(&self, mut attempt: impl FnMut() -> Result<Option<T>>) -> Result<T> {
        for n in 0..self.attempts {
            if let Some(err) = self.interrupted() {
                return Err(err);
            }
            if let Some(value) = attempt()? {
                trace!(attempt = n + 1, "receive satisfied");
                return Ok(value);
            }
            if n + 1 < self.attempts {
                let pause = match self.deadline {
                    Some(deadline) => self
                        .interval
                        .min(deadline.saturating_duration_since(Instant::now())),
                    None => self.interval,
                };
                thread::sleep(pause);
            }
        }
        Err(Error::no_message_received())
    }
}
