//! Queue destinations.

use std::fmt;
use std::sync::Arc;

/// Whether puts to a destination may be asynchronous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PutAsyncAllowed {
    /// Puts are fire-and-forget; failures surface via periodic status checks.
    Enabled,
    /// Puts always complete synchronously.
    Disabled,
    /// Follow the queue's own definition.
    #[default]
    AsDestination,
}

/// An addressable queue.
///
/// Immutable and cheap to clone; share it freely between producers and
/// consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Queue {
    name: Arc<str>,
    put_async_allowed: PutAsyncAllowed,
}

impl Queue {
    /// A queue with the default async-put setting.
    #[must_use]
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            name: Arc::from(name.as_ref()),
            put_async_allowed: PutAsyncAllowed::AsDestination,
        }
    }

    /// Queue name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Async-put setting.
    #[must_use]
    pub fn put_async_allowed(&self) -> PutAsyncAllowed {
        self.put_async_allowed
    }

    /// Copy of this queue with a different async-put setting.
    #[must_use]
    pub fn with_put_async_allowed(&self, value: PutAsyncAllowed) -> Self {
        Self {
            name: Arc::clone(&self.name),
            put_async_allowed: value,
        }
    }

    pub(crate) fn is_async_enabled(&self) -> bool {
        self.put_async_allowed == PutAsyncAllowed::Enabled
    }
}

impl fmt::Display for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "queue:///{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_defaults() {
        let queue = Queue::new("DEV.QUEUE.1");
        assert_eq!(queue.name(), "DEV.QUEUE.1");
        assert_eq!(queue.put_async_allowed(), PutAsyncAllowed::AsDestination);
        assert!(!queue.is_async_enabled());
        assert_eq!(queue.to_string(), "queue:///DEV.QUEUE.1");
    }

    #[test]
    fn test_with_put_async_allowed_leaves_original() {
        let queue = Queue::new("DEV.QUEUE.1");
        let async_queue = queue.with_put_async_allowed(PutAsyncAllowed::Enabled);
        assert!(async_queue.is_async_enabled());
        assert!(!queue.is_async_enabled());
        assert_eq!(async_queue.name(), queue.name());
    }
}
