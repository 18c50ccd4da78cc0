//! Where committed changes are announced.

use std::sync::{Arc, Mutex, MutexGuard};

use super::DomainEvent;

/// Receives [`DomainEvent`]s once the ledger store has accepted a write.
///
/// Services call `emit` while still holding the holding's write lock, so an
/// implementation must hand the event off and return. Dropping an event is
/// allowed; the committed ledger is the source of truth.
pub trait DomainEventSink: Send + Sync {
    fn emit(&self, event: DomainEvent);

    /// Emits the events of one commit in order.
    fn emit_batch(&self, events: Vec<DomainEvent>) {
        for event in events {
            self.emit(event);
        }
    }
}

/// Discards every event.
#[derive(Clone, Default)]
pub struct NoOpDomainEventSink;

impl DomainEventSink for NoOpDomainEventSink {
    fn emit(&self, _event: DomainEvent) {}
}

/// Records events for assertions. Clones share one buffer.
#[derive(Clone, Default)]
pub struct MockDomainEventSink {
    events: Arc<Mutex<Vec<DomainEvent>>>,
}

impl MockDomainEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything recorded so far, oldest first.
    pub fn events(&self) -> Vec<DomainEvent> {
        self.buffer().clone()
    }

    /// Drains the buffer, returning what it held.
    pub fn take(&self) -> Vec<DomainEvent> {
        std::mem::take(&mut *self.buffer())
    }

    pub fn is_empty(&self) -> bool {
        self.buffer().is_empty()
    }

    fn buffer(&self) -> MutexGuard<'_, Vec<DomainEvent>> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl DomainEventSink for MockDomainEventSink {
    fn emit(&self, event: DomainEvent) {
        self.buffer().push(event);
    }
}
