//! In-process event bus for regeneration events.
//!
//! Emission is fire-and-forget: a dropped receiver never fails a run.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;

use tracing::debug;

use crate::telemetry::events::{EventEnvelope, RegenerationEvent};

#[derive(Clone)]
pub struct EventBus {
    sender: Sender<EventEnvelope>,
    seq: Arc<AtomicU64>,
}

impl EventBus {
    pub fn new_pair() -> (Self, Receiver<EventEnvelope>) {
        let (sender, receiver) = channel();
        (
            Self {
                sender,
                seq: Arc::new(AtomicU64::new(1)),
            },
            receiver,
        )
    }

    pub fn emit(&self, run: &str, event: impl Into<RegenerationEvent>) {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let envelope = EventEnvelope::with_now(run, seq, event.into());
        if self.sender.send(envelope).is_err() {
            debug!(run, seq, "Event receiver dropped; event discarded");
        }
    }
}
