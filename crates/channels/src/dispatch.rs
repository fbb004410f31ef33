//! Event fan-out.
//!
//! Each registered sink gets its own bounded queue drained by its own
//! worker task, so one slow or failing sink can never apply backpressure
//! to the session event loops feeding the dispatcher. Overflow degrades by
//! dropping the oldest pending event for that sink only.

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
};

use {
    tokio::sync::Notify,
    tokio_util::sync::CancellationToken,
    tracing::{debug, warn},
};

use {
    crate::sink::{EventSink, PersistenceSink, SinkScope},
    chatbridge_canonical::{CanonicalEvent, CanonicalMessageEnvelope},
};

/// Bounded drop-oldest queue feeding one sink worker.
struct SinkQueue {
    pending: Mutex<VecDeque<CanonicalEvent>>,
    notify: Notify,
    capacity: usize,
    dropped: AtomicU64,
}

impl SinkQueue {
    fn new(capacity: usize) -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            capacity: capacity.max(1),
            dropped: AtomicU64::new(0),
        }
    }

    /// Enqueue, evicting the oldest pending event when full.
    fn push(&self, event: CanonicalEvent) -> bool {
        let evicted = {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            let evicted = if pending.len() >= self.capacity {
                pending.pop_front().is_some()
            } else {
                false
            };
            pending.push_back(event);
            evicted
        };
        if evicted {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        self.notify.notify_one();
        evicted
    }

    fn pop(&self) -> Option<CanonicalEvent> {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.pop_front()
    }

    fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

struct SinkEntry {
    name: String,
    scope: SinkScope,
    queue: Arc<SinkQueue>,
}

/// Fans canonical events out to registered sinks and envelopes out to
/// persistence, isolating every sink failure from the event source.
pub struct Dispatcher {
    sinks: Vec<SinkEntry>,
    persistence: Vec<Arc<dyn PersistenceSink>>,
    queue_capacity: usize,
    cancel: CancellationToken,
}

impl Dispatcher {
    #[must_use]
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            sinks: Vec::new(),
            persistence: Vec::new(),
            queue_capacity,
            cancel: CancellationToken::new(),
        }
    }

    /// Register an event sink and spawn its worker task.
    pub fn add_sink(&mut self, sink: Arc<dyn EventSink>) {
        let queue = Arc::new(SinkQueue::new(self.queue_capacity));
        self.sinks.push(SinkEntry {
            name: sink.name().to_string(),
            scope: sink.scope(),
            queue: Arc::clone(&queue),
        });
        tokio::spawn(run_sink_worker(sink, queue, self.cancel.clone()));
    }

    /// Register a best-effort persistence collaborator.
    pub fn add_persistence(&mut self, sink: Arc<dyn PersistenceSink>) {
        self.persistence.push(sink);
    }

    /// Queue `event` for every applicable sink. Never blocks and never
    /// fails: sink trouble surfaces in the workers, not here.
    pub fn publish(&self, event: &CanonicalEvent) {
        for entry in &self.sinks {
            if event.integration_originated && entry.scope == SinkScope::Notification {
                debug!(
                    sink = %entry.name,
                    instance = %event.instance,
                    "skipping notification sink for integration-originated event"
                );
                continue;
            }
            if entry.queue.push(event.clone()) {
                warn!(
                    sink = %entry.name,
                    total_dropped = entry.queue.dropped(),
                    "sink queue full, dropped oldest pending event"
                );
            }
        }
    }

    /// Hand `envelope` to every persistence collaborator, off the caller's
    /// task. Failures are logged and swallowed.
    pub fn persist(&self, instance: &str, envelope: &CanonicalMessageEnvelope) {
        for sink in &self.persistence {
            let sink = Arc::clone(sink);
            let instance = instance.to_string();
            let envelope = envelope.clone();
            tokio::spawn(async move {
                if let Err(e) = sink.store(&instance, &envelope).await {
                    warn!(instance, error = %e, "persistence sink store failed");
                }
            });
        }
    }

    /// Stop all idle sink workers. Queued events not yet picked up are
    /// abandoned.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl Drop for Dispatcher {
    /// Workers park on their queue's `Notify` and would otherwise outlive
    /// the dispatcher.
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_sink_worker(
    sink: Arc<dyn EventSink>,
    queue: Arc<SinkQueue>,
    cancel: CancellationToken,
) {
    debug!(sink = sink.name(), "sink worker started");
    loop {
        match queue.pop() {
            Some(event) => {
                if let Err(e) = sink.deliver(&event).await {
                    warn!(
                        sink = sink.name(),
                        instance = %event.instance,
                        event = ?event.event_type(),
                        error = %e,
                        "sink delivery failed"
                    );
                }
            },
            None => {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = queue.notify.notified() => {},
                }
            },
        }
    }
    debug!(sink = sink.name(), "sink worker stopped");
}
