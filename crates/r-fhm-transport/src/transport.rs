//! ---
//! fhm_section: "02-messaging-ipc-data-model"
//! fhm_subsection: "module"
//! fhm_type: "source"
//! fhm_scope: "code"
//! fhm_description: "Broadcast payload model and transport backends."
//! fhm_version: "v0.0.0-prealpha"
//! fhm_owner: "tbd"
//! ---
use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use r_fhm_common::config::TransportConfig;

use crate::types::{Published, ReducedSample};
use crate::Result;

/// Transport abstraction used by all broadcast backends.
pub trait Transport: Send + Sync {
    /// Publish a reduced payload under the given topic.
    fn publish(&self, topic: &str, payload: ReducedSample) -> Result<()>;
    /// Human-readable transport name for logging/metrics.
    fn name(&self) -> &'static str;
}

/// In-memory transport backed by a bounded, mutex protected queue.
///
/// When the queue is full the oldest entry is evicted, so an
/// unconsumed bus stays bounded while always holding the freshest
/// payloads.
#[derive(Clone)]
pub struct InMemoryTransport {
    queue: Arc<Mutex<VecDeque<Published>>>,
    capacity: usize,
}

impl InMemoryTransport {
    /// Create an in-memory transport holding at most `capacity` payloads.
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: Arc::new(Mutex::new(VecDeque::with_capacity(capacity.min(64)))),
            capacity: capacity.max(1),
        }
    }

    /// Pop the oldest payload from the queue, if any.
    pub fn recv(&self) -> Option<Published> {
        self.queue.lock().pop_front()
    }

    /// Number of payloads currently queued.
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Whether the queue holds no payloads.
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

impl Transport for InMemoryTransport {
    fn publish(&self, topic: &str, payload: ReducedSample) -> Result<()> {
        let mut guard = self.queue.lock();
        if guard.len() >= self.capacity {
            guard.pop_front();
            trace!(topic, capacity = self.capacity, "queue full, evicted oldest payload");
        }
        guard.push_back(Published::new(topic, payload));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "in_memory"
    }
}

/// Transport that discards every payload, for deployments without a bus.
pub struct NoopTransport;

impl Transport for NoopTransport {
    fn publish(&self, topic: &str, _payload: ReducedSample) -> Result<()> {
        trace!(topic, "payload discarded by noop transport");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}

/// Build the transport selected by configuration.
pub fn build_transport(config: &TransportConfig) -> Arc<dyn Transport> {
    if config.in_memory_enabled {
        Arc::new(InMemoryTransport::new(config.queue_capacity))
    } else {
        Arc::new(NoopTransport)
    }
}
