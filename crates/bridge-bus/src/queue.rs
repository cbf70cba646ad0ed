//! # Resilience Queue
//!
//! Buffers outbound events while the broker is unreachable.
//!
//! One FIFO lane per source system. Entries carry a sequence number so the
//! drain can pick the lane whose head was enqueued first. The queue has no
//! lock of its own: it is owned by the transport and only touched inside the
//! transport's critical section.

use bridge_types::{EventEnvelope, SystemId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

/// A buffered envelope.
#[derive(Debug, Clone)]
pub struct QueuedEvent {
    pub envelope: Arc<EventEnvelope>,
    pub enqueued_at: DateTime<Utc>,
    seq: i64,
}

/// Summary of one queued entry, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedEntryInfo {
    pub event_id: String,
    pub source: SystemId,
    pub enqueued_at: DateTime<Utc>,
}

/// Per-source FIFO buffer. Unbounded.
#[derive(Debug, Default)]
pub struct ResilienceQueue {
    lanes: BTreeMap<SystemId, VecDeque<QueuedEvent>>,
    next_back: i64,
    next_front: i64,
    len: usize,
}

impl ResilienceQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an envelope to its source lane. Never fails.
    ///
    /// Returns the total depth after the append.
    pub fn enqueue(&mut self, envelope: Arc<EventEnvelope>) -> usize {
        let seq = self.next_back;
        self.next_back += 1;
        self.lanes
            .entry(envelope.source)
            .or_default()
            .push_back(QueuedEvent {
                envelope,
                enqueued_at: Utc::now(),
                seq,
            });
        self.len += 1;
        self.len
    }

    /// Put an envelope back at the head of its lane, ahead of everything
    /// queued so far.
    pub fn requeue_front(&mut self, envelope: Arc<EventEnvelope>) -> usize {
        self.next_front -= 1;
        let seq = self.next_front;
        self.lanes
            .entry(envelope.source)
            .or_default()
            .push_front(QueuedEvent {
                envelope,
                enqueued_at: Utc::now(),
                seq,
            });
        self.len += 1;
        self.len
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Depth of a single source lane.
    #[must_use]
    pub fn depth_for(&self, source: SystemId) -> usize {
        self.lanes.get(&source).map_or(0, VecDeque::len)
    }

    /// Source whose head entry was enqueued first.
    #[must_use]
    pub fn oldest_source(&self) -> Option<SystemId> {
        self.lanes
            .iter()
            .filter_map(|(source, lane)| lane.front().map(|head| (head.seq, *source)))
            .min()
            .map(|(_, source)| source)
    }

    /// Next entry to forward during a drain.
    ///
    /// Continues with `lane` while it has entries, then moves to the lane
    /// with the oldest head. The entry stays queued until
    /// [`remove_front`](Self::remove_front) confirms it was forwarded.
    #[must_use]
    pub fn next_in_drain_order(&self, lane: Option<SystemId>) -> Option<Arc<EventEnvelope>> {
        let source = lane
            .filter(|source| self.depth_for(*source) > 0)
            .or_else(|| self.oldest_source())?;
        self.lanes
            .get(&source)
            .and_then(VecDeque::front)
            .map(|entry| Arc::clone(&entry.envelope))
    }

    /// Remove the head of `source` if it is still the entry with `id`.
    pub fn remove_front(&mut self, source: SystemId, id: uuid::Uuid) -> bool {
        let Some(lane) = self.lanes.get_mut(&source) else {
            return false;
        };
        if lane.front().map(|entry| entry.envelope.id) != Some(id) {
            return false;
        }
        lane.pop_front();
        if lane.is_empty() {
            self.lanes.remove(&source);
        }
        self.len -= 1;
        true
    }

    /// Discard everything. Returns the number of entries dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.len;
        self.lanes.clear();
        self.len = 0;
        dropped
    }

    /// Entries in drain order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<QueuedEntryInfo> {
        let mut lanes: Vec<_> = self
            .lanes
            .iter()
            .filter_map(|(source, lane)| lane.front().map(|head| (head.seq, *source, lane)))
            .collect();
        lanes.sort_by_key(|(seq, source, _)| (*seq, *source));

        lanes
            .into_iter()
            .flat_map(|(_, source, lane)| {
                lane.iter().map(move |entry| QueuedEntryInfo {
                    event_id: entry.envelope.id.to_string(),
                    source,
                    enqueued_at: entry.enqueued_at,
                })
            })
            .collect()
    }
}
