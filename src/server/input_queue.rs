//! Server-side per-client input and action queues (spec.md §4.3).

use crate::shared::id::ClientId;
use indexmap::IndexMap;
use std::collections::VecDeque;
use tracing::{debug, trace};

/// A single input message received from a client.
#[derive(Debug, Clone)]
pub struct InputMessage<I> {
    pub seq: u32,
    pub input: I,
    pub timestamp: f64,
}

/// Per-client list ordered by `seq`, tolerant of out-of-order arrival
/// (inserted-sorted enqueue) and duplicate/stale delivery (spec.md §4.3).
pub struct InputQueue<I> {
    per_client: IndexMap<ClientId, VecDeque<InputMessage<I>>>,
}

impl<I> Default for InputQueue<I> {
    fn default() -> Self {
        Self {
            per_client: IndexMap::new(),
        }
    }
}

impl<I> InputQueue<I> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `msg` in seq order; ignored if `msg.seq` is already queued
    /// (duplicate) for this client.
    pub fn enqueue(&mut self, client: ClientId, msg: InputMessage<I>) {
        let queue = self.per_client.entry(client.clone()).or_default();
        if queue.iter().any(|m| m.seq == msg.seq) {
            debug!(%client, seq = msg.seq, "dropping duplicate input seq");
            return;
        }
        let pos = queue.partition_point(|m| m.seq < msg.seq);
        queue.insert(pos, msg);
    }

    /// Copy of every client's pending inputs, in seq order.
    pub fn get_all_pending_inputs_batched(&self) -> IndexMap<ClientId, Vec<InputMessage<I>>>
    where
        I: Clone,
    {
        self.per_client
            .iter()
            .map(|(c, q)| (c.clone(), q.iter().cloned().collect()))
            .collect()
    }

    /// Drop every input with `seq <= last_processed_seq` for `client`
    /// (spec.md §4.3 invariant: after a tick completes, every acked input
    /// has been dropped).
    pub fn acknowledge(&mut self, client: &ClientId, last_processed_seq: u32) {
        if let Some(queue) = self.per_client.get_mut(client) {
            while matches!(queue.front(), Some(m) if m.seq <= last_processed_seq) {
                queue.pop_front();
            }
        }
    }

    pub fn remove_client(&mut self, client: &ClientId) {
        self.per_client.shift_remove(client);
    }

    pub fn pending_len(&self, client: &ClientId) -> usize {
        self.per_client.get(client).map_or(0, |q| q.len())
    }
}

/// Per-client dedup queue for discrete actions, keyed by `(clientId, seq)`
/// with a bounded history window (spec.md §3 "Actions deduplicate by
/// `(clientId, seq)` with a bounded history window").
pub struct ActionQueue {
    seen: IndexMap<ClientId, VecDeque<u32>>,
    history_window: usize,
}

impl ActionQueue {
    pub fn new(history_window: usize) -> Self {
        Self {
            seen: IndexMap::new(),
            history_window,
        }
    }

    /// Returns `true` (and records the seq) if this `(client, seq)` pair
    /// has not been seen before; `false` (silently) if it is a duplicate.
    pub fn try_accept(&mut self, client: &ClientId, seq: u32) -> bool {
        let seen = self.seen.entry(client.clone()).or_default();
        if seen.contains(&seq) {
            trace!(%client, seq, "dropping duplicate action");
            return false;
        }
        if seen.len() >= self.history_window {
            seen.pop_front();
        }
        seen.push_back(seq);
        true
    }

    pub fn remove_client(&mut self, client: &ClientId) {
        self.seen.shift_remove(client);
    }
}
