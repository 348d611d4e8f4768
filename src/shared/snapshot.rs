//! Authoritative world-state snapshots and the bounded buffer that holds
//! them (spec.md §3, §4.7).

use crate::shared::history_buffer::HistoryBuffer;
use crate::shared::id::ClientId;
use crate::shared::tick::Tick;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A complete authoritative world state captured at the end of one tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot<W> {
    pub tick: Tick,
    /// Server wall-clock ms when this snapshot was produced.
    pub timestamp: f64,
    pub state: W,
    /// Highest input sequence number processed, per client, as of this
    /// tick. Monotonic per client across successive snapshots (spec.md
    /// §8 invariant 1).
    pub input_acks: IndexMap<ClientId, u32>,
}

/// Result of [`SnapshotBuffer::get_bracketing_snapshots`].
pub struct Bracketing<'a, W> {
    pub from: &'a Snapshot<W>,
    pub to: &'a Snapshot<W>,
    /// `in [0, 1]`, saturating at the endpoints if the query time lies
    /// outside `[from.timestamp, to.timestamp]`.
    pub alpha: f32,
}

/// Bounded FIFO of [`Snapshot`]s, indexed by insertion order. `size() <=
/// historySize` always holds (spec.md §8 invariant 5).
pub struct SnapshotBuffer<W> {
    history: HistoryBuffer<Snapshot<W>>,
}

impl<W> SnapshotBuffer<W> {
    pub fn new(history_size: usize) -> Self {
        Self {
            history: HistoryBuffer::new(history_size),
        }
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.history.capacity()
    }

    /// Append a snapshot, evicting the oldest if at capacity. `tick` must
    /// be strictly increasing across calls (spec.md §3 invariant).
    pub fn add(&mut self, snapshot: Snapshot<W>) {
        self.history.push(snapshot.tick, snapshot);
    }

    pub fn get_at_tick(&self, tick: Tick) -> Option<&Snapshot<W>> {
        self.history.get(tick)
    }

    pub fn get_latest(&self) -> Option<&Snapshot<W>> {
        self.history.most_recent().map(|(_, s)| s)
    }

    pub fn get_range(&self, a: Tick, b: Tick) -> Vec<&Snapshot<W>> {
        self.history.range(a, b).into_iter().map(|(_, s)| s).collect()
    }

    /// Nearest snapshot by absolute time difference.
    pub fn get_at_timestamp(&self, timestamp: f64) -> Option<&Snapshot<W>> {
        self.history
            .iter()
            .min_by(|(_, a), (_, b)| {
                let da = (a.timestamp - timestamp).abs();
                let db = (b.timestamp - timestamp).abs();
                da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(_, s)| s)
    }

    /// Returns the pair of snapshots whose timestamps bracket `t`, with an
    /// interpolation fraction. If `t` is outside the buffered range, both
    /// endpoints collapse to whichever end of the buffer is closer and
    /// `alpha` saturates to 0.0 or 1.0.
    pub fn get_bracketing_snapshots(&self, t: f64) -> Option<Bracketing<'_, W>> {
        let mut iter = self.history.iter();
        let first = iter.next()?;
        let mut prev = first;
        if t <= first.1.timestamp {
            return Some(Bracketing {
                from: &first.1,
                to: &first.1,
                alpha: 0.0,
            });
        }
        for entry in iter {
            if t <= entry.1.timestamp {
                let span = entry.1.timestamp - prev.1.timestamp;
                let alpha = if span > 0.0 {
                    ((t - prev.1.timestamp) / span) as f32
                } else {
                    0.0
                };
                return Some(Bracketing {
                    from: &prev.1,
                    to: &entry.1,
                    alpha: alpha.clamp(0.0, 1.0),
                });
            }
            prev = entry;
        }
        // t is beyond the most recent snapshot.
        Some(Bracketing {
            from: prev.1,
            to: prev.1,
            alpha: 1.0,
        })
    }
}
