//! Renders remote entities in the past (`now - interpolationDelay`) by
//! blending bracketing snapshots (spec.md §4.7).
//!
//! Grounded on `lightyear/src/client/interpolation/interpolate.rs`'s
//! `InterpolateStatus` (`start`/`end`/`current_overstep`), adapted to a
//! whole-world bracketing buffer rather than per-component status.

use crate::shared::game::Simulation;
use crate::shared::snapshot::{Snapshot, SnapshotBuffer};
use crate::shared::tick::Tick;
use tracing::debug;

/// A small bounded ring of the most recent snapshots received from the
/// server, used to interpolate remote entity state at a render time
/// that lags the server by `interpolationDelayMs`.
pub struct Interpolator<W> {
    buffer: SnapshotBuffer<W>,
    last_tick: Option<Tick>,
}

impl<W> Interpolator<W> {
    /// `capacity` is typically small (the engine's default is 20 — far
    /// less than the server's full `snapshot_history_size`, since the
    /// interpolator only ever looks a couple of snapshots into the past).
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: SnapshotBuffer::new(capacity),
            last_tick: None,
        }
    }

    /// Feed in a freshly-received snapshot. Snapshots with `tick <=` the
    /// most recently accepted tick are discarded (resolved Open Question:
    /// the Interpolator always discards non-monotonic snapshots rather
    /// than attempting to reorder them).
    pub fn push(&mut self, snapshot: Snapshot<W>) -> bool {
        if let Some(last) = self.last_tick {
            if snapshot.tick <= last {
                debug!(tick = ?snapshot.tick, last = ?last, "discarding non-monotonic snapshot");
                return false;
            }
        }
        self.last_tick = Some(snapshot.tick);
        self.buffer.add(snapshot);
        true
    }

    /// Interpolated world state at `render_timestamp` (server clock,
    /// already offset by `now - interpolationDelayMs` by the caller).
    pub fn sample<S: Simulation<World = W>>(&self, sim: &S, render_timestamp: f64) -> Option<W> {
        let bracket = self.buffer.get_bracketing_snapshots(render_timestamp)?;
        Some(sim.interpolate(&bracket.from.state, &bracket.to.state, bracket.alpha))
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::id::ClientId;
    use indexmap::IndexMap;

    #[derive(Clone)]
    struct Lerp;

    #[derive(Clone, Debug, PartialEq)]
    struct NoopAction;
    impl crate::shared::game::Action for NoopAction {
        fn client_timestamp(&self) -> f64 {
            0.0
        }
    }

    impl Simulation for Lerp {
        type World = f32;
        type Input = ();
        type Action = NoopAction;
        fn simulate(&self, world: &f32, _inputs: &IndexMap<ClientId, ()>, _dt_ms: f64) -> f32 {
            *world
        }
        fn interpolate(&self, from: &f32, to: &f32, alpha: f32) -> f32 {
            from + (to - from) * alpha
        }
        fn add_player(&self, world: &f32, _id: &ClientId) -> f32 {
            *world
        }
        fn remove_player(&self, world: &f32, _id: &ClientId) -> f32 {
            *world
        }
        fn create_idle_input(&self) {}
    }

    fn snap(tick: u16, ts: f64, state: f32) -> Snapshot<f32> {
        Snapshot { tick: Tick(tick), timestamp: ts, state, input_acks: IndexMap::new() }
    }

    #[test]
    fn discards_non_monotonic_snapshots() {
        let mut interp: Interpolator<f32> = Interpolator::new(20);
        assert!(interp.push(snap(5, 0.0, 0.0)));
        assert!(!interp.push(snap(3, 0.0, 0.0)));
        assert_eq!(interp.len(), 1);
    }

    #[test]
    fn samples_between_bracketing_snapshots() {
        let sim = Lerp;
        let mut interp: Interpolator<f32> = Interpolator::new(20);
        interp.push(snap(1, 0.0, 0.0));
        interp.push(snap(2, 100.0, 100.0));
        let s = interp.sample(&sim, 50.0).unwrap();
        assert!((s - 50.0).abs() < 1e-3);
    }
}
