//! Rewinds the snapshot history to a client's perceived moment so a
//! server-authoritative action can be validated against what the client
//! actually saw (spec.md §4.11).

use crate::shared::clock_sync::ClockSample;
use crate::shared::config::LagCompensationConfig;
use crate::shared::game::Simulation;
use crate::shared::snapshot::SnapshotBuffer;
use tracing::trace;

/// The interpolated world state at the client's perceived moment, plus
/// bookkeeping about how much the raw target had to be clamped.
#[derive(Debug, Clone)]
pub struct LagCompensationResult<W> {
    pub state: W,
    /// The clamped timestamp the state was actually rewound to.
    pub rewound_to_ms: f64,
    /// `true` if the raw `clientTimestamp + clockOffset - interpolationDelay`
    /// target fell outside `[now - maxRewindMs, now]` and had to be
    /// clamped.
    pub clamped: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct LagCompensator {
    config: LagCompensationConfig,
}

impl LagCompensator {
    pub fn new(config: LagCompensationConfig) -> Self {
        Self { config }
    }

    /// `clock` is the client's last-reported [`ClockSample`], or `None` if
    /// it has never reported one. Map presence, not value, is the signal
    /// (spec.md §4.11 edge case: `offsetMs = 0.0` is a legitimate sample
    /// and must not be confused with "no sample yet"): with a sample, the
    /// target is `clientTimestamp + offsetMs - interpolationDelayMs`;
    /// without one, it falls back to `now - interpolationDelayMs` (spec.md
    /// §8 boundary). Returns `None` only if the snapshot buffer is empty.
    pub fn rewind<S: Simulation>(
        &self,
        sim: &S,
        buffer: &SnapshotBuffer<S::World>,
        client_timestamp: f64,
        clock: Option<ClockSample>,
        interpolation_delay_ms: f64,
        now_ms: f64,
    ) -> Option<LagCompensationResult<S::World>> {
        let raw_target = match clock {
            Some(sample) => client_timestamp + sample.offset_ms - interpolation_delay_ms,
            None => now_ms - interpolation_delay_ms,
        };
        let min_allowed = now_ms - self.config.max_rewind_ms as f64;
        let (target, clamped) = if raw_target < min_allowed {
            (min_allowed, true)
        } else if raw_target > now_ms {
            (now_ms, true)
        } else {
            (raw_target, false)
        };
        if clamped {
            trace!(raw_target, target, "lag compensation target clamped");
        }

        let bracket = buffer.get_bracketing_snapshots(target)?;
        let state = sim.interpolate(&bracket.from.state, &bracket.to.state, bracket.alpha);
        Some(LagCompensationResult {
            state,
            rewound_to_ms: target,
            clamped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::config::LagCompensationConfig;
    use crate::shared::id::ClientId;
    use crate::shared::snapshot::Snapshot;
    use crate::shared::tick::Tick;
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
        Snapshot {
            tick: Tick(tick),
            timestamp: ts,
            state,
            input_acks: IndexMap::new(),
        }
    }

    #[test]
    fn rewinds_to_interpolated_state_at_target() {
        let sim = Lerp;
        let mut buf: SnapshotBuffer<f32> = SnapshotBuffer::new(10);
        buf.add(snap(1, 900.0, 0.0));
        buf.add(snap(2, 1000.0, 100.0));
        let comp = LagCompensator::new(LagCompensationConfig { max_rewind_ms: 500 });
        // client saw t=950 (clockOffset 0, interpolationDelay 0), now=1000
        let sample = ClockSample { offset_ms: 0.0, rtt_ms: 0.0 };
        let result = comp.rewind(&sim, &buf, 950.0, Some(sample), 0.0, 1000.0).unwrap();
        assert!(!result.clamped);
        assert!((result.state - 50.0).abs() < 1e-3);
    }

    #[test]
    fn clamps_to_max_rewind_window() {
        let sim = Lerp;
        let mut buf: SnapshotBuffer<f32> = SnapshotBuffer::new(10);
        buf.add(snap(1, 0.0, 0.0));
        buf.add(snap(2, 1000.0, 100.0));
        let comp = LagCompensator::new(LagCompensationConfig { max_rewind_ms: 200 });
        // raw target = 500 - 0 - 0 = 500, but now=1000 so min_allowed=800
        let sample = ClockSample { offset_ms: 0.0, rtt_ms: 0.0 };
        let result = comp.rewind(&sim, &buf, 500.0, Some(sample), 0.0, 1000.0).unwrap();
        assert!(result.clamped);
        assert_eq!(result.rewound_to_ms, 800.0);
    }

    #[test]
    fn absent_clock_sample_falls_back_to_now_minus_interpolation_delay() {
        let sim = Lerp;
        let mut buf: SnapshotBuffer<f32> = SnapshotBuffer::new(10);
        buf.add(snap(1, 900.0, 0.0));
        buf.add(snap(2, 1000.0, 100.0));
        let comp = LagCompensator::new(LagCompensationConfig { max_rewind_ms: 500 });
        // no reported sample: target = now - interpolationDelay = 1000 - 50 = 950,
        // regardless of clientTimestamp.
        let result = comp.rewind(&sim, &buf, 123.0, None, 50.0, 1000.0).unwrap();
        assert!(!result.clamped);
        assert_eq!(result.rewound_to_ms, 950.0);
    }

    #[test]
    fn empty_buffer_returns_none() {
        let sim = Lerp;
        let buf: SnapshotBuffer<f32> = SnapshotBuffer::new(10);
        let comp = LagCompensator::new(LagCompensationConfig::default());
        assert!(comp.rewind(&sim, &buf, 0.0, None, 0.0, 0.0).is_none());
    }
}
