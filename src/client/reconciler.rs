//! Rewinds the predicted slice to the server's authoritative state and
//! replays every input the server has not yet acknowledged, at the
//! server's fixed tick delta rather than whatever delta the client
//! originally captured it at (spec.md §4.6).
//!
//! The Reconciler never calls back into a [`crate::client::tick_smoother::TickSmoother`]
//! directly (that would be a cyclic dependency between the two modules);
//! instead it returns the full replay trace as [`ReplayedInput`]s and lets
//! the [`crate::client::orchestrator::ClientOrchestrator`] forward them to
//! whichever owner-mode smoother wants them.

use crate::client::input_buffer::BufferedInput;
use crate::shared::game::PredictionScope;
use crate::shared::id::ClientId;
use crate::shared::tick::Tick;
use tracing::trace;

/// One step of a reconciliation replay: the predicted state immediately
/// after re-applying one previously-captured input.
#[derive(Debug, Clone)]
pub struct ReplayedInput<P> {
    pub seq: u32,
    pub tick: Tick,
    pub predicted: P,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Reconciler;

impl Reconciler {
    pub fn new() -> Self {
        Self
    }

    /// `server_tick` / `server_predicted` is the predictable slice
    /// extracted from the most recent snapshot; `acked_seq` is that
    /// snapshot's recorded ack for `local_id` (from `Snapshot::input_acks`).
    /// `buffered` must be in ascending seq order (as
    /// [`crate::client::input_buffer::InputBuffer::pending`] yields it).
    pub fn reconcile<S: PredictionScope>(
        &self,
        sim: &S,
        server_tick: Tick,
        server_predicted: S::Predicted,
        acked_seq: u32,
        buffered: &[BufferedInput<S::Input>],
        dt_ms: f64,
        local_id: &ClientId,
    ) -> (S::Predicted, Tick, Vec<ReplayedInput<S::Predicted>>) {
        let mut state = server_predicted;
        let mut tick = server_tick;
        let mut trace_log = Vec::new();

        for buffered_input in buffered.iter().filter(|b| b.seq > acked_seq) {
            state = sim.simulate_predicted(&state, &buffered_input.input, dt_ms, local_id);
            tick = tick + 1;
            trace!(seq = buffered_input.seq, %tick, "replayed input during reconciliation");
            trace_log.push(ReplayedInput {
                seq: buffered_input.seq,
                tick,
                predicted: state.clone(),
            });
        }

        (state, tick, trace_log)
    }
}
