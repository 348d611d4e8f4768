//! Frame-indexed rollback/resimulation strategy, offered as an
//! alternative to server-authoritative prediction/reconciliation for
//! peer topologies that want GGPO-style rollback instead (spec.md
//! §4.12).
//!
//! Grounded on [`crate::shared::history_buffer::HistoryBuffer`] (the same
//! ring-buffer primitive used by [`crate::shared::snapshot::SnapshotBuffer`],
//! with the frame index standing in for a server tick) — no teacher
//! rollback implementation was retrieved with source, so the
//! resimulation loop follows spec.md §4.12 directly, using the same
//! primitives as the rest of the crate for consistency.

use crate::shared::config::RollbackConfig;
use crate::shared::game::Simulation;
use crate::shared::history_buffer::HistoryBuffer;
use crate::shared::id::ClientId;
use crate::shared::tick::Tick;
use indexmap::IndexMap;
use tracing::debug;

/// Frame-indexed world and input history with confirmed-frame
/// resimulation. `Tick` stands in for a rollback "frame number" here —
/// same wrapping counter, different meaning.
pub struct RollbackWorld<S: Simulation> {
    sim: S,
    config: RollbackConfig,
    world_history: HistoryBuffer<S::World>,
    input_history: HistoryBuffer<IndexMap<ClientId, S::Input>>,
    /// Highest frame for which every connected client's input is known.
    confirmed_frame: Tick,
    current_frame: Tick,
    local_id: ClientId,
}

impl<S: Simulation> RollbackWorld<S> {
    pub fn new(sim: S, config: RollbackConfig, local_id: ClientId, initial_world: S::World) -> Self {
        let mut world_history = HistoryBuffer::new(config.history_size);
        world_history.push(Tick::ZERO, initial_world);
        Self {
            sim,
            config,
            world_history,
            input_history: HistoryBuffer::new(config.history_size),
            confirmed_frame: Tick::ZERO,
            current_frame: Tick::ZERO,
            local_id,
        }
    }

    pub fn confirmed_frame(&self) -> Tick {
        self.confirmed_frame
    }

    pub fn current_frame(&self) -> Tick {
        self.current_frame
    }

    pub fn world_at(&self, frame: Tick) -> Option<&S::World> {
        self.world_history.get(frame)
    }

    /// Step forward one frame. `local_input` is staged `input_delay`
    /// frames ahead rather than applied immediately — deliberately
    /// trading input latency for fewer mispredictions, the standard
    /// rollback-netcode tradeoff (spec.md §4.12).
    pub fn advance(&mut self, local_input: S::Input, connected: &[ClientId], dt_ms: f64) -> Tick {
        let next_frame = self.current_frame + 1;
        let local_target_frame = next_frame + self.config.input_delay as i16;
        self.set_input(local_target_frame, self.local_id.clone(), local_input);

        let inputs = self.build_inputs(next_frame, connected);
        let base = self
            .world_history
            .get(self.current_frame)
            .expect("current frame is always present")
            .clone();
        let new_world = self.sim.simulate(&base, &inputs, dt_ms);
        self.world_history.push(next_frame, new_world);
        self.current_frame = next_frame;
        self.advance_confirmed(connected);
        next_frame
    }

    /// A remote client's input for `frame` arrived. If `frame` is at or
    /// before [`Self::current_frame`], every frame from `frame` onward
    /// must be resimulated with the corrected input (spec.md §4.12).
    /// Input for a frame at or before [`Self::confirmed_frame`] is
    /// discarded outright — the confirmed history has already settled and
    /// must never be rewritten.
    pub fn receive_remote_input(
        &mut self,
        frame: Tick,
        client: ClientId,
        input: S::Input,
        connected: &[ClientId],
        dt_ms: f64,
    ) {
        if frame <= self.confirmed_frame {
            debug!(?frame, confirmed = ?self.confirmed_frame, "discarding input for already-confirmed frame");
            return;
        }
        self.set_input(frame, client, input);
        if frame <= self.current_frame {
            debug!(?frame, current = ?self.current_frame, "late remote input, resimulating");
            self.resimulate_from(frame, connected, dt_ms);
        }
        self.advance_confirmed(connected);
    }

    fn set_input(&mut self, frame: Tick, client: ClientId, input: S::Input) {
        let mut inputs = self.input_history.get(frame).cloned().unwrap_or_default();
        inputs.insert(client, input);
        self.input_history.overwrite_at(frame, inputs);
    }

    fn build_inputs(&self, frame: Tick, connected: &[ClientId]) -> IndexMap<ClientId, S::Input> {
        let recorded = self.input_history.get(frame);
        connected
            .iter()
            .map(|client| {
                let input = recorded
                    .and_then(|m| m.get(client))
                    .cloned()
                    .unwrap_or_else(|| self.sim.create_idle_input());
                (client.clone(), input)
            })
            .collect()
    }

    fn resimulate_from(&mut self, from_frame: Tick, connected: &[ClientId], dt_ms: f64) {
        let Some(mut base) = self.world_history.get(from_frame - 1).cloned() else {
            return;
        };
        let mut frame = from_frame;
        while frame <= self.current_frame {
            let inputs = self.build_inputs(frame, connected);
            let new_world = self.sim.simulate(&base, &inputs, dt_ms);
            self.world_history.overwrite_at(frame, new_world.clone());
            base = new_world;
            frame = frame + 1;
        }
    }

    fn advance_confirmed(&mut self, connected: &[ClientId]) {
        let mut candidate = self.confirmed_frame + 1;
        while candidate <= self.current_frame {
            let known = self
                .input_history
                .get(candidate)
                .is_some_and(|m| connected.iter().all(|c| m.contains_key(c)));
            if !known {
                break;
            }
            self.confirmed_frame = candidate;
            candidate = candidate + 1;
        }
    }
}
