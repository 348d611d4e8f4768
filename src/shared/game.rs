//! The game plug-in contract (spec.md §6 "Game plug-in", §9 "Opaque game
//! state").
//!
//! The engine never inspects the shape of the world `W`; everything it
//! needs is expressed through these two traits. A concrete game (see
//! `tests/support/platformer.rs`) implements [`Simulation`] and,
//! optionally, [`PredictionScope`] to unlock client-side prediction.

use crate::shared::id::ClientId;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A single discrete, timestamped client action (spec.md §3 "Action `A`").
pub trait Action: Clone + Send + Sync + 'static {
    /// Client wall-clock ms at capture.
    fn client_timestamp(&self) -> f64;
}

/// The game-agnostic world-stepping contract every `tickwise` server and
/// client is parameterized over.
///
/// `simulate` and `interpolate` MUST be pure and deterministic: given the
/// same inputs they must produce bit-for-bit (or at least
/// reconciliation-tolerant) identical output on every machine that runs
/// them, because the whole prediction/reconciliation/rollback scheme
/// depends on client and server agreeing on what `simulate` does (spec.md
/// §8 property 7).
pub trait Simulation: Sized {
    type World: Clone + Send + Sync + 'static;
    type Input: Clone + Send + Sync + 'static;
    type Action: Action;

    /// One-time setup before the plug-in is handed to an orchestrator
    /// (loading assets, warming a physics backend, etc). The default is a
    /// no-op; `ServerOrchestrator::new`/`ClientOrchestrator::new` call this
    /// once and refuse to construct if it fails.
    fn init(&mut self) -> Result<(), crate::shared::error::EngineError> {
        Ok(())
    }

    /// Advance the whole world by one deterministic step. Every
    /// connected client must appear as a key in `inputs` (idle input if
    /// none were queued for this tick — spec.md §4.1).
    fn simulate(
        &self,
        world: &Self::World,
        inputs: &IndexMap<ClientId, Self::Input>,
        dt_ms: f64,
    ) -> Self::World;

    /// Blend two world states for rendering at `alpha` in `[0, 1]`.
    fn interpolate(&self, from: &Self::World, to: &Self::World, alpha: f32) -> Self::World;

    fn add_player(&self, world: &Self::World, id: &ClientId) -> Self::World;

    fn remove_player(&self, world: &Self::World, id: &ClientId) -> Self::World;

    /// The input substituted for a client that has no pending input this
    /// tick (spec.md §4.1).
    fn create_idle_input(&self) -> Self::Input;

    /// Combine multiple inputs queued for the same client within one tick
    /// into a single input (spec.md §4.1). Default: last one wins. Games
    /// that want to preserve "edge" bits (e.g. jump-pressed) across a
    /// burst should override this and OR those specific fields rather
    /// than the engine guessing which fields are edges (spec.md §9 open
    /// question).
    fn merge_inputs(&self, inputs: &[Self::Input]) -> Self::Input {
        inputs
            .last()
            .cloned()
            .unwrap_or_else(|| self.create_idle_input())
    }

    /// Validate a client action against the lag-compensated world state the
    /// [`crate::server::lag_compensation::LagCompensator`] rewound to the
    /// client's perceived moment (spec.md §4.11). The default accepts
    /// every action unconditionally; games that need hit validation (or
    /// any other server-authoritative check) override this.
    fn validate_action(
        &self,
        _rewound_world: &Self::World,
        _action: &Self::Action,
        _actor: &ClientId,
    ) -> (bool, Option<String>) {
        (true, None)
    }

    /// Structural codec used when the engine itself needs to serialize a
    /// world (e.g. for logging or a transport that requires bytes). The
    /// default is a JSON encoding; because `serde_json` preserves map
    /// insertion order for `IndexMap`-backed world types, this also
    /// satisfies the "canonical codec must sort keys" requirement as long
    /// as the game represents its player map as an `IndexMap` sorted by
    /// `ClientId`.
    fn serialize(&self, world: &Self::World) -> Result<Vec<u8>, String>
    where
        Self::World: Serialize,
    {
        serde_json::to_vec(world).map_err(|e| e.to_string())
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Self::World, String>
    where
        Self::World: DeserializeOwned,
    {
        serde_json::from_slice(bytes).map_err(|e| e.to_string())
    }
}

/// Optional narrower contract that unlocks client-side prediction
/// (spec.md §4.5). A game that never runs a client (headless dedicated
/// server tooling, say) need not implement this.
pub trait PredictionScope: Simulation {
    /// The predictable slice of the world: the subset owned by the local
    /// player.
    type Predicted: Clone + Send + Sync + 'static;

    /// Extract the local player's predictable slice from a full world
    /// state.
    fn extract_predictable(&self, world: &Self::World, local_id: &ClientId) -> Self::Predicted;

    /// Step the predictable slice forward by `dt_ms`.
    fn simulate_predicted(
        &self,
        predicted: &Self::Predicted,
        input: &Self::Input,
        dt_ms: f64,
        local_id: &ClientId,
    ) -> Self::Predicted;

    /// Combine the authoritative remote state with the predicted local
    /// slice for rendering.
    fn merge_prediction(
        &self,
        server_world: &Self::World,
        predicted: &Self::Predicted,
        local_id: &ClientId,
    ) -> Self::World;
}
