//! Reference game plug-in used by the end-to-end scenario tests
//! (spec.md §8): a minimal side-scrolling platformer with gravity, a
//! floor, and a "shoot" action validated against lag-compensated state.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tickwise::shared::game::{Action, PredictionScope, Simulation};
use tickwise::shared::id::ClientId;

pub const GRAVITY: f32 = -800.0;
pub const MOVE_SPEED: f32 = 200.0;
pub const JUMP_VELOCITY: f32 = 400.0;
pub const FLOOR_Y: f32 = 0.0;
pub const SPAWN_Y: f32 = 10.0;
/// Hitscan radius for [`ShootAction`] validation.
pub const HIT_RADIUS: f32 = 25.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub x: f32,
    pub y: f32,
    pub vy: f32,
    pub grounded: bool,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self { x: 0.0, y: SPAWN_Y, vy: 0.0, grounded: false }
    }
}

pub type World = IndexMap<ClientId, PlayerState>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PlatformerInput {
    /// `-1.0..=1.0`.
    pub move_x: f32,
    pub jump: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShootAction {
    pub target_x: f32,
    pub target_y: f32,
    pub client_timestamp: f64,
}

impl Action for ShootAction {
    fn client_timestamp(&self) -> f64 {
        self.client_timestamp
    }
}

/// One physics step for a single player, shared by [`Platformer::simulate`]
/// and [`Platformer::simulate_predicted`] so full-world and predicted-slice
/// stepping can never drift apart.
fn step_player(state: PlayerState, input: &PlatformerInput, dt: f32) -> PlayerState {
    let mut next = state;
    next.x += input.move_x * MOVE_SPEED * dt;
    if input.jump && next.grounded {
        next.vy = JUMP_VELOCITY;
        next.grounded = false;
    }
    next.vy += GRAVITY * dt;
    next.y += next.vy * dt;
    if next.y <= FLOOR_Y {
        next.y = FLOOR_Y;
        next.vy = 0.0;
        next.grounded = true;
    }
    next
}

#[derive(Clone, Copy)]
pub struct Platformer;

impl Simulation for Platformer {
    type World = World;
    type Input = PlatformerInput;
    type Action = ShootAction;

    fn simulate(&self, world: &World, inputs: &IndexMap<ClientId, PlatformerInput>, dt_ms: f64) -> World {
        let dt = (dt_ms / 1000.0) as f32;
        let mut next: World = world
            .iter()
            .map(|(id, state)| {
                let input = inputs.get(id).copied().unwrap_or_default();
                (id.clone(), step_player(*state, &input, dt))
            })
            .collect();
        next.sort_keys();
        next
    }

    fn interpolate(&self, from: &World, to: &World, alpha: f32) -> World {
        let mut blended: World = from
            .iter()
            .map(|(id, from_state)| {
                let to_state = to.get(id).copied().unwrap_or(*from_state);
                let blended = PlayerState {
                    x: from_state.x + (to_state.x - from_state.x) * alpha,
                    y: from_state.y + (to_state.y - from_state.y) * alpha,
                    vy: from_state.vy + (to_state.vy - from_state.vy) * alpha,
                    grounded: to_state.grounded,
                };
                (id.clone(), blended)
            })
            .collect();
        blended.sort_keys();
        blended
    }

    fn add_player(&self, world: &World, id: &ClientId) -> World {
        let mut next = world.clone();
        next.insert(id.clone(), PlayerState::default());
        next.sort_keys();
        next
    }

    fn remove_player(&self, world: &World, id: &ClientId) -> World {
        let mut next = world.clone();
        next.shift_remove(id);
        next
    }

    fn create_idle_input(&self) -> PlatformerInput {
        PlatformerInput::default()
    }

    /// Burst dedup (spec.md §4.1 open question): `move_x` is a continuous
    /// axis so last-wins is correct, but `jump` is an edge the player
    /// pressed at some point during the tick and must not be lost if a
    /// later input in the same burst didn't have it held.
    fn merge_inputs(&self, inputs: &[PlatformerInput]) -> PlatformerInput {
        let move_x = inputs.last().map(|i| i.move_x).unwrap_or(0.0);
        let jump = inputs.iter().any(|i| i.jump);
        PlatformerInput { move_x, jump }
    }

    fn validate_action(
        &self,
        rewound_world: &World,
        action: &ShootAction,
        actor: &ClientId,
    ) -> (bool, Option<String>) {
        for (id, state) in rewound_world.iter() {
            if id == actor {
                continue;
            }
            let dx = state.x - action.target_x;
            let dy = state.y - action.target_y;
            if (dx * dx + dy * dy).sqrt() <= HIT_RADIUS {
                return (true, Some(id.to_string()));
            }
        }
        (false, None)
    }
}

impl PredictionScope for Platformer {
    type Predicted = PlayerState;

    fn extract_predictable(&self, world: &World, local_id: &ClientId) -> PlayerState {
        world.get(local_id).copied().unwrap_or_default()
    }

    fn simulate_predicted(
        &self,
        predicted: &PlayerState,
        input: &PlatformerInput,
        dt_ms: f64,
        _local_id: &ClientId,
    ) -> PlayerState {
        step_player(*predicted, input, (dt_ms / 1000.0) as f32)
    }

    fn merge_prediction(&self, server_world: &World, predicted: &PlayerState, local_id: &ClientId) -> World {
        let mut next = server_world.clone();
        next.insert(local_id.clone(), *predicted);
        next.sort_keys();
        next
    }
}
