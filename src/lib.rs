//! # tickwise
//!
//! A game-agnostic, server-authoritative netcode core: fixed-rate tick
//! simulation, client-side prediction with reconciliation, snapshot
//! interpolation with adaptive buffering, lag-compensated action
//! validation, and an alternative rollback strategy.
//!
//! The engine never looks inside the world state `W` it simulates — games
//! plug in their own types and step function through the [`shared::game::Simulation`]
//! trait. See that trait's docs for the contract a game must satisfy.
//!
//! Transport, physics, rendering and input capture are external
//! collaborators; see [`shared::transport`] for the channel contract this
//! crate expects from whatever transport an embedder wires up.

pub mod shared;

#[cfg(feature = "server")]
pub mod server;

#[cfg(feature = "client")]
pub mod client;

#[cfg(feature = "rollback")]
pub mod rollback;

pub mod prelude {
    pub use crate::shared::clock_sync::{ClockSample, ClockSyncClient, ClockSyncServer};
    pub use crate::shared::config::{
        EngineConfig, LagCompensationConfig, RollbackConfig, TickSmootherConfig,
        VisualSmootherConfig,
    };
    pub use crate::shared::error::EngineError;
    pub use crate::shared::game::{PredictionScope, Simulation};
    pub use crate::shared::id::ClientId;
    pub use crate::shared::snapshot::{Bracketing, Snapshot, SnapshotBuffer};
    pub use crate::shared::tick::Tick;
    pub use crate::shared::transport::{ClientTransport, Message, ServerTransport};

    #[cfg(feature = "server")]
    pub use crate::server::{
        input_queue::{ActionQueue, InputQueue},
        lag_compensation::{LagCompensationResult, LagCompensator},
        orchestrator::ServerOrchestrator,
        tick_processor::TickProcessor,
    };

    #[cfg(feature = "client")]
    pub use crate::client::{
        input_buffer::InputBuffer,
        interpolator::Interpolator,
        orchestrator::{ClientOrchestrator, ConnectionState},
        predictor::Predictor,
        reconciler::{Reconciler, ReplayedInput},
        tick_smoother::TickSmoother,
        visual_smoother::VisualSmoother,
    };

    #[cfg(feature = "rollback")]
    pub use crate::rollback::RollbackWorld;
}
