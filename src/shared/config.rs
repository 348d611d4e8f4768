//! Every tunable named in spec.md §6, gathered the way the teacher groups
//! config into one struct per subsystem (`PingConfig`, `ClientConfig`,
//! `ServerConfig`) composed into a top-level config.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level engine configuration, shared by server and client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Server tick frequency, in Hz. Default 60.
    pub tick_rate: u32,
    /// Snapshots retained in the server's `SnapshotBuffer`. Default 180
    /// (~3s at 60Hz).
    pub snapshot_history_size: usize,
    /// Render lag for remote entities, in ms. Default 50.
    pub interpolation_delay_ms: u32,
    /// Client input buffer cap. Default 1024.
    pub max_input_buffer_size: usize,
    /// Lag-compensation rewind clamp, in ms. Default 200.
    pub max_rewind_ms: u32,
    /// Bounded history window for action dedup, in entries per client.
    /// Default 256.
    pub max_action_history: usize,
    /// How long a client may sit in `AwaitingConfig` before the handshake
    /// is abandoned as timed out. Default 10s.
    pub handshake_timeout_ms: u32,
    pub tick_smoother: TickSmootherConfig,
    pub visual_smoother: VisualSmootherConfig,
    pub lag_compensation: LagCompensationConfig,
    pub rollback: RollbackConfig,
}

impl EngineConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(1000 / self.tick_rate as u64)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60,
            snapshot_history_size: 180,
            interpolation_delay_ms: 50,
            max_input_buffer_size: 1024,
            max_rewind_ms: 200,
            max_action_history: 256,
            handshake_timeout_ms: 10_000,
            tick_smoother: TickSmootherConfig::default(),
            visual_smoother: VisualSmootherConfig::default(),
            lag_compensation: LagCompensationConfig::default(),
            rollback: RollbackConfig::default(),
        }
    }
}

/// Config for [`crate::client::tick_smoother::TickSmoother`] (spec.md
/// §4.9).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TickSmootherConfig {
    /// Per-axis/field distance beyond which the smoother snaps instead of
    /// easing (teleport / respawn / wraparound).
    pub teleport_threshold: f32,
    /// Target buffered-ticks-behind-latest for owner mode (fixed at 1) or
    /// the initial value for spectator mode's adaptive window.
    pub interpolation: u16,
    /// Extra buffered entries tolerated before the front is discarded.
    pub max_over_buffer: u16,
    /// Max ticks to extrapolate along last velocity when the queue runs
    /// dry.
    pub extrapolation_ticks: u16,
    pub adaptive_min_interpolation: u16,
    pub adaptive_max_interpolation: u16,
}

impl Default for TickSmootherConfig {
    fn default() -> Self {
        Self {
            teleport_threshold: 200.0,
            interpolation: 2,
            max_over_buffer: 3,
            extrapolation_ticks: 3,
            adaptive_min_interpolation: 1,
            adaptive_max_interpolation: 8,
        }
    }
}

/// Config for [`crate::client::visual_smoother::VisualSmoother`] (spec.md
/// §4.10).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VisualSmootherConfig {
    pub smooth_factor: f32,
    pub snap_threshold: f32,
}

impl Default for VisualSmootherConfig {
    fn default() -> Self {
        Self {
            smooth_factor: 0.9,
            snap_threshold: 50.0,
        }
    }
}

/// Config for [`crate::server::lag_compensation::LagCompensator`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LagCompensationConfig {
    pub max_rewind_ms: u32,
}

impl Default for LagCompensationConfig {
    fn default() -> Self {
        Self { max_rewind_ms: 200 }
    }
}

/// Config for [`crate::rollback::RollbackWorld`] (spec.md §4.12).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RollbackConfig {
    /// Frames of world/input history retained.
    pub history_size: usize,
    /// Frames of artificial delay applied to local input.
    pub input_delay: u16,
}

impl Default for RollbackConfig {
    fn default() -> Self {
        Self {
            history_size: 60,
            input_delay: 2,
        }
    }
}
