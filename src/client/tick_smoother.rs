//! Per-entity presentation smoothing between discrete tick updates
//! (spec.md §4.9). Two modes: owner (the local player's own predicted
//! entity, a fixed 1-tick window keyed by prediction tick) and spectator
//! (remote entities, an adaptive window keyed by server tick and sized
//! from observed RTT/jitter).
//!
//! Grounded on `lightyear_core/src/history_buffer.rs`'s queue-of-targets
//! eviction pattern; no direct teacher analogue exists for per-entity
//! presentation smoothing (the teacher interpolates components
//! generically rather than per-entity), so the update loop below is
//! built from spec.md §4.9 directly, in the small-struct-plus-`update()`
//! idiom the rest of this crate's client submodules use.

use crate::shared::config::TickSmootherConfig;
use crate::shared::tick::Tick;
use std::collections::VecDeque;
use tracing::warn;

/// A presentation value a [`TickSmoother`] can ease between ticks. `f32`
/// is provided for scalar channels; games with vector positions implement
/// this for their own vector type.
pub trait SmoothTarget: Clone + PartialEq {
    fn zero() -> Self;
    fn distance(&self, other: &Self) -> f32;
    fn lerp(&self, other: &Self, t: f32) -> Self;
    /// `self + velocity * ticks`.
    fn extrapolate(&self, velocity: &Self, ticks: f32) -> Self;
    /// Per-tick velocity moving from `self` towards `target` over `ticks`.
    fn velocity_to(&self, target: &Self, ticks: f32) -> Self;
}

impl SmoothTarget for f32 {
    fn zero() -> Self {
        0.0
    }
    fn distance(&self, other: &Self) -> f32 {
        (self - other).abs()
    }
    fn lerp(&self, other: &Self, t: f32) -> Self {
        self + (other - self) * t
    }
    fn extrapolate(&self, velocity: &Self, ticks: f32) -> Self {
        self + velocity * ticks
    }
    fn velocity_to(&self, target: &Self, ticks: f32) -> Self {
        if ticks <= 0.0 {
            0.0
        } else {
            (target - self) / ticks
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmootherMode {
    /// Fixed 1-tick buffering window, keyed by the local predicted tick.
    Owner,
    /// Adaptive window sized from observed RTT/jitter, keyed by server
    /// tick.
    Spectator,
}

pub struct TickSmoother<T: SmoothTarget> {
    config: TickSmootherConfig,
    mode: SmootherMode,
    queue: VecDeque<(Tick, T)>,
    current: Option<T>,
    last_velocity: T,
    dry_ticks: u16,
    adaptive_window: u16,
}

impl<T: SmoothTarget> TickSmoother<T> {
    pub fn new_owner(config: TickSmootherConfig) -> Self {
        Self {
            config,
            mode: SmootherMode::Owner,
            queue: VecDeque::new(),
            current: None,
            last_velocity: T::zero(),
            dry_ticks: 0,
            adaptive_window: 1,
        }
    }

    pub fn new_spectator(config: TickSmootherConfig) -> Self {
        let adaptive_window = config.interpolation;
        Self {
            config,
            mode: SmootherMode::Spectator,
            queue: VecDeque::new(),
            current: None,
            last_velocity: T::zero(),
            dry_ticks: 0,
            adaptive_window,
        }
    }

    /// Spectator-only: resize the adaptive window from observed RTT and
    /// jitter, expressed in the same units as a tick interval. No-op for
    /// owner-mode smoothers.
    pub fn set_adaptive_window(&mut self, rtt_ms: f32, jitter_ms: f32, tick_interval_ms: f32) {
        if self.mode != SmootherMode::Spectator || tick_interval_ms <= 0.0 {
            return;
        }
        let ticks = ((rtt_ms / 2.0 + jitter_ms) / tick_interval_ms).ceil() as u16;
        self.adaptive_window = ticks.clamp(
            self.config.adaptive_min_interpolation,
            self.config.adaptive_max_interpolation,
        );
    }

    fn window_len(&self) -> u16 {
        match self.mode {
            SmootherMode::Owner => 1,
            SmootherMode::Spectator => self.adaptive_window,
        }
    }

    /// Queue a newly-received tick-keyed target value. Silently drops a
    /// value whose key is not strictly greater than the most recently
    /// queued one (out-of-order or duplicate delivery).
    pub fn push_target(&mut self, key: Tick, value: T) {
        if let Some((last_key, _)) = self.queue.back() {
            if key <= *last_key {
                return;
            }
        }
        self.queue.push_back((key, value));
        let cap = (self.window_len() + self.config.max_over_buffer) as usize;
        while self.queue.len() > cap {
            self.queue.pop_front();
        }
    }

    /// Advance presentation state by one render step. Returns the value
    /// to render, or `None` if no target has ever been queued.
    pub fn update(&mut self) -> Option<T> {
        let window = self.window_len() as usize;
        if self.queue.len() > window {
            let (_key, value) = self.queue.pop_front().expect("checked len > window >= 0");
            self.dry_ticks = 0;
            match &self.current {
                Some(cur) if cur.distance(&value) > self.config.teleport_threshold => {
                    warn!(distance = cur.distance(&value), "teleport detected, snapping without easing");
                    self.last_velocity = value.velocity_to(&value, 1.0);
                }
                Some(cur) => {
                    self.last_velocity = cur.velocity_to(&value, 1.0);
                }
                None => {}
            }
            self.current = Some(value);
            self.current.clone()
        } else if let Some(cur) = self.current.clone() {
            if self.dry_ticks < self.config.extrapolation_ticks {
                self.dry_ticks += 1;
                let extrapolated = cur.extrapolate(&self.last_velocity, 1.0);
                self.current = Some(extrapolated.clone());
                Some(extrapolated)
            } else {
                Some(cur)
            }
        } else {
            None
        }
    }

    pub fn current(&self) -> Option<&T> {
        self.current.as_ref()
    }
}
