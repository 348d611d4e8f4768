//! Decaying positional offset that hides the pop introduced when
//! reconciliation corrects the local player's predicted position
//! (spec.md §4.10). Frame-rate independent: the offset decays by
//! `smoothFactor ^ (dt / 16.67ms)` each call, not by a fixed per-frame
//! fraction.

use crate::client::tick_smoother::SmoothTarget;
use crate::shared::config::VisualSmootherConfig;

/// Reference frame duration the `smooth_factor` decay rate is calibrated
/// against (60Hz).
const REFERENCE_FRAME_MS: f32 = 1000.0 / 60.0;

pub struct VisualSmoother<T: SmoothTarget> {
    config: VisualSmootherConfig,
    offset: T,
}

impl<T: SmoothTarget> VisualSmoother<T> {
    pub fn new(config: VisualSmootherConfig) -> Self {
        Self {
            config,
            offset: T::zero(),
        }
    }

    /// Record a reconciliation correction: the predicted value the
    /// player was rendering just before reconciliation, versus the
    /// authoritative value reconciliation replaced it with. Accumulates
    /// into the existing offset unless the correction itself is larger
    /// than `snap_threshold`, in which case the offset resets to zero
    /// (a correction that big is itself a visible pop either way, so
    /// there is nothing worth smoothing).
    pub fn record_correction(&mut self, predicted_before: &T, authoritative_after: &T) {
        if predicted_before.distance(authoritative_after) > self.config.snap_threshold {
            self.offset = T::zero();
            return;
        }
        let delta = authoritative_after.velocity_to(predicted_before, 1.0);
        self.offset = self.offset.extrapolate(&delta, 1.0);
    }

    /// Decay the accumulated offset by elapsed wall-clock time. Snaps to
    /// exactly zero once within `EPSILON`, since geometric decay alone only
    /// ever approaches zero asymptotically (spec.md §4.10).
    pub fn decay(&mut self, dt_ms: f32) {
        const EPSILON: f32 = 0.01;
        let factor = self.config.smooth_factor.powf(dt_ms / REFERENCE_FRAME_MS);
        self.offset = self.offset.lerp(&T::zero(), 1.0 - factor);
        if self.offset.distance(&T::zero()) < EPSILON {
            self.offset = T::zero();
        }
    }

    /// Apply the current offset on top of an authoritative render value.
    pub fn apply(&self, authoritative: &T) -> T {
        authoritative.extrapolate(&self.offset, 1.0)
    }

    pub fn offset(&self) -> &T {
        &self.offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_and_applies_offset() {
        let mut smoother: VisualSmoother<f32> = VisualSmoother::new(VisualSmootherConfig {
            smooth_factor: 0.9,
            snap_threshold: 50.0,
        });
        smoother.record_correction(&10.0, &0.0);
        assert!((smoother.offset() - 10.0).abs() < 1e-6);
        assert!((smoother.apply(&0.0) - 10.0).abs() < 1e-6);
    }

    #[test]
    fn decays_toward_zero_over_time() {
        let mut smoother: VisualSmoother<f32> = VisualSmoother::new(VisualSmootherConfig {
            smooth_factor: 0.9,
            snap_threshold: 50.0,
        });
        smoother.record_correction(&10.0, &0.0);
        for _ in 0..200 {
            smoother.decay(REFERENCE_FRAME_MS);
        }
        // not just "small": the epsilon clamp snaps it to exact zero.
        assert_eq!(*smoother.offset(), 0.0);
    }

    #[test]
    fn large_correction_snaps_instead_of_accumulating() {
        let mut smoother: VisualSmoother<f32> = VisualSmoother::new(VisualSmootherConfig {
            smooth_factor: 0.9,
            snap_threshold: 50.0,
        });
        smoother.record_correction(&10.0, &0.0);
        smoother.record_correction(&1000.0, &0.0);
        assert_eq!(*smoother.offset(), 0.0);
    }
}
