//! Client-side prediction of the local player's predictable slice of the
//! world (spec.md §4.5).

use crate::shared::game::PredictionScope;
use crate::shared::id::ClientId;
use crate::shared::tick::Tick;

/// Holds the locally-predicted slice of the world and the tick it was
/// last advanced to. Reset to the server's authoritative value by
/// [`crate::client::reconciler::Reconciler::reconcile`].
pub struct Predictor<S: PredictionScope> {
    predicted: Option<S::Predicted>,
    tick: Tick,
}

impl<S: PredictionScope> Predictor<S> {
    pub fn new() -> Self {
        Self {
            predicted: None,
            tick: Tick::ZERO,
        }
    }

    pub fn current(&self) -> Option<&S::Predicted> {
        self.predicted.as_ref()
    }

    pub fn tick(&self) -> Tick {
        self.tick
    }

    /// Installs a new baseline (after reconciliation, or on first spawn).
    pub fn set_base(&mut self, predicted: S::Predicted, tick: Tick) {
        self.predicted = Some(predicted);
        self.tick = tick;
    }

    /// Steps the predicted slice forward by one tick using freshly
    /// captured local input. No-op (returns `None`) until a baseline has
    /// been installed via [`Self::set_base`].
    pub fn predict_tick(
        &mut self,
        sim: &S,
        input: &S::Input,
        dt_ms: f64,
        local_id: &ClientId,
    ) -> Option<&S::Predicted> {
        let base = self.predicted.as_ref()?;
        let next = sim.simulate_predicted(base, input, dt_ms, local_id);
        self.predicted = Some(next);
        self.tick = self.tick + 1;
        self.predicted.as_ref()
    }
}

impl<S: PredictionScope> Default for Predictor<S> {
    fn default() -> Self {
        Self::new()
    }
}
