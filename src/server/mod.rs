//! Server-side half of the engine: per-tick world stepping, input/action
//! intake, lag compensation and the orchestrator that drives it all.

pub mod input_queue;
pub mod lag_compensation;
pub mod orchestrator;
pub mod tick_processor;
