//! Shared support code for integration tests. Not a test binary itself
//! (`tests/scenarios.rs` pulls it in with `mod support;`).

pub mod platformer;
