//! Types and utilities shared by both the server and client halves of the
//! engine, plus the game plug-in contract itself.

pub mod clock_sync;
pub mod config;
pub mod error;
pub mod game;
pub mod history_buffer;
pub mod id;
pub mod snapshot;
pub mod tick;
pub mod transport;
