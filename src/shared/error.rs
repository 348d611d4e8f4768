//! Error taxonomy (spec.md §7).
//!
//! Mirrors the teacher's small `thiserror`-derived error enums (e.g.
//! `lightyear_connection::client::ConnectionError`) rather than
//! stringly-typed errors.

use crate::shared::id::ClientId;
use thiserror::Error;

/// Fatal errors for a single client session (handshake/config mismatch,
/// timeout). These end that client's session but never bring down the
/// orchestrator itself.
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("tick interval mismatch: server={server_ms}ms client={client_ms}ms (tolerance 1ms)")]
    TickIntervalMismatch { server_ms: u32, client_ms: u32 },

    #[error("config handshake timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// General engine-level errors.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("handshake failed: {0}")]
    Handshake(#[from] HandshakeError),

    #[error("unknown client: {0}")]
    UnknownClient(ClientId),

    #[error("simulation plug-in was not initialized before use")]
    NotInitialized,

    #[error("malformed message from {client}: {reason}")]
    MalformedMessage { client: ClientId, reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Outcome of a lag-compensated action validation (spec.md §4.11). Not an
/// `Err` variant: a miss is an expected, user-visible outcome the caller
/// decides how to present, not an engine failure.
#[derive(Debug, Clone, PartialEq)]
pub struct LagCompensationMiss;
