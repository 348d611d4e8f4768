//! Discrete server tick counter with wrapping arithmetic.
//!
//! Mirrors the teacher's `wrapping_id!(Tick)` pattern: a `u16`-backed
//! counter that wraps at `u16::MAX`, with `Tick + i16 -> Tick` and
//! `Tick - Tick -> i16` so that buffers can be indexed by tick offset.

use core::cmp::Ordering;
use core::fmt;
use core::ops::{Add, Sub};
use serde::{Deserialize, Serialize};

/// A server tick number. Monotonic in practice (incremented once per
/// tick by the [`crate::server::orchestrator::ServerOrchestrator`]), but
/// represented as a wrapping counter so long-running servers don't
/// overflow.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tick(pub u16);

impl Tick {
    pub const ZERO: Tick = Tick(0);

    /// Signed distance `self - other`, accounting for wraparound by
    /// treating the two ticks as never more than `u16::MAX / 2` apart.
    /// This is the teacher's half-range comparison trick for wrapping
    /// sequence numbers.
    pub fn diff(self, other: Tick) -> i16 {
        self.0.wrapping_sub(other.0) as i16
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tick({})", self.0)
    }
}

impl Add<i16> for Tick {
    type Output = Tick;
    fn add(self, rhs: i16) -> Tick {
        Tick(self.0.wrapping_add(rhs as u16))
    }
}

impl Sub<Tick> for Tick {
    type Output = i16;
    fn sub(self, rhs: Tick) -> i16 {
        self.diff(rhs)
    }
}

impl Sub<i16> for Tick {
    type Output = Tick;
    fn sub(self, rhs: i16) -> Tick {
        Tick(self.0.wrapping_sub(rhs as u16))
    }
}

impl PartialOrd for Tick {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Tick {
    /// Orders by wraparound-aware signed difference rather than raw `u16`
    /// value, so a tick counter that has wrapped still compares correctly
    /// against recent ticks.
    fn cmp(&self, other: &Self) -> Ordering {
        self.diff(*other).cmp(&0)
    }
}
