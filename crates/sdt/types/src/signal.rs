//! Fixed-point phase and entropy signals.
//!
//! Both signals are produced by collaborators outside the gate. The gate
//! never rejects them: anything out of range is wrapped (phase) or clamped
//! (entropy, running average).

use std::fmt;

use serde::{Deserialize, Serialize};

/// A cyclical timing/alignment signal. 65536 units make one full turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhaseAngle(pub u16);

impl PhaseAngle {
    /// Units in one full turn.
    pub const FULL_TURN: i64 = 65_536;

    /// Half a turn: the largest possible circular distance.
    const HALF_TURN: f64 = 32_768.0;

    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    /// Wrap any integer onto the circle.
    pub fn wrapping(raw: i64) -> Self {
        Self(raw.rem_euclid(Self::FULL_TURN) as u16)
    }

    /// Convert an angle in radians. Non-finite input maps to zero.
    pub fn from_radians(radians: f64) -> Self {
        if !radians.is_finite() {
            return Self(0);
        }
        let turns = radians / std::f64::consts::TAU;
        let units = (turns.rem_euclid(1.0) * Self::FULL_TURN as f64).round() as i64;
        Self::wrapping(units)
    }

    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Shortest circular distance to `other`, normalized to `[0, 1]`.
    ///
    /// `0.0` means aligned, `1.0` means diametrically opposite.
    pub fn distance(self, other: PhaseAngle) -> f64 {
        let forward = self.0.wrapping_sub(other.0);
        let backward = other.0.wrapping_sub(self.0);
        f64::from(forward.min(backward)) / Self::HALF_TURN
    }
}

impl fmt::Display for PhaseAngle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for PhaseAngle {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

/// Freshness/randomness proxy for the input stream.
///
/// Low values indicate a starved or stale stream. This is not
/// cryptographic entropy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Entropy(pub u16);

impl Entropy {
    pub const MIN: Entropy = Entropy(0);
    pub const MAX: Entropy = Entropy(u16::MAX);

    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    /// Clamp any integer into range.
    pub fn saturating(raw: i64) -> Self {
        Self(raw.clamp(0, i64::from(u16::MAX)) as u16)
    }

    /// Convert a unit-interval value. NaN maps to zero.
    pub fn from_unit(value: f64) -> Self {
        if value.is_nan() {
            return Self::MIN;
        }
        Self((value.clamp(0.0, 1.0) * f64::from(u16::MAX)).round() as u16)
    }

    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Entropy as a fraction of its maximum.
    pub fn normalized(self) -> f64 {
        f64::from(self.0) / f64::from(u16::MAX)
    }
}

impl fmt::Display for Entropy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for Entropy {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

/// Everything a crystal sees besides the payload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub phase_angle: PhaseAngle,
    pub entropy: Entropy,
    /// Running average of recent aggregate strength, in `[0, 1]`.
    ///
    /// Adaptation state lives with the caller; crystals only read it.
    pub running_average: f64,
}

impl Signal {
    pub fn new(phase_angle: PhaseAngle, entropy: Entropy) -> Self {
        Self {
            phase_angle,
            entropy,
            running_average: 0.0,
        }
    }

    /// Attach a running average, clamped to `[0, 1]` (NaN becomes 0).
    pub fn with_running_average(mut self, average: f64) -> Self {
        self.running_average = if average.is_nan() {
            0.0
        } else {
            average.clamp(0.0, 1.0)
        };
        self
    }
}
