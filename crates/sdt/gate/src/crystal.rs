//! Resonance evaluators.
//!
//! A crystal scores a payload against the current phase and entropy
//! signals. Scoring is a pure function of its inputs: crystals hold no
//! mutable state and may be invoked from any number of threads at once.

use std::fmt;

use sdt_types::{CrystalFamily, CrystalProfile, PhaseAngle, SdtResult, Signal};

/// Scoring contract shared by every crystal family.
///
/// Implementations must be deterministic and must not fail. Scores outside
/// `[0, 1]` are clamped by the caller; non-finite scores count as zero.
pub trait Crystal: Send + Sync + fmt::Debug {
    fn family(&self) -> CrystalFamily;

    /// Ring strength of `payload` under `signal`, in `[0, 1]`.
    fn evaluate(&self, payload: &[u8], signal: &Signal) -> f64;
}

/// Stable content fingerprint of a payload.
///
/// First eight bytes of the BLAKE3 digest, little endian.
pub fn fingerprint(payload: &[u8]) -> u64 {
    let digest = blake3::hash(payload);
    let mut word = [0u8; 8];
    word.copy_from_slice(&digest.as_bytes()[..8]);
    u64::from_le_bytes(word)
}

/// Phase a payload resonates at: the top 16 bits of its fingerprint.
pub fn implied_phase(payload: &[u8]) -> PhaseAngle {
    PhaseAngle((fingerprint(payload) >> 48) as u16)
}

/// Clamp a score into `[0, 1]`, mapping NaN to zero.
pub(crate) fn clamp_unit(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

/// A built-in crystal: one family plus its weighting curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfiledCrystal {
    family: CrystalFamily,
    profile: CrystalProfile,
}

impl ProfiledCrystal {
    /// Crystal with the default curve of `family`.
    pub fn new(family: CrystalFamily) -> Self {
        Self {
            family,
            profile: CrystalProfile::for_family(family),
        }
    }

    /// Crystal with a custom curve. Fails if the curve is malformed.
    pub fn with_profile(family: CrystalFamily, profile: CrystalProfile) -> SdtResult<Self> {
        profile.validate()?;
        Ok(Self { family, profile })
    }

    pub fn profile(&self) -> &CrystalProfile {
        &self.profile
    }
}

impl Crystal for ProfiledCrystal {
    fn family(&self) -> CrystalFamily {
        self.family
    }

    fn evaluate(&self, payload: &[u8], signal: &Signal) -> f64 {
        if payload.is_empty() {
            return 0.0;
        }

        let distance = implied_phase(payload).distance(signal.phase_angle);
        let entropy = signal.entropy.normalized();
        let profile = &self.profile;

        let (term, sharpness) = match self.family {
            CrystalFamily::Orbital | CrystalFamily::GroundStation | CrystalFamily::Silent => {
                (1.0 - distance, profile.sharpness)
            }
            CrystalFamily::TarPit => (distance, profile.sharpness),
            CrystalFamily::Adaptive => {
                let average = clamp_unit(signal.running_average);
                (1.0 - distance, profile.sharpness * (1.0 + average))
            }
        };

        let total = profile.phase_weight + profile.entropy_weight;
        if total <= 0.0 {
            return 0.0;
        }
        let raw = (profile.phase_weight * term.powf(sharpness) + profile.entropy_weight * entropy)
            / total;

        clamp_unit(raw).min(profile.ceiling)
    }
}
