//! Ensemble voting over crystals.

use sdt_types::{
    validate_composition, CrystalConfig, CrystalFamily, PolycrystalConfig, SdtResult, Signal,
    VotingPolicy, MAX_CRYSTALS,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::crystal::{clamp_unit, Crystal, ProfiledCrystal};

/// Outcome of one ensemble evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub passed: bool,
    pub aggregate_strength: f64,
    /// Crystals whose score met the fire threshold.
    pub passing: usize,
    /// Crystals that were evaluated.
    pub evaluated: usize,
}

impl Vote {
    /// The "gate stays closed" vote.
    pub fn closed() -> Self {
        Self {
            passed: false,
            aggregate_strength: 0.0,
            passing: 0,
            evaluated: 0,
        }
    }
}

/// An ordered ensemble of crystals under one voting policy.
///
/// A polycrystal with no crystals is valid: it never passes.
#[derive(Debug)]
pub struct Polycrystal {
    crystals: Vec<Box<dyn Crystal>>,
    weights: Vec<Option<f64>>,
    policy: VotingPolicy,
}

impl Polycrystal {
    /// Empty ensemble under `policy`.
    pub fn new(policy: VotingPolicy) -> Self {
        Self {
            crystals: Vec::new(),
            weights: Vec::new(),
            policy,
        }
    }

    /// Build the ensemble described by a configuration.
    pub fn from_config(config: &PolycrystalConfig) -> SdtResult<Self> {
        config.validate()?;
        let mut polycrystal = Self::new(config.policy);
        for CrystalConfig {
            family,
            profile,
            weight,
        } in &config.crystals
        {
            let crystal = match profile {
                Some(profile) => ProfiledCrystal::with_profile(*family, *profile)?,
                None => ProfiledCrystal::new(*family),
            };
            polycrystal.crystals.push(Box::new(crystal));
            polycrystal.weights.push(*weight);
        }
        Ok(polycrystal)
    }

    /// Append a crystal without an explicit weight.
    pub fn with_crystal(mut self, crystal: impl Crystal + 'static) -> Self {
        self.crystals.push(Box::new(crystal));
        self.weights.push(None);
        self
    }

    /// Append a crystal with a voting weight.
    pub fn with_weighted_crystal(mut self, crystal: impl Crystal + 'static, weight: f64) -> Self {
        self.crystals.push(Box::new(crystal));
        self.weights.push(Some(weight));
        self
    }

    /// Check that the policy can be satisfied by this composition.
    pub fn validate(&self) -> SdtResult<()> {
        validate_composition(self.policy, &self.weights)
    }

    pub fn policy(&self) -> VotingPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.crystals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.crystals.is_empty()
    }

    /// Families of the crystals, in evaluation order.
    pub fn families(&self) -> impl Iterator<Item = CrystalFamily> + '_ {
        self.crystals.iter().map(|c| c.family())
    }

    /// Score `payload` with every crystal and combine the votes.
    ///
    /// A crystal passes when its score reaches `fire_threshold`. Scores are
    /// gathered into a stack buffer; nothing is allocated. Only the first
    /// [`MAX_CRYSTALS`] crystals are scored, so an ensemble that would fail
    /// [`Polycrystal::validate`] is silently truncated in release builds.
    pub fn evaluate(&self, payload: &[u8], signal: &Signal, fire_threshold: f64) -> Vote {
        debug_assert!(
            self.crystals.len() <= MAX_CRYSTALS,
            "polycrystal holds {} crystals, at most {} are evaluated",
            self.crystals.len(),
            MAX_CRYSTALS
        );
        let count = self.crystals.len().min(MAX_CRYSTALS);
        if count == 0 {
            return Vote::closed();
        }

        let mut buffer = [0.0f64; MAX_CRYSTALS];
        let mut passing = 0usize;
        for (slot, crystal) in buffer.iter_mut().zip(&self.crystals) {
            let score = clamp_unit(crystal.evaluate(payload, signal));
            if score >= fire_threshold {
                passing += 1;
            }
            *slot = score;
        }
        let scores = &mut buffer[..count];

        let (passed, aggregate) = match self.policy {
            VotingPolicy::Any => (passing > 0, scores.iter().copied().fold(0.0, f64::max)),
            VotingPolicy::All => (
                passing == count,
                scores.iter().copied().fold(1.0, f64::min),
            ),
            VotingPolicy::Majority => {
                let sum: f64 = scores.iter().filter(|s| **s >= fire_threshold).sum();
                let mean = if passing == 0 { 0.0 } else { sum / passing as f64 };
                (passing * 2 > count, mean)
            }
            VotingPolicy::Weighted => {
                let mut total = 0.0;
                let mut passing_weight = 0.0;
                let mut weighted_sum = 0.0;
                for (score, weight) in scores.iter().zip(&self.weights) {
                    let weight = weight.unwrap_or(0.0);
                    total += weight;
                    weighted_sum += weight * score;
                    if *score >= fire_threshold {
                        passing_weight += weight;
                    }
                }
                if total <= 0.0 {
                    (false, 0.0)
                } else {
                    (passing_weight >= 0.5 * total, weighted_sum / total)
                }
            }
            VotingPolicy::Quorum(required) => {
                let take = required.clamp(1, count);
                scores.sort_unstable_by(|a, b| b.total_cmp(a));
                let mean = scores[..take].iter().sum::<f64>() / take as f64;
                (required > 0 && passing >= required, mean)
            }
        };

        if passed && passing == 0 {
            error!(
                policy = %self.policy,
                evaluated = count,
                families = ?self.families().collect::<Vec<_>>(),
                "Ensemble passed with no passing crystal, denying"
            );
            return Vote {
                evaluated: count,
                ..Vote::closed()
            };
        }

        Vote {
            passed,
            aggregate_strength: clamp_unit(aggregate),
            passing,
            evaluated: count,
        }
    }
}
