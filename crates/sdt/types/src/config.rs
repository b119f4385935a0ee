//! Gate configuration.
//!
//! Loaded once by an external collaborator, validated at construction time
//! and shared by reference afterwards. Nothing here is consulted for
//! validity on the hot path.

use serde::{Deserialize, Serialize};

use crate::error::{SdtError, SdtResult};
use crate::signal::Entropy;
use crate::state::{CrystalFamily, VotingPolicy};

/// Maximum number of crystals in one polycrystal.
///
/// Scores are collected into a fixed stack buffer of this size.
pub const MAX_CRYSTALS: usize = 32;

/// Thresholds and starvation rules of the thyristor state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThyristorConfig {
    /// Score required to move Off -> Primed -> Conducting.
    pub fire_threshold: f64,

    /// Minimum score to remain Conducting. Must not exceed `fire_threshold`.
    pub hold_threshold: f64,

    /// Entropy below this value counts as a starved tick.
    pub entropy_floor: Entropy,

    /// Consecutive starved ticks that force an anode drop.
    pub starvation_window: u32,

    /// Whether `reset` must present a valid authorization token.
    pub requires_auth_for_reset: bool,

    /// Smoothing factor of the running resonance average fed to adaptive
    /// crystals, in `(0, 1]`.
    #[serde(default = "default_resonance_smoothing")]
    pub resonance_smoothing: f64,
}

fn default_resonance_smoothing() -> f64 {
    0.125
}

impl Default for ThyristorConfig {
    fn default() -> Self {
        Self {
            fire_threshold: 0.8,
            hold_threshold: 0.6,
            entropy_floor: Entropy(1_000),
            starvation_window: 5,
            requires_auth_for_reset: true,
            resonance_smoothing: default_resonance_smoothing(),
        }
    }
}

/// Named presets for common deployments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateProfile {
    Standard,
    /// High thresholds, short starvation window.
    Strict,
    /// Low thresholds, long starvation window.
    Permissive,
    /// Relaxed thresholds and unauthenticated resets for local testing.
    Development,
}

impl ThyristorConfig {
    /// Create config tuned for a deployment profile.
    pub fn for_profile(profile: GateProfile) -> Self {
        let mut config = Self::default();

        match profile {
            GateProfile::Standard => {}
            GateProfile::Strict => {
                config.fire_threshold = 0.9;
                config.hold_threshold = 0.8;
                config.entropy_floor = Entropy(4_000);
                config.starvation_window = 3;
            }
            GateProfile::Permissive => {
                config.fire_threshold = 0.6;
                config.hold_threshold = 0.4;
                config.entropy_floor = Entropy(500);
                config.starvation_window = 10;
            }
            GateProfile::Development => {
                config.fire_threshold = 0.5;
                config.hold_threshold = 0.3;
                config.entropy_floor = Entropy(0);
                config.starvation_window = 16;
                config.requires_auth_for_reset = false;
            }
        }

        config
    }

    pub fn validate(&self) -> SdtResult<()> {
        check_unit("fire_threshold", self.fire_threshold)?;
        check_unit("hold_threshold", self.hold_threshold)?;
        if self.hold_threshold > self.fire_threshold {
            return Err(SdtError::InvalidConfiguration(format!(
                "hold_threshold {} exceeds fire_threshold {}",
                self.hold_threshold, self.fire_threshold
            )));
        }
        if self.starvation_window == 0 {
            return Err(SdtError::InvalidConfiguration(
                "starvation_window must be at least one tick".into(),
            ));
        }
        if !(self.resonance_smoothing > 0.0 && self.resonance_smoothing <= 1.0) {
            return Err(SdtError::InvalidConfiguration(format!(
                "resonance_smoothing {} outside (0, 1]",
                self.resonance_smoothing
            )));
        }
        Ok(())
    }
}

/// Weighting/clamping curve of a crystal.
///
/// Score = `min(ceiling, (phase_weight * term^sharpness + entropy_weight * entropy)
/// / (phase_weight + entropy_weight))`, where `term` is phase alignment or,
/// for tar pits, phase distance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CrystalProfile {
    pub phase_weight: f64,
    pub entropy_weight: f64,
    /// Exponent applied to the phase term. Higher is more selective.
    pub sharpness: f64,
    /// Maximum achievable score.
    pub ceiling: f64,
}

impl CrystalProfile {
    /// Default curve for a family.
    pub fn for_family(family: CrystalFamily) -> Self {
        match family {
            CrystalFamily::Orbital => Self {
                phase_weight: 0.8,
                entropy_weight: 0.2,
                sharpness: 3.0,
                ceiling: 1.0,
            },
            CrystalFamily::GroundStation => Self {
                phase_weight: 0.5,
                entropy_weight: 0.5,
                sharpness: 1.0,
                ceiling: 1.0,
            },
            CrystalFamily::TarPit => Self {
                phase_weight: 0.8,
                entropy_weight: 0.2,
                sharpness: 2.0,
                ceiling: 1.0,
            },
            CrystalFamily::Silent => Self {
                phase_weight: 0.5,
                entropy_weight: 0.5,
                sharpness: 1.0,
                ceiling: 0.5,
            },
            CrystalFamily::Adaptive => Self {
                phase_weight: 0.7,
                entropy_weight: 0.3,
                sharpness: 2.0,
                ceiling: 1.0,
            },
        }
    }

    pub fn validate(&self) -> SdtResult<()> {
        check_weight("phase_weight", self.phase_weight)?;
        check_weight("entropy_weight", self.entropy_weight)?;
        if self.phase_weight + self.entropy_weight <= 0.0 {
            return Err(SdtError::InvalidConfiguration(
                "crystal profile weights sum to zero".into(),
            ));
        }
        if !(self.sharpness.is_finite() && self.sharpness > 0.0) {
            return Err(SdtError::InvalidConfiguration(format!(
                "sharpness {} must be positive",
                self.sharpness
            )));
        }
        if !(self.ceiling > 0.0 && self.ceiling <= 1.0) {
            return Err(SdtError::InvalidConfiguration(format!(
                "ceiling {} outside (0, 1]",
                self.ceiling
            )));
        }
        Ok(())
    }
}

/// One crystal of a polycrystal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrystalConfig {
    pub family: CrystalFamily,

    /// Curve override. Defaults to the family curve.
    #[serde(default)]
    pub profile: Option<CrystalProfile>,

    /// Voting weight. Required only for the weighted policy.
    #[serde(default)]
    pub weight: Option<f64>,
}

impl CrystalConfig {
    pub fn new(family: CrystalFamily) -> Self {
        Self {
            family,
            profile: None,
            weight: None,
        }
    }

    pub fn with_profile(mut self, profile: CrystalProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn resolved_profile(&self) -> CrystalProfile {
        self.profile
            .unwrap_or_else(|| CrystalProfile::for_family(self.family))
    }
}

/// Composition and voting policy of a polycrystal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolycrystalConfig {
    pub policy: VotingPolicy,
    #[serde(default)]
    pub crystals: Vec<CrystalConfig>,
}

impl Default for PolycrystalConfig {
    fn default() -> Self {
        Self {
            policy: VotingPolicy::Majority,
            crystals: vec![
                CrystalConfig::new(CrystalFamily::Orbital),
                CrystalConfig::new(CrystalFamily::GroundStation),
                CrystalConfig::new(CrystalFamily::Adaptive),
            ],
        }
    }
}

impl PolycrystalConfig {
    pub fn validate(&self) -> SdtResult<()> {
        for crystal in &self.crystals {
            crystal.resolved_profile().validate()?;
        }
        let weights: Vec<Option<f64>> = self.crystals.iter().map(|c| c.weight).collect();
        validate_composition(self.policy, &weights)
    }
}

/// Check that a voting policy is satisfiable by a crystal composition.
///
/// `weights` holds one entry per crystal. An empty composition is valid
/// for every policy except a quorum: it is the "always closed" gate.
pub fn validate_composition(policy: VotingPolicy, weights: &[Option<f64>]) -> SdtResult<()> {
    let count = weights.len();
    if count > MAX_CRYSTALS {
        return Err(SdtError::InvalidConfiguration(format!(
            "{} crystals configured, at most {} supported",
            count, MAX_CRYSTALS
        )));
    }
    for weight in weights.iter().flatten() {
        check_weight("crystal weight", *weight)?;
    }

    match policy {
        VotingPolicy::Weighted if count > 0 => {
            if weights.iter().any(Option::is_none) {
                return Err(SdtError::InvalidConfiguration(
                    "weighted policy requires a weight for every crystal".into(),
                ));
            }
            let total: f64 = weights.iter().flatten().sum();
            if total <= 0.0 {
                return Err(SdtError::InvalidConfiguration(
                    "weighted policy requires a positive total weight".into(),
                ));
            }
        }
        VotingPolicy::Quorum(0) => {
            return Err(SdtError::InvalidConfiguration(
                "quorum must require at least one crystal".into(),
            ));
        }
        VotingPolicy::Quorum(n) if n > count => {
            return Err(SdtError::InvalidConfiguration(format!(
                "quorum({}) cannot be met by {} crystals",
                n, count
            )));
        }
        _ => {}
    }
    Ok(())
}

/// Everything needed to build the gate of one channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub thyristor: ThyristorConfig,
    pub polycrystal: PolycrystalConfig,
}

impl ChannelConfig {
    /// Parse and validate a JSON channel configuration.
    pub fn from_json(text: &str) -> SdtResult<Self> {
        let config: ChannelConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SdtResult<()> {
        self.thyristor.validate()?;
        self.polycrystal.validate()
    }
}

fn check_unit(name: &str, value: f64) -> SdtResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(SdtError::InvalidConfiguration(format!(
            "{} {} outside [0, 1]",
            name, value
        )))
    }
}

fn check_weight(name: &str, value: f64) -> SdtResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(SdtError::InvalidConfiguration(format!(
            "{} {} must be finite and non-negative",
            name, value
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(ThyristorConfig::default().validate().is_ok());
        assert!(ChannelConfig::default().validate().is_ok());
    }

    #[test]
    fn every_profile_is_valid() {
        for profile in [
            GateProfile::Standard,
            GateProfile::Strict,
            GateProfile::Permissive,
            GateProfile::Development,
        ] {
            assert!(ThyristorConfig::for_profile(profile).validate().is_ok());
        }
        assert!(!ThyristorConfig::for_profile(GateProfile::Development).requires_auth_for_reset);
    }

    #[test]
    fn hold_above_fire_is_rejected() {
        let config = ThyristorConfig {
            hold_threshold: 0.9,
            fire_threshold: 0.8,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SdtError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn zero_window_and_bad_thresholds_are_rejected() {
        let zero_window = ThyristorConfig {
            starvation_window: 0,
            ..Default::default()
        };
        assert!(zero_window.validate().is_err());

        let nan_fire = ThyristorConfig {
            fire_threshold: f64::NAN,
            ..Default::default()
        };
        assert!(nan_fire.validate().is_err());

        let zero_smoothing = ThyristorConfig {
            resonance_smoothing: 0.0,
            ..Default::default()
        };
        assert!(zero_smoothing.validate().is_err());
    }

    #[test]
    fn family_profiles_are_valid() {
        for family in [
            CrystalFamily::Orbital,
            CrystalFamily::GroundStation,
            CrystalFamily::TarPit,
            CrystalFamily::Silent,
            CrystalFamily::Adaptive,
        ] {
            assert!(CrystalProfile::for_family(family).validate().is_ok());
        }
        assert_eq!(CrystalProfile::for_family(CrystalFamily::Silent).ceiling, 0.5);
    }

    #[test]
    fn negative_weight_is_rejected() {
        let result = validate_composition(VotingPolicy::Any, &[Some(1.0), Some(-0.5)]);
        assert!(result.is_err());
    }

    #[test]
    fn weighted_requires_every_weight() {
        assert!(validate_composition(VotingPolicy::Weighted, &[Some(1.0), None]).is_err());
        assert!(validate_composition(VotingPolicy::Weighted, &[Some(0.0), Some(0.0)]).is_err());
        assert!(validate_composition(VotingPolicy::Weighted, &[Some(1.0), Some(2.0)]).is_ok());
        // Empty weighted ensemble is an always-closed gate, not an error
        assert!(validate_composition(VotingPolicy::Weighted, &[]).is_ok());
    }

    #[test]
    fn quorum_bounds() {
        assert!(validate_composition(VotingPolicy::Quorum(0), &[None]).is_err());
        assert!(validate_composition(VotingPolicy::Quorum(2), &[]).is_err());
        assert!(validate_composition(VotingPolicy::Quorum(3), &[None, None]).is_err());
        assert!(validate_composition(VotingPolicy::Quorum(2), &[None, None]).is_ok());
    }

    #[test]
    fn empty_composition_is_valid() {
        assert!(validate_composition(VotingPolicy::All, &[]).is_ok());
        assert!(validate_composition(VotingPolicy::Any, &[]).is_ok());
    }

    #[test]
    fn too_many_crystals_rejected() {
        let weights = vec![None; MAX_CRYSTALS + 1];
        assert!(validate_composition(VotingPolicy::Any, &weights).is_err());
    }

    #[test]
    fn channel_config_from_json() {
        let text = r#"{
            "thyristor": {
                "fire_threshold": 0.8,
                "hold_threshold": 0.6,
                "entropy_floor": 1000,
                "starvation_window": 5,
                "requires_auth_for_reset": true
            },
            "polycrystal": {
                "policy": { "quorum": 2 },
                "crystals": [
                    { "family": "orbital" },
                    { "family": "ground_station" },
                    { "family": "silent", "profile": {
                        "phase_weight": 1.0,
                        "entropy_weight": 0.0,
                        "sharpness": 1.0,
                        "ceiling": 0.3
                    } }
                ]
            }
        }"#;

        let config = ChannelConfig::from_json(text).unwrap();
        assert_eq!(config.polycrystal.policy, VotingPolicy::Quorum(2));
        assert_eq!(config.polycrystal.crystals.len(), 3);
        assert_eq!(config.thyristor.resonance_smoothing, 0.125);
        assert_eq!(config.polycrystal.crystals[2].resolved_profile().ceiling, 0.3);
    }

    #[test]
    fn channel_config_from_json_validates() {
        let text = r#"{
            "thyristor": {
                "fire_threshold": 0.5,
                "hold_threshold": 0.7,
                "entropy_floor": 1000,
                "starvation_window": 5,
                "requires_auth_for_reset": false
            },
            "polycrystal": { "policy": "any", "crystals": [] }
        }"#;
        assert!(matches!(
            ChannelConfig::from_json(text),
            Err(SdtError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            ChannelConfig::from_json("not json"),
            Err(SdtError::ConfigParse(_))
        ));
    }
}
