use std::fmt;

use serde::{Deserialize, Serialize};

/// State of a thyristor gate.
///
/// `Off -> Primed -> Conducting -> Latched`, with `Off` reachable from any
/// state through an anode drop or an authorized reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    /// Rest state, flow blocked.
    #[default]
    Off,

    /// Armed by one threshold-crossing tick, flow still blocked.
    Primed,

    /// Confirmed on a second tick, flow allowed while the score holds.
    Conducting,

    /// Held open by the caller until an authorized reset.
    Latched,
}

impl GateState {
    /// Whether commands may pass in this state.
    pub fn allows_flow(self) -> bool {
        matches!(self, GateState::Conducting | GateState::Latched)
    }

    /// Compact code used by the shared state record.
    pub fn code(self) -> u8 {
        match self {
            GateState::Off => 0,
            GateState::Primed => 1,
            GateState::Conducting => 2,
            GateState::Latched => 3,
        }
    }

    /// Inverse of [`GateState::code`]. Unknown codes decode to `Off`.
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => GateState::Primed,
            2 => GateState::Conducting,
            3 => GateState::Latched,
            _ => GateState::Off,
        }
    }
}

impl fmt::Display for GateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateState::Off => write!(f, "off"),
            GateState::Primed => write!(f, "primed"),
            GateState::Conducting => write!(f, "conducting"),
            GateState::Latched => write!(f, "latched"),
        }
    }
}

/// Scoring family of a crystal evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrystalFamily {
    /// Rewards small phase distance heavily.
    Orbital,
    /// Balanced, linear weighting of phase alignment and entropy.
    GroundStation,
    /// Inverted: admits only anomalous (high-distance) payloads.
    TarPit,
    /// Caps the achievable score to suppress escalation.
    Silent,
    /// Tightens its curve as the supplied running average rises.
    Adaptive,
}

impl fmt::Display for CrystalFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrystalFamily::Orbital => write!(f, "orbital"),
            CrystalFamily::GroundStation => write!(f, "ground_station"),
            CrystalFamily::TarPit => write!(f, "tar_pit"),
            CrystalFamily::Silent => write!(f, "silent"),
            CrystalFamily::Adaptive => write!(f, "adaptive"),
        }
    }
}

/// How a polycrystal turns per-crystal votes into one decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VotingPolicy {
    /// At least one crystal passes. Aggregate is the max score.
    Any,
    /// Every crystal passes. Aggregate is the min score.
    All,
    /// More than half pass. Aggregate is the mean of passing scores.
    Majority,
    /// Passing weight reaches half the total. Aggregate is the weighted mean.
    Weighted,
    /// At least N pass. Aggregate is the mean of the N highest scores.
    Quorum(usize),
}

impl fmt::Display for VotingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VotingPolicy::Any => write!(f, "any"),
            VotingPolicy::All => write!(f, "all"),
            VotingPolicy::Majority => write!(f, "majority"),
            VotingPolicy::Weighted => write!(f, "weighted"),
            VotingPolicy::Quorum(n) => write!(f, "quorum({})", n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_conducting_and_latched_allow_flow() {
        assert!(!GateState::Off.allows_flow());
        assert!(!GateState::Primed.allows_flow());
        assert!(GateState::Conducting.allows_flow());
        assert!(GateState::Latched.allows_flow());
    }

    #[test]
    fn state_codes_roundtrip() {
        for state in [
            GateState::Off,
            GateState::Primed,
            GateState::Conducting,
            GateState::Latched,
        ] {
            assert_eq!(GateState::from_code(state.code()), state);
        }
    }

    #[test]
    fn unknown_code_fails_toward_off() {
        assert_eq!(GateState::from_code(200), GateState::Off);
    }

    #[test]
    fn quorum_serializes_with_count() {
        let json = serde_json::to_string(&VotingPolicy::Quorum(3)).unwrap();
        assert_eq!(json, r#"{"quorum":3}"#);
        let policy: VotingPolicy = serde_json::from_str(r#""majority""#).unwrap();
        assert_eq!(policy, VotingPolicy::Majority);
    }

    #[test]
    fn display_formats() {
        assert_eq!(GateState::Conducting.to_string(), "conducting");
        assert_eq!(CrystalFamily::TarPit.to_string(), "tar_pit");
        assert_eq!(VotingPolicy::Quorum(2).to_string(), "quorum(2)");
    }
}
