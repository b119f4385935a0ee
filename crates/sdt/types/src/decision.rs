use serde::{Deserialize, Serialize};

use crate::signal::{Entropy, PhaseAngle};
use crate::state::GateState;

/// Admission verdict for one `resonate` call.
///
/// Taken as a single snapshot after the transition was installed, so every
/// field describes the same evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Whether the associated command may proceed.
    pub allowed: bool,
    pub gate_state: GateState,
    /// Ensemble score of the evaluation this decision reflects.
    pub aggregate_strength: f64,
    pub phase_angle: PhaseAngle,
    pub entropy: Entropy,
    pub supersession_count: u64,
    pub trigger_count: u64,
    /// Last applied tick of the gate.
    pub tick: u64,
    /// True when the call was rejected as stale and nothing but the
    /// supersession counter changed.
    pub superseded: bool,
}

impl Decision {
    pub fn is_denied(&self) -> bool {
        !self.allowed
    }
}
