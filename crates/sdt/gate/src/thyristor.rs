//! Thyristor transition function.
//!
//! Pure functions from the current snapshot and one excitation to the next
//! snapshot. The gate runs them inside the plasma CAS loop, so they may be
//! evaluated several times per call and must not have side effects.
//!
//! | From | Condition | To |
//! |------|-----------|----|
//! | any non-Off | starvation streak reaches the window | Off (anode drop) |
//! | Off | fires and entropy at or above the floor | Primed |
//! | Primed | fires | Conducting |
//! | Primed | does not fire | Off |
//! | Conducting | aggregate at or above hold threshold | Conducting |
//! | Conducting | aggregate below hold threshold | Off |
//! | Conducting | caller latches | Latched |
//! | Latched | anything but starvation | Latched |

use sdt_types::{Entropy, GateState, PhaseAngle, ThyristorConfig};

use crate::plasma::PlasmaSnapshot;
use crate::polycrystal::Vote;

/// One observation fed to the state machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Excitation {
    pub tick: u64,
    pub phase_angle: PhaseAngle,
    pub entropy: Entropy,
    pub vote: Vote,
}

/// Why a step produced its snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepCause {
    /// Tick not newer than the last applied one; only the supersession
    /// counter moved.
    Superseded,
    /// Normal threshold-driven transition (possibly to the same state).
    Evaluated,
    /// Sustained starvation forced the gate off.
    AnodeDrop,
}

/// Result of one transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    pub next: PlasmaSnapshot,
    pub cause: StepCause,
}

/// Whether `tick` would be rejected as stale against `current`.
pub fn is_stale(current: &PlasmaSnapshot, tick: u64) -> bool {
    tick <= current.last_tick
}

/// Advance the state machine by one excitation.
pub fn step(config: &ThyristorConfig, current: &PlasmaSnapshot, excitation: &Excitation) -> Step {
    if is_stale(current, excitation.tick) {
        let mut next = *current;
        next.supersession_count = next.supersession_count.saturating_add(1);
        return Step {
            next,
            cause: StepCause::Superseded,
        };
    }

    let vote = excitation.vote;
    let starving = excitation.entropy < config.entropy_floor;
    let streak = if starving {
        current.starvation_streak.saturating_add(1)
    } else {
        0
    };
    let fires = vote.passed && vote.aggregate_strength >= config.fire_threshold;
    let holds = vote.aggregate_strength >= config.hold_threshold;

    let (gate_state, cause) =
        if current.gate_state != GateState::Off && streak >= config.starvation_window {
            (GateState::Off, StepCause::AnodeDrop)
        } else {
            let state = match current.gate_state {
                GateState::Off if fires && !starving => GateState::Primed,
                GateState::Off => GateState::Off,
                GateState::Primed if fires => GateState::Conducting,
                GateState::Primed => GateState::Off,
                GateState::Conducting if holds => GateState::Conducting,
                GateState::Conducting => GateState::Off,
                GateState::Latched => GateState::Latched,
            };
            (state, StepCause::Evaluated)
        };

    let excited = gate_state.allows_flow();
    let resonance_average = current.resonance_average
        + config.resonance_smoothing * (vote.aggregate_strength - current.resonance_average);

    Step {
        next: PlasmaSnapshot {
            phase_angle: excitation.phase_angle,
            entropy: excitation.entropy,
            excited,
            last_ring_strength: vote.aggregate_strength,
            resonance_average: resonance_average.clamp(0.0, 1.0),
            trigger_count: current.trigger_count.saturating_add(u64::from(excited)),
            supersession_count: current.supersession_count,
            gate_state,
            last_tick: excitation.tick,
            starvation_streak: streak,
        },
        cause,
    }
}

/// Caller-driven latch. Only a conducting gate can latch.
pub fn latch(current: &PlasmaSnapshot) -> Option<PlasmaSnapshot> {
    if current.gate_state != GateState::Conducting {
        return None;
    }
    Some(PlasmaSnapshot {
        gate_state: GateState::Latched,
        excited: true,
        ..*current
    })
}

/// Authorized reset: back to Off with counters and tick preserved.
pub fn reset(current: &PlasmaSnapshot) -> PlasmaSnapshot {
    PlasmaSnapshot {
        gate_state: GateState::Off,
        excited: false,
        starvation_streak: 0,
        ..*current
    }
}
