use std::sync::Arc;

use sdt_types::{
    ChannelConfig, CrystalFamily, Decision, Entropy, GateState, PhaseAngle, SdtError, SdtResult,
    Signal, ThyristorConfig, VotingPolicy,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::auth::{DenyAllAuthorizer, ResetAuthorizer};
use crate::plasma::{PlasmaSnapshot, PlasmaState};
use crate::polycrystal::{Polycrystal, Vote};
use crate::thyristor::{self, Excitation, StepCause};

/// Admission gate of one channel.
///
/// Couples an immutable crystal ensemble and configuration with the
/// channel's lock-free state record. Any number of threads may call
/// [`ResonanceGate::resonate`] concurrently; the only serialization point
/// is the compare-and-swap that installs the next snapshot.
pub struct ResonanceGate {
    config: Arc<ThyristorConfig>,
    polycrystal: Polycrystal,
    plasma: PlasmaState,
    authorizer: Arc<dyn ResetAuthorizer>,
}

impl std::fmt::Debug for ResonanceGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResonanceGate")
            .field("config", &self.config)
            .field("polycrystal", &self.polycrystal)
            .field("state", &self.plasma.snapshot())
            .finish()
    }
}

impl ResonanceGate {
    /// Create a gate at rest. Rejects invalid configuration.
    ///
    /// Resets are refused until an authorizer is attached, unless the
    /// configuration does not require authorization.
    pub fn new(config: ThyristorConfig, polycrystal: Polycrystal) -> SdtResult<Self> {
        Self::with_shared_config(Arc::new(config), polycrystal)
    }

    /// Create a gate sharing a configuration with other channels.
    pub fn with_shared_config(
        config: Arc<ThyristorConfig>,
        polycrystal: Polycrystal,
    ) -> SdtResult<Self> {
        config.validate()?;
        polycrystal.validate()?;
        Ok(Self {
            config,
            polycrystal,
            plasma: PlasmaState::new(),
            authorizer: Arc::new(DenyAllAuthorizer),
        })
    }

    /// Build a gate from a channel configuration.
    pub fn from_config(config: &ChannelConfig) -> SdtResult<Self> {
        let polycrystal = Polycrystal::from_config(&config.polycrystal)?;
        Self::new(config.thyristor.clone(), polycrystal)
    }

    /// Attach the collaborator that validates reset tokens.
    pub fn with_authorizer(mut self, authorizer: impl ResetAuthorizer + 'static) -> Self {
        self.authorizer = Arc::new(authorizer);
        self
    }

    pub fn config(&self) -> &ThyristorConfig {
        &self.config
    }

    pub fn polycrystal(&self) -> &Polycrystal {
        &self.polycrystal
    }

    /// Consistent copy of the current state.
    pub fn snapshot(&self) -> PlasmaSnapshot {
        self.plasma.snapshot()
    }

    /// Score `payload` and advance the gate by one tick.
    ///
    /// Never fails. A `tick` not newer than the last applied one is
    /// superseded: only the supersession counter moves and the decision
    /// reports the gate's current state.
    pub fn resonate(
        &self,
        payload: &[u8],
        tick: u64,
        phase_angle: PhaseAngle,
        entropy: Entropy,
    ) -> Decision {
        let mut observed = self.plasma.load();
        // Scores depend on the snapshot only through the running average.
        let mut cached: Option<(u64, Vote)> = None;

        loop {
            let current = observed.snapshot;
            let vote = if thyristor::is_stale(&current, tick) {
                Vote::closed()
            } else {
                let key = current.resonance_average.to_bits();
                match cached {
                    Some((bits, vote)) if bits == key => vote,
                    _ => {
                        let signal = Signal::new(phase_angle, entropy)
                            .with_running_average(current.resonance_average);
                        let vote =
                            self.polycrystal
                                .evaluate(payload, &signal, self.config.fire_threshold);
                        cached = Some((key, vote));
                        vote
                    }
                }
            };

            let excitation = Excitation {
                tick,
                phase_angle,
                entropy,
                vote,
            };
            let step = thyristor::step(&self.config, &current, &excitation);

            match self.plasma.compare_and_swap(&observed, step.next) {
                Ok(installed) => {
                    let next = installed.snapshot;
                    self.trace_step(&current, &next, step.cause, tick);
                    return Decision {
                        allowed: next.excited,
                        gate_state: next.gate_state,
                        aggregate_strength: next.last_ring_strength,
                        phase_angle: next.phase_angle,
                        entropy: next.entropy,
                        supersession_count: next.supersession_count,
                        trigger_count: next.trigger_count,
                        tick: next.last_tick,
                        superseded: step.cause == StepCause::Superseded,
                    };
                }
                Err(latest) => observed = latest,
            }
        }
    }

    /// Hold a conducting gate open until an authorized reset.
    ///
    /// Returns `false` (and changes nothing) unless the gate is conducting.
    pub fn latch(&self) -> bool {
        match self.plasma.update(thyristor::latch) {
            Some((previous, _)) => {
                info!(tick = previous.last_tick, "Gate latched");
                true
            }
            None => {
                debug!("Latch requested while not conducting");
                false
            }
        }
    }

    /// Return the gate to `Off` from any state.
    ///
    /// When the configuration requires authorization and `auth_token` is
    /// refused, returns [`SdtError::PermissionDenied`] and nothing changes.
    pub fn reset(&self, auth_token: &[u8]) -> SdtResult<()> {
        if self.config.requires_auth_for_reset && !self.authorizer.authorize(auth_token) {
            warn!(
                state = %self.plasma.snapshot().gate_state,
                "Gate reset refused"
            );
            return Err(SdtError::PermissionDenied(
                "reset token rejected".into(),
            ));
        }

        if let Some((previous, _)) = self.plasma.update(|s| Some(thyristor::reset(s))) {
            info!(from = %previous.gate_state, tick = previous.last_tick, "Gate reset to off");
        }
        Ok(())
    }

    /// Gate statistics for observability layers.
    pub fn stats(&self) -> GateStats {
        let snapshot = self.plasma.snapshot();
        GateStats {
            gate_state: snapshot.gate_state,
            excited: snapshot.excited,
            last_ring_strength: snapshot.last_ring_strength,
            resonance_average: snapshot.resonance_average,
            trigger_count: snapshot.trigger_count,
            supersession_count: snapshot.supersession_count,
            starvation_streak: snapshot.starvation_streak,
            last_tick: snapshot.last_tick,
            policy: self.polycrystal.policy(),
            crystal_count: self.polycrystal.len(),
            families: self.polycrystal.families().collect(),
        }
    }

    fn trace_step(
        &self,
        previous: &PlasmaSnapshot,
        next: &PlasmaSnapshot,
        cause: StepCause,
        tick: u64,
    ) {
        match cause {
            StepCause::Superseded => debug!(
                tick = tick,
                last_tick = next.last_tick,
                supersessions = next.supersession_count,
                "Stale tick superseded"
            ),
            StepCause::AnodeDrop => warn!(
                tick = tick,
                from = %previous.gate_state,
                streak = next.starvation_streak,
                entropy = %next.entropy,
                "Anode drop: entropy starvation forced gate off"
            ),
            StepCause::Evaluated if previous.gate_state != next.gate_state => debug!(
                tick = tick,
                from = %previous.gate_state,
                to = %next.gate_state,
                strength = next.last_ring_strength,
                "Gate transition"
            ),
            StepCause::Evaluated => {}
        }
    }
}

/// Statistics for a gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateStats {
    pub gate_state: GateState,
    pub excited: bool,
    pub last_ring_strength: f64,
    pub resonance_average: f64,
    pub trigger_count: u64,
    pub supersession_count: u64,
    pub starvation_streak: u32,
    pub last_tick: u64,
    pub policy: VotingPolicy,
    pub crystal_count: usize,
    pub families: Vec<CrystalFamily>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenDigestAuthorizer;
    use crate::mocks::{AllowAllAuthorizer, FixedCrystal};

    const PAYLOAD: &[u8] = b"cmd:thruster-fire";
    const FRESH: Entropy = Entropy(60_000);

    fn gate(scores: &[f64]) -> ResonanceGate {
        let polycrystal = scores.iter().fold(Polycrystal::new(VotingPolicy::All), |p, s| {
            p.with_crystal(FixedCrystal::new(*s))
        });
        ResonanceGate::new(ThyristorConfig::default(), polycrystal).unwrap()
    }

    fn conduct(gate: &ResonanceGate) {
        gate.resonate(PAYLOAD, 1, PhaseAngle(0), FRESH);
        let decision = gate.resonate(PAYLOAD, 2, PhaseAngle(0), FRESH);
        assert_eq!(decision.gate_state, GateState::Conducting);
    }

    #[test]
    fn invalid_config_is_rejected_at_construction() {
        let config = ThyristorConfig {
            hold_threshold: 0.95,
            ..Default::default()
        };
        let result = ResonanceGate::new(config, Polycrystal::new(VotingPolicy::Any));
        assert!(matches!(result, Err(SdtError::InvalidConfiguration(_))));

        let quorum = Polycrystal::new(VotingPolicy::Quorum(1));
        assert!(ResonanceGate::new(ThyristorConfig::default(), quorum).is_err());
    }

    #[test]
    fn decision_reflects_installed_snapshot() {
        let gate = gate(&[0.9, 0.85]);
        let decision = gate.resonate(PAYLOAD, 1, PhaseAngle(99), Entropy(50_000));
        assert!(!decision.allowed);
        assert_eq!(decision.gate_state, GateState::Primed);
        assert_eq!(decision.aggregate_strength, 0.85);
        assert_eq!(decision.phase_angle, PhaseAngle(99));
        assert_eq!(decision.entropy, Entropy(50_000));
        assert_eq!(decision.tick, 1);
        assert!(!decision.superseded);
    }

    #[test]
    fn stale_call_reports_current_state() {
        let gate = gate(&[0.9]);
        conduct(&gate);
        let stale = gate.resonate(b"", 1, PhaseAngle(5), Entropy(0));
        assert!(stale.superseded);
        assert!(stale.allowed);
        assert_eq!(stale.gate_state, GateState::Conducting);
        assert_eq!(stale.supersession_count, 1);
        assert_eq!(stale.tick, 2);
    }

    #[test]
    fn latch_only_from_conducting() {
        let gate = gate(&[0.9]);
        assert!(!gate.latch());
        conduct(&gate);
        assert!(gate.latch());
        assert_eq!(gate.snapshot().gate_state, GateState::Latched);

        // scores no longer matter
        let decision = gate.resonate(PAYLOAD, 3, PhaseAngle(0), FRESH);
        assert!(decision.allowed);
        assert!(!gate.latch());
    }

    #[test]
    fn reset_refused_without_authorizer() {
        let gate = gate(&[0.9]);
        conduct(&gate);
        let before = gate.snapshot();
        assert!(matches!(
            gate.reset(b"anything"),
            Err(SdtError::PermissionDenied(_))
        ));
        assert_eq!(gate.snapshot(), before);
    }

    #[test]
    fn reset_with_valid_token() {
        let gate = gate(&[0.9]).with_authorizer(TokenDigestAuthorizer::new(b"ops"));
        conduct(&gate);
        gate.latch();
        gate.reset(b"ops").unwrap();
        let snapshot = gate.snapshot();
        assert_eq!(snapshot.gate_state, GateState::Off);
        assert!(!snapshot.excited);
        assert_eq!(snapshot.trigger_count, 1);
    }

    #[test]
    fn reset_without_auth_requirement() {
        let config = ThyristorConfig {
            requires_auth_for_reset: false,
            ..Default::default()
        };
        let gate = ResonanceGate::new(
            config,
            Polycrystal::new(VotingPolicy::Any).with_crystal(FixedCrystal::new(0.9)),
        )
        .unwrap();
        conduct(&gate);
        assert!(gate.reset(b"").is_ok());
        assert_eq!(gate.snapshot().gate_state, GateState::Off);
    }

    #[test]
    fn stats_report_composition() {
        let gate = gate(&[0.9, 0.95]).with_authorizer(AllowAllAuthorizer);
        conduct(&gate);
        let stats = gate.stats();
        assert_eq!(stats.gate_state, GateState::Conducting);
        assert_eq!(stats.crystal_count, 2);
        assert_eq!(stats.policy, VotingPolicy::All);
        assert_eq!(stats.trigger_count, 1);
        assert_eq!(stats.families, vec![CrystalFamily::GroundStation; 2]);
    }

    #[test]
    fn stats_report_crystal_families() {
        let polycrystal = Polycrystal::new(VotingPolicy::Majority)
            .with_crystal(FixedCrystal::new(0.9).with_family(CrystalFamily::Orbital))
            .with_crystal(FixedCrystal::new(0.9).with_family(CrystalFamily::Adaptive))
            .with_crystal(FixedCrystal::new(0.2).with_family(CrystalFamily::TarPit));
        let gate = ResonanceGate::new(ThyristorConfig::default(), polycrystal).unwrap();
        assert_eq!(
            gate.stats().families,
            vec![
                CrystalFamily::Orbital,
                CrystalFamily::Adaptive,
                CrystalFamily::TarPit
            ]
        );
    }

    #[test]
    fn from_config_builds_working_gate() {
        let gate = ResonanceGate::from_config(&ChannelConfig::default()).unwrap();
        assert_eq!(gate.polycrystal().len(), 3);
        let decision = gate.resonate(PAYLOAD, 1, PhaseAngle(0), FRESH);
        assert!(!decision.allowed);
    }
}
