//! Channel registry.
//!
//! One gate per protected resource or command channel, created at system
//! start and kept for the life of the process. Retiring a channel removes
//! it from the registry; callers holding an `Arc` can finish their
//! in-flight calls, but no new call is routed to it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sdt_types::{ChannelId, Decision, Entropy, PhaseAngle, SdtError, SdtResult};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::gate::{GateStats, ResonanceGate};

struct Registration {
    gate: Arc<ResonanceGate>,
    registered_at: DateTime<Utc>,
}

/// Registry of channel gates.
#[derive(Default)]
pub struct GateRegistry {
    channels: DashMap<ChannelId, Registration>,
}

impl GateRegistry {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Register the gate protecting `channel`.
    pub fn register(
        &self,
        channel: ChannelId,
        gate: ResonanceGate,
    ) -> SdtResult<Arc<ResonanceGate>> {
        use dashmap::mapref::entry::Entry;

        match self.channels.entry(channel.clone()) {
            Entry::Occupied(_) => Err(SdtError::ChannelExists(channel)),
            Entry::Vacant(slot) => {
                let gate = Arc::new(gate);
                slot.insert(Registration {
                    gate: gate.clone(),
                    registered_at: Utc::now(),
                });
                info!(
                    channel = %channel,
                    crystals = gate.polycrystal().len(),
                    policy = %gate.polycrystal().policy(),
                    families = ?gate.polycrystal().families().collect::<Vec<_>>(),
                    "Channel gate registered"
                );
                Ok(gate)
            }
        }
    }

    pub fn get(&self, channel: &ChannelId) -> Option<Arc<ResonanceGate>> {
        self.channels.get(channel).map(|r| r.gate.clone())
    }

    /// Route one call to the channel's gate.
    pub fn resonate(
        &self,
        channel: &ChannelId,
        payload: &[u8],
        tick: u64,
        phase_angle: PhaseAngle,
        entropy: Entropy,
    ) -> SdtResult<Decision> {
        let gate = self
            .get(channel)
            .ok_or_else(|| SdtError::ChannelNotFound(channel.clone()))?;
        Ok(gate.resonate(payload, tick, phase_angle, entropy))
    }

    /// Stop routing calls to a channel.
    pub fn retire(&self, channel: &ChannelId) -> SdtResult<Arc<ResonanceGate>> {
        let (_, registration) = self
            .channels
            .remove(channel)
            .ok_or_else(|| SdtError::ChannelNotFound(channel.clone()))?;
        info!(
            channel = %channel,
            registered_at = %registration.registered_at,
            "Channel gate retired"
        );
        Ok(registration.gate)
    }

    /// Statistics for every registered channel.
    pub fn stats(&self) -> Vec<ChannelStats> {
        self.channels
            .iter()
            .map(|entry| ChannelStats {
                channel: entry.key().clone(),
                registered_at: entry.value().registered_at,
                gate: entry.value().gate.stats(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

/// Statistics for one registered channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelStats {
    pub channel: ChannelId,
    pub registered_at: DateTime<Utc>,
    pub gate: GateStats,
}
