//! Shared helpers for gate integration tests.

#![allow(dead_code)]

use sdt_gate::Crystal;
use sdt_types::{CrystalFamily, Entropy, PhaseAngle, Signal};

/// Scores a payload by its first byte: `payload[0] / 255`.
///
/// Lets a test encode the exact score it wants into the payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoCrystal;

impl Crystal for EchoCrystal {
    fn family(&self) -> CrystalFamily {
        CrystalFamily::GroundStation
    }

    fn evaluate(&self, payload: &[u8], _signal: &Signal) -> f64 {
        payload.first().map_or(0.0, |b| f64::from(*b) / 255.0)
    }
}

/// Payload that an [`EchoCrystal`] scores at `byte / 255`.
pub fn echo_payload(byte: u8) -> [u8; 2] {
    [byte, 0xA5]
}

/// Byte whose echo score is the smallest value at or above `score`.
pub fn byte_for(score: f64) -> u8 {
    (score * 255.0).ceil().clamp(0.0, 255.0) as u8
}

pub const ORIGIN: PhaseAngle = PhaseAngle(0);
pub const FRESH: Entropy = Entropy(60_000);
pub const STARVED: Entropy = Entropy(500);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
