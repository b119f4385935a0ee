use sdt_types::{CrystalFamily, Signal};

use crate::auth::ResetAuthorizer;
use crate::crystal::Crystal;

/// Crystal that returns the same score for every non-empty payload.
///
/// Useful for driving the gate through exact thresholds in tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedCrystal {
    family: CrystalFamily,
    score: f64,
}

impl FixedCrystal {
    pub fn new(score: f64) -> Self {
        Self {
            family: CrystalFamily::GroundStation,
            score,
        }
    }

    pub fn with_family(mut self, family: CrystalFamily) -> Self {
        self.family = family;
        self
    }
}

impl Crystal for FixedCrystal {
    fn family(&self) -> CrystalFamily {
        self.family
    }

    fn evaluate(&self, payload: &[u8], _signal: &Signal) -> f64 {
        if payload.is_empty() {
            0.0
        } else {
            self.score
        }
    }
}

/// Authorizer that accepts every token.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllAuthorizer;

impl ResetAuthorizer for AllowAllAuthorizer {
    fn authorize(&self, _token: &[u8]) -> bool {
        true
    }
}
