#![deny(unsafe_code)]
//! # sdt-types
//!
//! Shared vocabulary for the SDT resonance gate.
//!
//! - [`PhaseAngle`] / [`Entropy`]: fixed-point signals supplied by upstream callers
//! - [`GateState`], [`CrystalFamily`], [`VotingPolicy`]: the closed enums of the gate
//! - [`ThyristorConfig`], [`PolycrystalConfig`], [`ChannelConfig`]: construction-time configuration
//! - [`Decision`]: the admission verdict handed to routing and observability layers
//! - [`SdtError`]: the error taxonomy (configuration and reset authorization only)

pub mod config;
pub mod decision;
pub mod error;
pub mod ids;
pub mod signal;
pub mod state;

pub use config::{
    ChannelConfig, CrystalConfig, CrystalProfile, GateProfile, PolycrystalConfig,
    ThyristorConfig, validate_composition, MAX_CRYSTALS,
};
pub use decision::Decision;
pub use error::{SdtError, SdtResult};
pub use ids::ChannelId;
pub use signal::{Entropy, PhaseAngle, Signal};
pub use state::{CrystalFamily, GateState, VotingPolicy};
