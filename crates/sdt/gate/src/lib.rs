#![deny(unsafe_code)]
//! # sdt-gate
//!
//! Admission control for command channels: a crystal ensemble scores each
//! payload, and a thyristor-style latch decides whether it may proceed.
//!
//! ## Pipeline
//!
//! 1. **Load**: the channel's [`PlasmaState`] supplies the current snapshot
//! 2. **Evaluate**: every [`Crystal`] scores the payload against phase and entropy
//! 3. **Vote**: the [`Polycrystal`] combines scores under its [`VotingPolicy`](sdt_types::VotingPolicy)
//! 4. **Transition**: [`thyristor::step`] computes the next snapshot
//! 5. **Install**: one compare-and-swap publishes it; on conflict, retry from 1
//!
//! ## Guarantees
//!
//! - **Lock-free**: no locks; readers never wait on writers. Up to
//!   [`plasma::SLOT_COUNT`] minus one calls may fill state slots at once;
//!   beyond that a writer spins until another finishes its publish attempt
//! - **No torn reads**: every snapshot was produced by exactly one transition
//! - **Monotonic ticks**: stale or duplicate ticks never regress state
//! - **Fail-safe**: sustained entropy starvation always drops the gate to `Off`
//! - **Never throws on input**: empty payloads and odd signals are neutralized

pub mod auth;
pub mod crystal;
pub mod gate;
pub mod mocks;
pub mod plasma;
pub mod polycrystal;
pub mod registry;
pub mod thyristor;

pub use auth::{DenyAllAuthorizer, ResetAuthorizer, TokenDigestAuthorizer};
pub use crystal::{fingerprint, implied_phase, Crystal, ProfiledCrystal};
pub use gate::{GateStats, ResonanceGate};
pub use mocks::{AllowAllAuthorizer, FixedCrystal};
pub use plasma::{Observed, PlasmaSnapshot, PlasmaState};
pub use polycrystal::{Polycrystal, Vote};
pub use registry::{ChannelStats, GateRegistry};
pub use thyristor::{Excitation, Step, StepCause};
