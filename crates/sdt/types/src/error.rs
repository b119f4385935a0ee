//! Error types for the SDT gate.
//!
//! The hot path never fails: stale ticks and starvation are reported
//! through the decision record. Errors surface only at construction time
//! (configuration), on the reset surface (authorization) and in the
//! channel registry.

use thiserror::Error;

use crate::ids::ChannelId;

/// Errors that can occur while building or administering a gate.
#[derive(Debug, Error)]
pub enum SdtError {
    /// Reset refused. Gate state is guaranteed unchanged.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Configuration rejected at construction time.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Configuration text could not be parsed.
    #[error("configuration parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// No gate is registered for the channel.
    #[error("channel not found: {0}")]
    ChannelNotFound(ChannelId),

    /// A gate is already registered for the channel.
    #[error("channel already registered: {0}")]
    ChannelExists(ChannelId),
}

/// Result type for gate operations.
pub type SdtResult<T> = Result<T, SdtError>;
