//! Reset authorization.
//!
//! Credential checking belongs to an external collaborator. The gate only
//! asks it a yes/no question and guarantees that a "no" never mutates state.

use std::fmt;

/// Validates the opaque token presented to `reset`.
pub trait ResetAuthorizer: Send + Sync {
    fn authorize(&self, token: &[u8]) -> bool;
}

/// Refuses every token. Default for gates that never configured one.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAllAuthorizer;

impl ResetAuthorizer for DenyAllAuthorizer {
    fn authorize(&self, _token: &[u8]) -> bool {
        false
    }
}

/// Accepts exactly one secret, compared by BLAKE3 digest.
///
/// Only the digest is kept in memory. Digest equality is constant time.
#[derive(Clone)]
pub struct TokenDigestAuthorizer {
    digest: blake3::Hash,
}

impl TokenDigestAuthorizer {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            digest: blake3::hash(secret),
        }
    }

    /// Build from a digest computed elsewhere.
    pub fn from_digest(digest: [u8; 32]) -> Self {
        Self {
            digest: blake3::Hash::from(digest),
        }
    }
}

impl fmt::Debug for TokenDigestAuthorizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenDigestAuthorizer")
            .field("digest", &"<redacted>")
            .finish()
    }
}

impl ResetAuthorizer for TokenDigestAuthorizer {
    fn authorize(&self, token: &[u8]) -> bool {
        if token.is_empty() {
            return false;
        }
        blake3::hash(token) == self.digest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deny_all_refuses_everything() {
        assert!(!DenyAllAuthorizer.authorize(b"anything"));
        assert!(!DenyAllAuthorizer.authorize(b""));
    }

    #[test]
    fn digest_authorizer_accepts_only_its_secret() {
        let auth = TokenDigestAuthorizer::new(b"ground-control-7");
        assert!(auth.authorize(b"ground-control-7"));
        assert!(!auth.authorize(b"ground-control-8"));
        assert!(!auth.authorize(b""));
    }

    #[test]
    fn digest_authorizer_from_precomputed_digest() {
        let digest = *blake3::hash(b"ops-key").as_bytes();
        let auth = TokenDigestAuthorizer::from_digest(digest);
        assert!(auth.authorize(b"ops-key"));
    }

    #[test]
    fn debug_does_not_leak_digest() {
        let auth = TokenDigestAuthorizer::new(b"secret");
        assert!(format!("{:?}", auth).contains("redacted"));
    }
}
