//! Access-token issuance and atomic quota tracking.
//!
//! Tokens are minted from a cryptographically secure random source —
//! never derived from the transaction hash or any other predictable
//! input. The plaintext leaves this module exactly once, in the
//! [`IssuedToken`] handed back to the caller; the vault stores only a
//! SHA-256 hash, so a stolen store cannot impersonate token holders.
//!
//! Quota consumption is a single atomic decrement-if-positive: with one
//! request remaining, any number of concurrent redemptions yield exactly
//! one success.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, SystemTime};

use dashmap::DashMap;
use rand::Rng;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::chain::ChainId;

/// Number of random bytes behind each token plaintext.
const TOKEN_BYTES: usize = 32;

/// Returns the current unix time in seconds.
///
/// # Panics
///
/// Panics if the system clock is set before the unix epoch.
#[must_use]
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs()
}

/// Computes the stored hash for a token plaintext (SHA-256, lowercase hex).
#[must_use]
pub fn hash_token(token: &str) -> String {
    use std::fmt::Write;

    let digest = Sha256::digest(token.as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// A freshly minted token. The `token` field is the only copy of the
/// plaintext that will ever exist.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Plaintext credential, returned to the payer exactly once.
    pub token: String,
    /// SHA-256 hex of the plaintext; the vault's lookup key.
    pub token_hash: String,
    /// Request quota granted.
    pub requests_allocated: u32,
    /// Issuance time, unix seconds.
    pub issued_at: u64,
    /// Expiry time, unix seconds.
    pub expires_at: u64,
}

/// Errors from redeeming quota against a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QuotaError {
    /// No token with this hash exists.
    #[error("unknown token")]
    UnknownToken,
    /// The token's lifetime has passed.
    #[error("token expired")]
    Expired,
    /// The token has no requests remaining.
    #[error("quota exceeded")]
    QuotaExceeded,
}

impl QuotaError {
    /// Stable machine-readable code for the error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::UnknownToken => "unknown_token",
            Self::Expired => "token_expired",
            Self::QuotaExceeded => "quota_exceeded",
        }
    }
}

/// Read-only view of a token's state.
#[derive(Debug, Clone, Serialize)]
pub struct UsageSnapshot {
    /// Requests still available.
    pub requests_remaining: u32,
    /// Issuance time, unix seconds.
    pub issued_at: u64,
    /// Expiry time, unix seconds.
    pub expires_at: u64,
    /// Tier label the token was issued under.
    pub tier: String,
    /// Tenant the token belongs to.
    pub tenant: String,
}

#[derive(Debug)]
struct TokenRecord {
    tenant: String,
    tier: String,
    remaining: AtomicI64,
    issued_at: u64,
    expires_at: u64,
    source_chain: ChainId,
    source_tx: String,
}

/// Durable store of issued tokens, keyed by token hash.
#[derive(Debug, Default)]
pub struct TokenVault {
    tokens: DashMap<String, TokenRecord>,
}

impl TokenVault {
    /// Creates an empty vault.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mints a new token and records its hash.
    pub fn issue(
        &self,
        tenant: &str,
        tier: &str,
        requests: u32,
        ttl: Duration,
        source_chain: &ChainId,
        source_tx: &str,
        now: u64,
    ) -> IssuedToken {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::rng().fill_bytes(&mut bytes);
        let token = base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, bytes);
        let token_hash = hash_token(&token);
        let expires_at = now + ttl.as_secs();

        self.tokens.insert(
            token_hash.clone(),
            TokenRecord {
                tenant: tenant.to_owned(),
                tier: tier.to_owned(),
                remaining: AtomicI64::new(i64::from(requests)),
                issued_at: now,
                expires_at,
                source_chain: source_chain.clone(),
                source_tx: source_tx.to_owned(),
            },
        );
        tracing::info!(
            token_hash = %token_hash,
            tenant,
            requests,
            chain = %source_chain,
            "issued access token"
        );

        IssuedToken {
            token,
            token_hash,
            requests_allocated: requests,
            issued_at: now,
            expires_at,
        }
    }

    /// Redeems one request against the token plaintext.
    ///
    /// The decrement is atomic decrement-if-positive; concurrent
    /// redemptions of a token with one request left yield exactly one
    /// success. Returns the requests remaining after this redemption.
    ///
    /// # Errors
    ///
    /// [`QuotaError::UnknownToken`], [`QuotaError::Expired`], or
    /// [`QuotaError::QuotaExceeded`].
    pub fn consume(&self, token: &str, now: u64) -> Result<u32, QuotaError> {
        let token_hash = hash_token(token);
        let record = self
            .tokens
            .get(&token_hash)
            .ok_or(QuotaError::UnknownToken)?;
        if now >= record.expires_at {
            return Err(QuotaError::Expired);
        }
        let before = record
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n > 0).then_some(n - 1)
            })
            .map_err(|_| QuotaError::QuotaExceeded)?;
        Ok(u32::try_from(before - 1).unwrap_or(0))
    }

    /// Reports a token's state by hash. Read-only; never touches quota.
    #[must_use]
    pub fn usage(&self, token_hash: &str) -> Option<UsageSnapshot> {
        let record = self.tokens.get(token_hash)?;
        let remaining = record.remaining.load(Ordering::SeqCst).max(0);
        Some(UsageSnapshot {
            requests_remaining: u32::try_from(remaining).unwrap_or(0),
            issued_at: record.issued_at,
            expires_at: record.expires_at,
            tier: record.tier.clone(),
            tenant: record.tenant.clone(),
        })
    }

    /// Returns the (chain, tx hash) a token was bought with, by hash.
    #[must_use]
    pub fn source(&self, token_hash: &str) -> Option<(ChainId, String)> {
        let record = self.tokens.get(token_hash)?;
        Some((record.source_chain.clone(), record.source_tx.clone()))
    }

    /// Removes tokens that are past expiry or fully consumed.
    ///
    /// Exhausted tokens are kept until swept so that late redemptions see
    /// `quota_exceeded` rather than `unknown_token`.
    pub fn sweep(&self, now: u64) -> usize {
        let before = self.tokens.len();
        self.tokens.retain(|_, record| {
            now < record.expires_at && record.remaining.load(Ordering::SeqCst) > 0
        });
        let removed = before - self.tokens.len();
        if removed > 0 {
            tracing::info!(removed, "swept dead access tokens");
        }
        removed
    }

    /// Number of live token records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Returns `true` if the vault holds no tokens.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const NOW: u64 = 1_700_000_000;

    fn chain() -> ChainId {
        ChainId::new("eip155", "8453")
    }

    fn issue(vault: &TokenVault, requests: u32) -> IssuedToken {
        vault.issue(
            "tenant-1",
            "payg",
            requests,
            Duration::from_secs(24 * 3600),
            &chain(),
            "0xaa",
            NOW,
        )
    }

    #[test]
    fn test_stored_hash_matches_returned_plaintext() {
        let vault = TokenVault::new();
        let issued = issue(&vault, 10);
        assert_eq!(hash_token(&issued.token), issued.token_hash);
        assert!(vault.usage(&issued.token_hash).is_some());
        // The plaintext never appears as a lookup key.
        assert!(vault.usage(&issued.token).is_none());
    }

    #[test]
    fn test_tokens_are_unpredictable_and_distinct() {
        let vault = TokenVault::new();
        let a = issue(&vault, 1);
        let b = issue(&vault, 1);
        assert_ne!(a.token, b.token);
        assert!(!a.token.contains("0xaa"));
    }

    #[test]
    fn test_consume_decrements_and_exhausts() {
        let vault = TokenVault::new();
        let issued = issue(&vault, 2);
        assert_eq!(vault.consume(&issued.token, NOW).unwrap(), 1);
        assert_eq!(vault.consume(&issued.token, NOW).unwrap(), 0);
        assert_eq!(
            vault.consume(&issued.token, NOW),
            Err(QuotaError::QuotaExceeded)
        );
    }

    #[test]
    fn test_expired_token_rejected() {
        let vault = TokenVault::new();
        let issued = issue(&vault, 5);
        let later = NOW + 24 * 3600;
        assert_eq!(vault.consume(&issued.token, later), Err(QuotaError::Expired));
    }

    #[test]
    fn test_unknown_token_rejected() {
        let vault = TokenVault::new();
        assert_eq!(
            vault.consume("not-a-token", NOW),
            Err(QuotaError::UnknownToken)
        );
    }

    #[test]
    fn test_usage_does_not_mutate() {
        let vault = TokenVault::new();
        let issued = issue(&vault, 3);
        for _ in 0..5 {
            let snapshot = vault.usage(&issued.token_hash).unwrap();
            assert_eq!(snapshot.requests_remaining, 3);
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_redemption_of_last_request() {
        let vault = Arc::new(TokenVault::new());
        let issued = issue(&vault, 1);
        let mut handles = Vec::new();
        for _ in 0..10 {
            let vault = Arc::clone(&vault);
            let token = issued.token.clone();
            handles.push(tokio::spawn(async move { vault.consume(&token, NOW) }));
        }
        let results = futures_util::future::join_all(handles).await;
        let successes = results
            .iter()
            .filter(|r| matches!(r, Ok(Ok(_))))
            .count();
        let exceeded = results
            .iter()
            .filter(|r| matches!(r, Ok(Err(QuotaError::QuotaExceeded))))
            .count();
        assert_eq!(successes, 1);
        assert_eq!(exceeded, 9);
    }

    #[test]
    fn test_sweep_removes_dead_tokens() {
        let vault = TokenVault::new();
        let exhausted = issue(&vault, 1);
        let _ = vault.consume(&exhausted.token, NOW);
        let live = issue(&vault, 5);
        let removed = vault.sweep(NOW);
        assert_eq!(removed, 1);
        assert!(vault.usage(&live.token_hash).is_some());
        assert!(vault.usage(&exhausted.token_hash).is_none());
    }
}
