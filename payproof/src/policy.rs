//! Per-chain payment policy and grant (tier) policy.
//!
//! Policies are loaded once from configuration and never mutated. The
//! verifier enforces them; what the values should be (pricing, tiers) is
//! the billing system's decision, not this crate's.

use rust_decimal::Decimal;
use std::time::Duration;

/// Immutable per-chain payment acceptance policy.
#[derive(Debug, Clone)]
pub struct ChainPolicy {
    /// Address payments must be sent to on this chain.
    pub payment_address: String,
    /// Payment token contract address (EVM) or mint (Solana).
    pub asset: String,
    /// Decimal precision of the payment token.
    pub asset_decimals: u8,
    /// Minimum confirmation depth before a payment is accepted.
    pub min_confirmations: u64,
    /// Minimum accepted payment amount, normalized.
    pub min_amount: Decimal,
    /// Maximum accepted transaction age. Bounds the window during which an
    /// old transaction could be replayed against a fresh grant.
    pub max_tx_age: Duration,
}

/// Policy governing the access grant minted for a verified payment.
///
/// Supplied by the tenant/billing system; enforced here.
#[derive(Debug, Clone)]
pub struct GrantPolicy {
    /// Tier label stamped on issued tokens (e.g., "payg").
    pub tier: String,
    /// API requests granted per whole unit of payment currency.
    pub requests_per_unit: u32,
    /// Token lifetime from issuance.
    pub token_ttl: Duration,
}

impl GrantPolicy {
    /// Computes the request quota a payment amount buys under this policy.
    ///
    /// Rounds down; a payment below `1 / requests_per_unit` buys nothing.
    #[must_use]
    pub fn requests_for(&self, amount: Decimal) -> u32 {
        let requests = (amount * Decimal::from(self.requests_per_unit)).trunc();
        u32::try_from(requests.mantissa() / 10i128.pow(requests.scale())).unwrap_or(u32::MAX)
    }
}
