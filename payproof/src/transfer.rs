//! Normalized transfer records and the chain-adapter contract.
//!
//! Chain adapters reconcile incompatible on-chain data models — event-log
//! based transfers on EVM chains, instruction based transfers on Solana —
//! into one [`TransferRecord`] shape the verifier can validate uniformly.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::amount::BaseUnits;
use crate::chain::ChainId;

/// A normalized on-chain transfer, produced once per fetch and never
/// mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRecord {
    /// Chain the transfer was observed on.
    pub chain: ChainId,
    /// Transaction reference as submitted by the caller.
    pub tx_hash: String,
    /// Sender address. `None` for privacy-preserving transfers where the
    /// sender is not disclosed.
    pub sender: Option<String>,
    /// Recipient address (the payment address the adapter matched on).
    pub recipient: String,
    /// Raw amount in the token's base units.
    pub amount_raw: u128,
    /// Decimal precision of the payment token.
    pub decimals: u8,
    /// Block number (EVM) or slot (Solana) containing the transaction.
    pub height: u64,
    /// Unix timestamp of the containing block, in seconds.
    pub timestamp: u64,
    /// Confirmation depth at fetch time (head height minus `height`).
    pub confirmations: u64,
}

impl TransferRecord {
    /// Returns the transfer amount normalized to a [`Decimal`].
    #[must_use]
    pub fn amount(&self) -> Decimal {
        BaseUnits::new(self.amount_raw, self.decimals).to_decimal()
    }
}

/// Errors a chain adapter can produce while fetching a transfer.
///
/// Only [`AdapterError::Unavailable`] represents infrastructure failure;
/// the other variants are definitive statements about the transaction and
/// must not trip circuit breakers or trigger retries.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AdapterError {
    /// The transaction does not exist on-chain.
    #[error("transaction not found")]
    NotFound,

    /// The transaction exists but carries no transfer of the configured
    /// payment token to the configured payment address (this includes
    /// reverted/failed transactions).
    #[error("no qualifying transfer")]
    NoQualifyingTransfer,

    /// The RPC call failed: timeout, connection error, or a server-side
    /// RPC fault.
    #[error("chain unavailable: {0}")]
    Unavailable(String),
}

impl AdapterError {
    /// Returns `true` if the error is a transient infrastructure failure
    /// worth retrying (and worth counting against a circuit breaker).
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Fetches a transaction by reference and extracts a normalized transfer.
///
/// One implementation exists per chain family. Implementations perform no
/// retries of their own — retry and circuit-breaker policy belong to the
/// caller.
#[async_trait]
pub trait ChainAdapter: Send + Sync {
    /// Fetches the transaction identified by `tx_hash` and extracts the
    /// qualifying payment transfer.
    ///
    /// # Errors
    ///
    /// - [`AdapterError::NotFound`] if the transaction is unknown on-chain
    /// - [`AdapterError::NoQualifyingTransfer`] if it exists but carries no
    ///   matching payment
    /// - [`AdapterError::Unavailable`] on RPC failure
    async fn fetch_transfer(&self, tx_hash: &str) -> Result<TransferRecord, AdapterError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_amount_normalization() {
        let record = TransferRecord {
            chain: ChainId::new("eip155", "8453"),
            tx_hash: "0xaa".into(),
            sender: Some("0x01".into()),
            recipient: "0x02".into(),
            amount_raw: 1_000_000,
            decimals: 6,
            height: 100,
            timestamp: 1_700_000_000,
            confirmations: 8,
        };
        assert_eq!(record.amount(), Decimal::from_str("1").unwrap());
    }

    #[test]
    fn test_retryability() {
        assert!(AdapterError::Unavailable("502".into()).is_retryable());
        assert!(!AdapterError::NotFound.is_retryable());
        assert!(!AdapterError::NoQualifyingTransfer.is_retryable());
    }
}
