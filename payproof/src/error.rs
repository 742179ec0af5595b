//! Failure taxonomy for payment verification.
//!
//! Every way a verification can fail maps to a stable, enumerable
//! [`FailureCode`] so client integrations branch on codes, never on
//! human-readable messages. Codes group into a [`FailureKind`] that tells
//! the caller whether retrying can help.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::transfer::AdapterError;

/// Stable machine-readable failure codes for verification outcomes.
///
/// Serialized in snake_case; these strings are the wire contract and must
/// never change meaning between releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCode {
    /// The requested chain is not configured or not supported.
    UnsupportedChain,
    /// The transaction reference is not well-formed for the chain family.
    MalformedTxRef,
    /// The transaction does not exist on-chain.
    TxNotFound,
    /// The chain RPC failed, timed out, or the circuit breaker is open.
    ChainUnavailable,
    /// The transaction exists but carries no qualifying payment transfer.
    NoQualifyingTransfer,
    /// The transfer recipient is not the configured payment address.
    RecipientMismatch,
    /// The transfer amount is below the required minimum.
    InsufficientAmount,
    /// The transaction is older than the accepted maximum age.
    StaleTransaction,
    /// The transaction has not yet accrued enough confirmations.
    InsufficientConfirmations,
    /// The transaction was already redeemed and the idempotency window has
    /// elapsed.
    AlreadyRedeemed,
}

impl fmt::Display for FailureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Self::UnsupportedChain => "unsupported_chain",
            Self::MalformedTxRef => "malformed_tx_ref",
            Self::TxNotFound => "tx_not_found",
            Self::ChainUnavailable => "chain_unavailable",
            Self::NoQualifyingTransfer => "no_qualifying_transfer",
            Self::RecipientMismatch => "recipient_mismatch",
            Self::InsufficientAmount => "insufficient_amount",
            Self::StaleTransaction => "stale_transaction",
            Self::InsufficientConfirmations => "insufficient_confirmations",
            Self::AlreadyRedeemed => "already_redeemed",
        };
        f.write_str(code)
    }
}

/// Broad classification of a failure, deciding the caller's retry story.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The request itself is wrong; fix the input, do not retry as-is.
    Client,
    /// The transaction is definitively deficient; retrying cannot help.
    Rejected,
    /// Not final yet; the same request may succeed later.
    Transient,
    /// Upstream infrastructure failure; retry with backoff.
    Infrastructure,
}

/// A failed verification with its stable code and contextual detail.
#[derive(Debug, Clone, thiserror::Error)]
pub enum VerifyError {
    /// The requested chain is not configured.
    #[error("unsupported chain: {0}")]
    UnsupportedChain(String),

    /// The transaction reference does not parse for the chain family.
    #[error("malformed transaction reference: {0}")]
    MalformedTxRef(String),

    /// The transaction does not exist on-chain.
    #[error("transaction not found on-chain")]
    TxNotFound,

    /// The chain RPC failed, timed out, or the circuit breaker is open.
    #[error("chain unavailable: {0}")]
    ChainUnavailable(String),

    /// The transaction exists but carries no qualifying transfer.
    #[error("no qualifying transfer to the payment address")]
    NoQualifyingTransfer,

    /// The transfer went to an address other than the configured one.
    #[error("transfer recipient does not match the payment address")]
    RecipientMismatch,

    /// The transfer amount is below the required minimum.
    #[error("amount {actual} below required {required}")]
    InsufficientAmount {
        /// Observed transfer amount, normalized.
        actual: Decimal,
        /// The minimum that would have been accepted.
        required: Decimal,
    },

    /// The transaction is older than the accepted maximum.
    #[error("transaction is {age_secs}s old, maximum accepted is {max_secs}s")]
    StaleTransaction {
        /// Observed transaction age in seconds.
        age_secs: u64,
        /// Configured maximum age in seconds.
        max_secs: u64,
    },

    /// The transaction has not accrued enough confirmations yet.
    #[error("{observed} of {required} required confirmations")]
    InsufficientConfirmations {
        /// Confirmation count at fetch time.
        observed: u64,
        /// Configured minimum confirmation count.
        required: u64,
    },

    /// The transaction was already redeemed and the window has elapsed.
    #[error("transaction already redeemed")]
    AlreadyRedeemed,
}

impl VerifyError {
    /// Returns the stable failure code for this error.
    #[must_use]
    pub fn code(&self) -> FailureCode {
        match self {
            Self::UnsupportedChain(_) => FailureCode::UnsupportedChain,
            Self::MalformedTxRef(_) => FailureCode::MalformedTxRef,
            Self::TxNotFound => FailureCode::TxNotFound,
            Self::ChainUnavailable(_) => FailureCode::ChainUnavailable,
            Self::NoQualifyingTransfer => FailureCode::NoQualifyingTransfer,
            Self::RecipientMismatch => FailureCode::RecipientMismatch,
            Self::InsufficientAmount { .. } => FailureCode::InsufficientAmount,
            Self::StaleTransaction { .. } => FailureCode::StaleTransaction,
            Self::InsufficientConfirmations { .. } => FailureCode::InsufficientConfirmations,
            Self::AlreadyRedeemed => FailureCode::AlreadyRedeemed,
        }
    }

    /// Returns the retry classification for this error.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::UnsupportedChain(_) | Self::MalformedTxRef(_) => FailureKind::Client,
            Self::TxNotFound
            | Self::NoQualifyingTransfer
            | Self::RecipientMismatch
            | Self::InsufficientAmount { .. }
            | Self::StaleTransaction { .. }
            | Self::AlreadyRedeemed => FailureKind::Rejected,
            Self::InsufficientConfirmations { .. } => FailureKind::Transient,
            Self::ChainUnavailable(_) => FailureKind::Infrastructure,
        }
    }
}

impl From<AdapterError> for VerifyError {
    fn from(err: AdapterError) -> Self {
        match err {
            AdapterError::NotFound => Self::TxNotFound,
            AdapterError::NoQualifyingTransfer => Self::NoQualifyingTransfer,
            AdapterError::Unavailable(reason) => Self::ChainUnavailable(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_snake_case_on_the_wire() {
        let json = serde_json::to_string(&FailureCode::InsufficientAmount).unwrap();
        assert_eq!(json, "\"insufficient_amount\"");
        let back: FailureCode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, FailureCode::InsufficientAmount);
    }

    #[test]
    fn test_display_matches_serde() {
        for code in [
            FailureCode::UnsupportedChain,
            FailureCode::ChainUnavailable,
            FailureCode::AlreadyRedeemed,
        ] {
            let json = serde_json::to_string(&code).unwrap();
            assert_eq!(json.trim_matches('"'), code.to_string());
        }
    }

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            VerifyError::UnsupportedChain("x".into()).kind(),
            FailureKind::Client
        );
        assert_eq!(
            VerifyError::InsufficientConfirmations {
                observed: 1,
                required: 6
            }
            .kind(),
            FailureKind::Transient
        );
        assert_eq!(
            VerifyError::ChainUnavailable("timeout".into()).kind(),
            FailureKind::Infrastructure
        );
        assert_eq!(VerifyError::RecipientMismatch.kind(), FailureKind::Rejected);
    }

    #[test]
    fn test_adapter_error_conversion() {
        assert_eq!(
            VerifyError::from(AdapterError::NotFound).code(),
            FailureCode::TxNotFound
        );
        assert_eq!(
            VerifyError::from(AdapterError::Unavailable("rpc 502".into())).code(),
            FailureCode::ChainUnavailable
        );
    }
}
