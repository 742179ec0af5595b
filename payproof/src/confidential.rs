//! Optional shielded-transfer verification.
//!
//! Some chains offer privacy-preserving transfers where the amount is
//! encrypted on-chain. For those, an adapter cannot extract a plaintext
//! amount; instead it extracts a zero-knowledge range-proof payload and
//! delegates to a [`RangeProofVerifier`] that confirms the hidden amount
//! meets the minimum threshold. On success the resulting
//! [`TransferRecord`] carries `sender = None` and the *threshold* as its
//! amount — a floor, not the true value.
//!
//! Nothing in standard verification depends on this module; deployments
//! without a proof backend simply never configure a
//! [`ConfidentialAdapter`].

use async_trait::async_trait;

use crate::chain::ChainId;
use crate::transfer::{AdapterError, ChainAdapter, TransferRecord};

/// Hard cap on serialized proof payloads.
pub const MAX_PROOF_BYTES: usize = 10 * 1024 * 1024;

/// A serialized range proof with its public inputs.
///
/// Wire layout: `u32` LE proof length, proof bytes, `u32` LE input count,
/// then each public input as 32 bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeProofPayload {
    /// Opaque proof bytes for the backend verifier.
    pub proof: Vec<u8>,
    /// Public inputs bound into the proof (32 bytes each).
    pub public_inputs: Vec<[u8; 32]>,
}

/// Errors decoding or checking a range proof.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProofError {
    /// The payload bytes do not follow the wire layout.
    #[error("malformed proof payload: {0}")]
    Malformed(String),
    /// The proof verified but attests to less than the threshold.
    #[error("proven amount below threshold")]
    BelowThreshold,
    /// The proof did not verify.
    #[error("invalid proof: {0}")]
    Invalid(String),
}

impl RangeProofPayload {
    /// Serializes the payload to its wire layout.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + self.proof.len() + self.public_inputs.len() * 32);
        out.extend_from_slice(&u32::try_from(self.proof.len()).unwrap_or(u32::MAX).to_le_bytes());
        out.extend_from_slice(&self.proof);
        out.extend_from_slice(
            &u32::try_from(self.public_inputs.len())
                .unwrap_or(u32::MAX)
                .to_le_bytes(),
        );
        for input in &self.public_inputs {
            out.extend_from_slice(input);
        }
        out
    }

    /// Deserializes a payload from its wire layout.
    ///
    /// # Errors
    ///
    /// Returns [`ProofError::Malformed`] on truncated or oversized data.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ProofError> {
        if data.len() > MAX_PROOF_BYTES {
            return Err(ProofError::Malformed("payload too large".into()));
        }
        if data.len() < 8 {
            return Err(ProofError::Malformed("payload too short".into()));
        }

        let mut offset = 0usize;
        let proof_len = read_u32(data, &mut offset)? as usize;
        if data.len() < offset + proof_len + 4 {
            return Err(ProofError::Malformed("truncated proof bytes".into()));
        }
        let proof = data[offset..offset + proof_len].to_vec();
        offset += proof_len;

        let input_count = read_u32(data, &mut offset)? as usize;
        if data.len() != offset + input_count * 32 {
            return Err(ProofError::Malformed("truncated public inputs".into()));
        }
        let mut public_inputs = Vec::with_capacity(input_count);
        for _ in 0..input_count {
            let mut input = [0u8; 32];
            input.copy_from_slice(&data[offset..offset + 32]);
            public_inputs.push(input);
            offset += 32;
        }

        Ok(Self {
            proof,
            public_inputs,
        })
    }
}

fn read_u32(data: &[u8], offset: &mut usize) -> Result<u32, ProofError> {
    let bytes: [u8; 4] = data
        .get(*offset..*offset + 4)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| ProofError::Malformed("truncated length prefix".into()))?;
    *offset += 4;
    Ok(u32::from_le_bytes(bytes))
}

/// Checks that an encrypted amount meets a minimum threshold without
/// revealing the amount.
pub trait RangeProofVerifier: Send + Sync {
    /// Verifies the proof against the threshold in base units.
    ///
    /// # Errors
    ///
    /// Returns [`ProofError`] when the proof is malformed, invalid, or
    /// attests to less than the threshold.
    fn verify_minimum(
        &self,
        payload: &RangeProofPayload,
        min_base_units: u128,
    ) -> Result<(), ProofError>;
}

/// A shielded transfer envelope as fetched from a privacy-enabled chain.
#[derive(Debug, Clone)]
pub struct ShieldedTransfer {
    /// Transaction reference.
    pub tx_hash: String,
    /// Disclosed recipient address.
    pub recipient: String,
    /// Block/slot height containing the transaction.
    pub height: u64,
    /// Unix timestamp of the containing block.
    pub timestamp: u64,
    /// Confirmation depth at fetch time.
    pub confirmations: u64,
    /// The range-proof payload attached to the transfer.
    pub proof: RangeProofPayload,
}

/// Fetches shielded transfer envelopes by transaction reference.
#[async_trait]
pub trait ShieldedSource: Send + Sync {
    /// Fetches the shielded transfer for `tx_hash`.
    ///
    /// # Errors
    ///
    /// Same contract as [`ChainAdapter::fetch_transfer`].
    async fn fetch_shielded(&self, tx_hash: &str) -> Result<ShieldedTransfer, AdapterError>;
}

/// Chain adapter for shielded transfers: proof-verified, amount
/// undisclosed.
#[derive(Debug)]
pub struct ConfidentialAdapter<S, V> {
    chain: ChainId,
    source: S,
    verifier: V,
    floor_base_units: u128,
    decimals: u8,
}

impl<S, V> ConfidentialAdapter<S, V> {
    /// Creates a confidential adapter with the given amount floor.
    ///
    /// `floor_base_units` is the threshold the range proof must attest to;
    /// successful records report exactly this amount.
    #[must_use]
    pub const fn new(
        chain: ChainId,
        source: S,
        verifier: V,
        floor_base_units: u128,
        decimals: u8,
    ) -> Self {
        Self {
            chain,
            source,
            verifier,
            floor_base_units,
            decimals,
        }
    }
}

#[async_trait]
impl<S, V> ChainAdapter for ConfidentialAdapter<S, V>
where
    S: ShieldedSource,
    V: RangeProofVerifier,
{
    async fn fetch_transfer(&self, tx_hash: &str) -> Result<TransferRecord, AdapterError> {
        let shielded = self.source.fetch_shielded(tx_hash).await?;
        if let Err(err) = self
            .verifier
            .verify_minimum(&shielded.proof, self.floor_base_units)
        {
            tracing::debug!(tx_hash, error = %err, "range proof rejected");
            return Err(AdapterError::NoQualifyingTransfer);
        }
        Ok(TransferRecord {
            chain: self.chain.clone(),
            tx_hash: shielded.tx_hash,
            sender: None,
            recipient: shielded.recipient,
            amount_raw: self.floor_base_units,
            decimals: self.decimals,
            height: shielded.height,
            timestamp: shielded.timestamp,
            confirmations: shielded.confirmations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_payload_roundtrip() {
        let payload = RangeProofPayload {
            proof: vec![1, 2, 3, 4, 5],
            public_inputs: vec![[7u8; 32], [9u8; 32]],
        };
        let bytes = payload.to_bytes();
        assert_eq!(RangeProofPayload::from_bytes(&bytes).unwrap(), payload);
    }

    #[test]
    fn test_truncated_payload_rejected() {
        let payload = RangeProofPayload {
            proof: vec![1, 2, 3],
            public_inputs: vec![[0u8; 32]],
        };
        let bytes = payload.to_bytes();
        for cut in [0, 3, bytes.len() - 1] {
            assert!(matches!(
                RangeProofPayload::from_bytes(&bytes[..cut]),
                Err(ProofError::Malformed(_))
            ));
        }
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let data = vec![0u8; MAX_PROOF_BYTES + 1];
        assert!(matches!(
            RangeProofPayload::from_bytes(&data),
            Err(ProofError::Malformed(_))
        ));
    }

    /// Toy verifier for tests: the first 16 proof bytes are the hidden
    /// amount, little-endian.
    struct ToyVerifier;

    impl RangeProofVerifier for ToyVerifier {
        fn verify_minimum(
            &self,
            payload: &RangeProofPayload,
            min_base_units: u128,
        ) -> Result<(), ProofError> {
            let bytes: [u8; 16] = payload
                .proof
                .get(..16)
                .and_then(|s| s.try_into().ok())
                .ok_or_else(|| ProofError::Malformed("short proof".into()))?;
            if u128::from_le_bytes(bytes) >= min_base_units {
                Ok(())
            } else {
                Err(ProofError::BelowThreshold)
            }
        }
    }

    struct MapSource(HashMap<String, ShieldedTransfer>);

    #[async_trait]
    impl ShieldedSource for MapSource {
        async fn fetch_shielded(&self, tx_hash: &str) -> Result<ShieldedTransfer, AdapterError> {
            self.0.get(tx_hash).cloned().ok_or(AdapterError::NotFound)
        }
    }

    fn shielded(amount: u128) -> ShieldedTransfer {
        ShieldedTransfer {
            tx_hash: "shield-1".into(),
            recipient: "zs1recipient".into(),
            height: 42,
            timestamp: 1_700_000_000,
            confirmations: 12,
            proof: RangeProofPayload {
                proof: amount.to_le_bytes().to_vec(),
                public_inputs: vec![],
            },
        }
    }

    fn adapter(amount: u128) -> ConfidentialAdapter<MapSource, ToyVerifier> {
        let mut transfers = HashMap::new();
        transfers.insert("shield-1".to_owned(), shielded(amount));
        ConfidentialAdapter::new(
            ChainId::new("shielded", "testnet"),
            MapSource(transfers),
            ToyVerifier,
            100_000,
            6,
        )
    }

    #[tokio::test]
    async fn test_proven_amount_reports_the_floor() {
        let record = adapter(5_000_000).fetch_transfer("shield-1").await.unwrap();
        assert_eq!(record.sender, None);
        assert_eq!(record.amount_raw, 100_000);
    }

    #[tokio::test]
    async fn test_below_threshold_is_no_qualifying_transfer() {
        let result = adapter(50_000).fetch_transfer("shield-1").await;
        assert!(matches!(result, Err(AdapterError::NoQualifyingTransfer)));
    }

    #[tokio::test]
    async fn test_unknown_tx_is_not_found() {
        let result = adapter(5_000_000).fetch_transfer("missing").await;
        assert!(matches!(result, Err(AdapterError::NotFound)));
    }
}
