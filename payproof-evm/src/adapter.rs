//! Receipt-scanning transfer adapter for EVM chains.
//!
//! A payment on an EVM chain is an ERC-20 `Transfer` event emitted by the
//! payment-token contract with the payment address as the indexed
//! recipient. The adapter rejects transactions that exist but carry no
//! such log (`NoQualifyingTransfer`) — a different outcome from a
//! transaction that is not on-chain at all (`NotFound`).

use alloy_primitives::{Address, B256, Log, U256};
use alloy_provider::{Provider, RootProvider};
use alloy_sol_types::{SolEvent, sol};
use async_trait::async_trait;
use payproof::chain::ChainId;
use payproof::transfer::{AdapterError, ChainAdapter, TransferRecord};

sol! {
    /// ERC-20 Transfer event.
    event Transfer(address indexed from, address indexed to, uint256 value);
}

/// Chain adapter for EIP-155 chains.
#[derive(Debug)]
pub struct EvmTransferAdapter {
    chain: ChainId,
    provider: RootProvider,
    token: Address,
    payment_address: Address,
    decimals: u8,
}

impl EvmTransferAdapter {
    /// Creates an adapter for one chain.
    ///
    /// `token` is the payment-token (e.g., USDC) contract whose transfers
    /// qualify; `payment_address` is the address payments must reach.
    #[must_use]
    pub const fn new(
        chain: ChainId,
        provider: RootProvider,
        token: Address,
        payment_address: Address,
        decimals: u8,
    ) -> Self {
        Self {
            chain,
            provider,
            token,
            payment_address,
            decimals,
        }
    }
}

/// Scans receipt logs for a `Transfer` of `token` to `recipient`.
///
/// Returns the sender and raw value of the first matching log. Logs from
/// other contracts, other event signatures, or to other recipients are
/// skipped, as are logs that fail to decode.
fn match_transfer(logs: &[Log], token: Address, recipient: Address) -> Option<(Address, U256)> {
    logs.iter().find_map(|log| {
        if log.address != token {
            return None;
        }
        if log.data.topics().first() != Some(&Transfer::SIGNATURE_HASH) {
            return None;
        }
        let transfer = Transfer::decode_log_data(&log.data).ok()?;
        (transfer.to == recipient).then_some((transfer.from, transfer.value))
    })
}

fn unavailable<E: std::fmt::Display>(err: E) -> AdapterError {
    AdapterError::Unavailable(err.to_string())
}

#[async_trait]
impl ChainAdapter for EvmTransferAdapter {
    async fn fetch_transfer(&self, tx_hash: &str) -> Result<TransferRecord, AdapterError> {
        let hash: B256 = tx_hash.parse().map_err(|_| AdapterError::NotFound)?;

        let receipt = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .map_err(unavailable)?
            .ok_or(AdapterError::NotFound)?;

        if !receipt.status() {
            tracing::debug!(tx_hash, chain = %self.chain, "transaction reverted");
            return Err(AdapterError::NoQualifyingTransfer);
        }

        let logs: Vec<Log> = receipt.inner.logs().iter().map(|l| l.inner.clone()).collect();
        let (sender, value) = match_transfer(&logs, self.token, self.payment_address)
            .ok_or(AdapterError::NoQualifyingTransfer)?;

        let height = receipt
            .block_number
            .ok_or_else(|| AdapterError::Unavailable("receipt missing block number".into()))?;
        let head = self.provider.get_block_number().await.map_err(unavailable)?;
        let confirmations = head.saturating_sub(height);

        let block = self
            .provider
            .get_block_by_number(height.into())
            .await
            .map_err(unavailable)?
            .ok_or_else(|| AdapterError::Unavailable("containing block not returned".into()))?;
        let timestamp = block.header.timestamp;

        tracing::debug!(
            tx_hash,
            chain = %self.chain,
            %value,
            confirmations,
            "matched transfer log"
        );

        Ok(TransferRecord {
            chain: self.chain.clone(),
            tx_hash: tx_hash.to_owned(),
            sender: Some(sender.to_string()),
            recipient: self.payment_address.to_string(),
            amount_raw: u128::try_from(value).unwrap_or(u128::MAX),
            decimals: self.decimals,
            height,
            timestamp,
            confirmations,
        })
    }
}
