//! Instruction-scanning transfer adapter for Solana.
//!
//! Both the SPL Token and Token-2022 programs share the same instruction
//! layout, so `spl_token`'s unpack serves both; the program is only
//! distinguished by its ID. A `TransferChecked` instruction names the
//! mint directly; a plain `Transfer` qualifies only through its
//! destination equalling the associated token account derived from
//! (payment address, token program, configured mint), which pins the mint
//! transitively.

use async_trait::async_trait;
use payproof::chain::ChainId;
use payproof::transfer::{AdapterError, ChainAdapter, TransferRecord};
use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::RpcTransactionConfig;
use solana_client::rpc_request::RpcError;
use solana_commitment_config::CommitmentConfig;
use solana_pubkey::{Pubkey, pubkey};
use solana_signature::Signature;
use solana_transaction::versioned::VersionedTransaction;
use solana_transaction_status_client_types::UiTransactionEncoding;
use std::sync::Arc;

/// The associated-token-account program.
pub const ATA_PROGRAM_PUBKEY: Pubkey = pubkey!("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL");

/// A matched SPL token transfer.
#[derive(Debug, Clone, Copy)]
struct MatchedTransfer {
    amount: u64,
    authority: Pubkey,
}

/// Chain adapter for Solana chains.
pub struct SolanaTransferAdapter {
    chain: ChainId,
    client: Arc<RpcClient>,
    mint: Pubkey,
    payment_address: Pubkey,
    decimals: u8,
}

impl std::fmt::Debug for SolanaTransferAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolanaTransferAdapter")
            .field("chain", &self.chain)
            .field("mint", &self.mint)
            .field("payment_address", &self.payment_address)
            .finish_non_exhaustive()
    }
}

impl SolanaTransferAdapter {
    /// Creates an adapter for one Solana network.
    #[must_use]
    pub const fn new(
        chain: ChainId,
        client: Arc<RpcClient>,
        mint: Pubkey,
        payment_address: Pubkey,
        decimals: u8,
    ) -> Self {
        Self {
            chain,
            client,
            mint,
            payment_address,
            decimals,
        }
    }

    /// Connects a confirmed-commitment RPC client for the given endpoint.
    #[must_use]
    pub fn connect(
        chain: ChainId,
        rpc_url: String,
        mint: Pubkey,
        payment_address: Pubkey,
        decimals: u8,
    ) -> Self {
        let client = Arc::new(RpcClient::new_with_commitment(
            rpc_url,
            CommitmentConfig::confirmed(),
        ));
        Self::new(chain, client, mint, payment_address, decimals)
    }
}

/// Derives the associated token account for an owner, token program, and
/// mint.
fn derived_token_account(owner: &Pubkey, token_program: &Pubkey, mint: &Pubkey) -> Pubkey {
    let (ata, _) = Pubkey::find_program_address(
        &[owner.as_ref(), token_program.as_ref(), mint.as_ref()],
        &ATA_PROGRAM_PUBKEY,
    );
    ata
}

/// Scans a decoded transaction for a qualifying token transfer.
fn find_token_transfer(
    transaction: &VersionedTransaction,
    mint: &Pubkey,
    payment_address: &Pubkey,
) -> Option<MatchedTransfer> {
    let keys = transaction.message.static_account_keys();
    transaction
        .message
        .instructions()
        .iter()
        .find_map(|instruction| {
            let account = |position: usize| -> Option<Pubkey> {
                instruction
                    .accounts
                    .get(position)
                    .and_then(|idx| keys.get(usize::from(*idx)))
                    .copied()
            };

            let program_id = keys.get(usize::from(instruction.program_id_index))?;
            let token_program = if spl_token::ID.eq(program_id) {
                spl_token::ID
            } else if spl_token_2022::ID.eq(program_id) {
                spl_token_2022::ID
            } else {
                return None;
            };
            let token_instruction =
                spl_token::instruction::TokenInstruction::unpack(&instruction.data).ok()?;

            let expected_destination = derived_token_account(payment_address, &token_program, mint);
            match token_instruction {
                spl_token::instruction::TokenInstruction::TransferChecked { amount, .. } => {
                    let instruction_mint = account(1)?;
                    let destination = account(2)?;
                    let authority = account(3)?;
                    (instruction_mint == *mint && destination == expected_destination)
                        .then_some(MatchedTransfer { amount, authority })
                }
                #[allow(deprecated)]
                spl_token::instruction::TokenInstruction::Transfer { amount } => {
                    let destination = account(1)?;
                    let authority = account(2)?;
                    (destination == expected_destination)
                        .then_some(MatchedTransfer { amount, authority })
                }
                _ => None,
            }
        })
}

/// Maps a Solana client error onto the adapter error contract.
///
/// A missing transaction deserializes as JSON `null`, which the client
/// surfaces as a parse failure rather than a dedicated variant.
fn classify_client_error(err: &ClientError) -> AdapterError {
    match err.kind() {
        ClientErrorKind::SerdeJson(_) => AdapterError::NotFound,
        ClientErrorKind::RpcError(RpcError::ForUser(_) | RpcError::ParseError(_)) => {
            AdapterError::NotFound
        }
        _ => AdapterError::Unavailable(err.to_string()),
    }
}

#[async_trait]
impl ChainAdapter for SolanaTransferAdapter {
    async fn fetch_transfer(&self, tx_hash: &str) -> Result<TransferRecord, AdapterError> {
        let signature: Signature = tx_hash.parse().map_err(|_| AdapterError::NotFound)?;

        let config = RpcTransactionConfig {
            encoding: Some(UiTransactionEncoding::Base64),
            commitment: Some(CommitmentConfig::confirmed()),
            max_supported_transaction_version: Some(0),
        };
        let confirmed = self
            .client
            .get_transaction_with_config(&signature, config)
            .await
            .map_err(|e| classify_client_error(&e))?;

        let slot = confirmed.slot;
        let timestamp = confirmed
            .block_time
            .and_then(|t| u64::try_from(t).ok())
            .ok_or_else(|| AdapterError::Unavailable("block time not available".into()))?;

        match &confirmed.transaction.meta {
            Some(meta) if meta.err.is_some() => {
                tracing::debug!(tx_hash, chain = %self.chain, "transaction failed on-chain");
                return Err(AdapterError::NoQualifyingTransfer);
            }
            Some(_) => {}
            None => {
                return Err(AdapterError::Unavailable(
                    "transaction meta not returned".into(),
                ));
            }
        }

        let transaction = confirmed
            .transaction
            .transaction
            .decode()
            .ok_or_else(|| AdapterError::Unavailable("undecodable transaction payload".into()))?;

        let matched = find_token_transfer(&transaction, &self.mint, &self.payment_address)
            .ok_or(AdapterError::NoQualifyingTransfer)?;

        let head_slot = self
            .client
            .get_slot()
            .await
            .map_err(|e| classify_client_error(&e))?;
        let confirmations = head_slot.saturating_sub(slot);

        tracing::debug!(
            tx_hash,
            chain = %self.chain,
            amount = matched.amount,
            confirmations,
            "matched token transfer instruction"
        );

        Ok(TransferRecord {
            chain: self.chain.clone(),
            tx_hash: tx_hash.to_owned(),
            sender: Some(matched.authority.to_string()),
            recipient: self.payment_address.to_string(),
            amount_raw: u128::from(matched.amount),
            decimals: self.decimals,
            height: slot,
            timestamp,
            confirmations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::networks::USDC_SOLANA;
    use solana_message::{Message, VersionedMessage};

    fn payer() -> Pubkey {
        Pubkey::new_unique()
    }

    fn wrap(message: Message) -> VersionedTransaction {
        VersionedTransaction {
            signatures: vec![],
            message: VersionedMessage::Legacy(message),
        }
    }

    fn transfer_checked_tx(
        mint: &Pubkey,
        destination: &Pubkey,
        authority: &Pubkey,
        amount: u64,
    ) -> VersionedTransaction {
        let source = Pubkey::new_unique();
        let instruction = spl_token::instruction::transfer_checked(
            &spl_token::ID,
            &source,
            mint,
            destination,
            authority,
            &[],
            amount,
            6,
        )
        .unwrap();
        wrap(Message::new(&[instruction], Some(&payer())))
    }

    #[test]
    fn test_matches_transfer_checked_to_payment_ata() {
        let payment_address = Pubkey::new_unique();
        let authority = Pubkey::new_unique();
        let ata = derived_token_account(&payment_address, &spl_token::ID, &USDC_SOLANA);
        let tx = transfer_checked_tx(&USDC_SOLANA, &ata, &authority, 1_000_000);

        let matched = find_token_transfer(&tx, &USDC_SOLANA, &payment_address).unwrap();
        assert_eq!(matched.amount, 1_000_000);
        assert_eq!(matched.authority, authority);
    }

    #[test]
    fn test_wrong_mint_is_skipped() {
        let payment_address = Pubkey::new_unique();
        let other_mint = Pubkey::new_unique();
        let ata = derived_token_account(&payment_address, &spl_token::ID, &other_mint);
        let tx = transfer_checked_tx(&other_mint, &ata, &Pubkey::new_unique(), 1_000_000);

        assert!(find_token_transfer(&tx, &USDC_SOLANA, &payment_address).is_none());
    }

    #[test]
    fn test_wrong_destination_is_skipped() {
        let payment_address = Pubkey::new_unique();
        let other_owner = Pubkey::new_unique();
        let ata = derived_token_account(&other_owner, &spl_token::ID, &USDC_SOLANA);
        let tx = transfer_checked_tx(&USDC_SOLANA, &ata, &Pubkey::new_unique(), 1_000_000);

        assert!(find_token_transfer(&tx, &USDC_SOLANA, &payment_address).is_none());
    }

    #[test]
    fn test_plain_transfer_qualifies_via_derived_account() {
        let payment_address = Pubkey::new_unique();
        let authority = Pubkey::new_unique();
        let source = Pubkey::new_unique();
        let ata = derived_token_account(&payment_address, &spl_token::ID, &USDC_SOLANA);
        #[allow(deprecated)]
        let instruction = spl_token::instruction::transfer(
            &spl_token::ID,
            &source,
            &ata,
            &authority,
            &[],
            250_000,
        )
        .unwrap();
        let tx = wrap(Message::new(&[instruction], Some(&payer())));

        let matched = find_token_transfer(&tx, &USDC_SOLANA, &payment_address).unwrap();
        assert_eq!(matched.amount, 250_000);
        assert_eq!(matched.authority, authority);
    }

    #[test]
    fn test_non_transfer_token_instruction_is_skipped() {
        let payment_address = Pubkey::new_unique();
        let source = Pubkey::new_unique();
        let delegate = Pubkey::new_unique();
        let owner = Pubkey::new_unique();
        let instruction =
            spl_token::instruction::approve(&spl_token::ID, &source, &delegate, &owner, &[], 1)
                .unwrap();
        let tx = wrap(Message::new(&[instruction], Some(&payer())));

        assert!(find_token_transfer(&tx, &USDC_SOLANA, &payment_address).is_none());
    }

    #[test]
    fn test_foreign_program_is_skipped() {
        let payment_address = Pubkey::new_unique();
        let authority = Pubkey::new_unique();
        let ata = derived_token_account(&payment_address, &spl_token::ID, &USDC_SOLANA);
        let mut instruction = spl_token::instruction::transfer_checked(
            &spl_token::ID,
            &Pubkey::new_unique(),
            &USDC_SOLANA,
            &ata,
            &authority,
            &[],
            1_000_000,
            6,
        )
        .unwrap();
        instruction.program_id = Pubkey::new_unique();
        let tx = wrap(Message::new(&[instruction], Some(&payer())));

        assert!(find_token_transfer(&tx, &USDC_SOLANA, &payment_address).is_none());
    }

    #[test]
    fn test_later_instruction_still_matches() {
        let payment_address = Pubkey::new_unique();
        let authority = Pubkey::new_unique();
        let source = Pubkey::new_unique();
        let ata = derived_token_account(&payment_address, &spl_token::ID, &USDC_SOLANA);
        let unrelated = spl_token::instruction::approve(
            &spl_token::ID,
            &source,
            &Pubkey::new_unique(),
            &authority,
            &[],
            1,
        )
        .unwrap();
        let qualifying = spl_token::instruction::transfer_checked(
            &spl_token::ID,
            &source,
            &USDC_SOLANA,
            &ata,
            &authority,
            &[],
            500_000,
            6,
        )
        .unwrap();
        let tx = wrap(Message::new(&[unrelated, qualifying], Some(&payer())));

        let matched = find_token_transfer(&tx, &USDC_SOLANA, &payment_address).unwrap();
        assert_eq!(matched.amount, 500_000);
    }
}
