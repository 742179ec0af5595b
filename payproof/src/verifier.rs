//! The payment verification pipeline.
//!
//! Checks run sequentially and short-circuit on the first failure, so a
//! rejection always carries exactly one failure reason: chain support,
//! transaction-reference shape, replay status, on-chain fetch (behind the
//! per-chain retry policy and circuit breaker), recipient, amount, age,
//! and confirmation depth. Only after every check passes does control
//! reach the claim store — verification success alone never issues a
//! token.

use std::fmt;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use rust_decimal::Decimal;

use crate::breaker::CircuitBreaker;
use crate::chain::{ChainFamily, ChainId, ChainRegistry};
use crate::claims::{ClaimDecision, ClaimStatus, ClaimStore};
use crate::error::VerifyError;
use crate::networks::NetworkRegistry;
use crate::policy::{ChainPolicy, GrantPolicy};
use crate::retry::RetryPolicy;
use crate::risk::{RiskScorer, RiskSignals};
use crate::token::{TokenVault, unix_now};
use crate::transfer::ChainAdapter;

static EVM_TX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^0x[0-9a-fA-F]{64}$").expect("valid regex"));

/// Solana signatures are 64 bytes, base58-encoded.
const SOLANA_SIGNATURE_LEN: usize = 64;

/// Everything the verifier needs to serve one chain.
pub struct ChainLane {
    /// Acceptance policy for this chain.
    pub policy: ChainPolicy,
    /// Adapter that fetches and normalizes transfers.
    pub adapter: Arc<dyn ChainAdapter>,
    /// The chain's shared circuit breaker.
    pub breaker: Arc<CircuitBreaker>,
    /// Retry policy applied around adapter calls.
    pub retry: RetryPolicy,
}

impl fmt::Debug for ChainLane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainLane")
            .field("policy", &self.policy)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

/// The grant cached in the claim store and embedded in results.
#[derive(Debug, Clone)]
pub struct PaymentGrant {
    /// Plaintext access token. Retained only for the idempotency window.
    pub token: String,
    /// SHA-256 hash of the token (the durable identifier).
    pub token_hash: String,
    /// Request quota the payment bought.
    pub requests_allocated: u32,
    /// Advisory confidence score, 0–100.
    pub risk_score: u8,
    /// Normalized verified amount.
    pub amount: Decimal,
    /// Token expiry, unix seconds.
    pub expires_at: u64,
    /// Verification time, unix seconds.
    pub verified_at: u64,
}

/// A successful verification result.
#[derive(Debug, Clone)]
pub struct VerifiedPayment {
    /// Transaction reference as submitted.
    pub tx_hash: String,
    /// Resolved chain.
    pub chain: ChainId,
    /// The issued (or replayed) grant.
    pub grant: PaymentGrant,
    /// `true` when served from the claim cache instead of a fresh
    /// issuance.
    pub replayed: bool,
}

/// Multi-chain payment verifier.
///
/// Holds one [`ChainLane`] per supported chain, the shared claim store,
/// and the token vault. All state needed across concurrent requests lives
/// behind atomics or sharded maps; `verify` takes `&self`.
pub struct PaymentVerifier {
    networks: NetworkRegistry,
    lanes: ChainRegistry<ChainLane>,
    claims: ClaimStore<PaymentGrant>,
    vault: Arc<TokenVault>,
    grant_policy: GrantPolicy,
    scorer: Box<dyn RiskScorer>,
}

impl fmt::Debug for PaymentVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentVerifier")
            .field("lanes", &self.lanes.len())
            .field("grant_policy", &self.grant_policy)
            .finish_non_exhaustive()
    }
}

impl PaymentVerifier {
    /// Creates a verifier over the given lanes.
    #[must_use]
    pub fn new(
        networks: NetworkRegistry,
        lanes: ChainRegistry<ChainLane>,
        grant_policy: GrantPolicy,
        scorer: Box<dyn RiskScorer>,
        idempotency_window: Duration,
    ) -> Self {
        Self {
            networks,
            lanes,
            claims: ClaimStore::new(idempotency_window),
            vault: Arc::new(TokenVault::new()),
            grant_policy,
            scorer,
        }
    }

    /// The token vault backing issued grants.
    #[must_use]
    pub fn vault(&self) -> &Arc<TokenVault> {
        &self.vault
    }

    /// The configured lanes, for reporting supported chains.
    #[must_use]
    pub fn lanes(&self) -> &ChainRegistry<ChainLane> {
        &self.lanes
    }

    /// The network name registry.
    #[must_use]
    pub fn networks(&self) -> &NetworkRegistry {
        &self.networks
    }

    /// Drops claim records old enough that the stale-transaction check
    /// independently rejects their transactions, and sweeps dead tokens.
    pub fn sweep(&self) {
        let horizon = self
            .lanes
            .iter()
            .map(|(_, lane)| lane.policy.max_tx_age)
            .max()
            .unwrap_or(Duration::from_secs(7 * 24 * 3600));
        // Claims must outlive the stale window, with margin for clock skew.
        self.claims.prune(horizon * 2);
        self.vault.sweep(unix_now());
    }

    /// Verifies a payment and, on first success for this transaction,
    /// mints an access token.
    ///
    /// Safe to retry: re-submission within the idempotency window returns
    /// the original grant with `replayed = true`.
    ///
    /// # Errors
    ///
    /// Returns a [`VerifyError`] carrying the single failure reason per
    /// the sequential checks.
    pub async fn verify(
        &self,
        tx_hash: &str,
        network: &str,
        expected_amount: Option<Decimal>,
        tenant: &str,
    ) -> Result<VerifiedPayment, VerifyError> {
        let chain_id = self
            .networks
            .chain_id_by_name(network)
            .ok_or_else(|| VerifyError::UnsupportedChain(network.to_owned()))?;
        let lane = self
            .lanes
            .by_chain_id(chain_id)
            .ok_or_else(|| VerifyError::UnsupportedChain(network.to_owned()))?;
        let family = chain_id
            .family()
            .ok_or_else(|| VerifyError::UnsupportedChain(network.to_owned()))?;

        validate_tx_ref(family, tx_hash)?;

        // Served from the claim cache, never re-derived.
        match self.claims.peek(chain_id, tx_hash) {
            Some(ClaimStatus::Replay(grant)) => {
                tracing::debug!(tx_hash, chain = %chain_id, "replaying cached grant");
                return Ok(VerifiedPayment {
                    tx_hash: tx_hash.to_owned(),
                    chain: chain_id.clone(),
                    grant,
                    replayed: true,
                });
            }
            Some(ClaimStatus::Expired) => return Err(VerifyError::AlreadyRedeemed),
            None => {}
        }

        let adapter = Arc::clone(&lane.adapter);
        let breaker = Arc::clone(&lane.breaker);
        let record = lane
            .retry
            .run(|| {
                let adapter = Arc::clone(&adapter);
                let breaker = Arc::clone(&breaker);
                async move { breaker.call(adapter.fetch_transfer(tx_hash)).await }
            })
            .await?;

        let policy = &lane.policy;
        if !addresses_match(family, &record.recipient, &policy.payment_address) {
            return Err(VerifyError::RecipientMismatch);
        }

        let amount = record.amount();
        if amount < policy.min_amount {
            return Err(VerifyError::InsufficientAmount {
                actual: amount,
                required: policy.min_amount,
            });
        }
        if let Some(expected) = expected_amount
            && amount < expected
        {
            return Err(VerifyError::InsufficientAmount {
                actual: amount,
                required: expected,
            });
        }

        let now = unix_now();
        let age_secs = now.saturating_sub(record.timestamp);
        let max_secs = policy.max_tx_age.as_secs();
        if age_secs > max_secs {
            return Err(VerifyError::StaleTransaction { age_secs, max_secs });
        }

        if record.confirmations < policy.min_confirmations {
            return Err(VerifyError::InsufficientConfirmations {
                observed: record.confirmations,
                required: policy.min_confirmations,
            });
        }

        match self.claims.claim(chain_id, tx_hash).await {
            ClaimDecision::Replay(grant) => Ok(VerifiedPayment {
                tx_hash: tx_hash.to_owned(),
                chain: chain_id.clone(),
                grant,
                replayed: true,
            }),
            ClaimDecision::Rejected => Err(VerifyError::AlreadyRedeemed),
            ClaimDecision::Granted(ticket) => {
                let risk_score = self.scorer.score(&RiskSignals {
                    confirmations: record.confirmations,
                    min_confirmations: policy.min_confirmations,
                    age: Duration::from_secs(age_secs),
                    max_age: policy.max_tx_age,
                    amount,
                });
                let requests = self.grant_policy.requests_for(amount);
                let issued = self.vault.issue(
                    tenant,
                    &self.grant_policy.tier,
                    requests,
                    self.grant_policy.token_ttl,
                    chain_id,
                    tx_hash,
                    now,
                );
                let grant = PaymentGrant {
                    token: issued.token,
                    token_hash: issued.token_hash,
                    requests_allocated: requests,
                    risk_score,
                    amount,
                    expires_at: issued.expires_at,
                    verified_at: now,
                };
                ticket.fulfill(grant.clone());
                tracing::info!(
                    tx_hash,
                    chain = %chain_id,
                    %amount,
                    requests,
                    risk_score,
                    "payment verified, token issued"
                );
                Ok(VerifiedPayment {
                    tx_hash: tx_hash.to_owned(),
                    chain: chain_id.clone(),
                    grant,
                    replayed: false,
                })
            }
        }
    }
}

/// Validates the transaction reference shape for a chain family.
fn validate_tx_ref(family: ChainFamily, tx_hash: &str) -> Result<(), VerifyError> {
    let well_formed = match family {
        ChainFamily::Evm => EVM_TX_RE.is_match(tx_hash),
        ChainFamily::Solana => bs58::decode(tx_hash)
            .into_vec()
            .map(|bytes| bytes.len() == SOLANA_SIGNATURE_LEN)
            .unwrap_or(false),
    };
    if well_formed {
        Ok(())
    } else {
        Err(VerifyError::MalformedTxRef(tx_hash.to_owned()))
    }
}

/// Address equality per chain family: EVM hex addresses are
/// case-insensitive, Solana base58 keys are not.
fn addresses_match(family: ChainFamily, a: &str, b: &str) -> bool {
    match family {
        ChainFamily::Evm => a.eq_ignore_ascii_case(b),
        ChainFamily::Solana => a == b,
    }
}
