//! Axum route handlers for the verification gateway.
//!
//! Endpoints:
//! - `POST /verify` — verify a payment and mint (or replay) a token
//! - `POST /redeem` — spend one request of a token's quota
//! - `GET /usage/{token_hash}` — read-only usage report
//! - `GET /supported` — configured chains and pricing policy
//! - `GET /health` — liveness

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::{Json, Router};
use payproof::token::{UsageSnapshot, unix_now};
use payproof::verifier::PaymentVerifier;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::GrantSettings;
use crate::error::GatewayError;

/// Shared application state.
#[derive(Debug)]
pub struct AppState {
    /// The verification pipeline.
    pub verifier: PaymentVerifier,
    /// Precomputed `/supported` payload.
    pub supported: SupportedResponse,
}

/// Shared state handle for the router.
pub type GatewayState = Arc<AppState>;

/// `POST /verify` request body.
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    /// Transaction reference on the target chain.
    pub tx_hash: String,
    /// Network name (e.g., `base`, `solana`).
    pub chain: String,
    /// Optional expected amount; the transfer must be at least this.
    #[serde(default)]
    pub expected_amount: Option<Decimal>,
    /// Tenant the grant is issued for (defaults to `public`).
    #[serde(default)]
    pub tenant_id: Option<String>,
}

/// `POST /verify` success body.
#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    /// Always `true` on this path; failures use the error body.
    pub is_valid: bool,
    /// Echo of the verified transaction reference.
    pub tx_hash: String,
    /// Echo of the requested network name.
    pub chain: String,
    /// Plaintext access token — returned exactly once per issuance
    /// (identical on replays inside the idempotency window).
    pub token: String,
    /// Durable token identifier for `GET /usage/{token_hash}`.
    pub token_hash: String,
    /// Request quota the payment bought.
    pub requests_allocated: u32,
    /// Advisory confidence score, 0–100.
    pub risk_score: u8,
    /// Verified amount, normalized.
    pub amount: Decimal,
    /// Token expiry, unix seconds.
    pub expires_at: u64,
    /// `true` when served from the idempotency cache.
    pub replayed: bool,
}

/// `POST /redeem` request body.
#[derive(Debug, Deserialize)]
pub struct RedeemRequest {
    /// Plaintext access token.
    pub token: String,
}

/// `POST /redeem` success body.
#[derive(Debug, Serialize)]
pub struct RedeemResponse {
    /// Requests left after this redemption.
    pub requests_remaining: u32,
}

/// One configured chain in the `/supported` payload.
#[derive(Debug, Clone, Serialize)]
pub struct ChainSummary {
    /// Network name accepted by `POST /verify`.
    pub name: String,
    /// CAIP-2 chain identifier.
    pub chain_id: String,
    /// Address payments must be sent to.
    pub payment_address: String,
    /// Payment token contract/mint.
    pub asset: String,
    /// Payment token decimals.
    pub asset_decimals: u8,
    /// Minimum confirmation depth.
    pub min_confirmations: u64,
    /// Minimum accepted amount.
    pub min_amount: String,
    /// Maximum accepted transaction age, seconds.
    pub max_tx_age_secs: u64,
}

/// Pricing metadata in the `/supported` payload.
#[derive(Debug, Clone, Serialize)]
pub struct PricingSummary {
    /// Tier label for issued tokens.
    pub tier: String,
    /// Requests granted per whole payment unit.
    pub requests_per_unit: u32,
    /// Token lifetime, hours.
    pub token_ttl_hours: u64,
}

/// `GET /supported` body.
#[derive(Debug, Clone, Serialize)]
pub struct SupportedResponse {
    /// Configured chains.
    pub chains: Vec<ChainSummary>,
    /// Grant pricing policy.
    pub pricing: PricingSummary,
}

/// Builds the `/supported` payload from the verifier's lanes.
#[must_use]
pub fn supported_response(verifier: &PaymentVerifier, grant: &GrantSettings) -> SupportedResponse {
    let mut chains: Vec<ChainSummary> = verifier
        .lanes()
        .iter()
        .map(|(chain_id, lane)| ChainSummary {
            name: verifier
                .networks()
                .name_by_chain_id(chain_id)
                .unwrap_or_default()
                .to_owned(),
            chain_id: chain_id.to_string(),
            payment_address: lane.policy.payment_address.clone(),
            asset: lane.policy.asset.clone(),
            asset_decimals: lane.policy.asset_decimals,
            min_confirmations: lane.policy.min_confirmations,
            min_amount: lane.policy.min_amount.to_string(),
            max_tx_age_secs: lane.policy.max_tx_age.as_secs(),
        })
        .collect();
    chains.sort_by(|a, b| a.name.cmp(&b.name));
    SupportedResponse {
        chains,
        pricing: PricingSummary {
            tier: grant.tier.clone(),
            requests_per_unit: grant.requests_per_unit,
            token_ttl_hours: grant.token_ttl_hours,
        },
    }
}

/// `POST /verify` — verifies a payment and mints a metered access token.
///
/// # Errors
///
/// Returns a [`GatewayError`] mapping each failure reason to its status.
pub async fn post_verify(
    State(state): State<GatewayState>,
    Json(body): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>, GatewayError> {
    let tenant = body.tenant_id.as_deref().unwrap_or("public");
    let result = state
        .verifier
        .verify(&body.tx_hash, &body.chain, body.expected_amount, tenant)
        .await?;
    Ok(Json(VerifyResponse {
        is_valid: true,
        tx_hash: result.tx_hash,
        chain: body.chain,
        token: result.grant.token,
        token_hash: result.grant.token_hash,
        requests_allocated: result.grant.requests_allocated,
        risk_score: result.grant.risk_score,
        amount: result.grant.amount,
        expires_at: result.grant.expires_at,
        replayed: result.replayed,
    }))
}

/// `POST /redeem` — spends one request of the token's quota.
///
/// # Errors
///
/// Returns 429 when the quota is exhausted, 401 for unknown or expired
/// tokens.
pub async fn post_redeem(
    State(state): State<GatewayState>,
    Json(body): Json<RedeemRequest>,
) -> Result<Json<RedeemResponse>, GatewayError> {
    let requests_remaining = state.verifier.vault().consume(&body.token, unix_now())?;
    Ok(Json(RedeemResponse { requests_remaining }))
}

/// `GET /usage/{token_hash}` — read-only usage report; never mutates
/// quota.
///
/// # Errors
///
/// Returns 404 when no token with this hash exists.
pub async fn get_usage(
    State(state): State<GatewayState>,
    Path(token_hash): Path<String>,
) -> Result<Json<UsageSnapshot>, GatewayError> {
    state
        .verifier
        .vault()
        .usage(&token_hash)
        .map(Json)
        .ok_or(GatewayError::TokenNotFound)
}

/// `GET /supported` — configured chains and pricing.
pub async fn get_supported(State(state): State<GatewayState>) -> Json<SupportedResponse> {
    Json(state.supported.clone())
}

/// `GET /health` — liveness probe.
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Creates the gateway [`Router`] with all endpoints.
pub fn gateway_router(state: GatewayState) -> Router {
    Router::new()
        .route("/verify", axum::routing::post(post_verify))
        .route("/redeem", axum::routing::post(post_redeem))
        .route("/usage/{token_hash}", axum::routing::get(get_usage))
        .route("/supported", axum::routing::get(get_supported))
        .route("/health", axum::routing::get(health))
        .with_state(state)
}
