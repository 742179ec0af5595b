//! Read-only RPC provider construction for EVM chains.
//!
//! Builds an [`RpcClient`] over one or more HTTP endpoints with an
//! optional per-endpoint request rate limit and automatic failover
//! between endpoints. This workspace only ever reads chain state, so the
//! provider carries no wallet or signing layers.

use std::num::NonZeroUsize;

use alloy_provider::RootProvider;
use alloy_rpc_client::RpcClient;
use alloy_transport::layers::{FallbackLayer, ThrottleLayer};
use alloy_transport_http::Http;
use payproof::chain::ChainId;
use tower::ServiceBuilder;
use url::Url;

/// Errors constructing an EVM provider.
#[derive(Debug, thiserror::Error)]
pub enum EvmProviderError {
    /// None of the configured endpoints were usable HTTP(S) URLs.
    #[error("no usable http endpoints for {0}")]
    NoHttpEndpoints(ChainId),
}

/// Creates an RPC client from HTTP endpoint URLs with optional
/// per-endpoint rate limits (requests per second).
///
/// Non-HTTP(S) URLs are skipped. When several endpoints are given, the
/// fallback layer rotates away from failing transports.
///
/// # Errors
///
/// Returns [`EvmProviderError::NoHttpEndpoints`] if no valid HTTP
/// transport remains after filtering.
pub fn rpc_client(
    chain_id: &ChainId,
    endpoints: &[(Url, Option<u32>)],
) -> Result<RpcClient, EvmProviderError> {
    let transports: Vec<_> = endpoints
        .iter()
        .filter_map(|(url, rate_limit)| {
            let scheme = url.scheme();
            if scheme != "http" && scheme != "https" {
                tracing::warn!(chain = %chain_id, rpc_url = %url, "skipping non-http endpoint");
                return None;
            }
            tracing::info!(chain = %chain_id, rpc_url = %url, rate_limit = ?rate_limit, "using http transport");
            let limit = rate_limit.unwrap_or(u32::MAX);
            let service = ServiceBuilder::new()
                .layer(ThrottleLayer::new(limit))
                .service(Http::new(url.clone()));
            Some(service)
        })
        .collect();

    let active = NonZeroUsize::new(transports.len())
        .ok_or_else(|| EvmProviderError::NoHttpEndpoints(chain_id.clone()))?;
    let fallback = ServiceBuilder::new()
        .layer(FallbackLayer::default().with_active_transport_count(active))
        .service(transports);
    Ok(RpcClient::new(fallback, false))
}

/// Builds a read-only provider over the given endpoints.
///
/// # Errors
///
/// Returns [`EvmProviderError`] if no usable endpoint is configured.
pub fn read_provider(
    chain_id: &ChainId,
    endpoints: &[(Url, Option<u32>)],
) -> Result<RootProvider, EvmProviderError> {
    Ok(RootProvider::new(rpc_client(chain_id, endpoints)?))
}
