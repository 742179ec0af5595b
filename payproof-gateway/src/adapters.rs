//! Chain adapter construction: the closed set of adapter variants.
//!
//! The adapter for each configured chain is selected exactly once, at
//! configuration load, by chain family — verification logic never
//! branches on chain names.

use std::sync::Arc;

use async_trait::async_trait;
use payproof::breaker::CircuitBreaker;
use payproof::chain::{ChainFamily, ChainId};
use payproof::policy::ChainPolicy;
use payproof::transfer::{AdapterError, ChainAdapter, TransferRecord};
use payproof::verifier::ChainLane;
use payproof_evm::EvmTransferAdapter;
use payproof_svm::SolanaTransferAdapter;
use url::Url;

use crate::config::{BreakerSettings, ChainSettings, RetrySettings};

/// The closed set of transfer adapters the gateway can construct.
#[derive(Debug)]
pub enum TransferAdapterKind {
    /// EIP-155 receipt/log adapter.
    Evm(EvmTransferAdapter),
    /// Solana instruction adapter.
    Solana(SolanaTransferAdapter),
}

#[async_trait]
impl ChainAdapter for TransferAdapterKind {
    async fn fetch_transfer(&self, tx_hash: &str) -> Result<TransferRecord, AdapterError> {
        match self {
            Self::Evm(adapter) => adapter.fetch_transfer(tx_hash).await,
            Self::Solana(adapter) => adapter.fetch_transfer(tx_hash).await,
        }
    }
}

/// Errors building a chain lane from configuration.
#[derive(Debug, thiserror::Error)]
pub enum LaneBuildError {
    /// The network's namespace maps to no supported chain family.
    #[error("unsupported chain family for {0}")]
    UnsupportedFamily(ChainId),

    /// No RPC endpoint was configured.
    #[error("no rpc endpoints configured for {0}")]
    NoEndpoints(ChainId),

    /// An RPC URL did not parse.
    #[error("invalid rpc url {url} for {chain}: {source}")]
    InvalidUrl {
        /// The chain being configured.
        chain: ChainId,
        /// The offending URL.
        url: String,
        /// Parse error.
        #[source]
        source: url::ParseError,
    },

    /// The payment or asset address did not parse for the chain family.
    #[error("invalid address {address} for {chain}")]
    InvalidAddress {
        /// The chain being configured.
        chain: ChainId,
        /// The offending address.
        address: String,
    },

    /// No asset was configured and the network has no known USDC
    /// deployment.
    #[error("no payment asset configured for {0} and none known")]
    NoKnownAsset(ChainId),

    /// The configured minimum amount did not parse.
    #[error("invalid min_amount for {0}")]
    InvalidMinAmount(ChainId),

    /// Provider construction failed.
    #[error(transparent)]
    Provider(#[from] payproof_evm::provider::EvmProviderError),
}

/// Builds the verification lane for one configured chain.
///
/// # Errors
///
/// Returns [`LaneBuildError`] when the settings are unusable.
pub fn build_lane(
    chain_id: &ChainId,
    settings: &ChainSettings,
    breaker: BreakerSettings,
    retry: RetrySettings,
) -> Result<ChainLane, LaneBuildError> {
    let family = chain_id
        .family()
        .ok_or_else(|| LaneBuildError::UnsupportedFamily(chain_id.clone()))?;

    if settings.rpc_urls.is_empty() {
        return Err(LaneBuildError::NoEndpoints(chain_id.clone()));
    }

    let min_amount = settings
        .parse_min_amount()
        .map_err(|_| LaneBuildError::InvalidMinAmount(chain_id.clone()))?;

    let adapter: Arc<dyn ChainAdapter> = match family {
        ChainFamily::Evm => Arc::new(TransferAdapterKind::Evm(build_evm_adapter(
            chain_id, settings,
        )?)),
        ChainFamily::Solana => Arc::new(TransferAdapterKind::Solana(build_solana_adapter(
            chain_id, settings,
        )?)),
    };

    let decimals = settings.asset_decimals.unwrap_or(6);
    let asset = match family {
        ChainFamily::Evm => settings
            .asset
            .clone()
            .or_else(|| {
                payproof_evm::networks::usdc_contract(chain_id.reference())
                    .map(|a| a.to_string())
            })
            .ok_or_else(|| LaneBuildError::NoKnownAsset(chain_id.clone()))?,
        ChainFamily::Solana => settings
            .asset
            .clone()
            .or_else(|| {
                payproof_svm::networks::usdc_mint(chain_id.reference()).map(|m| m.to_string())
            })
            .ok_or_else(|| LaneBuildError::NoKnownAsset(chain_id.clone()))?,
    };

    Ok(ChainLane {
        policy: ChainPolicy {
            payment_address: settings.payment_address.clone(),
            asset,
            asset_decimals: decimals,
            min_confirmations: settings.min_confirmations,
            min_amount,
            max_tx_age: std::time::Duration::from_secs(settings.max_tx_age_secs),
        },
        adapter,
        breaker: Arc::new(CircuitBreaker::new(chain_id.to_string(), breaker.to_config())),
        retry: retry.to_policy(),
    })
}

fn build_evm_adapter(
    chain_id: &ChainId,
    settings: &ChainSettings,
) -> Result<EvmTransferAdapter, LaneBuildError> {
    let endpoints: Vec<(Url, Option<u32>)> = settings
        .rpc_urls
        .iter()
        .map(|raw| {
            raw.parse::<Url>()
                .map(|url| (url, settings.rpc_rate_limit))
                .map_err(|source| LaneBuildError::InvalidUrl {
                    chain: chain_id.clone(),
                    url: raw.clone(),
                    source,
                })
        })
        .collect::<Result<_, _>>()?;

    let payment_address = settings
        .payment_address
        .parse::<alloy_primitives::Address>()
        .map_err(|_| LaneBuildError::InvalidAddress {
            chain: chain_id.clone(),
            address: settings.payment_address.clone(),
        })?;

    let token = match &settings.asset {
        Some(raw) => raw
            .parse::<alloy_primitives::Address>()
            .map_err(|_| LaneBuildError::InvalidAddress {
                chain: chain_id.clone(),
                address: raw.clone(),
            })?,
        None => payproof_evm::networks::usdc_contract(chain_id.reference())
            .ok_or_else(|| LaneBuildError::NoKnownAsset(chain_id.clone()))?,
    };

    let provider = payproof_evm::provider::read_provider(chain_id, &endpoints)?;
    Ok(EvmTransferAdapter::new(
        chain_id.clone(),
        provider,
        token,
        payment_address,
        settings.asset_decimals.unwrap_or(payproof_evm::networks::USDC_DECIMALS),
    ))
}

fn build_solana_adapter(
    chain_id: &ChainId,
    settings: &ChainSettings,
) -> Result<SolanaTransferAdapter, LaneBuildError> {
    let rpc_url = settings.rpc_urls[0].clone();

    let payment_address = settings
        .payment_address
        .parse::<solana_pubkey::Pubkey>()
        .map_err(|_| LaneBuildError::InvalidAddress {
            chain: chain_id.clone(),
            address: settings.payment_address.clone(),
        })?;

    let mint = match &settings.asset {
        Some(raw) => {
            raw.parse::<solana_pubkey::Pubkey>()
                .map_err(|_| LaneBuildError::InvalidAddress {
                    chain: chain_id.clone(),
                    address: raw.clone(),
                })?
        }
        None => payproof_svm::networks::usdc_mint(chain_id.reference())
            .ok_or_else(|| LaneBuildError::NoKnownAsset(chain_id.clone()))?,
    };

    Ok(SolanaTransferAdapter::connect(
        chain_id.clone(),
        rpc_url,
        mint,
        payment_address,
        settings.asset_decimals.unwrap_or(payproof_svm::networks::USDC_DECIMALS),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(payment_address: &str) -> ChainSettings {
        ChainSettings {
            rpc_urls: vec!["https://mainnet.base.org".to_owned()],
            rpc_rate_limit: None,
            payment_address: payment_address.to_owned(),
            asset: None,
            asset_decimals: None,
            min_confirmations: 6,
            min_amount: "0.10".to_owned(),
            max_tx_age_secs: 3 * 24 * 3600,
        }
    }

    #[test]
    fn test_builds_evm_lane_with_default_usdc() {
        let chain = ChainId::new("eip155", "8453");
        let lane = build_lane(
            &chain,
            &settings("0x742d35Cc6634C0532925a3b8D4B5e3A3A3b7b7b7"),
            BreakerSettings::default(),
            RetrySettings::default(),
        )
        .unwrap();
        assert_eq!(lane.policy.min_confirmations, 6);
        assert_eq!(
            lane.policy.asset.to_lowercase(),
            "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913"
        );
    }

    #[test]
    fn test_builds_solana_lane() {
        let chain = ChainId::new("solana", "5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp");
        let mut cfg = settings("7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU");
        cfg.rpc_urls = vec!["https://api.mainnet-beta.solana.com".to_owned()];
        cfg.min_confirmations = 32;
        let lane = build_lane(
            &chain,
            &cfg,
            BreakerSettings::default(),
            RetrySettings::default(),
        )
        .unwrap();
        assert_eq!(lane.policy.min_confirmations, 32);
    }

    #[test]
    fn test_rejects_unknown_family() {
        let chain = ChainId::new("cosmos", "hub");
        let err = build_lane(
            &chain,
            &settings("addr"),
            BreakerSettings::default(),
            RetrySettings::default(),
        )
        .unwrap_err();
        assert!(matches!(err, LaneBuildError::UnsupportedFamily(_)));
    }

    #[test]
    fn test_rejects_bad_payment_address() {
        let chain = ChainId::new("eip155", "8453");
        let err = build_lane(
            &chain,
            &settings("not-an-address"),
            BreakerSettings::default(),
            RetrySettings::default(),
        )
        .unwrap_err();
        assert!(matches!(err, LaneBuildError::InvalidAddress { .. }));
    }

    #[test]
    fn test_rejects_missing_endpoints() {
        let chain = ChainId::new("eip155", "8453");
        let mut cfg = settings("0x742d35Cc6634C0532925a3b8D4B5e3A3A3b7b7b7");
        cfg.rpc_urls.clear();
        let err = build_lane(
            &chain,
            &cfg,
            BreakerSettings::default(),
            RetrySettings::default(),
        )
        .unwrap_err();
        assert!(matches!(err, LaneBuildError::NoEndpoints(_)));
    }
}
