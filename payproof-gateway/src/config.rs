//! Gateway configuration.
//!
//! Loads configuration from a TOML file with support for environment
//! variable expansion in string values. Variables use `$VAR` or `${VAR}`
//! syntax; unresolved variables are left as-is.
//!
//! # Example Configuration
//!
//! ```toml
//! host = "0.0.0.0"
//! port = 4021
//! idempotency_window_secs = 3600
//!
//! [grant]
//! tier = "payg"
//! requests_per_unit = 10
//! token_ttl_hours = 24
//!
//! [chains.base]
//! rpc_urls = ["https://mainnet.base.org"]
//! payment_address = "$PAYMENT_ADDRESS_BASE"
//! min_confirmations = 6
//! min_amount = "0.10"
//!
//! [chains.solana]
//! rpc_urls = ["https://api.mainnet-beta.solana.com"]
//! payment_address = "$PAYMENT_ADDRESS_SOLANA"
//! min_confirmations = 32
//! ```
//!
//! # Environment Variables
//!
//! - `CONFIG` — Path to configuration file (default: `config.toml`)
//! - `HOST` / `PORT` — Override server bind address and port
//! - Any `$VAR` referenced from the config file

use std::collections::HashMap;
use std::net::IpAddr;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use payproof::breaker::BreakerConfig;
use payproof::policy::GrantPolicy;
use payproof::retry::RetryPolicy;
use regex::{Captures, Regex};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Top-level gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Server bind address (default: `0.0.0.0`).
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Server port (default: `4021`).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Idempotency window for replayed verifications, in seconds.
    #[serde(default = "default_idempotency_window_secs")]
    pub idempotency_window_secs: u64,

    /// Interval between claim/token expiry sweeps, in seconds.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Circuit breaker settings shared by all chains.
    #[serde(default)]
    pub breaker: BreakerSettings,

    /// Retry settings applied around adapter calls.
    #[serde(default)]
    pub retry: RetrySettings,

    /// Grant policy for issued tokens.
    #[serde(default)]
    pub grant: GrantSettings,

    /// Chain configurations keyed by network name (e.g., `base`,
    /// `solana`).
    #[serde(default)]
    pub chains: HashMap<String, ChainSettings>,
}

/// Circuit breaker tuning.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerSettings {
    /// Failures within the window that trip the breaker.
    pub failure_threshold: u32,
    /// Failure-counting window, seconds.
    pub window_secs: u64,
    /// Cooldown before a probe, seconds.
    pub cooldown_secs: u64,
    /// Enforced per-call timeout, seconds.
    pub call_timeout_secs: u64,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 6,
            window_secs: 300,
            cooldown_secs: 60,
            call_timeout_secs: 10,
        }
    }
}

impl BreakerSettings {
    /// Converts to the core breaker configuration.
    #[must_use]
    pub const fn to_config(self) -> BreakerConfig {
        BreakerConfig {
            failure_threshold: self.failure_threshold,
            window: Duration::from_secs(self.window_secs),
            cooldown: Duration::from_secs(self.cooldown_secs),
            call_timeout: Duration::from_secs(self.call_timeout_secs),
        }
    }
}

/// Retry tuning.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Total attempts including the first call.
    pub max_attempts: u32,
    /// Initial backoff delay, milliseconds.
    pub base_delay_ms: u64,
    /// Backoff ceiling, milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 250,
            max_delay_ms: 5000,
        }
    }
}

impl RetrySettings {
    /// Converts to the core retry policy.
    #[must_use]
    pub const fn to_policy(self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

/// Grant (tier) settings for issued tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GrantSettings {
    /// Tier label stamped on tokens.
    pub tier: String,
    /// Requests granted per whole unit of payment currency.
    pub requests_per_unit: u32,
    /// Token lifetime, hours.
    pub token_ttl_hours: u64,
}

impl Default for GrantSettings {
    fn default() -> Self {
        Self {
            tier: "payg".to_owned(),
            requests_per_unit: 10,
            token_ttl_hours: 24,
        }
    }
}

impl GrantSettings {
    /// Converts to the core grant policy.
    #[must_use]
    pub fn to_policy(&self) -> GrantPolicy {
        GrantPolicy {
            tier: self.tier.clone(),
            requests_per_unit: self.requests_per_unit,
            token_ttl: Duration::from_secs(self.token_ttl_hours * 3600),
        }
    }
}

/// Per-chain configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainSettings {
    /// HTTP RPC endpoint URLs. EVM chains use all of them with failover;
    /// Solana uses the first.
    pub rpc_urls: Vec<String>,

    /// Optional per-endpoint request rate limit (requests per second).
    #[serde(default)]
    pub rpc_rate_limit: Option<u32>,

    /// Address payments must be sent to. Supports `$VAR` expansion.
    pub payment_address: String,

    /// Payment token contract/mint. Defaults to the network's known USDC
    /// deployment.
    #[serde(default)]
    pub asset: Option<String>,

    /// Payment token decimals. Defaults to USDC's 6.
    #[serde(default)]
    pub asset_decimals: Option<u8>,

    /// Minimum confirmation depth (default: 6).
    #[serde(default = "default_min_confirmations")]
    pub min_confirmations: u64,

    /// Minimum accepted payment amount (default: `"0.10"`).
    #[serde(default = "default_min_amount")]
    pub min_amount: String,

    /// Maximum accepted transaction age, seconds (default: 3 days).
    #[serde(default = "default_max_tx_age_secs")]
    pub max_tx_age_secs: u64,
}

impl ChainSettings {
    /// Parses the configured minimum amount.
    ///
    /// # Errors
    ///
    /// Returns an error when the amount is not a valid decimal.
    pub fn parse_min_amount(&self) -> Result<Decimal, rust_decimal::Error> {
        self.min_amount.parse()
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(std::net::Ipv4Addr::new(0, 0, 0, 0))
}

fn default_port() -> u16 {
    4021
}

fn default_idempotency_window_secs() -> u64 {
    3600
}

fn default_sweep_interval_secs() -> u64 {
    900
}

fn default_min_confirmations() -> u64 {
    6
}

fn default_min_amount() -> String {
    "0.10".to_owned()
}

fn default_max_tx_age_secs() -> u64 {
    3 * 24 * 3600
}

impl GatewayConfig {
    /// Loads configuration from the path given by the `CONFIG`
    /// environment variable, falling back to `config.toml` in the current
    /// directory. `HOST` and `PORT` env vars override file values.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let path = std::env::var("CONFIG").unwrap_or_else(|_| "config.toml".to_owned());
        Self::load_from(&path)
    }

    /// Loads configuration from a specific file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let content = if Path::new(path).exists() {
            std::fs::read_to_string(path)?
        } else {
            // No config file: defaults only, no chains.
            String::new()
        };

        let expanded = expand_with(&content, |name| std::env::var(name).ok());
        let mut config: Self = toml::from_str(&expanded)?;

        if let Ok(host) = std::env::var("HOST")
            && let Ok(addr) = host.parse()
        {
            config.host = addr;
        }
        if let Ok(port) = std::env::var("PORT")
            && let Ok(p) = port.parse()
        {
            config.port = p;
        }

        Ok(config)
    }
}

static ENV_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z0-9_]+)\}|\$([A-Za-z0-9_]+)").expect("valid regex"));

/// Expands `$VAR` and `${VAR}` patterns using the given lookup.
/// Unresolved variables are left as-is.
fn expand_with<F>(input: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    ENV_VAR_RE
        .replace_all(input, |caps: &Captures<'_>| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            lookup(name).unwrap_or_else(|| caps[0].to_owned())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_both_syntaxes() {
        let lookup = |name: &str| match name {
            "KEY" => Some("resolved".to_owned()),
            _ => None,
        };
        assert_eq!(expand_with("a $KEY b", lookup), "a resolved b");
        assert_eq!(expand_with("a ${KEY} b", lookup), "a resolved b");
    }

    #[test]
    fn test_unresolved_left_as_is() {
        let expanded = expand_with("addr = \"$MISSING_VAR\"", |_| None);
        assert_eq!(expanded, "addr = \"$MISSING_VAR\"");
    }

    #[test]
    fn test_parse_full_config() {
        let toml_src = r#"
            port = 8080
            idempotency_window_secs = 1800

            [grant]
            tier = "pro"
            requests_per_unit = 100
            token_ttl_hours = 48

            [chains.base]
            rpc_urls = ["https://mainnet.base.org"]
            payment_address = "0x742d35Cc6634C0532925a3b8D4B5e3A3A3b7b7b7"
            min_confirmations = 6
            min_amount = "0.10"

            [chains.solana]
            rpc_urls = ["https://api.mainnet-beta.solana.com"]
            payment_address = "7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU"
            min_confirmations = 32
        "#;
        let config: GatewayConfig = toml::from_str(toml_src).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.idempotency_window_secs, 1800);
        assert_eq!(config.grant.requests_per_unit, 100);
        assert_eq!(config.chains.len(), 2);
        let base = &config.chains["base"];
        assert_eq!(base.min_confirmations, 6);
        assert_eq!(
            base.parse_min_amount().unwrap(),
            "0.10".parse::<Decimal>().unwrap()
        );
        let solana = &config.chains["solana"];
        assert_eq!(solana.min_confirmations, 32);
        // Defaults fill unspecified fields.
        assert_eq!(solana.max_tx_age_secs, 3 * 24 * 3600);
        assert!(solana.asset.is_none());
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: GatewayConfig = toml::from_str("").unwrap();
        assert_eq!(config.port, 4021);
        assert!(config.chains.is_empty());
        assert_eq!(config.breaker.failure_threshold, 6);
        assert_eq!(config.retry.max_attempts, 3);
    }
}
