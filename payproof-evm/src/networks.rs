//! Known EVM network configurations and USDC token deployments.

use alloy_primitives::{Address, address};
use payproof::networks::NetworkInfo;

/// Well-known EVM networks with their names and CAIP-2 identifiers.
pub const EVM_NETWORKS: &[NetworkInfo] = &[
    NetworkInfo {
        name: "base",
        namespace: "eip155",
        reference: "8453",
    },
    NetworkInfo {
        name: "base-sepolia",
        namespace: "eip155",
        reference: "84532",
    },
    NetworkInfo {
        name: "ethereum",
        namespace: "eip155",
        reference: "1",
    },
];

/// USDC contract address on Base Mainnet.
pub const USDC_BASE: Address = address!("833589fCD6eDb6E08f4c7C32D4f71b54bdA02913");

/// USDC contract address on Base Sepolia.
pub const USDC_BASE_SEPOLIA: Address = address!("036CbD53842c5426634e7929541eC2318f3dCF7e");

/// USDC contract address on Ethereum Mainnet.
pub const USDC_ETHEREUM: Address = address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");

/// Decimal precision used by USDC on every EVM deployment.
pub const USDC_DECIMALS: u8 = 6;

/// Returns the USDC contract for an eip155 chain reference, if known.
#[must_use]
pub fn usdc_contract(chain_reference: &str) -> Option<Address> {
    match chain_reference {
        "8453" => Some(USDC_BASE),
        "84532" => Some(USDC_BASE_SEPOLIA),
        "1" => Some(USDC_ETHEREUM),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_references_resolve() {
        assert_eq!(usdc_contract("8453"), Some(USDC_BASE));
        assert_eq!(usdc_contract("1"), Some(USDC_ETHEREUM));
        assert_eq!(usdc_contract("137"), None);
    }

    #[test]
    fn test_network_names_are_distinct() {
        let mut names: Vec<&str> = EVM_NETWORKS.iter().map(|n| n.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), EVM_NETWORKS.len());
    }
}
