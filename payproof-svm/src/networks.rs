//! Known Solana networks and USDC token mints.
//!
//! Solana networks are identified by the first 32 characters of their
//! genesis block hash.

use payproof::networks::NetworkInfo;
use solana_pubkey::{Pubkey, pubkey};

/// Well-known Solana networks with their names and CAIP-2 identifiers.
pub const SOLANA_NETWORKS: &[NetworkInfo] = &[
    NetworkInfo {
        name: "solana",
        namespace: "solana",
        reference: "5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp",
    },
    NetworkInfo {
        name: "solana-devnet",
        namespace: "solana",
        reference: "EtWTRABZaYq6iMfeYKouRu166VU2xqa1",
    },
];

/// USDC mint on Solana mainnet (native Circle USDC).
pub const USDC_SOLANA: Pubkey = pubkey!("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v");

/// USDC mint on Solana devnet (Circle testnet USDC).
pub const USDC_SOLANA_DEVNET: Pubkey = pubkey!("4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU");

/// Decimal precision of USDC on Solana.
pub const USDC_DECIMALS: u8 = 6;

/// Returns the USDC mint for a Solana chain reference, if known.
#[must_use]
pub fn usdc_mint(chain_reference: &str) -> Option<Pubkey> {
    match chain_reference {
        "5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp" => Some(USDC_SOLANA),
        "EtWTRABZaYq6iMfeYKouRu166VU2xqa1" => Some(USDC_SOLANA_DEVNET),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mainnet_mint_resolves() {
        assert_eq!(
            usdc_mint("5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp"),
            Some(USDC_SOLANA)
        );
        assert_eq!(usdc_mint("unknown"), None);
    }
}
