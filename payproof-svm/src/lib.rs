#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Solana chain support for payproof payment verification.
//!
//! Solana records token payments as SPL-Token transfer *instructions*
//! rather than event logs. The [`adapter::SolanaTransferAdapter`] fetches
//! the confirmed transaction, decodes its versioned message, and scans the
//! compiled instructions for a transfer of the configured mint to the
//! payment address's associated token account. Confirmation depth is
//! derived from the current slot minus the transaction slot — never from
//! a boolean finality flag — so the uniform minimum-confirmations policy
//! applies across chain families.
//!
//! # Modules
//!
//! - [`adapter`] - The instruction-scanning chain adapter
//! - [`networks`] - Known Solana networks and USDC mints

pub mod adapter;
pub mod networks;

pub use adapter::SolanaTransferAdapter;
pub use networks::SOLANA_NETWORKS;
