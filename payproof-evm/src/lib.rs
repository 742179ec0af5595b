#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! EIP-155 (EVM) chain support for payproof payment verification.
//!
//! EVM chains record token payments as ERC-20 `Transfer` event logs in the
//! transaction receipt. The [`adapter::EvmTransferAdapter`] fetches the
//! receipt, scans its logs for a transfer of the configured payment token
//! to the configured payment address, and normalizes the result into a
//! [`payproof::transfer::TransferRecord`]. Confirmation depth is the
//! distance from the containing block to the chain head.
//!
//! # Modules
//!
//! - [`adapter`] - The receipt-scanning chain adapter
//! - [`networks`] - Known EVM networks and USDC deployments
//! - [`provider`] - Multi-endpoint read-only RPC provider construction

pub mod adapter;
pub mod networks;
pub mod provider;

pub use adapter::EvmTransferAdapter;
pub use networks::EVM_NETWORKS;
