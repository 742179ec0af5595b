#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Core types and logic for multi-chain payment verification.
//!
//! This crate answers one question: given a transaction reference and a
//! target chain, did a qualifying payment occur — and if so, what metered
//! access should it buy? It is designed to be blockchain-agnostic, with
//! chain-specific adapters provided by separate crates (`payproof-evm` for
//! EIP-155 chains, `payproof-svm` for Solana).
//!
//! # Overview
//!
//! A caller submits a transaction hash and a network name. The
//! [`verifier::PaymentVerifier`] resolves the chain, fetches a normalized
//! [`transfer::TransferRecord`] through the configured adapter (behind a
//! per-chain [`breaker::CircuitBreaker`] and [`retry::RetryPolicy`]),
//! validates the transfer against the chain's [`policy::ChainPolicy`],
//! claims the transaction atomically in the [`claims::ClaimStore`] so the
//! same payment can never buy two grants, scores it, and mints a metered
//! access token via [`token::TokenVault`].
//!
//! # Modules
//!
//! - [`amount`] - Base-unit amounts and decimal normalization
//! - [`breaker`] - Per-chain circuit breaker with enforced call timeouts
//! - [`chain`] - Chain identifiers (CAIP-2) and the per-chain lane registry
//! - [`claims`] - Atomic replay/idempotency guard keyed by (chain, tx hash)
//! - [`confidential`] - Optional shielded-transfer (range proof) extension
//! - [`error`] - Failure taxonomy with stable, enumerable failure codes
//! - [`networks`] - Registry of well-known network names
//! - [`policy`] - Per-chain payment policy and grant (tier) policy
//! - [`retry`] - Reusable bounded-backoff retry policy for adapter calls
//! - [`risk`] - Pluggable confidence scoring of validated payments
//! - [`token`] - Access-token issuance and atomic quota tracking
//! - [`transfer`] - Normalized transfer records and the chain-adapter trait
//! - [`verifier`] - The payment verification pipeline

pub mod amount;
pub mod breaker;
pub mod chain;
pub mod claims;
pub mod confidential;
pub mod error;
pub mod networks;
pub mod policy;
pub mod retry;
pub mod risk;
pub mod token;
pub mod transfer;
pub mod verifier;
