//! Payment verification gateway server.
//!
//! # Usage
//!
//! ```bash
//! # Run with default config (config.toml in current directory)
//! cargo run -p payproof-gateway --release
//!
//! # Run with custom config path
//! CONFIG=/path/to/config.toml cargo run -p payproof-gateway
//!
//! # Configure logging level
//! RUST_LOG=info cargo run -p payproof-gateway
//! ```
//!
//! # Environment Variables
//!
//! - `CONFIG` — Path to TOML configuration file (default: `config.toml`)
//! - `HOST` — Override bind address (default: `0.0.0.0`)
//! - `PORT` — Override port (default: `4021`)
//! - `RUST_LOG` — Log level filter (default: `info`)

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::Method;
use payproof::chain::ChainRegistry;
use payproof::networks::NetworkRegistry;
use payproof::risk::DepthScorer;
use payproof::verifier::PaymentVerifier;
use tower_http::cors;
use tracing_subscriber::EnvFilter;

use payproof_gateway::adapters::build_lane;
use payproof_gateway::config::GatewayConfig;
use payproof_gateway::handlers::{AppState, GatewayState, gateway_router, supported_response};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let _ = dotenvy::dotenv();

    if let Err(e) = run().await {
        tracing::error!("gateway failed: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = GatewayConfig::load()?;
    tracing::info!(
        host = %config.host,
        port = config.port,
        chains = config.chains.len(),
        "loaded configuration"
    );

    if config.chains.is_empty() {
        tracing::warn!("no chains configured — every verification will be rejected");
    }

    let networks = NetworkRegistry::from_networks(payproof_evm::EVM_NETWORKS)
        .with_networks(payproof_svm::SOLANA_NETWORKS);

    // The adapter variant for each chain is selected here, once, by
    // family; nothing downstream branches on network names.
    let mut lanes = HashMap::new();
    for (name, settings) in &config.chains {
        let Some(chain_id) = networks.chain_id_by_name(name) else {
            tracing::warn!(network = %name, "skipping chain: unknown network name");
            continue;
        };
        let payment_address = settings.payment_address.trim();
        if payment_address.is_empty() || payment_address.starts_with('$') {
            tracing::warn!(
                network = %name,
                "skipping chain: payment_address not resolved (missing env var?)"
            );
            continue;
        }
        let lane = build_lane(chain_id, settings, config.breaker, config.retry)?;
        tracing::info!(
            network = %name,
            chain = %chain_id,
            payment_address = %settings.payment_address,
            min_confirmations = settings.min_confirmations,
            "registered chain lane"
        );
        lanes.insert(chain_id.clone(), lane);
    }

    let verifier = PaymentVerifier::new(
        networks,
        ChainRegistry::new(lanes),
        config.grant.to_policy(),
        Box::new(DepthScorer),
        Duration::from_secs(config.idempotency_window_secs),
    );
    let supported = supported_response(&verifier, &config.grant);
    let state: GatewayState = Arc::new(AppState {
        verifier,
        supported,
    });

    // Periodic expiry sweep for claims and dead tokens.
    let sweep_state = Arc::clone(&state);
    let sweep_interval = Duration::from_secs(config.sweep_interval_secs.max(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            sweep_state.verifier.sweep();
        }
    });

    let app = gateway_router(Arc::clone(&state)).layer(
        cors::CorsLayer::new()
            .allow_origin(cors::Any)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(cors::Any),
    );

    let addr = SocketAddr::new(config.host, config.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("gateway listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("gateway shut down gracefully");
    Ok(())
}

/// Waits for Ctrl-C or SIGTERM (Unix) to initiate graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => tracing::info!("received Ctrl-C, shutting down..."),
            _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down..."),
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.expect("failed to listen for Ctrl-C");
        tracing::info!("received Ctrl-C, shutting down...");
    }
}
