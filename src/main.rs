//! Marketplace access gate.
//!
//! Sits in front of the marketplace page server and decides, per request,
//! whether to forward it, redirect it or reject it.
//!
//! ```text
//!                        ┌──────────────────────────────────────────────┐
//!   Client request       │                 MARKETPLACE GATE             │
//!   ─────────────────────┼─▶ request id ─▶ excluded? ─▶ rate limit      │
//!                        │                                 │            │
//!                        │                      crawler? ◀─┘            │
//!                        │                         │                    │
//!                        │               session lookup (identity)      │
//!                        │                         │                    │
//!                        │              decision: allow / redirect      │
//!                        │                         │                    │
//!   Client response      │                         ▼                    │
//!   ◀────────────────────┼── security headers ◀── page server ◀─────────┼── Upstream
//!                        │                                              │
//!                        │  /api/verification/{start,complete}          │
//!                        │      rate limit ─▶ verification store        │
//!                        └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use marketplace_gate::admin::{setup_admin_router, AdminState};
use marketplace_gate::auth::{AuthEvent, SessionProvider, SupabaseSessionProvider};
use marketplace_gate::config::{load_config, watcher::ConfigWatcher, GateConfig};
use marketplace_gate::lifecycle::{wait_for_shutdown_signal, Shutdown};
use marketplace_gate::observability::{logging, metrics};
use marketplace_gate::security::rate_limit;
use marketplace_gate::verification::MemoryVerificationStore;
use marketplace_gate::{GateServices, HttpServer};

#[derive(Parser)]
#[command(name = "marketplace-gate", version, about = "Access gate for the marketplace web app")]
struct Args {
    /// Path to the TOML config file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GateConfig::default(),
    };

    logging::init_logging(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "marketplace-gate starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.address,
        rate_limit_enabled = config.rate_limit.enabled,
        max_requests = config.rate_limit.max_requests,
        window_secs = config.rate_limit.window_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let store = Arc::new(match &config.verification.store_path {
        Some(path) => MemoryVerificationStore::load_from_file(path)?,
        None => MemoryVerificationStore::new(None),
    });

    let sessions = Arc::new(SupabaseSessionProvider::new(&config.identity)?);
    let _auth_events = sessions.on_auth_state_change(Box::new(|event: &AuthEvent| {
        tracing::info!(user_id = event.user_id(), kind = event.kind(), "Auth state changed");
        metrics::record_auth_event(event.kind());
    }));

    let limiter = rate_limit::from_config(&config.rate_limit);
    let services = GateServices {
        sessions,
        verification_store: store.clone(),
        user_store: store.clone(),
        limiter: limiter.clone(),
    };

    let shutdown = Shutdown::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            wait_for_shutdown_signal().await;
            shutdown.trigger();
        });
    }

    // The watcher handle must outlive the server.
    let (config_updates, _watcher) = match &args.config {
        Some(path) => {
            let (watcher, rx) = ConfigWatcher::new(path);
            (rx, Some(watcher.run()?))
        }
        None => {
            let (_tx, rx) = mpsc::unbounded_channel();
            (rx, None)
        }
    };

    let server = HttpServer::with_services(config.clone(), services)?;

    if config.admin.enabled {
        let admin_state = AdminState {
            api_key: Arc::from(config.admin.api_key.as_str()),
            limiter,
            rate_limit: config.rate_limit.clone(),
            policy: server.policy(),
            started_at: Instant::now(),
        };
        let admin_listener = TcpListener::bind(&config.admin.bind_address).await?;
        tracing::info!(address = %config.admin.bind_address, "Admin API listening");

        let mut admin_shutdown = shutdown.subscribe();
        tokio::spawn(async move {
            let serve = axum::serve(admin_listener, setup_admin_router(admin_state))
                .with_graceful_shutdown(async move {
                    let _ = admin_shutdown.recv().await;
                });
            if let Err(e) = serve.await {
                tracing::error!(error = %e, "Admin API failed");
            }
        });
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    server.run(listener, config_updates, shutdown.subscribe()).await?;

    if let Err(e) = store.save_to_file() {
        tracing::error!(error = %e, "Failed to save verification store");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
