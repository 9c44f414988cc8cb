// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Orbythic Intake Service
//!
//! Accepts contact requests and waitlist sign-ups from the marketing site.
//!
//! ## Configuration
//!
//! Configuration is loaded from environment variables (and a `.env` file
//! when present):
//!
//! - `BIND_ADDR`: Server bind address (default: 0.0.0.0:8080)
//! - `RATE_LIMIT_MAX_REQUESTS`: Requests per window per client (default: 5)
//! - `RATE_LIMIT_WINDOW_MS`: Window length in milliseconds (default: 60000)
//! - `RATE_LIMIT_SWEEP_INTERVAL_MS`: Expired entry sweep interval (default: 60000)
//! - `CONTACT_RATE_LIMIT_ENABLED`: Also throttle `/api/contact` (default: false)
//! - `SUPABASE_URL`, `SUPABASE_SERVICE_ROLE_KEY` / `SUPABASE_ANON_KEY`
//!   (or the `NEXT_PUBLIC_` variants):
//!   hosted database; without them contact requests are only logged and
//!   waitlist sign-ups return 503
//! - `CORS_ALLOWED_ORIGINS`: comma-separated origins allowed to post forms
//! - `METRICS_ENABLED`, `METRICS_PATH`: Prometheus endpoint

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use orbythic_intake::{
    config::Config,
    handlers::{router, AppState},
    store::{SubmissionStore, SupabaseStore},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables before the filter reads RUST_LOG
    let dotenv = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    if let Err(err) = dotenv {
        if !err.not_found() {
            warn!(error = %err, "Failed to read .env file");
        }
    }

    // Load configuration
    let config = Config::from_env();
    info!(
        bind_addr = %config.bind_addr,
        max_requests = config.rate_limit.max_requests,
        window_ms = config.rate_limit.window_ms,
        limit_contact = config.rate_limit.limit_contact,
        sweep_interval_ms = config.rate_limit.sweep_interval_ms,
        store_configured = config.store.credentials().is_some(),
        "Starting Orbythic intake service"
    );

    let store: Option<Arc<dyn SubmissionStore>> = match config.store.credentials() {
        Some((url, key)) => Some(Arc::new(SupabaseStore::new(url, key)?)),
        None => {
            warn!("SUPABASE_URL or key missing, submissions will not be persisted");
            None
        }
    };

    // Create application state
    let state = Arc::new(AppState::new(config.clone(), store)?);

    // Spawn cleanup tasks
    let sweep_every = config.rate_limit.sweep_interval();
    let sweepers: Vec<_> = std::iter::once(&state.waitlist_limiter)
        .chain(state.contact_limiter.as_ref())
        .map(|limiter| limiter.spawn_sweeper(sweep_every))
        .collect();

    // Build router
    let app = router(state).layer(TraceLayer::new_for_http());

    // Start server
    let addr: SocketAddr = config.bind_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    for sweeper in sweepers {
        sweeper.shutdown().await;
    }
    info!("Server stopped");

    Ok(())
}

/// Resolve on ctrl-c.
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
