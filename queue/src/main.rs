//! Queue service HTTP server.
//!
//! Wires the engine to its in-memory collaborators, starts the wall-clock
//! ticker and the lease reclaimer, and serves the HTTP API with graceful
//! shutdown.

use hype_queue::config::{Config, ConfigRegistry};
use hype_queue::coordinator::MemoryAdmissionCoordinator;
use hype_queue::engine::QueueEngine;
use hype_queue::metrics::register_queue_metrics;
use hype_queue::server::{AppState, build_router};
use hype_queue::state_store::MemoryClientQueueStateStore;
use hype_queue::tokens::MemoryAdmissionTokenStore;
use hype_queue_core::environment::SystemClock;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hype_queue=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting queue service");

    let config = Config::from_env();
    info!(
        host = %config.server.host,
        port = config.server.port,
        tick_interval_ms = config.queue.tick_interval_ms,
        grace_ms = config.queue.grace_ms,
        "Configuration loaded"
    );

    register_queue_metrics();

    let clock = Arc::new(SystemClock);
    let coordinator = Arc::new(MemoryAdmissionCoordinator::new(
        chrono::Duration::seconds(i64::try_from(config.queue.slot_lease_secs).unwrap_or(30)),
        chrono::Duration::seconds(i64::try_from(config.queue.checkout_ttl_secs).unwrap_or(300)),
    ));
    let state_store = Arc::new(MemoryClientQueueStateStore::new());
    let tokens = Arc::new(MemoryAdmissionTokenStore::new(chrono::Duration::seconds(
        i64::try_from(config.queue.token_ttl_secs).unwrap_or(120),
    )));
    let configs = Arc::new(ConfigRegistry::new());

    let engine = Arc::new(QueueEngine::new(
        clock,
        coordinator,
        state_store,
        tokens,
        configs,
        Duration::from_millis(config.queue.grace_ms),
    ));
    let _release_observer = engine.spawn_release_observer();

    // Wall-clock ticker driving the session state machine.
    let (shutdown_tx, mut ticker_shutdown) = tokio::sync::watch::channel(false);
    let ticker_engine = Arc::clone(&engine);
    let tick_interval = Duration::from_millis(config.queue.tick_interval_ms);
    let ticker = tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(error) = ticker_engine.tick_all().await {
                        warn!(%error, "tick failed");
                    }
                }
                _ = ticker_shutdown.changed() => break,
            }
        }
    });

    // Periodic reclaim of expired admission slot leases.
    let mut reclaimer_shutdown = shutdown_tx.subscribe();
    let reclaimer_engine = Arc::clone(&engine);
    let reclaim_interval = Duration::from_secs(config.queue.reclaim_interval_secs);
    let reclaimer = tokio::spawn(async move {
        let mut interval = tokio::time::interval(reclaim_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match reclaimer_engine.reclaim_expired().await {
                        Ok(reclaimed) if reclaimed > 0 => {
                            info!(reclaimed, "reclaimed expired admission slots");
                        }
                        Ok(_) => {}
                        Err(error) => warn!(%error, "lease reclaim failed"),
                    }
                }
                _ = reclaimer_shutdown.changed() => break,
            }
        }
    });

    let app = build_router(AppState::new(Arc::clone(&engine)));
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped, draining background tasks");
    shutdown_tx.send(true).ok();
    ticker.await.ok();
    reclaimer.await.ok();

    let shutdown_timeout = Duration::from_secs(config.server.shutdown_timeout);
    if let Err(error) = engine.shutdown(shutdown_timeout).await {
        warn!(%error, "engine shutdown incomplete");
    }

    info!("Queue service stopped");
    Ok(())
}

#[allow(clippy::expect_used)] // a process without signal handlers cannot shut down cleanly
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
