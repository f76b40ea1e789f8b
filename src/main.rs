use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use coldwatch::common::AppState;
use coldwatch::config::Config;
use coldwatch::routes;
use coldwatch::services::notifier::LogNotifier;
use coldwatch::supabase::{ChangeFeed, DisabledChangeFeed, PollingChangeFeed, RemoteStore, SupabaseClient};
use coldwatch::sync::{RandomWalk, SyncOptions, Synchronizer};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,coldwatch=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting coldwatch...");

    // Load configuration (fail-fast)
    let config = Config::from_env()?;
    tracing::info!(
        deployment = ?config.deployment,
        host = %config.api_host,
        port = config.api_port,
        range = %config.default_range,
        "Configuration loaded"
    );

    // Platform client
    let client = Arc::new(SupabaseClient::new(&config)?);
    tracing::info!(url = %config.supabase_url, "Supabase client initialized");

    let store: Arc<dyn RemoteStore> = client.clone();
    let feed: Arc<dyn ChangeFeed> = if config.change_feed_interval_seconds == 0 {
        tracing::warn!("Change feed disabled, relying on polling refresh");
        Arc::new(DisabledChangeFeed)
    } else {
        Arc::new(PollingChangeFeed::new(
            Arc::clone(&store),
            Duration::from_secs(config.change_feed_interval_seconds),
        ))
    };

    let sync = Arc::new(Synchronizer::new(
        store,
        client,
        feed,
        Arc::new(LogNotifier::new(config.desktop_notifications)),
        Box::new(RandomWalk::new()),
        SyncOptions::from_config(&config),
    ));

    // Optional unattended sign-in
    if let Some((email, password)) = config.dashboard_credentials() {
        if let Err(e) = sync.sign_in(email, password).await {
            tracing::error!(error = %e, "Dashboard sign-in failed, continuing read-only");
        }
    } else {
        tracing::info!("No dashboard credentials, running read-only");
    }

    // Initial load, change subscriptions, then the timers
    sync.start().await;
    sync.spawn_timers(
        Duration::from_secs(config.poll_interval_seconds),
        Duration::from_secs(config.tick_interval_seconds),
    );

    let addr = config.bind_address();
    let state = AppState::new(config, Arc::clone(&sync));

    // Build router
    let app = routes::build_router(state);

    // Start server with graceful shutdown
    tracing::info!(address = %addr, "Starting server");
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sync.dispose().await;
    tracing::info!("Server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down...");
        },
        () = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        },
    }
}
