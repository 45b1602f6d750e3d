use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tokio::sync::watch;

use tgstate::{
    api,
    bot::LinkBot,
    config::Config,
    gateway::{HttpFetcher, TelegramGateway},
    storage::ShortIdStore,
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    match log_format.to_lowercase().as_str() {
        "gcp" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_stackdriver::layer())
                .init();
        }
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_span_list(false),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    info!(version = env!("CARGO_PKG_VERSION"), "tgstate starting");

    // Load configuration
    let config = Config::load()?;
    info!(mode = ?config.mode, "Loaded configuration for target: {}", config.telegram.target);

    // The mapping store is required; refuse to start without it
    let store = ShortIdStore::open(&config.node.data_dir)?;
    info!("Short ID store opened at: {}", config.node.data_dir);

    let gateway = Arc::new(TelegramGateway::new(
        &config.telegram.api_url,
        &config.telegram.bot_token,
        &config.telegram.target,
    )?);
    let fetcher = HttpFetcher::new()?;

    // Chat-side registration runs beside the HTTP server
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let bot = LinkBot::new(
        store.clone(),
        gateway.clone(),
        &config.telegram.target,
        config.base_url.clone(),
    );
    let bot_handle = tokio::spawn(async move { bot.run(shutdown_rx).await });

    // Create shared state
    let state = Arc::new(AppState::new(
        config.clone(),
        store,
        gateway,
        Arc::new(fetcher),
    ));

    // Build and start the HTTP server
    let app = api::create_router(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(&config.node.bind_address).await?;
    info!("Listening on: {}", config.node.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    if let Err(e) = bot_handle.await {
        tracing::warn!(error = %e, "Link bot task ended abnormally");
    }

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}
