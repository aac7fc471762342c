use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use notifications_engine::config::Settings;
use notifications_engine::server::{create_app, AppState};
use notifications_engine::triggers::RedisActionSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    // Load configuration
    let settings = Settings::new()?;
    tracing::info!("Configuration loaded");

    let state = AppState::new(settings.clone());

    // Seed templates before accepting actions
    let seeded = state.seed_templates().await?;
    tracing::info!(
        templates = seeded,
        v2_enabled = settings.feature_flags.templates_v2_enabled,
        "Template registry ready"
    );

    // Start Redis action subscriber in background
    let state_subscriber = state.subscriber.clone();
    let subscriber = state.subscriber.clone();
    let subscriber_handle = tokio::spawn(async move {
        if let Err(e) = subscriber.start().await {
            tracing::error!(error = %e, "Redis action subscriber failed");
        }
    });

    let app = create_app(state);

    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_handler(state_subscriber))
        .await?;

    tracing::info!("Waiting for background tasks to finish...");
    let _ = subscriber_handle.await;

    tracing::info!("Server shutdown complete");
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

async fn shutdown_signal_handler(subscriber: Arc<RedisActionSubscriber>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
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
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }

    // Stop the Redis subscriber
    subscriber.shutdown();
}
