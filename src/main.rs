use anyhow::Context;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use local_sharer::AppState;
use local_sharer::config::{ClipboardBackend, Config};
use local_sharer::middleware::signing_key;
use local_sharer::routes;
use local_sharer::services::{
    ClipboardBridge, FileStore, MemoryClipboard, SessionGate, ShareService, SystemClipboard,
};

/// How long requests still running at shutdown get before being abandoned
const IN_FLIGHT_GRACE: Duration = Duration::from_secs(2);
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "local_sharer=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    tracing::info!("Starting Local Sharer");
    tracing::info!("Shared folder: {}", config.upload_dir.display());
    tracing::info!("PIN required: {}", !config.pin.is_empty());

    // Initialize services
    let file_store = Arc::new(FileStore::new(&config.upload_dir)?);
    file_store.wipe_all().await;

    let clipboard: Arc<dyn ClipboardBridge> = match config.clipboard_backend {
        ClipboardBackend::System => Arc::new(SystemClipboard::new()),
        ClipboardBackend::Memory => {
            tracing::info!("Using in-memory clipboard");
            Arc::new(MemoryClipboard::new())
        }
    };
    let session_gate = Arc::new(SessionGate::new(
        config.pin.clone(),
        config.session_idle_timeout,
    ));
    let shutdown = CancellationToken::new();

    let share_service = Arc::new(ShareService::new(
        file_store.clone(),
        clipboard,
        session_gate.clone(),
        shutdown.clone(),
        config.shutdown_delay,
    ));

    let app_state = AppState {
        share_service,
        cookie_key: signing_key(config.session_secret.as_deref()),
    };
    let app = routes::app(app_state, config.max_upload_bytes);

    tokio::spawn(sweep_idle_sessions(session_gate, shutdown.clone()));
    tokio::spawn(shutdown_signal(shutdown.clone()));

    // Start server
    let addr = SocketAddr::new(config.host, config.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    let local_addr = listener.local_addr()?;

    tracing::info!("Server is running. Open your browser and go to:");
    tracing::info!("http://{}", local_addr);
    tracing::info!("Press CTRL+C to stop the server.");

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .into_future();

    tokio::select! {
        result = server => result?,
        _ = abandon_after_grace(shutdown.clone()) => {
            tracing::warn!("Abandoning requests still in flight");
        }
    }

    tracing::info!("Shutting down and cleaning up uploaded files");
    file_store.wipe_all().await;

    Ok(())
}

async fn abandon_after_grace(shutdown: CancellationToken) {
    shutdown.cancelled().await;
    tokio::time::sleep(IN_FLIGHT_GRACE).await;
}

async fn sweep_idle_sessions(gate: Arc<SessionGate>, shutdown: CancellationToken) {
    let mut interval = tokio::time::interval(SESSION_SWEEP_INTERVAL);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {
                let purged = gate.purge_idle();
                if purged > 0 {
                    tracing::debug!("Expired {} idle sessions", purged);
                }
            }
        }
    }
}

async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down gracefully...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down gracefully...");
        }
        _ = shutdown.cancelled() => return,
    }

    shutdown.cancel();
}
