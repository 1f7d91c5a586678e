//! mCSD Update Client entry point.

use std::path::PathBuf;
use std::sync::Arc;

use mcsd_client::{FhirAccess, NoAuthProvider, StaticTokenProvider, TokenProvider};
use mcsd_core::SourceDirectory;
use mcsd_server::{build_router, AppState, CursorStore, DirectoryRegistry, EngineConfig};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("starting mcsd-update-client");

    let config = EngineConfig::load(
        std::path::Path::new("config.yaml")
            .exists()
            .then_some("config.yaml"),
    )
    .unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        EngineConfig::default()
    });

    let roots: Vec<SourceDirectory> = config
        .administration_directories
        .values()
        .map(|admin| SourceDirectory::root(admin.base_url.clone()))
        .collect();
    let registry = Arc::new(DirectoryRegistry::new(roots, config.exclude_admin_directories.clone()));

    let cursor_path = (!config.state_file.is_empty()).then(|| PathBuf::from(&config.state_file));
    let cursor = Arc::new(CursorStore::new(cursor_path));
    cursor.load().await;

    let token_provider: Arc<dyn TokenProvider> = match &config.auth.bearer_token {
        Some(token) if !token.is_empty() => Arc::new(StaticTokenProvider::new(token.clone())),
        _ => Arc::new(NoAuthProvider),
    };
    let access = Arc::new(FhirAccess::new(reqwest::Client::new(), token_provider));

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    let state = Arc::new(AppState {
        registry,
        cursor,
        access,
        config,
        run_lock: Mutex::new(()),
        cancel: CancellationToken::new(),
    });

    let app = build_router(state);

    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(addr = %bind_addr, error = %e, "failed to bind");
            std::process::exit(1);
        }
    };

    tracing::info!(addr = %bind_addr, "listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "server error");
        });

    tracing::info!("server shut down gracefully");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
