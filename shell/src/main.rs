mod app;
mod backend;
mod config;
mod persistence;
mod routes;
mod services;
mod state;
mod windows;

use std::sync::Arc;

use tablero_shared::WindowKind;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use crate::backend::RestBackend;
use crate::persistence::FileStore;
use crate::services::coordinator::Coordinator;
use crate::state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let store = FileStore::new(config::data_dir());
    if let Err(e) = store.init() {
        tracing::error!(error = %e, "failed to create data directory");
        return;
    }
    tracing::info!(data_dir = %store.root().display(), "data directory ready");

    let backend_url = config::backend_url();
    let backend = match RestBackend::new(&backend_url) {
        Ok(backend) => backend,
        Err(e) => {
            tracing::error!(error = %e, %backend_url, "failed to configure backend client");
            return;
        }
    };
    tracing::info!(%backend_url, "backend client configured");

    let state = AppState::new(store, Arc::new(backend));
    state.coordinator.open_main_window().await;

    let coordinator = state.coordinator.clone();
    let app = app::build_app(state);

    let addr = format!("127.0.0.1:{}", config::shell_port());
    tracing::info!("Tablero shell listening on {addr}");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, %addr, "failed to bind TCP listener");
            return;
        }
    };
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(coordinator))
        .await
    {
        tracing::error!(error = %e, "server failed");
    }

    tracing::info!("Shell shut down gracefully");
}

async fn shutdown_signal(coordinator: Coordinator) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                return;
            }
        };
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
    // Open event streams only end once their windows are closed.
    coordinator.close_window(WindowKind::Main).await;
}
