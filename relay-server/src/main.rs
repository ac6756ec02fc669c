mod config;
mod connection;
mod dispatcher;
mod error;
mod state;

use crate::config::{AppConfig, load_catalogs};
use crate::connection::handle_socket;
use crate::state::{AppState, cleanup_empty_rooms};
use axum::Router;
use axum::extract::ws::WebSocket;
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum_server::tls_rustls::RustlsConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
/// Activates error tracing, spawns a watchdog task to clean up eventual dead
/// rooms, then sets up the routing system to serve the web socket and the
/// reload endpoint, listening on the configured address.
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=trace", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_file(true)
                .with_line_number(true)
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true),
        )
        .init();

    let config = AppConfig::from_env();
    let catalogs = load_catalogs(&config.catalog_dir).await.unwrap_or_else(|err| {
        tracing::error!(?err, "initial catalog load failed");
        panic!("initial catalog load failed: {err}");
    });
    let listen_addr = config.listen_addr.clone();
    let tls_paths = config
        .tls_paths()
        .map(|(cert, key)| (cert.to_path_buf(), key.to_path_buf()));

    let app_state = Arc::new(AppState::new(config, catalogs));
    let watchdog_state = app_state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(1200));
        loop {
            interval.tick().await;
            cleanup_empty_rooms(&watchdog_state).await;
        }
    });

    let app = Router::new()
        .route("/reload", get(reload_handler))
        .route("/ws", get(websocket_handler))
        .with_state(app_state);

    match tls_paths {
        Some((cert, key)) => {
            let addr: SocketAddr = listen_addr.parse().unwrap_or_else(|err| {
                panic!("invalid listen address {listen_addr:?}: {err}");
            });
            let rustls_config = RustlsConfig::from_pem_file(&cert, &key)
                .await
                .unwrap_or_else(|err| {
                    panic!("failed to load TLS cert/key ({cert:?}, {key:?}): {err}");
                });
            tracing::info!(listen_addr, "listening (tls)");
            axum_server::bind_rustls(addr, rustls_config)
                .serve(app.into_make_service())
                .await
                .unwrap();
        }
        None => {
            let listener = tokio::net::TcpListener::bind(&listen_addr).await.unwrap();
            tracing::info!(listen_addr, "listening");
            axum::serve(listener, app).await.unwrap();
        }
    }
}

/// Forces a re-read of every catalog file, picking up new or edited games
/// without a restart.
async fn reload_handler(State(state): State<Arc<AppState>>) -> String {
    match load_catalogs(&state.config.catalog_dir).await {
        Ok(catalogs) => {
            let games: Vec<String> = catalogs.keys().cloned().collect();
            *state.catalogs.write().await = catalogs;
            format!("Reloaded {} games: {}", games.len(), games.join(", "))
        }
        Err(err) => format!("catalog reload failed: {err}"),
    }
}

async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket: WebSocket| handle_socket(socket, state))
}
