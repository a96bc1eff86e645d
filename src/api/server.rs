use std::future::IntoFuture;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::{
    cors::CorsLayer, decompression::RequestDecompressionLayer, services::ServeDir,
};
use tracing::{info, warn};

use super::{
    forward::{self, FORWARDED_POST, UPLOAD, WEBAPP_INFO},
    services::{
        control, gallery_files, get_paths, health, save_result, serve_output, set_paths,
        update_file,
    },
    state::AppState,
};
use crate::config::Config;
use crate::control::{ExitController, ExitSignal};
use crate::remote::RemoteClient;
use crate::storage::PathStore;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// All worker routes; anything unmatched is looked up in the web directory.
pub fn router(state: AppState) -> Router {
    let file_route = format!("/{}/{{category}}/{{file}}", state.store.proxy_prefix());
    let web_dir = state.config.web_dir();
    let body_limit = state.config.server.max_upload_bytes;

    let mut router = Router::new()
        .route("/api/system/control", post(control))
        .route("/api/system/paths", get(get_paths).post(set_paths))
        .route("/api/gallery/files", get(gallery_files))
        .route("/api/save_result", post(save_result))
        .route("/api/file/update", post(update_file))
        .route(&file_route, get(serve_output))
        .route(WEBAPP_INFO, get(forward::webapp_info))
        .route(UPLOAD, post(forward::upload_resource))
        .route("/health", get(health));

    for path in FORWARDED_POST {
        router = router.route(path, post(forward::forward_post));
    }

    router
        .fallback_service(ServeDir::new(web_dir))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        // Automatically decompress gzip request bodies
        .layer(RequestDecompressionLayer::new())
        .layer(CorsLayer::permissive())
}

/// Serve the worker until a stop or restart is requested.
///
/// Returns the signal the process should exit with. Ctrl-C and SIGTERM are
/// treated as [`ExitSignal::Stop`]. In-flight responses are drained for at
/// most `control.drain_timeout`.
pub async fn run(config: Config) -> Result<ExitSignal, AnyError> {
    let store = PathStore::open(config.storage_layout());
    store.prepare().await;
    for category in store.unwritable() {
        warn!(%category, path = %store.configured(category).display(), "Output directory is not writable");
    }

    let remote = RemoteClient::new(config.remote_config())?;
    info!(base_url = %remote.base_url(), "Remote backend configured");

    let exit = ExitController::new(config.control.grace());
    let mut exit_listener = exit.subscribe();
    let drain_timeout = config.control.drain_timeout();
    let address = config.server.bind_addr;

    let app = router(AppState::new(config, store, remote, exit));

    let listener = TcpListener::bind(address).await?;
    info!(%address, "hubdeck worker listening");

    let (decided_tx, mut decided_rx) = watch::channel(None::<ExitSignal>);
    let shutdown = async move {
        let signal = tokio::select! {
            signal = exit_listener.requested() => signal,
            _ = crate::signal::terminate_requested() => ExitSignal::Stop,
        };
        info!(%signal, "Draining in-flight requests");
        let _ = decided_tx.send(Some(signal));
    };

    let server = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown)
        .into_future();

    let deadline = async {
        if decided_rx.wait_for(Option::is_some).await.is_ok() {
            tokio::time::sleep(drain_timeout).await;
        } else {
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        result = server => result?,
        _ = deadline => {
            warn!(timeout_ms = drain_timeout.as_millis() as u64, "Drain timed out, exiting anyway");
        }
    }

    let signal = (*decided_rx.borrow()).unwrap_or(ExitSignal::Stop);
    Ok(signal)
}
