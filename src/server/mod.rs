use crate::config::Config;
use crate::dispatch::Dispatcher;
use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use vidpress_av::{FfmpegTranscoder, OutputMode, Transcoder};
use vidpress_common::ProfileId;

pub mod routes_compress;

const INDEX_HTML: &str = include_str!("index.html");

/// Shared application context
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    /// Shared by every upload so `server.max_concurrent_jobs` holds across requests
    pub dispatcher: Dispatcher,
}

impl AppContext {
    /// Build a context that runs the real ffmpeg.
    pub fn new(config: Config) -> Self {
        let transcoder = FfmpegTranscoder::discover(config.tools.ffmpeg_path.as_deref())
            .with_timeout(config.tools.timeout())
            .with_output_mode(OutputMode::Capture);

        Self::with_transcoder(config, Arc::new(transcoder))
    }

    /// Build a context around any transcoder.
    pub fn with_transcoder(config: Config, transcoder: Arc<dyn Transcoder>) -> Self {
        let dispatcher =
            Dispatcher::new(transcoder).with_global_limit(config.server.max_concurrent_jobs());

        Self {
            config: Arc::new(config),
            dispatcher,
        }
    }
}

/// Create the Axum router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    let body_limit = ctx.config.server.max_upload_bytes;
    let timeout = ctx.config.server.request_timeout();

    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/api/profiles", get(list_profiles))
        .route(
            "/compress",
            post(routes_compress::compress_upload).layer(DefaultBodyLimit::max(body_limit)),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(timeout)),
        )
        .with_state(ctx)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

#[derive(Debug, Serialize)]
struct ProfileInfo {
    id: ProfileId,
    crf: u8,
    preset: &'static str,
}

async fn list_profiles() -> Json<Vec<ProfileInfo>> {
    let profiles = ProfileId::ALL
        .into_iter()
        .map(|id| {
            let params = id.params();
            ProfileInfo {
                id,
                crf: params.crf,
                preset: params.preset,
            }
        })
        .collect();

    Json(profiles)
}

/// Start the HTTP server
pub async fn start_server(config: Config) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let app = create_router(AppContext::new(config));

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
