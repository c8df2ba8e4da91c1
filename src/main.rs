//! Process listing visualizer server
//!
//! Accepts the tab-separated process listing printed by a memory-forensics
//! framework, turns it into JSON records, optionally asks a text generation
//! model to assess each process, and serves the result to the browser
//! visualizer.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    PSLIST VISUALIZER                          │
//! ├──────────────────────────────────────────────────────────────┤
//! │  POST /upload                                                │
//! │     │                                                        │
//! │     ▼                                                        │
//! │  ┌──────────┐   ┌───────────────┐   ┌──────────────────────┐ │
//! │  │  Parser  │──►│   Annotator   │──►│  Upload store (JSON) │ │
//! │  │ (header, │   │ (batches via  │   └──────────┬───────────┘ │
//! │  │  rows)   │   │ TextGenerator)│              │             │
//! │  └──────────┘   └───────────────┘              ▼             │
//! │                                   GET /data/:filename        │
//! └──────────────────────────────────────────────────────────────┘
//! ```

mod annotator;
mod config;
mod error;
mod handlers;
mod models;
mod parser;
mod storage;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::{
    cors::{CorsLayer, Any},
    trace::TraceLayer,
    compression::CompressionLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::annotator::{Annotator, GeminiClient};
use crate::storage::UploadStore;

pub use error::{AppError, AppResult};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();

    // Initialize logging (LOG_FORMAT=json for structured output)
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "pslist_visualizer=debug,tower_http=debug".into()))
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(tracing_subscriber::fmt::layer))
        .init();

    let config = config::Config::from_env();

    tracing::info!("Process listing visualizer starting...");

    let store = UploadStore::open(&config.upload_dir)
        .await
        .with_context(|| format!("Failed to open upload directory {}", config.upload_dir.display()))?;
    tracing::info!("Upload directory: {}", store.root().display());

    let annotator = match &config.ai {
        Some(ai) => {
            let client = GeminiClient::new(ai).context("Failed to create model client")?;
            let annotator = Annotator::new(Arc::new(client), ai.batch_size);
            tracing::info!("AI annotation enabled: model {}, batch size {}", ai.model, annotator.batch_size());
            Some(annotator)
        }
        None => {
            tracing::info!("AI annotation disabled (GEMINI_API_KEY not set)");
            None
        }
    };

    // Build application state
    let state = AppState {
        config: config.clone(),
        store,
        annotator,
    };

    // Build router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("🚀 Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: config::Config,
    pub store: UploadStore,
    pub annotator: Option<Annotator>,
}

/// Create the main router with all routes
fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::check))
        .route("/upload", post(handlers::upload::upload))
        .route("/data/:filename", get(handlers::data::get_file))
        .route("/data/:filename/summary", get(handlers::data::summary))
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}
