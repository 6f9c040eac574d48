//! # COMETI-K Backend - Main Application Entry Point
//!
//! HTTP service for the collection, transcription and automated scoring of
//! children's verbal answers to the COMETI-K assessment instrument.
//!
//! ## Application Architecture:
//! - **config**: layered configuration (TOML file + environment variables)
//! - **state**: dependency-injected shared state for the request handlers
//! - **scoring**: pure word-count scoring policy
//! - **persistence**: PostgreSQL rows plus per-subject flat files
//! - **transcription**: optional Whisper speech-to-text via Candle-rs
//! - **handlers**: the four HTTP operations
//! - **middleware**: request logging and metrics
//! - **health**: operational snapshot endpoints
//!
//! ## Degraded startup:
//! Both heavyweight dependencies are optional by design. Without a
//! DATABASE_URL the durable store is absent; with WHISPER_DISABLED=1 (or a
//! failed model load) transcription is absent. Either way the process comes
//! up and serves what it can; the assessment flow keeps working on
//! constrained hosts.

mod config;
mod error;
mod handlers;
mod health;
mod middleware;
mod persistence;
mod scoring;
mod state;
mod transcription;

use actix_cors::Cors;
use actix_web::{middleware::NormalizePath, web, App, HttpServer};
use anyhow::Result;
use config::AppConfig;
use persistence::{AnalysisStore, FileStore};
use state::AppState;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transcription::TranscriptionService;

/// Global shutdown flag set by the signal handler task.
static SHUTDOWN_SIGNAL: AtomicBool = AtomicBool::new(false);

#[actix_web::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing()?;

    let config = AppConfig::load()?;
    config.validate()?;

    info!("Starting cometik-backend v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded: {}:{}", config.server.host, config.server.port);

    // Clinical data directory for the flat-file sinks.
    let files = FileStore::new(&config.storage.data_dir);
    files.ensure_root()?;
    info!("Clinical data directory: {}", files.root().display());

    let scorer = config.scoring_policy()?;

    // Durable store: configured only when a connection string is present.
    let store = match &config.database.url {
        Some(url) => match AnalysisStore::connect_lazy(url, config.database.max_connections) {
            Ok(store) => {
                let store = Arc::new(store);
                if let Err(e) = store.ensure_schema().await {
                    warn!(error = %e, "Database unreachable at startup; rows will fail until it returns");
                }
                Some(store)
            }
            Err(e) => {
                error!(error = %e, "Invalid DATABASE_URL; continuing without a durable store");
                None
            }
        },
        None => {
            warn!("No DATABASE_URL configured; analysis rows will only reach the file sinks");
            None
        }
    };

    // Transcription: loaded only when enabled, and a load failure degrades
    // to the disabled state instead of aborting startup.
    let transcriber = if config.transcription.enabled {
        let size = config.whisper_model_size()?;
        let language = Some(config.transcription.language.clone());
        match TranscriptionService::initialize(size, language).await {
            Ok(service) => {
                info!("Whisper {} model ready", size);
                Some(Arc::new(service))
            }
            Err(e) => {
                error!(error = %e, "Whisper model failed to load; audio uploads will return 503");
                None
            }
        }
    } else {
        warn!("Transcription disabled by configuration; audio uploads will return 503");
        None
    };

    let app_state = AppState::new(config.clone(), scorer, store, files, transcriber);
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    setup_signal_handlers();

    info!("Starting HTTP server on {}", bind_addr);

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(cors)
            // The original clients call the endpoints with trailing slashes.
            .wrap(NormalizePath::trim())
            .wrap(middleware::RequestTelemetry)
            .route("/", web::get().to(handlers::read_root))
            .route("/health", web::get().to(health::health_check))
            .route("/metrics", web::get().to(health::detailed_metrics))
            .route("/register_participant", web::post().to(handlers::register_participant))
            .route("/upload_audio", web::post().to(handlers::upload_audio))
            .route("/analyze_text", web::post().to(handlers::analyze_text))
    })
    .bind(&bind_addr)?
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    tokio::select! {
        result = server_task => {
            match result {
                Ok(server_result) => {
                    if let Err(e) = server_result {
                        error!("Server error: {}", e);
                    }
                }
                Err(e) => {
                    error!("Server task error: {}", e);
                }
            }
        }
        _ = wait_for_shutdown() => {
            info!("Shutdown signal received, stopping server...");
            server_handle.stop(true).await;
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// Console logging with RUST_LOG override.
fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cometik_backend=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

/// Flip the shutdown flag on SIGTERM or SIGINT.
fn setup_signal_handlers() {
    tokio::spawn(async {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler");
        let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
            .expect("Failed to install SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }

        SHUTDOWN_SIGNAL.store(true, Ordering::SeqCst);
    });
}

/// Poll the shutdown flag without busy-waiting.
async fn wait_for_shutdown() {
    while !SHUTDOWN_SIGNAL.load(Ordering::SeqCst) {
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }
}
