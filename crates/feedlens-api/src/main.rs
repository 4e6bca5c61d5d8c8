//! feedlens API server.
//!
//! JSON-RPC 2.0 over HTTP for crawling, sentiment scoring, n-gram
//! reports, structured comment analysis and summarization.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use feedlens_api::{router, rpc, AppState, HttpCommentSource};
use feedlens_core::{defaults, AnalysisRepository, CommentRepository, GenerationBackend, SummaryRepository};
use feedlens_db::{log_pool_metrics, Database, PoolConfig};
use feedlens_inference::{LlmSentimentClassifier, OllamaBackend, RetryPolicy};
use feedlens_jobs::{
    CommentAnalysisHandler, CommentAnalyzer, CrawlGate, CrawlHandler, DispatcherBuilder,
    DuplicateDetectionHandler, NgramHandler, SentimentHandler, SummarizationHandler, WorkerConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   LOG_FILE    - path to log file (optional, enables file logging)
    //   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
    //   RUST_LOG    - standard env filter
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "feedlens_api=debug,feedlens_jobs=info,feedlens_inference=info,tower_http=debug".into()
    });

    let registry = tracing_subscriber::registry().with(env_filter);

    // Optionally create a file appender with daily rotation
    let _file_guard = if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("feedlens-api.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer().with_writer(non_blocking);
            layer = layer.with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| defaults::DATABASE_URL.to_string());
    let host = std::env::var("HOST").unwrap_or_else(|_| defaults::SERVER_HOST.to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(defaults::SERVER_PORT);

    info!("Connecting to database...");
    let db = Database::connect_with_config(&database_url, PoolConfig::from_env()).await?;
    let comments: Arc<dyn CommentRepository> = Arc::new(db.comments.clone());
    let analyses: Arc<dyn AnalysisRepository> = Arc::new(db.analyses.clone());
    let summaries: Arc<dyn SummaryRepository> = Arc::new(db.summaries.clone());

    let metrics_pool = db.pool.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(
            defaults::DB_METRICS_INTERVAL_SECS,
        ));
        loop {
            ticker.tick().await;
            log_pool_metrics(&metrics_pool);
        }
    });

    let ollama = OllamaBackend::from_env()?;
    match ollama.health_check().await {
        Ok(true) => info!(url = ollama.base_url(), "Inference backend reachable"),
        Ok(false) | Err(_) => warn!(
            url = ollama.base_url(),
            "Inference backend not reachable; model-backed jobs will fail until it is"
        ),
    }
    let backend: Arc<dyn GenerationBackend> = Arc::new(ollama);

    let crawl_gate = CrawlGate::new();
    let classifier = LlmSentimentClassifier::new(backend.clone()).with_policy(RetryPolicy::from_env());

    let mut builder = DispatcherBuilder::new()
        .with_config(WorkerConfig::from_env())
        .with_handler(CommentAnalysisHandler::new(
            comments.clone(),
            analyses.clone(),
            CommentAnalyzer::from_env(backend.clone()),
        ))
        .with_handler(SentimentHandler::new(
            comments.clone(),
            Arc::new(classifier),
            crawl_gate.clone(),
        ))
        .with_handler(NgramHandler::new(comments.clone()))
        .with_handler(SummarizationHandler::new(analyses, summaries, backend))
        .with_handler(DuplicateDetectionHandler::new(comments.clone()));

    match HttpCommentSource::from_env()? {
        Some(source) => {
            builder = builder.with_handler(CrawlHandler::new(Arc::new(source), comments, crawl_gate));
        }
        None => warn!("COMMENT_SOURCE_URL not set; crawl methods will be rejected"),
    }

    let dispatcher = Arc::new(builder.build());
    let app = router(AppState::new(dispatcher.clone()));

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!(
        methods = rpc::method_names().count(),
        "Starting server on {}", addr
    );
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped, draining workers");
    dispatcher.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
