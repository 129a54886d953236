mod config;
mod metrics;

use anyhow::Context;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use extract::{LlmExtractor, OllamaClient};
use index::{
    ChunkOutcome, GraphStats, GraphStore, IngestError, IngestReport, IngestStatus, Indexer,
    Neo4jStore, ReingestPolicy,
};
use query::{QueryEngine, QueryLLM};

use config::{AppConfig, LogFormat};
use metrics::{Metrics, MetricsSnapshot, TimedOperation};

struct AppState {
    store: Arc<dyn GraphStore>,
    indexer: Indexer,
    engine: QueryEngine,
    metrics: Arc<Metrics>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    store: String,
}

#[derive(Deserialize)]
struct IngestRequest {
    path: PathBuf,
    #[serde(default)]
    force: bool,
}

#[derive(Serialize)]
struct IngestResponse {
    doc_id: String,
    source: String,
    status: IngestStatus,
    chunks_total: usize,
    chunks_succeeded: usize,
    chunks_failed: usize,
    entities_merged: usize,
    chunks: Vec<ChunkOutcome>,
}

impl From<IngestReport> for IngestResponse {
    fn from(report: IngestReport) -> Self {
        Self {
            chunks_total: report.chunks.len(),
            chunks_succeeded: report.succeeded(),
            chunks_failed: report.failed(),
            entities_merged: report.entities_merged(),
            doc_id: report.doc_id,
            source: report.source,
            status: report.status,
            chunks: report.chunks,
        }
    }
}

#[derive(Serialize)]
struct DocumentsResponse {
    documents: Vec<String>,
}

#[derive(Deserialize)]
struct QueryRequest {
    question: String,
    doc_id: String,
}

#[derive(Serialize)]
struct QueryResponse {
    answer: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("Invalid configuration")?;
    init_tracing(config.log_format);
    info!(?config, "Starting GraphRAG service");

    let store: Arc<dyn GraphStore> = Arc::new(Neo4jStore::new(config.store.clone()));
    let extractor = Arc::new(LlmExtractor::new(OllamaClient::new(config.ollama.clone())));
    let generator = Arc::new(QueryLLM::new(config.ollama.clone()));

    let indexer = Indexer::new(store.clone(), extractor, config.chunker.clone())
        .with_policy(config.reingest);
    indexer
        .init()
        .await
        .context("Failed to initialize graph store")?;

    let engine = QueryEngine::new(store.clone(), generator, config.retrieval.clone());

    let state = Arc::new(AppState {
        store,
        indexer,
        engine,
        metrics: Metrics::new(),
    });

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("Server listening on http://{}", config.bind_addr);

    axum::serve(listener, router(state)).await?;
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ingest", post(ingest_document))
        .route("/documents", get(list_documents))
        .route("/query", post(query_document))
        .route("/stats", get(get_stats))
        .route("/metrics", get(get_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    // A session plus one cheap read proves the store answers
    let store_status = match state.store.open().await {
        Ok(session) => match session.stats().await {
            Ok(_) => "ok".to_string(),
            Err(e) => format!("error: {:#}", e),
        },
        Err(e) => format!("error: {:#}", e),
    };

    Json(HealthResponse {
        status: if store_status == "ok" { "ok" } else { "degraded" }.to_string(),
        store: store_status,
    })
}

async fn ingest_document(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, StatusCode> {
    let timer = TimedOperation::start();

    let result = if req.force {
        state
            .indexer
            .ingest_with_policy(&req.path, ReingestPolicy::Force)
            .await
    } else {
        state.indexer.ingest(&req.path).await
    };

    match result {
        Ok(report) => {
            state.metrics.record_request(true);
            state
                .metrics
                .record_ingest(timer.elapsed(), report.succeeded(), report.failed());
            Ok(Json(IngestResponse::from(report)))
        }
        Err(err) => {
            state.metrics.record_request(false);
            let status = match &err {
                IngestError::NotFound(_) => StatusCode::NOT_FOUND,
                IngestError::Read(..) => StatusCode::UNPROCESSABLE_ENTITY,
                IngestError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            if status == StatusCode::INTERNAL_SERVER_ERROR {
                error!(error = %err, "Ingestion failed");
            } else {
                warn!(error = %err, "Ingestion rejected");
            }
            Err(status)
        }
    }
}

async fn list_documents(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DocumentsResponse>, StatusCode> {
    let documents = state.indexer.list_documents().await.map_err(|e| {
        error!(error = %e, "Listing documents failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(DocumentsResponse { documents }))
}

// Always 200: failures come back as answer text
async fn query_document(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QueryRequest>,
) -> Json<QueryResponse> {
    let timer = TimedOperation::start();
    let answer = state.engine.answer(&req.question, &req.doc_id).await;

    state.metrics.record_request(true);
    state.metrics.record_query(timer.elapsed());

    Json(QueryResponse { answer })
}

async fn get_stats(State(state): State<Arc<AppState>>) -> Result<Json<GraphStats>, StatusCode> {
    let stats = state.indexer.stats().await.map_err(|e| {
        error!(error = %e, "Reading graph stats failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(stats))
}

async fn get_metrics(State(state): State<Arc<AppState>>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}
