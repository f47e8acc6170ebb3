//! HTTP API server for integration with other systems.
//!
//! Thin JSON glue over ingestion, search, question answering and timestamp
//! search. Answers can also be streamed as server-sent events.

use crate::cli::{Components, Output};
use crate::config::Settings;
use crate::error::DocentError;
use crate::ingest::IngestReport;
use crate::rag::{ChatAnswer, ChatRequest, RagEngine};
use crate::transcript::{segments_matching_topic, TimestampedSegment};
use crate::vector_store::{IndexedDocument, SearchResult, VectorIndex};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

/// Shared application state.
struct AppState {
    components: Components,
    engine: RagEngine,
}

/// Run the HTTP API server.
pub async fn run_serve(host: &str, port: u16, settings: Settings) -> anyhow::Result<()> {
    let components = Components::from_settings(settings)?;
    let engine = components.engine()?;
    let state = Arc::new(AppState { components, engine });

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Docent API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET    /health");
    Output::kv("List documents", "GET    /documents");
    Output::kv("Ingest", "POST   /documents");
    Output::kv("Get document", "GET    /documents/{id}");
    Output::kv("Delete document", "DELETE /documents/{id}");
    Output::kv("Search", "POST   /search");
    Output::kv("Chat (RAG)", "POST   /chat");
    Output::kv("Chat (stream)", "POST   /chat/stream");
    Output::kv("Timestamps", "POST   /timestamps/search");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, router(state)).await?;

    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/documents", get(list_documents).post(ingest))
        .route("/documents/{id}", get(get_document).delete(delete_document))
        .route("/search", post(search))
        .route("/chat", post(chat))
        .route("/chat/stream", post(chat_stream))
        .route("/timestamps/search", post(timestamp_search))
        .layer(cors)
        .with_state(state)
}

// === Errors ===

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// A library error on its way to the client.
struct ApiError(DocentError);

impl From<DocentError> for ApiError {
    fn from(e: DocentError) -> Self {
        Self(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(DocentError::Validation(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }
        (status, Json(ErrorResponse { error: self.0.to_string() })).into_response()
    }
}

fn status_for(error: &DocentError) -> StatusCode {
    match error {
        DocentError::Validation(_) | DocentError::DimensionMismatch { .. } => StatusCode::BAD_REQUEST,
        DocentError::NotFound(_) => StatusCode::NOT_FOUND,
        DocentError::Upstream(_) | DocentError::Http(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

fn require(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(DocentError::Validation(format!("{} must not be empty", field)).into());
    }
    Ok(())
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct IngestRequest {
    /// Replaces an existing document; a new id is generated if omitted.
    #[serde(default)]
    document_id: Option<String>,
    /// Extracted document text.
    #[serde(default)]
    text: Option<String>,
    /// Transcript of an audio or video document.
    #[serde(default)]
    segments: Option<Vec<TimestampedSegment>>,
    #[serde(default)]
    summarize: bool,
}

#[derive(Serialize)]
struct DocumentListResponse {
    documents: Vec<IndexedDocument>,
    total: usize,
}

#[derive(Serialize)]
struct DocumentDetailResponse {
    document_id: String,
    chunk_count: usize,
    chunks: Vec<ChunkInfo>,
}

#[derive(Serialize)]
struct ChunkInfo {
    id: String,
    index: usize,
    text: String,
}

#[derive(Deserialize)]
struct SearchRequest {
    document_id: String,
    query: String,
    #[serde(default = "default_top_k")]
    top_k: usize,
}

fn default_top_k() -> usize {
    5
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<SearchResult>,
}

#[derive(Deserialize)]
struct TimestampSearchRequest {
    segments: Vec<TimestampedSegment>,
    topic: String,
}

#[derive(Serialize)]
struct TimestampSearchResponse {
    segments: Vec<TimestampedSegment>,
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn list_documents(State(state): State<Arc<AppState>>) -> ApiResult<DocumentListResponse> {
    let documents = state.components.index.list_documents().await?;
    Ok(Json(DocumentListResponse {
        total: documents.len(),
        documents,
    }))
}

async fn ingest(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<IngestRequest>, JsonRejection>,
) -> ApiResult<IngestReport> {
    let Json(req) = payload?;
    let ingestor = state.components.ingestor(req.summarize)?;
    let document_id = req
        .document_id
        .unwrap_or_else(crate::ingest::Ingestor::new_document_id);
    require("document_id", &document_id)?;

    let report = match (req.text, req.segments) {
        (Some(text), None) => ingestor.ingest_text(&document_id, &text).await?,
        (None, Some(segments)) => ingestor.ingest_segments(&document_id, &segments).await?,
        _ => {
            return Err(DocentError::Validation(
                "provide exactly one of `text` or `segments`".to_string(),
            )
            .into())
        }
    };

    info!("Ingested document {} ({} chunks)", report.document_id, report.chunks_indexed());
    Ok(Json(report))
}

async fn get_document(
    State(state): State<Arc<AppState>>,
    Path(document_id): Path<String>,
) -> ApiResult<DocumentDetailResponse> {
    let chunks = state.components.index.get_chunks(&document_id).await?;
    if chunks.is_empty() {
        return Err(DocentError::NotFound(format!("Document not found: {}", document_id)).into());
    }

    Ok(Json(DocumentDetailResponse {
        document_id,
        chunk_count: chunks.len(),
        chunks: chunks
            .into_iter()
            .map(|c| ChunkInfo {
                id: c.id,
                index: c.index,
                text: c.text,
            })
            .collect(),
    }))
}

async fn delete_document(
    State(state): State<Arc<AppState>>,
    Path(document_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.components.index.delete(&document_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn search(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> ApiResult<SearchResponse> {
    let Json(req) = payload?;
    require("document_id", &req.document_id)?;

    let results = state
        .engine
        .retriever()
        .retrieve(&req.query, &req.document_id, req.top_k)
        .await?;

    Ok(Json(SearchResponse { results }))
}

async fn chat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResult<ChatAnswer> {
    let Json(req) = payload?;
    require("document_id", &req.document_id)?;
    require("question", &req.question)?;

    Ok(Json(state.engine.ask(&req).await?))
}

async fn chat_stream(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let Json(req) = payload?;
    require("document_id", &req.document_id)?;
    require("question", &req.question)?;

    let events = state
        .engine
        .stream(&req)
        .map(|event| Ok(Event::default().data(event.sse_data())));

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

async fn timestamp_search(
    payload: Result<Json<TimestampSearchRequest>, JsonRejection>,
) -> ApiResult<TimestampSearchResponse> {
    let Json(req) = payload?;
    require("topic", &req.topic)?;

    Ok(Json(TimestampSearchResponse {
        segments: segments_matching_topic(&req.segments, &req.topic),
    }))
}
