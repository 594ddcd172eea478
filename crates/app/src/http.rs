use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use guideline_search_core::{
    excerpt, DocumentSummary, SearchContext, SearchError, SearchHit, SearchOptions,
    DETAIL_EXCERPT_CHARS,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    context: Arc<SearchContext>,
}

pub(crate) fn build_router(context: Arc<SearchContext>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/search", post(search_handler))
        .route("/clinical-search", post(clinical_search_handler))
        .route("/documents", get(documents_handler))
        .route("/documents/{document_id}/summary", get(summary_handler))
        .route("/similar/{chunk_id}", get(similar_handler))
        .with_state(AppState { context })
}

pub(crate) async fn serve(context: SearchContext, bind: &str, port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    let router = build_router(Arc::new(context));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "guideline search api listening");
    axum::serve(listener, router).await?;
    Ok(())
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

fn retrieval_failure(error: SearchError) -> Response {
    tracing::error!(%error, "retrieval failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}

/// A hit plus its display excerpt. Truncation happens here only; the stored
/// result keeps its full text.
#[derive(Serialize)]
struct DisplayHit {
    #[serde(flatten)]
    hit: SearchHit,
    display_text: String,
}

impl From<SearchHit> for DisplayHit {
    fn from(hit: SearchHit) -> Self {
        let source = hit.highlighted_text.as_deref().unwrap_or(&hit.chunk.text);
        let display_text = excerpt(source, DETAIL_EXCERPT_CHARS);
        Self { hit, display_text }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    total_chunks: usize,
    total_documents: usize,
    index_size: usize,
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        total_chunks: state.context.chunk_count(),
        total_documents: state.context.document_count(),
        index_size: state.context.index_size(),
    })
}

fn default_top_k() -> usize {
    10
}

fn default_clinical_top_k() -> usize {
    8
}

fn default_expand() -> bool {
    true
}

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default = "default_top_k")]
    top_k: usize,
    #[serde(default = "default_expand")]
    expand: bool,
    #[serde(default)]
    document: Option<String>,
}

#[derive(Serialize)]
struct SearchResponse {
    query: String,
    total_results: usize,
    results: Vec<DisplayHit>,
}

async fn search_handler(
    State(state): State<AppState>,
    Json(payload): Json<SearchRequest>,
) -> Response {
    if payload.query.trim().is_empty() {
        return bad_request("query is required");
    }

    let options = SearchOptions {
        top_k: payload.top_k,
        expand: payload.expand,
        filter_document: payload.document,
    };
    match state.context.search(&payload.query, &options) {
        Ok(results) => Json(SearchResponse {
            query: payload.query,
            total_results: results.len(),
            results: results.into_iter().map(DisplayHit::from).collect(),
        })
        .into_response(),
        Err(error) => retrieval_failure(error),
    }
}

#[derive(Deserialize)]
struct ClinicalRequest {
    question: String,
    #[serde(default = "default_clinical_top_k")]
    top_k: usize,
}

async fn clinical_search_handler(
    State(state): State<AppState>,
    Json(payload): Json<ClinicalRequest>,
) -> Response {
    if payload.question.trim().is_empty() {
        return bad_request("question is required");
    }

    match state
        .context
        .clinical_question_search(&payload.question, payload.top_k)
    {
        Ok(answer) => Json(answer).into_response(),
        Err(error) => retrieval_failure(error),
    }
}

#[derive(Serialize)]
struct DocumentsResponse {
    total_documents: usize,
    documents: Vec<DocumentSummary>,
}

async fn documents_handler(State(state): State<AppState>) -> Response {
    let mut ids: Vec<String> = state
        .context
        .documents()
        .map(|meta| meta.document_id.clone())
        .collect();
    ids.sort_unstable();

    let documents: Vec<DocumentSummary> = ids
        .iter()
        .filter_map(|id| state.context.document_summary(id))
        .collect();

    Json(DocumentsResponse {
        total_documents: documents.len(),
        documents,
    })
    .into_response()
}

async fn summary_handler(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
) -> Response {
    match state.context.document_summary(&document_id) {
        Some(summary) => Json(summary).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("unknown document: {document_id}"),
            }),
        )
            .into_response(),
    }
}

#[derive(Deserialize)]
struct SimilarParams {
    #[serde(default = "default_similar_top_k")]
    top_k: usize,
}

fn default_similar_top_k() -> usize {
    5
}

#[derive(Serialize)]
struct SimilarResponse {
    chunk_id: String,
    total_results: usize,
    results: Vec<DisplayHit>,
}

async fn similar_handler(
    State(state): State<AppState>,
    Path(chunk_id): Path<String>,
    Query(params): Query<SimilarParams>,
) -> Response {
    // An unknown chunk id is "nothing found", not an error.
    match state.context.find_similar(&chunk_id, params.top_k) {
        Ok(results) => Json(SimilarResponse {
            chunk_id,
            total_results: results.len(),
            results: results.into_iter().map(DisplayHit::from).collect(),
        })
        .into_response(),
        Err(error) => retrieval_failure(error),
    }
}
