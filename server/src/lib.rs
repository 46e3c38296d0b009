use anyhow::Result;
use axum::{extract::{Path, State}, http::StatusCode, routing::{get, post}, Json, Router};
use engine::{Engine, EngineConfig, EngineStats, IndexResult, NewDocument, WordVectors};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer, AllowOrigin};
use tower_http::trace::TraceLayer;

#[derive(Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default = "default_k")]
    pub top_k: usize,
}
fn default_k() -> usize { 10 }

#[derive(Deserialize)]
pub struct AutocompleteRequest {
    pub prefix: String,
    #[serde(default = "default_k")]
    pub top_n: usize,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub doc_id: String,
    pub score: f32,
}

#[derive(Serialize)]
pub struct AutocompleteResponse {
    pub suggestions: Vec<String>,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub admin_token: Option<String>,
}

type ApiError = (StatusCode, String);

/// Open the engine described by `config`, optionally with word vectors for
/// semantic search, and build the router around it.
pub fn build_app(config: EngineConfig, vectors: Option<PathBuf>) -> Result<Router> {
    let mut engine = Engine::open(config)?;
    if let Some(path) = vectors {
        engine = engine.with_oracle(Arc::new(WordVectors::load(&path)?));
    }
    let admin_token = std::env::var("ADMIN_TOKEN").ok();
    Ok(router(AppState { engine: Arc::new(engine), admin_token }))
}

pub fn router(app_state: AppState) -> Router {
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/stats", get(stats_handler))
        .route("/search/single", post(single_handler))
        .route("/search/multi", post(multi_handler))
        .route("/search/semantic", post(semantic_handler))
        .route("/autocomplete", post(autocomplete_handler))
        .route("/doc/:doc_id", get(doc_handler))
        .route("/index", post(index_handler))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

fn non_empty(s: &str, what: &str) -> Result<String, ApiError> {
    let s = s.trim().to_lowercase();
    if s.is_empty() {
        return Err((StatusCode::BAD_REQUEST, format!("{what} cannot be empty")));
    }
    Ok(s)
}

fn respond(query: String, start: Instant, hits: Vec<(String, f32)>, top_k: usize) -> Json<SearchResponse> {
    let total_hits = hits.len();
    let results = hits
        .into_iter()
        .take(top_k)
        .map(|(doc_id, score)| SearchHit { doc_id, score })
        .collect();
    Json(SearchResponse { query, took_s: start.elapsed().as_secs_f64(), total_hits, results })
}

fn as_float(hits: Vec<(String, u32)>) -> Vec<(String, f32)> {
    hits.into_iter().map(|(d, s)| (d, s as f32)).collect()
}

/// Run engine work off the async runtime; queries read shard, document and
/// embedding files synchronously.
async fn blocking<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Engine) -> T + Send + 'static,
    T: Send + 'static,
{
    let engine = Arc::clone(&state.engine);
    tokio::task::spawn_blocking(move || f(&*engine))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("engine task failed: {e}")))
}

pub async fn single_handler(State(state): State<AppState>, Json(req): Json<SearchRequest>) -> Result<Json<SearchResponse>, ApiError> {
    let start = Instant::now();
    let word = non_empty(&req.query, "Query")?;
    let hits = blocking(&state, move |engine| as_float(engine.search_single(&word))).await?;
    Ok(respond(req.query, start, hits, req.top_k))
}

pub async fn multi_handler(State(state): State<AppState>, Json(req): Json<SearchRequest>) -> Result<Json<SearchResponse>, ApiError> {
    let start = Instant::now();
    let query = non_empty(&req.query, "Query")?;
    let hits = blocking(&state, move |engine| as_float(engine.search_multi(&query))).await?;
    Ok(respond(req.query, start, hits, req.top_k))
}

pub async fn semantic_handler(State(state): State<AppState>, Json(req): Json<SearchRequest>) -> Result<Json<SearchResponse>, ApiError> {
    let start = Instant::now();
    let query = non_empty(&req.query, "Query")?;
    let top_k = req.top_k;
    let hits = blocking(&state, move |engine| engine.search_semantic(&query, top_k)).await?;
    Ok(respond(req.query, start, hits, req.top_k))
}

pub async fn autocomplete_handler(State(state): State<AppState>, Json(req): Json<AutocompleteRequest>) -> Result<Json<AutocompleteResponse>, ApiError> {
    let prefix = non_empty(&req.prefix, "Prefix")?;
    let top_n = req.top_n;
    let suggestions = blocking(&state, move |engine| engine.autocomplete(&prefix, top_n)).await?;
    Ok(Json(AutocompleteResponse { suggestions }))
}

pub async fn stats_handler(State(state): State<AppState>) -> Result<Json<EngineStats>, ApiError> {
    blocking(&state, Engine::stats).await.map(Json)
}

pub async fn doc_handler(State(state): State<AppState>, Path(doc_id): Path<String>) -> Result<Json<NewDocument>, ApiError> {
    blocking(&state, move |engine| engine.document(&doc_id))
        .await?
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, "not found".into()))
}

async fn index_handler(State(state): State<AppState>, headers: axum::http::HeaderMap, Json(doc): Json<NewDocument>) -> Result<Json<IndexResult>, ApiError> {
    authorize(&state, &headers)?;
    let result = blocking(&state, move |engine| engine.index_document(doc)).await?;
    tracing::info!(doc_id = ?result.doc_id, success = result.success, "document indexed");
    Ok(Json(result))
}

fn authorize(state: &AppState, headers: &axum::http::HeaderMap) -> Result<(), ApiError> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}
