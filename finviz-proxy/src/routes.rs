//! HTTP routes for the proxy service.

use axum::{
    body::Bytes,
    extract::{RawQuery, State},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::cache::CacheStats;
use crate::error::ProxyError;
use crate::feeds::{select_futures, FutureQuote, NewsRecord};
use crate::params::{parse_query, validate_authenticated, validate_query, validate_request, TableRequest};
use crate::session::SessionState;
use crate::ProxyState;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub service: String,
    pub session: SessionState,
}

#[derive(Debug, Deserialize)]
pub struct FuturesRequest {
    pub symbols: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct FuturesResponse {
    pub futures: Vec<FutureQuote>,
}

#[derive(Debug, Serialize)]
pub struct NewsResponse<'a> {
    pub news: &'a [NewsRecord],
}

#[derive(Debug, Serialize)]
pub struct BlogsResponse<'a> {
    pub blogs: &'a [NewsRecord],
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Health check endpoint
pub async fn health(State(state): State<Arc<ProxyState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        service: "finviz-proxy".to_string(),
        session: state.client.session().state(),
    })
}

/// Current screener vocabulary
pub async fn get_params(State(state): State<Arc<ProxyState>>) -> Response {
    let snapshot = state.vocabulary.load();
    Json(snapshot.as_ref()).into_response()
}

/// Screener table from URL query parameters
pub async fn get_table(
    State(state): State<Arc<ProxyState>>,
    RawQuery(raw): RawQuery,
) -> Result<Response, ProxyError> {
    let query = parse_query(raw.as_deref().unwrap_or_default());
    let snapshot = state.vocabulary.load();
    let params = validate_query(&snapshot, &query)?;

    let table = state.pipeline.screener(&params).await?;
    Ok(Json(table.as_ref()).into_response())
}

/// Screener table from a keyed JSON body
pub async fn post_table_v2(State(state): State<Arc<ProxyState>>, body: Bytes) -> Result<Response, ProxyError> {
    let request: TableRequest = serde_json::from_slice(&body)
        .map_err(|e| ProxyError::BadRequest(format!("invalid request body: {}", e)))?;
    let snapshot = state.vocabulary.load();
    let params = validate_request(&snapshot, &request)?;

    let table = state.pipeline.screener(&params).await?;
    Ok(Json(table.as_ref()).into_response())
}

/// CSV export table; needs elite mode and an `auth` key
pub async fn get_export(
    State(state): State<Arc<ProxyState>>,
    RawQuery(raw): RawQuery,
) -> Result<Response, ProxyError> {
    if !state.config.elite.enabled {
        return Err(ProxyError::Unavailable("export requires elite login".into()));
    }

    let query = parse_query(raw.as_deref().unwrap_or_default());
    let snapshot = state.vocabulary.load();
    let params = validate_authenticated(&snapshot, &query)?;

    let table = state.pipeline.export(&params).await?;
    Ok(Json(table.as_ref()).into_response())
}

/// Every futures quote, keyed by upstream id
pub async fn get_all_futures(State(state): State<Arc<ProxyState>>) -> Response {
    let board = state.futures.load();
    Json(board.as_ref()).into_response()
}

/// Quotes for the requested labels, in request order
pub async fn post_futures(State(state): State<Arc<ProxyState>>, body: Bytes) -> Result<Json<FuturesResponse>, ProxyError> {
    let request: FuturesRequest = serde_json::from_slice(&body)
        .map_err(|_| ProxyError::BadRequest(r#"request body should be as: {"symbols": [...]}"#.into()))?;

    let board = state.futures.load();
    let futures = select_futures(&board, &request.symbols)?;
    Ok(Json(FuturesResponse { futures }))
}

pub async fn get_news(State(state): State<Arc<ProxyState>>) -> Response {
    let feed = state.news.load();
    Json(NewsResponse { news: &feed.news }).into_response()
}

pub async fn get_blogs(State(state): State<Arc<ProxyState>>) -> Response {
    let feed = state.news.load();
    Json(BlogsResponse { blogs: &feed.blogs }).into_response()
}

/// Response cache statistics
pub async fn get_cache_stats(State(state): State<Arc<ProxyState>>) -> Json<CacheStats> {
    Json(state.pipeline.cache().stats())
}
