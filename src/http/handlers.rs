//! HTTP handlers for the search API.

use axum::{
    body::Bytes,
    extract::State,
    http::header,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    Json,
};
use futures::StreamExt;
use serde::Serialize;
use serde_json::Value;
use std::convert::Infallible;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::error::AppError;
use super::state::AppState;
use crate::events::search_events;
use crate::offer::Offer;
use crate::query::{SearchQuery, ValidationError};

/// Result type for handlers.
pub type HandlerResult<T> = Result<Json<T>, AppError>;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
}

/// Complete, price-sorted answer of the non-streaming endpoint.
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub query: SearchQuery,
    pub total: usize,
    pub items: Vec<Offer>,
}

// Validation happens before any search state exists
fn parse_query(body: &Bytes) -> Result<SearchQuery, AppError> {
    if body.is_empty() {
        return Err(ValidationError::MissingQuery.into());
    }
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(format!("Invalid JSON body: {}", e)))?;
    Ok(SearchQuery::from_request(&value)?)
}

/// GET /health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse { ok: true })
}

/// POST /api/search
///
/// Waits for every provider call and returns the final sorted result.
pub async fn search(State(state): State<AppState>, body: Bytes) -> HandlerResult<SearchResponse> {
    let query = parse_query(&body)?;
    let orchestrator = state.orchestrator()?;

    let result = orchestrator.search(&query).await;
    info!(
        ski_site = query.ski_site(),
        group_size = query.group_size(),
        total = result.len(),
        "search completed"
    );

    Ok(Json(SearchResponse {
        query,
        total: result.len(),
        items: result.into_offers(),
    }))
}

/// POST /api/search/stream
///
/// Streams results via Server-Sent Events as each provider call settles.
/// A client disconnect drops the stream, which cancels the outstanding calls.
pub async fn search_stream(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let query = parse_query(&body)?;
    info!(
        ski_site = query.ski_site(),
        group_size = query.group_size(),
        "streaming search"
    );

    let events = search_events(state.orchestrator(), query, CancellationToken::new())
        .map(|event| Ok::<_, Infallible>(Event::default().event(event.name()).data(event.data())));

    Ok((
        [(header::CACHE_CONTROL, "no-cache, no-transform")],
        Sse::new(events).keep_alive(KeepAlive::default()),
    ))
}
