//! HTTP routes: `/health`, `/latest`, `/prices`.

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use housing_core::domain::PredictionRow;

use crate::error::LookupError;
use crate::store::PublishedStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<PublishedStore>,
}

impl AppState {
    pub fn new(published_dir: impl Into<PathBuf>) -> Self {
        Self {
            store: Arc::new(PublishedStore::new(published_dir)),
        }
    }
}

/// Optional period filter for `/prices`. Both fields must be present to
/// select a specific artifact. Out-of-range numbers are looked up (and not
/// found) rather than rejected at extraction.
#[derive(Debug, Default, Deserialize)]
pub struct PriceQuery {
    pub year: Option<i64>,
    pub quarter: Option<i64>,
}

pub fn router(published_dir: impl Into<PathBuf>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/latest", get(latest))
        .route("/prices", get(prices))
        .with_state(AppState::new(published_dir))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn latest(State(state): State<AppState>) -> Result<Json<Value>, LookupError> {
    match state.store.latest().await? {
        Some(file) => Ok(Json(json!({ "file": file }))),
        None => Err(state.store.nothing_published()),
    }
}

async fn prices(
    State(state): State<AppState>,
    Query(query): Query<PriceQuery>,
) -> Result<Json<Vec<PredictionRow>>, LookupError> {
    let rows = match (query.year, query.quarter) {
        (Some(year), Some(quarter)) => state.store.rows_for(year, quarter).await?,
        _ => state.store.latest_rows().await?,
    };
    Ok(Json(rows))
}
