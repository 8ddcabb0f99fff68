//! Knowledge search and statistics handlers

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use quarry_common::{
    db::{EntitySearchResult, KnowledgeStats},
    errors::{AppError, Result},
};

#[derive(Debug, Deserialize, Validate)]
pub struct SearchRequest {
    /// Text to match against entity spans
    #[validate(length(min = 2, max = 200))]
    pub query: String,

    /// Restrict to these entity labels
    pub labels: Option<Vec<String>>,

    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,

    #[serde(default = "default_search_limit")]
    pub limit: u64,
}

fn default_min_confidence() -> f64 {
    0.5
}

fn default_search_limit() -> u64 {
    100
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub count: usize,
    pub results: Vec<EntitySearchResult>,
}

/// Search entities across all documents
pub async fn search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    if !(0.0..=1.0).contains(&request.min_confidence) {
        return Err(AppError::Validation {
            message: "min_confidence must be within [0, 1]".to_string(),
            field: Some("min_confidence".to_string()),
        });
    }

    let results = state
        .repository()
        .search_entities(
            &request.query,
            request.labels,
            request.min_confidence,
            request.limit.clamp(1, 1000),
        )
        .await?;

    Ok(Json(SearchResponse {
        query: request.query,
        count: results.len(),
        results,
    }))
}

/// Aggregate extraction statistics
pub async fn stats(State(state): State<AppState>) -> Result<Json<KnowledgeStats>> {
    let stats = state.repository().knowledge_stats().await?;
    Ok(Json(stats))
}
