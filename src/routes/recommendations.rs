use std::collections::BTreeSet;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Deserialize;
use tokio::time::Instant;

use crate::{
    api::{AppState, AuthenticatedUser},
    error::{AppError, AppResult},
    middleware::RequestId,
    models::{normalize_tags, Cursor, UserId},
    services::RecommendationRequest,
};

/// Query string for `GET /api/v1/recommendations`
///
/// Everything arrives as raw strings so malformed values surface as our own
/// 400 body rather than the extractor's plain-text rejection.
#[derive(Debug, Default, Deserialize)]
pub struct RecommendationQuery {
    /// JSON-encoded array of tag strings
    pub tags: Option<String>,
    #[serde(alias = "lastKey")]
    pub cursor: Option<String>,
    pub limit: Option<String>,
}

/// Query string for `GET /api/v1/feed`
#[derive(Debug, Default, Deserialize)]
pub struct FeedQuery {
    #[serde(alias = "lastKey")]
    pub cursor: Option<String>,
    pub limit: Option<String>,
}

fn parse_tags(raw: Option<&str>) -> AppResult<BTreeSet<String>> {
    let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return Ok(BTreeSet::new());
    };

    let tags: Vec<String> = serde_json::from_str(raw).map_err(|_| {
        AppError::InvalidInput("tags must be a JSON array of strings".to_string())
    })?;

    normalize_tags(tags)
}

pub(super) fn parse_limit(raw: Option<&str>) -> AppResult<Option<usize>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse::<usize>()
            .map(Some)
            .map_err(|_| AppError::InvalidInput("limit must be a positive integer".to_string())),
    }
}

pub(super) fn parse_cursor(raw: Option<String>) -> Option<Cursor> {
    raw.filter(|c| !c.trim().is_empty()).map(Cursor::new)
}

async fn respond(
    state: &AppState,
    request_id: &RequestId,
    request: RecommendationRequest,
) -> AppResult<Response> {
    let user_id = request.user_id.clone();
    let page = state.recommendations.recommend(request).await?;

    tracing::info!(
        request_id = %request_id,
        user_id = %user_id,
        returned = page.articles.len(),
        "Served recommendations"
    );

    Ok(Json(page.as_ref()).into_response())
}

fn build_request(
    state: &AppState,
    user_id: UserId,
    tags: BTreeSet<String>,
    cursor: Option<String>,
    limit: Option<&str>,
) -> AppResult<RecommendationRequest> {
    Ok(RecommendationRequest {
        user_id,
        tags,
        cursor: parse_cursor(cursor),
        limit: parse_limit(limit)?,
        deadline: Some(Instant::now() + state.request_timeout),
    })
}

/// Handler for explicit-tag recommendations
pub async fn recommend(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Query(query): Query<RecommendationQuery>,
) -> AppResult<Response> {
    let tags = parse_tags(query.tags.as_deref())?;
    let request = build_request(&state, user_id, tags, query.cursor, query.limit.as_deref())?;
    respond(&state, &request_id, request).await
}

/// Handler for recommendations driven by the caller's stored preferences
pub async fn feed(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Query(query): Query<FeedQuery>,
) -> AppResult<Response> {
    let tags = state.preferences.get(&user_id).await?;
    if tags.is_empty() {
        tracing::debug!(request_id = %request_id, user_id = %user_id, "No stored preferences");
    }

    let request = build_request(&state, user_id, tags, query.cursor, query.limit.as_deref())?;
    respond(&state, &request_id, request).await
}
