use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Deserialize;
use tokio::time::Instant;

use crate::{
    api::AppState,
    error::{AppError, AppResult},
    middleware::RequestId,
    routes::recommendations::{parse_cursor, parse_limit},
    services::BrowseRequest,
};

/// Query string for `GET /api/v1/articles`
#[derive(Debug, Default, Deserialize)]
pub struct ArticlesQuery {
    #[serde(alias = "lastKey")]
    pub cursor: Option<String>,
    pub limit: Option<String>,
    pub sample: Option<String>,
}

fn parse_flag(raw: Option<&str>) -> AppResult<bool> {
    match raw.map(str::trim) {
        None | Some("") | Some("false") | Some("0") => Ok(false),
        Some("true") | Some("1") => Ok(true),
        Some(_) => Err(AppError::InvalidInput(
            "sample must be true or false".to_string(),
        )),
    }
}

/// Handler for the unfiltered article listing shown to signed-out readers
pub async fn list_articles(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Query(query): Query<ArticlesQuery>,
) -> AppResult<Response> {
    let request = BrowseRequest {
        cursor: parse_cursor(query.cursor),
        limit: parse_limit(query.limit.as_deref())?,
        sample: parse_flag(query.sample.as_deref())?,
        deadline: Some(Instant::now() + state.request_timeout),
    };
    let sample = request.sample;

    let page = state.recommendations.browse(request).await?;

    tracing::info!(
        request_id = %request_id,
        sample,
        returned = page.articles.len(),
        "Served article listing"
    );

    Ok(Json(page).into_response())
}
