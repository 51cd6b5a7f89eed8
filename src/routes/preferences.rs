use std::sync::Arc;

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::{
    api::{AppState, AuthenticatedUser},
    error::{AppError, AppResult},
    models::{normalize_tags, PreferenceSet, UserId},
};

/// Returns the caller's stored tags
pub async fn get_preferences(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
) -> AppResult<Json<Value>> {
    let tags = state.preferences.get(&user_id).await?;
    Ok(Json(json!({ "preferences": tags })))
}

/// Replaces the caller's stored tags with `{"preferences": [...]}`
pub async fn save_preferences(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Json(body): Json<Value>,
) -> AppResult<Json<Value>> {
    let preferences = parse_preferences(user_id, &body)?;

    state
        .preferences
        .put(&preferences.user_id, preferences.tags.clone())
        .await?;

    tracing::info!(
        user_id = %preferences.user_id,
        count = preferences.tags.len(),
        "Preferences saved"
    );

    Ok(Json(json!({ "message": "Preferences saved" })))
}

fn parse_preferences(user_id: UserId, body: &Value) -> AppResult<PreferenceSet> {
    let Some(items) = body.get("preferences").and_then(Value::as_array) else {
        return Err(AppError::InvalidInput(
            "Preferences must be an array".to_string(),
        ));
    };

    let tags = items
        .iter()
        .map(|item| {
            item.as_str().ok_or_else(|| {
                AppError::InvalidInput("Preferences must be an array of strings".to_string())
            })
        })
        .collect::<AppResult<Vec<&str>>>()?;

    Ok(PreferenceSet::new(user_id, normalize_tags(tags)?))
}
