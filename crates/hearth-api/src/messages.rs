use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use hearth_types::api::{Claims, SendMessageRequest};

use crate::auth::AppState;
use crate::error::ApiError;

pub async fn get_messages(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.household.messages().await)
}

pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let message = state
        .household
        .send_message(&claims.sub, req.content.trim(), claims.is_admin)
        .await?;

    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Path(message_id): Path<String>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    state.household.mark_message_read(&message_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
