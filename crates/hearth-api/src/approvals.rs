use axum::{Json, extract::State, response::IntoResponse};

use crate::auth::AppState;

/// Everyone who has accepted the rules, newest first.
pub async fn list_approvals(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.household.approvals().await)
}
