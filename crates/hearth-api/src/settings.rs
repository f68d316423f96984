use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use tracing::info;

use hearth_types::api::{AddUserRequest, Claims, SetMaxUsersRequest};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::require_admin;

pub async fn get_settings(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.household.system_settings().await)
}

pub async fn set_max_users(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SetMaxUsersRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&claims)?;
    let settings = state.household.set_max_users(req.max_users).await?;
    Ok(Json(settings))
}

pub async fn add_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<AddUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&claims)?;
    let settings = state.household.add_allowed_user(&req.username).await?;
    info!("{} added {} to the allowed users", claims.sub, req.username.trim());
    Ok(Json(settings))
}

pub async fn remove_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&claims)?;
    let settings = state.household.remove_allowed_user(&username).await?;
    Ok(Json(settings))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;

    use hearth_core::{Auth, Config, Household};
    use hearth_db::LocalStore;

    use super::*;
    use crate::auth::AppStateInner;

    fn state() -> AppState {
        let household = Household::new(Arc::new(LocalStore::in_memory()));
        Arc::new(AppStateInner {
            auth: Auth::new(household.clone(), Config::default()),
            household,
            jwt_secret: "test".into(),
        })
    }

    fn status(result: Result<impl IntoResponse, ApiError>) -> StatusCode {
        match result {
            Ok(response) => response.into_response().status(),
            Err(e) => e.into_response().status(),
        }
    }

    fn claims(sub: &str, is_admin: bool) -> Claims {
        Claims {
            sub: sub.into(),
            is_admin,
            exp: usize::MAX,
        }
    }

    #[tokio::test]
    async fn test_members_cannot_manage_users() {
        let result = add_user(
            State(state()),
            Extension(claims("User1", false)),
            Json(AddUserRequest { username: "User9".into() }),
        )
        .await;

        assert_eq!(status(result), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_capacity_decline_is_conflict() {
        let result = add_user(
            State(state()),
            Extension(claims("Ahmed", true)),
            Json(AddUserRequest { username: "User9".into() }),
        )
        .await;

        assert_eq!(status(result), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_removing_admin_is_bad_request() {
        let result = remove_user(
            State(state()),
            Path("Ahmed".to_string()),
            Extension(claims("Ahmed", true)),
        )
        .await;

        assert_eq!(status(result), StatusCode::BAD_REQUEST);
    }
}
