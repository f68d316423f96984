use std::sync::Arc;

use axum::{Extension, Json, extract::State, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::error;

use hearth_core::{Auth, Household};
use hearth_types::SessionUser;
use hearth_types::api::{Claims, LoginRequest, LoginResponse};

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub household: Household,
    pub auth: Auth,
    pub jwt_secret: String,
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .auth
        .authenticate(req.username.trim(), req.password.as_deref())
        .await
        .ok_or(ApiError::Unauthorized)?;

    let token = create_token(&state.jwt_secret, &user).map_err(|e| {
        error!("Failed to sign token: {}", e);
        ApiError::Internal
    })?;

    Ok(Json(LoginResponse { token, user }))
}

/// Accept the house rules as the token's user.
pub async fn agree(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    state.auth.record_agreement(&claims.sub, claims.is_admin).await?;

    Ok(Json(SessionUser {
        username: claims.sub,
        is_admin: claims.is_admin,
        has_agreed_to_rules: true,
    }))
}

/// The session user behind the token. Users removed from the allowed list
/// since signing in are treated as signed out.
pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.household.system_settings().await.is_allowed(&claims.sub) {
        return Err(ApiError::Unauthorized);
    }

    let has_agreed_to_rules = state
        .household
        .user_data(&claims.sub)
        .await
        .is_some_and(|u| u.has_agreed_to_rules);

    Ok(Json(SessionUser {
        username: claims.sub,
        is_admin: claims.is_admin,
        has_agreed_to_rules,
    }))
}

pub fn create_token(secret: &str, user: &SessionUser) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user.username.clone(),
        is_admin: user.is_admin,
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::decode_token;

    #[test]
    fn test_token_round_trip() {
        let user = SessionUser {
            username: "Ahmed".into(),
            is_admin: true,
            has_agreed_to_rules: false,
        };
        let token = create_token("secret", &user).unwrap();

        let claims = decode_token(&token, "secret").unwrap();
        assert_eq!(claims.sub, "Ahmed");
        assert!(claims.is_admin);

        assert!(decode_token(&token, "other-secret").is_none());
    }
}
