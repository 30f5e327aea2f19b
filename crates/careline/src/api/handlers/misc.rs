//! Health check and account handlers.

use axum::{Json, extract::State};
use serde::Serialize;
use tracing::instrument;

use crate::auth::{CurrentUser, RequireMember};
use crate::error::CareError;
use crate::membership::UpdateContactRequest;
use crate::user::UserInfo;

use crate::api::error::ApiResult;
use crate::api::extract::ApiJson;
use crate::api::state::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Get current user profile.
#[instrument(skip(state, user))]
pub async fn get_me(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Json<UserInfo>> {
    match state.users().get(user.id()).await {
        Ok(db_user) => Ok(Json(db_user.into())),
        // Dev users exist only in config; answer from the token.
        Err(CareError::NotFound(_)) => Ok(Json(UserInfo {
            id: user.id().to_string(),
            email: user.claims.email.clone().unwrap_or_default(),
            display_name: user.display_name().to_string(),
            phone: None,
            role: user.role(),
            created_at: String::new(),
            last_login_at: None,
        })),
        Err(err) => Err(err.into()),
    }
}

/// Update the caller's email and/or phone.
#[instrument(skip(state, user, request))]
pub async fn update_contact(
    State(state): State<AppState>,
    RequireMember(user): RequireMember,
    ApiJson(request): ApiJson<UpdateContactRequest>,
) -> ApiResult<Json<UserInfo>> {
    let updated = state.memberships().update_contact(user.id(), request).await?;
    Ok(Json(updated.into()))
}
