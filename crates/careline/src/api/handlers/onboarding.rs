//! Landing, onboarding progress and membership handlers.

use axum::{
    Json,
    extract::State,
    http::{StatusCode, header::LOCATION},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::instrument;

use crate::auth::{CurrentUser, RequireMember, Role};
use crate::membership::{MembershipInfo, RequestMembershipRequest};
use crate::onboarding::OnboardingProgress;

use crate::api::error::ApiResult;
use crate::api::extract::ApiJson;
use crate::api::state::AppState;

/// Body sent with the landing redirect.
#[derive(Debug, Serialize)]
pub struct HomeResponse {
    pub role: Role,
    pub redirect_to: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<OnboardingProgress>,
}

/// Send the caller to their landing page: staff to their console,
/// patients to wherever onboarding says they belong.
#[instrument(skip(state, user), fields(user_id = %user.id()))]
pub async fn home(State(state): State<AppState>, user: CurrentUser) -> ApiResult<Response> {
    let role = user.role();
    let body = match role.staff_landing() {
        Some(path) => HomeResponse {
            role,
            redirect_to: path,
            progress: None,
        },
        None => {
            let progress = state.onboarding().progress(user.id()).await?;
            HomeResponse {
                role,
                redirect_to: progress.path,
                progress: Some(progress),
            }
        }
    };

    Ok((
        StatusCode::SEE_OTHER,
        [(LOCATION, body.redirect_to)],
        Json(body),
    )
        .into_response())
}

pub async fn get_onboarding(
    State(state): State<AppState>,
    RequireMember(user): RequireMember,
) -> ApiResult<Json<OnboardingProgress>> {
    Ok(Json(state.onboarding().progress(user.id()).await?))
}

pub async fn get_membership(
    State(state): State<AppState>,
    RequireMember(user): RequireMember,
) -> ApiResult<Json<MembershipInfo>> {
    let membership = state.memberships().get_for_user(user.id()).await?;
    Ok(Json(membership.into()))
}

/// Request-review entry flow for a signed-in user without a membership.
#[instrument(skip(state, user, request), fields(user_id = %user.id()))]
pub async fn request_membership(
    State(state): State<AppState>,
    RequireMember(user): RequireMember,
    ApiJson(request): ApiJson<RequestMembershipRequest>,
) -> ApiResult<(StatusCode, Json<MembershipInfo>)> {
    let membership = state
        .memberships()
        .request_membership(user.id(), request)
        .await?;
    Ok((StatusCode::CREATED, Json(membership.into())))
}
