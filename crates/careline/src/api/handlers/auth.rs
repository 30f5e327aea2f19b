//! Authentication handlers.

use axum::{
    Json,
    extract::State,
    http::{StatusCode, header::SET_COOKIE},
    response::{AppendHeaders, IntoResponse},
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::auth::{AUTH_COOKIE, AuthError, Role};
use crate::membership::{MembershipInfo, RegisterRequest};
use crate::onboarding::progress_of;
use crate::user::UserInfo;

use crate::api::error::ApiResult;
use crate::api::extract::ApiJson;
use crate::api::state::AppState;

/// Login request. `email` also accepts a dev user id in dev mode.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(alias = "username")]
    pub email: String,
    pub password: String,
}

/// Identity returned after login.
#[derive(Debug, Serialize)]
pub struct SessionUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// Login response.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: SessionUser,
    /// Page the client should open next.
    pub landing: &'static str,
}

/// Registration response.
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub token: String,
    pub user: UserInfo,
    pub membership: MembershipInfo,
    pub landing: &'static str,
}

fn session_cookie(state: &AppState, token: &str) -> String {
    // Omit Secure in dev mode so http://localhost works.
    let secure_flag = if state.auth.is_dev_mode() {
        ""
    } else {
        " Secure;"
    };
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax;{} Max-Age={}",
        AUTH_COOKIE,
        token,
        secure_flag,
        state.auth.token_ttl_secs()
    )
}

/// Login endpoint. Database users first, then dev users in dev mode.
#[instrument(skip(state, request), fields(login = %request.email))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let db_user = state
        .users()
        .verify_credentials(&request.email, &request.password)
        .await?;

    let user = match db_user {
        Some(user) => SessionUser {
            id: user.id,
            name: user.display_name,
            email: user.email,
            role: user.role,
        },
        None => {
            let dev = state
                .auth
                .validate_dev_credentials(&request.email, &request.password)
                .ok_or(AuthError::InvalidCredentials)?;
            SessionUser {
                id: dev.id.clone(),
                name: dev.name.clone(),
                email: dev.email.clone(),
                role: dev.role,
            }
        }
    };

    let token = state
        .auth
        .generate_token(&user.id, &user.email, &user.name, user.role)?;

    let landing = match user.role.staff_landing() {
        Some(path) => path,
        None => state.onboarding().progress(&user.id).await?.path,
    };

    info!(user_id = %user.id, role = %user.role, "User logged in");

    Ok((
        AppendHeaders([(SET_COOKIE, session_cookie(&state, &token))]),
        Json(LoginResponse {
            token,
            user,
            landing,
        }),
    ))
}

/// Self-service sign-up for patients.
#[instrument(skip(state, request), fields(email = %request.email))]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let (user, membership) = state.memberships().register(request).await?;

    let token = state
        .auth
        .generate_token(&user.id, &user.email, &user.display_name, user.role)?;
    let landing = progress_of(Some(&membership)).path;

    info!(user_id = %user.id, membership_id = %membership.id, "User registered");

    Ok((
        StatusCode::CREATED,
        AppendHeaders([(SET_COOKIE, session_cookie(&state, &token))]),
        Json(RegisterResponse {
            token,
            user: user.into(),
            membership: membership.into(),
            landing,
        }),
    ))
}

/// Clear the session cookie.
pub async fn logout() -> impl IntoResponse {
    let cookie = format!("{AUTH_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");

    (AppendHeaders([(SET_COOKIE, cookie)]), StatusCode::NO_CONTENT)
}
