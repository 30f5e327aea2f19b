//! Family member handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::instrument;

use crate::auth::RequireMember;
use crate::intake::{MedicalHistory, MedicalHistoryForm};
use crate::membership::{AddFamilyMemberRequest, Person, UpdateFamilyMemberRequest};

use crate::api::error::ApiResult;
use crate::api::extract::ApiJson;
use crate::api::state::AppState;

pub async fn list_family(
    State(state): State<AppState>,
    RequireMember(user): RequireMember,
) -> ApiResult<Json<Vec<Person>>> {
    Ok(Json(state.memberships().list_family(user.id()).await?))
}

#[instrument(skip(state, user, request), fields(user_id = %user.id()))]
pub async fn add_family_member(
    State(state): State<AppState>,
    RequireMember(user): RequireMember,
    ApiJson(request): ApiJson<AddFamilyMemberRequest>,
) -> ApiResult<(StatusCode, Json<Person>)> {
    let person = state
        .memberships()
        .add_family_member(user.id(), request)
        .await?;
    Ok((StatusCode::CREATED, Json(person)))
}

pub async fn update_family_member(
    State(state): State<AppState>,
    RequireMember(user): RequireMember,
    Path(person_id): Path<String>,
    ApiJson(request): ApiJson<UpdateFamilyMemberRequest>,
) -> ApiResult<Json<Person>> {
    let person = state
        .memberships()
        .update_family_member(user.id(), &person_id, request)
        .await?;
    Ok(Json(person))
}

#[instrument(skip(state, user), fields(user_id = %user.id()))]
pub async fn remove_family_member(
    State(state): State<AppState>,
    RequireMember(user): RequireMember,
    Path(person_id): Path<String>,
) -> ApiResult<StatusCode> {
    state
        .memberships()
        .remove_family_member(user.id(), &person_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn submit_dependent_history(
    State(state): State<AppState>,
    RequireMember(user): RequireMember,
    Path(person_id): Path<String>,
    ApiJson(form): ApiJson<MedicalHistoryForm>,
) -> ApiResult<Json<MedicalHistory>> {
    let history = state
        .memberships()
        .submit_dependent_history(user.id(), &person_id, &form)
        .await?;
    Ok(Json(history))
}
