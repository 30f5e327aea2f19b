//! Consultation handlers for members and clinicians.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use tracing::instrument;

use crate::auth::{RequireClinician, RequireConsultationAccess};
use crate::consultation::{Consultation, ConsultationQueueQuery, CreateConsultationRequest};

use crate::api::error::ApiResult;
use crate::api::extract::ApiJson;
use crate::api::state::AppState;

pub async fn list_consultations(
    State(state): State<AppState>,
    RequireConsultationAccess(user): RequireConsultationAccess,
) -> ApiResult<Json<Vec<Consultation>>> {
    Ok(Json(state.consultations().list_for_user(user.id()).await?))
}

#[instrument(skip(state, user, request), fields(user_id = %user.id()))]
pub async fn create_consultation(
    State(state): State<AppState>,
    RequireConsultationAccess(user): RequireConsultationAccess,
    ApiJson(request): ApiJson<CreateConsultationRequest>,
) -> ApiResult<(StatusCode, Json<Consultation>)> {
    let consultation = state.consultations().request(user.id(), &request).await?;
    Ok((StatusCode::CREATED, Json(consultation)))
}

pub async fn get_consultation(
    State(state): State<AppState>,
    RequireConsultationAccess(user): RequireConsultationAccess,
    Path(id): Path<String>,
) -> ApiResult<Json<Consultation>> {
    Ok(Json(state.consultations().get_for_user(user.id(), &id).await?))
}

#[instrument(skip(state, user), fields(user_id = %user.id()))]
pub async fn cancel_consultation(
    State(state): State<AppState>,
    RequireConsultationAccess(user): RequireConsultationAccess,
    Path(id): Path<String>,
) -> ApiResult<Json<Consultation>> {
    Ok(Json(state.consultations().cancel(user.id(), &id).await?))
}

// Clinician queue

pub async fn clinician_queue(
    State(state): State<AppState>,
    RequireClinician(_user): RequireClinician,
    Query(query): Query<ConsultationQueueQuery>,
) -> ApiResult<Json<Vec<Consultation>>> {
    Ok(Json(state.consultations().queue(query.status).await?))
}

#[instrument(skip(state, user), fields(clinician_id = %user.id()))]
pub async fn claim_consultation(
    State(state): State<AppState>,
    RequireClinician(user): RequireClinician,
    Path(id): Path<String>,
) -> ApiResult<Json<Consultation>> {
    Ok(Json(state.consultations().claim(user.id(), &id).await?))
}

#[instrument(skip(state, user), fields(clinician_id = %user.id()))]
pub async fn complete_consultation(
    State(state): State<AppState>,
    RequireClinician(user): RequireClinician,
    Path(id): Path<String>,
) -> ApiResult<Json<Consultation>> {
    Ok(Json(state.consultations().complete(user.id(), &id).await?))
}
