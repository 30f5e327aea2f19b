//! Membership administration handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use tracing::{info, instrument};

use crate::auth::RequireAdmin;
use crate::membership::{MembershipInfo, MembershipListQuery, VitalsKitStatus};

use crate::api::error::ApiResult;
use crate::api::extract::ApiJson;
use crate::api::state::AppState;

/// Request body for advancing the vitals kit status.
#[derive(Debug, Deserialize)]
pub struct UpdateVitalsKitRequest {
    pub status: VitalsKitStatus,
}

pub async fn list_memberships(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<MembershipListQuery>,
) -> ApiResult<Json<Vec<MembershipInfo>>> {
    let memberships = state.memberships().list(&query).await?;
    Ok(Json(memberships.into_iter().map(Into::into).collect()))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.id()))]
pub async fn activate_membership(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<String>,
) -> ApiResult<Json<MembershipInfo>> {
    let membership = state.memberships().activate(&id).await?;
    info!(membership_id = %id, "Membership activated by admin");
    Ok(Json(membership.into()))
}

#[instrument(skip(state, admin, request), fields(admin_id = %admin.id()))]
pub async fn update_vitals_kit(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<UpdateVitalsKitRequest>,
) -> ApiResult<Json<MembershipInfo>> {
    let membership = state
        .memberships()
        .update_vitals_kit_status(&id, request.status)
        .await?;
    Ok(Json(membership.into()))
}
