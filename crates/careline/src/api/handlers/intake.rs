//! Intake form handlers.
//!
//! Loading or submitting a form that is not the caller's current stage
//! answers with a 303 to the page they belong on, whatever the body holds.

use axum::{Json, extract::State};

use crate::auth::RequireMember;
use crate::intake::{
    BaselineForm, EmergencyContactsForm, IntakeForm, MedicalHistoryForm, VitalsKitForm,
};
use crate::onboarding::{IntakeStage, StageOutcome};

use crate::api::error::ApiResult;
use crate::api::extract::Deferred;
use crate::api::state::AppState;

/// The parsed form, once the sequence guard has passed for `stage`.
async fn accept<T>(
    state: &AppState,
    user_id: &str,
    stage: IntakeStage,
    body: Deferred<T>,
) -> ApiResult<T> {
    if !body.is_ok() {
        state.onboarding().guard(user_id, stage).await?;
    }
    body.into_result()
}

async fn load(state: &AppState, user_id: &str, stage: IntakeStage) -> ApiResult<Json<IntakeForm>> {
    Ok(Json(state.intake().form(user_id, stage).await?))
}

pub async fn get_baseline(
    State(state): State<AppState>,
    RequireMember(user): RequireMember,
) -> ApiResult<Json<IntakeForm>> {
    load(&state, user.id(), IntakeStage::Baseline).await
}

pub async fn submit_baseline(
    State(state): State<AppState>,
    RequireMember(user): RequireMember,
    body: Deferred<BaselineForm>,
) -> ApiResult<Json<StageOutcome>> {
    let form = accept(&state, user.id(), IntakeStage::Baseline, body).await?;
    Ok(Json(state.intake().submit_baseline(user.id(), &form).await?))
}

pub async fn get_emergency_contacts(
    State(state): State<AppState>,
    RequireMember(user): RequireMember,
) -> ApiResult<Json<IntakeForm>> {
    load(&state, user.id(), IntakeStage::EmergencyContacts).await
}

pub async fn submit_emergency_contacts(
    State(state): State<AppState>,
    RequireMember(user): RequireMember,
    body: Deferred<EmergencyContactsForm>,
) -> ApiResult<Json<StageOutcome>> {
    let form = accept(&state, user.id(), IntakeStage::EmergencyContacts, body).await?;
    Ok(Json(
        state
            .intake()
            .submit_emergency_contacts(user.id(), &form)
            .await?,
    ))
}

pub async fn get_medical_history(
    State(state): State<AppState>,
    RequireMember(user): RequireMember,
) -> ApiResult<Json<IntakeForm>> {
    load(&state, user.id(), IntakeStage::MedicalHistory).await
}

pub async fn submit_medical_history(
    State(state): State<AppState>,
    RequireMember(user): RequireMember,
    body: Deferred<MedicalHistoryForm>,
) -> ApiResult<Json<StageOutcome>> {
    let form = accept(&state, user.id(), IntakeStage::MedicalHistory, body).await?;
    Ok(Json(
        state
            .intake()
            .submit_medical_history(user.id(), &form)
            .await?,
    ))
}

pub async fn get_vitals_kit(
    State(state): State<AppState>,
    RequireMember(user): RequireMember,
) -> ApiResult<Json<IntakeForm>> {
    load(&state, user.id(), IntakeStage::VitalsKit).await
}

pub async fn submit_vitals_kit(
    State(state): State<AppState>,
    RequireMember(user): RequireMember,
    body: Deferred<VitalsKitForm>,
) -> ApiResult<Json<StageOutcome>> {
    let form = accept(&state, user.id(), IntakeStage::VitalsKit, body).await?;
    Ok(Json(state.intake().submit_vitals_kit(user.id(), &form).await?))
}
