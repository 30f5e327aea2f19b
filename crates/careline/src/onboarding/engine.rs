//! Onboarding transition table.
//!
//! Pure functions over [`OnboardingStep`]. Every intake stage routes and
//! advances through these, so the sequence lives in one place.

use crate::error::{CareError, CareResult};

use super::models::{Destination, IntakeStage, OnboardingStep};

/// Page a member at `step` should be sent to.
///
/// `None` means the user has no membership row at all. A stored step that
/// failed to parse should be passed through [`OnboardingStep::from_stored`]
/// first, which reads it as `Started`.
pub fn next_destination(step: Option<OnboardingStep>) -> Destination {
    let Some(step) = step else {
        return Destination::RequestReview;
    };
    match step {
        OnboardingStep::Started | OnboardingStep::PendingBaseline => Destination::BaselineIntake,
        OnboardingStep::BaselineComplete => Destination::EmergencyContacts,
        OnboardingStep::EmergencyContactsComplete => Destination::MedicalHistory,
        OnboardingStep::MedicalHistoryComplete => Destination::VitalsKit,
        OnboardingStep::OnboardingComplete => Destination::Dashboard,
    }
}

/// Whether `stage` is the form a member at `current` is expected to fill out.
pub fn accepts(current: Option<OnboardingStep>, stage: IntakeStage) -> bool {
    next_destination(current) == stage.destination()
}

/// Step recorded after `stage` is submitted at `current`.
///
/// Fails with `OutOfSequence`, carrying the canonical destination for
/// `current`, when `stage` is not the member's current form.
pub fn advance(current: Option<OnboardingStep>, stage: IntakeStage) -> CareResult<OnboardingStep> {
    if accepts(current, stage) {
        Ok(stage.completes())
    } else {
        Err(CareError::out_of_sequence(
            stage,
            current,
            next_destination(current),
        ))
    }
}

/// Step after an admin activates the membership.
pub fn activate(current: OnboardingStep) -> OnboardingStep {
    match current {
        OnboardingStep::Started => OnboardingStep::PendingBaseline,
        other => other,
    }
}
