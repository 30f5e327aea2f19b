//! Intake stages: form loading and submission.

use sqlx::SqlitePool;
use tracing::{info, instrument};

use super::models::{
    BaselineForm, EmergencyContactsForm, IntakeForm, MAX_EMERGENCY_CONTACTS, MedicalHistoryForm,
    VitalsKitForm,
};
use super::repository::IntakeRepository;
use crate::error::{CareError, CareResult};
use crate::membership::{MembershipRepository, VitalsKitStatus};
use crate::onboarding::{IntakeStage, OnboardingService, OnboardingStep, StageOutcome, engine};

/// Service backing the four intake forms.
///
/// Each submission runs in one transaction: sequence guard, validation,
/// data rows, then the conditional step write. Any failure before commit
/// leaves both data and step untouched.
#[derive(Debug, Clone)]
pub struct IntakeService {
    pool: SqlitePool,
}

fn outcome(step: OnboardingStep) -> StageOutcome {
    let destination = engine::next_destination(Some(step));
    StageOutcome {
        step,
        destination,
        path: destination.path(),
    }
}

impl IntakeService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Pre-filled context for `stage`, if it is the user's current form.
    #[instrument(skip(self))]
    pub async fn form(&self, user_id: &str, stage: IntakeStage) -> CareResult<IntakeForm> {
        let membership = OnboardingService::guard_with(&self.pool, user_id, stage).await?;

        let form = match stage {
            IntakeStage::Baseline => {
                let person = MembershipRepository::find_self_person(&self.pool, &membership.id)
                    .await?
                    .ok_or_else(|| CareError::not_found("primary member"))?;
                let baseline = IntakeRepository::get_baseline(&self.pool, &person.id).await?;
                IntakeForm::Baseline { person, baseline }
            }
            IntakeStage::EmergencyContacts => IntakeForm::EmergencyContacts {
                contacts: MembershipRepository::list_emergency_contacts(
                    &self.pool,
                    &membership.id,
                )
                .await?,
                max_contacts: MAX_EMERGENCY_CONTACTS,
            },
            IntakeStage::MedicalHistory => {
                let history =
                    match MembershipRepository::find_self_person(&self.pool, &membership.id)
                        .await?
                    {
                        Some(person) => {
                            IntakeRepository::get_medical_history(&self.pool, &person.id).await?
                        }
                        None => None,
                    };
                IntakeForm::MedicalHistory { history }
            }
            IntakeStage::VitalsKit => IntakeForm::VitalsKit {
                request: IntakeRepository::get_vitals_kit_request(&self.pool, &membership.id)
                    .await?,
                kit_status: membership.vitals_kit_status,
            },
        };

        Ok(form)
    }

    #[instrument(skip(self, form))]
    pub async fn submit_baseline(
        &self,
        user_id: &str,
        form: &BaselineForm,
    ) -> CareResult<StageOutcome> {
        let stage = IntakeStage::Baseline;
        let mut tx = self.pool.begin().await?;
        let membership = OnboardingService::guard_with(&mut *tx, user_id, stage).await?;
        let form = form.validated()?;

        let person = MembershipRepository::find_self_person(&mut *tx, &membership.id)
            .await?
            .ok_or_else(|| CareError::not_found("primary member"))?;
        MembershipRepository::update_person(
            &mut *tx,
            &person.id,
            Some(&form.first_name),
            Some(&form.last_name),
            Some(&form.date_of_birth),
            None,
        )
        .await?;
        MembershipRepository::mark_intake_complete(&mut *tx, &person.id).await?;
        IntakeRepository::upsert_baseline(&mut tx, &person.id, &form).await?;

        let step = OnboardingService::commit_step(&mut tx, &membership, stage).await?;
        tx.commit().await?;

        info!(membership_id = %membership.id, "baseline intake submitted");
        Ok(outcome(step))
    }

    #[instrument(skip(self, form), fields(contacts = form.contacts.len()))]
    pub async fn submit_emergency_contacts(
        &self,
        user_id: &str,
        form: &EmergencyContactsForm,
    ) -> CareResult<StageOutcome> {
        let stage = IntakeStage::EmergencyContacts;
        let mut tx = self.pool.begin().await?;
        let membership = OnboardingService::guard_with(&mut *tx, user_id, stage).await?;
        let form = form.validated()?;

        for contact in &form.contacts {
            MembershipRepository::upsert_emergency_contact(
                &mut tx,
                &membership.id,
                &contact.name,
                &contact.relationship,
                &contact.phone,
                contact.email.as_deref(),
            )
            .await?;
        }

        let step = OnboardingService::commit_step(&mut tx, &membership, stage).await?;
        tx.commit().await?;

        info!(membership_id = %membership.id, "emergency contacts submitted");
        Ok(outcome(step))
    }

    #[instrument(skip(self, form))]
    pub async fn submit_medical_history(
        &self,
        user_id: &str,
        form: &MedicalHistoryForm,
    ) -> CareResult<StageOutcome> {
        let stage = IntakeStage::MedicalHistory;
        let mut tx = self.pool.begin().await?;
        let membership = OnboardingService::guard_with(&mut *tx, user_id, stage).await?;
        let form = form.validated()?;

        let person = MembershipRepository::find_self_person(&mut *tx, &membership.id)
            .await?
            .ok_or_else(|| CareError::not_found("primary member"))?;
        IntakeRepository::upsert_medical_history(&mut tx, &person.id, &form).await?;

        let step = OnboardingService::commit_step(&mut tx, &membership, stage).await?;
        tx.commit().await?;

        info!(membership_id = %membership.id, "medical history submitted");
        Ok(outcome(step))
    }

    #[instrument(skip(self, form))]
    pub async fn submit_vitals_kit(
        &self,
        user_id: &str,
        form: &VitalsKitForm,
    ) -> CareResult<StageOutcome> {
        let stage = IntakeStage::VitalsKit;
        let mut tx = self.pool.begin().await?;
        let membership = OnboardingService::guard_with(&mut *tx, user_id, stage).await?;
        let form = form.validated()?;

        IntakeRepository::upsert_vitals_kit_request(&mut tx, &membership.id, &form).await?;
        // A resubmission finds the kit already requested; leave it.
        MembershipRepository::transition_vitals_kit(
            &mut *tx,
            &membership.id,
            VitalsKitStatus::NotRequested,
            VitalsKitStatus::Requested,
        )
        .await?;

        let step = OnboardingService::commit_step(&mut tx, &membership, stage).await?;
        tx.commit().await?;

        info!(membership_id = %membership.id, "vitals kit requested, onboarding complete");
        Ok(outcome(step))
    }
}
