//! Consultation workflow for members and clinicians.

use std::sync::Arc;

use sqlx::SqlitePool;
use tracing::{info, instrument, warn};

use super::models::{
    Consultation, ConsultationStatus, CreateConsultationRequest, MAX_COMPLAINT_LEN,
    MIN_COMPLAINT_LEN,
};
use super::repository::ConsultationRepository;
use crate::error::{CareError, CareResult};
use crate::membership::{Membership, MembershipRepository};
use crate::notify::{self, ConsultationEvent, Notifier};
use crate::validate;

#[derive(Clone)]
pub struct ConsultationService {
    pool: SqlitePool,
    repo: ConsultationRepository,
    notifier: Arc<dyn Notifier>,
}

impl ConsultationService {
    pub fn new(pool: SqlitePool, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            repo: ConsultationRepository::new(pool.clone()),
            pool,
            notifier,
        }
    }

    async fn membership_of(&self, user_id: &str) -> CareResult<Membership> {
        MembershipRepository::find_by_user(&self.pool, user_id)
            .await?
            .ok_or_else(|| CareError::not_found("membership"))
    }

    async fn owned(&self, user_id: &str, id: &str) -> CareResult<Consultation> {
        let membership = self.membership_of(user_id).await?;
        let consultation = self
            .repo
            .get(id)
            .await?
            .ok_or_else(|| CareError::not_found("consultation"))?;
        if consultation.membership_id != membership.id {
            warn!(user_id, consultation_id = id, "consultation belongs to another membership");
            return Err(CareError::unauthorized(
                "consultation is not part of your membership",
            ));
        }
        Ok(consultation)
    }

    /// Open a consultation for a person covered by the caller's membership
    /// and notify the care team.
    #[instrument(skip(self, request), fields(person_id = %request.person_id))]
    pub async fn request(
        &self,
        user_id: &str,
        request: &CreateConsultationRequest,
    ) -> CareResult<Consultation> {
        let complaint = validate::text("chief_complaint", &request.chief_complaint, MAX_COMPLAINT_LEN)?;
        if complaint.chars().count() < MIN_COMPLAINT_LEN {
            return Err(CareError::validation(format!(
                "chief_complaint must be at least {MIN_COMPLAINT_LEN} characters"
            )));
        }

        let membership = self.membership_of(user_id).await?;
        let person = MembershipRepository::find_person(&self.pool, &request.person_id)
            .await?
            .ok_or_else(|| CareError::not_found("person"))?;
        if person.membership_id != membership.id {
            return Err(CareError::unauthorized(
                "person is not covered by your membership",
            ));
        }

        let consultation = self
            .repo
            .create(&membership.id, &person.id, &complaint)
            .await?;
        info!(consultation_id = %consultation.id, "Consultation requested");

        notify::dispatch(
            self.notifier.clone(),
            ConsultationEvent::from(&consultation),
        );
        Ok(consultation)
    }

    pub async fn list_for_user(&self, user_id: &str) -> CareResult<Vec<Consultation>> {
        let membership = self.membership_of(user_id).await?;
        Ok(self.repo.list_for_membership(&membership.id).await?)
    }

    pub async fn get_for_user(&self, user_id: &str, id: &str) -> CareResult<Consultation> {
        self.owned(user_id, id).await
    }

    /// Cancel an open consultation. Completed or already cancelled
    /// requests are left as they are.
    #[instrument(skip(self))]
    pub async fn cancel(&self, user_id: &str, id: &str) -> CareResult<Consultation> {
        let consultation = self.owned(user_id, id).await?;
        if !consultation.status.is_cancellable() || !self.repo.cancel(id).await? {
            let current = self
                .repo
                .get(id)
                .await?
                .map(|c| c.status)
                .unwrap_or(consultation.status);
            return Err(CareError::rejected(format!(
                "a {current} consultation cannot be cancelled"
            )));
        }
        info!(consultation_id = id, "Consultation cancelled");

        self.repo
            .get(id)
            .await?
            .ok_or_else(|| CareError::not_found("consultation"))
    }

    // Clinician side

    pub async fn queue(&self, status: Option<ConsultationStatus>) -> CareResult<Vec<Consultation>> {
        Ok(self.repo.list_by_status(status).await?)
    }

    /// Take a pending consultation.
    #[instrument(skip(self))]
    pub async fn claim(&self, clinician_id: &str, id: &str) -> CareResult<Consultation> {
        let consultation = self
            .repo
            .get(id)
            .await?
            .ok_or_else(|| CareError::not_found("consultation"))?;
        if !self.repo.claim(id, clinician_id).await? {
            return Err(CareError::rejected(format!(
                "a {} consultation cannot be claimed",
                consultation.status
            )));
        }
        info!(consultation_id = id, clinician_id, "Consultation claimed");

        self.repo
            .get(id)
            .await?
            .ok_or_else(|| CareError::not_found("consultation"))
    }

    /// Complete a consultation claimed by `clinician_id`.
    #[instrument(skip(self))]
    pub async fn complete(&self, clinician_id: &str, id: &str) -> CareResult<Consultation> {
        let consultation = self
            .repo
            .get(id)
            .await?
            .ok_or_else(|| CareError::not_found("consultation"))?;
        if consultation.status == ConsultationStatus::InProgress
            && consultation.clinician_id.as_deref() != Some(clinician_id)
        {
            return Err(CareError::unauthorized(
                "consultation is claimed by another clinician",
            ));
        }
        if !self.repo.complete(id, clinician_id).await? {
            return Err(CareError::rejected(format!(
                "a {} consultation cannot be completed",
                consultation.status
            )));
        }
        info!(consultation_id = id, clinician_id, "Consultation completed");

        self.repo
            .get(id)
            .await?
            .ok_or_else(|| CareError::not_found("consultation"))
    }
}
