//! Onboarding service: progress lookup, sequence guard and step writes.

use sqlx::{SqliteConnection, SqliteExecutor, SqlitePool};
use tracing::{debug, info, instrument, warn};

use super::engine;
use super::models::{IntakeStage, OnboardingProgress, OnboardingStep};
use crate::error::{CareError, CareResult};
use crate::membership::{Membership, MembershipRepository};

/// Service for reading and advancing a membership's onboarding step.
///
/// The step lives in `memberships.onboarding_step`. Every write goes through
/// [`OnboardingService::commit_step`], which only succeeds when the stored
/// value is still the one the caller read.
#[derive(Debug, Clone)]
pub struct OnboardingService {
    pool: SqlitePool,
}

impl OnboardingService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Where the user stands and which page they belong on.
    #[instrument(skip(self))]
    pub async fn progress(&self, user_id: &str) -> CareResult<OnboardingProgress> {
        let membership = MembershipRepository::find_by_user(&self.pool, user_id).await?;
        Ok(progress_of(membership.as_ref()))
    }

    /// Load the user's membership if `stage` is their current form.
    #[instrument(skip(self))]
    pub async fn guard(&self, user_id: &str, stage: IntakeStage) -> CareResult<Membership> {
        Self::guard_with(&self.pool, user_id, stage).await
    }

    /// [`OnboardingService::guard`] on a caller-provided executor, so intake
    /// submissions can check the sequence inside their own transaction.
    pub async fn guard_with<'e, E>(
        executor: E,
        user_id: &str,
        stage: IntakeStage,
    ) -> CareResult<Membership>
    where
        E: SqliteExecutor<'e>,
    {
        let membership = MembershipRepository::find_by_user(executor, user_id).await?;
        let current = membership.as_ref().map(Membership::step);

        if !engine::accepts(current, stage) {
            let redirect = engine::next_destination(current);
            debug!(
                user_id,
                %stage,
                redirect = redirect.path(),
                "intake stage requested out of sequence"
            );
            return Err(CareError::out_of_sequence(stage, current, redirect));
        }

        membership.ok_or_else(|| {
            CareError::out_of_sequence(stage, None, engine::next_destination(None))
        })
    }

    /// Record that `stage` was completed for `membership`.
    ///
    /// The write is conditional on the step still holding the value read into
    /// `membership`. If another request got there first and the step already
    /// reached the target (or beyond), this is a no-op success. Any other
    /// stored step fails with `OutOfSequence` and the caller's transaction
    /// must be rolled back.
    #[instrument(skip(conn, membership), fields(membership_id = %membership.id))]
    pub async fn commit_step(
        conn: &mut SqliteConnection,
        membership: &Membership,
        stage: IntakeStage,
    ) -> CareResult<OnboardingStep> {
        let next = engine::advance(Some(membership.step()), stage)?;

        let result = sqlx::query(
            r#"
            UPDATE memberships
            SET onboarding_step = ?, updated_at = datetime('now')
            WHERE id = ? AND onboarding_step IS ?
            "#,
        )
        .bind(next.as_str())
        .bind(&membership.id)
        .bind(membership.onboarding_step.as_deref())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 1 {
            info!(from = %membership.step(), to = %next, "onboarding step advanced");
            return Ok(next);
        }

        let (stored,): (Option<String>,) =
            sqlx::query_as("SELECT onboarding_step FROM memberships WHERE id = ?")
                .bind(&membership.id)
                .fetch_optional(&mut *conn)
                .await?
                .ok_or_else(|| CareError::not_found("membership"))?;
        let now = OnboardingStep::from_stored(stored.as_deref());

        if now >= next {
            debug!(stored = %now, target = %next, "step already advanced by a concurrent request");
            Ok(now)
        } else {
            warn!(stored = %now, target = %next, "onboarding step changed during submission");
            Err(CareError::out_of_sequence(
                stage,
                Some(now),
                engine::next_destination(Some(now)),
            ))
        }
    }
}

/// Progress for an optional membership row.
pub fn progress_of(membership: Option<&Membership>) -> OnboardingProgress {
    let step = membership.map(Membership::step);
    let destination = engine::next_destination(step);
    OnboardingProgress {
        membership_id: membership.map(|m| m.id.clone()),
        step,
        destination,
        path: destination.path(),
        needs_onboarding: !step.is_some_and(|s| s.is_complete()),
    }
}
