//! Consultation repository.
//!
//! Every status change is a conditional update on the expected source
//! status, so a request that lost a race changes nothing.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::{debug, instrument};

use super::models::{Consultation, ConsultationStatus};

const CONSULTATION_COLUMNS: &str = "id, membership_id, person_id, chief_complaint, status, \
                                    clinician_id, created_at, updated_at, cancelled_at, \
                                    completed_at";

#[derive(Debug, Clone)]
pub struct ConsultationRepository {
    pool: SqlitePool,
}

impl ConsultationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn generate_id() -> String {
        format!("con_{}", nanoid::nanoid!(12))
    }

    #[instrument(skip(self, chief_complaint))]
    pub async fn create(
        &self,
        membership_id: &str,
        person_id: &str,
        chief_complaint: &str,
    ) -> Result<Consultation> {
        let id = Self::generate_id();
        sqlx::query(
            r#"
            INSERT INTO consultation_requests (id, membership_id, person_id, chief_complaint)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(membership_id)
        .bind(person_id)
        .bind(chief_complaint)
        .execute(&self.pool)
        .await
        .context("Failed to insert consultation request")?;

        debug!("Created consultation {} for membership {}", id, membership_id);
        self.get(&id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Consultation not found after creation"))
    }

    pub async fn get(&self, id: &str) -> Result<Option<Consultation>> {
        let sql = format!("SELECT {CONSULTATION_COLUMNS} FROM consultation_requests WHERE id = ?");
        sqlx::query_as::<_, Consultation>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch consultation")
    }

    pub async fn list_for_membership(&self, membership_id: &str) -> Result<Vec<Consultation>> {
        let sql = format!(
            "SELECT {CONSULTATION_COLUMNS} FROM consultation_requests \
             WHERE membership_id = ? ORDER BY created_at DESC, id"
        );
        sqlx::query_as::<_, Consultation>(&sql)
            .bind(membership_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list consultations")
    }

    /// Clinician queue, oldest first.
    #[instrument(skip(self))]
    pub async fn list_by_status(
        &self,
        status: Option<ConsultationStatus>,
    ) -> Result<Vec<Consultation>> {
        let sql = format!(
            "SELECT {CONSULTATION_COLUMNS} FROM consultation_requests \
             WHERE (? IS NULL OR status = ?) ORDER BY created_at, id"
        );
        let status = status.map(|s| s.as_str());
        sqlx::query_as::<_, Consultation>(&sql)
            .bind(status)
            .bind(status)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list consultation queue")
    }

    /// Cancel an open request. Returns false if it was no longer open.
    pub async fn cancel(&self, id: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE consultation_requests
            SET status = 'cancelled',
                cancelled_at = datetime('now'),
                updated_at = datetime('now')
            WHERE id = ? AND status IN ('pending', 'in_progress')
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .context("Failed to cancel consultation")?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn claim(&self, id: &str, clinician_id: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE consultation_requests
            SET status = 'in_progress', clinician_id = ?, updated_at = datetime('now')
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(clinician_id)
        .bind(id)
        .execute(&self.pool)
        .await
        .context("Failed to claim consultation")?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn complete(&self, id: &str, clinician_id: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE consultation_requests
            SET status = 'completed',
                completed_at = datetime('now'),
                updated_at = datetime('now')
            WHERE id = ? AND status = 'in_progress' AND clinician_id = ?
            "#,
        )
        .bind(id)
        .bind(clinician_id)
        .execute(&self.pool)
        .await
        .context("Failed to complete consultation")?;

        Ok(result.rows_affected() > 0)
    }
}
