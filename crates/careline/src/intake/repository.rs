//! Intake record storage.
//!
//! Every write is an upsert keyed on the person or membership, so a
//! resubmitted stage overwrites its own rows instead of duplicating them.

use anyhow::{Context, Result};
use sqlx::{SqliteConnection, SqliteExecutor};

use super::models::{
    BaselineForm, BaselineIntake, MedicalHistory, MedicalHistoryForm, MedicalHistoryRow,
    VitalsKitForm, VitalsKitRequest,
};
use crate::error::CareResult;

pub struct IntakeRepository;

impl IntakeRepository {
    pub async fn upsert_baseline(
        conn: &mut SqliteConnection,
        person_id: &str,
        form: &BaselineForm,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO baseline_intakes (person_id, sex, height_cm, weight_kg, phone)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (person_id) DO UPDATE SET
                sex = excluded.sex,
                height_cm = excluded.height_cm,
                weight_kg = excluded.weight_kg,
                phone = excluded.phone,
                submitted_at = datetime('now')
            "#,
        )
        .bind(person_id)
        .bind(form.sex)
        .bind(form.height_cm)
        .bind(form.weight_kg)
        .bind(&form.phone)
        .execute(&mut *conn)
        .await
        .context("Failed to upsert baseline intake")?;
        Ok(())
    }

    pub async fn get_baseline<'e, E>(executor: E, person_id: &str) -> Result<Option<BaselineIntake>>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, BaselineIntake>(
            r#"
            SELECT person_id, sex, height_cm, weight_kg, phone, submitted_at
            FROM baseline_intakes
            WHERE person_id = ?
            "#,
        )
        .bind(person_id)
        .fetch_optional(executor)
        .await
        .context("Failed to fetch baseline intake")
    }

    pub async fn upsert_medical_history(
        conn: &mut SqliteConnection,
        person_id: &str,
        form: &MedicalHistoryForm,
    ) -> CareResult<()> {
        sqlx::query(
            r#"
            INSERT INTO medical_histories
                (person_id, conditions, medications, allergies, surgeries, notes)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (person_id) DO UPDATE SET
                conditions = excluded.conditions,
                medications = excluded.medications,
                allergies = excluded.allergies,
                surgeries = excluded.surgeries,
                notes = excluded.notes,
                submitted_at = datetime('now')
            "#,
        )
        .bind(person_id)
        .bind(serde_json::to_string(&form.conditions)?)
        .bind(serde_json::to_string(&form.medications)?)
        .bind(serde_json::to_string(&form.allergies)?)
        .bind(serde_json::to_string(&form.surgeries)?)
        .bind(&form.notes)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn get_medical_history<'e, E>(
        executor: E,
        person_id: &str,
    ) -> CareResult<Option<MedicalHistory>>
    where
        E: SqliteExecutor<'e>,
    {
        let row = sqlx::query_as::<_, MedicalHistoryRow>(
            r#"
            SELECT person_id, conditions, medications, allergies, surgeries, notes, submitted_at
            FROM medical_histories
            WHERE person_id = ?
            "#,
        )
        .bind(person_id)
        .fetch_optional(executor)
        .await?;

        row.map(MedicalHistory::try_from).transpose()
    }

    pub async fn upsert_vitals_kit_request(
        conn: &mut SqliteConnection,
        membership_id: &str,
        form: &VitalsKitForm,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO vitals_kit_requests
                (membership_id, address_line1, address_line2, city, region, postal_code)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (membership_id) DO UPDATE SET
                address_line1 = excluded.address_line1,
                address_line2 = excluded.address_line2,
                city = excluded.city,
                region = excluded.region,
                postal_code = excluded.postal_code,
                consented_at = datetime('now')
            "#,
        )
        .bind(membership_id)
        .bind(&form.address_line1)
        .bind(&form.address_line2)
        .bind(&form.city)
        .bind(&form.region)
        .bind(&form.postal_code)
        .execute(&mut *conn)
        .await
        .context("Failed to upsert vitals kit request")?;
        Ok(())
    }

    pub async fn get_vitals_kit_request<'e, E>(
        executor: E,
        membership_id: &str,
    ) -> Result<Option<VitalsKitRequest>>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, VitalsKitRequest>(
            r#"
            SELECT membership_id, address_line1, address_line2, city, region, postal_code,
                   consented_at
            FROM vitals_kit_requests
            WHERE membership_id = ?
            "#,
        )
        .bind(membership_id)
        .fetch_optional(executor)
        .await
        .context("Failed to fetch vitals kit request")
    }
}
