//! Membership repository for database operations.
//!
//! Reads that are needed both inside intake transactions and on their own
//! are generic over [`SqliteExecutor`], so they can run on the pool or on a
//! transaction's connection.

use anyhow::{Context, Result};
use sqlx::{SqliteConnection, SqliteExecutor, SqlitePool};
use tracing::{debug, instrument};

use super::models::{
    EmergencyContact, Membership, MembershipListQuery, MembershipStatus, Person, PlanType,
    Relationship, VitalsKitStatus,
};

const MEMBERSHIP_COLUMNS: &str = "id, user_id, plan_type, status, onboarding_step, \
                                  vitals_kit_status, created_at, updated_at";

const PERSON_COLUMNS: &str = "id, membership_id, first_name, last_name, date_of_birth, \
                              relationship, intake_complete, created_at, updated_at";

/// Fields of a person about to be inserted.
#[derive(Debug, Clone)]
pub struct NewPerson<'a> {
    pub membership_id: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub date_of_birth: Option<&'a str>,
    pub relationship: Relationship,
}

/// Repository for membership, person and emergency contact rows.
#[derive(Debug, Clone)]
pub struct MembershipRepository {
    pool: SqlitePool,
}

impl MembershipRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn generate_membership_id() -> String {
        format!("mem_{}", nanoid::nanoid!(12))
    }

    pub fn generate_person_id() -> String {
        format!("per_{}", nanoid::nanoid!(12))
    }

    /// Insert a membership at step `started`.
    #[instrument(skip(conn))]
    pub async fn insert(
        conn: &mut SqliteConnection,
        id: &str,
        user_id: &str,
        plan_type: PlanType,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO memberships (id, user_id, plan_type, status, onboarding_step)
            VALUES (?, ?, ?, 'pending_review', 'started')
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(plan_type)
        .execute(&mut *conn)
        .await
        .context("Failed to insert membership")?;

        debug!("Created membership {} for user {}", id, user_id);
        Ok(())
    }

    /// Insert a person and return its id.
    #[instrument(skip(conn, person), fields(membership_id = %person.membership_id))]
    pub async fn insert_person(conn: &mut SqliteConnection, person: &NewPerson<'_>) -> Result<String> {
        let id = Self::generate_person_id();
        sqlx::query(
            r#"
            INSERT INTO persons (id, membership_id, first_name, last_name, date_of_birth, relationship)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(person.membership_id)
        .bind(person.first_name)
        .bind(person.last_name)
        .bind(person.date_of_birth)
        .bind(person.relationship)
        .execute(&mut *conn)
        .await
        .context("Failed to insert person")?;

        Ok(id)
    }

    /// Membership owned by `user_id`, if any.
    pub async fn find_by_user<'e, E>(executor: E, user_id: &str) -> Result<Option<Membership>>
    where
        E: SqliteExecutor<'e>,
    {
        let sql = format!("SELECT {MEMBERSHIP_COLUMNS} FROM memberships WHERE user_id = ?");
        sqlx::query_as::<_, Membership>(&sql)
            .bind(user_id)
            .fetch_optional(executor)
            .await
            .context("Failed to fetch membership for user")
    }

    pub async fn get_by_user(&self, user_id: &str) -> Result<Option<Membership>> {
        Self::find_by_user(&self.pool, user_id).await
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: &str) -> Result<Option<Membership>> {
        let sql = format!("SELECT {MEMBERSHIP_COLUMNS} FROM memberships WHERE id = ?");
        sqlx::query_as::<_, Membership>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch membership")
    }

    #[instrument(skip(self))]
    pub async fn list(&self, query: &MembershipListQuery) -> Result<Vec<Membership>> {
        let limit = query.limit.unwrap_or(100).clamp(1, 500);
        let offset = query.offset.unwrap_or(0).max(0);

        let sql = format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM memberships \
             WHERE (? IS NULL OR status = ?) \
             ORDER BY created_at DESC, id LIMIT ? OFFSET ?"
        );
        let status = query.status.map(|s| s.as_str());
        sqlx::query_as::<_, Membership>(&sql)
            .bind(status)
            .bind(status)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list memberships")
    }

    /// Mark a membership active and set its step, provided the stored step
    /// is still `expected`. Returns false if the member moved on meanwhile.
    #[instrument(skip(self))]
    pub async fn activate_from(&self, id: &str, expected: Option<&str>, step: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE memberships
            SET status = ?, onboarding_step = ?, updated_at = datetime('now')
            WHERE id = ? AND onboarding_step IS ?
            "#,
        )
        .bind(MembershipStatus::Active)
        .bind(step)
        .bind(id)
        .bind(expected)
        .execute(&self.pool)
        .await
        .context("Failed to activate membership")?;

        Ok(result.rows_affected() > 0)
    }

    /// Move the kit status from `from` to `to`. Returns false if the stored
    /// status was no longer `from`.
    pub async fn transition_vitals_kit<'e, E>(
        executor: E,
        id: &str,
        from: VitalsKitStatus,
        to: VitalsKitStatus,
    ) -> Result<bool>
    where
        E: SqliteExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            UPDATE memberships
            SET vitals_kit_status = ?, updated_at = datetime('now')
            WHERE id = ? AND vitals_kit_status = ?
            "#,
        )
        .bind(to)
        .bind(id)
        .bind(from)
        .execute(executor)
        .await
        .context("Failed to update vitals kit status")?;

        Ok(result.rows_affected() > 0)
    }

    // Persons

    pub async fn find_person<'e, E>(executor: E, id: &str) -> Result<Option<Person>>
    where
        E: SqliteExecutor<'e>,
    {
        let sql = format!("SELECT {PERSON_COLUMNS} FROM persons WHERE id = ?");
        sqlx::query_as::<_, Person>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await
            .context("Failed to fetch person")
    }

    /// The primary member of a membership.
    pub async fn find_self_person<'e, E>(executor: E, membership_id: &str) -> Result<Option<Person>>
    where
        E: SqliteExecutor<'e>,
    {
        let sql = format!(
            "SELECT {PERSON_COLUMNS} FROM persons WHERE membership_id = ? AND relationship = 'self'"
        );
        sqlx::query_as::<_, Person>(&sql)
            .bind(membership_id)
            .fetch_optional(executor)
            .await
            .context("Failed to fetch primary member")
    }

    #[instrument(skip(self))]
    pub async fn list_persons(&self, membership_id: &str) -> Result<Vec<Person>> {
        let sql = format!(
            "SELECT {PERSON_COLUMNS} FROM persons WHERE membership_id = ? \
             ORDER BY relationship != 'self', created_at, id"
        );
        sqlx::query_as::<_, Person>(&sql)
            .bind(membership_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list persons")
    }

    /// Update a person's fields. `None` leaves a field unchanged.
    pub async fn update_person<'e, E>(
        executor: E,
        id: &str,
        first_name: Option<&str>,
        last_name: Option<&str>,
        date_of_birth: Option<&str>,
        relationship: Option<Relationship>,
    ) -> Result<bool>
    where
        E: SqliteExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            UPDATE persons
            SET first_name = COALESCE(?, first_name),
                last_name = COALESCE(?, last_name),
                date_of_birth = COALESCE(?, date_of_birth),
                relationship = COALESCE(?, relationship),
                updated_at = datetime('now')
            WHERE id = ?
            "#,
        )
        .bind(first_name)
        .bind(last_name)
        .bind(date_of_birth)
        .bind(relationship)
        .bind(id)
        .execute(executor)
        .await
        .context("Failed to update person")?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn mark_intake_complete<'e, E>(executor: E, person_id: &str) -> Result<()>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query(
            "UPDATE persons SET intake_complete = TRUE, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(person_id)
        .execute(executor)
        .await
        .context("Failed to mark intake complete")?;
        Ok(())
    }

    /// Whether any consultation, open or closed, names this person.
    pub async fn person_has_consultations<'e, E>(executor: E, person_id: &str) -> Result<bool>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM consultation_requests WHERE person_id = ?)",
        )
        .bind(person_id)
        .fetch_one(executor)
        .await
        .context("Failed to check consultations for person")
    }

    /// Delete a dependent. The primary member row is never matched.
    #[instrument(skip(self))]
    pub async fn delete_dependent(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM persons WHERE id = ? AND relationship != 'self'")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete person")?;

        Ok(result.rows_affected() > 0)
    }

    // Emergency contacts

    /// Insert a contact unless an identical one is already stored.
    /// Returns true if a row was written.
    pub async fn upsert_emergency_contact(
        conn: &mut SqliteConnection,
        membership_id: &str,
        name: &str,
        relationship: &str,
        phone: &str,
        email: Option<&str>,
    ) -> Result<bool> {
        let id = format!("ec_{}", nanoid::nanoid!(12));
        let result = sqlx::query(
            r#"
            INSERT INTO emergency_contacts (id, membership_id, name, relationship, phone, email)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (membership_id, name, relationship, phone) DO NOTHING
            "#,
        )
        .bind(&id)
        .bind(membership_id)
        .bind(name)
        .bind(relationship)
        .bind(phone)
        .bind(email)
        .execute(&mut *conn)
        .await
        .context("Failed to upsert emergency contact")?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn list_emergency_contacts<'e, E>(
        executor: E,
        membership_id: &str,
    ) -> Result<Vec<EmergencyContact>>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, EmergencyContact>(
            r#"
            SELECT id, membership_id, name, relationship, phone, email, created_at
            FROM emergency_contacts
            WHERE membership_id = ?
            ORDER BY created_at, id
            "#,
        )
        .bind(membership_id)
        .fetch_all(executor)
        .await
        .context("Failed to list emergency contacts")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    async fn seeded() -> (Database, String) {
        let db = Database::in_memory().await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        sqlx::query("INSERT INTO users (id, email, display_name) VALUES ('usr_1', 'a@b.co', 'A')")
            .execute(&mut *conn)
            .await
            .unwrap();
        let id = MembershipRepository::generate_membership_id();
        MembershipRepository::insert(&mut conn, &id, "usr_1", PlanType::Family)
            .await
            .unwrap();
        MembershipRepository::insert_person(
            &mut conn,
            &NewPerson {
                membership_id: &id,
                first_name: "Ada",
                last_name: "Lovelace",
                date_of_birth: None,
                relationship: Relationship::Myself,
            },
        )
        .await
        .unwrap();
        drop(conn);
        (db, id)
    }

    #[tokio::test]
    async fn test_insert_and_find_membership() {
        let (db, id) = seeded().await;
        let repo = MembershipRepository::new(db.pool().clone());

        let membership = repo.get_by_user("usr_1").await.unwrap().unwrap();
        assert_eq!(membership.id, id);
        assert_eq!(membership.plan_type, PlanType::Family);
        assert_eq!(membership.status, MembershipStatus::PendingReview);
        assert_eq!(membership.onboarding_step.as_deref(), Some("started"));
        assert_eq!(membership.vitals_kit_status, VitalsKitStatus::NotRequested);

        assert!(repo.get_by_user("usr_2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_emergency_contact_is_stored_once() {
        let (db, id) = seeded().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let first = MembershipRepository::upsert_emergency_contact(
            &mut conn,
            &id,
            "Grace",
            "sister",
            "5551234567",
            None,
        )
        .await
        .unwrap();
        let second = MembershipRepository::upsert_emergency_contact(
            &mut conn,
            &id,
            "Grace",
            "sister",
            "5551234567",
            None,
        )
        .await
        .unwrap();
        assert!(first);
        assert!(!second);

        let contacts = MembershipRepository::list_emergency_contacts(&mut *conn, &id)
            .await
            .unwrap();
        assert_eq!(contacts.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_dependent_never_matches_self() {
        let (db, id) = seeded().await;
        let repo = MembershipRepository::new(db.pool().clone());
        let primary = MembershipRepository::find_self_person(db.pool(), &id)
            .await
            .unwrap()
            .unwrap();

        assert!(!repo.delete_dependent(&primary.id).await.unwrap());
        assert_eq!(repo.list_persons(&id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_filters_by_status() {
        let (db, id) = seeded().await;
        let repo = MembershipRepository::new(db.pool().clone());

        let pending = repo
            .list(&MembershipListQuery {
                status: Some(MembershipStatus::PendingReview),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);

        assert!(
            repo.activate_from(&id, Some("started"), "pending_baseline")
                .await
                .unwrap()
        );
        let pending = repo
            .list(&MembershipListQuery {
                status: Some(MembershipStatus::PendingReview),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(pending.is_empty());
        assert_eq!(repo.list(&MembershipListQuery::default()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_activation_does_not_overwrite_a_newer_step() {
        let (db, id) = seeded().await;
        let repo = MembershipRepository::new(db.pool().clone());

        // The member finishes baseline after the admin read `started`.
        sqlx::query("UPDATE memberships SET onboarding_step = 'baseline_complete' WHERE id = ?")
            .bind(&id)
            .execute(db.pool())
            .await
            .unwrap();

        let stale = repo
            .activate_from(&id, Some("started"), "pending_baseline")
            .await
            .unwrap();
        assert!(!stale);
        let membership = repo.get(&id).await.unwrap().unwrap();
        assert_eq!(membership.onboarding_step.as_deref(), Some("baseline_complete"));
        assert_eq!(membership.status, MembershipStatus::PendingReview);

        let fresh = repo
            .activate_from(&id, Some("baseline_complete"), "baseline_complete")
            .await
            .unwrap();
        assert!(fresh);
        let membership = repo.get(&id).await.unwrap().unwrap();
        assert_eq!(membership.onboarding_step.as_deref(), Some("baseline_complete"));
        assert_eq!(membership.status, MembershipStatus::Active);
    }

    #[tokio::test]
    async fn test_activation_matches_a_null_step() {
        let (db, id) = seeded().await;
        let repo = MembershipRepository::new(db.pool().clone());
        sqlx::query("UPDATE memberships SET onboarding_step = NULL WHERE id = ?")
            .bind(&id)
            .execute(db.pool())
            .await
            .unwrap();

        assert!(repo.activate_from(&id, None, "pending_baseline").await.unwrap());
        let membership = repo.get(&id).await.unwrap().unwrap();
        assert_eq!(membership.onboarding_step.as_deref(), Some("pending_baseline"));
    }

    #[tokio::test]
    async fn test_vitals_kit_transition_is_conditional() {
        let (db, id) = seeded().await;
        let moved = MembershipRepository::transition_vitals_kit(
            db.pool(),
            &id,
            VitalsKitStatus::Requested,
            VitalsKitStatus::Shipped,
        )
        .await
        .unwrap();
        assert!(!moved);

        let moved = MembershipRepository::transition_vitals_kit(
            db.pool(),
            &id,
            VitalsKitStatus::NotRequested,
            VitalsKitStatus::Requested,
        )
        .await
        .unwrap();
        assert!(moved);
    }
}
