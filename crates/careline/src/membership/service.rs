//! Membership service: sign-up, administration, family members and
//! contact details.

use sqlx::SqlitePool;
use tracing::{debug, info, instrument, warn};

use super::models::{
    AddFamilyMemberRequest, Membership, MembershipListQuery, MembershipStatus, Person,
    RegisterRequest, RequestMembershipRequest, UpdateContactRequest, UpdateFamilyMemberRequest,
    VitalsKitStatus,
};
use super::repository::{MembershipRepository, NewPerson};
use crate::auth::Role;
use crate::error::{CareError, CareResult};
use crate::intake::{IntakeRepository, MedicalHistory, MedicalHistoryForm};
use crate::onboarding::engine;
use crate::user::{User, UserRepository, hash_password};
use crate::validate;

const ACTIVATE_ATTEMPTS: usize = 3;
const MEMBERSHIP_EXISTS: &str = "a membership already exists";
const HAS_CONSULTATIONS: &str = "a family member with consultations on record cannot be removed";

#[derive(Debug, Clone)]
pub struct MembershipService {
    pool: SqlitePool,
    repo: MembershipRepository,
    users: UserRepository,
}

impl MembershipService {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            repo: MembershipRepository::new(pool.clone()),
            users: UserRepository::new(pool.clone()),
            pool,
        }
    }

    /// Create a patient account with its membership and primary member.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn register(&self, request: RegisterRequest) -> CareResult<(User, Membership)> {
        let email = validate::email(&request.email)?;
        validate::password(&request.password)?;
        let first_name = validate::name("first_name", &request.first_name)?;
        let last_name = validate::name("last_name", &request.last_name)?;
        let display_name = match request.display_name.as_deref() {
            Some(name) if !name.trim().is_empty() => validate::name("display_name", name)?,
            _ => format!("{first_name} {last_name}"),
        };

        let taken = format!("Email '{email}' is already registered.");
        if !self.users.is_email_available(&email, None).await? {
            return Err(CareError::rejected(taken));
        }
        let password_hash = hash_password(&request.password)?;

        let user_id = UserRepository::generate_user_id();
        let membership_id = MembershipRepository::generate_membership_id();

        let mut tx = self.pool.begin().await?;
        UserRepository::insert(
            &mut tx,
            &user_id,
            &email,
            &password_hash,
            &display_name,
            Role::Patient,
        )
        .await
        .map_err(|e| CareError::on_unique_violation(e, taken))?;
        MembershipRepository::insert(&mut tx, &membership_id, &user_id, request.plan_type).await?;
        MembershipRepository::insert_person(
            &mut tx,
            &NewPerson {
                membership_id: &membership_id,
                first_name: &first_name,
                last_name: &last_name,
                date_of_birth: None,
                relationship: super::Relationship::Myself,
            },
        )
        .await?;
        tx.commit().await?;

        info!(user_id = %user_id, membership_id = %membership_id, "Registered member");

        let user = self
            .users
            .get(&user_id)
            .await?
            .ok_or_else(|| CareError::not_found("user"))?;
        let membership = self
            .repo
            .get(&membership_id)
            .await?
            .ok_or_else(|| CareError::not_found("membership"))?;
        Ok((user, membership))
    }

    /// Open a membership for an existing account that has none.
    #[instrument(skip(self, request))]
    pub async fn request_membership(
        &self,
        user_id: &str,
        request: RequestMembershipRequest,
    ) -> CareResult<Membership> {
        let first_name = validate::name("first_name", &request.first_name)?;
        let last_name = validate::name("last_name", &request.last_name)?;

        if self.users.get(user_id).await?.is_none() {
            return Err(CareError::not_found("user"));
        }

        let membership_id = MembershipRepository::generate_membership_id();
        let mut tx = self.pool.begin().await?;
        if MembershipRepository::find_by_user(&mut *tx, user_id)
            .await?
            .is_some()
        {
            return Err(CareError::rejected(MEMBERSHIP_EXISTS));
        }
        MembershipRepository::insert(&mut tx, &membership_id, user_id, request.plan_type)
            .await
            .map_err(|e| CareError::on_unique_violation(e, MEMBERSHIP_EXISTS))?;
        MembershipRepository::insert_person(
            &mut tx,
            &NewPerson {
                membership_id: &membership_id,
                first_name: &first_name,
                last_name: &last_name,
                date_of_birth: None,
                relationship: super::Relationship::Myself,
            },
        )
        .await?;
        tx.commit().await?;

        info!(membership_id = %membership_id, "Membership requested");
        self.repo
            .get(&membership_id)
            .await?
            .ok_or_else(|| CareError::not_found("membership"))
    }

    pub async fn get_for_user(&self, user_id: &str) -> CareResult<Membership> {
        self.repo
            .get_by_user(user_id)
            .await?
            .ok_or_else(|| CareError::not_found("membership"))
    }

    pub async fn list(&self, query: &MembershipListQuery) -> CareResult<Vec<Membership>> {
        Ok(self.repo.list(query).await?)
    }

    /// Approve a membership: status becomes active and a membership that
    /// has not begun intake moves to `pending_baseline`. The step write is
    /// conditional on the value read, so a member advancing at the same
    /// moment is never moved back.
    #[instrument(skip(self))]
    pub async fn activate(&self, id: &str) -> CareResult<Membership> {
        for _ in 0..ACTIVATE_ATTEMPTS {
            let membership = self
                .repo
                .get(id)
                .await?
                .ok_or_else(|| CareError::not_found("membership"))?;

            if membership.status == MembershipStatus::Cancelled {
                return Err(CareError::rejected("a cancelled membership cannot be activated"));
            }

            let step = engine::activate(membership.step());
            let expected = membership.onboarding_step.as_deref();
            if self.repo.activate_from(id, expected, step.as_str()).await? {
                info!(membership_id = %id, step = %step, "Membership activated");
                return self
                    .repo
                    .get(id)
                    .await?
                    .ok_or_else(|| CareError::not_found("membership"));
            }
            debug!(membership_id = %id, "onboarding step moved during activation; rereading");
        }

        Err(CareError::rejected(
            "onboarding step changed concurrently; reload and retry",
        ))
    }

    /// Advance the vitals kit shipping status. Only forward moves are allowed.
    #[instrument(skip(self))]
    pub async fn update_vitals_kit_status(
        &self,
        id: &str,
        status: VitalsKitStatus,
    ) -> CareResult<Membership> {
        let membership = self
            .repo
            .get(id)
            .await?
            .ok_or_else(|| CareError::not_found("membership"))?;

        let current = membership.vitals_kit_status;
        if !current.can_become(status) {
            return Err(CareError::rejected(format!(
                "vitals kit cannot move from {current} to {status}"
            )));
        }
        if !MembershipRepository::transition_vitals_kit(&self.pool, id, current, status).await? {
            return Err(CareError::rejected(
                "vitals kit status changed concurrently; reload and retry",
            ));
        }

        self.repo
            .get(id)
            .await?
            .ok_or_else(|| CareError::not_found("membership"))
    }

    // Family members

    async fn person_owned_by(&self, user_id: &str, person_id: &str) -> CareResult<Person> {
        let person = MembershipRepository::find_person(&self.pool, person_id)
            .await?
            .ok_or_else(|| CareError::not_found("person"))?;
        self.ensure_owner(user_id, &person).await?;
        Ok(person)
    }

    async fn ensure_owner(&self, user_id: &str, person: &Person) -> CareResult<()> {
        let membership = self.get_for_user(user_id).await?;
        if person.membership_id != membership.id {
            warn!(user_id, person_id = %person.id, "person belongs to another membership");
            return Err(CareError::unauthorized(
                "person is not covered by your membership",
            ));
        }
        Ok(())
    }

    pub async fn list_family(&self, user_id: &str) -> CareResult<Vec<Person>> {
        let membership = self.get_for_user(user_id).await?;
        Ok(self.repo.list_persons(&membership.id).await?)
    }

    #[instrument(skip(self, request))]
    pub async fn add_family_member(
        &self,
        user_id: &str,
        request: AddFamilyMemberRequest,
    ) -> CareResult<Person> {
        if request.relationship.is_self() {
            return Err(CareError::rejected(
                "a membership has exactly one primary member",
            ));
        }
        let first_name = validate::name("first_name", &request.first_name)?;
        let last_name = validate::name("last_name", &request.last_name)?;
        let date_of_birth = request
            .date_of_birth
            .as_deref()
            .map(validate::date_of_birth)
            .transpose()?;

        let membership = self.get_for_user(user_id).await?;
        let mut conn = self.pool.acquire().await?;
        let person_id = MembershipRepository::insert_person(
            &mut conn,
            &NewPerson {
                membership_id: &membership.id,
                first_name: &first_name,
                last_name: &last_name,
                date_of_birth: date_of_birth.as_deref(),
                relationship: request.relationship,
            },
        )
        .await?;
        drop(conn);

        info!(membership_id = %membership.id, person_id = %person_id, "Family member added");
        MembershipRepository::find_person(&self.pool, &person_id)
            .await?
            .ok_or_else(|| CareError::not_found("person"))
    }

    #[instrument(skip(self, request))]
    pub async fn update_family_member(
        &self,
        user_id: &str,
        person_id: &str,
        request: UpdateFamilyMemberRequest,
    ) -> CareResult<Person> {
        let person = self.person_owned_by(user_id, person_id).await?;

        if let Some(relationship) = request.relationship {
            if person.relationship.is_self() && !relationship.is_self() {
                return Err(CareError::rejected(
                    "the primary member's relationship cannot be changed",
                ));
            }
            if !person.relationship.is_self() && relationship.is_self() {
                return Err(CareError::rejected(
                    "a membership has exactly one primary member",
                ));
            }
        }

        let first_name = request
            .first_name
            .as_deref()
            .map(|v| validate::name("first_name", v))
            .transpose()?;
        let last_name = request
            .last_name
            .as_deref()
            .map(|v| validate::name("last_name", v))
            .transpose()?;
        let date_of_birth = request
            .date_of_birth
            .as_deref()
            .map(validate::date_of_birth)
            .transpose()?;
        let relationship = request.relationship.filter(|r| !r.is_self());

        MembershipRepository::update_person(
            &self.pool,
            &person.id,
            first_name.as_deref(),
            last_name.as_deref(),
            date_of_birth.as_deref(),
            relationship,
        )
        .await?;

        MembershipRepository::find_person(&self.pool, &person.id)
            .await?
            .ok_or_else(|| CareError::not_found("person"))
    }

    /// Remove a dependent. The primary member can never be removed, whoever
    /// asks, and neither can anyone with a consultation on record.
    #[instrument(skip(self))]
    pub async fn remove_family_member(&self, user_id: &str, person_id: &str) -> CareResult<()> {
        let person = MembershipRepository::find_person(&self.pool, person_id)
            .await?
            .ok_or_else(|| CareError::not_found("person"))?;
        if person.relationship.is_self() {
            return Err(CareError::rejected("the primary member cannot be removed"));
        }
        self.ensure_owner(user_id, &person).await?;

        if MembershipRepository::person_has_consultations(&self.pool, &person.id).await? {
            return Err(CareError::rejected(HAS_CONSULTATIONS));
        }
        let deleted = self
            .repo
            .delete_dependent(&person.id)
            .await
            .map_err(|e| CareError::on_foreign_key_violation(e, HAS_CONSULTATIONS))?;
        if !deleted {
            return Err(CareError::not_found("person"));
        }
        info!(person_id = %person.id, "Family member removed");
        Ok(())
    }

    /// Record medical history for a dependent and mark their intake done.
    #[instrument(skip(self, form))]
    pub async fn submit_dependent_history(
        &self,
        user_id: &str,
        person_id: &str,
        form: &MedicalHistoryForm,
    ) -> CareResult<MedicalHistory> {
        let person = self.person_owned_by(user_id, person_id).await?;
        if person.relationship.is_self() {
            return Err(CareError::rejected(
                "the primary member's history is collected during onboarding",
            ));
        }
        let form = form.validated()?;

        let mut tx = self.pool.begin().await?;
        IntakeRepository::upsert_medical_history(&mut tx, &person.id, &form).await?;
        MembershipRepository::mark_intake_complete(&mut *tx, &person.id).await?;
        tx.commit().await?;

        IntakeRepository::get_medical_history(&self.pool, &person.id)
            .await?
            .ok_or_else(|| CareError::not_found("medical history"))
    }

    // Contact details

    #[instrument(skip(self, request))]
    pub async fn update_contact(
        &self,
        user_id: &str,
        request: UpdateContactRequest,
    ) -> CareResult<User> {
        let email = request
            .email
            .as_deref()
            .map(validate::email)
            .transpose()?;
        let phone = request
            .phone
            .as_deref()
            .map(validate::phone)
            .transpose()?;

        let taken = email
            .as_deref()
            .map(|email| format!("Email '{email}' is already registered."))
            .unwrap_or_default();
        if let Some(email) = &email {
            if !self.users.is_email_available(email, Some(user_id)).await? {
                return Err(CareError::rejected(taken));
            }
        }

        if !self
            .users
            .update_contact(user_id, email.as_deref(), phone.as_deref())
            .await
            .map_err(|e| CareError::on_unique_violation(e, taken))?
        {
            return Err(CareError::not_found("user"));
        }

        self.users
            .get(user_id)
            .await?
            .ok_or_else(|| CareError::not_found("user"))
    }
}
