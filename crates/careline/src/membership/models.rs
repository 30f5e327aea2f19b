//! Membership data models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::db::sqlite_text_enum;
use crate::onboarding::OnboardingStep;

/// Billing plan of a membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlanType {
    #[default]
    Individual,
    Couple,
    Family,
}

impl PlanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanType::Individual => "individual",
            PlanType::Couple => "couple",
            PlanType::Family => "family",
        }
    }
}

impl std::fmt::Display for PlanType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PlanType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "individual" => Ok(PlanType::Individual),
            "couple" => Ok(PlanType::Couple),
            "family" => Ok(PlanType::Family),
            _ => Err(format!("Invalid plan type: {}", s)),
        }
    }
}

sqlite_text_enum!(PlanType);

/// Administrative status of a membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    #[default]
    PendingReview,
    Active,
    Paused,
    Cancelled,
}

impl MembershipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipStatus::PendingReview => "pending_review",
            MembershipStatus::Active => "active",
            MembershipStatus::Paused => "paused",
            MembershipStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for MembershipStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MembershipStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending_review" => Ok(MembershipStatus::PendingReview),
            "active" => Ok(MembershipStatus::Active),
            "paused" => Ok(MembershipStatus::Paused),
            "cancelled" => Ok(MembershipStatus::Cancelled),
            _ => Err(format!("Invalid membership status: {}", s)),
        }
    }
}

sqlite_text_enum!(MembershipStatus);

/// Shipping state of the at-home vitals kit.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum VitalsKitStatus {
    #[default]
    NotRequested,
    Requested,
    Shipped,
    Delivered,
    Returned,
}

impl VitalsKitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VitalsKitStatus::NotRequested => "not_requested",
            VitalsKitStatus::Requested => "requested",
            VitalsKitStatus::Shipped => "shipped",
            VitalsKitStatus::Delivered => "delivered",
            VitalsKitStatus::Returned => "returned",
        }
    }

    /// Kit status only moves forward.
    pub fn can_become(&self, next: VitalsKitStatus) -> bool {
        next > *self
    }
}

impl std::fmt::Display for VitalsKitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for VitalsKitStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "not_requested" => Ok(VitalsKitStatus::NotRequested),
            "requested" => Ok(VitalsKitStatus::Requested),
            "shipped" => Ok(VitalsKitStatus::Shipped),
            "delivered" => Ok(VitalsKitStatus::Delivered),
            "returned" => Ok(VitalsKitStatus::Returned),
            _ => Err(format!("Invalid vitals kit status: {}", s)),
        }
    }
}

sqlite_text_enum!(VitalsKitStatus);

/// How a covered person relates to the member who owns the membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    #[serde(rename = "self")]
    Myself,
    Spouse,
    Partner,
    Child,
    Parent,
    Sibling,
    Grandparent,
    Grandchild,
    Other,
}

impl Relationship {
    pub fn as_str(&self) -> &'static str {
        match self {
            Relationship::Myself => "self",
            Relationship::Spouse => "spouse",
            Relationship::Partner => "partner",
            Relationship::Child => "child",
            Relationship::Parent => "parent",
            Relationship::Sibling => "sibling",
            Relationship::Grandparent => "grandparent",
            Relationship::Grandchild => "grandchild",
            Relationship::Other => "other",
        }
    }

    pub fn is_self(&self) -> bool {
        matches!(self, Relationship::Myself)
    }
}

impl std::fmt::Display for Relationship {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Relationship {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "self" => Ok(Relationship::Myself),
            "spouse" => Ok(Relationship::Spouse),
            "partner" => Ok(Relationship::Partner),
            "child" => Ok(Relationship::Child),
            "parent" => Ok(Relationship::Parent),
            "sibling" => Ok(Relationship::Sibling),
            "grandparent" => Ok(Relationship::Grandparent),
            "grandchild" => Ok(Relationship::Grandchild),
            "other" => Ok(Relationship::Other),
            _ => Err(format!("Invalid relationship: {}", s)),
        }
    }
}

sqlite_text_enum!(Relationship);

/// Membership entity from database.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Membership {
    pub id: String,
    pub user_id: String,
    pub plan_type: PlanType,
    pub status: MembershipStatus,
    /// Raw column value. Use [`Membership::step`] for the interpreted step.
    #[serde(skip_serializing)]
    pub onboarding_step: Option<String>,
    pub vitals_kit_status: VitalsKitStatus,
    pub created_at: String,
    pub updated_at: String,
}

impl Membership {
    pub fn step(&self) -> OnboardingStep {
        OnboardingStep::from_stored(self.onboarding_step.as_deref())
    }
}

/// Membership as returned to clients.
#[derive(Debug, Clone, Serialize)]
pub struct MembershipInfo {
    pub id: String,
    pub user_id: String,
    pub plan_type: PlanType,
    pub status: MembershipStatus,
    pub onboarding_step: OnboardingStep,
    pub vitals_kit_status: VitalsKitStatus,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Membership> for MembershipInfo {
    fn from(membership: Membership) -> Self {
        let onboarding_step = membership.step();
        Self {
            id: membership.id,
            user_id: membership.user_id,
            plan_type: membership.plan_type,
            status: membership.status,
            onboarding_step,
            vitals_kit_status: membership.vitals_kit_status,
            created_at: membership.created_at,
            updated_at: membership.updated_at,
        }
    }
}

/// A person covered by a membership.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Person {
    pub id: String,
    pub membership_id: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<String>,
    pub relationship: Relationship,
    pub intake_complete: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Emergency contact attached to a membership.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct EmergencyContact {
    pub id: String,
    pub membership_id: String,
    pub name: String,
    pub relationship: String,
    pub phone: String,
    pub email: Option<String>,
    pub created_at: String,
}

/// Self-service sign-up: account, membership and primary member at once.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    /// Defaults to "first_name last_name".
    #[serde(default)]
    pub display_name: Option<String>,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub plan_type: PlanType,
}

/// Request to open a membership for an already authenticated user.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestMembershipRequest {
    #[serde(default)]
    pub plan_type: PlanType,
    pub first_name: String,
    pub last_name: String,
}

/// Request to add a dependent to a membership.
#[derive(Debug, Clone, Deserialize)]
pub struct AddFamilyMemberRequest {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<String>,
    pub relationship: Relationship,
}

/// Request to edit a covered person. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateFamilyMemberRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<String>,
    pub relationship: Option<Relationship>,
}

/// Request to change the account's contact details.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateContactRequest {
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Query parameters for listing memberships.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MembershipListQuery {
    pub status: Option<MembershipStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
