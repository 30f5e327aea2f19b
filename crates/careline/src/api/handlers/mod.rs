//! API request handlers.
//!
//! This module contains all HTTP request handlers, organized by domain:
//! - `auth`: Login, registration and logout
//! - `onboarding`: Landing redirect, onboarding progress, membership
//! - `intake`: The four onboarding forms
//! - `family`: Persons covered by a membership
//! - `consultations`: Member requests and the clinician queue
//! - `admin`: Membership administration
//! - `misc`: Health check and account details

mod admin;
mod auth;
mod consultations;
mod family;
mod intake;
mod misc;
mod onboarding;

pub use admin::{activate_membership, list_memberships, update_vitals_kit};
pub use auth::{login, logout, register};
pub use consultations::{
    cancel_consultation, claim_consultation, clinician_queue, complete_consultation,
    create_consultation, get_consultation, list_consultations,
};
pub use family::{
    add_family_member, list_family, remove_family_member, submit_dependent_history,
    update_family_member,
};
pub use intake::{
    get_baseline, get_emergency_contacts, get_medical_history, get_vitals_kit, submit_baseline,
    submit_emergency_contacts, submit_medical_history, submit_vitals_kit,
};
pub use misc::{get_me, health, update_contact};
pub use onboarding::{get_membership, get_onboarding, home, request_membership};
