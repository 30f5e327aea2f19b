//! Memberships, the people they cover, and account contact details.

mod models;
mod repository;
mod service;

pub use models::*;
pub use repository::{MembershipRepository, NewPerson};
pub use service::MembershipService;
