//! Intake stages filled out during onboarding.

mod models;
mod repository;
mod service;

pub use models::*;
pub use repository::IntakeRepository;
pub use service::IntakeService;
