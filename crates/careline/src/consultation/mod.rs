//! Consultation requests raised by members and worked by clinicians.

mod models;
mod repository;
mod service;

pub use models::*;
pub use repository::ConsultationRepository;
pub use service::ConsultationService;
