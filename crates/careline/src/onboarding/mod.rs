//! Membership onboarding progression.
//!
//! - Step sequence and routing destinations (`models`)
//! - The transition table every intake stage goes through (`engine`)
//! - Progress lookup, sequence guard and conditional step writes (`service`)

pub mod engine;
mod models;
mod service;

pub use models::*;
pub use service::{OnboardingService, progress_of};
