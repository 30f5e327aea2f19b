//! Careline membership and intake backend.
//!
//! Members sign up, are reviewed by an admin, then walk through four intake
//! forms in a fixed order. The order is enforced server-side by
//! [`onboarding`]; everything else is conventional CRUD around it.

pub mod api;
pub mod auth;
pub mod config;
pub mod consultation;
pub mod db;
pub mod error;
pub mod intake;
pub mod membership;
pub mod notify;
pub mod onboarding;
pub mod user;
pub mod validate;
