//! Application state shared across handlers.
//!
//! Only cheap handles live here. Services are built per request from the
//! pool, so no handler shares a client instance with another.

use std::sync::Arc;

use crate::auth::AuthState;
use crate::consultation::ConsultationService;
use crate::db::Database;
use crate::intake::IntakeService;
use crate::membership::MembershipService;
use crate::notify::{LogNotifier, Notifier};
use crate::onboarding::OnboardingService;
use crate::user::{UserRepository, UserService};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: Database,
    /// Authentication state.
    pub auth: AuthState,
    /// Care team notification sink.
    pub notifier: Arc<dyn Notifier>,
}

impl AppState {
    /// Create new application state that logs notifications.
    pub fn new(db: Database, auth: AuthState) -> Self {
        let auth = auth.with_user_store(UserRepository::new(db.pool().clone()));
        Self {
            db,
            auth,
            notifier: Arc::new(LogNotifier),
        }
    }

    /// Replace the notification sink.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn users(&self) -> UserService {
        UserService::new(UserRepository::new(self.db.pool().clone()))
    }

    pub fn memberships(&self) -> MembershipService {
        MembershipService::new(self.db.pool().clone())
    }

    pub fn onboarding(&self) -> OnboardingService {
        OnboardingService::new(self.db.pool().clone())
    }

    pub fn intake(&self) -> IntakeService {
        IntakeService::new(self.db.pool().clone())
    }

    pub fn consultations(&self) -> ConsultationService {
        ConsultationService::new(self.db.pool().clone(), self.notifier.clone())
    }
}
