//! User service for credential checks and staff accounts.

use anyhow::{Context, Result};
use tracing::{info, instrument};

use super::models::{CreateUserRequest, User};
use super::repository::UserRepository;
use crate::error::{CareError, CareResult};
use crate::validate;

/// Service for user account operations.
#[derive(Debug, Clone)]
pub struct UserService {
    repo: UserRepository,
}

impl UserService {
    /// Create a new user service.
    pub fn new(repo: UserRepository) -> Self {
        Self { repo }
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: &str) -> CareResult<User> {
        self.repo
            .get(id)
            .await?
            .ok_or_else(|| CareError::not_found("user"))
    }

    /// Check an email/password pair, recording the login on success.
    #[instrument(skip(self, password))]
    pub async fn verify_credentials(&self, email: &str, password: &str) -> Result<Option<User>> {
        let user = self.repo.get_by_email(email.trim()).await?;

        match user {
            Some(user) if user.is_active => {
                if let Some(hash) = &user.password_hash {
                    if verify_password(password, hash)? {
                        self.repo.update_last_login(&user.id).await?;
                        return Ok(Some(user));
                    }
                }
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    /// Create a clinician or admin account.
    #[instrument(skip(self, request), fields(email = %request.email, role = %request.role))]
    pub async fn create_staff(&self, request: CreateUserRequest) -> CareResult<User> {
        let email = validate::email(&request.email)?;
        validate::password(&request.password)?;
        let display_name = validate::name("display_name", &request.display_name)?;

        if !self.repo.is_email_available(&email, None).await? {
            return Err(CareError::rejected(format!(
                "Email '{}' is already registered.",
                email
            )));
        }

        let hash = hash_password(&request.password)?;
        let user = self
            .repo
            .create(&email, &hash, &display_name, request.role)
            .await?;
        info!(user_id = %user.id, role = %user.role, "Created staff user");

        Ok(user)
    }

    pub async fn list_staff(&self) -> CareResult<Vec<User>> {
        Ok(self.repo.list_staff().await?)
    }
}

/// Hash a password using bcrypt.
pub fn hash_password(password: &str) -> Result<String> {
    // Use a lower cost factor for development speed
    let cost = if cfg!(debug_assertions) { 4 } else { 10 };
    bcrypt::hash(password, cost).context("Failed to hash password")
}

/// Verify a password against a bcrypt hash.
fn verify_password(password: &str, hash: &str) -> Result<bool> {
    bcrypt::verify(password, hash).context("Failed to verify password")
}
