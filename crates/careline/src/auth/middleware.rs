//! Session tokens, the request authentication layer and capability extractors.

use std::borrow::Cow;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{
        HeaderMap, Request,
        header::{AUTHORIZATION, COOKIE},
        request::Parts,
    },
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use log::{debug, warn};

use super::{AuthConfig, AuthError, Capability, Claims, DevUser, Role};
use crate::user::UserRepository;

/// Name of the session cookie set at login.
pub const AUTH_COOKIE: &str = "auth_token";

const DEV_USER_HEADER: &str = "x-dev-user";
const DEV_TOKEN_PREFIX: &str = "dev:";

/// Credentials found on a request, in the order they are honoured.
#[derive(Debug, PartialEq, Eq)]
enum Credential<'a> {
    Token(Cow<'a, str>),
    DevUser(&'a str),
}

/// `Authorization: Bearer`, then the session cookie, then `?token=`, then
/// `X-Dev-User`. A malformed Authorization header is an error rather than a
/// fall-through.
fn find_credential<'a>(
    headers: &'a HeaderMap,
    query: Option<&'a str>,
) -> Result<Option<Credential<'a>>, AuthError> {
    let header = move |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    if let Some(value) = header(AUTHORIZATION.as_str()) {
        return bearer_token(value).map(|t| Some(Credential::Token(Cow::Borrowed(t))));
    }
    if let Some(token) = header(COOKIE.as_str()).and_then(|c| cookie_value(c, AUTH_COOKIE)) {
        return Ok(Some(Credential::Token(Cow::Borrowed(token))));
    }
    if let Some(token) = query.and_then(query_token) {
        return Ok(Some(Credential::Token(token)));
    }
    Ok(header(DEV_USER_HEADER).map(Credential::DevUser))
}

fn bearer_token(value: &str) -> Result<&str, AuthError> {
    let mut words = value.split_whitespace();
    match (words.next(), words.next(), words.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => Ok(token),
        _ => Err(AuthError::InvalidAuthHeader),
    }
}

fn cookie_value<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header
        .split(';')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

fn query_token(query: &str) -> Option<Cow<'_, str>> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "token")
        .and_then(|(_, value)| urlencoding::decode(value).ok())
        .filter(|value| !value.is_empty())
}

/// Token issuing and verification, shared by the router and handlers.
#[derive(Clone)]
pub struct AuthState {
    config: Arc<AuthConfig>,
    keys: Option<Arc<(EncodingKey, DecodingKey)>>,
    users: Option<UserRepository>,
}

impl AuthState {
    /// `env:VAR_NAME` secrets are resolved once, here.
    pub fn new(mut config: AuthConfig) -> Self {
        if let Ok(Some(resolved)) = config.resolve_jwt_secret() {
            config.jwt_secret = Some(resolved);
        }

        let keys = config.jwt_secret.as_deref().map(|secret| {
            Arc::new((
                EncodingKey::from_secret(secret.as_bytes()),
                DecodingKey::from_secret(secret.as_bytes()),
            ))
        });

        Self {
            config: Arc::new(config),
            keys,
            users: None,
        }
    }

    /// Check database accounts on every request, so deactivation takes
    /// effect before the token expires.
    pub fn with_user_store(mut self, users: UserRepository) -> Self {
        self.users = Some(users);
        self
    }

    pub fn is_dev_mode(&self) -> bool {
        self.config.dev_mode
    }

    pub fn allowed_origins(&self) -> &[String] {
        &self.config.allowed_origins
    }

    /// Session lifetime in seconds.
    pub fn token_ttl_secs(&self) -> i64 {
        self.config.token_ttl_hours * 3600
    }

    fn keys(&self) -> Result<&(EncodingKey, DecodingKey), AuthError> {
        self.keys
            .as_deref()
            .ok_or_else(|| AuthError::Internal("no JWT secret configured".to_string()))
    }

    fn dev_user(&self, id: &str) -> Option<&DevUser> {
        if !self.config.dev_mode {
            return None;
        }
        self.config.dev_users.iter().find(|u| u.id == id)
    }

    /// Match a dev user by id or email (dev mode only).
    pub fn validate_dev_credentials(&self, login: &str, password: &str) -> Option<&DevUser> {
        if !self.config.dev_mode {
            return None;
        }
        self.config
            .dev_users
            .iter()
            .find(|u| (u.id == login || u.email == login) && u.verify_password(password))
    }

    fn claims(&self, issuer: &str, id: &str, email: &str, name: &str, role: Role) -> Claims {
        let now = Utc::now().timestamp();
        Claims {
            sub: id.to_string(),
            iss: Some(issuer.to_string()),
            exp: now + self.token_ttl_secs(),
            iat: Some(now),
            email: Some(email.to_string()),
            name: Some(name.to_string()),
            role: Some(role.to_string()),
        }
    }

    fn dev_claims(&self, id: &str) -> Result<Claims, AuthError> {
        let user = self.dev_user(id).ok_or(AuthError::UserNotFound)?;
        Ok(self.claims("dev", &user.id, &user.email, &user.name, user.role))
    }

    /// Verify a session token. In dev mode `dev:<id>` names a dev user.
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        if let Some(id) = token.strip_prefix(DEV_TOKEN_PREFIX).filter(|_| self.is_dev_mode()) {
            return self.dev_claims(id);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_nbf = false;
        validation.required_spec_claims.clear();

        decode::<Claims>(token, &self.keys()?.1, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                warn!("Rejected session token: {e}");
                match e.kind() {
                    ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                    _ => AuthError::InvalidToken(e.to_string()),
                }
            })
    }

    /// Dev users live in config; everyone else must still be an active row.
    async fn ensure_active(&self, claims: &Claims) -> Result<(), AuthError> {
        let Some(users) = &self.users else {
            return Ok(());
        };
        if self.dev_user(&claims.sub).is_some() {
            return Ok(());
        }

        match users.get(&claims.sub).await {
            Ok(Some(user)) if user.is_active => Ok(()),
            Ok(Some(_)) => Err(AuthError::AccountDisabled),
            Ok(None) => Err(AuthError::UserNotFound),
            Err(e) => Err(AuthError::Internal(format!("{e:#}"))),
        }
    }

    /// Issue a signed session token.
    pub fn generate_token(
        &self,
        user_id: &str,
        email: &str,
        name: &str,
        role: Role,
    ) -> Result<String, AuthError> {
        let claims = self.claims("careline", user_id, email, name, role);
        encode(&Header::default(), &claims, &self.keys()?.0)
            .map_err(|e| AuthError::Internal(e.to_string()))
    }
}

/// The authenticated caller, inserted by [`auth_middleware`].
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub claims: Claims,
}

impl CurrentUser {
    pub fn id(&self) -> &str {
        &self.claims.sub
    }

    pub fn role(&self) -> Role {
        self.claims.effective_role()
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.role().has(capability)
    }

    /// Fail with 403 unless the caller holds `capability`.
    pub fn require(&self, capability: Capability) -> Result<(), AuthError> {
        if self.can(capability) {
            Ok(())
        } else {
            Err(AuthError::MissingCapability(capability))
        }
    }

    pub fn display_name(&self) -> &str {
        self.claims.display_name()
    }

    fn from_parts(parts: &Parts) -> Result<Self, AuthError> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(AuthError::MissingAuthHeader)
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Self::from_parts(parts)
    }
}

/// Resolve the caller and insert a [`CurrentUser`] before the handler runs.
pub async fn auth_middleware(
    State(auth): State<AuthState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let claims = match find_credential(req.headers(), req.uri().query())? {
        Some(Credential::Token(token)) => auth.validate_token(&token)?,
        Some(Credential::DevUser(id)) if auth.is_dev_mode() => {
            debug!("Using dev user: {id}");
            auth.dev_claims(id)?
        }
        _ => return Err(AuthError::MissingAuthHeader),
    };
    auth.ensure_active(&claims).await?;

    req.extensions_mut().insert(CurrentUser { claims });
    Ok(next.run(req).await)
}

macro_rules! capability_extractor {
    ($(#[$doc:meta])* $name:ident => $capability:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone)]
        pub struct $name(pub CurrentUser);

        impl<S> FromRequestParts<S> for $name
        where
            S: Send + Sync,
        {
            type Rejection = AuthError;

            async fn from_request_parts(
                parts: &mut Parts,
                _state: &S,
            ) -> Result<Self, Self::Rejection> {
                let user = CurrentUser::from_parts(parts)?;
                user.require(Capability::$capability)?;
                Ok(Self(user))
            }
        }
    };
}

capability_extractor! {
    /// Caller managing their own membership (patients).
    RequireMember => ManageOwnMembership
}

capability_extractor! {
    /// Caller requesting consultations for people on their membership.
    RequireConsultationAccess => RequestConsultation
}

capability_extractor! {
    /// Caller allowed to work the consultation queue.
    RequireClinician => ReviewConsultations
}

capability_extractor! {
    /// Caller allowed to administer memberships.
    RequireAdmin => ManageMemberships
}
