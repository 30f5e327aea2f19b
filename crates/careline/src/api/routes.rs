//! API route definitions.

use axum::http::{HeaderValue, Method, header};
use axum::{
    Router, middleware,
    routing::{get, post, put},
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::auth::auth_middleware;

use super::handlers;
use super::state::AppState;

const DEV_ORIGINS: [&str; 4] = [
    "http://localhost:3000",
    "http://localhost:5173",
    "http://127.0.0.1:3000",
    "http://127.0.0.1:5173",
];

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer(&state);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let auth_state = state.auth.clone();

    // Protected routes (require authentication)
    let protected_routes = Router::new()
        // Account
        .route("/me", get(handlers::get_me))
        .route("/me/contact", put(handlers::update_contact))
        // Landing and onboarding
        .route("/home", get(handlers::home))
        .route("/onboarding", get(handlers::get_onboarding))
        .route(
            "/membership",
            get(handlers::get_membership).post(handlers::request_membership),
        )
        // Intake stages
        .route(
            "/intake/baseline",
            get(handlers::get_baseline).post(handlers::submit_baseline),
        )
        .route(
            "/intake/emergency-contacts",
            get(handlers::get_emergency_contacts).post(handlers::submit_emergency_contacts),
        )
        .route(
            "/intake/medical-history",
            get(handlers::get_medical_history).post(handlers::submit_medical_history),
        )
        .route(
            "/intake/vitals-kit",
            get(handlers::get_vitals_kit).post(handlers::submit_vitals_kit),
        )
        // Family members
        .route(
            "/family",
            get(handlers::list_family).post(handlers::add_family_member),
        )
        .route(
            "/family/{person_id}",
            put(handlers::update_family_member).delete(handlers::remove_family_member),
        )
        .route(
            "/family/{person_id}/medical-history",
            post(handlers::submit_dependent_history),
        )
        // Consultations
        .route(
            "/consultations",
            get(handlers::list_consultations).post(handlers::create_consultation),
        )
        .route("/consultations/{id}", get(handlers::get_consultation))
        .route(
            "/consultations/{id}/cancel",
            post(handlers::cancel_consultation),
        )
        // Clinician queue
        .route("/clinician/consultations", get(handlers::clinician_queue))
        .route(
            "/clinician/consultations/{id}/claim",
            post(handlers::claim_consultation),
        )
        .route(
            "/clinician/consultations/{id}/complete",
            post(handlers::complete_consultation),
        )
        // Administration
        .route("/admin/memberships", get(handlers::list_memberships))
        .route(
            "/admin/memberships/{id}/activate",
            post(handlers::activate_membership),
        )
        .route(
            "/admin/memberships/{id}/vitals-kit",
            put(handlers::update_vitals_kit),
        )
        .layer(middleware::from_fn_with_state(auth_state, auth_middleware))
        .with_state(state.clone());

    // Public routes (no authentication)
    let public_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/auth/login", post(handlers::login))
        .route("/auth/register", post(handlers::register))
        .route("/auth/logout", post(handlers::logout))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors)
        .layer(trace_layer)
}

/// Build the CORS layer based on configuration.
///
/// In dev mode localhost origins are always allowed. In production only
/// configured origins are, and none at all when the list is empty.
fn build_cors_layer(state: &AppState) -> CorsLayer {
    let allowed_origins = state.auth.allowed_origins();
    let dev_mode = state.auth.is_dev_mode();

    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ];

    let headers = [
        header::AUTHORIZATION,
        header::CONTENT_TYPE,
        header::ACCEPT,
        header::ORIGIN,
        header::COOKIE,
        header::HeaderName::from_static("x-dev-user"),
    ];

    let mut origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!("CORS: Invalid origin in config: {}", origin);
                None
            })
        })
        .collect();

    if dev_mode {
        for origin in DEV_ORIGINS {
            let value = HeaderValue::from_static(origin);
            if !origins.contains(&value) {
                origins.push(value);
            }
        }
    }

    if origins.is_empty() {
        tracing::warn!(
            "CORS: No valid origins configured in production mode, denying all cross-origin requests"
        );
        return CorsLayer::new().allow_origin(AllowOrigin::exact(HeaderValue::from_static("null")));
    }

    tracing::info!("CORS: Allowing {} origin(s)", origins.len());
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(methods)
        .allow_headers(headers)
        .allow_credentials(true)
}
