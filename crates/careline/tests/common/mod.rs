//! Test utilities and common setup.
#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use careline::api::{self, AppState};
use careline::auth::{AuthConfig, AuthState, DevUser, Role};
use careline::db::Database;
use careline::notify::Notifier;
use serde_json::{Value, json};
use tower::ServiceExt;

pub const ADMIN: &str = "ops";
pub const CLINICIAN: &str = "nurse";

fn make_dev_user(id: &str, name: &str, password: &str, role: Role) -> DevUser {
    DevUser {
        id: id.to_string(),
        name: name.to_string(),
        email: format!("{id}@localhost"),
        password_hash: bcrypt::hash(password, 4).expect("Failed to hash password"),
        role,
    }
}

/// Dev-mode auth with one admin and one clinician living only in config.
fn test_auth_config() -> AuthConfig {
    AuthConfig {
        dev_mode: true,
        jwt_secret: Some("test-secret-for-integration-tests-minimum-32-chars".to_string()),
        dev_users: vec![
            make_dev_user(ADMIN, "Operations", "opspassword123", Role::Admin),
            make_dev_user(CLINICIAN, "Nurse Joy", "nursepassword123", Role::Clinician),
        ],
        ..AuthConfig::default()
    }
}

pub async fn test_state() -> AppState {
    let db = Database::in_memory()
        .await
        .expect("Failed to create test database");
    AppState::new(db, AuthState::new(test_auth_config()))
}

pub async fn test_app() -> Router {
    api::create_router(test_state().await)
}

pub async fn test_app_with_notifier(notifier: Arc<dyn Notifier>) -> Router {
    api::create_router(test_state().await.with_notifier(notifier))
}

/// How a request authenticates.
#[derive(Debug, Clone, Copy)]
pub enum As<'a> {
    Anonymous,
    Bearer(&'a str),
    DevUser(&'a str),
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(header::LOCATION)
            .and_then(|h| h.to_str().ok())
    }
}

pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    who: As<'_>,
    body: Option<Value>,
) -> TestResponse {
    let mut builder = Request::builder().uri(uri).method(method);
    builder = match who {
        As::Anonymous => builder,
        As::Bearer(token) => builder.header(header::AUTHORIZATION, format!("Bearer {token}")),
        As::DevUser(id) => builder.header("X-Dev-User", id),
    };
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };

    TestResponse {
        status,
        headers,
        body,
    }
}

/// A freshly registered patient.
pub struct Patient {
    pub token: String,
    pub user_id: String,
    pub membership_id: String,
}

pub async fn register_patient(app: &Router, email: &str) -> Patient {
    let response = send(
        app,
        Method::POST,
        "/auth/register",
        As::Anonymous,
        Some(json!({
            "email": email,
            "password": "correct-horse-battery",
            "first_name": "Ada",
            "last_name": "Lovelace",
            "plan_type": "family"
        })),
    )
    .await;
    assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);

    Patient {
        token: response.body["token"].as_str().unwrap().to_string(),
        user_id: response.body["user"]["id"].as_str().unwrap().to_string(),
        membership_id: response.body["membership"]["id"]
            .as_str()
            .unwrap()
            .to_string(),
    }
}

pub fn baseline_form() -> Value {
    json!({
        "first_name": "Ada",
        "last_name": "Lovelace",
        "date_of_birth": "1985-12-10",
        "sex": "female",
        "phone": "(555) 123-4567",
        "height_cm": 168.0
    })
}

pub fn emergency_contacts_form() -> Value {
    json!({
        "contacts": [
            { "name": "Charles Babbage", "relationship": "Friend", "phone": "555-987-6543" }
        ]
    })
}

pub fn medical_history_form() -> Value {
    json!({
        "conditions": ["asthma"],
        "medications": ["salbutamol"],
        "allergies": [],
        "surgeries": []
    })
}

pub fn vitals_kit_form() -> Value {
    json!({
        "address_line1": "12 Analytical Way",
        "city": "London",
        "region": "Greater London",
        "postal_code": "nw1 6xe",
        "consent": true
    })
}

/// Id of the patient's own person record.
pub async fn self_person_id(app: &Router, patient: &Patient) -> String {
    let response = send(app, Method::GET, "/family", As::Bearer(&patient.token), None).await;
    assert_eq!(response.status, StatusCode::OK);
    response.body
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["relationship"] == "self")
        .and_then(|p| p["id"].as_str())
        .unwrap()
        .to_string()
}
