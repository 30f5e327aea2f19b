//! API integration tests.

use axum::http::{Method, StatusCode, header};
use careline::api;
use serde_json::json;

mod common;
use common::{
    ADMIN, As, CLINICIAN, baseline_form, emergency_contacts_form, medical_history_form,
    register_patient, self_person_id, send, test_app, test_state, vitals_kit_form,
};

#[tokio::test]
async fn test_health_endpoint() {
    let app = test_app().await;

    let response = send(&app, Method::GET, "/health", As::Anonymous, None).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
    assert!(response.body["version"].is_string());
}

#[tokio::test]
async fn test_protected_routes_require_auth() {
    let app = test_app().await;

    for uri in ["/me", "/onboarding", "/family", "/consultations", "/admin/memberships"] {
        let response = send(&app, Method::GET, uri, As::Anonymous, None).await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED, "{uri}");
    }

    let response = send(&app, Method::GET, "/me", As::Bearer("not-a-jwt"), None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_sets_cookie_and_lands_on_baseline() {
    let app = test_app().await;

    let response = send(
        &app,
        Method::POST,
        "/auth/register",
        As::Anonymous,
        Some(json!({
            "email": "Grace@Example.com",
            "password": "correct-horse-battery",
            "first_name": "Grace",
            "last_name": "Hopper"
        })),
    )
    .await;

    assert_eq!(response.status, StatusCode::CREATED);
    let cookie = response
        .headers
        .get(header::SET_COOKIE)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default();
    assert!(cookie.contains("auth_token="));
    assert!(cookie.contains("HttpOnly"));
    assert_eq!(response.body["user"]["email"], "grace@example.com");
    assert_eq!(response.body["user"]["role"], "patient");
    assert_eq!(response.body["membership"]["status"], "pending_review");
    assert_eq!(response.body["landing"], "/intake/baseline");
}

#[tokio::test]
async fn test_register_duplicate_email_conflicts() {
    let app = test_app().await;
    register_patient(&app, "ada@example.com").await;

    let response = send(
        &app,
        Method::POST,
        "/auth/register",
        As::Anonymous,
        Some(json!({
            "email": "ada@example.com",
            "password": "another-password",
            "first_name": "Ada",
            "last_name": "Byron"
        })),
    )
    .await;

    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.body["code"], "CONFLICT");
}

#[tokio::test]
async fn test_register_rejects_short_password() {
    let app = test_app().await;

    let response = send(
        &app,
        Method::POST,
        "/auth/register",
        As::Anonymous,
        Some(json!({
            "email": "ada@example.com",
            "password": "short",
            "first_name": "Ada",
            "last_name": "Lovelace"
        })),
    )
    .await;

    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.body["code"], "VALIDATION_FAILED");
}

#[tokio::test]
async fn test_login_database_user_and_dev_user() {
    let app = test_app().await;
    let patient = register_patient(&app, "ada@example.com").await;

    let response = send(
        &app,
        Method::POST,
        "/auth/login",
        As::Anonymous,
        Some(json!({ "email": "ada@example.com", "password": "correct-horse-battery" })),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["user"]["id"], patient.user_id.as_str());
    assert_eq!(response.body["landing"], "/intake/baseline");

    let response = send(
        &app,
        Method::POST,
        "/auth/login",
        As::Anonymous,
        Some(json!({ "username": CLINICIAN, "password": "nursepassword123" })),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["user"]["role"], "clinician");
    assert_eq!(response.body["landing"], "/clinician");

    let response = send(
        &app,
        Method::POST,
        "/auth/login",
        As::Anonymous,
        Some(json!({ "email": "ada@example.com", "password": "wrong-password" })),
    )
    .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_issued_token_authenticates() {
    let app = test_app().await;
    let patient = register_patient(&app, "ada@example.com").await;

    let response = send(&app, Method::GET, "/me", As::Bearer(&patient.token), None).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["id"], patient.user_id.as_str());
    assert_eq!(response.body["display_name"], "Ada Lovelace");
}

#[tokio::test]
async fn test_deactivated_account_loses_access() {
    let state = test_state().await;
    let pool = state.db.pool().clone();
    let app = api::create_router(state);
    let patient = register_patient(&app, "ada@example.com").await;

    let response = send(&app, Method::GET, "/me", As::Bearer(&patient.token), None).await;
    assert_eq!(response.status, StatusCode::OK);

    sqlx::query("UPDATE users SET is_active = FALSE WHERE id = ?")
        .bind(&patient.user_id)
        .execute(&pool)
        .await
        .unwrap();

    let response = send(&app, Method::GET, "/me", As::Bearer(&patient.token), None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["error_code"], "account_disabled");

    // Config-only staff have no row and are unaffected.
    let response = send(&app, Method::GET, "/me", As::DevUser(CLINICIAN), None).await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_logout_clears_cookie() {
    let app = test_app().await;

    let response = send(&app, Method::POST, "/auth/logout", As::Anonymous, None).await;

    assert_eq!(response.status, StatusCode::NO_CONTENT);
    let cookie = response
        .headers
        .get(header::SET_COOKIE)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default();
    assert!(cookie.contains("Max-Age=0"));
}

#[tokio::test]
async fn test_home_redirects_by_role_and_step() {
    let app = test_app().await;
    let patient = register_patient(&app, "ada@example.com").await;

    let response = send(&app, Method::GET, "/home", As::Bearer(&patient.token), None).await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location(), Some("/intake/baseline"));
    assert_eq!(response.body["progress"]["needs_onboarding"], true);

    let response = send(&app, Method::GET, "/home", As::DevUser(ADMIN), None).await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location(), Some("/admin"));

    let response = send(&app, Method::GET, "/home", As::DevUser(CLINICIAN), None).await;
    assert_eq!(response.location(), Some("/clinician"));
}

#[tokio::test]
async fn test_full_onboarding_flow() {
    let app = test_app().await;
    let patient = register_patient(&app, "ada@example.com").await;
    let token = As::Bearer(&patient.token);

    let response = send(
        &app,
        Method::POST,
        &format!("/admin/memberships/{}/activate", patient.membership_id),
        As::DevUser(ADMIN),
        None,
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "active");
    assert_eq!(response.body["onboarding_step"], "pending_baseline");

    let response = send(&app, Method::GET, "/intake/baseline", token, None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["stage"], "baseline");
    assert_eq!(response.body["person"]["relationship"], "self");

    let stages = [
        ("/intake/baseline", baseline_form(), "baseline_complete", "/intake/emergency-contacts"),
        (
            "/intake/emergency-contacts",
            emergency_contacts_form(),
            "emergency_contacts_complete",
            "/intake/medical-history",
        ),
        (
            "/intake/medical-history",
            medical_history_form(),
            "medical_history_complete",
            "/intake/vitals-kit",
        ),
        ("/intake/vitals-kit", vitals_kit_form(), "onboarding_complete", "/dashboard"),
    ];

    for (uri, form, step, next) in stages {
        let response = send(&app, Method::POST, uri, token, Some(form)).await;
        assert_eq!(response.status, StatusCode::OK, "{uri}: {}", response.body);
        assert_eq!(response.body["step"], step);
        assert_eq!(response.body["path"], next);
    }

    let response = send(&app, Method::GET, "/onboarding", token, None).await;
    assert_eq!(response.body["step"], "onboarding_complete");
    assert_eq!(response.body["needs_onboarding"], false);

    let response = send(&app, Method::GET, "/home", token, None).await;
    assert_eq!(response.location(), Some("/dashboard"));

    let response = send(&app, Method::GET, "/membership", token, None).await;
    assert_eq!(response.body["vitals_kit_status"], "requested");
}

#[tokio::test]
async fn test_out_of_sequence_stage_redirects() {
    let app = test_app().await;
    let patient = register_patient(&app, "ada@example.com").await;
    let token = As::Bearer(&patient.token);

    let response = send(&app, Method::GET, "/intake/medical-history", token, None).await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location(), Some("/intake/baseline"));
    assert_eq!(response.body["code"], "OUT_OF_SEQUENCE");
    assert_eq!(response.body["redirect_to"], "/intake/baseline");

    let response = send(
        &app,
        Method::POST,
        "/intake/vitals-kit",
        token,
        Some(vitals_kit_form()),
    )
    .await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);

    // Nothing moved.
    let response = send(&app, Method::GET, "/onboarding", token, None).await;
    assert_eq!(response.body["path"], "/intake/baseline");
}

#[tokio::test]
async fn test_resubmitting_completed_stage_redirects_forward() {
    let app = test_app().await;
    let patient = register_patient(&app, "ada@example.com").await;
    let token = As::Bearer(&patient.token);

    let response = send(&app, Method::POST, "/intake/baseline", token, Some(baseline_form())).await;
    assert_eq!(response.status, StatusCode::OK);

    let response = send(&app, Method::POST, "/intake/baseline", token, Some(baseline_form())).await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location(), Some("/intake/emergency-contacts"));
}

#[tokio::test]
async fn test_invalid_submission_leaves_step_unchanged() {
    let app = test_app().await;
    let patient = register_patient(&app, "ada@example.com").await;
    let token = As::Bearer(&patient.token);

    let mut form = baseline_form();
    form["phone"] = json!("12");
    let response = send(&app, Method::POST, "/intake/baseline", token, Some(form)).await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);

    let response = send(&app, Method::GET, "/onboarding", token, None).await;
    assert_eq!(response.body["path"], "/intake/baseline");
}

#[tokio::test]
async fn test_malformed_out_of_sequence_submit_still_redirects() {
    let app = test_app().await;
    let patient = register_patient(&app, "ada@example.com").await;

    let response = send(
        &app,
        Method::POST,
        "/intake/vitals-kit",
        As::Bearer(&patient.token),
        Some(json!({})),
    )
    .await;

    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location(), Some("/intake/baseline"));
    assert_eq!(response.body["code"], "OUT_OF_SEQUENCE");
}

#[tokio::test]
async fn test_malformed_bodies_are_json_validation_errors() {
    let app = test_app().await;
    let patient = register_patient(&app, "ada@example.com").await;
    let token = As::Bearer(&patient.token);

    let mut form = baseline_form();
    form["sex"] = json!("sometimes");
    let response = send(&app, Method::POST, "/intake/baseline", token, Some(form)).await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.body["code"], "VALIDATION_FAILED");
    assert_eq!(
        response.headers.get(header::CONTENT_TYPE).unwrap(),
        "application/json"
    );

    let response = send(
        &app,
        Method::POST,
        "/family",
        token,
        Some(json!({ "first_name": "Byron", "last_name": "Lovelace", "relationship": "landlord" })),
    )
    .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.body["code"], "VALIDATION_FAILED");

    let response = send(&app, Method::GET, "/onboarding", token, None).await;
    assert_eq!(response.body["path"], "/intake/baseline");
}

#[tokio::test]
async fn test_family_member_lifecycle() {
    let app = test_app().await;
    let patient = register_patient(&app, "ada@example.com").await;
    let token = As::Bearer(&patient.token);

    let response = send(
        &app,
        Method::POST,
        "/family",
        token,
        Some(json!({
            "first_name": "Byron",
            "last_name": "Lovelace",
            "date_of_birth": "2015-05-01",
            "relationship": "child"
        })),
    )
    .await;
    assert_eq!(response.status, StatusCode::CREATED);
    let child_id = response.body["id"].as_str().unwrap().to_string();
    assert_eq!(response.body["intake_complete"], false);

    let response = send(
        &app,
        Method::PUT,
        &format!("/family/{child_id}"),
        token,
        Some(json!({ "first_name": "Ralph" })),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["first_name"], "Ralph");

    let response = send(
        &app,
        Method::POST,
        &format!("/family/{child_id}/medical-history"),
        token,
        Some(json!({ "allergies": ["peanuts"] })),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["allergies"], json!(["peanuts"]));

    let response = send(&app, Method::GET, "/family", token, None).await;
    let people = response.body.as_array().unwrap();
    assert_eq!(people.len(), 2);
    let child = people.iter().find(|p| p["id"] == child_id.as_str()).unwrap();
    assert_eq!(child["intake_complete"], true);

    let response = send(
        &app,
        Method::DELETE,
        &format!("/family/{child_id}"),
        token,
        None,
    )
    .await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);

    let response = send(&app, Method::GET, "/family", token, None).await;
    assert_eq!(response.body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_primary_member_cannot_be_removed() {
    let app = test_app().await;
    let patient = register_patient(&app, "ada@example.com").await;
    let person_id = self_person_id(&app, &patient).await;

    let response = send(
        &app,
        Method::DELETE,
        &format!("/family/{person_id}"),
        As::Bearer(&patient.token),
        None,
    )
    .await;

    assert_eq!(response.status, StatusCode::CONFLICT);
    let response = send(&app, Method::GET, "/family", As::Bearer(&patient.token), None).await;
    assert_eq!(response.body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_family_is_scoped_to_owner() {
    let app = test_app().await;
    let ada = register_patient(&app, "ada@example.com").await;
    let grace = register_patient(&app, "grace@example.com").await;

    let response = send(
        &app,
        Method::POST,
        "/family",
        As::Bearer(&ada.token),
        Some(json!({ "first_name": "Byron", "last_name": "Lovelace", "relationship": "child" })),
    )
    .await;
    let child_id = response.body["id"].as_str().unwrap().to_string();

    let response = send(
        &app,
        Method::DELETE,
        &format!("/family/{child_id}"),
        As::Bearer(&grace.token),
        None,
    )
    .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = send(
        &app,
        Method::DELETE,
        "/family/per_missing",
        As::Bearer(&grace.token),
        None,
    )
    .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_contact() {
    let app = test_app().await;
    let patient = register_patient(&app, "ada@example.com").await;

    let response = send(
        &app,
        Method::PUT,
        "/me/contact",
        As::Bearer(&patient.token),
        Some(json!({ "phone": "+1 (555) 010-2030" })),
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["phone"], "15550102030");
    assert_eq!(response.body["email"], "ada@example.com");
}

#[tokio::test]
async fn test_admin_routes_require_admin() {
    let app = test_app().await;
    let patient = register_patient(&app, "ada@example.com").await;

    let response = send(
        &app,
        Method::GET,
        "/admin/memberships",
        As::Bearer(&patient.token),
        None,
    )
    .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = send(
        &app,
        Method::POST,
        &format!("/admin/memberships/{}/activate", patient.membership_id),
        As::DevUser(CLINICIAN),
        None,
    )
    .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = send(
        &app,
        Method::GET,
        "/admin/memberships?status=pending_review",
        As::DevUser(ADMIN),
        None,
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);
    let memberships = response.body.as_array().unwrap();
    assert_eq!(memberships.len(), 1);
    assert_eq!(memberships[0]["id"], patient.membership_id.as_str());
}

#[tokio::test]
async fn test_vitals_kit_status_only_moves_forward() {
    let app = test_app().await;
    let patient = register_patient(&app, "ada@example.com").await;
    let uri = format!("/admin/memberships/{}/vitals-kit", patient.membership_id);

    let response = send(
        &app,
        Method::PUT,
        &uri,
        As::DevUser(ADMIN),
        Some(json!({ "status": "shipped" })),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["vitals_kit_status"], "shipped");

    let response = send(
        &app,
        Method::PUT,
        &uri,
        As::DevUser(ADMIN),
        Some(json!({ "status": "requested" })),
    )
    .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_staff_cannot_use_member_routes() {
    let app = test_app().await;

    let response = send(&app, Method::GET, "/family", As::DevUser(CLINICIAN), None).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = send(&app, Method::GET, "/intake/baseline", As::DevUser(ADMIN), None).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
}
