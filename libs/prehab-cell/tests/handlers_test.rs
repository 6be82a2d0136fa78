use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use prehab_cell::router::prehab_routes;
use shared_config::AppConfig;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};

async fn create_test_app(config: AppConfig) -> Router {
    prehab_routes(Arc::new(config))
}

fn mock_config(mock_server: &MockServer) -> AppConfig {
    let mut config = TestConfig::default().to_app_config();
    config.supabase_url = mock_server.uri();
    config
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Mount the lookups needed to enroll `patient_id` into a one-week template
/// with a single times-per-week=5 task.
async fn setup_enrollment_mocks(
    mock_server: &MockServer,
    patient_id: Uuid,
    template_id: Uuid,
    doctor_id: Uuid,
    prehab_id: Uuid,
) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("id", format!("eq.{}", patient_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_response(patient_id)
        ])))
        .mount(mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/schedule_templates"))
        .and(query_param("id", format!("eq.{}", template_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::template_response(template_id, doctor_id, 1)
        ])))
        .mount(mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/template_entries"))
        .and(query_param("template_id", format!("eq.{}", template_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::template_entry_response(template_id, Uuid::new_v4(), 1, 5)
        ])))
        .mount(mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/prehabs"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::prehab_response(prehab_id, patient_id, doctor_id, "pending")
        ])))
        .mount(mock_server)
        .await;
}

fn enrollment_body(patient_id: Uuid, template_id: Uuid) -> String {
    let init_date = Utc::now().date_naive();
    let surgery_date = init_date + Duration::days(28);
    json!({
        "patient_id": patient_id,
        "template_id": template_id,
        "init_date": init_date,
        "surgery_date": surgery_date
    })
    .to_string()
}

#[tokio::test]
async fn test_create_prehab_success() {
    let mock_server = MockServer::start().await;
    let doctor = TestUser::doctor("doc@example.com");
    let config = mock_config(&mock_server);
    let app = create_test_app(config.clone()).await;
    let token = JwtTestUtils::create_test_token(&doctor, &config.supabase_jwt_secret, Some(24));

    let patient_id = Uuid::new_v4();
    let template_id = Uuid::new_v4();
    let prehab_id = Uuid::new_v4();

    setup_enrollment_mocks(&mock_server, patient_id, template_id, doctor.id, prehab_id).await;

    // The whole calendar lands in a single bulk insert
    Mock::given(method("POST"))
        .and(path("/rest/v1/scheduled_items"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&mock_server)
        .await;

    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("authorization", format!("Bearer {}", token))
        .header("Platform", "web")
        .header("content-type", "application/json")
        .body(Body::from(enrollment_body(patient_id, template_id)))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["prehab"]["patient_id"], json!(patient_id));
}

#[tokio::test]
async fn test_create_prehab_rejects_patient_role() {
    let mock_server = MockServer::start().await;
    let patient = TestUser::patient("patient@example.com");
    let config = mock_config(&mock_server);
    let app = create_test_app(config.clone()).await;
    let token = JwtTestUtils::create_test_token(&patient, &config.supabase_jwt_secret, Some(24));

    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("authorization", format!("Bearer {}", token))
        .header("Platform", "web")
        .header("content-type", "application/json")
        .body(Body::from(enrollment_body(Uuid::new_v4(), Uuid::new_v4())))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_create_prehab_rejects_surgery_before_start() {
    let mock_server = MockServer::start().await;
    let doctor = TestUser::doctor("doc@example.com");
    let config = mock_config(&mock_server);
    let app = create_test_app(config.clone()).await;
    let token = JwtTestUtils::create_test_token(&doctor, &config.supabase_jwt_secret, Some(24));

    let init_date = Utc::now().date_naive();
    let body = json!({
        "patient_id": Uuid::new_v4(),
        "template_id": Uuid::new_v4(),
        "init_date": init_date,
        "surgery_date": init_date - Duration::days(1)
    });

    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("authorization", format!("Bearer {}", token))
        .header("Platform", "web")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_prehab_rolls_back_on_calendar_failure() {
    let mock_server = MockServer::start().await;
    let doctor = TestUser::doctor("doc@example.com");
    let config = mock_config(&mock_server);
    let app = create_test_app(config.clone()).await;
    let token = JwtTestUtils::create_test_token(&doctor, &config.supabase_jwt_secret, Some(24));

    let patient_id = Uuid::new_v4();
    let template_id = Uuid::new_v4();
    let prehab_id = Uuid::new_v4();

    setup_enrollment_mocks(&mock_server, patient_id, template_id, doctor.id, prehab_id).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/scheduled_items"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "message": "insert failed" })))
        .expect(1)
        .mount(&mock_server)
        .await;

    // The half-created enrollment must be deleted again
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/prehabs"))
        .and(query_param("id", format!("eq.{}", prehab_id)))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("authorization", format!("Bearer {}", token))
        .header("Platform", "web")
        .header("content-type", "application/json")
        .body(Body::from(enrollment_body(patient_id, template_id)))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_get_prehab_rejects_foreign_doctor() {
    let mock_server = MockServer::start().await;
    let doctor = TestUser::doctor("doc@example.com");
    let config = mock_config(&mock_server);
    let app = create_test_app(config.clone()).await;
    let token = JwtTestUtils::create_test_token(&doctor, &config.supabase_jwt_secret, Some(24));

    let prehab_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/prehabs"))
        .and(query_param("id", format!("eq.{}", prehab_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::prehab_response(prehab_id, Uuid::new_v4(), Uuid::new_v4(), "active")
        ])))
        .mount(&mock_server)
        .await;

    let request = Request::builder()
        .method("GET")
        .uri(format!("/{}", prehab_id))
        .header("authorization", format!("Bearer {}", token))
        .header("Platform", "web")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_update_status_invalid_transition() {
    let mock_server = MockServer::start().await;
    let doctor = TestUser::doctor("doc@example.com");
    let config = mock_config(&mock_server);
    let app = create_test_app(config.clone()).await;
    let token = JwtTestUtils::create_test_token(&doctor, &config.supabase_jwt_secret, Some(24));

    let prehab_id = Uuid::new_v4();

    // Cancelled is terminal: no way back to active
    Mock::given(method("GET"))
        .and(path("/rest/v1/prehabs"))
        .and(query_param("id", format!("eq.{}", prehab_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::prehab_response(prehab_id, Uuid::new_v4(), doctor.id, "cancelled")
        ])))
        .mount(&mock_server)
        .await;

    let request = Request::builder()
        .method("PATCH")
        .uri(format!("/{}/status", prehab_id))
        .header("authorization", format!("Bearer {}", token))
        .header("Platform", "web")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "status": "active" }).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_update_status_pending_to_active() {
    let mock_server = MockServer::start().await;
    let doctor = TestUser::doctor("doc@example.com");
    let config = mock_config(&mock_server);
    let app = create_test_app(config.clone()).await;
    let token = JwtTestUtils::create_test_token(&doctor, &config.supabase_jwt_secret, Some(24));

    let prehab_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/prehabs"))
        .and(query_param("id", format!("eq.{}", prehab_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::prehab_response(prehab_id, patient_id, doctor.id, "pending")
        ])))
        .mount(&mock_server)
        .await;

    // Guarded against the status read above
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/prehabs"))
        .and(query_param("id", format!("eq.{}", prehab_id)))
        .and(query_param("status", "eq.pending"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::prehab_response(prehab_id, patient_id, doctor.id, "active")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let request = Request::builder()
        .method("PATCH")
        .uri(format!("/{}/status", prehab_id))
        .header("authorization", format!("Bearer {}", token))
        .header("Platform", "web")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "status": "active" }).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    assert_eq!(body["prehab"]["status"], "active");
}

#[tokio::test]
async fn test_statistics_requires_existing_prehab() {
    let mock_server = MockServer::start().await;
    let admin = TestUser::admin("admin@example.com");
    let config = mock_config(&mock_server);
    let app = create_test_app(config.clone()).await;
    let token = JwtTestUtils::create_test_token(&admin, &config.supabase_jwt_secret, Some(24));

    let patient_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/prehabs"))
        .and(query_param("patient_id", format!("eq.{}", patient_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let request = Request::builder()
        .method("GET")
        .uri(format!("/patients/{}/statistics", patient_id))
        .header("authorization", format!("Bearer {}", token))
        .header("Platform", "web")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_statistics_counts_report_fields() {
    let mock_server = MockServer::start().await;
    let admin = TestUser::admin("admin@example.com");
    let config = mock_config(&mock_server);
    let app = create_test_app(config.clone()).await;
    let token = JwtTestUtils::create_test_token(&admin, &config.supabase_jwt_secret, Some(24));

    let patient_id = Uuid::new_v4();
    let prehab_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/prehabs"))
        .and(query_param("patient_id", format!("eq.{}", patient_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::prehab_response(prehab_id, patient_id, Uuid::new_v4(), "active")
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/scheduled_items"))
        .and(query_param("prehab_id", format!("eq.{}", prehab_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::scheduled_item_response(Uuid::new_v4(), prehab_id, 1, 1, "completed"),
            MockSupabaseResponses::scheduled_item_response(Uuid::new_v4(), prehab_id, 1, 3, "pending"),
        ])))
        .mount(&mock_server)
        .await;

    let request = Request::builder()
        .method("GET")
        .uri(format!("/patients/{}/statistics", patient_id))
        .header("authorization", format!("Bearer {}", token))
        .header("Platform", "web")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    assert_eq!(body["patient_id"], json!(patient_id));
    assert_eq!(body["prehab_id"], json!(prehab_id));
    assert_eq!(body["total_activities"], 2);
}
