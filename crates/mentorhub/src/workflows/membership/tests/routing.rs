use super::common::*;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use crate::workflows::membership::{MemoryStore, ACTOR_HEADER};

#[tokio::test]
async fn apply_route_creates_then_conflicts() {
    let fixture = fixture();
    let uri = format!("/api/v1/projects/{}/apply", fixture.ai_project.id);

    let response = fixture
        .router()
        .oneshot(request("POST", &uri, Some(&fixture.applicant), None))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["status"], "pending");
    assert_eq!(payload["user_id"], fixture.applicant.id.0);

    let response = fixture
        .router()
        .oneshot(request("POST", &uri, Some(&fixture.applicant), None))
        .await
        .expect("route executes");
    assert_error_code(response, StatusCode::CONFLICT, "already_applied").await;
}

#[tokio::test]
async fn apply_route_distinguishes_anonymous_staff_and_missing() {
    let fixture = fixture();
    let uri = format!("/api/v1/projects/{}/apply", fixture.ai_project.id);

    let response = fixture
        .router()
        .oneshot(request("POST", &uri, None, None))
        .await
        .expect("route executes");
    assert_error_code(response, StatusCode::UNAUTHORIZED, "unauthenticated").await;

    let response = fixture
        .router()
        .oneshot(request("POST", &uri, Some(&fixture.staff), None))
        .await
        .expect("route executes");
    assert_error_code(response, StatusCode::FORBIDDEN, "forbidden").await;

    let response = fixture
        .router()
        .oneshot(request(
            "POST",
            "/api/v1/projects/999/apply",
            Some(&fixture.applicant),
            None,
        ))
        .await
        .expect("route executes");
    assert_error_code(response, StatusCode::NOT_FOUND, "not_found").await;
}

#[tokio::test]
async fn malformed_actor_header_is_rejected() {
    let fixture = fixture();
    let mut headers = HeaderMap::new();
    headers.insert(ACTOR_HEADER, HeaderValue::from_static("ada"));

    let response = crate::workflows::membership::router::dashboard_handler::<MemoryStore>(
        State(fixture.service.clone()),
        headers,
    )
    .await;
    assert_error_code(response, StatusCode::BAD_REQUEST, "invalid_actor").await;

    let mut headers = HeaderMap::new();
    headers.insert(ACTOR_HEADER, HeaderValue::from_static("4040"));
    let response = crate::workflows::membership::router::dashboard_handler::<MemoryStore>(
        State(fixture.service.clone()),
        headers,
    )
    .await;
    assert_error_code(response, StatusCode::UNAUTHORIZED, "unauthenticated").await;
}

#[tokio::test]
async fn accept_route_is_idempotent() {
    let fixture = fixture();
    let application = fixture
        .service
        .apply(&fixture.applicant_actor(), fixture.ai_project.id)
        .expect("apply");
    let uri = format!("/api/v1/applications/{}/accept", application.id);

    let response = fixture
        .router()
        .oneshot(request("GET", &uri, Some(&fixture.staff), None))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let first = read_json_body(response).await;
    assert_eq!(first["changed"], true);
    assert_eq!(first["application"]["status"], "accepted");

    let response = fixture
        .router()
        .oneshot(request("GET", &uri, Some(&fixture.staff), None))
        .await
        .expect("route executes");
    let second = read_json_body(response).await;
    assert_eq!(second["changed"], false);
    assert_eq!(second["assignment"]["id"], first["assignment"]["id"]);
}

#[tokio::test]
async fn remove_route_frees_the_pair() {
    let fixture = fixture();
    let outcome = fixture
        .service
        .direct_assign(
            &fixture.admin_actor(),
            fixture.applicant.id,
            fixture.ai_project.id,
        )
        .expect("assign");

    let response = crate::workflows::membership::router::remove_assignment_handler::<MemoryStore>(
        State(fixture.service.clone()),
        actor_headers(fixture.staff.id.0),
        Path(outcome.assignment.id.0),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let uri = format!("/api/v1/projects/{}/apply", fixture.ai_project.id);
    let response = fixture
        .router()
        .oneshot(request("POST", &uri, Some(&fixture.applicant), None))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn project_listing_route_parses_filters() {
    let fixture = fixture();
    let uri = format!(
        "/api/v1/projects?q=AI&categories={},{}",
        fixture.machine_learning.id, fixture.research.id
    );

    let response = fixture
        .router()
        .oneshot(request("GET", &uri, Some(&fixture.applicant), None))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    let projects = payload["projects"].as_array().expect("projects array");
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0]["display_name"], "AI Project");
    assert_eq!(projects[0]["view"], "member");
    assert_eq!(projects[0]["can_apply"], true);

    let response = fixture
        .router()
        .oneshot(request(
            "GET",
            "/api/v1/projects?categories=1,abc",
            Some(&fixture.applicant),
            None,
        ))
        .await
        .expect("route executes");
    assert_error_code(response, StatusCode::BAD_REQUEST, "invalid_query").await;
}

#[tokio::test]
async fn repeated_category_keys_union_like_a_comma_list() {
    let fixture = fixture();
    let uri = format!(
        "/api/v1/projects?categories={}&categories={}",
        fixture.machine_learning.id, fixture.research.id
    );

    let response = fixture
        .router()
        .oneshot(request("GET", &uri, Some(&fixture.applicant), None))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    let ids: Vec<u64> = payload["projects"]
        .as_array()
        .expect("projects array")
        .iter()
        .map(|project| project["id"].as_u64().expect("project id"))
        .collect();
    assert_eq!(ids, vec![fixture.ai_project.id.0, fixture.other_project.id.0]);
}

#[tokio::test]
async fn blank_course_filters_list_everything() {
    let fixture = fixture();
    fixture.add_course(
        "Intro to Python",
        crate::workflows::membership::CourseLevel::Beginner,
        &[&fixture.python],
    );
    fixture.add_course(
        "Rust in Practice",
        crate::workflows::membership::CourseLevel::Advanced,
        &[&fixture.rust],
    );

    for uri in ["/api/v1/courses?level=", "/api/v1/courses?q=&languages=&level="] {
        let response = fixture
            .router()
            .oneshot(request("GET", uri, Some(&fixture.applicant), None))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
        let payload = read_json_body(response).await;
        assert_eq!(payload["courses"].as_array().map(Vec::len), Some(2), "{uri}");
    }
}

#[tokio::test]
async fn non_numeric_course_level_is_a_validation_error() {
    let fixture = fixture();
    let response = fixture
        .router()
        .oneshot(request(
            "GET",
            "/api/v1/courses?level=hard",
            Some(&fixture.applicant),
            None,
        ))
        .await
        .expect("route executes");
    assert_error_code(response, StatusCode::UNPROCESSABLE_ENTITY, "validation_error").await;
}

#[tokio::test]
async fn staff_listing_carries_the_staff_view() {
    let fixture = fixture();
    let response = fixture
        .router()
        .oneshot(request("GET", "/api/v1/projects", Some(&fixture.staff), None))
        .await
        .expect("route executes");
    let payload = read_json_body(response).await;
    assert_eq!(payload["projects"][0]["view"], "staff");
    assert_eq!(payload["projects"][0]["is_staff"], true);
    assert!(payload["projects"][0]["pending_applications"].is_array());
}

#[tokio::test]
async fn course_listing_rejects_out_of_range_level() {
    let fixture = fixture();
    let response = fixture
        .router()
        .oneshot(request(
            "GET",
            "/api/v1/courses?level=9",
            Some(&fixture.applicant),
            None,
        ))
        .await
        .expect("route executes");
    assert_error_code(response, StatusCode::UNPROCESSABLE_ENTITY, "validation_error").await;

    fixture.add_course(
        "Intro to Python",
        crate::workflows::membership::CourseLevel::Beginner,
        &[&fixture.python],
    );
    let uri = format!("/api/v1/courses?level=1&languages={}", fixture.python.id);
    let response = fixture
        .router()
        .oneshot(request("GET", &uri, Some(&fixture.applicant), None))
        .await
        .expect("route executes");
    let payload = read_json_body(response).await;
    assert_eq!(payload["courses"][0]["level"], 1);
    assert_eq!(payload["courses"][0]["level_display"], "Beginner");
}

#[tokio::test]
async fn role_route_rejects_unknown_roles() {
    let fixture = fixture();
    let uri = format!("/api/v1/admin/users/{}/role", fixture.applicant.id);

    let response = fixture
        .router()
        .oneshot(request(
            "POST",
            &uri,
            Some(&fixture.admin),
            Some(json!({ "role": "overlord" })),
        ))
        .await
        .expect("route executes");
    assert_error_code(response, StatusCode::UNPROCESSABLE_ENTITY, "invalid_role").await;

    let response = fixture
        .router()
        .oneshot(request(
            "POST",
            &uri,
            Some(&fixture.admin),
            Some(json!({ "role": "staff" })),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["user"]["role"], "staff");
    assert_eq!(payload["previous"], "user");
}

#[tokio::test]
async fn direct_assign_route_reports_creation() {
    let fixture = fixture();
    let uri = format!("/api/v1/admin/users/{}/assign", fixture.applicant.id);
    let body = json!({ "project_id": fixture.other_project.id });

    let response = fixture
        .router()
        .oneshot(request("POST", &uri, Some(&fixture.admin), Some(body.clone())))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = fixture
        .router()
        .oneshot(request("POST", &uri, Some(&fixture.admin), Some(body)))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["created"], false);
}

#[tokio::test]
async fn create_project_route_validates_names() {
    let fixture = fixture();
    let response = fixture
        .router()
        .oneshot(request(
            "POST",
            "/api/v1/projects",
            Some(&fixture.staff),
            Some(json!({ "name": "AI, ML", "description": "comma" })),
        ))
        .await
        .expect("route executes");
    assert_error_code(response, StatusCode::UNPROCESSABLE_ENTITY, "validation_error").await;

    let response = fixture
        .router()
        .oneshot(request(
            "POST",
            "/api/v1/projects",
            Some(&fixture.staff),
            Some(json!({ "description": "nameless", "categories": [fixture.research.id] })),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["name"], serde_json::Value::Null);
}

#[tokio::test]
async fn mentor_and_dashboard_routes() {
    let fixture = fixture();
    let uri = format!("/api/v1/projects/{}/mentor", fixture.ai_project.id);
    let response = fixture
        .router()
        .oneshot(request("POST", &uri, Some(&fixture.staff), None))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);

    let response = fixture
        .router()
        .oneshot(request("GET", "/api/v1/dashboard", Some(&fixture.staff), None))
        .await
        .expect("route executes");
    let payload = read_json_body(response).await;
    assert_eq!(payload["mentored_projects"], 1);
}

fn actor_headers(user_id: u64) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACTOR_HEADER,
        HeaderValue::from_str(&user_id.to_string()).expect("header value"),
    );
    headers
}
