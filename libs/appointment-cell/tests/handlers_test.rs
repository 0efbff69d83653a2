use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    extract::{Extension, Path, State},
    http::{Request, StatusCode},
    Json,
};
use axum_extra::TypedHeader;
use chrono::{TimeZone, Utc};
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::handlers::*;
use appointment_cell::models::*;
use appointment_cell::router::appointment_routes;
use appointment_cell::{AppointmentValidator, BookingContext};
use holiday_cell::HolidayCalculator;
use scheduling_cell::{SchedulingContext, SchedulingStore};
use shared_config::AppConfig;
use shared_database::{SupabaseClient, SupabaseStore};
use shared_models::{auth::User, error::AppError};
use shared_utils::preferences::PreferenceStore;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};

/// A single signed-in session bound to `token`.
struct TestContext {
    config: Arc<AppConfig>,
    token: String,
    store: Arc<SchedulingStore>,
    preferences: PreferenceStore,
    holidays: HolidayCalculator,
    validator: AppointmentValidator,
    _prefs_dir: tempfile::TempDir,
}

impl TestContext {
    fn new(config: Arc<AppConfig>, token: &str) -> Arc<Self> {
        let prefs_dir = tempfile::tempdir().unwrap();
        let supabase = Arc::new(SupabaseClient::new(&config));

        Arc::new(Self {
            token: token.to_string(),
            store: Arc::new(SchedulingStore::new(Arc::new(SupabaseStore::new(supabase, token)))),
            preferences: PreferenceStore::open(prefs_dir.path().join("prefs.json")),
            holidays: HolidayCalculator::from_profile_name(&config.holiday_profile).unwrap(),
            validator: AppointmentValidator::from_config(&config).unwrap(),
            config,
            _prefs_dir: prefs_dir,
        })
    }

    /// Same as `new`, with the snapshot loaded the way sign-in loads it.
    async fn signed_in(config: Arc<AppConfig>, token: &str) -> Arc<Self> {
        let ctx = Self::new(config, token);
        ctx.store.refresh().await.unwrap();
        ctx
    }
}

#[async_trait]
impl SchedulingContext for TestContext {
    fn config(&self) -> Arc<AppConfig> {
        self.config.clone()
    }

    fn preferences(&self) -> &PreferenceStore {
        &self.preferences
    }

    async fn scheduling_store(&self, access_token: &str) -> Result<Arc<SchedulingStore>, AppError> {
        if access_token == self.token {
            Ok(self.store.clone())
        } else {
            Err(AppError::Auth("No active session".to_string()))
        }
    }
}

impl BookingContext for TestContext {
    fn holidays(&self) -> &HolidayCalculator {
        &self.holidays
    }

    fn validator(&self) -> &AppointmentValidator {
        &self.validator
    }
}

fn state(ctx: &Arc<TestContext>) -> State<Arc<dyn BookingContext>> {
    let ctx: Arc<dyn BookingContext> = ctx.clone();
    State(ctx)
}

fn create_test_user_extension() -> Extension<User> {
    Extension(TestUser::admin("admin@clinic.test").to_user())
}

fn create_auth_header(token: &str) -> TypedHeader<Authorization<Bearer>> {
    TypedHeader(Authorization::bearer(token).unwrap())
}

struct Ids {
    patient: Uuid,
    professional: Uuid,
    booked: Uuid,
}

async fn setup_snapshot_mocks(mock_server: &MockServer) -> Ids {
    let ids = Ids {
        patient: Uuid::new_v4(),
        professional: Uuid::new_v4(),
        booked: Uuid::new_v4(),
    };

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_row(ids.patient, "Rafael Lima", "00295261676")
        ])))
        .mount(mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/professionals"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::professional_row(ids.professional, "Bruna")
        ])))
        .mount(mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("order", "start_time.asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_row(
                ids.booked,
                ids.patient,
                ids.professional,
                "2024-05-02T13:00:00Z",
                "2024-05-02T14:00:00Z"
            )
        ])))
        .mount(mock_server)
        .await;

    ids
}

#[tokio::test]
async fn test_validate_reversed_range() {
    let mock_server = MockServer::start().await;
    let ctx = TestContext::new(TestConfig::with_url(mock_server.uri()).to_arc(), "token");

    let proposed = ProposedAppointment {
        start: Utc.with_ymd_and_hms(2024, 5, 1, 13, 0, 0).unwrap(),
        end: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        patient_id: Some(Uuid::new_v4()),
        professional_id: None,
        exclude_id: None,
    };

    let Json(result) = validate_appointment(state(&ctx), create_auth_header("token"), Json(proposed))
        .await
        .unwrap();

    assert!(!result.accepted);
    assert_eq!(result.reason, Some(RejectionReason::InvalidRange));
    // Holiday and range checks alone never reach the backing store.
    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_validate_new_year_is_blocked() {
    let mock_server = MockServer::start().await;
    let ctx = TestContext::new(TestConfig::with_url(mock_server.uri()).to_arc(), "token");

    let proposed = ProposedAppointment {
        start: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
        end: Utc.with_ymd_and_hms(2024, 1, 1, 13, 0, 0).unwrap(),
        patient_id: Some(Uuid::new_v4()),
        professional_id: None,
        exclude_id: None,
    };

    let Json(result) = validate_appointment(state(&ctx), create_auth_header("token"), Json(proposed))
        .await
        .unwrap();

    assert_eq!(result.reason, Some(RejectionReason::HolidayBlocked));
}

#[tokio::test]
async fn test_create_appointment_inserts_and_refreshes() {
    let mock_server = MockServer::start().await;
    let ids = setup_snapshot_mocks(&mock_server).await;
    let ctx = TestContext::signed_in(TestConfig::with_url(mock_server.uri()).to_arc(), "session-token").await;

    let created_id = Uuid::new_v4();
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .and(header("Prefer", "return=representation"))
        .and(header("Authorization", "Bearer session-token"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::appointment_row(
                created_id,
                ids.patient,
                ids.professional,
                "2024-05-03T13:00:00Z",
                "2024-05-03T14:00:00Z"
            )
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let request = AppointmentRequest {
        patient_id: Some(ids.patient),
        professional_id: Some(ids.professional),
        start: Some(Utc.with_ymd_and_hms(2024, 5, 3, 13, 0, 0).unwrap()),
        end: Some(Utc.with_ymd_and_hms(2024, 5, 3, 14, 0, 0).unwrap()),
        ..AppointmentRequest::default()
    };

    let (status, Json(body)) = create_appointment(
        state(&ctx),
        create_auth_header("session-token"),
        create_test_user_extension(),
        Json(request),
    )
    .await
    .unwrap();

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["appointment"]["id"], json!(created_id));

    // Initial load plus the refresh after the write.
    let appointment_reads = mock_server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.method.as_str() == "GET" && r.url.path() == "/rest/v1/appointments")
        .count();
    assert_eq!(appointment_reads, 2);
}

#[tokio::test]
async fn test_create_on_holiday_is_blocked_by_policy() {
    let mock_server = MockServer::start().await;
    let ids = setup_snapshot_mocks(&mock_server).await;
    let ctx = TestContext::signed_in(TestConfig::with_url(mock_server.uri()).to_arc(), "session-token").await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&mock_server)
        .await;

    let request = AppointmentRequest {
        patient_id: Some(ids.patient),
        professional_id: Some(ids.professional),
        start: Some(Utc.with_ymd_and_hms(2024, 12, 25, 13, 0, 0).unwrap()),
        end: Some(Utc.with_ymd_and_hms(2024, 12, 25, 14, 0, 0).unwrap()),
        ..AppointmentRequest::default()
    };

    let result = create_appointment(
        state(&ctx),
        create_auth_header("session-token"),
        create_test_user_extension(),
        Json(request),
    )
    .await;

    match result {
        Err(AppError::BlockedByPolicy { reason, message }) => {
            assert_eq!(reason, "holiday_blocked");
            assert!(message.contains("Natal"));
        }
        other => panic!("expected holiday block, got {:?}", other.map(|(s, _)| s)),
    }
}

#[tokio::test]
async fn test_update_unknown_appointment_is_not_found() {
    let mock_server = MockServer::start().await;
    setup_snapshot_mocks(&mock_server).await;
    let ctx = TestContext::signed_in(TestConfig::with_url(mock_server.uri()).to_arc(), "session-token").await;

    let result = update_appointment(
        state(&ctx),
        create_auth_header("session-token"),
        Path(Uuid::new_v4()),
        Json(AppointmentRequest::default()),
    )
    .await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_routes_require_auth_and_delete_returns_no_content() {
    let mock_server = MockServer::start().await;
    setup_snapshot_mocks(&mock_server).await;
    let test_config = TestConfig::with_url(mock_server.uri());
    let booked = Uuid::new_v4();

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", booked)))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let token = JwtTestUtils::create_test_token(&TestUser::default(), &test_config.jwt_secret, Some(1));
    let ctx = TestContext::signed_in(test_config.to_arc(), &token).await;

    let anonymous = Request::builder()
        .method("DELETE")
        .uri(format!("/{}", booked))
        .body(Body::empty())
        .unwrap();
    let response = appointment_routes(ctx.clone()).oneshot(anonymous).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let authorized = Request::builder()
        .method("DELETE")
        .uri(format!("/{}", booked))
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let response = appointment_routes(ctx).oneshot(authorized).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_validate_route_returns_reason_json() {
    let test_config = TestConfig::default();
    let token = JwtTestUtils::create_test_token(&TestUser::default(), &test_config.jwt_secret, Some(1));
    let ctx = TestContext::new(test_config.to_arc(), &token);

    let request = Request::builder()
        .method("POST")
        .uri("/validate")
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "start": "2024-03-29T13:00:00Z",
                "end": "2024-03-29T14:00:00Z"
            })
            .to_string(),
        ))
        .unwrap();

    let response = appointment_routes(ctx).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["accepted"], false);
    assert_eq!(body["reason"], "holiday_blocked");
    assert_eq!(body["detail"], "Sexta-feira Santa");
}

#[tokio::test]
async fn test_selection_route() {
    let test_config = TestConfig::default();
    let token = JwtTestUtils::create_test_token(&TestUser::default(), &test_config.jwt_secret, Some(1));
    let ctx = TestContext::new(test_config.to_arc(), &token);

    let request = Request::builder()
        .uri("/selection?start=2024-09-07T12:00:00Z")
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();

    let response = appointment_routes(ctx).oneshot(request).await.unwrap();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(body["allowed"], false);
    assert_eq!(body["local_date"], "2024-09-07");
}

#[tokio::test]
async fn test_writes_refresh_the_shared_session_store() {
    let mock_server = MockServer::start().await;
    let ids = setup_snapshot_mocks(&mock_server).await;
    let ctx = TestContext::signed_in(TestConfig::with_url(mock_server.uri()).to_arc(), "session-token").await;
    let before = ctx.store.snapshot().await.refreshed_at();

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::appointment_row(
                Uuid::new_v4(),
                ids.patient,
                ids.professional,
                "2024-05-03T13:00:00Z",
                "2024-05-03T14:00:00Z"
            )
        ])))
        .mount(&mock_server)
        .await;

    let request = AppointmentRequest {
        patient_id: Some(ids.patient),
        professional_id: Some(ids.professional),
        start: Some(Utc.with_ymd_and_hms(2024, 5, 3, 13, 0, 0).unwrap()),
        end: Some(Utc.with_ymd_and_hms(2024, 5, 3, 14, 0, 0).unwrap()),
        ..AppointmentRequest::default()
    };
    create_appointment(state(&ctx), create_auth_header("session-token"), create_test_user_extension(), Json(request))
        .await
        .unwrap();

    assert!(ctx.store.snapshot().await.refreshed_at() > before);
}

#[tokio::test]
async fn test_token_of_another_session_is_rejected() {
    let mock_server = MockServer::start().await;
    let ctx = TestContext::new(TestConfig::with_url(mock_server.uri()).to_arc(), "session-token");

    let result = delete_appointment(state(&ctx), create_auth_header("stale-token"), Path(Uuid::new_v4())).await;

    assert!(matches!(result, Err(AppError::Auth(_))));
    assert!(mock_server.received_requests().await.unwrap().is_empty());
}
