use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use async_trait::async_trait;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use scheduling_cell::router::calendar_routes;
use scheduling_cell::{SchedulingContext, SchedulingStore};
use shared_config::AppConfig;
use shared_database::{SupabaseClient, SupabaseStore};
use shared_models::error::AppError;
use shared_utils::preferences::PreferenceStore;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};

/// One signed-in session whose store is bound to `token`.
struct TestContext {
    config: Arc<AppConfig>,
    token: String,
    store: Arc<SchedulingStore>,
    preferences: PreferenceStore,
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

struct Fixture {
    server: MockServer,
    ctx: Arc<TestContext>,
    token: String,
    patient_id: Uuid,
    bruna_id: Uuid,
    lais_id: Uuid,
    _prefs_dir: TempDir,
}

async fn setup() -> Fixture {
    let server = MockServer::start().await;
    let prefs_dir = tempfile::tempdir().unwrap();

    let test_config = TestConfig::with_url(server.uri());
    let mut config = test_config.to_app_config();
    config.preferences_path = prefs_dir.path().join("prefs.json").display().to_string();

    let token = JwtTestUtils::create_test_token(&TestUser::default(), &test_config.jwt_secret, Some(1));

    let patient_id = Uuid::new_v4();
    let bruna_id = Uuid::new_v4();
    let lais_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(header("Authorization", format!("Bearer {}", token).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_row(patient_id, "Rafael Lima", "00295261676")
        ])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/professionals"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::professional_row(bruna_id, "Bruna"),
            MockSupabaseResponses::professional_row(lais_id, "Lais"),
        ])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_row(
                Uuid::new_v4(), patient_id, bruna_id, "2024-05-02T13:00:00Z", "2024-05-02T14:00:00Z"
            ),
            MockSupabaseResponses::appointment_row(
                Uuid::new_v4(), patient_id, lais_id, "2024-05-02T15:00:00Z", "2024-05-02T16:00:00Z"
            ),
        ])))
        .mount(&server)
        .await;

    let config = Arc::new(config);
    let supabase = Arc::new(SupabaseClient::new(&config));
    let store = Arc::new(SchedulingStore::new(Arc::new(SupabaseStore::new(supabase, &token))));
    store.refresh().await.unwrap();

    let ctx = Arc::new(TestContext {
        preferences: PreferenceStore::open(&config.preferences_path),
        config,
        token: token.clone(),
        store,
    });

    Fixture {
        server,
        ctx,
        token,
        patient_id,
        bruna_id,
        lais_id,
        _prefs_dir: prefs_dir,
    }
}

async fn get(fixture: &Fixture, uri: &str) -> (StatusCode, Value) {
    get_as(fixture, uri, &fixture.token).await
}

async fn get_as(fixture: &Fixture, uri: &str, token: &str) -> (StatusCode, Value) {
    let app = calendar_routes(fixture.ctx.clone());
    let request = Request::builder()
        .uri(uri)
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_events_include_titles_and_patient_color() {
    let fixture = setup().await;

    let (status, body) = get(&fixture, "/events").await;
    assert_eq!(status, StatusCode::OK);

    let events = body["events"].as_array().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["title"], "Rafael Lima — Bruna");
    assert_eq!(events[0]["color"], "#7FDCAC");
    assert_eq!(events[1]["title"], "Rafael Lima — Lais");
    assert_eq!(events[1]["metadata"]["patient_id"], json!(fixture.patient_id));
}

#[tokio::test]
async fn test_professional_filter_is_remembered_between_requests() {
    let fixture = setup().await;

    let (_, filtered) = get(&fixture, &format!("/events?professional_id={}", fixture.lais_id)).await;
    assert_eq!(filtered["events"].as_array().unwrap().len(), 1);
    assert_eq!(filtered["professional_id"], json!(fixture.lais_id));

    let (_, remembered) = get(&fixture, "/events").await;
    assert_eq!(remembered["events"].as_array().unwrap().len(), 1);
    assert_eq!(remembered["events"][0]["metadata"]["professional_id"], json!(fixture.lais_id));

    let (_, cleared) = get(&fixture, "/events?professional_id=").await;
    assert_eq!(cleared["events"].as_array().unwrap().len(), 2);
    assert!(cleared["professional_id"].is_null());
}

#[tokio::test]
async fn test_entity_lookup_by_id() {
    let fixture = setup().await;

    let (status, body) = get(&fixture, &format!("/professionals/{}", fixture.bruna_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entity_type"], "professional");
    assert_eq!(body["entity"]["name"], "Bruna");

    let (status, _) = get(&fixture, &format!("/patients/{}", Uuid::new_v4())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get(&fixture, &format!("/payments/{}", Uuid::new_v4())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_backend_failure_is_bad_gateway() {
    let fixture = setup().await;
    fixture.server.reset().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&fixture.server)
        .await;

    let (status, body) = get(&fixture, "/events").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["kind"], "remote_operation");
}

#[tokio::test]
async fn test_filter_is_shared_through_the_context_preferences() {
    let fixture = setup().await;

    get(&fixture, &format!("/events?professional_id={}", fixture.bruna_id)).await;

    let stored = fixture.ctx.preferences.get_string(shared_utils::preferences::FILTER_PROFESSIONAL);
    assert_eq!(stored, Some(fixture.bruna_id.to_string()));
}

#[tokio::test]
async fn test_token_without_session_is_unauthorized() {
    let fixture = setup().await;
    let other = JwtTestUtils::create_test_token(&TestUser::default(), &fixture.ctx.config.supabase_jwt_secret, Some(2));

    let (status, body) = get_as(&fixture, "/events", &other).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["kind"], "auth");
}
