use std::sync::Arc;

use assert_matches::assert_matches;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use patient_cell::router::{create_patient_router, create_professional_router};
use patient_cell::{PatientError, PatientRequest, PatientService, PaymentRequest};
use shared_database::{DatabaseError, SupabaseClient, SupabaseStore};
use shared_models::entities::PaymentStatus;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};

fn service_for(server: &MockServer) -> PatientService {
    let config = TestConfig::with_url(server.uri()).to_app_config();
    let client = Arc::new(SupabaseClient::new(&config));
    PatientService::new(Arc::new(SupabaseStore::new(client, "session-token")))
}

async fn call(app: axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let config = TestConfig::default();
    let token = JwtTestUtils::create_test_token(&TestUser::default(), &config.jwt_secret, Some(1));

    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {}", token));
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app.oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, json)
}

#[tokio::test]
async fn test_search_folds_accents_in_names() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("order", "name.asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_row(Uuid::new_v4(), "Laís Conceição", "11122233344"),
            MockSupabaseResponses::patient_row(Uuid::new_v4(), "Rafael Lima", "00295261676"),
        ])))
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server);
    let found = service.search_patients("lais").await.unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].name, "Laís Conceição");
}

#[tokio::test]
async fn test_search_by_formatted_cpf_filters_server_side() {
    let mock_server = MockServer::start().await;
    let rafael = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("cpf", "eq.00295261676"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_row(rafael, "Rafael Lima", "00295261676"),
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let found = service_for(&mock_server).search_patients("002.952.616-76").await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, rafael);
}

#[tokio::test]
async fn test_create_patient_stores_cpf_digits() {
    let mock_server = MockServer::start().await;
    let id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/rest/v1/patients"))
        .and(body_partial_json(json!([{ "name": "Rafael Lima", "cpf": "00295261676" }])))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::patient_row(id, "Rafael Lima", "00295261676")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let patient = service_for(&mock_server)
        .create_patient(PatientRequest {
            name: Some("  Rafael Lima ".into()),
            cpf: Some("002.952.616-76".into()),
            ..PatientRequest::default()
        })
        .await
        .unwrap();

    assert_eq!(patient.id, id);
}

#[tokio::test]
async fn test_blank_name_is_rejected_before_any_request() {
    let mock_server = MockServer::start().await;

    let result = service_for(&mock_server)
        .create_patient(PatientRequest {
            name: Some("   ".into()),
            ..PatientRequest::default()
        })
        .await;

    assert_matches!(result, Err(PatientError::ValidationError(_)));
    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_payment_defaults_and_card_flattening() {
    let mock_server = MockServer::start().await;
    let patient_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/rest/v1/payments"))
        .and(body_partial_json(json!([{
            "status": "PENDING",
            "method": "CARD",
            "card_brand": "VISA",
            "card_installments": 3
        }])))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::payment_row(patient_id, 300.0, "PENDING")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let request: PaymentRequest = serde_json::from_value(json!({
        "amount": 300.0,
        "method": "CARD",
        "card": { "type": "CREDIT", "brand": "VISA", "installments": 3 }
    }))
    .unwrap();

    let payment = service_for(&mock_server).create_payment(patient_id, request).await.unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);
}

#[tokio::test]
async fn test_negative_payment_amount_is_rejected() {
    let mock_server = MockServer::start().await;

    let result = service_for(&mock_server)
        .create_payment(
            Uuid::new_v4(),
            PaymentRequest {
                amount: Some(-10.0),
                ..PaymentRequest::default()
            },
        )
        .await;

    assert_matches!(result, Err(PatientError::ValidationError(_)));
}

#[tokio::test]
async fn test_missing_patient_maps_to_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let result = service_for(&mock_server).get_patient(Uuid::new_v4()).await;
    assert_matches!(result, Err(PatientError::DatabaseError(DatabaseError::NotFound(_))));
}

#[tokio::test]
async fn test_financial_summary_route() {
    let mock_server = MockServer::start().await;
    let patient_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/payments"))
        .and(query_param("patient_id", format!("eq.{}", patient_id)))
        .and(query_param("order", "payment_date.desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::payment_row(patient_id, 200.0, "PAID"),
            MockSupabaseResponses::payment_row(patient_id, 100.0, "PARTIAL"),
            MockSupabaseResponses::payment_row(patient_id, 180.0, "FREE"),
        ])))
        .mount(&mock_server)
        .await;

    let app = create_patient_router(TestConfig::with_url(mock_server.uri()).to_arc());
    let (status, body) = call(app, "GET", &format!("/{}/financial-summary", patient_id), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"]["total"], 480.0);
    assert_eq!(body["summary"]["paid"], 250.0);
    assert_eq!(body["summary"]["pending"], 50.0);
    assert_eq!(body["summary"]["balance"], 50.0);
}

#[tokio::test]
async fn test_search_route_and_backend_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&mock_server)
        .await;

    let app = create_patient_router(TestConfig::with_url(mock_server.uri()).to_arc());
    let (status, body) = call(app, "GET", "/search?q=rafael", None).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["kind"], "remote_operation");
}

#[tokio::test]
async fn test_professionals_listing_hides_inactive_by_default() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/professionals"))
        .and(query_param("active", "eq.true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::professional_row(Uuid::new_v4(), "Bruna")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = create_professional_router(TestConfig::with_url(mock_server.uri()).to_arc());
    let (status, body) = call(app, "GET", "/", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
}

#[tokio::test]
async fn test_attestation_document_route_lays_out_default_text() {
    let mock_server = MockServer::start().await;
    let attestation_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();
    let professional_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/attestations"))
        .and(query_param("id", format!("eq.{}", attestation_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": attestation_id,
            "patient_id": patient_id,
            "professional_id": professional_id,
            "doc_date": "2024-05-02",
            "days_off": 2,
            "content": ""
        }])))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_row(patient_id, "Rafael Lima", "00295261676")
        ])))
        .mount(&mock_server)
        .await;
    let mut bruna = MockSupabaseResponses::professional_row(professional_id, "Bruna");
    bruna["crp"] = json!("06/12345");
    Mock::given(method("GET"))
        .and(path("/rest/v1/professionals"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([bruna])))
        .mount(&mock_server)
        .await;

    let app = create_patient_router(TestConfig::with_url(mock_server.uri()).to_arc());
    let (status, body) = call(app, "GET", &format!("/attestations/{}/document", attestation_id), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["file_name"], "atestado_Rafael_Lima_2024-05-02.pdf");
    assert!(body["body"].as_str().unwrap().contains("na data de 02/05/2024, por 2 dia(s)."));

    let placements = body["pages"][0]["placements"].as_array().unwrap();
    let texts: Vec<&str> = placements.iter().map(|p| p["text"].as_str().unwrap()).collect();
    assert_eq!(&texts[..7], &[
        "ATESTADO",
        "Paciente: Rafael Lima",
        "CPF: 002.952.616-76",
        "Profissional: Bruna",
        "CRP: 06/12345",
        "Data: 02/05/2024",
        "Dias: 2",
    ]);
    assert!(placements.iter().all(|p| p["maxWidth"] == 495.0 && p["x"] == 50.0));
}
