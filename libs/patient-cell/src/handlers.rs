use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_database::{SupabaseClient, SupabaseStore};
use shared_models::error::AppError;
use uuid::Uuid;

use crate::models::{
    AttestationRequest, ClinicalNoteRequest, PatientRequest, PatientSearchQuery, PaymentRequest,
    ProfessionalListQuery, ProfessionalRequest,
};
use crate::services::{AverageWidthMetrics, PageLayout, PatientService};

fn patient_service(config: &AppConfig, auth: &Authorization<Bearer>) -> PatientService {
    let supabase = Arc::new(SupabaseClient::new(config));
    PatientService::new(Arc::new(SupabaseStore::new(supabase, auth.token())))
}

// ==============================================================================
// PATIENTS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_patients(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let patients = patient_service(&config, &auth).list_patients().await?;

    Ok(Json(json!({
        "patients": patients,
        "total": patients.len()
    })))
}

#[axum::debug_handler]
pub async fn create_patient(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<PatientRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let patient = patient_service(&config, &auth).create_patient(request).await?;

    Ok((StatusCode::CREATED, Json(json!(patient))))
}

#[axum::debug_handler]
pub async fn get_patient(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let patient = patient_service(&config, &auth).get_patient(patient_id).await?;

    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn update_patient(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(patient_id): Path<Uuid>,
    Json(request): Json<PatientRequest>,
) -> Result<Json<Value>, AppError> {
    let patient = patient_service(&config, &auth).update_patient(patient_id, request).await?;

    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn delete_patient(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(patient_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    patient_service(&config, &auth).delete_patient(patient_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn search_patients(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<PatientSearchQuery>,
) -> Result<Json<Value>, AppError> {
    let patients = patient_service(&config, &auth).search_patients(&query.q).await?;

    Ok(Json(json!({
        "patients": patients,
        "total": patients.len()
    })))
}

#[axum::debug_handler]
pub async fn get_financial_summary(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let summary = patient_service(&config, &auth).financial_summary(patient_id).await?;

    Ok(Json(json!({
        "patient_id": patient_id,
        "summary": summary
    })))
}

// ==============================================================================
// CLINICAL NOTES
// ==============================================================================

#[axum::debug_handler]
pub async fn list_notes(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let notes = patient_service(&config, &auth).notes_for_patient(patient_id).await?;

    Ok(Json(json!({ "notes": notes })))
}

#[axum::debug_handler]
pub async fn create_note(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(patient_id): Path<Uuid>,
    Json(request): Json<ClinicalNoteRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let note = patient_service(&config, &auth).create_note(patient_id, request).await?;

    Ok((StatusCode::CREATED, Json(json!(note))))
}

#[axum::debug_handler]
pub async fn update_note(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(note_id): Path<Uuid>,
    Json(request): Json<ClinicalNoteRequest>,
) -> Result<Json<Value>, AppError> {
    let note = patient_service(&config, &auth).update_note(note_id, request).await?;

    Ok(Json(json!(note)))
}

#[axum::debug_handler]
pub async fn delete_note(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(note_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    patient_service(&config, &auth).delete_note(note_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

// ==============================================================================
// PAYMENTS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_payments(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let payments = patient_service(&config, &auth).payments_for_patient(patient_id).await?;

    Ok(Json(json!({ "payments": payments })))
}

#[axum::debug_handler]
pub async fn create_payment(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(patient_id): Path<Uuid>,
    Json(request): Json<PaymentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let payment = patient_service(&config, &auth).create_payment(patient_id, request).await?;

    Ok((StatusCode::CREATED, Json(json!(payment))))
}

#[axum::debug_handler]
pub async fn update_payment(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(payment_id): Path<Uuid>,
    Json(request): Json<PaymentRequest>,
) -> Result<Json<Value>, AppError> {
    let payment = patient_service(&config, &auth).update_payment(payment_id, request).await?;

    Ok(Json(json!(payment)))
}

#[axum::debug_handler]
pub async fn delete_payment(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(payment_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    patient_service(&config, &auth).delete_payment(payment_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

// ==============================================================================
// ATTESTATIONS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_attestations(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let attestations = patient_service(&config, &auth).attestations_for_patient(patient_id).await?;

    Ok(Json(json!({ "attestations": attestations })))
}

#[axum::debug_handler]
pub async fn create_attestation(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(patient_id): Path<Uuid>,
    Json(request): Json<AttestationRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let attestation = patient_service(&config, &auth).create_attestation(patient_id, request).await?;

    Ok((StatusCode::CREATED, Json(json!(attestation))))
}

#[axum::debug_handler]
pub async fn get_attestation(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(attestation_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let attestation = patient_service(&config, &auth).get_attestation(attestation_id).await?;

    Ok(Json(json!(attestation)))
}

#[axum::debug_handler]
pub async fn get_attestation_document(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(attestation_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let document = patient_service(&config, &auth)
        .attestation_document(attestation_id, PageLayout::default(), &AverageWidthMetrics::default())
        .await?;

    Ok(Json(json!(document)))
}

#[axum::debug_handler]
pub async fn update_attestation(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(attestation_id): Path<Uuid>,
    Json(request): Json<AttestationRequest>,
) -> Result<Json<Value>, AppError> {
    let attestation = patient_service(&config, &auth)
        .update_attestation(attestation_id, request)
        .await?;

    Ok(Json(json!(attestation)))
}

// ==============================================================================
// PROFESSIONALS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_professionals(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<ProfessionalListQuery>,
) -> Result<Json<Value>, AppError> {
    let professionals = patient_service(&config, &auth)
        .list_professionals(query.include_inactive)
        .await?;

    Ok(Json(json!({
        "professionals": professionals,
        "total": professionals.len()
    })))
}

#[axum::debug_handler]
pub async fn create_professional(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<ProfessionalRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let professional = patient_service(&config, &auth).create_professional(request).await?;

    Ok((StatusCode::CREATED, Json(json!(professional))))
}

#[axum::debug_handler]
pub async fn get_professional(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(professional_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let professional = patient_service(&config, &auth).get_professional(professional_id).await?;

    Ok(Json(json!(professional)))
}

#[axum::debug_handler]
pub async fn update_professional(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(professional_id): Path<Uuid>,
    Json(request): Json<ProfessionalRequest>,
) -> Result<Json<Value>, AppError> {
    let professional = patient_service(&config, &auth)
        .update_professional(professional_id, request)
        .await?;

    Ok(Json(json!(professional)))
}

#[axum::debug_handler]
pub async fn delete_professional(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(professional_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    patient_service(&config, &auth).delete_professional(professional_id).await?;

    Ok(StatusCode::NO_CONTENT)
}
