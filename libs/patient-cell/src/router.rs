use std::sync::Arc;
use axum::{middleware, routing::{get, put}, Router};
use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::*;

pub fn create_patient_router(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(list_patients).post(create_patient))
        .route("/search", get(search_patients))
        .route("/{id}", get(get_patient).put(update_patient).delete(delete_patient))
        .route("/{id}/financial-summary", get(get_financial_summary))
        .route("/{id}/notes", get(list_notes).post(create_note))
        .route("/{id}/payments", get(list_payments).post(create_payment))
        .route("/{id}/attestations", get(list_attestations).post(create_attestation))
        .route("/notes/{note_id}", put(update_note).delete(delete_note))
        .route("/payments/{payment_id}", put(update_payment).delete(delete_payment))
        .route("/attestations/{attestation_id}", get(get_attestation).put(update_attestation))
        .route("/attestations/{attestation_id}/document", get(get_attestation_document))
        .layer(middleware::from_fn_with_state(config.clone(), auth_middleware))
        .with_state(config)
}

pub fn create_professional_router(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(list_professionals).post(create_professional))
        .route(
            "/{id}",
            get(get_professional).put(update_professional).delete(delete_professional),
        )
        .layer(middleware::from_fn_with_state(config.clone(), auth_middleware))
        .with_state(config)
}
