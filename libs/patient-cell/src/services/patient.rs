use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_database::{fetch_all, fetch_by_id, insert_record, update_record, BackingStore, Query};
use shared_models::entities::{
    Attestation, ClinicalNote, EntityType, Patient, Payment, PaymentMethod, PaymentStatus, Professional,
};

use crate::models::{
    AttestationRequest, ClinicalNoteRequest, FinancialSummary, PatientError, PatientRequest, PaymentRequest,
    ProfessionalRequest,
};
use crate::services::documents::{AttestationDocument, AttestationSheet, FontMetrics, PageLayout};
use crate::services::records::{clean_cpf, financial_summary, leave_end_date, matches_search, pick_color};

type Result<T> = std::result::Result<T, PatientError>;

/// Patient-facing records: patients, professionals, clinical notes,
/// payments and attestations.
pub struct PatientService {
    backing: Arc<dyn BackingStore>,
}

/// Request body as a PATCH object, dropping absent fields.
fn to_patch<T: Serialize>(request: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(request) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(PatientError::ValidationError("Expected an object".to_string())),
        Err(e) => Err(PatientError::ValidationError(e.to_string())),
    }
}

fn required_name(name: Option<String>, message: &str) -> Result<String> {
    match name.map(|n| n.trim().to_string()) {
        Some(name) if !name.is_empty() => Ok(name),
        _ => Err(PatientError::ValidationError(message.to_string())),
    }
}

impl PatientService {
    pub fn new(backing: Arc<dyn BackingStore>) -> Self {
        Self { backing }
    }

    fn store(&self) -> &dyn BackingStore {
        self.backing.as_ref()
    }

    // ==========================================================================
    // PATIENTS
    // ==========================================================================

    pub async fn list_patients(&self) -> Result<Vec<Patient>> {
        Ok(fetch_all(self.store(), &Query::new().order("name", true)).await?)
    }

    pub async fn get_patient(&self, id: Uuid) -> Result<Patient> {
        Ok(fetch_by_id(self.store(), id).await?)
    }

    pub async fn create_patient(&self, request: PatientRequest) -> Result<Patient> {
        let name = required_name(request.name, "Informe o nome do paciente.")?;
        let id = Uuid::new_v4();
        let now = Utc::now();

        let row = json!({
            "id": id,
            "name": name,
            "cpf": clean_cpf(request.cpf.as_deref().unwrap_or_default()),
            "email": request.email.unwrap_or_default(),
            "phone": request.phone.unwrap_or_default(),
            "address": request.address.unwrap_or_default(),
            "color": request.color.filter(|c| !c.is_empty()).unwrap_or_else(|| pick_color(&id).to_string()),
            "consultation_value": request.consultation_value.unwrap_or(0.0),
            "financial_note": request.financial_note.unwrap_or_default(),
            "created_at": now,
            "updated_at": now,
        });

        let patient: Patient = insert_record(self.store(), row).await?;
        info!("Patient {} registered", patient.id);
        Ok(patient)
    }

    pub async fn update_patient(&self, id: Uuid, request: PatientRequest) -> Result<Patient> {
        if let Some(name) = &request.name {
            if name.trim().is_empty() {
                return Err(PatientError::ValidationError("Informe o nome do paciente.".to_string()));
            }
        }

        let mut patch = to_patch(&request)?;
        if let Some(cpf) = &request.cpf {
            patch.insert("cpf".into(), json!(clean_cpf(cpf)));
        }
        patch.insert("updated_at".into(), json!(Utc::now()));

        Ok(update_record(self.store(), id, Value::Object(patch)).await?)
    }

    pub async fn delete_patient(&self, id: Uuid) -> Result<()> {
        self.store().delete_row(EntityType::Patients, id).await?;
        info!("Patient {} removed", id);
        Ok(())
    }

    /// Name (accent- and case-insensitive) or exact CPF search.
    ///
    /// A query without letters is treated as a CPF and filtered by the backing
    /// store; name matching happens here, since `ilike` does not fold accents.
    pub async fn search_patients(&self, query: &str) -> Result<Vec<Patient>> {
        let query = query.trim();
        if query.is_empty() {
            return self.list_patients().await;
        }

        let cpf = clean_cpf(query);
        let candidates: Vec<Patient> = if !cpf.is_empty() && !query.chars().any(char::is_alphabetic) {
            fetch_all(self.store(), &Query::new().eq("cpf", &cpf).order("name", true)).await?
        } else {
            self.list_patients().await?
        };

        let found: Vec<Patient> = candidates
            .into_iter()
            .filter(|p| matches_search(&p.name, &p.cpf, query))
            .collect();

        debug!("Patient search '{}' matched {}", query, found.len());
        Ok(found)
    }

    // ==========================================================================
    // PROFESSIONALS
    // ==========================================================================

    pub async fn list_professionals(&self, include_inactive: bool) -> Result<Vec<Professional>> {
        let mut query = Query::new().order("name", true);
        if !include_inactive {
            query = query.eq("active", true);
        }
        Ok(fetch_all(self.store(), &query).await?)
    }

    pub async fn get_professional(&self, id: Uuid) -> Result<Professional> {
        Ok(fetch_by_id(self.store(), id).await?)
    }

    pub async fn create_professional(&self, request: ProfessionalRequest) -> Result<Professional> {
        let name = required_name(request.name, "Informe o nome do profissional.")?;
        let id = Uuid::new_v4();

        let row = json!({
            "id": id,
            "name": name,
            "email": request.email.unwrap_or_default(),
            "color": request.color.filter(|c| !c.is_empty()).unwrap_or_else(|| pick_color(&id).to_string()),
            "notify_email": request.notify_email.unwrap_or(false),
            "crp": request.crp,
            "active": request.active.unwrap_or(true),
            "created_at": Utc::now(),
        });

        let professional: Professional = insert_record(self.store(), row).await?;
        info!("Professional {} registered", professional.id);
        Ok(professional)
    }

    pub async fn update_professional(&self, id: Uuid, request: ProfessionalRequest) -> Result<Professional> {
        let patch = to_patch(&request)?;
        Ok(update_record(self.store(), id, Value::Object(patch)).await?)
    }

    pub async fn delete_professional(&self, id: Uuid) -> Result<()> {
        self.store().delete_row(EntityType::Professionals, id).await?;
        info!("Professional {} removed", id);
        Ok(())
    }

    // ==========================================================================
    // CLINICAL NOTES
    // ==========================================================================

    pub async fn notes_for_patient(&self, patient_id: Uuid) -> Result<Vec<ClinicalNote>> {
        let query = Query::new()
            .eq("patient_id", patient_id)
            .order("note_date", false);
        Ok(fetch_all(self.store(), &query).await?)
    }

    pub async fn create_note(&self, patient_id: Uuid, request: ClinicalNoteRequest) -> Result<ClinicalNote> {
        let now = Utc::now();
        let row = json!({
            "id": Uuid::new_v4(),
            "patient_id": patient_id,
            "professional_id": request.professional_id,
            "appointment_id": request.appointment_id,
            "note_date": request.note_date.unwrap_or(now),
            "content": request.content.unwrap_or_default(),
            "created_at": now,
        });

        Ok(insert_record(self.store(), row).await?)
    }

    pub async fn update_note(&self, id: Uuid, request: ClinicalNoteRequest) -> Result<ClinicalNote> {
        let patch = to_patch(&request)?;
        Ok(update_record(self.store(), id, Value::Object(patch)).await?)
    }

    pub async fn delete_note(&self, id: Uuid) -> Result<()> {
        Ok(self.store().delete_row(EntityType::ClinicalNotes, id).await?)
    }

    // ==========================================================================
    // PAYMENTS
    // ==========================================================================

    pub async fn payments_for_patient(&self, patient_id: Uuid) -> Result<Vec<Payment>> {
        let query = Query::new()
            .eq("patient_id", patient_id)
            .order("payment_date", false);
        Ok(fetch_all(self.store(), &query).await?)
    }

    fn payment_patch(request: &PaymentRequest) -> Result<Map<String, Value>> {
        if let Some(amount) = request.amount {
            if !amount.is_finite() || amount < 0.0 {
                return Err(PatientError::ValidationError("Valor de pagamento inválido.".to_string()));
            }
        }

        let mut patch = to_patch(request)?;
        if let Some(card) = patch.remove("card").and(request.card.as_ref()) {
            patch.insert("card_type".into(), json!(card.card_type));
            patch.insert("card_brand".into(), json!(card.brand));
            patch.insert("card_installments".into(), json!(card.installments.unwrap_or(1).max(1)));
            patch.insert("card_authorization".into(), json!(card.authorization));
            patch.insert("card_fee".into(), json!(card.fee.unwrap_or(0.0)));
        }
        Ok(patch)
    }

    pub async fn create_payment(&self, patient_id: Uuid, request: PaymentRequest) -> Result<Payment> {
        let mut row = Self::payment_patch(&request)?;
        row.insert("id".into(), json!(Uuid::new_v4()));
        row.insert("patient_id".into(), json!(patient_id));
        row.entry("amount").or_insert(json!(0.0));
        row.entry("payment_date").or_insert(json!(Utc::now()));
        row.entry("status").or_insert(json!(PaymentStatus::Pending));
        row.entry("method").or_insert(json!(PaymentMethod::Pix));
        row.entry("card_installments").or_insert(json!(1));
        row.entry("note").or_insert(json!(""));
        row.insert("created_at".into(), json!(Utc::now()));

        let payment: Payment = insert_record(self.store(), Value::Object(row)).await?;
        info!("Payment {} recorded for patient {}", payment.id, patient_id);
        Ok(payment)
    }

    pub async fn update_payment(&self, id: Uuid, request: PaymentRequest) -> Result<Payment> {
        let patch = Self::payment_patch(&request)?;
        Ok(update_record(self.store(), id, Value::Object(patch)).await?)
    }

    pub async fn delete_payment(&self, id: Uuid) -> Result<()> {
        Ok(self.store().delete_row(EntityType::Payments, id).await?)
    }

    pub async fn financial_summary(&self, patient_id: Uuid) -> Result<FinancialSummary> {
        let payments = self.payments_for_patient(patient_id).await?;
        Ok(financial_summary(&payments))
    }

    // ==========================================================================
    // ATTESTATIONS
    // ==========================================================================

    pub async fn attestations_for_patient(&self, patient_id: Uuid) -> Result<Vec<Attestation>> {
        let query = Query::new()
            .eq("patient_id", patient_id)
            .order("created_at", false);
        Ok(fetch_all(self.store(), &query).await?)
    }

    pub async fn get_attestation(&self, id: Uuid) -> Result<Attestation> {
        Ok(fetch_by_id(self.store(), id).await?)
    }

    pub async fn create_attestation(&self, patient_id: Uuid, request: AttestationRequest) -> Result<Attestation> {
        let end_date = request.end_date.or_else(|| {
            request
                .start_date
                .zip(request.days_off)
                .and_then(|(start, days)| leave_end_date(start, days))
        });

        let row = json!({
            "id": Uuid::new_v4(),
            "patient_id": patient_id,
            "professional_id": request.professional_id,
            "doc_date": request.doc_date.unwrap_or_else(|| Utc::now().date_naive()),
            "days_off": request.days_off,
            "start_date": request.start_date,
            "end_date": end_date,
            "content": request.content.unwrap_or_default(),
            "created_at": Utc::now(),
        });

        Ok(insert_record(self.store(), row).await?)
    }

    pub async fn update_attestation(&self, id: Uuid, request: AttestationRequest) -> Result<Attestation> {
        let patch = to_patch(&request)?;
        Ok(update_record(self.store(), id, Value::Object(patch)).await?)
    }

    /// The attestation laid out for printing, with patient and professional
    /// details filled in.
    pub async fn attestation_document(
        &self,
        id: Uuid,
        layout: PageLayout,
        metrics: &dyn FontMetrics,
    ) -> Result<AttestationDocument> {
        let attestation = self.get_attestation(id).await?;
        let patient = self.get_patient(attestation.patient_id).await?;
        let professional = match attestation.professional_id {
            Some(professional_id) => Some(self.get_professional(professional_id).await?),
            None => None,
        };

        let sheet = AttestationSheet {
            patient_name: patient.name,
            patient_cpf: patient.cpf,
            professional_name: professional.as_ref().map(|p| p.name.clone()).unwrap_or_default(),
            professional_crp: professional.and_then(|p| p.crp).unwrap_or_default(),
            doc_date: Some(attestation.doc_date),
            days_off: attestation.days_off,
            start_date: attestation.start_date,
            end_date: attestation.end_date,
        };

        let document = AttestationDocument::compose(&sheet, &attestation.content, layout, metrics);
        debug!("Attestation {} laid out on {} page(s)", id, document.pages.len());
        Ok(document)
    }
}
