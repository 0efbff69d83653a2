use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use holiday_cell::{HolidayCalculator, HolidaySet};
use scheduling_cell::SchedulingStore;
use shared_database::{fetch_all, insert_record, update_record, Query};
use shared_models::entities::{Appointment, EntityType};
use shared_models::error::AppError;

use crate::models::{AppointmentError, AppointmentRequest, ProposedAppointment, ValidationResult};
use crate::services::validator::AppointmentValidator;

pub const DEFAULT_APPOINTMENT_COLOR: &str = "#2A9D8F";
pub const DEFAULT_UPCOMING_LIMIT: usize = 5;

/// Validated appointment writes against the backing store.
///
/// Nothing is mutated locally: every successful write is followed by a
/// snapshot refresh so readers see the store's version of the row.
pub struct BookingService<'a> {
    calculator: &'a HolidayCalculator,
    validator: &'a AppointmentValidator,
    store: Arc<SchedulingStore>,
}

impl<'a> BookingService<'a> {
    pub fn new(
        calculator: &'a HolidayCalculator,
        validator: &'a AppointmentValidator,
        store: Arc<SchedulingStore>,
    ) -> Self {
        Self {
            calculator,
            validator,
            store,
        }
    }

    pub fn validator(&self) -> &AppointmentValidator {
        self.validator
    }

    /// Holidays on the local days touched by `proposed`.
    fn holidays_for(&self, proposed: &ProposedAppointment) -> Result<HolidaySet, AppointmentError> {
        let first = self.validator.local_date(proposed.start);
        let last = self.validator.local_date(proposed.end).max(first);
        Ok(self.calculator.holidays_for_view(first, last)?)
    }

    /// Runs the validator against the current snapshot.
    pub async fn validate(&self, proposed: &ProposedAppointment) -> Result<ValidationResult, AppointmentError> {
        if proposed.end <= proposed.start {
            return Ok(self.validator.validate(proposed, &HolidaySet::new(), &[]));
        }

        let holidays = self.holidays_for(proposed)?;
        let snapshot = self.store.snapshot().await;
        let existing: Vec<Appointment> = snapshot.appointments().into_iter().cloned().collect();

        Ok(self.validator.validate(proposed, &holidays, &existing))
    }

    pub async fn selection_allowed(&self, start: DateTime<Utc>) -> Result<bool, AppointmentError> {
        let day = self.validator.local_date(start);
        let holidays = self.calculator.holidays_for_view(day, day)?;
        Ok(self.validator.selection_allowed(start, &holidays))
    }

    async fn ensure_accepted(&self, proposed: &ProposedAppointment) -> Result<(), AppointmentError> {
        let result = self.validate(proposed).await?;
        match result.reason {
            Some(reason) if !result.accepted => Err(AppointmentError::Rejected {
                reason,
                detail: result.detail,
            }),
            _ => Ok(()),
        }
    }

    async fn refresh_after_write(&self) {
        if let Err(e) = self.store.refresh().await {
            warn!("Write succeeded but snapshot refresh failed: {}", e);
        }
    }

    pub async fn create_appointment(&self, request: AppointmentRequest) -> Result<Appointment, AppointmentError> {
        let patient_id = request
            .patient_id
            .ok_or(AppointmentError::MissingField("Selecione um paciente."))?;
        let professional_id = request
            .professional_id
            .ok_or(AppointmentError::MissingField("Selecione um profissional."))?;
        let (start, end) = match (request.start, request.end) {
            (Some(start), Some(end)) => (start, end),
            _ => return Err(AppointmentError::MissingField("Informe início e fim.")),
        };

        let proposed = ProposedAppointment {
            start,
            end,
            patient_id: Some(patient_id),
            professional_id: Some(professional_id),
            exclude_id: None,
        };
        self.ensure_accepted(&proposed).await?;

        let snapshot = self.store.snapshot().await;
        let color = request
            .color
            .filter(|c| !c.is_empty())
            .or_else(|| snapshot.patient(patient_id).and_then(|p| p.color.clone()))
            .unwrap_or_else(|| DEFAULT_APPOINTMENT_COLOR.to_string());

        let now = Utc::now();
        let row = json!({
            "id": Uuid::new_v4(),
            "patient_id": patient_id,
            "professional_id": professional_id,
            "start_time": start,
            "end_time": end,
            "room": request.room.unwrap_or_default(),
            "color": color,
            "notes": request.notes.unwrap_or_default(),
            "created_at": now,
            "updated_at": now,
        });

        let created: Appointment = insert_record(self.store.backing().as_ref(), row).await?;
        info!("Appointment {} created for patient {}", created.id, patient_id);

        self.refresh_after_write().await;
        Ok(created)
    }

    /// Applies the provided fields over the stored appointment and re-validates
    /// the resulting range, ignoring the appointment itself for overlaps.
    pub async fn update_appointment(
        &self,
        id: Uuid,
        request: AppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let snapshot = self.store.snapshot().await;
        let current = snapshot
            .appointment(id)
            .cloned()
            .ok_or(AppointmentError::NotFound(id))?;

        let proposed = ProposedAppointment {
            start: request.start.unwrap_or(current.start),
            end: request.end.unwrap_or(current.end),
            patient_id: request.patient_id.or(Some(current.patient_id)),
            professional_id: request.professional_id.or(current.professional_id),
            exclude_id: Some(id),
        };
        self.ensure_accepted(&proposed).await?;

        let mut patch = Map::new();
        if let Some(patient_id) = request.patient_id {
            patch.insert("patient_id".into(), json!(patient_id));
        }
        if let Some(professional_id) = request.professional_id {
            patch.insert("professional_id".into(), json!(professional_id));
        }
        patch.insert("start_time".into(), json!(proposed.start));
        patch.insert("end_time".into(), json!(proposed.end));
        if let Some(color) = request.color {
            patch.insert("color".into(), json!(color));
        }
        if let Some(notes) = request.notes {
            patch.insert("notes".into(), json!(notes));
        }
        if let Some(room) = request.room {
            patch.insert("room".into(), json!(room));
        }
        patch.insert("updated_at".into(), json!(Utc::now()));

        let updated: Appointment = update_record(self.store.backing().as_ref(), id, Value::Object(patch)).await?;
        info!("Appointment {} updated", id);

        self.refresh_after_write().await;
        Ok(updated)
    }

    pub async fn delete_appointment(&self, id: Uuid) -> Result<(), AppointmentError> {
        self.store
            .backing()
            .delete_row(EntityType::Appointments, id)
            .await?;
        info!("Appointment {} deleted", id);

        self.refresh_after_write().await;
        Ok(())
    }

    /// Next appointments from now on, soonest first.
    pub async fn upcoming_appointments(&self, limit: usize) -> Result<Vec<Appointment>, AppointmentError> {
        let query = Query::new()
            .gte("start_time", Utc::now().to_rfc3339())
            .order("start_time", true)
            .limit(limit);

        let appointments = fetch_all(self.store.backing().as_ref(), &query).await?;
        debug!("Found {} upcoming appointments", appointments.len());
        Ok(appointments)
    }

    /// A patient's appointment history, most recent first.
    pub async fn appointments_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        let query = Query::new()
            .eq("patient_id", patient_id)
            .order("start_time", false);

        Ok(fetch_all(self.store.backing().as_ref(), &query).await?)
    }
}
