// libs/scheduling-cell/src/models.rs
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::entities::{Appointment, Patient, Professional};

// ==============================================================================
// SNAPSHOT
// ==============================================================================

/// Last known state of the backing store. Never mutated after construction.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    patients: HashMap<Uuid, Patient>,
    professionals: HashMap<Uuid, Professional>,
    appointments: HashMap<Uuid, Appointment>,
    refreshed_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    pub fn new(
        patients: Vec<Patient>,
        professionals: Vec<Professional>,
        appointments: Vec<Appointment>,
        refreshed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            patients: patients.into_iter().map(|p| (p.id, p)).collect(),
            professionals: professionals.into_iter().map(|p| (p.id, p)).collect(),
            appointments: appointments.into_iter().map(|a| (a.id, a)).collect(),
            refreshed_at: Some(refreshed_at),
        }
    }

    /// `None` until the first successful refresh.
    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }

    pub fn patient(&self, id: Uuid) -> Option<&Patient> {
        self.patients.get(&id)
    }

    pub fn professional(&self, id: Uuid) -> Option<&Professional> {
        self.professionals.get(&id)
    }

    pub fn appointment(&self, id: Uuid) -> Option<&Appointment> {
        self.appointments.get(&id)
    }

    /// Patients ordered by name.
    pub fn patients(&self) -> Vec<&Patient> {
        let mut patients: Vec<&Patient> = self.patients.values().collect();
        patients.sort_by(|a, b| a.name.cmp(&b.name));
        patients
    }

    pub fn professionals(&self, include_inactive: bool) -> Vec<&Professional> {
        let mut professionals: Vec<&Professional> = self
            .professionals
            .values()
            .filter(|p| include_inactive || p.active)
            .collect();
        professionals.sort_by(|a, b| a.name.cmp(&b.name));
        professionals
    }

    /// Appointments ordered by start time.
    pub fn appointments(&self) -> Vec<&Appointment> {
        let mut appointments: Vec<&Appointment> = self.appointments.values().collect();
        appointments.sort_by_key(|a| (a.start, a.id));
        appointments
    }
}

/// One entity returned by `SchedulingStore::get_by_id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "entity_type", content = "entity", rename_all = "snake_case")]
pub enum SnapshotEntity {
    Patient(Patient),
    Professional(Professional),
    Appointment(Appointment),
}

// ==============================================================================
// CALENDAR FEED
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEventMetadata {
    pub patient_id: Uuid,
    pub professional_id: Option<Uuid>,
    pub notes: String,
    pub room: String,
}

/// Event record handed to the calendar widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: Uuid,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub color: String,
    pub metadata: CalendarEventMetadata,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CalendarQuery {
    /// Empty string clears a remembered filter.
    pub professional_id: Option<String>,
}
