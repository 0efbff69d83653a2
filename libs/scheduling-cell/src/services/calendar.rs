use tracing::warn;
use uuid::Uuid;

use shared_utils::preferences::{PreferenceStore, FILTER_PROFESSIONAL};

use crate::models::{CalendarEvent, CalendarEventMetadata, Snapshot};

pub const DEFAULT_EVENT_COLOR: &str = "#7FDCAC";

/// Renders the snapshot's appointments for the calendar widget, optionally
/// narrowed to one professional.
pub fn build_calendar_events(snapshot: &Snapshot, professional_filter: Option<Uuid>) -> Vec<CalendarEvent> {
    snapshot
        .appointments()
        .into_iter()
        .filter(|appointment| match professional_filter {
            Some(filter) => appointment.professional_id == Some(filter),
            None => true,
        })
        .map(|appointment| {
            let patient = snapshot.patient(appointment.patient_id);
            let professional = appointment
                .professional_id
                .and_then(|id| snapshot.professional(id));

            let mut title = patient
                .map(|p| p.name.clone())
                .unwrap_or_else(|| "Paciente".to_string());
            if let Some(professional) = professional {
                title.push_str(" — ");
                title.push_str(&professional.name);
            }

            let color = appointment
                .color
                .clone()
                .filter(|c| !c.is_empty())
                .or_else(|| patient.and_then(|p| p.color.clone()))
                .unwrap_or_else(|| DEFAULT_EVENT_COLOR.to_string());

            CalendarEvent {
                id: appointment.id,
                title,
                start: appointment.start,
                end: appointment.end,
                color,
                metadata: CalendarEventMetadata {
                    patient_id: appointment.patient_id,
                    professional_id: appointment.professional_id,
                    notes: appointment.notes.clone(),
                    room: appointment.room.clone(),
                },
            }
        })
        .collect()
}

/// Applies and remembers the professional filter.
///
/// `Some("")` clears it, `Some(id)` replaces it, `None` reuses the stored one.
/// Stored ids for professionals no longer in the snapshot are ignored.
pub fn resolve_professional_filter(
    preferences: &PreferenceStore,
    requested: Option<&str>,
    snapshot: &Snapshot,
) -> Option<Uuid> {
    if let Some(raw) = requested {
        if let Err(e) = preferences.set(FILTER_PROFESSIONAL, raw) {
            warn!("Could not persist professional filter: {}", e);
        }
    }

    preferences
        .get_string(FILTER_PROFESSIONAL)
        .and_then(|raw| raw.parse::<Uuid>().ok())
        .filter(|id| snapshot.professional(*id).is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use shared_models::entities::{Appointment, Patient, Professional};
    use tempfile::tempdir;

    fn patient(name: &str, color: Option<&str>) -> Patient {
        Patient {
            id: Uuid::new_v4(),
            name: name.to_string(),
            cpf: String::new(),
            email: String::new(),
            phone: String::new(),
            address: String::new(),
            color: color.map(str::to_string),
            consultation_value: 0.0,
            financial_note: String::new(),
            created_at: None,
            updated_at: None,
        }
    }

    fn professional(name: &str) -> Professional {
        Professional {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: String::new(),
            color: None,
            notify_email: false,
            crp: None,
            active: true,
            created_at: None,
        }
    }

    fn appointment(patient_id: Uuid, professional_id: Option<Uuid>, hour: u32, color: Option<&str>) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            patient_id,
            professional_id,
            start: Utc.with_ymd_and_hms(2024, 5, 2, hour, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2024, 5, 2, hour + 1, 0, 0).unwrap(),
            color: color.map(str::to_string),
            notes: "retorno".to_string(),
            room: "2".to_string(),
        }
    }

    #[test]
    fn titles_colors_and_filter() {
        let rafael = patient("Rafael Lima", Some("#E76F51"));
        let bruna = professional("Bruna");
        let lais = professional("Laís");

        let first = appointment(rafael.id, Some(bruna.id), 13, None);
        let second = appointment(Uuid::new_v4(), Some(lais.id), 15, Some("#2A9D8F"));
        let third = appointment(Uuid::new_v4(), None, 17, None);

        let snapshot = Snapshot::new(
            vec![rafael.clone()],
            vec![bruna.clone(), lais],
            vec![third.clone(), second.clone(), first.clone()],
            Utc::now(),
        );

        let events = build_calendar_events(&snapshot, None);
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].title, "Rafael Lima — Bruna");
        assert_eq!(events[0].color, "#E76F51");
        assert_eq!(events[0].metadata.room, "2");
        assert_eq!(events[1].title, "Paciente — Laís");
        assert_eq!(events[1].color, "#2A9D8F");
        assert_eq!(events[2].title, "Paciente");
        assert_eq!(events[2].color, DEFAULT_EVENT_COLOR);

        let filtered = build_calendar_events(&snapshot, Some(bruna.id));
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].id, first.id);
    }

    #[test]
    fn filter_is_remembered_and_cleared() {
        let dir = tempdir().unwrap();
        let preferences = PreferenceStore::open(dir.path().join("prefs.json"));
        let bruna = professional("Bruna");
        let snapshot = Snapshot::new(vec![], vec![bruna.clone()], vec![], Utc::now());

        let id = bruna.id.to_string();
        assert_eq!(resolve_professional_filter(&preferences, Some(&id), &snapshot), Some(bruna.id));
        assert_eq!(resolve_professional_filter(&preferences, None, &snapshot), Some(bruna.id));
        assert_eq!(resolve_professional_filter(&preferences, Some(""), &snapshot), None);
        assert_eq!(resolve_professional_filter(&preferences, None, &snapshot), None);
    }

    #[test]
    fn stale_filter_for_removed_professional_is_ignored() {
        let dir = tempdir().unwrap();
        let preferences = PreferenceStore::open(dir.path().join("prefs.json"));
        preferences.set(FILTER_PROFESSIONAL, Uuid::new_v4().to_string()).unwrap();

        let snapshot = Snapshot::new(vec![], vec![professional("Bruna")], vec![], Utc::now());
        assert_eq!(resolve_professional_filter(&preferences, None, &snapshot), None);
    }
}
