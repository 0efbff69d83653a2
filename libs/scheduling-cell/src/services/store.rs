use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::{fetch_all, BackingStore, Query};
use shared_models::entities::{Appointment, EntityType, Patient, Professional};
use shared_models::error::AppError;

use crate::models::{Snapshot, SnapshotEntity};

/// Read-through projection of patients, professionals and appointments.
///
/// The snapshot is only ever swapped wholesale by `refresh`; writes go to the
/// backing store and become visible after the next successful refresh.
pub struct SchedulingStore {
    backing: Arc<dyn BackingStore>,
    snapshot: RwLock<Arc<Snapshot>>,
}

impl SchedulingStore {
    pub fn new(backing: Arc<dyn BackingStore>) -> Self {
        Self {
            backing,
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
        }
    }

    pub fn backing(&self) -> &Arc<dyn BackingStore> {
        &self.backing
    }

    /// Re-queries all three collections concurrently.
    ///
    /// On failure the previous snapshot stays in place and the error is
    /// returned to the caller.
    pub async fn refresh(&self) -> Result<Arc<Snapshot>, AppError> {
        debug!("Refreshing scheduling snapshot");

        let backing = self.backing.as_ref();
        let patients_query = Query::new().order("name", true);
        let professionals_query = Query::new().order("name", true);
        let appointments_query = Query::new().order("start_time", true);

        let fetched = tokio::try_join!(
            fetch_all::<Patient>(backing, &patients_query),
            fetch_all::<Professional>(backing, &professionals_query),
            fetch_all::<Appointment>(backing, &appointments_query),
        );

        let (patients, professionals, appointments) = match fetched {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Snapshot refresh failed, keeping previous snapshot: {}", e);
                return Err(e.into());
            }
        };

        let snapshot = Arc::new(Snapshot::new(patients, professionals, appointments, Utc::now()));
        *self.snapshot.write().await = snapshot.clone();

        info!(
            "Scheduling snapshot refreshed ({} patients, {} professionals, {} appointments)",
            snapshot.patients().len(),
            snapshot.professionals(true).len(),
            snapshot.appointments().len()
        );

        Ok(snapshot)
    }

    /// Current snapshot without touching the backing store.
    pub async fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.read().await.clone()
    }

    pub async fn get_by_id(&self, entity: EntityType, id: Uuid) -> Result<SnapshotEntity, AppError> {
        let snapshot = self.snapshot().await;

        let found = match entity {
            EntityType::Patients => snapshot.patient(id).cloned().map(SnapshotEntity::Patient),
            EntityType::Professionals => snapshot.professional(id).cloned().map(SnapshotEntity::Professional),
            EntityType::Appointments => snapshot.appointment(id).cloned().map(SnapshotEntity::Appointment),
            other => {
                return Err(AppError::BadRequest(format!(
                    "{} are not held in the scheduling snapshot",
                    other
                )))
            }
        };

        found.ok_or_else(|| AppError::NotFound(format!("{} {} not found", entity, id)))
    }
}
