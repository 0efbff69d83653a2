use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{broadcast, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use appointment_cell::{AppointmentValidator, BookingContext};
use holiday_cell::HolidayCalculator;
use realtime_cell::{BusDebugState, BusEvent, ChangeEvent, ChannelFeed, LifecycleEvent, RealtimeBus, TopicStatus};
use scheduling_cell::services::store::SchedulingStore;
use scheduling_cell::SchedulingContext;
use shared_config::AppConfig;
use shared_database::{SupabaseClient, SupabaseStore};
use shared_models::auth::{Session, SessionEvent};
use shared_models::entities::{EntityType, Role};
use shared_models::error::AppError;
use shared_utils::preferences::{PreferenceStore, ROLE};
use shared_utils::roles::resolve_role;

/// Entity types projected by the scheduling snapshot.
const SNAPSHOT_ENTITIES: [EntityType; 3] = [
    EntityType::Patients,
    EntityType::Professionals,
    EntityType::Appointments,
];

/// Everything that only exists while someone is signed in.
pub struct SessionScope {
    pub session: Session,
    pub role: Role,
    pub bus: RealtimeBus,
    store: watch::Sender<Arc<SchedulingStore>>,
    refresher: JoinHandle<()>,
}

impl SessionScope {
    pub fn store(&self) -> Arc<SchedulingStore> {
        self.store.borrow().clone()
    }
}

/// Process-wide services, built once from configuration and passed to the
/// routes that need them.
pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub supabase: Arc<SupabaseClient>,
    pub holidays: HolidayCalculator,
    pub validator: AppointmentValidator,
    pub preferences: PreferenceStore,
    pub feed: ChannelFeed,
    session: RwLock<Option<SessionScope>>,
    /// Held for a whole sign-in, sign-out or token swap.
    transition: Mutex<()>,
}

impl AppContext {
    pub fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let holidays = HolidayCalculator::from_profile_name(&config.holiday_profile)?;
        let validator = AppointmentValidator::from_config(&config).map_err(anyhow::Error::msg)?;
        let preferences = PreferenceStore::open(&config.preferences_path);
        let supabase = Arc::new(SupabaseClient::new(&config));

        Ok(Self {
            config: Arc::new(config),
            supabase,
            holidays,
            validator,
            preferences,
            feed: ChannelFeed::new(),
            session: RwLock::new(None),
            transition: Mutex::new(()),
        })
    }

    fn open_store(&self, access_token: &str) -> Arc<SchedulingStore> {
        let backing = SupabaseStore::new(self.supabase.clone(), access_token);
        Arc::new(SchedulingStore::new(Arc::new(backing)))
    }

    /// Builds the session scope: resolves the role, loads the first snapshot
    /// and starts the change bus for the role's topics.
    pub async fn sign_in(&self, session: Session) -> Result<Role, AppError> {
        let _transition = self.transition.lock().await;
        self.end_session().await;

        let role = resolve_role(&self.supabase, &session, &self.config.admin_email).await;
        if let Err(e) = self.preferences.set(ROLE, role) {
            warn!("Could not persist role: {}", e);
        }

        let store = self.open_store(&session.access_token);
        store.refresh().await?;

        let bus = RealtimeBus::from_config(&self.config, Arc::new(self.feed.clone()));
        let (store_tx, store_rx) = watch::channel(store);
        let refresher = spawn_refresher(bus.subscribe(), store_rx);

        if let Err(e) = bus
            .handle_session_event(&SessionEvent::SignedIn {
                session: session.clone(),
                role,
            })
            .await
        {
            warn!("Realtime bus started with missing topics: {}", e);
        }

        // The in-process feed is live as soon as a topic is open.
        for entity in role.tracked_entities() {
            if let Err(e) = self.feed.send_status(*entity, TopicStatus::Active).await {
                warn!("Could not activate {} topic: {}", entity, e);
            }
        }

        info!("Session started for {} as {}", session.user.id, role);
        let replaced = self.session.write().await.replace(SessionScope {
            session,
            role,
            bus,
            store: store_tx,
            refresher,
        });
        if let Some(previous) = replaced {
            self.teardown(previous).await;
        }

        Ok(role)
    }

    /// Swaps in a store bound to the new access token and tells views to
    /// re-pull, keeping the existing topics.
    pub async fn token_refreshed(&self, session: Session) -> Result<(), AppError> {
        let _transition = self.transition.lock().await;
        let mut guard = self.session.write().await;
        let scope = guard
            .as_mut()
            .ok_or_else(|| AppError::Auth("No active session".to_string()))?;

        scope.store.send_replace(self.open_store(&session.access_token));
        scope.session = session.clone();
        scope
            .bus
            .handle_session_event(&SessionEvent::TokenRefreshed(session))
            .await?;
        Ok(())
    }

    pub async fn sign_out(&self) {
        let _transition = self.transition.lock().await;
        self.end_session().await;
    }

    async fn end_session(&self) {
        let scope = self.session.write().await.take();
        if let Some(scope) = scope {
            self.teardown(scope).await;
        }
    }

    async fn teardown(&self, scope: SessionScope) {
        if let Err(e) = scope.bus.handle_session_event(&SessionEvent::SignedOut).await {
            warn!("Realtime bus did not stop cleanly: {}", e);
        }
        scope.refresher.abort();
        if let Err(e) = self.preferences.remove(ROLE) {
            warn!("Could not clear persisted role: {}", e);
        }
        info!("Session ended for {}", scope.session.user.id);
    }

    pub async fn lifecycle(&self, event: LifecycleEvent) -> Result<(), AppError> {
        match self.session.read().await.as_ref() {
            Some(scope) => Ok(scope.bus.handle_lifecycle_event(event).await?),
            None => Ok(()),
        }
    }

    pub async fn current_store(&self) -> Option<Arc<SchedulingStore>> {
        self.session.read().await.as_ref().map(SessionScope::store)
    }

    pub async fn session_role(&self) -> Option<Role> {
        self.session.read().await.as_ref().map(|scope| scope.role)
    }

    pub async fn realtime_state(&self) -> Option<BusDebugState> {
        let guard = self.session.read().await;
        match guard.as_ref() {
            Some(scope) => Some(scope.bus.debug_state().await),
            None => None,
        }
    }

    /// Feeds a hosted-Postgres change message into the bus.
    pub async fn publish_change(&self, message: &Value) -> Result<ChangeEvent, AppError> {
        let event = ChangeEvent::from_postgres_change(message)?;
        self.feed
            .send_change(event.entity, event.kind, event.payload.clone())
            .await?;
        Ok(event)
    }
}

#[async_trait]
impl SchedulingContext for AppContext {
    fn config(&self) -> Arc<AppConfig> {
        self.config.clone()
    }

    fn preferences(&self) -> &PreferenceStore {
        &self.preferences
    }

    async fn scheduling_store(&self, access_token: &str) -> Result<Arc<SchedulingStore>, AppError> {
        match self.session.read().await.as_ref() {
            Some(scope) if scope.session.access_token == access_token => Ok(scope.store()),
            Some(_) => Err(AppError::Auth("Token does not belong to the active session".to_string())),
            None => Err(AppError::Auth("No active session".to_string())),
        }
    }
}

impl BookingContext for AppContext {
    fn holidays(&self) -> &HolidayCalculator {
        &self.holidays
    }

    fn validator(&self) -> &AppointmentValidator {
        &self.validator
    }
}

/// Re-pulls the snapshot whenever one of its collections changes or the bus
/// asks for a full resync.
fn spawn_refresher(
    mut events: broadcast::Receiver<BusEvent>,
    store: watch::Receiver<Arc<SchedulingStore>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let resync = match events.recv().await {
                Ok(BusEvent::Changed { entity, .. }) => SNAPSHOT_ENTITIES.contains(&entity),
                Ok(BusEvent::Reconnected { .. }) => true,
                Ok(BusEvent::Stopped) => break,
                Ok(_) => false,
                Err(broadcast::error::RecvError::Lagged(_)) => true,
                Err(broadcast::error::RecvError::Closed) => break,
            };

            if resync {
                let current = store.borrow().clone();
                if let Err(e) = current.refresh().await {
                    warn!("Background snapshot refresh failed: {}", e);
                }
            }
        }
    })
}
