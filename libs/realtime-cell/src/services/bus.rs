use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use shared_config::AppConfig;
use shared_models::auth::SessionEvent;
use shared_models::entities::{EntityType, Role};

use crate::error::RealtimeError;
use crate::models::{
    BusDebugState, BusEvent, ChangeEvent, CoalescePolicy, FeedMessage, LifecycleEvent, ReconnectCause,
    TopicStatus,
};
use crate::services::coalesce::{Coalescer, ErrorLogLimiter};
use crate::services::feed::ChangeFeed;

const EVENT_BUFFER: usize = 256;
const TOPIC_BUFFER: usize = 64;

struct Topic {
    status: watch::Receiver<TopicStatus>,
    worker: JoinHandle<()>,
}

#[derive(Default)]
struct BusState {
    running: bool,
    role: Option<Role>,
    topics: HashMap<EntityType, Topic>,
    any_tx: Option<mpsc::Sender<ChangeEvent>>,
    any_worker: Option<JoinHandle<()>>,
}

struct BusInner {
    feed: Arc<dyn ChangeFeed>,
    policy: CoalescePolicy,
    events: broadcast::Sender<BusEvent>,
    limiter: Arc<StdMutex<ErrorLogLimiter>>,
    state: Mutex<BusState>,
}

/// Change-notification bus: one change-feed topic per tracked entity type,
/// coalesced and republished on a broadcast channel.
///
/// Cloning yields another handle to the same bus.
#[derive(Clone)]
pub struct RealtimeBus {
    inner: Arc<BusInner>,
}

impl RealtimeBus {
    pub fn new(feed: Arc<dyn ChangeFeed>, policy: CoalescePolicy, error_log_cooldown: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);

        Self {
            inner: Arc::new(BusInner {
                feed,
                policy,
                events,
                limiter: Arc::new(StdMutex::new(ErrorLogLimiter::new(error_log_cooldown))),
                state: Mutex::new(BusState::default()),
            }),
        }
    }

    pub fn from_config(config: &AppConfig, feed: Arc<dyn ChangeFeed>) -> Self {
        Self::new(
            feed,
            CoalescePolicy::keep_last_millis(config.realtime_debounce_ms),
            Duration::from_secs(config.realtime_error_log_cooldown_secs),
        )
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.inner.events.subscribe()
    }

    /// Runs `handler` for every coalesced change of `entity` until the
    /// returned task is aborted or the bus is dropped.
    pub fn on_change<F>(&self, entity: EntityType, mut handler: F) -> JoinHandle<()>
    where
        F: FnMut(&ChangeEvent) + Send + 'static,
    {
        let mut rx = self.subscribe();

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(BusEvent::Changed { entity: changed, event }) if changed == entity => handler(&event),
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Change handler for {} skipped {} events", entity, skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    pub async fn is_running(&self) -> bool {
        self.inner.state.lock().await.running
    }

    /// Opens one topic per entity type `role` tracks.
    ///
    /// Topics that fail to open are skipped and the first failure is
    /// returned once the rest are open; a later `apply_role` retries them.
    pub async fn start(&self, role: Role) -> Result<(), RealtimeError> {
        let mut state = self.inner.state.lock().await;

        if state.running && state.role == Some(role) {
            debug!("Realtime bus already running for {}", role);
            return Ok(());
        }

        info!("Starting realtime bus for {}", role);
        state.running = true;
        if state.any_worker.is_none() {
            let (any_tx, any_rx) = mpsc::channel(EVENT_BUFFER);
            state.any_worker = Some(tokio::spawn(run_any_changed(
                any_rx,
                self.inner.policy,
                self.inner.events.clone(),
            )));
            state.any_tx = Some(any_tx);
        }

        self.reconcile(&mut state, role).await
    }

    /// Switches the tracked topics to those of `role`. Only records the role
    /// when the bus is stopped.
    pub async fn apply_role(&self, role: Role) -> Result<(), RealtimeError> {
        let mut state = self.inner.state.lock().await;

        if !state.running {
            state.role = Some(role);
            return Ok(());
        }

        self.reconcile(&mut state, role).await
    }

    /// Closes every topic and publishes `Stopped`.
    pub async fn stop(&self) {
        let mut state = self.inner.state.lock().await;

        let entities: Vec<EntityType> = state.topics.keys().copied().collect();
        for entity in entities {
            self.close_topic(&mut state, entity).await;
        }
        if let Some(worker) = state.any_worker.take() {
            worker.abort();
        }
        state.any_tx = None;
        state.running = false;
        state.role = None;

        info!("Realtime bus stopped");
        let _ = self.inner.events.send(BusEvent::Stopped);
    }

    /// Tells views to re-pull everything without touching the topics.
    pub async fn force_reconnect(&self, cause: ReconnectCause) -> Result<(), RealtimeError> {
        if !self.is_running().await {
            return Err(RealtimeError::NotRunning);
        }

        info!("Forcing realtime reconnect ({:?})", cause);
        let _ = self.inner.events.send(BusEvent::Reconnected { entity: None, cause });
        Ok(())
    }

    pub async fn handle_session_event(&self, event: &SessionEvent) -> Result<(), RealtimeError> {
        match event {
            SessionEvent::SignedIn { role, .. } => self.start(*role).await,
            SessionEvent::SignedOut => {
                self.stop().await;
                Ok(())
            }
            SessionEvent::TokenRefreshed(_) => {
                if self.is_running().await {
                    self.force_reconnect(ReconnectCause::TokenRefreshed).await
                } else {
                    Ok(())
                }
            }
        }
    }

    pub async fn handle_lifecycle_event(&self, event: LifecycleEvent) -> Result<(), RealtimeError> {
        if !self.is_running().await {
            debug!("Ignoring {:?} while realtime bus is stopped", event);
            return Ok(());
        }
        self.force_reconnect(event.into()).await
    }

    pub async fn debug_state(&self) -> BusDebugState {
        let state = self.inner.state.lock().await;

        let topics: BTreeMap<EntityType, TopicStatus> = state
            .topics
            .iter()
            .map(|(entity, topic)| (*entity, *topic.status.borrow()))
            .collect();

        BusDebugState {
            running: state.running,
            role: state.role,
            topics,
        }
    }

    async fn reconcile(&self, state: &mut BusState, role: Role) -> Result<(), RealtimeError> {
        let wanted = role.tracked_entities();
        state.role = Some(role);

        let stale: Vec<EntityType> = state
            .topics
            .keys()
            .filter(|entity| !wanted.contains(entity))
            .copied()
            .collect();
        for entity in stale {
            self.close_topic(state, entity).await;
        }

        let mut first_error = None;
        for entity in wanted {
            if let Err(e) = self.open_topic(state, *entity).await {
                warn!("{}", e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn open_topic(&self, state: &mut BusState, entity: EntityType) -> Result<(), RealtimeError> {
        if state.topics.contains_key(&entity) {
            return Ok(());
        }
        let any_tx = state.any_tx.clone().ok_or(RealtimeError::NotRunning)?;

        let (tx, rx) = mpsc::channel(TOPIC_BUFFER);
        let (status_tx, status_rx) = watch::channel(TopicStatus::Subscribing);

        self.inner.feed.open(entity, tx).await?;

        let worker = tokio::spawn(run_topic(TopicWorker {
            entity,
            coalescer: Coalescer::new(self.inner.policy),
            status: status_tx,
            events: self.inner.events.clone(),
            any_tx,
            limiter: self.inner.limiter.clone(),
            seen_active: false,
            down: false,
        }, rx));

        debug!("Subscribed to {} changes", entity);
        state.topics.insert(entity, Topic { status: status_rx, worker });
        Ok(())
    }

    async fn close_topic(&self, state: &mut BusState, entity: EntityType) {
        if let Some(topic) = state.topics.remove(&entity) {
            topic.worker.abort();
            if let Err(e) = self.inner.feed.close(entity).await {
                warn!("{}", e);
            }
            debug!("Unsubscribed from {} changes", entity);
        }
    }
}

struct TopicWorker {
    entity: EntityType,
    coalescer: Coalescer,
    status: watch::Sender<TopicStatus>,
    events: broadcast::Sender<BusEvent>,
    any_tx: mpsc::Sender<ChangeEvent>,
    limiter: Arc<StdMutex<ErrorLogLimiter>>,
    seen_active: bool,
    down: bool,
}

impl TopicWorker {
    fn publish_change(&self, event: ChangeEvent) {
        let _ = self.events.send(BusEvent::Changed { entity: self.entity, event });
    }

    fn on_status(&mut self, status: TopicStatus) {
        self.status.send_replace(status);
        let _ = self.events.send(BusEvent::StatusChanged { entity: self.entity, status });

        match status {
            TopicStatus::Active if !self.seen_active => {
                self.seen_active = true;
                self.down = false;
                info!("Realtime topic {} ready", self.entity);
                let _ = self.events.send(BusEvent::Ready { entity: self.entity });
            }
            TopicStatus::Active if self.down => {
                self.down = false;
                info!("Realtime topic {} recovered", self.entity);
                let _ = self.events.send(BusEvent::Reconnected {
                    entity: Some(self.entity),
                    cause: ReconnectCause::TopicRecovered,
                });
            }
            TopicStatus::Error | TopicStatus::Closed => {
                self.down = true;
                let should_log = self
                    .limiter
                    .lock()
                    .map(|mut limiter| limiter.should_log(self.entity, Instant::now()))
                    .unwrap_or(true);
                if should_log {
                    warn!("Realtime topic {} is {}, waiting for the transport to reconnect", self.entity, status);
                }
            }
            _ => {}
        }
    }
}

async fn run_topic(mut worker: TopicWorker, mut rx: mpsc::Receiver<FeedMessage>) {
    loop {
        let deadline = worker.coalescer.deadline();

        tokio::select! {
            message = rx.recv() => match message {
                Some(FeedMessage::Change(event)) => {
                    if worker.any_tx.send(event.clone()).await.is_err() {
                        debug!("Aggregate change stream closed");
                    }
                    if let Some(ready) = worker.coalescer.push(event, Instant::now()) {
                        worker.publish_change(ready);
                    }
                }
                Some(FeedMessage::Status(status)) => worker.on_status(status),
                None => break,
            },
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                if let Some(event) = worker.coalescer.take_due(Instant::now()) {
                    worker.publish_change(event);
                }
            }
        }
    }

    debug!("Realtime topic {} worker finished", worker.entity);
}

/// Coalesces across every topic into `AnyChanged`.
async fn run_any_changed(
    mut rx: mpsc::Receiver<ChangeEvent>,
    policy: CoalescePolicy,
    events: broadcast::Sender<BusEvent>,
) {
    let mut coalescer = Coalescer::new(policy);
    let publish = |event: ChangeEvent| {
        let _ = events.send(BusEvent::AnyChanged { entity: event.entity, event });
    };

    loop {
        let deadline = coalescer.deadline();

        tokio::select! {
            message = rx.recv() => match message {
                Some(event) => {
                    if let Some(ready) = coalescer.push(event, Instant::now()) {
                        publish(ready);
                    }
                }
                None => break,
            },
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                if let Some(event) = coalescer.take_due(Instant::now()) {
                    publish(event);
                }
            }
        }
    }
}
