use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use shared_models::entities::EntityType;

use crate::error::RealtimeError;
use crate::models::{ChangeEvent, ChangeKind, FeedMessage, TopicStatus};

/// Subscription transport for the backing store's change feed.
///
/// A transport owns reconnection: after `open` it keeps pushing status
/// transitions and changes into `sink` until `close` is called.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    async fn open(&self, entity: EntityType, sink: mpsc::Sender<FeedMessage>) -> Result<(), RealtimeError>;

    async fn close(&self, entity: EntityType) -> Result<(), RealtimeError>;
}

#[derive(Default)]
struct ChannelFeedState {
    sinks: HashMap<EntityType, mpsc::Sender<FeedMessage>>,
    opens: HashMap<EntityType, usize>,
    refused: HashSet<EntityType>,
}

/// In-process feed. Whoever holds a clone can inject changes and status
/// transitions as if they came from the hosted service.
#[derive(Clone, Default)]
pub struct ChannelFeed {
    state: Arc<Mutex<ChannelFeedState>>,
}

impl ChannelFeed {
    pub fn new() -> Self {
        Self::default()
    }

    fn sink(&self, entity: EntityType) -> Result<mpsc::Sender<FeedMessage>, RealtimeError> {
        let state = self
            .state
            .lock()
            .map_err(|_| RealtimeError::Payload("feed state poisoned".to_string()))?;
        state.sinks.get(&entity).cloned().ok_or(RealtimeError::NotRunning)
    }

    async fn deliver(&self, entity: EntityType, message: FeedMessage) -> Result<(), RealtimeError> {
        // Clone the sender out so the lock is not held across the await.
        let sink = self.sink(entity)?;
        sink.send(message).await.map_err(|_| RealtimeError::NotRunning)
    }

    pub async fn send_change(&self, entity: EntityType, kind: ChangeKind, payload: serde_json::Value) -> Result<(), RealtimeError> {
        self.deliver(entity, FeedMessage::Change(ChangeEvent::new(entity, kind, payload)))
            .await
    }

    pub async fn send_status(&self, entity: EntityType, status: TopicStatus) -> Result<(), RealtimeError> {
        self.deliver(entity, FeedMessage::Status(status)).await
    }

    /// Makes every following `open` for `entity` fail until `accept` is called.
    pub fn refuse(&self, entity: EntityType) {
        if let Ok(mut state) = self.state.lock() {
            state.refused.insert(entity);
        }
    }

    pub fn accept(&self, entity: EntityType) {
        if let Ok(mut state) = self.state.lock() {
            state.refused.remove(&entity);
        }
    }

    pub fn is_open(&self, entity: EntityType) -> bool {
        self.state
            .lock()
            .map(|state| state.sinks.contains_key(&entity))
            .unwrap_or(false)
    }

    /// How many times `entity` has been opened since creation.
    pub fn open_count(&self, entity: EntityType) -> usize {
        self.state
            .lock()
            .map(|state| state.opens.get(&entity).copied().unwrap_or(0))
            .unwrap_or(0)
    }
}

#[async_trait]
impl ChangeFeed for ChannelFeed {
    async fn open(&self, entity: EntityType, sink: mpsc::Sender<FeedMessage>) -> Result<(), RealtimeError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| RealtimeError::Payload("feed state poisoned".to_string()))?;

        if state.refused.contains(&entity) {
            return Err(RealtimeError::Subscribe {
                entity,
                message: "subscription refused".to_string(),
            });
        }

        debug!("Opening change feed for {}", entity);
        state.sinks.insert(entity, sink);
        *state.opens.entry(entity).or_insert(0) += 1;
        Ok(())
    }

    async fn close(&self, entity: EntityType) -> Result<(), RealtimeError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| RealtimeError::Payload("feed state poisoned".to_string()))?;

        match state.sinks.remove(&entity) {
            Some(_) => {
                debug!("Closed change feed for {}", entity);
                Ok(())
            }
            None => Err(RealtimeError::Unsubscribe {
                entity,
                message: "topic is not open".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[tokio::test]
    async fn injected_messages_reach_the_open_sink() {
        let feed = ChannelFeed::new();
        let (tx, mut rx) = mpsc::channel(8);

        feed.open(EntityType::Patients, tx).await.unwrap();
        feed.send_status(EntityType::Patients, TopicStatus::Active).await.unwrap();
        feed.send_change(EntityType::Patients, ChangeKind::Insert, json!({ "id": 1 }))
            .await
            .unwrap();

        assert_eq!(rx.recv().await, Some(FeedMessage::Status(TopicStatus::Active)));
        assert_matches!(rx.recv().await, Some(FeedMessage::Change(e)) if e.kind == ChangeKind::Insert);
        assert_eq!(feed.open_count(EntityType::Patients), 1);
    }

    #[tokio::test]
    async fn closed_or_refused_topics_reject_traffic() {
        let feed = ChannelFeed::new();
        let (tx, _rx) = mpsc::channel(8);

        feed.refuse(EntityType::Payments);
        assert_matches!(
            feed.open(EntityType::Payments, tx.clone()).await,
            Err(RealtimeError::Subscribe { entity: EntityType::Payments, .. })
        );

        feed.accept(EntityType::Payments);
        feed.open(EntityType::Payments, tx).await.unwrap();
        feed.close(EntityType::Payments).await.unwrap();

        assert!(!feed.is_open(EntityType::Payments));
        assert_matches!(
            feed.close(EntityType::Payments).await,
            Err(RealtimeError::Unsubscribe { entity: EntityType::Payments, .. })
        );
        assert_matches!(
            feed.send_status(EntityType::Payments, TopicStatus::Active).await,
            Err(RealtimeError::NotRunning)
        );
    }
}
