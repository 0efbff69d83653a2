use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use shared_models::entities::{EntityType, Role};

use crate::error::RealtimeError;

// ==============================================================================
// CHANGE EVENTS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One raw row change reported by the change feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub entity: EntityType,
    pub kind: ChangeKind,
    pub payload: Value,
}

impl ChangeEvent {
    pub fn new(entity: EntityType, kind: ChangeKind, payload: Value) -> Self {
        Self { entity, kind, payload }
    }

    /// Reads a hosted-Postgres change message
    /// (`{ "table", "eventType", "new", "old" }`).
    pub fn from_postgres_change(message: &Value) -> Result<Self, RealtimeError> {
        let table = message
            .get("table")
            .and_then(Value::as_str)
            .ok_or_else(|| RealtimeError::Payload("missing table".to_string()))?;
        let entity: EntityType = table.parse().map_err(RealtimeError::Payload)?;

        let kind = match message.get("eventType").and_then(Value::as_str) {
            Some("INSERT") => ChangeKind::Insert,
            Some("UPDATE") => ChangeKind::Update,
            Some("DELETE") => ChangeKind::Delete,
            other => {
                return Err(RealtimeError::Payload(format!(
                    "unknown event type {:?} for {}",
                    other, table
                )))
            }
        };

        Ok(Self::new(entity, kind, message.clone()))
    }
}

// ==============================================================================
// TOPICS
// ==============================================================================

/// Per-topic subscription state as reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicStatus {
    Unsubscribed,
    Subscribing,
    Active,
    Error,
    Closed,
}

impl TopicStatus {
    pub fn is_down(&self) -> bool {
        matches!(self, TopicStatus::Error | TopicStatus::Closed)
    }
}

impl fmt::Display for TopicStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TopicStatus::Unsubscribed => "unsubscribed",
            TopicStatus::Subscribing => "subscribing",
            TopicStatus::Active => "active",
            TopicStatus::Error => "error",
            TopicStatus::Closed => "closed",
        };
        f.write_str(label)
    }
}

/// What a transport pushes into a topic's channel.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedMessage {
    Change(ChangeEvent),
    Status(TopicStatus),
}

// ==============================================================================
// BUS OUTPUT
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconnectCause {
    TopicRecovered,
    TokenRefreshed,
    Foregrounded,
    NetworkRestored,
}

/// Events republished to views.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusEvent {
    /// Coalesced change for one entity type.
    Changed { entity: EntityType, event: ChangeEvent },
    /// Coalesced change across every tracked entity type.
    AnyChanged { entity: EntityType, event: ChangeEvent },
    /// Topic reached `Active` for the first time.
    Ready { entity: EntityType },
    /// Views should re-pull everything. `entity` is `None` when forced by
    /// the session or the host rather than by a topic.
    Reconnected {
        entity: Option<EntityType>,
        cause: ReconnectCause,
    },
    StatusChanged { entity: EntityType, status: TopicStatus },
    Stopped,
}

/// How raw change events are folded before reaching views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoalescePolicy {
    /// Each event replaces the pending one and restarts the window; only the
    /// last event of a burst is delivered.
    KeepLast { window: Duration },
    Immediate,
}

impl CoalescePolicy {
    pub fn keep_last_millis(millis: u64) -> Self {
        match millis {
            0 => CoalescePolicy::Immediate,
            ms => CoalescePolicy::KeepLast {
                window: Duration::from_millis(ms),
            },
        }
    }
}

/// Host signals that may have hidden missed notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    Foregrounded,
    NetworkRestored,
}

impl From<LifecycleEvent> for ReconnectCause {
    fn from(event: LifecycleEvent) -> Self {
        match event {
            LifecycleEvent::Foregrounded => ReconnectCause::Foregrounded,
            LifecycleEvent::NetworkRestored => ReconnectCause::NetworkRestored,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BusDebugState {
    pub running: bool,
    pub role: Option<Role>,
    pub topics: BTreeMap<EntityType, TopicStatus>,
}
