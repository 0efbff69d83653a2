use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use shared_models::entities::EntityType;

use crate::models::{ChangeEvent, CoalescePolicy};

/// Keep-last folding of a burst of change events.
///
/// Every push replaces the pending event and moves the deadline to
/// `now + window`, so a steady stream closer than the window is held back
/// until it goes quiet.
#[derive(Debug)]
pub struct Coalescer {
    policy: CoalescePolicy,
    pending: Option<ChangeEvent>,
    deadline: Option<Instant>,
}

impl Coalescer {
    pub fn new(policy: CoalescePolicy) -> Self {
        Self {
            policy,
            pending: None,
            deadline: None,
        }
    }

    /// Queues `event`. Returns it straight back under `Immediate`.
    pub fn push(&mut self, event: ChangeEvent, now: Instant) -> Option<ChangeEvent> {
        match self.policy {
            CoalescePolicy::Immediate => Some(event),
            CoalescePolicy::KeepLast { window } => {
                self.pending = Some(event);
                self.deadline = Some(now + window);
                None
            }
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Hands out the pending event once its deadline has passed.
    pub fn take_due(&mut self, now: Instant) -> Option<ChangeEvent> {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                self.pending.take()
            }
            _ => None,
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }
}

/// At most one logged transport error per topic per cooldown.
#[derive(Debug)]
pub struct ErrorLogLimiter {
    cooldown: Duration,
    last: HashMap<EntityType, Instant>,
}

impl ErrorLogLimiter {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last: HashMap::new(),
        }
    }

    pub fn should_log(&mut self, entity: EntityType, now: Instant) -> bool {
        match self.last.get(&entity) {
            Some(previous) if now.duration_since(*previous) < self.cooldown => false,
            _ => {
                self.last.insert(entity, now);
                true
            }
        }
    }
}
