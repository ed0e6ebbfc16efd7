//! State-change notification
//!
//! The engine publishes one [`StateChangeEvent`] per persisted transition.
//! Delivery is fire-and-forget and at-most-once: nothing is acknowledged,
//! retried or buffered beyond the channel capacity.

use crate::core::working_state::decision::TransitionReason;
use crate::domain::ids::Hierarchy;
use crate::domain::record::{ExportRecord, WorkingStateDescriptor};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Default capacity of the broadcast channel
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// A working-state transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateChangeEvent {
    pub hierarchy: Hierarchy,
    pub external_id: i64,
    pub local_id: Uuid,
    pub old_state: Option<i64>,
    pub new_state: Option<i64>,
    pub reason: TransitionReason,
    pub timestamp: DateTime<Utc>,
    /// Parent as re-read after the transition
    pub record: ExportRecord,
    /// Catalog entry of `new_state`, when the lookup succeeded
    pub descriptor: Option<WorkingStateDescriptor>,
}

/// Event plus the topic it was published on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedEvent {
    pub topic: String,
    pub event: StateChangeEvent,
}

/// Topic for a hierarchy's transitions: `{prefix}.{hierarchy}.working_state_changed`
pub fn topic_for(prefix: &str, hierarchy: Hierarchy) -> String {
    format!("{}.{}.working_state_changed", prefix, hierarchy.as_str())
}

/// Sink for transition events
pub trait ChangeNotifier: Send + Sync {
    /// Publish without waiting for or reporting delivery
    fn publish(&self, topic: &str, event: StateChangeEvent);
}

/// In-process notifier backed by a tokio broadcast channel
///
/// Subscribers that lag past the channel capacity lose the oldest events.
#[derive(Clone)]
pub struct BroadcastNotifier {
    bus: broadcast::Sender<PublishedEvent>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (bus, _rx) = broadcast::channel::<PublishedEvent>(capacity.max(1));
        Self { bus }
    }

    /// Receive every event published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.bus.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.bus.receiver_count()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl ChangeNotifier for BroadcastNotifier {
    fn publish(&self, topic: &str, event: StateChangeEvent) {
        let external_id = event.external_id;
        let published = PublishedEvent {
            topic: topic.to_string(),
            event,
        };

        // No receivers is not an error
        match self.bus.send(published) {
            Ok(receivers) => tracing::debug!(
                topic = %topic,
                external_id = external_id,
                receivers = receivers,
                "State change published"
            ),
            Err(_) => tracing::debug!(
                topic = %topic,
                external_id = external_id,
                "State change dropped; no subscribers"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::ActorId;
    use crate::domain::record::{Record, RecordMeta};
    use serde_json::Map;

    fn event(external_id: i64) -> StateChangeEvent {
        let now = Utc::now();
        StateChangeEvent {
            hierarchy: Hierarchy::Cabinet,
            external_id,
            local_id: Uuid::new_v4(),
            old_state: None,
            new_state: Some(20),
            reason: TransitionReason::AllExported,
            timestamp: now,
            record: Record {
                local_id: Uuid::new_v4(),
                external_id,
                parent_external_id: None,
                parent_local_id: None,
                working_state_id: Some(20),
                meta: RecordMeta::created(&ActorId::new("system").unwrap(), now),
                body: Map::new(),
            },
            descriptor: None,
        }
    }

    #[test]
    fn test_topic_format() {
        assert_eq!(
            topic_for("medsync", Hierarchy::Inpatient),
            "medsync.inpatient.working_state_changed"
        );
    }

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let notifier = BroadcastNotifier::new(8);
        let mut rx = notifier.subscribe();

        notifier.publish("medsync.cabinet.working_state_changed", event(1001));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.topic, "medsync.cabinet.working_state_changed");
        assert_eq!(received.event.external_id, 1001);
        assert_eq!(received.event.reason, TransitionReason::AllExported);
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let notifier = BroadcastNotifier::default();
        assert_eq!(notifier.subscriber_count(), 0);
        notifier.publish("t", event(1));
    }

    #[test]
    fn test_event_serializes_camel_case() {
        let value = serde_json::to_value(event(5)).unwrap();
        assert_eq!(value["externalId"], 5);
        assert_eq!(value["newState"], 20);
        assert_eq!(value["reason"], "all_exported");
        assert_eq!(value["hierarchy"], "cabinet");
    }
}
