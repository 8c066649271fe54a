//! Out-of-band event publication (spec §6, "Events emitted"; §9, "Event
//! emission").
//!
//! Events are best-effort: they are not durable within the core and not
//! delivered transactionally with the commit that produced them (spec
//! §9). `EventSink` is the narrow port the `CoordinationLayer` publishes
//! through; swapping in a real message bus is an integration concern
//! outside this crate.

use kestrel_types::DomainEvent;

/// Publication port for [`DomainEvent`]s. Implementations must not block
/// the write path on slow consumers — `publish` takes `&self` precisely
/// so a channel-backed implementation can drop events under backpressure
/// rather than stall a commit.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: DomainEvent);
}

/// Discards every event. The default for deployments with no out-of-core
/// consumer wired up.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn publish(&self, _event: DomainEvent) {}
}

/// Buffers events on a bounded channel for an in-process consumer (tests,
/// `kestrel-test-harness` simulations). A full channel drops the event
/// and logs a warning rather than block the proposer — consistent with
/// events being hints, never a durability guarantee.
pub struct ChannelEventSink {
    sender: tokio::sync::mpsc::Sender<DomainEvent>,
}

impl ChannelEventSink {
    /// Returns the sink plus the receiving half.
    pub fn new(capacity: usize) -> (Self, tokio::sync::mpsc::Receiver<DomainEvent>) {
        let (sender, receiver) = tokio::sync::mpsc::channel(capacity);
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelEventSink {
    fn publish(&self, event: DomainEvent) {
        if let Err(err) = self.sender.try_send(event) {
            tracing::warn!(%err, "event sink channel full or closed; dropping event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_types::{ConfigKey, ProjectId, UserId, Version};

    fn sample_event() -> DomainEvent {
        DomainEvent::ConfigCreated {
            project_id: ProjectId::new(1),
            key: ConfigKey::new("k"),
            to_version: Version::FIRST,
            content: serde_json::json!({}),
            actor_id: UserId::new(1),
            timestamp: chrono::Utc::now(),
        }
    }

    #[test]
    fn noop_sink_accepts_without_panicking() {
        NoopEventSink.publish(sample_event());
    }

    #[tokio::test]
    async fn channel_sink_delivers_published_events() {
        let (sink, mut rx) = ChannelEventSink::new(4);
        sink.publish(sample_event());
        let received = rx.recv().await.unwrap();
        assert!(matches!(received, DomainEvent::ConfigCreated { .. }));
    }

    #[test]
    fn channel_sink_drops_rather_than_blocks_when_full() {
        let (sink, _rx) = ChannelEventSink::new(1);
        sink.publish(sample_event());
        // Second publish exceeds capacity; must not panic or block.
        sink.publish(sample_event());
    }
}
