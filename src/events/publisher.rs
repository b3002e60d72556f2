use crate::constants::defaults;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

/// Terminal output of an execution: `channel` is the execution output channel,
/// `event_type` names the event and `payload` carries its data
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, channel: &str, event_type: &str, payload: Value)
        -> Result<(), PublishError>;
}

/// Event that has been emitted
#[derive(Debug, Clone, PartialEq)]
pub struct EmittedEvent {
    pub channel: String,
    pub event_type: String,
    pub payload: Value,
    pub emitted_at: chrono::DateTime<chrono::Utc>,
}

/// In-process event sink fanning emissions out to subscribers
#[derive(Debug, Clone)]
pub struct BroadcastEventSink {
    sender: broadcast::Sender<EmittedEvent>,
}

impl BroadcastEventSink {
    /// Create a new sink with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<EmittedEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl EventSink for BroadcastEventSink {
    async fn emit(
        &self,
        channel: &str,
        event_type: &str,
        payload: Value,
    ) -> Result<(), PublishError> {
        let event = EmittedEvent {
            channel: channel.to_string(),
            event_type: event_type.to_string(),
            payload,
            emitted_at: chrono::Utc::now(),
        };

        // No subscribers is acceptable; the emission itself still happened
        match self.sender.send(event) {
            Ok(_) | Err(broadcast::error::SendError(_)) => Ok(()),
        }
    }
}

/// Error types for event publishing
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Event channel is closed")]
    ChannelClosed,
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Event sink rejected emission: {0}")]
    Rejected(String),
}

impl Default for BroadcastEventSink {
    fn default() -> Self {
        Self::new(defaults::EVENT_CHANNEL_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_subscribers_receive_emissions() {
        let sink = BroadcastEventSink::new(8);
        let mut receiver = sink.subscribe();
        assert_eq!(sink.subscriber_count(), 1);

        sink.emit("success", "remote_job.finished", json!({"handle": "1"}))
            .await
            .unwrap();

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.channel, "success");
        assert_eq!(event.payload["handle"], "1");
    }

    #[tokio::test]
    async fn test_emit_without_subscribers_is_ok() {
        let sink = BroadcastEventSink::default();
        assert!(sink.emit("failure", "remote_job.finished", json!({})).await.is_ok());
    }
}
