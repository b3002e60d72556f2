use super::ScheduledAction;
use crate::error::Result;
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

const DRAIN_BATCH_SIZE: usize = 64;

/// Receives fired scheduled actions
#[async_trait]
pub trait ScheduledActionHandler: Send + Sync {
    async fn handle_scheduled_action(&self, action: ScheduledAction) -> Result<()>;
}

/// Drain fired actions until every sender is gone. Actions of one batch run
/// concurrently; a failing action is logged and does not stop the loop.
pub async fn run_scheduled_actions(
    mut receiver: mpsc::UnboundedReceiver<ScheduledAction>,
    handler: Arc<dyn ScheduledActionHandler>,
) {
    info!("Scheduled action worker started");
    let mut batch = Vec::with_capacity(DRAIN_BATCH_SIZE);

    while receiver.recv_many(&mut batch, DRAIN_BATCH_SIZE).await > 0 {
        debug!(batch_size = batch.len(), "Processing scheduled actions");
        let results = join_all(batch.drain(..).map(|action| {
            let handler = Arc::clone(&handler);
            async move {
                let execution = action.execution;
                let name = action.action.clone();
                (execution, name, handler.handle_scheduled_action(action).await)
            }
        }))
        .await;

        for (execution, name, result) in results {
            if let Err(e) = result {
                error!(
                    execution_id = %execution,
                    action = %name,
                    error = %e,
                    "Scheduled action failed"
                );
            }
        }
    }

    info!("Scheduled action worker stopped: channel closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConnectorError;
    use crate::models::ExecutionRef;
    use chrono::Utc;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ScheduledActionHandler for Recorder {
        async fn handle_scheduled_action(&self, action: ScheduledAction) -> Result<()> {
            self.seen.lock().push(action.action.clone());
            if action.action == "explode" {
                return Err(ConnectorError::Scheduling("boom".to_string()));
            }
            Ok(())
        }
    }

    fn action(name: &str) -> ScheduledAction {
        ScheduledAction {
            execution: ExecutionRef::new(),
            action: name.to_string(),
            payload: serde_json::json!({}),
            due_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_worker_survives_failures_and_stops_on_close() {
        let (sender, receiver) = mpsc::unbounded_channel();
        let recorder = Arc::new(Recorder::default());

        sender.send(action("explode")).unwrap();
        sender.send(action("poll")).unwrap();
        drop(sender);

        run_scheduled_actions(receiver, recorder.clone()).await;

        let seen = recorder.seen.lock().clone();
        assert_eq!(seen.len(), 2);
        assert!(seen.contains(&"poll".to_string()));
    }
}
