use super::{ScheduledAction, Scheduler};
use crate::error::{ConnectorError, Result};
use crate::models::ExecutionRef;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

type TimerKey = (ExecutionRef, String);
/// Generation of the timer, so a fired timer only removes its own entry
type Timers = DashMap<TimerKey, (u64, JoinHandle<()>)>;

/// In-process scheduler backed by tokio timers.
///
/// Timers do not survive a restart; hosts that need durability plug their own
/// [`Scheduler`] in front of a persistent queue. A timer drops out of the map
/// once it fires, is replaced or is cancelled.
#[derive(Debug)]
pub struct TokioScheduler {
    timers: Arc<Timers>,
    next_generation: AtomicU64,
    sender: mpsc::UnboundedSender<ScheduledAction>,
}

impl TokioScheduler {
    /// Create a scheduler and the receiving end fired actions are delivered to
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ScheduledAction>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let scheduler = Arc::new(Self {
            timers: Arc::new(DashMap::new()),
            next_generation: AtomicU64::new(0),
            sender,
        });
        (scheduler, receiver)
    }

    /// Number of timers not yet fired
    pub fn pending_count(&self) -> usize {
        self.timers.len()
    }

    pub fn is_pending(&self, execution: ExecutionRef, action: &str) -> bool {
        self.timers.contains_key(&(execution, action.to_string()))
    }

    /// Abort every pending timer
    pub fn shutdown(&self) {
        for entry in self.timers.iter() {
            entry.value().1.abort();
        }
        self.timers.clear();
    }
}

#[async_trait]
impl Scheduler for TokioScheduler {
    async fn schedule_delayed(
        &self,
        execution: ExecutionRef,
        action: &str,
        payload: Value,
        delay: Duration,
    ) -> Result<()> {
        if self.sender.is_closed() {
            return Err(ConnectorError::Scheduling(
                "scheduled action receiver has been dropped".to_string(),
            ));
        }

        let due_at = Utc::now()
            + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
        let scheduled = ScheduledAction {
            execution,
            action: action.to_string(),
            payload,
            due_at,
        };
        let key: TimerKey = (execution, action.to_string());
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let (armed_tx, armed_rx) = oneshot::channel::<()>();
        let sender = self.sender.clone();
        let timers = Arc::clone(&self.timers);
        let timer_key = key.clone();
        let timer = tokio::spawn(async move {
            // entry must be in the map before this timer can remove it
            let _ = armed_rx.await;
            tokio::time::sleep(delay).await;
            if sender.send(scheduled).is_err() {
                warn!("Scheduled action dropped: receiver closed");
            }
            timers.remove_if(&timer_key, |_, (current, _)| *current == generation);
        });

        if let Some((_, previous)) = self.timers.insert(key, (generation, timer)) {
            previous.abort();
        }
        let _ = armed_tx.send(());

        debug!(
            execution_id = %execution,
            action = %action,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "Scheduled delayed action"
        );
        Ok(())
    }

    async fn cancel(&self, execution: ExecutionRef, action: &str) -> Result<()> {
        if let Some((_, (_, timer))) = self.timers.remove(&(execution, action.to_string())) {
            timer.abort();
        }
        Ok(())
    }
}
