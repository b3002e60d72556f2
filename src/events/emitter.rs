//! # Output Emitter
//!
//! Maps a terminal outcome onto one of the two execution output channels. Only the
//! completion reconciler calls this, after winning the completion compare-and-swap,
//! which is what makes the emission happen once per execution.

use super::publisher::EventSink;
use crate::constants::{channels, events};
use crate::error::{ConnectorError, Result};
use crate::models::{ExecutionRef, JobOutcome, JobSnapshot};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct OutputEmitter {
    sink: Arc<dyn EventSink>,
}

impl OutputEmitter {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self { sink }
    }

    /// Channel an outcome is reported on: only `Success` is a success
    pub fn channel_for(outcome: JobOutcome) -> &'static str {
        if outcome.is_success() {
            channels::SUCCESS
        } else {
            channels::FAILURE
        }
    }

    pub async fn emit(
        &self,
        execution: ExecutionRef,
        outcome: JobOutcome,
        snapshot: &JobSnapshot,
    ) -> Result<()> {
        let channel = Self::channel_for(outcome);
        let payload = serde_json::to_value(snapshot)?;

        self.sink
            .emit(channel, events::REMOTE_JOB_FINISHED, payload)
            .await
            .map_err(|e| ConnectorError::Emission(e.to_string()))?;

        info!(
            execution_id = %execution,
            handle = %snapshot.handle,
            channel = channel,
            outcome = %outcome,
            "Emitted terminal remote job outcome"
        );
        Ok(())
    }
}

impl std::fmt::Debug for OutputEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputEmitter").finish_non_exhaustive()
    }
}
