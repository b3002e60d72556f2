use super::identifiers::ExternalJobHandle;
use super::remote_job::RemoteJobStatus;
use serde::{Deserialize, Serialize};

/// Inbound push notification about a remote job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub action: String,
    pub job: NotificationJob,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationJob {
    pub handle: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub outcome: String,
    #[serde(default)]
    pub url: Option<String>,
}

impl NotificationPayload {
    /// Parse and shape-check a raw notification body
    pub fn from_slice(body: &[u8]) -> Result<Self, String> {
        let payload: Self =
            serde_json::from_slice(body).map_err(|e| format!("malformed notification: {e}"))?;
        if payload.action.trim().is_empty() {
            return Err("notification action is empty".to_string());
        }
        if payload.job.handle.trim().is_empty() {
            return Err("notification job handle is empty".to_string());
        }
        Ok(payload)
    }

    pub fn handle(&self) -> ExternalJobHandle {
        ExternalJobHandle::new(self.job.handle.trim())
    }

    /// The observation carried by this notification. A notification without a job
    /// status falls back to its action (`completed`).
    pub fn observed_status(&self) -> RemoteJobStatus {
        let status = if self.job.status.trim().is_empty() {
            self.action.as_str()
        } else {
            self.job.status.as_str()
        };
        RemoteJobStatus::from_provider(
            self.handle(),
            status,
            &self.job.outcome,
            self.job.url.clone(),
        )
    }
}
