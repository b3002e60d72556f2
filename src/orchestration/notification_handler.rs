//! # Inbound Notification Handler
//!
//! Entry point for push notifications from the remote system. Runs on a request
//! thread, so it never waits on anything but one store lookup and one
//! reconciliation. Boundary failures (signature, shape) are rejected without
//! touching state; notifications for handles this system never dispatched are
//! acknowledged and dropped.

use crate::config::NotificationConfig;
use crate::error::Result;
use crate::models::NotificationPayload;
use crate::orchestration::reconciler::{CompletionReconciler, ReconcileOutcome};
use crate::registry::CorrelationStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Boundary verification failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    #[error("Notification signature missing")]
    MissingSignature,
    #[error("Notification signature invalid: {0}")]
    InvalidSignature(String),
}

/// Provider-specific authenticity check for notification bodies
pub trait NotificationVerifier: Send + Sync {
    fn verify(
        &self,
        signature: Option<&str>,
        body: &[u8],
    ) -> std::result::Result<(), VerificationError>;
}

/// Verifier for deployments that authenticate notifications upstream
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAllVerifier;

impl NotificationVerifier for AcceptAllVerifier {
    fn verify(
        &self,
        _signature: Option<&str>,
        _body: &[u8],
    ) -> std::result::Result<(), VerificationError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    /// Signature check failed
    Unauthorized,
    /// Body is not a well-formed notification
    Malformed,
}

/// How a notification was handled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "disposition", rename_all = "snake_case")]
pub enum NotificationDisposition {
    Rejected { kind: RejectionKind, reason: String },
    /// Action does not signal completion
    Ignored { action: String },
    /// Handle not registered: not our job, or registration has not happened yet
    UnknownHandle { handle: String },
    Reconciled { outcome: ReconcileOutcome },
}

impl NotificationDisposition {
    /// HTTP status to answer the notifier with
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Rejected {
                kind: RejectionKind::Unauthorized,
                ..
            } => 403,
            Self::Rejected {
                kind: RejectionKind::Malformed,
                ..
            } => 400,
            Self::Ignored { .. } | Self::UnknownHandle { .. } | Self::Reconciled { .. } => 200,
        }
    }
}

#[derive(Clone)]
pub struct NotificationHandler {
    verifier: Arc<dyn NotificationVerifier>,
    correlations: Arc<dyn CorrelationStore>,
    reconciler: CompletionReconciler,
    config: NotificationConfig,
}

impl NotificationHandler {
    pub fn new(
        verifier: Arc<dyn NotificationVerifier>,
        correlations: Arc<dyn CorrelationStore>,
        reconciler: CompletionReconciler,
        config: NotificationConfig,
    ) -> Self {
        Self {
            verifier,
            correlations,
            reconciler,
            config,
        }
    }

    /// Handle one raw notification. `Err` is reserved for internal failures
    /// (storage, emission); everything the notifier got wrong is a disposition.
    #[instrument(skip(self, signature, body), fields(body_len = body.len()))]
    pub async fn handle(
        &self,
        signature: Option<&str>,
        body: &[u8],
    ) -> Result<NotificationDisposition> {
        if let Err(e) = self.verifier.verify(signature, body) {
            warn!(error = %e, "Rejected notification at signature check");
            return Ok(NotificationDisposition::Rejected {
                kind: RejectionKind::Unauthorized,
                reason: e.to_string(),
            });
        }

        let payload = match NotificationPayload::from_slice(body) {
            Ok(payload) => payload,
            Err(reason) => {
                warn!(reason = %reason, "Rejected malformed notification");
                return Ok(NotificationDisposition::Rejected {
                    kind: RejectionKind::Malformed,
                    reason,
                });
            }
        };

        self.handle_payload(&payload).await
    }

    /// Route an already-verified payload
    pub async fn handle_payload(
        &self,
        payload: &NotificationPayload,
    ) -> Result<NotificationDisposition> {
        if !self.config.triggers_reconciliation(&payload.action) {
            debug!(action = %payload.action, "Ignoring non-completion notification");
            return Ok(NotificationDisposition::Ignored {
                action: payload.action.clone(),
            });
        }

        let handle = payload.handle();
        let Some(execution) = self.correlations.lookup(&handle).await? else {
            debug!(handle = %handle, "Notification for unregistered handle");
            return Ok(NotificationDisposition::UnknownHandle {
                handle: handle.to_string(),
            });
        };

        let outcome = self
            .reconciler
            .reconcile(execution, &payload.observed_status())
            .await?;

        info!(
            handle = %handle,
            execution_id = %execution,
            outcome = ?outcome,
            "Notification reconciled"
        );
        Ok(NotificationDisposition::Reconciled { outcome })
    }
}

impl std::fmt::Debug for NotificationHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationHandler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
