//! A rejected terminal emission stays pending on the record and is delivered by
//! the next poll or notification, once.

mod common;

use common::{notification_body, FakeRemoteSystem, Harness};
use std::time::Duration;
use tasker_remote_jobs::orchestration::NotificationDisposition;
use tasker_remote_jobs::{
    ConnectorError, CorrelationStatus, EmissionState, ExecutionRef, JobOutcome, PollTickOutcome,
    ReconcileOutcome,
};

const POLL_INTERVAL: Duration = Duration::from_secs(300);

async fn completed_with_rejected_emission(harness: &Harness) -> (ExecutionRef, String) {
    let (execution, handle) = harness.start_execution().await;
    harness.remote.set_status(&handle, "completed", "success");
    harness.sink.reject_next(1);

    let first = harness.connector.poll(execution).await.unwrap();
    assert_eq!(
        first,
        PollTickOutcome::RescheduledAfterError {
            consecutive_failures: 1
        }
    );
    assert!(harness.sink.events().is_empty());

    let correlation = harness.connector.correlation(execution).await.unwrap().unwrap();
    assert_eq!(correlation.status(), CorrelationStatus::Completed);
    assert_eq!(correlation.outcome(), JobOutcome::Success);
    assert_eq!(correlation.emission(), EmissionState::Pending);
    (execution, handle)
}

#[tokio::test]
async fn test_next_poll_delivers_rejected_emission() {
    let harness = Harness::new(FakeRemoteSystem::new());
    let (execution, handle) = completed_with_rejected_emission(&harness).await;

    let schedules = harness.scheduler.schedules_for(execution);
    assert!(schedules.len() > 1);
    assert!(schedules.iter().all(|delay| *delay == POLL_INTERVAL));

    let second = harness.connector.poll(execution).await.unwrap();
    assert_eq!(
        second,
        PollTickOutcome::Stopped(ReconcileOutcome::Emitted(JobOutcome::Success))
    );
    let events = harness.sink.events_for_handle(&handle);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].channel, "success");
    assert_eq!(harness.scheduler.cancels_for(execution), 1);

    let third = harness.connector.poll(execution).await.unwrap();
    assert_eq!(third, PollTickOutcome::Stopped(ReconcileOutcome::AlreadySettled));
    assert_eq!(harness.sink.events().len(), 1);

    let correlation = harness.connector.correlation(execution).await.unwrap().unwrap();
    assert_eq!(correlation.emission(), EmissionState::Delivered);
}

#[tokio::test]
async fn test_notification_delivers_rejected_emission() {
    let harness = Harness::new(FakeRemoteSystem::new());
    let (execution, handle) = completed_with_rejected_emission(&harness).await;

    let body = notification_body("completed", &handle, "completed", "success");
    let disposition = harness.connector.handle_notification(None, &body).await.unwrap();
    assert_eq!(
        disposition,
        NotificationDisposition::Reconciled {
            outcome: ReconcileOutcome::Emitted(JobOutcome::Success)
        }
    );

    let duplicate = harness.connector.handle_notification(None, &body).await.unwrap();
    assert_eq!(
        duplicate,
        NotificationDisposition::Reconciled {
            outcome: ReconcileOutcome::AlreadySettled
        }
    );
    let tick = harness.connector.poll(execution).await.unwrap();
    assert_eq!(tick, PollTickOutcome::Stopped(ReconcileOutcome::AlreadySettled));
    assert_eq!(harness.sink.events_for_handle(&handle).len(), 1);
}

#[tokio::test]
async fn test_rejected_notification_emission_schedules_a_poll() {
    let harness = Harness::new(FakeRemoteSystem::new());
    let (execution, handle) = harness.start_execution().await;
    harness.remote.set_status(&handle, "completed", "failure");
    harness.sink.reject_next(1);

    let body = notification_body("completed", &handle, "completed", "failure");
    let result = harness.connector.handle_notification(None, &body).await;
    assert!(matches!(result, Err(ConnectorError::Emission(_))));
    assert!(harness.sink.events().is_empty());
    assert_eq!(
        harness.scheduler.schedules_for(execution),
        vec![POLL_INTERVAL, POLL_INTERVAL]
    );

    let tick = harness.connector.poll(execution).await.unwrap();
    assert_eq!(
        tick,
        PollTickOutcome::Stopped(ReconcileOutcome::Emitted(JobOutcome::Failure))
    );
    let events = harness.sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].channel, "failure");
}
