// State machine module for remote job correlations
//
// A correlation only ever moves forward: Dispatched -> Discovering -> Found -> Completed.
// Transition rules live in `determine_target_state`; `JobCorrelation::apply` is the
// single place that mutates status.

pub mod errors;
pub mod events;
pub mod states;

pub use errors::{StateMachineError, StateMachineResult};
pub use events::CorrelationEvent;
pub use states::CorrelationStatus;

/// Determine the target state based on current state and event
pub fn determine_target_state(
    current_state: CorrelationStatus,
    event: &CorrelationEvent,
) -> StateMachineResult<CorrelationStatus> {
    let target = match (current_state, event) {
        (CorrelationStatus::Dispatched, CorrelationEvent::BeginDiscovery) => {
            CorrelationStatus::Discovering
        }
        (CorrelationStatus::Discovering, CorrelationEvent::HandleDiscovered(_)) => {
            CorrelationStatus::Found
        }
        (CorrelationStatus::Found, CorrelationEvent::Complete(_)) => CorrelationStatus::Completed,

        (from_state, _) => {
            return Err(StateMachineError::InvalidTransition {
                from: from_state.to_string(),
                event: event.event_type().to_string(),
            })
        }
    };

    Ok(target)
}
