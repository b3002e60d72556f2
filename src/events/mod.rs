pub mod emitter;
pub mod publisher;

// Re-export key types for convenience
pub use emitter::OutputEmitter;
pub use publisher::{BroadcastEventSink, EmittedEvent, EventSink, PublishError};
