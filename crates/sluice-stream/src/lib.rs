//! Sluice Stream - live event streams for long-running agent answers
//!
//! A session pairs a [`SessionWorker`](worker::SessionWorker), which runs the
//! agent engine and feeds two bounded queues, with an
//! [`EventMultiplexer`](multiplexer::EventMultiplexer), which merges those
//! queues with heartbeats and cancellation and writes frames to the client.
//! [`SessionController`] wires the two together.

pub mod cancel;
pub mod controller;
pub mod encoder;
pub mod engine;
pub mod heartbeat;
pub mod message;
pub mod multiplexer;
pub mod queue;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod worker;

pub use cancel::{CancelReason, Cancellation};
pub use controller::SessionController;
pub use encoder::{FrameSink, WireEncoder, WireError, WriterSink};
pub use engine::{
    AgentDirectory, AgentEngine, AgentEvent, AgentEventStream, AgentQuery, AgentSetup, Failure,
    ModelConfig, ProviderDirectory,
};
pub use message::{FragmentKind, Message};
pub use multiplexer::SessionOutcome;
