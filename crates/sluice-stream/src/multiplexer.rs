//! Per-session control loop merging data, faults, heartbeats and
//! cancellation into one ordered stream of frames.

use tracing::{debug, trace, warn};

use crate::cancel::{CancelReason, Cancellation};
use crate::encoder::{FrameSink, WireEncoder};
use crate::heartbeat::Heartbeat;
use crate::message::Message;
use crate::queue::QueueReceiver;

/// How a session ended. Each session has exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// `[DONE]` was written.
    Completed,
    /// An error line was written.
    Failed,
    /// Cancellation was observed; nothing more was written.
    Cancelled,
    /// Writing to the client failed.
    WriteFailed,
}

pub struct EventMultiplexer<S> {
    queues: QueueReceiver,
    heartbeat: Heartbeat,
    encoder: WireEncoder<S>,
    cancel: Cancellation,
}

impl<S: FrameSink> EventMultiplexer<S> {
    pub fn new(queues: QueueReceiver, heartbeat: Heartbeat, encoder: WireEncoder<S>, cancel: Cancellation) -> Self {
        Self {
            queues,
            heartbeat,
            encoder,
            cancel,
        }
    }

    /// Drive the session until a terminal frame, a write failure or
    /// cancellation.
    ///
    /// Selection is biased: cancellation, then client disconnect, then
    /// heartbeat, then data (which includes data-queue closure), then
    /// faults. Data therefore always drains ahead of a pending fault, and a
    /// closed data queue only means `Done` when no fault is waiting. Writes
    /// race cancellation, so a stalled client cannot pin the session.
    pub async fn run(mut self) -> SessionOutcome {
        let mut errors_open = true;
        debug!(heartbeat = ?self.heartbeat.period(), "multiplexer started");

        loop {
            let message = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return SessionOutcome::Cancelled,
                _ = self.encoder.closed() => {
                    self.cancel.fire(CancelReason::ClientDisconnected);
                    return SessionOutcome::Cancelled;
                }
                _ = self.heartbeat.tick() => Message::Heartbeat,
                received = self.queues.data.recv() => match received {
                    Some(message) => message,
                    None => match self.queues.errors.try_recv() {
                        Ok(fault) => Message::Fatal { cause: fault.to_string() },
                        Err(_) => Message::Done,
                    },
                },
                fault = self.queues.errors.recv(), if errors_open => match fault {
                    Some(fault) => Message::Fatal { cause: fault.to_string() },
                    None => {
                        // Closure alone is not terminal; data closure decides.
                        errors_open = false;
                        continue;
                    }
                },
            };

            if self.cancel.is_fired() {
                return SessionOutcome::Cancelled;
            }

            trace!(?message, "writing frame");
            // A client that stops reading blocks the write; cancellation
            // must still end the session.
            let written = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!("write abandoned on cancellation");
                    return SessionOutcome::Cancelled;
                }
                written = self.encoder.emit(&message) => written,
            };
            if let Err(err) = written {
                warn!(error = %err, frames = self.encoder.frames_written(), "stream write failed");
                self.cancel.fire(CancelReason::WriteFailed);
                return SessionOutcome::WriteFailed;
            }

            if message.is_terminal() {
                debug!(frames = self.encoder.frames_written(), "stream finished");
                return match message {
                    Message::Done => SessionOutcome::Completed,
                    _ => SessionOutcome::Failed,
                };
            }
        }
    }
}
