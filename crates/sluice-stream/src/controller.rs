//! Wires one streaming session together.

use std::sync::Arc;

use sluice_common::StreamSettings;
use tracing::{Instrument, error, info, info_span};

use crate::cancel::{CancelReason, Cancellation};
use crate::encoder::{FrameSink, WireEncoder};
use crate::engine::{AgentDirectory, AgentEngine, AgentQuery, ProviderDirectory};
use crate::heartbeat::Heartbeat;
use crate::multiplexer::{EventMultiplexer, SessionOutcome};
use crate::queue::session_queues;
use crate::worker::SessionWorker;

/// Entry point for streaming sessions.
///
/// Each call to [`SessionController::serve`] owns one session: it spawns
/// the worker, runs the multiplexer on the calling task, and only returns
/// once the worker has exited and every session resource is released.
#[derive(Clone)]
pub struct SessionController {
    engine: Arc<dyn AgentEngine>,
    agents: Arc<dyn AgentDirectory>,
    providers: Arc<dyn ProviderDirectory>,
    settings: StreamSettings,
}

impl SessionController {
    pub fn new(
        engine: Arc<dyn AgentEngine>,
        agents: Arc<dyn AgentDirectory>,
        providers: Arc<dyn ProviderDirectory>,
    ) -> Self {
        Self {
            engine,
            agents,
            providers,
            settings: StreamSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: StreamSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &StreamSettings {
        &self.settings
    }

    /// Stream the answer to `query` into `sink`.
    ///
    /// `cancel` may be fired from outside at any time (client gone, host
    /// shutdown). It is fired internally once the session ends.
    pub async fn serve<S: FrameSink>(&self, query: AgentQuery, sink: S, cancel: Cancellation) -> SessionOutcome {
        let session_id = query.session_id;
        info!(session_id = %session_id, agent_id = %query.agent_id, user_id = %query.user_id, "session started");

        let (tx, rx) = session_queues(&self.settings);
        let worker = SessionWorker::new(
            self.engine.clone(),
            self.agents.clone(),
            self.providers.clone(),
            self.settings,
            query,
            tx,
            cancel.clone(),
        );
        let worker = tokio::spawn(
            worker
                .run()
                .instrument(info_span!("session_worker", session_id = %session_id)),
        );

        let multiplexer = EventMultiplexer::new(
            rx,
            Heartbeat::start(self.settings.heartbeat_interval),
            WireEncoder::new(sink),
            cancel.clone(),
        );
        let outcome = multiplexer.run().await;

        let reason = match outcome {
            SessionOutcome::Failed => CancelReason::ProducerFailed,
            _ => CancelReason::SessionEnded,
        };
        cancel.fire(reason);

        if let Err(err) = worker.await {
            error!(session_id = %session_id, error = %err, "session worker task failed");
        }

        match outcome {
            SessionOutcome::Cancelled => {
                info!(session_id = %session_id, reason = ?cancel.reason(), "session cancelled")
            }
            _ => info!(session_id = %session_id, ?outcome, "session finished"),
        }
        outcome
    }
}
