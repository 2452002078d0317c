//! The producer side of a session.
//!
//! The worker resolves the agent, drives the engine and translates its
//! events into messages on the session queues. Its body runs inside an
//! isolation boundary: whatever happens in there, including a panic, ends
//! with at most one fatal message and with both queues closed.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::{FutureExt, StreamExt};
use sluice_common::constants::INTERNAL_SERVER_ERROR;
use sluice_common::{Result, SluiceError, StreamSettings};
use tracing::{debug, error, info, warn};

use crate::cancel::Cancellation;
use crate::engine::{
    AgentDirectory, AgentEngine, AgentEvent, AgentQuery, AgentSetup, Failure, ProviderDirectory,
};
use crate::message::Message;
use crate::queue::{Abandoned, QueueSender};

/// Why the worker body stopped early.
#[derive(Debug)]
enum Halt {
    Cancelled,
    Fault(SluiceError),
}

impl From<SluiceError> for Halt {
    fn from(err: SluiceError) -> Self {
        Halt::Fault(err)
    }
}

impl From<Abandoned> for Halt {
    fn from(_: Abandoned) -> Self {
        Halt::Cancelled
    }
}

pub struct SessionWorker {
    engine: Arc<dyn AgentEngine>,
    agents: Arc<dyn AgentDirectory>,
    providers: Arc<dyn ProviderDirectory>,
    settings: StreamSettings,
    query: AgentQuery,
    queues: QueueSender,
    cancel: Cancellation,
}

impl SessionWorker {
    pub fn new(
        engine: Arc<dyn AgentEngine>,
        agents: Arc<dyn AgentDirectory>,
        providers: Arc<dyn ProviderDirectory>,
        settings: StreamSettings,
        query: AgentQuery,
        queues: QueueSender,
        cancel: Cancellation,
    ) -> Self {
        Self {
            engine,
            agents,
            providers,
            settings,
            query,
            queues,
            cancel,
        }
    }

    /// Run to completion. Never panics; consumes the worker so the queues
    /// close when it returns.
    pub async fn run(self) {
        let outcome = AssertUnwindSafe(self.produce()).catch_unwind().await;

        let fault = match outcome {
            Ok(Ok(())) => {
                debug!("producer finished");
                None
            }
            Ok(Err(Halt::Cancelled)) => {
                info!(reason = ?self.cancel.reason(), "producer stopped by cancellation");
                None
            }
            Ok(Err(Halt::Fault(err))) => {
                warn!(error = %err, code = err.code(), "producer failed");
                Some(err)
            }
            Err(payload) => {
                error!(panic = panic_message(payload.as_ref()), "producer panicked");
                Some(SluiceError::internal(INTERNAL_SERVER_ERROR))
            }
        };

        if let Some(fault) = fault {
            if let Err(abandoned) = self.queues.send_fatal(fault, &self.cancel).await {
                debug!(?abandoned, "fatal message dropped");
            }
        }
    }

    async fn produce(&self) -> std::result::Result<(), Halt> {
        let setup = self.resolve().await?;
        let start = self
            .engine
            .start(setup, self.query.message.clone(), self.cancel.token());
        let mut events = self.until_cancelled(start).await??;

        loop {
            if self.cancel.is_fired() {
                return Err(Halt::Cancelled);
            }
            let Some(event) = self.until_cancelled(events.next()).await? else {
                return Ok(());
            };

            match event {
                AgentEvent::Output {
                    agent_name,
                    tool_name,
                    content,
                    reasoning_content,
                } => {
                    if !reasoning_content.is_empty() {
                        self.enqueue(Message::reasoning(&agent_name, tool_name.clone(), reasoning_content))
                            .await?;
                    }
                    if !content.is_empty() {
                        self.enqueue(Message::content(agent_name, tool_name, content))
                            .await?;
                    }
                }
                AgentEvent::Failed {
                    agent_name,
                    failure: Failure::Step(message),
                } => {
                    warn!(agent = %agent_name, error = %message, "agent step failed");
                    self.enqueue(Message::error_frame(agent_name, message)).await?;
                    return Ok(());
                }
                AgentEvent::Failed {
                    agent_name,
                    failure: Failure::System(message),
                } => {
                    return Err(Halt::Fault(SluiceError::Engine(format!(
                        "{agent_name}: {message}"
                    ))));
                }
            }
        }
    }

    async fn resolve(&self) -> std::result::Result<AgentSetup, Halt> {
        let query = &self.query;
        let agent = self
            .lookup("agent", self.agents.find_agent(query.user_id, query.agent_id))
            .await?
            .ok_or(SluiceError::AgentNotFound)?;

        let provider = self
            .lookup("provider", self.providers.find_provider(&agent.model_provider))
            .await?
            .ok_or_else(|| SluiceError::ProviderConfigNotFound(agent.model_provider.clone()))?;

        debug!(agent = %agent.name, provider = %provider.provider, model = %agent.model_name, "agent resolved");
        Ok(AgentSetup::new(&agent, provider))
    }

    /// Bounded, cancellable directory lookup.
    async fn lookup<T>(
        &self,
        what: &str,
        fut: impl Future<Output = Result<T>>,
    ) -> std::result::Result<T, Halt> {
        let bounded = tokio::time::timeout(self.settings.lookup_timeout, fut);
        match self.until_cancelled(bounded).await? {
            Ok(found) => Ok(found?),
            Err(_) => Err(Halt::Fault(SluiceError::Timeout(format!("{what} lookup")))),
        }
    }

    async fn until_cancelled<F: Future>(&self, fut: F) -> std::result::Result<F::Output, Halt> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Halt::Cancelled),
            out = fut => Ok(out),
        }
    }

    async fn enqueue(&self, message: Message) -> std::result::Result<(), Halt> {
        self.queues.send_data(message, &self.cancel).await.map_err(|abandoned| {
            debug!(?abandoned, "data message abandoned");
            Halt::from(abandoned)
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelReason;
    use crate::queue::session_queues;
    use crate::testing::{ScriptedEngine, StaticAgents, StaticProviders, Step, sample_agent};
    use std::time::Duration;
    use uuid::Uuid;

    struct Harness {
        worker: SessionWorker,
        rx: crate::queue::QueueReceiver,
        cancel: Cancellation,
    }

    fn harness(engine: ScriptedEngine, settings: StreamSettings) -> Harness {
        let user = Uuid::new_v4();
        let agent = sample_agent(user);
        let query = AgentQuery {
            session_id: Uuid::new_v4(),
            user_id: user,
            agent_id: agent.id,
            message: "hi".into(),
        };
        let (tx, rx) = session_queues(&settings);
        let cancel = Cancellation::new();
        let worker = SessionWorker::new(
            Arc::new(engine),
            Arc::new(StaticAgents::new([agent])),
            Arc::new(StaticProviders::new(["openai"])),
            settings,
            query,
            tx,
            cancel.clone(),
        );
        Harness { worker, rx, cancel }
    }

    async fn drain(rx: &mut crate::queue::QueueReceiver) -> Vec<Message> {
        let mut out = Vec::new();
        while let Some(msg) = rx.recv_data().await {
            out.push(msg);
        }
        out
    }

    #[tokio::test]
    async fn reasoning_is_enqueued_before_content_and_empties_are_skipped() {
        let engine = ScriptedEngine::new(vec![
            Step::Emit(AgentEvent::Output {
                agent_name: "helper".into(),
                tool_name: None,
                content: "answer".into(),
                reasoning_content: "thought".into(),
            }),
            Step::Emit(AgentEvent::content("helper", "")),
        ]);
        let mut h = harness(engine, StreamSettings::default());
        h.worker.run().await;

        let messages = drain(&mut h.rx).await;
        assert_eq!(
            messages,
            vec![
                Message::reasoning("helper", None, "thought"),
                Message::content("helper", None, "answer"),
            ]
        );
        assert!(h.rx.errors.recv().await.is_none());
    }

    #[tokio::test]
    async fn step_failure_becomes_error_frame_and_stops() {
        let engine = ScriptedEngine::new(vec![
            Step::Emit(AgentEvent::step_failed("helper", "tool exploded")),
            Step::Emit(AgentEvent::content("helper", "never")),
        ]);
        let mut h = harness(engine, StreamSettings::default());
        h.worker.run().await;

        assert_eq!(
            drain(&mut h.rx).await,
            vec![Message::error_frame("helper", "tool exploded")]
        );
        assert!(h.rx.errors.recv().await.is_none());
    }

    #[tokio::test]
    async fn panic_becomes_single_internal_error() {
        let engine = ScriptedEngine::new(vec![
            Step::Emit(AgentEvent::content("helper", "partial")),
            Step::Panic("engine bug".into()),
        ]);
        let mut h = harness(engine, StreamSettings::default());
        h.worker.run().await;

        assert_eq!(drain(&mut h.rx).await, vec![Message::content("helper", None, "partial")]);
        let fault = h.rx.errors.recv().await.expect("one fatal");
        assert_eq!(fault.to_string(), "internal server error");
        assert!(h.rx.errors.recv().await.is_none());
    }

    #[tokio::test]
    async fn engine_start_failure_is_fatal() {
        let mut h = harness(ScriptedEngine::failing_start("model unavailable"), StreamSettings::default());
        h.worker.run().await;

        assert!(drain(&mut h.rx).await.is_empty());
        let fault = h.rx.errors.recv().await.expect("one fatal");
        assert!(matches!(fault, SluiceError::Engine(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_lookup_times_out() {
        let user = Uuid::new_v4();
        let agent = sample_agent(user);
        let settings = StreamSettings::default();
        let (tx, mut rx) = session_queues(&settings);
        let worker = SessionWorker::new(
            Arc::new(ScriptedEngine::new(vec![])),
            Arc::new(StaticAgents::new([agent.clone()]).delayed(Duration::from_secs(60))),
            Arc::new(StaticProviders::new(["openai"])),
            settings,
            AgentQuery {
                session_id: Uuid::new_v4(),
                user_id: user,
                agent_id: agent.id,
                message: "hi".into(),
            },
            tx,
            Cancellation::new(),
        );
        worker.run().await;

        let fault = rx.errors.recv().await.expect("timeout fault");
        assert!(matches!(fault, SluiceError::Timeout(_)));
    }

    #[tokio::test]
    async fn cancellation_releases_a_blocked_producer() {
        let settings = StreamSettings {
            data_capacity: 1,
            ..StreamSettings::default()
        };
        let steps = (0..10)
            .map(|i| Step::Emit(AgentEvent::content("helper", format!("chunk {i}"))))
            .collect();
        let h = harness(ScriptedEngine::new(steps), settings);
        let Harness { worker, mut rx, cancel } = h;

        let task = tokio::spawn(worker.run());
        // Let the worker fill the queue and block on the next send.
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.fire(CancelReason::ClientDisconnected);

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("worker must stop after cancellation")
            .unwrap();

        // The message enqueued before cancellation is still there.
        assert_eq!(drain(&mut rx).await.len(), 1);
        assert!(rx.errors.recv().await.is_none());
    }
}
