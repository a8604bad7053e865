//! Channel-driven accumulator service.
//!
//! [`AccumulatorService`] owns a [`StreamAccumulator`] on a background
//! task and feeds it from a flume channel, so engine collaborators on
//! other tasks emit [`ExecEvent`]s fire-and-forget. The loop honors the
//! batching contract: while a deferred flush is pending it drains events
//! without awaiting, and applies the flush the moment the channel goes
//! momentarily quiet, the async analogue of a next-tick boundary.

use miette::Diagnostic;
use thiserror::Error;
use tokio::task;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::accumulator::StreamAccumulator;
use crate::events::ExecEvent;
use crate::observe::ChangeNotice;

/// Errors from driving an accumulator over a channel.
#[derive(Debug, Error, Diagnostic)]
pub enum ServiceError {
    #[error("accumulator service is no longer accepting events")]
    #[diagnostic(
        code(streamloom::service::closed),
        help("the service task has stopped; call finish() only once and do not send after it")
    )]
    Closed,

    #[error("accumulator service task failed: {0}")]
    #[diagnostic(code(streamloom::service::join))]
    Join(#[from] task::JoinError),
}

/// Configuration for one service run.
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    /// Workflow id; a fresh UUID when not supplied.
    pub workflow_id: Option<String>,
    pub workflow_name: String,
}

impl ServiceConfig {
    pub fn new(workflow_name: impl Into<String>) -> Self {
        Self {
            workflow_id: None,
            workflow_name: workflow_name.into(),
        }
    }

    #[must_use]
    pub fn with_workflow_id(mut self, id: impl Into<String>) -> Self {
        self.workflow_id = Some(id.into());
        self
    }

    fn resolve_id(&self) -> String {
        self.workflow_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string())
    }
}

/// Background-task wrapper around one [`StreamAccumulator`].
pub struct AccumulatorService {
    events: flume::Sender<ExecEvent>,
    handle: task::JoinHandle<StreamAccumulator>,
}

impl AccumulatorService {
    /// Spawn the service. Requires a running tokio runtime.
    pub fn spawn(config: ServiceConfig) -> Self {
        Self::spawn_with_notifier(config, None)
    }

    /// Spawn with a change-notice sender wired into the accumulator,
    /// typically [`ChangeHub::sender`](crate::observe::ChangeHub::sender).
    pub fn spawn_with_notifier(
        config: ServiceConfig,
        notices: Option<flume::Sender<ChangeNotice>>,
    ) -> Self {
        let (events, receiver) = flume::unbounded();
        let mut accumulator =
            StreamAccumulator::new(config.resolve_id(), config.workflow_name.clone());
        if let Some(notices) = notices {
            accumulator = accumulator.with_notifier(notices);
        }
        let handle = task::spawn(run_loop(accumulator, receiver));
        Self { events, handle }
    }

    /// Clone of the event sender, for handing to engine collaborators.
    pub fn sender(&self) -> flume::Sender<ExecEvent> {
        self.events.clone()
    }

    /// Send one event to the service.
    pub fn send(&self, event: ExecEvent) -> Result<(), ServiceError> {
        self.events.send(event).map_err(|_| ServiceError::Closed)
    }

    /// Close the channel, let the task drain remaining events, and take
    /// the accumulator back.
    pub async fn finish(self) -> Result<StreamAccumulator, ServiceError> {
        let Self { events, handle } = self;
        drop(events);
        Ok(handle.await?)
    }
}

#[instrument(skip_all)]
async fn run_loop(
    mut accumulator: StreamAccumulator,
    receiver: flume::Receiver<ExecEvent>,
) -> StreamAccumulator {
    loop {
        if accumulator.has_scheduled_flush() {
            // Drain without awaiting; flush at the first quiet moment.
            match receiver.try_recv() {
                Ok(event) => accumulator.apply_event(event),
                Err(flume::TryRecvError::Empty) => accumulator.flush(),
                Err(flume::TryRecvError::Disconnected) => {
                    accumulator.flush();
                    break;
                }
            }
        } else {
            match receiver.recv_async().await {
                Ok(event) => accumulator.apply_event(event),
                Err(_) => break,
            }
        }
    }
    debug!(version = accumulator.version(), "service loop drained");
    accumulator
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeKind;

    #[tokio::test]
    async fn test_service_applies_and_flushes() {
        let service = AccumulatorService::spawn(ServiceConfig::new("svc"));
        service
            .send(ExecEvent::node_start("n1", "Node", NodeKind::Agent))
            .unwrap();
        service.send(ExecEvent::node_token("n1", "hel")).unwrap();
        service.send(ExecEvent::node_token("n1", "lo")).unwrap();

        let accumulator = service.finish().await.unwrap();
        let node = &accumulator.tree().nodes["n1"];
        assert_eq!(node.streaming_text.as_deref(), Some("hello"));
        assert_eq!(node.token_estimate, 2);
    }

    #[tokio::test]
    async fn test_config_generates_workflow_id() {
        let service = AccumulatorService::spawn(ServiceConfig::new("svc"));
        let accumulator = service.finish().await.unwrap();
        assert!(!accumulator.tree().id.is_empty());
    }
}
