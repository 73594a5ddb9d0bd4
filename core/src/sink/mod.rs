pub mod api;
pub mod batch;
pub mod client;
pub mod request;

use tracing::{debug, info};

use crate::errors::Result;
use crate::model::ImportAction;
use crate::recorder::ApiErrorRecorder;

pub use api::ApiSink;
pub use client::{ApiClient, ApiResponse, HttpApiClient};

/// The `Sink` trait defines the contract for any destination of import actions.
///
/// Actions handed to a sink may be buffered, so `shutdown` must be called once
/// the source is exhausted to deliver whatever is still pending.
#[allow(async_fn_in_trait)]
pub trait Sink {
    async fn handle_actions(&mut self, actions: Vec<ImportAction>) -> Result<()>;

    async fn shutdown(&mut self) -> Result<()>;
}

/// Accepts every action and sends nothing. Used for dry runs.
#[derive(Debug, Default)]
pub struct NoOpSink {
    actions_seen: usize,
}

impl NoOpSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn actions_seen(&self) -> usize {
        self.actions_seen
    }
}

impl Sink for NoOpSink {
    async fn handle_actions(&mut self, actions: Vec<ImportAction>) -> Result<()> {
        for action in &actions {
            debug!("DRY RUN: would handle {} action", action.kind());
        }
        self.actions_seen += actions.len();
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<()> {
        info!("DRY RUN: {} actions would have been sent", self.actions_seen);
        Ok(())
    }
}

/// The sink chosen at runtime from configuration.
pub enum SinkBackend {
    Api(ApiSink<HttpApiClient, Box<dyn ApiErrorRecorder>>),
    DryRun(NoOpSink),
}

impl Sink for SinkBackend {
    async fn handle_actions(&mut self, actions: Vec<ImportAction>) -> Result<()> {
        match self {
            SinkBackend::Api(sink) => sink.handle_actions(actions).await,
            SinkBackend::DryRun(sink) => sink.handle_actions(actions).await,
        }
    }

    async fn shutdown(&mut self) -> Result<()> {
        match self {
            SinkBackend::Api(sink) => sink.shutdown().await,
            SinkBackend::DryRun(sink) => sink.shutdown().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CustomEvent, UserProfile};

    #[tokio::test]
    async fn test_no_op_sink_accepts_everything() {
        let mut sink = NoOpSink::new();
        let actions = vec![
            ImportAction::update_user(UserProfile::default()),
            ImportAction::track_event(CustomEvent::new("anonymous")),
        ];

        sink.handle_actions(actions).await.unwrap();
        sink.handle_actions(Vec::new()).await.unwrap();
        sink.shutdown().await.unwrap();
        sink.shutdown().await.unwrap();

        assert_eq!(sink.actions_seen(), 2);
    }

    #[tokio::test]
    async fn test_dry_run_backend_dispatches_to_no_op() {
        let mut backend = SinkBackend::DryRun(NoOpSink::new());
        backend
            .handle_actions(vec![ImportAction::update_user(UserProfile::with_email(
                "test@iterable.com",
            ))])
            .await
            .unwrap();
        backend.shutdown().await.unwrap();

        match backend {
            SinkBackend::DryRun(sink) => assert_eq!(sink.actions_seen(), 1),
            SinkBackend::Api(_) => panic!("expected dry run backend"),
        }
    }
}
