use tracing::{debug, info, warn};

use crate::config::BatchingConfig;
use crate::errors::{DeliveryError, ImportError, Result};
use crate::model::{CustomEvent, ImportAction, Purchase, UserProfile};
use crate::recorder::{ApiErrorRecorder, ApiFailure};
use crate::sink::Sink;
use crate::sink::batch::Batch;
use crate::sink::client::{ApiClient, ApiResponse};
use crate::sink::request::{
    ApiRequest, BulkTrackEventRequest, BulkUserUpdateRequest, TrackPurchaseRequest,
};
use crate::telemetry::DeliveryMetrics;

/// Sends import actions to the remote API.
///
/// Profile updates and custom events are buffered per kind and sent in bulk
/// once a batch is full. Purchases go out one request each because the
/// purchase endpoint has no bulk form. Buffered actions are only sent on
/// [`Sink::shutdown`] (or [`ApiSink::flush`]) once the import is done, so
/// that call must not be skipped.
pub struct ApiSink<C: ApiClient, R: ApiErrorRecorder> {
    client: C,
    error_recorder: R,
    users: Batch<UserProfile>,
    events: Batch<CustomEvent>,
    metrics: DeliveryMetrics,
}

impl<C: ApiClient, R: ApiErrorRecorder> ApiSink<C, R> {
    pub fn new(client: C, error_recorder: R, batching: &BatchingConfig) -> Result<Self> {
        batching.validate().map_err(ImportError::Config)?;

        Ok(Self {
            client,
            error_recorder,
            users: Batch::new(batching.users_per_batch),
            events: Batch::new(batching.events_per_batch),
            metrics: DeliveryMetrics::default(),
        })
    }

    pub fn metrics(&self) -> &DeliveryMetrics {
        &self.metrics
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn error_recorder(&self) -> &R {
        &self.error_recorder
    }

    pub fn buffered_users(&self) -> usize {
        self.users.len()
    }

    pub fn buffered_events(&self) -> usize {
        self.events.len()
    }

    /// Sends whatever is buffered, full or not.
    pub async fn flush(&mut self) {
        if !self.users.is_empty() {
            let users = self.users.drain_all();
            self.send_users(users).await;
        }
        if !self.events.is_empty() {
            let events = self.events.drain_all();
            self.send_events(events).await;
        }
    }

    async fn handle_action(&mut self, action: ImportAction) -> Result<()> {
        debug!(kind = action.kind(), "handling import action");

        if !action.has_identity() {
            return Err(ImportError::UnsupportedAction {
                reason: format!("{} action has neither email nor userId", action.kind()),
            });
        }

        match action {
            ImportAction::UpdateUserProfile { profile } => {
                if let Some(full) = self.users.push(profile) {
                    self.send_users(full).await;
                }
            }
            ImportAction::TrackCustomEvent { event } => {
                if let Some(full) = self.events.push(event) {
                    self.send_events(full).await;
                }
            }
            ImportAction::TrackPurchase { purchase } => {
                self.send_purchase(purchase).await;
            }
        }
        Ok(())
    }

    async fn send_users(&mut self, users: Vec<UserProfile>) {
        let request = BulkUserUpdateRequest::new(users);
        debug!("sending bulk user update of {} users", request.users.len());
        let outcome = self.client.bulk_update_users(&request).await;
        self.metrics.user_batches_sent += 1;
        self.handle_outcome(&request, outcome);
    }

    async fn send_events(&mut self, events: Vec<CustomEvent>) {
        let request = BulkTrackEventRequest::new(events);
        debug!("sending bulk track of {} events", request.events.len());
        let outcome = self.client.bulk_track_events(&request).await;
        self.metrics.event_batches_sent += 1;
        self.handle_outcome(&request, outcome);
    }

    async fn send_purchase(&mut self, purchase: Purchase) {
        let request = TrackPurchaseRequest::new(purchase);
        let outcome = self.client.track_purchase(&request).await;
        self.metrics.purchases_sent += 1;
        self.handle_outcome(&request, outcome);
    }

    fn handle_outcome<T: ApiRequest>(
        &mut self,
        request: &T,
        outcome: std::result::Result<ApiResponse, DeliveryError>,
    ) {
        let failure = match outcome {
            Ok(response) if !response.is_error() => return,
            Ok(response) => {
                warn!("{} rejected with status {}", T::PATH, response.status);
                ApiFailure {
                    status: Some(response.status),
                    body: response.body,
                    request: request.to_api_value(),
                }
            }
            Err(e) => {
                warn!("{} could not be delivered: {}", T::PATH, e);
                ApiFailure {
                    status: None,
                    body: e.to_string(),
                    request: request.to_api_value(),
                }
            }
        };
        self.metrics.delivery_failures += 1;
        self.error_recorder.record(&failure);
    }
}

impl<C: ApiClient, R: ApiErrorRecorder> Sink for ApiSink<C, R> {
    async fn handle_actions(&mut self, actions: Vec<ImportAction>) -> Result<()> {
        for action in actions {
            self.handle_action(action).await?;
        }
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<()> {
        debug!("starting shutdown...");
        self.flush().await;
        info!(
            user_batches = self.metrics.user_batches_sent,
            event_batches = self.metrics.event_batches_sent,
            purchases = self.metrics.purchases_sent,
            failures = self.metrics.delivery_failures,
            "api sink shutdown complete"
        );
        Ok(())
    }
}
