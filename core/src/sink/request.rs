use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::model::{CustomEvent, Purchase, UserProfile};

/// A request body for one of the remote API endpoints.
pub trait ApiRequest: Serialize {
    /// Endpoint path relative to the API base URL.
    const PATH: &'static str;

    fn to_api_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            warn!("Failed to serialize request for {}: {}", Self::PATH, e);
            Value::Null
        })
    }
}

/// Body of the bulk user update endpoint: `{"users": [...]}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkUserUpdateRequest {
    pub users: Vec<UserProfile>,
}

impl BulkUserUpdateRequest {
    pub fn new(users: Vec<UserProfile>) -> Self {
        Self { users }
    }
}

impl ApiRequest for BulkUserUpdateRequest {
    const PATH: &'static str = "users/bulkUpdate";
}

/// Body of the bulk event tracking endpoint: `{"events": [...]}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkTrackEventRequest {
    pub events: Vec<CustomEvent>,
}

impl BulkTrackEventRequest {
    /// Events without a timestamp are stamped with the current time here, so
    /// the body sent and the body recorded on failure agree.
    pub fn new(mut events: Vec<CustomEvent>) -> Self {
        let now = Utc::now();
        for event in &mut events {
            event.created_at.get_or_insert(now);
        }
        Self { events }
    }
}

impl ApiRequest for BulkTrackEventRequest {
    const PATH: &'static str = "events/trackBulk";
}

/// Body of the single purchase endpoint. The purchase is the whole body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TrackPurchaseRequest {
    pub purchase: Purchase,
}

impl TrackPurchaseRequest {
    pub fn new(mut purchase: Purchase) -> Self {
        purchase.created_at.get_or_insert_with(Utc::now);
        Self { purchase }
    }
}

impl ApiRequest for TrackPurchaseRequest {
    const PATH: &'static str = "commerce/trackPurchase";
}
