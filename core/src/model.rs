//! Import actions and the payloads they carry.
//!
//! Payloads serialize field-for-field to the bodies expected by the remote
//! user, event and commerce endpoints.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

/// Open mapping of custom fields attached to a user, event, purchase or item.
pub type DataFields = Map<String, Value>;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub data_fields: DataFields,
}

impl UserProfile {
    pub fn new(email: Option<String>, user_id: Option<String>, data_fields: DataFields) -> Self {
        Self {
            email,
            user_id,
            data_fields,
        }
    }

    pub fn with_email(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            ..Default::default()
        }
    }

    pub fn with_user_id(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Default::default()
        }
    }

    pub fn data_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data_fields.insert(key.into(), value.into());
        self
    }

    pub fn has_identity(&self) -> bool {
        has_identity(&self.email, &self.user_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomEvent {
    pub event_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Unset timestamps are sent as the time of serialization.
    #[serde(serialize_with = "unix_seconds_or_now")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub data_fields: DataFields,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_id: Option<i64>,
}

impl CustomEvent {
    pub fn new(event_name: impl Into<String>) -> Self {
        Self {
            event_name: event_name.into(),
            email: None,
            user_id: None,
            id: None,
            created_at: None,
            data_fields: DataFields::new(),
            campaign_id: None,
            template_id: None,
        }
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn data_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data_fields.insert(key.into(), value.into());
        self
    }

    pub fn has_identity(&self) -> bool {
        has_identity(&self.email, &self.user_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommerceItem {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    pub price: f64,
    pub quantity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub data_fields: DataFields,
}

impl CommerceItem {
    pub fn new(id: impl Into<String>, name: impl Into<String>, price: f64, quantity: u32) -> Self {
        Self {
            id: id.into(),
            sku: None,
            name: name.into(),
            description: None,
            categories: Vec::new(),
            price,
            quantity,
            image_url: None,
            url: None,
            data_fields: DataFields::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    pub user: UserProfile,
    pub items: Vec<CommerceItem>,
    pub total: f64,
    #[serde(serialize_with = "unix_seconds_or_now")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub data_fields: DataFields,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl Purchase {
    pub fn new(user: UserProfile, items: Vec<CommerceItem>, total: f64) -> Self {
        Self {
            user,
            items,
            total,
            created_at: None,
            data_fields: DataFields::new(),
            campaign_id: None,
            template_id: None,
            id: None,
        }
    }

    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }
}

/// A unit of work destined for the remote system.
#[derive(Debug, Clone, PartialEq)]
pub enum ImportAction {
    UpdateUserProfile { profile: UserProfile },
    TrackCustomEvent { event: CustomEvent },
    TrackPurchase { purchase: Purchase },
}

impl ImportAction {
    pub fn update_user(profile: UserProfile) -> Self {
        ImportAction::UpdateUserProfile { profile }
    }

    pub fn track_event(event: CustomEvent) -> Self {
        ImportAction::TrackCustomEvent { event }
    }

    pub fn track_purchase(purchase: Purchase) -> Self {
        ImportAction::TrackPurchase { purchase }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ImportAction::UpdateUserProfile { .. } => "update_user_profile",
            ImportAction::TrackCustomEvent { .. } => "track_custom_event",
            ImportAction::TrackPurchase { .. } => "track_purchase",
        }
    }

    /// Whether the action names the user it applies to by email or user id.
    pub fn has_identity(&self) -> bool {
        match self {
            ImportAction::UpdateUserProfile { profile } => profile.has_identity(),
            ImportAction::TrackCustomEvent { event } => event.has_identity(),
            ImportAction::TrackPurchase { purchase } => purchase.user.has_identity(),
        }
    }
}

/// Normalizes whatever a map function returns into a list of actions.
pub trait IntoImportActions {
    fn into_import_actions(self) -> Vec<ImportAction>;
}

impl IntoImportActions for ImportAction {
    fn into_import_actions(self) -> Vec<ImportAction> {
        vec![self]
    }
}

impl IntoImportActions for Vec<ImportAction> {
    fn into_import_actions(self) -> Vec<ImportAction> {
        self
    }
}

impl<T: IntoImportActions> IntoImportActions for Option<T> {
    fn into_import_actions(self) -> Vec<ImportAction> {
        self.map(IntoImportActions::into_import_actions)
            .unwrap_or_default()
    }
}

impl IntoImportActions for () {
    fn into_import_actions(self) -> Vec<ImportAction> {
        Vec::new()
    }
}

fn has_identity(email: &Option<String>, user_id: &Option<String>) -> bool {
    let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
    present(email) || present(user_id)
}

fn unix_seconds_or_now<S>(created_at: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let timestamp = created_at.unwrap_or_else(Utc::now);
    serializer.serialize_i64(timestamp.timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_user_profile_serializes_documented_fields() {
        let profile = UserProfile::new(
            Some("a@x.com".to_string()),
            Some("1".to_string()),
            json!({"ltv": 5}).as_object().cloned().unwrap(),
        );

        let value = serde_json::to_value(&profile).unwrap();
        assert_eq!(
            value,
            json!({"email": "a@x.com", "userId": "1", "dataFields": {"ltv": 5}})
        );
    }

    #[test]
    fn test_user_profile_omits_absent_fields() {
        let value = serde_json::to_value(UserProfile::with_email("test@iterable.com")).unwrap();
        assert_eq!(value, json!({"email": "test@iterable.com"}));
    }

    #[test]
    fn test_event_created_at_defaults_to_now() {
        let before = Utc::now().timestamp();
        let event = CustomEvent::new("test event").email("test@iterable.com");
        let value = serde_json::to_value(&event).unwrap();
        let after = Utc::now().timestamp();

        let created_at = value["createdAt"].as_i64().unwrap();
        assert!(created_at >= before && created_at <= after);
        assert_eq!(value["eventName"], "test event");
        assert!(value.get("userId").is_none());
    }

    #[test]
    fn test_purchase_serializes_nested_items() {
        let created_at = Utc.with_ymd_and_hms(2021, 3, 1, 12, 0, 0).unwrap();
        let purchase = Purchase::new(
            UserProfile::with_email("test@iterable.com"),
            vec![CommerceItem::new("1", "shoes", 99.0, 1)],
            99.0,
        )
        .created_at(created_at);

        let value = serde_json::to_value(&purchase).unwrap();
        assert_eq!(
            value,
            json!({
                "user": {"email": "test@iterable.com"},
                "items": [{"id": "1", "name": "shoes", "price": 99.0, "quantity": 1}],
                "total": 99.0,
                "createdAt": created_at.timestamp(),
            })
        );
    }

    #[test]
    fn test_into_import_actions_normalization() {
        let action = ImportAction::update_user(UserProfile::with_email("test@iterable.com"));

        assert_eq!(action.clone().into_import_actions(), vec![action.clone()]);
        assert_eq!(Some(action.clone()).into_import_actions(), vec![action.clone()]);
        assert!(None::<ImportAction>.into_import_actions().is_empty());
        assert!(().into_import_actions().is_empty());
        assert_eq!(
            Some(vec![action.clone(), action.clone()]).into_import_actions().len(),
            2
        );
    }

    #[test]
    fn test_identity_requires_email_or_user_id() {
        assert!(UserProfile::with_user_id("42").has_identity());
        assert!(!UserProfile::default().has_identity());
        assert!(!UserProfile::with_email("").has_identity());

        let anonymous_purchase = ImportAction::track_purchase(Purchase::new(
            UserProfile::default(),
            vec![],
            0.0,
        ));
        assert!(!anonymous_purchase.has_identity());
        assert_eq!(anonymous_purchase.kind(), "track_purchase");
    }
}
