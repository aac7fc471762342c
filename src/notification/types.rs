use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::feature_flags::FlagScope;
use crate::template::EventTypeDescriptor;

/// An inbound notifiable event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Top-level namespace (e.g., "openshift", "rhel")
    pub bundle: String,
    /// Application within the bundle (e.g., "cost-management")
    pub application: String,
    /// Kind of event (e.g., "missing-cost-model")
    pub event_type: String,
    /// When the event was emitted
    pub timestamp: DateTime<Utc>,
    /// Legacy account number (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    /// Tenant organization (optional). Selects per-tenant feature flags.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,
    /// Arbitrary event-wide context data
    #[serde(default)]
    pub context: Map<String, Value>,
    /// Individual items affected by the event
    #[serde(default)]
    pub events: Vec<Event>,
    /// Who should receive the notification
    #[serde(default)]
    pub recipients: Vec<Recipient>,
}

/// One affected item within an action
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub payload: Map<String, Value>,
}

impl Event {
    /// Create an event from a JSON payload object. Non-object payloads are ignored.
    pub fn with_payload(payload: Value) -> Self {
        Self {
            metadata: Map::new(),
            payload: match payload {
                Value::Object(map) => map,
                _ => Map::new(),
            },
        }
    }
}

/// Recipient selection for an action
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recipient {
    /// Only notify organization administrators
    #[serde(default)]
    pub only_admins: bool,
    /// Notify even users who opted out
    #[serde(default)]
    pub ignore_user_preferences: bool,
    /// Explicit usernames
    #[serde(default)]
    pub users: Vec<String>,
}

impl Action {
    /// Create a builder for an action
    pub fn builder(
        bundle: impl Into<String>,
        application: impl Into<String>,
        event_type: impl Into<String>,
    ) -> ActionBuilder {
        ActionBuilder::new(bundle, application, event_type)
    }

    /// The (bundle, application, event type) triple of this action
    pub fn descriptor(&self) -> EventTypeDescriptor {
        EventTypeDescriptor::new(&self.bundle, &self.application, &self.event_type)
    }

    /// Feature-flag scope: the tenant when `org_id` is set, otherwise global
    pub fn flag_scope(&self) -> FlagScope {
        match self.org_id.as_deref() {
            Some(org_id) if !org_id.is_empty() => FlagScope::Tenant(org_id.to_string()),
            _ => FlagScope::Global,
        }
    }

    /// JSON tree exposed to templates as `action`
    pub fn to_template_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}

/// Builder for creating actions
#[derive(Debug, Clone)]
pub struct ActionBuilder {
    action: Action,
}

impl ActionBuilder {
    pub fn new(
        bundle: impl Into<String>,
        application: impl Into<String>,
        event_type: impl Into<String>,
    ) -> Self {
        Self {
            action: Action {
                bundle: bundle.into(),
                application: application.into(),
                event_type: event_type.into(),
                timestamp: Utc::now(),
                account_id: None,
                org_id: None,
                context: Map::new(),
                events: Vec::new(),
                recipients: Vec::new(),
            },
        }
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.action.timestamp = timestamp;
        self
    }

    pub fn account_id(mut self, account_id: impl Into<String>) -> Self {
        self.action.account_id = Some(account_id.into());
        self
    }

    pub fn org_id(mut self, org_id: impl Into<String>) -> Self {
        self.action.org_id = Some(org_id.into());
        self
    }

    /// Add a context entry
    pub fn context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.action.context.insert(key.into(), value.into());
        self
    }

    pub fn event(mut self, event: Event) -> Self {
        self.action.events.push(event);
        self
    }

    pub fn recipient(mut self, recipient: Recipient) -> Self {
        self.action.recipients.push(recipient);
        self
    }

    pub fn build(self) -> Action {
        self.action
    }
}
