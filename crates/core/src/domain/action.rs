use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::contact::{ContactId, OrganizationId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    FirstContactSms,
    FirstContactEmail,
    FollowupSms,
    FollowupDue,
    ReengagementSms,
    ReengagementEmail,
    HumanTask,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FirstContactSms => "first_contact_sms",
            Self::FirstContactEmail => "first_contact_email",
            Self::FollowupSms => "followup_sms",
            Self::FollowupDue => "followup_due",
            Self::ReengagementSms => "reengagement_sms",
            Self::ReengagementEmail => "reengagement_email",
            Self::HumanTask => "human_task",
        }
    }

    /// The action class gated by the run-scoped delivery circuit breaker.
    pub fn is_followup(&self) -> bool {
        matches!(self, Self::FollowupSms | Self::FollowupDue)
    }

    /// Actions that go out over SMS and therefore need a fresh time-window
    /// check at execution time.
    pub fn is_sms(&self) -> bool {
        matches!(
            self,
            Self::FirstContactSms | Self::FollowupSms | Self::FollowupDue | Self::ReengagementSms
        )
    }
}

/// One ranked recommendation out of a scan. Created at scan time, consumed
/// once by the executor or serialized to the caller, never mutated after
/// creation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecommendedAction {
    pub contact_id: ContactId,
    pub organization_id: OrganizationId,
    pub action_type: ActionType,
    pub priority: i32,
    pub reason: String,
    pub execute_at: Option<DateTime<Utc>>,
    /// Everything a downstream message generator needs, so it never has to
    /// re-query conversation history.
    pub context: BTreeMap<String, serde_json::Value>,
}

impl RecommendedAction {
    pub fn new(
        contact_id: ContactId,
        organization_id: OrganizationId,
        action_type: ActionType,
        priority: i32,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            contact_id,
            organization_id,
            action_type,
            priority,
            reason: reason.into(),
            execute_at: None,
            context: BTreeMap::new(),
        }
    }

    pub fn with_execute_at(mut self, at: DateTime<Utc>) -> Self {
        self.execute_at = Some(at);
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    pub fn context_str(&self, key: &str) -> Option<&str> {
        self.context.get(key).and_then(|value| value.as_str())
    }
}
