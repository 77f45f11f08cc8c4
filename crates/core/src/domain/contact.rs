use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContactId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrganizationId(pub String);

/// Flat contact record as read from the CRM of record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactSnapshot {
    pub id: ContactId,
    pub organization_id: OrganizationId,
    pub first_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub stage: Option<String>,
    pub timezone: Option<String>,
    pub lead_score: i32,
    pub created_at: DateTime<Utc>,
    pub first_ai_contact_at: Option<DateTime<Utc>>,
    pub last_activity_at: Option<DateTime<Utc>>,
}

impl ContactSnapshot {
    pub fn has_phone(&self) -> bool {
        self.phone.as_deref().map(|value| !value.trim().is_empty()).unwrap_or(false)
    }

    pub fn has_email(&self) -> bool {
        self.email.as_deref().map(|value| !value.trim().is_empty()).unwrap_or(false)
    }

    /// A contact we can reach on at least one channel.
    pub fn is_reachable(&self) -> bool {
        self.has_phone() || self.has_email()
    }
}
