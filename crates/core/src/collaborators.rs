//! Contracts for the external systems this engine drives: consent storage,
//! the CRM of record, the follow-up sequencer, the delivery channel, and the
//! human escalation queue. The engine decides; collaborators act.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{ConsentRecord, ContactId, ContactSnapshot, ConversationRecord, OrganizationId};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("backing store failure: {0}")]
    Store(String),
    #[error("decode failure: {0}")]
    Decode(String),
}

#[async_trait]
pub trait ConsentStore: Send + Sync {
    async fn get(
        &self,
        contact: &ContactId,
        organization: &OrganizationId,
    ) -> Result<Option<ConsentRecord>, CollaboratorError>;

    async fn upsert(&self, record: ConsentRecord) -> Result<(), CollaboratorError>;
}

#[async_trait]
pub trait ContactDirectory: Send + Sync {
    async fn contact(&self, id: &ContactId) -> Result<Option<ContactSnapshot>, CollaboratorError>;

    async fn new_contacts(
        &self,
        organization: Option<&OrganizationId>,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ContactSnapshot>, CollaboratorError>;

    async fn dormant_contacts(
        &self,
        organization: Option<&OrganizationId>,
        inactive_before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ContactSnapshot>, CollaboratorError>;

    async fn conversations(
        &self,
        organization: Option<&OrganizationId>,
        limit: usize,
    ) -> Result<Vec<ConversationRecord>, CollaboratorError>;

    /// Conversations sitting in `handed_off` whose last update predates
    /// `stale_before`.
    async fn handoffs(
        &self,
        organization: Option<&OrganizationId>,
        stale_before: DateTime<Utc>,
    ) -> Result<Vec<ConversationRecord>, CollaboratorError>;

    async fn mark_first_contact(
        &self,
        id: &ContactId,
        at: DateTime<Utc>,
    ) -> Result<(), CollaboratorError>;
}

/// A follow-up already scheduled by the sequencer whose due time has passed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DueFollowup {
    pub id: String,
    pub contact_id: ContactId,
    pub organization_id: OrganizationId,
    pub trigger: String,
    pub channel: String,
    pub due_at: DateTime<Utc>,
}

#[async_trait]
pub trait SequenceScheduler: Send + Sync {
    async fn schedule(
        &self,
        trigger: &str,
        contact: &ContactId,
        organization: &OrganizationId,
        delay_hours: i64,
        channel: &str,
    ) -> Result<(), CollaboratorError>;

    async fn due(&self, before: DateTime<Utc>) -> Result<Vec<DueFollowup>, CollaboratorError>;

    async fn mark_sent(&self, id: &str, at: DateTime<Utc>) -> Result<(), CollaboratorError>;

    async fn has_pending(&self, contact: &ContactId) -> Result<bool, CollaboratorError>;
}

/// Structured hand-off to the message generator + transport. This engine
/// never authors message text; it passes the trigger and enough context for
/// the collaborator to do so.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SendInstruction {
    pub trigger: String,
    pub channel: String,
    pub context: BTreeMap<String, serde_json::Value>,
}

/// Delivery outcome. Failures arrive as data, not errors; the error string is
/// classified only against the systemic-outage signatures.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub delivered: bool,
    pub error: Option<String>,
}

impl DeliveryReceipt {
    pub fn ok() -> Self {
        Self { delivered: true, error: None }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self { delivered: false, error: Some(error.into()) }
    }
}

#[async_trait]
pub trait MessageDelivery: Send + Sync {
    async fn send(&self, contact: &ContactId, instruction: SendInstruction) -> DeliveryReceipt;
}

#[async_trait]
pub trait EscalationDesk: Send + Sync {
    async fn create_task(
        &self,
        contact: &ContactId,
        organization: &OrganizationId,
        title: &str,
        due_at: DateTime<Utc>,
    ) -> Result<(), CollaboratorError>;
}
