//! In-memory collaborator implementations for tests and database-less
//! wiring. Behavior mirrors the Sql implementations over simple maps.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use cadence_core::collaborators::{
    CollaboratorError, ConsentStore, ContactDirectory, DeliveryReceipt, DueFollowup,
    EscalationDesk, MessageDelivery, SendInstruction, SequenceScheduler,
};
use cadence_core::domain::{
    ConsentRecord, ContactId, ContactSnapshot, ConversationRecord, ConversationState,
    OrganizationId,
};

#[derive(Default)]
pub struct InMemoryConsentStore {
    records: RwLock<HashMap<(String, String), ConsentRecord>>,
}

#[async_trait]
impl ConsentStore for InMemoryConsentStore {
    async fn get(
        &self,
        contact: &ContactId,
        organization: &OrganizationId,
    ) -> Result<Option<ConsentRecord>, CollaboratorError> {
        let records = self.records.read().await;
        Ok(records.get(&(contact.0.clone(), organization.0.clone())).cloned())
    }

    async fn upsert(&self, record: ConsentRecord) -> Result<(), CollaboratorError> {
        let mut records = self.records.write().await;
        records.insert((record.contact_id.0.clone(), record.organization_id.0.clone()), record);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryContactDirectory {
    contacts: RwLock<HashMap<String, ContactSnapshot>>,
    conversations: RwLock<HashMap<String, ConversationRecord>>,
}

impl InMemoryContactDirectory {
    pub async fn put_contact(&self, contact: ContactSnapshot) {
        self.contacts.write().await.insert(contact.id.0.clone(), contact);
    }

    pub async fn put_conversation(&self, conversation: ConversationRecord) {
        self.conversations
            .write()
            .await
            .insert(conversation.contact_id.0.clone(), conversation);
    }
}

fn in_organization(record_org: &OrganizationId, filter: Option<&OrganizationId>) -> bool {
    filter.map(|org| org == record_org).unwrap_or(true)
}

#[async_trait]
impl ContactDirectory for InMemoryContactDirectory {
    async fn contact(&self, id: &ContactId) -> Result<Option<ContactSnapshot>, CollaboratorError> {
        Ok(self.contacts.read().await.get(&id.0).cloned())
    }

    async fn new_contacts(
        &self,
        organization: Option<&OrganizationId>,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ContactSnapshot>, CollaboratorError> {
        let contacts = self.contacts.read().await;
        let mut found: Vec<ContactSnapshot> = contacts
            .values()
            .filter(|contact| in_organization(&contact.organization_id, organization))
            .filter(|contact| contact.created_at >= since)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        found.truncate(limit);
        Ok(found)
    }

    async fn dormant_contacts(
        &self,
        organization: Option<&OrganizationId>,
        inactive_before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ContactSnapshot>, CollaboratorError> {
        let contacts = self.contacts.read().await;
        let mut found: Vec<ContactSnapshot> = contacts
            .values()
            .filter(|contact| in_organization(&contact.organization_id, organization))
            .filter(|contact| {
                contact.last_activity_at.unwrap_or(contact.created_at) <= inactive_before
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| {
            a.last_activity_at
                .unwrap_or(a.created_at)
                .cmp(&b.last_activity_at.unwrap_or(b.created_at))
        });
        found.truncate(limit);
        Ok(found)
    }

    async fn conversations(
        &self,
        organization: Option<&OrganizationId>,
        limit: usize,
    ) -> Result<Vec<ConversationRecord>, CollaboratorError> {
        let conversations = self.conversations.read().await;
        let mut found: Vec<ConversationRecord> = conversations
            .values()
            .filter(|conversation| in_organization(&conversation.organization_id, organization))
            .filter(|conversation| conversation.active)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.updated_at.cmp(&b.updated_at));
        found.truncate(limit);
        Ok(found)
    }

    async fn handoffs(
        &self,
        organization: Option<&OrganizationId>,
        stale_before: DateTime<Utc>,
    ) -> Result<Vec<ConversationRecord>, CollaboratorError> {
        let conversations = self.conversations.read().await;
        let mut found: Vec<ConversationRecord> = conversations
            .values()
            .filter(|conversation| in_organization(&conversation.organization_id, organization))
            .filter(|conversation| conversation.state == ConversationState::HandedOff)
            .filter(|conversation| conversation.updated_at <= stale_before)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.updated_at.cmp(&b.updated_at));
        Ok(found)
    }

    async fn mark_first_contact(
        &self,
        id: &ContactId,
        at: DateTime<Utc>,
    ) -> Result<(), CollaboratorError> {
        let mut contacts = self.contacts.write().await;
        if let Some(contact) = contacts.get_mut(&id.0) {
            contact.first_ai_contact_at = Some(at);
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredFollowup {
    pub id: String,
    pub contact_id: ContactId,
    pub organization_id: OrganizationId,
    pub trigger: String,
    pub channel: String,
    pub due_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
pub struct InMemorySequenceScheduler {
    followups: RwLock<Vec<StoredFollowup>>,
}

impl InMemorySequenceScheduler {
    pub async fn followups(&self) -> Vec<StoredFollowup> {
        self.followups.read().await.clone()
    }
}

#[async_trait]
impl SequenceScheduler for InMemorySequenceScheduler {
    async fn schedule(
        &self,
        trigger: &str,
        contact: &ContactId,
        organization: &OrganizationId,
        delay_hours: i64,
        channel: &str,
    ) -> Result<(), CollaboratorError> {
        let now = Utc::now();
        self.followups.write().await.push(StoredFollowup {
            id: Uuid::new_v4().to_string(),
            contact_id: contact.clone(),
            organization_id: organization.clone(),
            trigger: trigger.to_string(),
            channel: channel.to_string(),
            due_at: now + Duration::hours(delay_hours.max(0)),
            sent_at: None,
        });
        Ok(())
    }

    async fn due(&self, before: DateTime<Utc>) -> Result<Vec<DueFollowup>, CollaboratorError> {
        let followups = self.followups.read().await;
        let mut due: Vec<DueFollowup> = followups
            .iter()
            .filter(|item| item.sent_at.is_none() && item.due_at <= before)
            .map(|item| DueFollowup {
                id: item.id.clone(),
                contact_id: item.contact_id.clone(),
                organization_id: item.organization_id.clone(),
                trigger: item.trigger.clone(),
                channel: item.channel.clone(),
                due_at: item.due_at,
            })
            .collect();
        due.sort_by(|a, b| a.due_at.cmp(&b.due_at));
        Ok(due)
    }

    async fn mark_sent(&self, id: &str, at: DateTime<Utc>) -> Result<(), CollaboratorError> {
        let mut followups = self.followups.write().await;
        if let Some(item) = followups.iter_mut().find(|item| item.id == id) {
            item.sent_at = Some(at);
        }
        Ok(())
    }

    async fn has_pending(&self, contact: &ContactId) -> Result<bool, CollaboratorError> {
        let followups = self.followups.read().await;
        Ok(followups.iter().any(|item| item.contact_id == *contact && item.sent_at.is_none()))
    }
}

#[derive(Default)]
pub struct InMemoryEscalationDesk {
    tasks: RwLock<Vec<(ContactId, OrganizationId, String, DateTime<Utc>)>>,
}

impl InMemoryEscalationDesk {
    pub async fn tasks(&self) -> Vec<(ContactId, OrganizationId, String, DateTime<Utc>)> {
        self.tasks.read().await.clone()
    }
}

#[async_trait]
impl EscalationDesk for InMemoryEscalationDesk {
    async fn create_task(
        &self,
        contact: &ContactId,
        organization: &OrganizationId,
        title: &str,
        due_at: DateTime<Utc>,
    ) -> Result<(), CollaboratorError> {
        self.tasks.write().await.push((
            contact.clone(),
            organization.clone(),
            title.to_string(),
            due_at,
        ));
        Ok(())
    }
}

/// Delivery double with scriptable per-contact failures, used to exercise
/// the executor's circuit breaker.
#[derive(Default)]
pub struct InMemoryMessageDelivery {
    failures: RwLock<HashMap<String, String>>,
    sent: RwLock<Vec<(ContactId, SendInstruction)>>,
}

impl InMemoryMessageDelivery {
    pub async fn fail_contact(&self, contact: &ContactId, error: impl Into<String>) {
        self.failures.write().await.insert(contact.0.clone(), error.into());
    }

    pub async fn sent(&self) -> Vec<(ContactId, SendInstruction)> {
        self.sent.read().await.clone()
    }
}

#[async_trait]
impl MessageDelivery for InMemoryMessageDelivery {
    async fn send(&self, contact: &ContactId, instruction: SendInstruction) -> DeliveryReceipt {
        if let Some(error) = self.failures.read().await.get(&contact.0) {
            return DeliveryReceipt::failed(error.clone());
        }
        self.sent.write().await.push((contact.clone(), instruction));
        DeliveryReceipt::ok()
    }
}
