use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;

use cadence_core::collaborators::{CollaboratorError, ContactDirectory};
use cadence_core::domain::{
    ContactId, ContactSnapshot, ConversationRecord, ConversationState, OrganizationId,
};
use cadence_core::objections::ObjectionCategory;

use super::RepositoryError;
use crate::DbPool;

pub struct SqlContactDirectory {
    pool: DbPool,
}

impl SqlContactDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn decode_err(error: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Decode(error.to_string())
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value).map(|dt| dt.with_timezone(&Utc)).map_err(decode_err)
}

fn parse_optional_timestamp(
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    value.as_deref().map(parse_timestamp).transpose()
}

fn row_to_contact(row: &sqlx::sqlite::SqliteRow) -> Result<ContactSnapshot, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_err)?;
    let organization_id: String = row.try_get("organization_id").map_err(decode_err)?;
    let first_name: Option<String> = row.try_get("first_name").map_err(decode_err)?;
    let phone: Option<String> = row.try_get("phone").map_err(decode_err)?;
    let email: Option<String> = row.try_get("email").map_err(decode_err)?;
    let stage: Option<String> = row.try_get("stage").map_err(decode_err)?;
    let timezone: Option<String> = row.try_get("timezone").map_err(decode_err)?;
    let lead_score: i64 = row.try_get("lead_score").map_err(decode_err)?;
    let created_at: String = row.try_get("created_at").map_err(decode_err)?;
    let first_ai_contact_at: Option<String> =
        row.try_get("first_ai_contact_at").map_err(decode_err)?;
    let last_activity_at: Option<String> = row.try_get("last_activity_at").map_err(decode_err)?;

    Ok(ContactSnapshot {
        id: ContactId(id),
        organization_id: OrganizationId(organization_id),
        first_name,
        phone,
        email,
        stage,
        timezone,
        lead_score: lead_score as i32,
        created_at: parse_timestamp(&created_at)?,
        first_ai_contact_at: parse_optional_timestamp(first_ai_contact_at)?,
        last_activity_at: parse_optional_timestamp(last_activity_at)?,
    })
}

fn row_to_conversation(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<ConversationRecord, RepositoryError> {
    let contact_id: String = row.try_get("contact_id").map_err(decode_err)?;
    let organization_id: String = row.try_get("organization_id").map_err(decode_err)?;
    let state: String = row.try_get("state").map_err(decode_err)?;
    let last_ai_message_at: Option<String> =
        row.try_get("last_ai_message_at").map_err(decode_err)?;
    let last_human_message_at: Option<String> =
        row.try_get("last_human_message_at").map_err(decode_err)?;
    let last_inbound_at: Option<String> = row.try_get("last_inbound_at").map_err(decode_err)?;
    let lead_score: i64 = row.try_get("lead_score").map_err(decode_err)?;
    let qualification: String = row.try_get("qualification").map_err(decode_err)?;
    let objections_raised: String = row.try_get("objections_raised").map_err(decode_err)?;
    let active: bool = row.try_get("active").map_err(decode_err)?;
    let updated_at: String = row.try_get("updated_at").map_err(decode_err)?;

    let state: ConversationState = state.parse().map_err(decode_err)?;
    let qualification: BTreeMap<String, String> =
        serde_json::from_str(&qualification).map_err(decode_err)?;
    let objections_raised: Vec<ObjectionCategory> =
        serde_json::from_str(&objections_raised).map_err(decode_err)?;

    Ok(ConversationRecord {
        contact_id: ContactId(contact_id),
        organization_id: OrganizationId(organization_id),
        state,
        last_ai_message_at: parse_optional_timestamp(last_ai_message_at)?,
        last_human_message_at: parse_optional_timestamp(last_human_message_at)?,
        last_inbound_at: parse_optional_timestamp(last_inbound_at)?,
        lead_score: lead_score as i32,
        qualification,
        objections_raised,
        active,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

const CONTACT_COLUMNS: &str = "id, organization_id, first_name, phone, email, stage, timezone, \
                               lead_score, created_at, first_ai_contact_at, last_activity_at";

const CONVERSATION_COLUMNS: &str = "contact_id, organization_id, state, last_ai_message_at, \
                                    last_human_message_at, last_inbound_at, lead_score, \
                                    qualification, objections_raised, active, updated_at";

#[async_trait]
impl ContactDirectory for SqlContactDirectory {
    async fn contact(&self, id: &ContactId) -> Result<Option<ContactSnapshot>, CollaboratorError> {
        let row = sqlx::query(&format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = ?1"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)
            .map_err(CollaboratorError::from)?;

        row.as_ref().map(row_to_contact).transpose().map_err(CollaboratorError::from)
    }

    async fn new_contacts(
        &self,
        organization: Option<&OrganizationId>,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ContactSnapshot>, CollaboratorError> {
        let rows = match organization {
            Some(organization) => {
                sqlx::query(&format!(
                    "SELECT {CONTACT_COLUMNS} FROM contacts \
                     WHERE organization_id = ?1 AND created_at >= ?2 \
                     ORDER BY created_at DESC LIMIT ?3"
                ))
                .bind(&organization.0)
                .bind(since.to_rfc3339())
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {CONTACT_COLUMNS} FROM contacts \
                     WHERE created_at >= ?1 \
                     ORDER BY created_at DESC LIMIT ?2"
                ))
                .bind(since.to_rfc3339())
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(RepositoryError::from)
        .map_err(CollaboratorError::from)?;

        rows.iter().map(row_to_contact).collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    async fn dormant_contacts(
        &self,
        organization: Option<&OrganizationId>,
        inactive_before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ContactSnapshot>, CollaboratorError> {
        let rows = match organization {
            Some(organization) => {
                sqlx::query(&format!(
                    "SELECT {CONTACT_COLUMNS} FROM contacts \
                     WHERE organization_id = ?1 \
                       AND COALESCE(last_activity_at, created_at) <= ?2 \
                     ORDER BY COALESCE(last_activity_at, created_at) ASC LIMIT ?3"
                ))
                .bind(&organization.0)
                .bind(inactive_before.to_rfc3339())
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {CONTACT_COLUMNS} FROM contacts \
                     WHERE COALESCE(last_activity_at, created_at) <= ?1 \
                     ORDER BY COALESCE(last_activity_at, created_at) ASC LIMIT ?2"
                ))
                .bind(inactive_before.to_rfc3339())
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(RepositoryError::from)
        .map_err(CollaboratorError::from)?;

        rows.iter().map(row_to_contact).collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    async fn conversations(
        &self,
        organization: Option<&OrganizationId>,
        limit: usize,
    ) -> Result<Vec<ConversationRecord>, CollaboratorError> {
        let rows = match organization {
            Some(organization) => {
                sqlx::query(&format!(
                    "SELECT {CONVERSATION_COLUMNS} FROM conversations \
                     WHERE organization_id = ?1 AND active = 1 \
                     ORDER BY updated_at ASC LIMIT ?2"
                ))
                .bind(&organization.0)
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {CONVERSATION_COLUMNS} FROM conversations \
                     WHERE active = 1 ORDER BY updated_at ASC LIMIT ?1"
                ))
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(RepositoryError::from)
        .map_err(CollaboratorError::from)?;

        rows.iter().map(row_to_conversation).collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    async fn handoffs(
        &self,
        organization: Option<&OrganizationId>,
        stale_before: DateTime<Utc>,
    ) -> Result<Vec<ConversationRecord>, CollaboratorError> {
        let rows = match organization {
            Some(organization) => {
                sqlx::query(&format!(
                    "SELECT {CONVERSATION_COLUMNS} FROM conversations \
                     WHERE organization_id = ?1 AND state = 'handed_off' AND updated_at <= ?2 \
                     ORDER BY updated_at ASC"
                ))
                .bind(&organization.0)
                .bind(stale_before.to_rfc3339())
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {CONVERSATION_COLUMNS} FROM conversations \
                     WHERE state = 'handed_off' AND updated_at <= ?1 \
                     ORDER BY updated_at ASC"
                ))
                .bind(stale_before.to_rfc3339())
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(RepositoryError::from)
        .map_err(CollaboratorError::from)?;

        rows.iter().map(row_to_conversation).collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    async fn mark_first_contact(
        &self,
        id: &ContactId,
        at: DateTime<Utc>,
    ) -> Result<(), CollaboratorError> {
        sqlx::query("UPDATE contacts SET first_ai_contact_at = ?2 WHERE id = ?1")
            .bind(&id.0)
            .bind(at.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)
            .map_err(CollaboratorError::from)?;
        Ok(())
    }
}
