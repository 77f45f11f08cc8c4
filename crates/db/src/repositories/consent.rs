use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::Row;

use cadence_core::collaborators::{CollaboratorError, ConsentStore};
use cadence_core::domain::{ConsentRecord, ContactId, OrganizationId};

use super::RepositoryError;
use crate::DbPool;

pub struct SqlConsentStore {
    pool: DbPool,
}

impl SqlConsentStore {
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

fn row_to_consent(row: &sqlx::sqlite::SqliteRow) -> Result<ConsentRecord, RepositoryError> {
    let contact_id: String = row.try_get("contact_id").map_err(decode_err)?;
    let organization_id: String = row.try_get("organization_id").map_err(decode_err)?;
    let consent_given: bool = row.try_get("consent_given").map_err(decode_err)?;
    let consent_at: Option<String> = row.try_get("consent_at").map_err(decode_err)?;
    let opted_out: bool = row.try_get("opted_out").map_err(decode_err)?;
    let opted_out_at: Option<String> = row.try_get("opted_out_at").map_err(decode_err)?;
    let opt_out_reason: Option<String> = row.try_get("opt_out_reason").map_err(decode_err)?;
    let on_dnc: bool = row.try_get("on_dnc").map_err(decode_err)?;
    let messages_sent_today: i64 = row.try_get("messages_sent_today").map_err(decode_err)?;
    let last_message_date: Option<String> = row.try_get("last_message_date").map_err(decode_err)?;
    let updated_at: String = row.try_get("updated_at").map_err(decode_err)?;

    Ok(ConsentRecord {
        contact_id: ContactId(contact_id),
        organization_id: OrganizationId(organization_id),
        consent_given,
        consent_at: parse_optional_timestamp(consent_at)?,
        opted_out,
        opted_out_at: parse_optional_timestamp(opted_out_at)?,
        opt_out_reason,
        on_dnc,
        messages_sent_today: messages_sent_today.max(0) as u32,
        last_message_date: last_message_date
            .as_deref()
            .map(|value| NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(decode_err))
            .transpose()?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

#[async_trait]
impl ConsentStore for SqlConsentStore {
    async fn get(
        &self,
        contact: &ContactId,
        organization: &OrganizationId,
    ) -> Result<Option<ConsentRecord>, CollaboratorError> {
        let row = sqlx::query(
            "SELECT contact_id, organization_id, consent_given, consent_at, opted_out, \
                    opted_out_at, opt_out_reason, on_dnc, messages_sent_today, \
                    last_message_date, updated_at \
             FROM consent_records \
             WHERE contact_id = ?1 AND organization_id = ?2",
        )
        .bind(&contact.0)
        .bind(&organization.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)
        .map_err(CollaboratorError::from)?;

        row.as_ref()
            .map(row_to_consent)
            .transpose()
            .map_err(CollaboratorError::from)
    }

    async fn upsert(&self, record: ConsentRecord) -> Result<(), CollaboratorError> {
        sqlx::query(
            "INSERT INTO consent_records (contact_id, organization_id, consent_given, \
                    consent_at, opted_out, opted_out_at, opt_out_reason, on_dnc, \
                    messages_sent_today, last_message_date, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11) \
             ON CONFLICT (contact_id, organization_id) DO UPDATE SET \
                    consent_given = excluded.consent_given, \
                    consent_at = excluded.consent_at, \
                    opted_out = excluded.opted_out, \
                    opted_out_at = excluded.opted_out_at, \
                    opt_out_reason = excluded.opt_out_reason, \
                    on_dnc = excluded.on_dnc, \
                    messages_sent_today = excluded.messages_sent_today, \
                    last_message_date = excluded.last_message_date, \
                    updated_at = excluded.updated_at",
        )
        .bind(&record.contact_id.0)
        .bind(&record.organization_id.0)
        .bind(record.consent_given)
        .bind(record.consent_at.map(|at| at.to_rfc3339()))
        .bind(record.opted_out)
        .bind(record.opted_out_at.map(|at| at.to_rfc3339()))
        .bind(&record.opt_out_reason)
        .bind(record.on_dnc)
        .bind(record.messages_sent_today as i64)
        .bind(record.last_message_date.map(|date| date.format("%Y-%m-%d").to_string()))
        .bind(record.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)
        .map_err(CollaboratorError::from)?;

        Ok(())
    }
}
