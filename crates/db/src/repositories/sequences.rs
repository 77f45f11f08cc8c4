use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::Row;
use uuid::Uuid;

use cadence_core::collaborators::{CollaboratorError, DueFollowup, SequenceScheduler};
use cadence_core::domain::{ContactId, OrganizationId};

use super::RepositoryError;
use crate::DbPool;

pub struct SqlSequenceScheduler {
    pool: DbPool,
}

impl SqlSequenceScheduler {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn decode_err(error: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Decode(error.to_string())
}

fn row_to_due(row: &sqlx::sqlite::SqliteRow) -> Result<DueFollowup, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_err)?;
    let contact_id: String = row.try_get("contact_id").map_err(decode_err)?;
    let organization_id: String = row.try_get("organization_id").map_err(decode_err)?;
    let trigger: String = row.try_get("trigger_name").map_err(decode_err)?;
    let channel: String = row.try_get("channel").map_err(decode_err)?;
    let due_at: String = row.try_get("due_at").map_err(decode_err)?;

    Ok(DueFollowup {
        id,
        contact_id: ContactId(contact_id),
        organization_id: OrganizationId(organization_id),
        trigger,
        channel,
        due_at: DateTime::parse_from_rfc3339(&due_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(decode_err)?,
    })
}

#[async_trait]
impl SequenceScheduler for SqlSequenceScheduler {
    async fn schedule(
        &self,
        trigger: &str,
        contact: &ContactId,
        organization: &OrganizationId,
        delay_hours: i64,
        channel: &str,
    ) -> Result<(), CollaboratorError> {
        let now = Utc::now();
        let due_at = now + Duration::hours(delay_hours.max(0));

        sqlx::query(
            "INSERT INTO scheduled_followups \
                     (id, contact_id, organization_id, trigger_name, channel, due_at, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&contact.0)
        .bind(&organization.0)
        .bind(trigger)
        .bind(channel)
        .bind(due_at.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)
        .map_err(CollaboratorError::from)?;

        Ok(())
    }

    async fn due(&self, before: DateTime<Utc>) -> Result<Vec<DueFollowup>, CollaboratorError> {
        let rows = sqlx::query(
            "SELECT id, contact_id, organization_id, trigger_name, channel, due_at \
             FROM scheduled_followups \
             WHERE sent_at IS NULL AND due_at <= ?1 \
             ORDER BY due_at ASC",
        )
        .bind(before.to_rfc3339())
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)
        .map_err(CollaboratorError::from)?;

        rows.iter().map(row_to_due).collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    async fn mark_sent(&self, id: &str, at: DateTime<Utc>) -> Result<(), CollaboratorError> {
        sqlx::query("UPDATE scheduled_followups SET sent_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(at.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)
            .map_err(CollaboratorError::from)?;
        Ok(())
    }

    async fn has_pending(&self, contact: &ContactId) -> Result<bool, CollaboratorError> {
        let count: i64 = sqlx::query(
            "SELECT COUNT(*) AS count FROM scheduled_followups \
             WHERE contact_id = ?1 AND sent_at IS NULL",
        )
        .bind(&contact.0)
        .fetch_one(&self.pool)
        .await
        .map_err(RepositoryError::from)
        .map_err(CollaboratorError::from)?
        .get("count");

        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use cadence_core::collaborators::SequenceScheduler;
    use cadence_core::domain::{ContactId, OrganizationId};

    use crate::connect_with_settings;
    use crate::migrations::run_pending;
    use crate::repositories::SqlSequenceScheduler;

    async fn scheduler() -> SqlSequenceScheduler {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("migrate");
        SqlSequenceScheduler::new(pool)
    }

    fn contact() -> ContactId {
        ContactId("c-1".to_string())
    }

    fn organization() -> OrganizationId {
        OrganizationId("org-1".to_string())
    }

    #[tokio::test]
    async fn scheduled_item_is_pending_until_marked_sent() {
        let scheduler = scheduler().await;

        scheduler
            .schedule("no_response", &contact(), &organization(), 0, "sms")
            .await
            .expect("schedule");
        assert!(scheduler.has_pending(&contact()).await.expect("pending check"));

        let due = scheduler.due(Utc::now() + Duration::minutes(1)).await.expect("due query");
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].trigger, "no_response");
        assert_eq!(due[0].channel, "sms");

        scheduler.mark_sent(&due[0].id, Utc::now()).await.expect("mark sent");
        assert!(!scheduler.has_pending(&contact()).await.expect("pending check"));
        let after = scheduler.due(Utc::now() + Duration::minutes(1)).await.expect("due query");
        assert!(after.is_empty());
    }

    #[tokio::test]
    async fn future_items_are_not_due_yet() {
        let scheduler = scheduler().await;

        scheduler
            .schedule("reengagement", &contact(), &organization(), 48, "sms")
            .await
            .expect("schedule");

        let due = scheduler.due(Utc::now()).await.expect("due query");
        assert!(due.is_empty());
        assert!(scheduler.has_pending(&contact()).await.expect("pending check"));
    }
}
