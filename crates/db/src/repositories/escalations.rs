use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use cadence_core::collaborators::{CollaboratorError, EscalationDesk};
use cadence_core::domain::{ContactId, OrganizationId};

use super::RepositoryError;
use crate::DbPool;

pub struct SqlEscalationDesk {
    pool: DbPool,
}

impl SqlEscalationDesk {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EscalationDesk for SqlEscalationDesk {
    async fn create_task(
        &self,
        contact: &ContactId,
        organization: &OrganizationId,
        title: &str,
        due_at: DateTime<Utc>,
    ) -> Result<(), CollaboratorError> {
        sqlx::query(
            "INSERT INTO escalation_tasks (id, contact_id, organization_id, title, due_at, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&contact.0)
        .bind(&organization.0)
        .bind(title)
        .bind(due_at.to_rfc3339())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)
        .map_err(CollaboratorError::from)?;

        Ok(())
    }
}
