use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use cadence_core::compliance::ComplianceGate;
use cadence_core::config::{AppConfig, ConfigError, LoadOptions};
use cadence_core::executor::ActionExecutor;
use cadence_core::scanner::PriorityScanner;
use cadence_db::{
    connect_with_settings, migrations, DbPool, SqlConsentStore, SqlContactDirectory,
    SqlEscalationDesk, SqlSequenceScheduler,
};

use crate::delivery::NoopDelivery;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub executor: Arc<ActionExecutor>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting runner bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let consent = Arc::new(SqlConsentStore::new(db_pool.clone()));
    let directory = Arc::new(SqlContactDirectory::new(db_pool.clone()));
    let sequences = Arc::new(SqlSequenceScheduler::new(db_pool.clone()));
    let escalations = Arc::new(SqlEscalationDesk::new(db_pool.clone()));

    let gate = Arc::new(ComplianceGate::new(consent, config.compliance.clone()));
    let scanner = Arc::new(PriorityScanner::new(
        gate.clone(),
        directory.clone(),
        sequences.clone(),
        config.scanner.clone(),
    ));
    let executor = Arc::new(ActionExecutor::new(
        gate,
        scanner,
        directory,
        sequences,
        Arc::new(NoopDelivery),
        escalations,
    ));

    Ok(Application { config, db_pool, executor })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use cadence_core::config::{ConfigOverrides, LoadOptions};
    use cadence_core::domain::OrganizationId;

    use crate::bootstrap::bootstrap;

    fn options(database_url: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_rejects_a_non_sqlite_database_url() {
        let result = bootstrap(options("postgres://nope")).await;
        assert!(result.is_err());
        let message = result.err().expect("error").to_string();
        assert!(message.contains("sqlite"));
    }

    #[tokio::test]
    async fn integration_smoke_scans_and_contacts_a_seeded_lead() {
        let app = bootstrap(options("sqlite::memory:?cache=shared"))
            .await
            .expect("bootstrap should succeed against an in-memory database");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN \
             ('consent_records', 'contacts', 'conversations', 'scheduled_followups', 'escalation_tasks')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("baseline tables should exist after bootstrap");
        assert_eq!(table_count, 5, "bootstrap should expose all baseline tables");

        // Seed one fresh, reachable lead.
        sqlx::query(
            "INSERT INTO contacts (id, organization_id, first_name, phone, lead_score, created_at) \
             VALUES ('c-1', 'org-1', 'Quinn', '+13035550100', 55, ?1)",
        )
        .bind((Utc::now() - Duration::minutes(10)).to_rfc3339())
        .execute(&app.db_pool)
        .await
        .expect("seed contact");

        let organization = OrganizationId("org-1".to_string());
        let summary = app.executor.run(Some(&organization), true).await;

        assert_eq!(summary.scanned, 1, "the seeded lead should be discovered");
        // Outside the send window the action defers instead of executing;
        // both paths prove the full decision loop is wired.
        assert_eq!(summary.executed + summary.deferred, 1);
        assert_eq!(summary.failed, 0);

        if summary.executed == 1 {
            let (followups,): (i64,) =
                sqlx::query_as("SELECT COUNT(*) FROM scheduled_followups WHERE contact_id = 'c-1'")
                    .fetch_one(&app.db_pool)
                    .await
                    .expect("count follow-ups");
            assert_eq!(followups, 1, "executing the first contact starts a sequence");
        }

        app.db_pool.close().await;
    }
}
