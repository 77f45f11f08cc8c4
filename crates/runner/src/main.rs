mod bootstrap;
mod delivery;

use anyhow::Result;
use tokio::time::MissedTickBehavior;

use cadence_core::config::{AppConfig, LoadOptions};
use cadence_core::domain::OrganizationId;

fn init_logging(config: &AppConfig) {
    use cadence_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    let organization = app.config.scheduler.organization.clone().map(OrganizationId);
    let execute = app.config.scheduler.execute;
    let interval =
        std::time::Duration::from_secs(app.config.scheduler.interval_minutes.max(1) * 60);

    tracing::info!(
        event_name = "system.runner.started",
        correlation_id = "bootstrap",
        organization_id = organization.as_ref().map(|org| org.0.as_str()).unwrap_or("all"),
        interval_minutes = app.config.scheduler.interval_minutes,
        execute,
        "cadence runner started"
    );

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let summary = app.executor.run(organization.as_ref(), execute).await;

                tracing::info!(
                    event_name = "runner.cycle_completed",
                    scanned = summary.scanned,
                    executed = summary.executed,
                    deferred = summary.deferred,
                    skipped = summary.skipped,
                    failed = summary.failed,
                    "scan cycle completed"
                );

                // Operator-facing alert: the one failure class that must not
                // wait for the next cycle to be noticed.
                if let Some(reason) = &summary.breaker_tripped {
                    tracing::error!(
                        event_name = "runner.delivery_outage",
                        reason = %reason,
                        "delivery channel outage detected; follow-ups paused for this run"
                    );
                }
            }
            result = tokio::signal::ctrl_c() => {
                result?;
                break;
            }
        }
    }

    tracing::info!(
        event_name = "system.runner.stopping",
        correlation_id = "shutdown",
        "cadence runner stopping"
    );

    Ok(())
}
