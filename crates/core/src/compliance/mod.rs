//! The compliance gate: every outbound decision passes through here before a
//! send is allowed. Checks run in a fixed order and short-circuit on the
//! first blocking status; policy blocks are first-class results, not errors.

pub mod stage;

use std::sync::Arc;

use chrono::{DateTime, Days, NaiveDate, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::collaborators::ConsentStore;
use crate::domain::{ConsentRecord, ContactId, OrganizationId};
use crate::errors::ApplicationError;

pub use stage::{evaluate_stage_eligibility, is_terminal_stage, StageEligibility, StageStatus};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceConfig {
    /// First local hour of the allowed send window (inclusive).
    pub window_start_hour: u32,
    /// Last local hour of the allowed send window (exclusive).
    pub window_end_hour: u32,
    /// Messages per rolling local day. High on purpose: this allows a
    /// multi-turn same-day conversation, it is not a marketing-blast budget.
    pub daily_message_cap: u32,
    pub default_timezone: String,
    /// Operator-configured stage exclusions, matched exactly before the
    /// built-in pattern sets.
    pub excluded_stages: Vec<String>,
}

impl Default for ComplianceConfig {
    fn default() -> Self {
        Self {
            window_start_hour: 8,
            window_end_hour: 20,
            daily_message_cap: 30,
            default_timezone: "America/Denver".to_string(),
            excluded_stages: Vec::new(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    Compliant,
    OptedOut,
    DoNotCall,
    OutsideWindow,
    RateLimited,
    StageBlocked,
}

impl ComplianceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compliant => "compliant",
            Self::OptedOut => "opted_out",
            Self::DoNotCall => "do_not_call",
            Self::OutsideWindow => "outside_window",
            Self::RateLimited => "rate_limited",
            Self::StageBlocked => "stage_blocked",
        }
    }
}

/// Transient evaluation result, created fresh per call and never persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceResult {
    pub status: ComplianceStatus,
    pub can_send: bool,
    pub reason: String,
    pub next_allowed_at: Option<DateTime<Utc>>,
    pub requires_human: bool,
    pub warnings: Vec<String>,
}

impl ComplianceResult {
    fn blocked(status: ComplianceStatus, reason: impl Into<String>) -> Self {
        Self {
            status,
            can_send: false,
            reason: reason.into(),
            next_allowed_at: None,
            requires_human: false,
            warnings: Vec::new(),
        }
    }

    fn blocked_until(
        status: ComplianceStatus,
        reason: impl Into<String>,
        next_allowed_at: DateTime<Utc>,
    ) -> Self {
        Self { next_allowed_at: Some(next_allowed_at), ..Self::blocked(status, reason) }
    }

    fn compliant(warnings: Vec<String>) -> Self {
        Self {
            status: ComplianceStatus::Compliant,
            can_send: true,
            reason: "all compliance checks passed".to_string(),
            next_allowed_at: None,
            requires_human: false,
            warnings,
        }
    }
}

pub struct ComplianceGate {
    store: Arc<dyn ConsentStore>,
    config: ComplianceConfig,
}

impl ComplianceGate {
    pub fn new(store: Arc<dyn ConsentStore>, config: ComplianceConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &ComplianceConfig {
        &self.config
    }

    /// SMS compliance for one contact, evaluated now.
    pub async fn evaluate(
        &self,
        contact: &ContactId,
        organization: &OrganizationId,
        phone: Option<&str>,
        timezone: Option<&str>,
    ) -> Result<ComplianceResult, ApplicationError> {
        let record = self.store.get(contact, organization).await?;
        Ok(self.evaluate_at(record.as_ref(), phone, timezone, Utc::now()))
    }

    /// Pure decision core. Idempotent: the same record, zone and instant
    /// always produce the same result.
    pub fn evaluate_at(
        &self,
        record: Option<&ConsentRecord>,
        phone: Option<&str>,
        timezone: Option<&str>,
        now: DateTime<Utc>,
    ) -> ComplianceResult {
        let mut warnings = Vec::new();

        match record {
            Some(record) => {
                if record.opted_out {
                    let date = record
                        .opted_out_at
                        .map(|at| at.date_naive().to_string())
                        .unwrap_or_else(|| "an unknown date".to_string());
                    let reason = match record.opt_out_reason.as_deref() {
                        Some(opt_out_reason) => {
                            format!("contact opted out on {date}: {opt_out_reason}")
                        }
                        None => format!("contact opted out on {date}"),
                    };
                    return ComplianceResult::blocked(ComplianceStatus::OptedOut, reason);
                }

                if !record.consent_given {
                    warnings.push(
                        "consent not explicitly recorded; treating the original inquiry as implied consent"
                            .to_string(),
                    );
                }

                if record.on_dnc {
                    return ComplianceResult::blocked(
                        ComplianceStatus::DoNotCall,
                        "contact is flagged on the Do-Not-Call registry",
                    );
                }
            }
            None => {
                warnings.push(
                    "no consent record on file; treating the original inquiry as implied consent"
                        .to_string(),
                );
            }
        }

        if phone.map(|value| value.trim().is_empty()).unwrap_or(true) {
            warnings.push("no phone number on file for SMS outreach".to_string());
        }

        let zone = self.resolve_zone(timezone);
        let local = now.with_timezone(&zone);

        if let Some(next_allowed_at) = self.next_window_open(timezone, now) {
            return ComplianceResult::blocked_until(
                ComplianceStatus::OutsideWindow,
                format!(
                    "local time {:02}:{:02} ({zone}) is outside the {:02}:00-{:02}:00 send window",
                    local.hour(),
                    local.minute(),
                    self.config.window_start_hour,
                    self.config.window_end_hour,
                ),
                next_allowed_at,
            );
        }

        let today_local = local.date_naive();
        let sent_today = record.map(|r| r.effective_sent_today(today_local)).unwrap_or(0);
        if sent_today >= self.config.daily_message_cap {
            let next_day = today_local.checked_add_days(Days::new(1)).unwrap_or(today_local);
            return ComplianceResult::blocked_until(
                ComplianceStatus::RateLimited,
                format!(
                    "daily cap reached: {sent_today} of {} messages sent on {today_local}",
                    self.config.daily_message_cap,
                ),
                self.window_open_on(zone, next_day),
            );
        }

        ComplianceResult::compliant(warnings)
    }

    /// Stage eligibility first (fails closed), then the SMS checks, with
    /// warnings merged in check order.
    pub async fn evaluate_full(
        &self,
        contact: &ContactId,
        organization: &OrganizationId,
        phone: Option<&str>,
        timezone: Option<&str>,
        stage: Option<&str>,
    ) -> Result<ComplianceResult, ApplicationError> {
        self.evaluate_full_at(contact, organization, phone, timezone, stage, Utc::now()).await
    }

    pub async fn evaluate_full_at(
        &self,
        contact: &ContactId,
        organization: &OrganizationId,
        phone: Option<&str>,
        timezone: Option<&str>,
        stage: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<ComplianceResult, ApplicationError> {
        let mut requires_human = false;
        let mut stage_warnings = Vec::new();

        if let Some(stage_name) = stage {
            let eligibility = self.stage_eligibility(stage_name);
            match eligibility.status {
                StageStatus::Excluded | StageStatus::Blocked => {
                    return Ok(ComplianceResult::blocked(
                        ComplianceStatus::StageBlocked,
                        eligibility.reason,
                    ));
                }
                StageStatus::Handoff => {
                    requires_human = true;
                    stage_warnings.push(eligibility.reason);
                }
                StageStatus::Eligible => {}
            }
        }

        let record = self.store.get(contact, organization).await?;
        let mut result = self.evaluate_at(record.as_ref(), phone, timezone, now);
        result.requires_human = result.requires_human || requires_human;
        stage_warnings.append(&mut result.warnings);
        result.warnings = stage_warnings;
        Ok(result)
    }

    pub fn stage_eligibility(&self, stage_name: &str) -> StageEligibility {
        stage::evaluate_stage_eligibility(stage_name, &self.config.excluded_stages)
    }

    /// `None` while the send window is open; otherwise the next instant it
    /// opens, always on a window-start boundary and strictly in the future.
    pub fn next_window_open(
        &self,
        timezone: Option<&str>,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        let zone = self.resolve_zone(timezone);
        let local = now.with_timezone(&zone);
        let hour = local.hour();

        if hour >= self.config.window_start_hour && hour < self.config.window_end_hour {
            return None;
        }

        let open_date = if hour < self.config.window_start_hour {
            local.date_naive()
        } else {
            local.date_naive().checked_add_days(Days::new(1))?
        };
        Some(self.window_open_on(zone, open_date))
    }

    fn resolve_zone(&self, timezone: Option<&str>) -> Tz {
        timezone
            .and_then(|name| name.parse::<Tz>().ok())
            .or_else(|| self.config.default_timezone.parse::<Tz>().ok())
            .unwrap_or(chrono_tz::America::Denver)
    }

    /// Window-start instant on `date` in `zone`. DST gaps can swallow the
    /// nominal instant; walk forward until the zone resolves one.
    fn window_open_on(&self, zone: Tz, date: NaiveDate) -> DateTime<Utc> {
        let mut current = date;
        for _ in 0..3 {
            for hour in self.config.window_start_hour..24 {
                if let Some(naive) = current.and_hms_opt(hour, 0, 0) {
                    if let Some(instant) = zone.from_local_datetime(&naive).earliest() {
                        return instant.with_timezone(&Utc);
                    }
                }
            }
            match current.checked_add_days(Days::new(1)) {
                Some(next) => current = next,
                None => break,
            }
        }

        // Degenerate calendar edge; read the naive instant as UTC.
        let fallback = date
            .and_hms_opt(self.config.window_start_hour, 0, 0)
            .or_else(|| date.and_hms_opt(0, 0, 0))
            .unwrap_or_default();
        DateTime::from_naive_utc_and_offset(fallback, Utc)
    }

    // -------------------------------------------------------------------------
    // Consent write paths
    // -------------------------------------------------------------------------

    pub async fn record_consent(
        &self,
        contact: &ContactId,
        organization: &OrganizationId,
    ) -> Result<(), ApplicationError> {
        let now = Utc::now();
        let mut record = self.load_or_new(contact, organization).await?;
        record.consent_given = true;
        record.consent_at = Some(now);
        record.updated_at = now;
        self.store.upsert(record).await?;
        Ok(())
    }

    pub async fn record_opt_out(
        &self,
        contact: &ContactId,
        organization: &OrganizationId,
        reason: &str,
    ) -> Result<(), ApplicationError> {
        let now = Utc::now();
        let mut record = self.load_or_new(contact, organization).await?;
        record.opted_out = true;
        record.opted_out_at = Some(now);
        record.opt_out_reason = Some(reason.to_string());
        record.updated_at = now;
        self.store.upsert(record).await?;
        tracing::info!(
            event_name = "compliance.opt_out_recorded",
            contact_id = %contact.0,
            organization_id = %organization.0,
            "opt-out recorded"
        );
        Ok(())
    }

    pub async fn clear_opt_out(
        &self,
        contact: &ContactId,
        organization: &OrganizationId,
    ) -> Result<(), ApplicationError> {
        let now = Utc::now();
        let mut record = self.load_or_new(contact, organization).await?;
        record.opted_out = false;
        record.opted_out_at = None;
        record.opt_out_reason = None;
        record.updated_at = now;
        self.store.upsert(record).await?;
        Ok(())
    }

    /// Read-modify-write with the lazy daily reset applied on the value read
    /// back. The day boundary is the recipient's local date — the same
    /// reference the rate-limit check reads. Assumes at most one scheduler
    /// instance per organization.
    pub async fn increment_message_count(
        &self,
        contact: &ContactId,
        organization: &OrganizationId,
        timezone: Option<&str>,
    ) -> Result<u32, ApplicationError> {
        let now = Utc::now();
        let today_local = now.with_timezone(&self.resolve_zone(timezone)).date_naive();

        let mut record = self.load_or_new(contact, organization).await?;
        let count = record.effective_sent_today(today_local) + 1;
        record.messages_sent_today = count;
        record.last_message_date = Some(today_local);
        record.updated_at = now;
        self.store.upsert(record).await?;
        Ok(count)
    }

    async fn load_or_new(
        &self,
        contact: &ContactId,
        organization: &OrganizationId,
    ) -> Result<ConsentRecord, ApplicationError> {
        Ok(self
            .store
            .get(contact, organization)
            .await?
            .unwrap_or_else(|| ConsentRecord::new(contact.clone(), organization.clone())))
    }
}
