//! The priority scanner: five independent classification passes over the
//! contact population, each scoring its hits, merged into one ranked list of
//! recommendations capped at a per-run ceiling. Send-class candidates pass
//! through the compliance gate at scan time; the executor re-checks only the
//! time window later.

mod summary;
mod types;

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::json;

use crate::collaborators::{CollaboratorError, ContactDirectory, SequenceScheduler};
use crate::compliance::stage::is_terminal_stage;
use crate::compliance::{ComplianceGate, ComplianceStatus};
use crate::domain::{
    ActionType, ContactId, ConversationState, OrganizationId, RecommendedAction,
};
use crate::errors::ApplicationError;

pub use summary::{conversation_summary, QUALIFICATION_TOPICS};
pub use types::{ScanReport, ScanSource, ScannerConfig, SubScanSummary};

/// The two event-driven sub-scans are naturally small; they get fixed caps
/// instead of a slice of the batch budget.
const DUE_FOLLOWUP_CAP: usize = 25;
const STALE_HANDOFF_CAP: usize = 25;

pub struct PriorityScanner {
    gate: Arc<ComplianceGate>,
    directory: Arc<dyn ContactDirectory>,
    sequences: Arc<dyn SequenceScheduler>,
    config: ScannerConfig,
}

impl PriorityScanner {
    pub fn new(
        gate: Arc<ComplianceGate>,
        directory: Arc<dyn ContactDirectory>,
        sequences: Arc<dyn SequenceScheduler>,
        config: ScannerConfig,
    ) -> Self {
        Self { gate, directory, sequences, config }
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    pub async fn scan(&self, organization: Option<&OrganizationId>) -> ScanReport {
        self.scan_at(organization, Utc::now()).await
    }

    /// One full scan cycle evaluated against `now`. Sub-scans run
    /// sequentially and independently; a failing sub-scan contributes an
    /// empty slice and a visible error.
    pub async fn scan_at(
        &self,
        organization: Option<&OrganizationId>,
        now: DateTime<Utc>,
    ) -> ScanReport {
        let per_scan = (self.config.batch_size / 3).max(1);

        let mut actions = Vec::new();
        let mut sources = Vec::new();

        for (source, outcome) in [
            (ScanSource::NewLeads, self.scan_new_leads(organization, now, per_scan).await),
            (ScanSource::SilentLeads, self.scan_silent_leads(organization, now, per_scan).await),
            (ScanSource::DormantLeads, self.scan_dormant_leads(organization, now, per_scan).await),
            (ScanSource::DueFollowups, self.scan_due_followups(now).await),
            (ScanSource::StaleHandoffs, self.scan_stale_handoffs(organization, now).await),
        ] {
            match outcome {
                Ok(items) => {
                    tracing::debug!(
                        event_name = "scanner.sub_scan_completed",
                        source = source.as_str(),
                        found = items.len(),
                        "sub-scan completed"
                    );
                    sources.push(SubScanSummary { source, found: items.len(), error: None });
                    actions.extend(items);
                }
                Err(error) => {
                    tracing::warn!(
                        event_name = "scanner.sub_scan_failed",
                        source = source.as_str(),
                        error = %error,
                        "sub-scan failed; contributing nothing this cycle"
                    );
                    sources.push(SubScanSummary {
                        source,
                        found: 0,
                        error: Some(error.to_string()),
                    });
                }
            }
        }

        // Stable sort: ties keep discovery order.
        actions.sort_by(|a, b| b.priority.cmp(&a.priority));
        let truncated = actions.len() > self.config.run_ceiling;
        actions.truncate(self.config.run_ceiling);

        tracing::info!(
            event_name = "scanner.scan_completed",
            organization_id = organization.map(|org| org.0.as_str()).unwrap_or("all"),
            actions = actions.len(),
            truncated,
            "scan cycle completed"
        );

        ScanReport { actions, sources, started_at: now, truncated }
    }

    /// Compliance admission for one send-class candidate. Hard blocks drop
    /// it; a closed window keeps it with execution pushed to the opening.
    async fn admit(
        &self,
        contact: &ContactId,
        organization: &OrganizationId,
        phone: Option<&str>,
        timezone: Option<&str>,
        stage: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, CollaboratorError> {
        let result = self
            .gate
            .evaluate_full_at(contact, organization, phone, timezone, stage, now)
            .await
            .map_err(|error| match error {
                ApplicationError::Collaborator(inner) => inner,
                other => CollaboratorError::Store(other.to_string()),
            })?;

        match result.status {
            ComplianceStatus::Compliant => Ok(Some(now)),
            ComplianceStatus::OutsideWindow => Ok(Some(result.next_allowed_at.unwrap_or(now))),
            _ => {
                tracing::debug!(
                    event_name = "scanner.candidate_blocked",
                    contact_id = %contact.0,
                    status = result.status.as_str(),
                    reason = %result.reason,
                    "candidate dropped at scan time"
                );
                Ok(None)
            }
        }
    }

    /// Contacts created in the last 24h with no AI outreach yet. Hot: the
    /// score decays from 90 toward a floor of 50 but age inside the window
    /// never disqualifies.
    async fn scan_new_leads(
        &self,
        organization: Option<&OrganizationId>,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<RecommendedAction>, CollaboratorError> {
        let since = now - Duration::hours(24);
        let contacts = self.directory.new_contacts(organization, since, limit).await?;

        let mut actions = Vec::new();
        for contact in contacts {
            if contact.first_ai_contact_at.is_some() || !contact.is_reachable() {
                continue;
            }
            let Some(execute_at) = self
                .admit(
                    &contact.id,
                    &contact.organization_id,
                    contact.phone.as_deref(),
                    contact.timezone.as_deref(),
                    contact.stage.as_deref(),
                    now,
                )
                .await?
            else {
                continue;
            };

            let hours_since_created = (now - contact.created_at).num_hours().max(0);
            let priority = (90 - 2 * hours_since_created as i32).clamp(50, 90);
            let action_type = if contact.has_phone() {
                ActionType::FirstContactSms
            } else {
                ActionType::FirstContactEmail
            };

            let mut action = RecommendedAction::new(
                contact.id.clone(),
                contact.organization_id.clone(),
                action_type,
                priority,
                format!("new lead created {hours_since_created}h ago with no outreach yet"),
            )
            .with_execute_at(execute_at)
            .with_context("trigger", json!("new_lead"))
            .with_context("hours_since_created", json!(hours_since_created));
            if let Some(name) = &contact.first_name {
                action = action.with_context("first_name", json!(name));
            }
            if let Some(timezone) = &contact.timezone {
                action = action.with_context("timezone", json!(timezone));
            }
            actions.push(action);
        }
        Ok(actions)
    }

    /// Conversations where our last outbound has sat unanswered past the
    /// silence threshold.
    async fn scan_silent_leads(
        &self,
        organization: Option<&OrganizationId>,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<RecommendedAction>, CollaboratorError> {
        let cutoff = now - Duration::hours(self.config.silent_after_hours);
        let conversations = self.directory.conversations(organization, limit * 4).await?;

        let mut actions = Vec::new();
        for conversation in conversations {
            if actions.len() >= limit {
                break;
            }
            if !conversation.active || conversation.state.is_terminal_for_automation() {
                continue;
            }
            let Some(last_outbound) = conversation.last_ai_message_at else {
                continue;
            };
            if last_outbound > cutoff || !conversation.unanswered_since(last_outbound) {
                continue;
            }
            // De-duplication guard: the sequencer already owns a follow-up.
            if self.sequences.has_pending(&conversation.contact_id).await? {
                continue;
            }
            let Some(execute_at) = self
                .admit(
                    &conversation.contact_id,
                    &conversation.organization_id,
                    None,
                    None,
                    None,
                    now,
                )
                .await?
            else {
                continue;
            };

            let (trigger, objection) = match conversation.state {
                ConversationState::Qualifying => ("resume_qualification", None),
                ConversationState::Scheduling => ("resume_scheduling", None),
                ConversationState::ObjectionHandling => {
                    ("resume_objection", conversation.last_objection())
                }
                _ => match conversation.last_objection() {
                    Some(objection) => ("resume_objection", Some(objection)),
                    None => ("no_response", None),
                },
            };

            let silent_hours = (now - last_outbound).num_hours();
            let mut action = RecommendedAction::new(
                conversation.contact_id.clone(),
                conversation.organization_id.clone(),
                ActionType::FollowupSms,
                conversation.lead_score,
                format!("no reply for {silent_hours}h since the last outbound message"),
            )
            .with_execute_at(execute_at)
            .with_context("trigger", json!(trigger))
            .with_context("conversation_state", json!(conversation.state.as_str()))
            .with_context("summary", json!(conversation_summary(&conversation)));
            if let Some(objection) = objection {
                action = action.with_context("last_objection", json!(objection.as_str()));
            }
            actions.push(action);
        }
        Ok(actions)
    }

    /// Contacts with no activity for 30+ days. The 90+ day band gets the
    /// lower-pressure, email-first revival treatment.
    async fn scan_dormant_leads(
        &self,
        organization: Option<&OrganizationId>,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<RecommendedAction>, CollaboratorError> {
        let cutoff = now - Duration::days(self.config.dormant_after_days);
        let contacts = self.directory.dormant_contacts(organization, cutoff, limit).await?;

        let mut actions = Vec::new();
        for contact in contacts {
            if contact.stage.as_deref().map(is_terminal_stage).unwrap_or(false) {
                continue;
            }

            let last_seen = contact.last_activity_at.unwrap_or(contact.created_at);
            let days_dormant = (now - last_seen).num_days();
            if days_dormant < self.config.dormant_after_days {
                continue;
            }
            let Some(execute_at) = self
                .admit(
                    &contact.id,
                    &contact.organization_id,
                    contact.phone.as_deref(),
                    contact.timezone.as_deref(),
                    contact.stage.as_deref(),
                    now,
                )
                .await?
            else {
                continue;
            };

            let priority =
                (60 - (days_dormant as i32 - self.config.dormant_after_days as i32)).clamp(20, 60);
            let revival = days_dormant >= self.config.revival_after_days;
            let action_type =
                if revival { ActionType::ReengagementEmail } else { ActionType::ReengagementSms };

            actions.push(
                RecommendedAction::new(
                    contact.id.clone(),
                    contact.organization_id.clone(),
                    action_type,
                    priority,
                    format!("dormant for {days_dormant} days"),
                )
                .with_execute_at(execute_at)
                .with_context("trigger", json!(if revival { "revival" } else { "reengagement" }))
                .with_context("days_dormant", json!(days_dormant)),
            );
        }
        Ok(actions)
    }

    /// Already-scheduled follow-ups whose due time has passed. These were
    /// admitted when they were scheduled; the executor re-checks the window.
    async fn scan_due_followups(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<RecommendedAction>, CollaboratorError> {
        let mut due = self.sequences.due(now).await?;
        due.truncate(DUE_FOLLOWUP_CAP);

        Ok(due
            .into_iter()
            .map(|item| {
                RecommendedAction::new(
                    item.contact_id.clone(),
                    item.organization_id.clone(),
                    ActionType::FollowupDue,
                    70,
                    format!("scheduled `{}` follow-up was due at {}", item.trigger, item.due_at),
                )
                .with_execute_at(now)
                .with_context("followup_id", json!(item.id))
                .with_context("trigger", json!(item.trigger))
                .with_context("channel", json!(item.channel))
            })
            .collect())
    }

    /// Dropped-ball detector: conversations handed off to a human who never
    /// picked them up. Compares the human-message timestamp to the handoff's
    /// own update time, not to now, so a prompt reply never reads as stale.
    async fn scan_stale_handoffs(
        &self,
        organization: Option<&OrganizationId>,
        now: DateTime<Utc>,
    ) -> Result<Vec<RecommendedAction>, CollaboratorError> {
        let stale_before = now - Duration::hours(self.config.stale_handoff_after_hours);
        let handoffs = self.directory.handoffs(organization, stale_before).await?;

        let mut actions = Vec::new();
        for conversation in handoffs.into_iter().take(STALE_HANDOFF_CAP) {
            if conversation.state != ConversationState::HandedOff {
                continue;
            }
            let human_followed_up = conversation
                .last_human_message_at
                .map(|at| at >= conversation.updated_at)
                .unwrap_or(false);
            if human_followed_up {
                continue;
            }

            let hours_stale = (now - conversation.updated_at).num_hours();
            let priority = if hours_stale >= 72 { 85 } else { 75 };

            actions.push(
                RecommendedAction::new(
                    conversation.contact_id.clone(),
                    conversation.organization_id.clone(),
                    ActionType::HumanTask,
                    priority,
                    format!("handed off {hours_stale}h ago with no human follow-up"),
                )
                .with_execute_at(now)
                .with_context("hours_stale", json!(hours_stale))
                .with_context("summary", json!(conversation_summary(&conversation))),
            );
        }
        Ok(actions)
    }
}
