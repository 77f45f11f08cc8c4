//! The action executor: turns ranked recommendations into side effects on
//! the collaborators, re-checking the time window at execution time and
//! tripping a run-scoped circuit breaker on systemic delivery failures.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::collaborators::{
    ContactDirectory, EscalationDesk, MessageDelivery, SendInstruction, SequenceScheduler,
};
use crate::compliance::ComplianceGate;
use crate::domain::{ActionType, ContactId, OrganizationId, RecommendedAction};
use crate::scanner::{PriorityScanner, SubScanSummary};

/// Error fragments that mean the delivery channel itself is down, not just
/// one message. Matched case-insensitively against delivery error strings.
const OUTAGE_SIGNATURES: &[&str] = &[
    "authentication failed",
    "auth failure",
    "login failed",
    "login required",
    "suspicious login",
    "account locked",
    "locked out",
    "cooldown",
];

/// Hours of slack a stale-handoff escalation task gets before it is due.
const ESCALATION_DUE_HOURS: i64 = 4;

pub fn is_systemic_outage(error: &str) -> bool {
    let normalized = error.to_ascii_lowercase();
    OUTAGE_SIGNATURES.iter().any(|signature| normalized.contains(signature))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Executed,
    Deferred,
    Skipped,
    Failed,
}

impl ActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Executed => "executed",
            Self::Deferred => "deferred",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub contact_id: ContactId,
    pub organization_id: OrganizationId,
    pub action_type: ActionType,
    pub status: ActionStatus,
    pub detail: String,
    pub deferred_until: Option<DateTime<Utc>>,
}

impl ActionOutcome {
    fn new(
        action: &RecommendedAction,
        status: ActionStatus,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            contact_id: action.contact_id.clone(),
            organization_id: action.organization_id.clone(),
            action_type: action.action_type,
            status,
            detail: detail.into(),
            deferred_until: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub outcomes: Vec<ActionOutcome>,
    pub breaker_tripped: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub organization_id: Option<OrganizationId>,
    pub started_at: DateTime<Utc>,
    pub scanned: usize,
    pub executed: usize,
    pub deferred: usize,
    pub skipped: usize,
    pub failed: usize,
    pub breaker_tripped: Option<String>,
    pub outcomes: Vec<ActionOutcome>,
    pub scan_sources: Vec<SubScanSummary>,
}

/// Run-scoped breaker state. Once tripped it applies to every later
/// followup-class action in the same batch, never to ones already done.
#[derive(Default)]
struct RunBreaker {
    reason: Option<String>,
}

impl RunBreaker {
    fn trip(&mut self, reason: &str) {
        if self.reason.is_none() {
            self.reason = Some(reason.to_string());
        }
    }
}

pub struct ActionExecutor {
    gate: Arc<ComplianceGate>,
    scanner: Arc<PriorityScanner>,
    directory: Arc<dyn ContactDirectory>,
    sequences: Arc<dyn SequenceScheduler>,
    delivery: Arc<dyn MessageDelivery>,
    escalations: Arc<dyn EscalationDesk>,
}

impl ActionExecutor {
    pub fn new(
        gate: Arc<ComplianceGate>,
        scanner: Arc<PriorityScanner>,
        directory: Arc<dyn ContactDirectory>,
        sequences: Arc<dyn SequenceScheduler>,
        delivery: Arc<dyn MessageDelivery>,
        escalations: Arc<dyn EscalationDesk>,
    ) -> Self {
        Self { gate, scanner, directory, sequences, delivery, escalations }
    }

    /// Execute one recommendation outside any batch (fresh breaker state).
    pub async fn execute(&self, action: &RecommendedAction) -> ActionOutcome {
        let mut breaker = RunBreaker::default();
        self.execute_one(action, Utc::now(), &mut breaker).await
    }

    /// Execute a ranked batch in order, sharing one breaker across it.
    pub async fn execute_batch(&self, actions: &[RecommendedAction]) -> BatchOutcome {
        self.execute_batch_at(actions, Utc::now()).await
    }

    pub async fn execute_batch_at(
        &self,
        actions: &[RecommendedAction],
        now: DateTime<Utc>,
    ) -> BatchOutcome {
        let mut breaker = RunBreaker::default();
        let mut outcomes = Vec::with_capacity(actions.len());

        for action in actions {
            let outcome = self.execute_one(action, now, &mut breaker).await;
            tracing::info!(
                event_name = "executor.action_processed",
                contact_id = %outcome.contact_id.0,
                action_type = outcome.action_type.as_str(),
                status = outcome.status.as_str(),
                detail = %outcome.detail,
                "action processed"
            );
            outcomes.push(outcome);
        }

        BatchOutcome { outcomes, breaker_tripped: breaker.reason }
    }

    /// Full scan-and-act cycle. With `execute = false` this is a dry run:
    /// the ranked list is returned without side effects.
    pub async fn run(&self, organization: Option<&OrganizationId>, execute: bool) -> RunSummary {
        self.run_at(organization, execute, Utc::now()).await
    }

    pub async fn run_at(
        &self,
        organization: Option<&OrganizationId>,
        execute: bool,
        now: DateTime<Utc>,
    ) -> RunSummary {
        let report = self.scanner.scan_at(organization, now).await;

        let batch = if execute {
            self.execute_batch_at(&report.actions, now).await
        } else {
            BatchOutcome { outcomes: Vec::new(), breaker_tripped: None }
        };

        let count = |status: ActionStatus| {
            batch.outcomes.iter().filter(|outcome| outcome.status == status).count()
        };
        let summary = RunSummary {
            organization_id: organization.cloned(),
            started_at: now,
            scanned: report.actions.len(),
            executed: count(ActionStatus::Executed),
            deferred: count(ActionStatus::Deferred),
            skipped: count(ActionStatus::Skipped),
            failed: count(ActionStatus::Failed),
            breaker_tripped: batch.breaker_tripped,
            outcomes: batch.outcomes,
            scan_sources: report.sources,
        };

        tracing::info!(
            event_name = "executor.run_completed",
            organization_id = organization.map(|org| org.0.as_str()).unwrap_or("all"),
            scanned = summary.scanned,
            executed = summary.executed,
            deferred = summary.deferred,
            skipped = summary.skipped,
            failed = summary.failed,
            breaker_tripped = summary.breaker_tripped.is_some(),
            "run completed"
        );
        summary
    }

    /// `run` plus an audit trail of the cycle and every action outcome.
    pub async fn run_with_audit<S>(
        &self,
        organization: Option<&OrganizationId>,
        execute: bool,
        sink: &S,
        audit: &AuditContext,
    ) -> RunSummary
    where
        S: AuditSink,
    {
        let summary = self.run(organization, execute).await;

        sink.emit(
            AuditEvent::new(
                None,
                audit.organization_id.clone(),
                audit.correlation_id.clone(),
                "scanner.scan_completed",
                AuditCategory::Scan,
                audit.actor.clone(),
                AuditOutcome::Success,
            )
            .with_metadata("scanned", summary.scanned.to_string()),
        );

        for outcome in &summary.outcomes {
            let audit_outcome = match outcome.status {
                ActionStatus::Executed => AuditOutcome::Success,
                ActionStatus::Deferred => AuditOutcome::Deferred,
                ActionStatus::Skipped => AuditOutcome::Skipped,
                ActionStatus::Failed => AuditOutcome::Failed,
            };
            sink.emit(
                AuditEvent::new(
                    Some(outcome.contact_id.clone()),
                    Some(outcome.organization_id.clone()),
                    audit.correlation_id.clone(),
                    format!("executor.action_{}", outcome.status.as_str()),
                    AuditCategory::Execution,
                    audit.actor.clone(),
                    audit_outcome,
                )
                .with_metadata("action_type", outcome.action_type.as_str())
                .with_metadata("detail", outcome.detail.clone()),
            );
        }

        if let Some(reason) = &summary.breaker_tripped {
            sink.emit(
                AuditEvent::new(
                    None,
                    audit.organization_id.clone(),
                    audit.correlation_id.clone(),
                    "executor.breaker_tripped",
                    AuditCategory::Execution,
                    audit.actor.clone(),
                    AuditOutcome::Failed,
                )
                .with_metadata("reason", reason.clone()),
            );
        }

        summary
    }

    async fn execute_one(
        &self,
        action: &RecommendedAction,
        now: DateTime<Utc>,
        breaker: &mut RunBreaker,
    ) -> ActionOutcome {
        if action.action_type.is_followup() {
            if let Some(reason) = &breaker.reason {
                return ActionOutcome::new(
                    action,
                    ActionStatus::Skipped,
                    format!("skipped: delivery channel outage earlier in this run ({reason})"),
                );
            }
        }

        // The time window is the one gate check likely to have drifted since
        // scan time; re-check it alone and defer rather than drop. Due
        // follow-ups riding an email channel are exempt.
        let email_channel = action.context_str("channel") == Some("email");
        if action.action_type.is_sms() && !email_channel {
            let timezone = action.context_str("timezone");
            if let Some(next_open) = self.gate.next_window_open(timezone, now) {
                let mut outcome = ActionOutcome::new(
                    action,
                    ActionStatus::Deferred,
                    format!("outside the send window; retry at {next_open}"),
                );
                outcome.deferred_until = Some(next_open);
                return outcome;
            }
        }

        match action.action_type {
            ActionType::FirstContactSms | ActionType::FirstContactEmail => {
                self.execute_first_contact(action, now).await
            }
            ActionType::FollowupSms | ActionType::FollowupDue => {
                self.execute_followup(action, now, breaker).await
            }
            ActionType::ReengagementSms | ActionType::ReengagementEmail => {
                self.execute_reengagement(action).await
            }
            ActionType::HumanTask => self.execute_human_task(action, now).await,
        }
    }

    async fn execute_first_contact(
        &self,
        action: &RecommendedAction,
        now: DateTime<Utc>,
    ) -> ActionOutcome {
        let contact = match self.directory.contact(&action.contact_id).await {
            Ok(Some(contact)) => contact,
            Ok(None) => {
                return ActionOutcome::new(
                    action,
                    ActionStatus::Failed,
                    "contact not found in directory",
                );
            }
            Err(error) => return ActionOutcome::new(action, ActionStatus::Failed, error.to_string()),
        };

        let channel = if action.action_type == ActionType::FirstContactSms {
            if !contact.has_phone() {
                return ActionOutcome::new(
                    action,
                    ActionStatus::Failed,
                    "no phone number available",
                );
            }
            "sms"
        } else {
            if !contact.has_email() {
                return ActionOutcome::new(
                    action,
                    ActionStatus::Failed,
                    "no email address available",
                );
            }
            "email"
        };

        if let Err(error) = self
            .sequences
            .schedule("new_lead", &action.contact_id, &action.organization_id, 0, channel)
            .await
        {
            return ActionOutcome::new(action, ActionStatus::Failed, error.to_string());
        }
        if let Err(error) = self.directory.mark_first_contact(&action.contact_id, now).await {
            return ActionOutcome::new(action, ActionStatus::Failed, error.to_string());
        }

        ActionOutcome::new(
            action,
            ActionStatus::Executed,
            format!("new-lead sequence started over {channel}"),
        )
    }

    async fn execute_followup(
        &self,
        action: &RecommendedAction,
        now: DateTime<Utc>,
        breaker: &mut RunBreaker,
    ) -> ActionOutcome {
        let followup_id = action.context_str("followup_id").map(str::to_string);
        if action.action_type == ActionType::FollowupDue && followup_id.is_none() {
            return ActionOutcome::new(
                action,
                ActionStatus::Failed,
                "due follow-up is missing its followup_id",
            );
        }

        let instruction = SendInstruction {
            trigger: action.context_str("trigger").unwrap_or("no_response").to_string(),
            channel: action.context_str("channel").unwrap_or("sms").to_string(),
            context: action.context.clone(),
        };

        let receipt = self.delivery.send(&action.contact_id, instruction).await;
        if !receipt.delivered {
            let error = receipt.error.unwrap_or_else(|| "delivery failed".to_string());
            if is_systemic_outage(&error) {
                tracing::warn!(
                    event_name = "executor.breaker_tripped",
                    contact_id = %action.contact_id.0,
                    error = %error,
                    "systemic delivery failure; skipping remaining follow-ups this run"
                );
                breaker.trip(&error);
            }
            return ActionOutcome::new(action, ActionStatus::Failed, error);
        }

        if let Some(id) = followup_id {
            if let Err(error) = self.sequences.mark_sent(&id, now).await {
                // The message went out; a bookkeeping miss must not fail it.
                tracing::warn!(
                    event_name = "executor.mark_sent_failed",
                    followup_id = %id,
                    error = %error,
                    "could not mark follow-up sent"
                );
            }
        }

        let timezone = action.context_str("timezone");
        if let Err(error) = self
            .gate
            .increment_message_count(&action.contact_id, &action.organization_id, timezone)
            .await
        {
            tracing::warn!(
                event_name = "executor.rate_count_update_failed",
                contact_id = %action.contact_id.0,
                error = %error,
                "could not update the daily send counter"
            );
        }

        ActionOutcome::new(action, ActionStatus::Executed, "follow-up handed to delivery")
    }

    async fn execute_reengagement(&self, action: &RecommendedAction) -> ActionOutcome {
        let (trigger, channel) = if action.action_type == ActionType::ReengagementEmail {
            ("revival", "email")
        } else {
            ("reengagement", "sms")
        };

        match self
            .sequences
            .schedule(trigger, &action.contact_id, &action.organization_id, 0, channel)
            .await
        {
            Ok(()) => ActionOutcome::new(
                action,
                ActionStatus::Executed,
                format!("{trigger} sequence started over {channel}"),
            ),
            Err(error) => ActionOutcome::new(action, ActionStatus::Failed, error.to_string()),
        }
    }

    async fn execute_human_task(
        &self,
        action: &RecommendedAction,
        now: DateTime<Utc>,
    ) -> ActionOutcome {
        let due_at = now + Duration::hours(ESCALATION_DUE_HOURS);
        match self
            .escalations
            .create_task(&action.contact_id, &action.organization_id, &action.reason, due_at)
            .await
        {
            Ok(()) => {
                ActionOutcome::new(action, ActionStatus::Executed, "escalation task created")
            }
            Err(error) => ActionOutcome::new(action, ActionStatus::Failed, error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use chrono_tz::Tz;
    use serde_json::json;
    use tokio::sync::RwLock;

    use super::{is_systemic_outage, ActionExecutor, ActionStatus};
    use crate::audit::{AuditContext, InMemoryAuditSink};
    use crate::collaborators::{
        CollaboratorError, ConsentStore, ContactDirectory, DeliveryReceipt, DueFollowup,
        EscalationDesk, MessageDelivery, SendInstruction, SequenceScheduler,
    };
    use crate::compliance::{ComplianceConfig, ComplianceGate};
    use crate::domain::{
        ActionType, ConsentRecord, ContactId, ContactSnapshot, ConversationRecord,
        OrganizationId, RecommendedAction,
    };
    use crate::scanner::{PriorityScanner, ScannerConfig};

    #[derive(Default)]
    struct StubConsentStore {
        records: RwLock<HashMap<(String, String), ConsentRecord>>,
    }

    #[async_trait]
    impl ConsentStore for StubConsentStore {
        async fn get(
            &self,
            contact: &ContactId,
            organization: &OrganizationId,
        ) -> Result<Option<ConsentRecord>, CollaboratorError> {
            Ok(self
                .records
                .read()
                .await
                .get(&(contact.0.clone(), organization.0.clone()))
                .cloned())
        }

        async fn upsert(&self, record: ConsentRecord) -> Result<(), CollaboratorError> {
            self.records
                .write()
                .await
                .insert((record.contact_id.0.clone(), record.organization_id.0.clone()), record);
            Ok(())
        }
    }

    #[derive(Default)]
    struct StubDirectory {
        contacts: HashMap<String, ContactSnapshot>,
        new: Vec<ContactSnapshot>,
        first_contacted: RwLock<HashSet<String>>,
    }

    #[async_trait]
    impl ContactDirectory for StubDirectory {
        async fn contact(
            &self,
            id: &ContactId,
        ) -> Result<Option<ContactSnapshot>, CollaboratorError> {
            Ok(self.contacts.get(&id.0).cloned())
        }

        async fn new_contacts(
            &self,
            _organization: Option<&OrganizationId>,
            _since: DateTime<Utc>,
            limit: usize,
        ) -> Result<Vec<ContactSnapshot>, CollaboratorError> {
            Ok(self.new.iter().take(limit).cloned().collect())
        }

        async fn dormant_contacts(
            &self,
            _organization: Option<&OrganizationId>,
            _inactive_before: DateTime<Utc>,
            _limit: usize,
        ) -> Result<Vec<ContactSnapshot>, CollaboratorError> {
            Ok(Vec::new())
        }

        async fn conversations(
            &self,
            _organization: Option<&OrganizationId>,
            _limit: usize,
        ) -> Result<Vec<ConversationRecord>, CollaboratorError> {
            Ok(Vec::new())
        }

        async fn handoffs(
            &self,
            _organization: Option<&OrganizationId>,
            _stale_before: DateTime<Utc>,
        ) -> Result<Vec<ConversationRecord>, CollaboratorError> {
            Ok(Vec::new())
        }

        async fn mark_first_contact(
            &self,
            id: &ContactId,
            _at: DateTime<Utc>,
        ) -> Result<(), CollaboratorError> {
            self.first_contacted.write().await.insert(id.0.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct StubSequences {
        scheduled: RwLock<Vec<(String, String, String)>>,
        sent: RwLock<Vec<String>>,
    }

    #[async_trait]
    impl SequenceScheduler for StubSequences {
        async fn schedule(
            &self,
            trigger: &str,
            contact: &ContactId,
            _organization: &OrganizationId,
            _delay_hours: i64,
            channel: &str,
        ) -> Result<(), CollaboratorError> {
            self.scheduled.write().await.push((
                trigger.to_string(),
                contact.0.clone(),
                channel.to_string(),
            ));
            Ok(())
        }

        async fn due(&self, _before: DateTime<Utc>) -> Result<Vec<DueFollowup>, CollaboratorError> {
            Ok(Vec::new())
        }

        async fn mark_sent(&self, id: &str, _at: DateTime<Utc>) -> Result<(), CollaboratorError> {
            self.sent.write().await.push(id.to_string());
            Ok(())
        }

        async fn has_pending(&self, _contact: &ContactId) -> Result<bool, CollaboratorError> {
            Ok(false)
        }
    }

    #[derive(Default)]
    struct StubDelivery {
        fail_contacts: HashMap<String, String>,
        sent: RwLock<Vec<(String, String)>>,
    }

    #[async_trait]
    impl MessageDelivery for StubDelivery {
        async fn send(
            &self,
            contact: &ContactId,
            instruction: SendInstruction,
        ) -> DeliveryReceipt {
            if let Some(error) = self.fail_contacts.get(&contact.0) {
                return DeliveryReceipt::failed(error.clone());
            }
            self.sent.write().await.push((contact.0.clone(), instruction.trigger));
            DeliveryReceipt::ok()
        }
    }

    #[derive(Default)]
    struct StubEscalations {
        tasks: RwLock<Vec<(String, String)>>,
    }

    #[async_trait]
    impl EscalationDesk for StubEscalations {
        async fn create_task(
            &self,
            contact: &ContactId,
            _organization: &OrganizationId,
            title: &str,
            _due_at: DateTime<Utc>,
        ) -> Result<(), CollaboratorError> {
            self.tasks.write().await.push((contact.0.clone(), title.to_string()));
            Ok(())
        }
    }

    struct Harness {
        executor: ActionExecutor,
        sequences: Arc<StubSequences>,
        delivery: Arc<StubDelivery>,
        escalations: Arc<StubEscalations>,
        directory: Arc<StubDirectory>,
    }

    fn harness(directory: StubDirectory, delivery: StubDelivery) -> Harness {
        let directory = Arc::new(directory);
        let sequences = Arc::new(StubSequences::default());
        let delivery = Arc::new(delivery);
        let escalations = Arc::new(StubEscalations::default());
        let gate = Arc::new(ComplianceGate::new(
            Arc::new(StubConsentStore::default()),
            ComplianceConfig::default(),
        ));
        let scanner = Arc::new(PriorityScanner::new(
            gate.clone(),
            directory.clone(),
            sequences.clone(),
            ScannerConfig::default(),
        ));
        let executor = ActionExecutor::new(
            gate,
            scanner,
            directory.clone(),
            sequences.clone(),
            delivery.clone(),
            escalations.clone(),
        );
        Harness { executor, sequences, delivery, escalations, directory }
    }

    fn org() -> OrganizationId {
        OrganizationId("org-1".to_string())
    }

    fn followup(id: &str) -> RecommendedAction {
        RecommendedAction::new(
            ContactId(id.to_string()),
            org(),
            ActionType::FollowupSms,
            60,
            "no reply in 24h",
        )
        .with_context("trigger", json!("no_response"))
    }

    fn snapshot(id: &str, phone: Option<&str>, now: DateTime<Utc>) -> ContactSnapshot {
        ContactSnapshot {
            id: ContactId(id.to_string()),
            organization_id: org(),
            first_name: None,
            phone: phone.map(str::to_string),
            email: None,
            stage: None,
            timezone: None,
            lead_score: 50,
            created_at: now - Duration::minutes(10),
            first_ai_contact_at: None,
            last_activity_at: None,
        }
    }

    fn daytime() -> DateTime<Utc> {
        let zone: Tz = "America/Denver".parse().expect("known zone");
        zone.with_ymd_and_hms(2026, 3, 3, 12, 0, 0)
            .single()
            .expect("unambiguous")
            .with_timezone(&Utc)
    }

    fn night() -> DateTime<Utc> {
        let zone: Tz = "America/Denver".parse().expect("known zone");
        zone.with_ymd_and_hms(2026, 3, 3, 22, 0, 0)
            .single()
            .expect("unambiguous")
            .with_timezone(&Utc)
    }

    #[test]
    fn outage_signatures_match_channel_level_failures_only() {
        assert!(is_systemic_outage("Login failed: please verify this browser"));
        assert!(is_systemic_outage("suspicious login detected, account locked"));
        assert!(is_systemic_outage("sending paused: cooldown in effect"));
        assert!(!is_systemic_outage("recipient number is invalid"));
        assert!(!is_systemic_outage("message body rejected"));
    }

    #[tokio::test]
    async fn breaker_skips_remaining_followups_after_a_systemic_failure() {
        let mut delivery = StubDelivery::default();
        delivery.fail_contacts.insert("c-2".to_string(), "login failed: session expired".to_string());
        let harness = harness(StubDirectory::default(), delivery);

        let actions: Vec<_> = (1..=5).map(|index| followup(&format!("c-{index}"))).collect();
        let batch = harness.executor.execute_batch_at(&actions, daytime()).await;

        let statuses: Vec<ActionStatus> =
            batch.outcomes.iter().map(|outcome| outcome.status).collect();
        assert_eq!(
            statuses,
            vec![
                ActionStatus::Executed,
                ActionStatus::Failed,
                ActionStatus::Skipped,
                ActionStatus::Skipped,
                ActionStatus::Skipped,
            ]
        );
        assert!(batch.breaker_tripped.as_deref().unwrap_or_default().contains("login failed"));
        for skipped in &batch.outcomes[2..] {
            assert!(skipped.detail.contains("outage"), "skip reason references the outage");
        }
        // Only the first action actually reached the channel.
        assert_eq!(harness.delivery.sent.read().await.len(), 1);
    }

    #[tokio::test]
    async fn non_systemic_failure_does_not_trip_the_breaker() {
        let mut delivery = StubDelivery::default();
        delivery.fail_contacts.insert("c-1".to_string(), "recipient number is invalid".to_string());
        let harness = harness(StubDirectory::default(), delivery);

        let actions = vec![followup("c-1"), followup("c-2")];
        let batch = harness.executor.execute_batch_at(&actions, daytime()).await;

        assert_eq!(batch.outcomes[0].status, ActionStatus::Failed);
        assert_eq!(batch.outcomes[1].status, ActionStatus::Executed);
        assert!(batch.breaker_tripped.is_none());
    }

    #[tokio::test]
    async fn breaker_does_not_gate_first_contact_or_reengagement() {
        let now = daytime();
        let mut delivery = StubDelivery::default();
        delivery.fail_contacts.insert("c-1".to_string(), "account locked".to_string());
        let mut directory = StubDirectory::default();
        directory
            .contacts
            .insert("c-new".to_string(), snapshot("c-new", Some("+13035550100"), now));
        let harness = harness(directory, delivery);

        let actions = vec![
            followup("c-1"),
            RecommendedAction::new(
                ContactId("c-new".to_string()),
                org(),
                ActionType::FirstContactSms,
                90,
                "new lead",
            ),
            RecommendedAction::new(
                ContactId("c-dormant".to_string()),
                org(),
                ActionType::ReengagementSms,
                40,
                "dormant for 45 days",
            ),
        ];
        let batch = harness.executor.execute_batch_at(&actions, now).await;

        assert_eq!(batch.outcomes[0].status, ActionStatus::Failed);
        assert_eq!(batch.outcomes[1].status, ActionStatus::Executed);
        assert_eq!(batch.outcomes[2].status, ActionStatus::Executed);
        assert!(batch.breaker_tripped.is_some());
    }

    #[tokio::test]
    async fn sms_actions_defer_outside_the_window_instead_of_dropping() {
        let harness = harness(StubDirectory::default(), StubDelivery::default());

        let batch = harness.executor.execute_batch_at(&[followup("c-1")], night()).await;

        let outcome = &batch.outcomes[0];
        assert_eq!(outcome.status, ActionStatus::Deferred);
        let deferred_until = outcome.deferred_until.expect("retry time present");
        assert!(deferred_until > night());
        // Nothing was handed to the channel.
        assert!(harness.delivery.sent.read().await.is_empty());
    }

    #[tokio::test]
    async fn human_task_is_not_deferred_by_the_window() {
        let harness = harness(StubDirectory::default(), StubDelivery::default());
        let action = RecommendedAction::new(
            ContactId("c-stale".to_string()),
            org(),
            ActionType::HumanTask,
            85,
            "handed off 80h ago with no human follow-up",
        );

        let batch = harness.executor.execute_batch_at(&[action], night()).await;

        assert_eq!(batch.outcomes[0].status, ActionStatus::Executed);
        let tasks = harness.escalations.tasks.read().await;
        assert_eq!(tasks.len(), 1);
        assert!(tasks[0].1.contains("no human follow-up"));
    }

    #[tokio::test]
    async fn first_contact_without_a_phone_fails_locally() {
        let now = daytime();
        let mut directory = StubDirectory::default();
        directory.contacts.insert("c-nophone".to_string(), snapshot("c-nophone", None, now));
        let harness = harness(directory, StubDelivery::default());

        let action = RecommendedAction::new(
            ContactId("c-nophone".to_string()),
            org(),
            ActionType::FirstContactSms,
            90,
            "new lead",
        );
        let batch = harness.executor.execute_batch_at(&[action], now).await;

        assert_eq!(batch.outcomes[0].status, ActionStatus::Failed);
        assert!(batch.outcomes[0].detail.contains("no phone number"));
        assert!(harness.sequences.scheduled.read().await.is_empty());
    }

    #[tokio::test]
    async fn due_followup_marks_the_sequencer_item_sent() {
        let harness = harness(StubDirectory::default(), StubDelivery::default());
        let action = RecommendedAction::new(
            ContactId("c-due".to_string()),
            org(),
            ActionType::FollowupDue,
            70,
            "scheduled follow-up was due",
        )
        .with_context("followup_id", json!("fu-9"))
        .with_context("trigger", json!("no_response"))
        .with_context("channel", json!("sms"));

        let batch = harness.executor.execute_batch_at(&[action], daytime()).await;

        assert_eq!(batch.outcomes[0].status, ActionStatus::Executed);
        assert_eq!(harness.sequences.sent.read().await.as_slice(), ["fu-9".to_string()]);
    }

    #[tokio::test]
    async fn full_run_contacts_a_fresh_lead_end_to_end() {
        let now = daytime();
        let lead = snapshot("c-new", Some("+13035550100"), now);
        let mut directory = StubDirectory::default();
        directory.contacts.insert("c-new".to_string(), lead.clone());
        directory.new.push(lead);
        let harness = harness(directory, StubDelivery::default());

        let summary = harness.executor.run_at(Some(&org()), true, now).await;

        assert_eq!(summary.scanned, 1);
        assert_eq!(summary.executed, 1);
        assert_eq!(summary.failed, 0);
        let scheduled = harness.sequences.scheduled.read().await;
        assert_eq!(scheduled.as_slice(), [(
            "new_lead".to_string(),
            "c-new".to_string(),
            "sms".to_string()
        )]);
        assert!(harness.directory.first_contacted.read().await.contains("c-new"));
    }

    #[tokio::test]
    async fn dry_run_produces_recommendations_without_side_effects() {
        let now = daytime();
        let lead = snapshot("c-new", Some("+13035550100"), now);
        let mut directory = StubDirectory::default();
        directory.new.push(lead);
        let harness = harness(directory, StubDelivery::default());

        let summary = harness.executor.run_at(Some(&org()), false, now).await;

        assert_eq!(summary.scanned, 1);
        assert!(summary.outcomes.is_empty());
        assert!(harness.sequences.scheduled.read().await.is_empty());
    }

    #[tokio::test]
    async fn audited_run_records_each_outcome() {
        let now = daytime();
        let lead = snapshot("c-new", Some("+13035550100"), now);
        let mut directory = StubDirectory::default();
        directory.contacts.insert("c-new".to_string(), lead.clone());
        directory.new.push(lead);
        let harness = harness(directory, StubDelivery::default());
        let sink = InMemoryAuditSink::default();

        let summary = harness
            .executor
            .run_with_audit(
                Some(&org()),
                true,
                &sink,
                &AuditContext::new(Some(org()), "run-1", "scheduled-job"),
            )
            .await;

        assert_eq!(summary.executed, 1);
        let events = sink.events();
        assert!(events.iter().any(|event| event.event_type == "scanner.scan_completed"));
        assert!(events.iter().any(|event| event.event_type == "executor.action_executed"));
    }
}
