use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::contact::{ContactId, OrganizationId};
use crate::errors::DomainError;
use crate::objections::ObjectionCategory;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    Initial,
    Qualifying,
    ObjectionHandling,
    Scheduling,
    Nurture,
    HandedOff,
    Completed,
    Engaged,
}

impl ConversationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Qualifying => "qualifying",
            Self::ObjectionHandling => "objection_handling",
            Self::Scheduling => "scheduling",
            Self::Nurture => "nurture",
            Self::HandedOff => "handed_off",
            Self::Completed => "completed",
            Self::Engaged => "engaged",
        }
    }

    /// States where automated outreach has stepped aside for good.
    pub fn is_terminal_for_automation(&self) -> bool {
        matches!(self, Self::HandedOff | Self::Completed)
    }
}

impl std::str::FromStr for ConversationState {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "initial" => Ok(Self::Initial),
            "qualifying" => Ok(Self::Qualifying),
            "objection_handling" => Ok(Self::ObjectionHandling),
            "scheduling" => Ok(Self::Scheduling),
            "nurture" => Ok(Self::Nurture),
            "handed_off" => Ok(Self::HandedOff),
            "completed" => Ok(Self::Completed),
            "engaged" => Ok(Self::Engaged),
            other => Err(DomainError::UnknownConversationState(other.to_string())),
        }
    }
}

/// One conversation per (contact, organization). Owned by the conversation
/// subsystem; this core reads it to decide tone and priority but never
/// transitions it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub contact_id: ContactId,
    pub organization_id: OrganizationId,
    pub state: ConversationState,
    pub last_ai_message_at: Option<DateTime<Utc>>,
    pub last_human_message_at: Option<DateTime<Utc>>,
    pub last_inbound_at: Option<DateTime<Utc>>,
    pub lead_score: i32,
    pub qualification: BTreeMap<String, String>,
    pub objections_raised: Vec<ObjectionCategory>,
    pub active: bool,
    pub updated_at: DateTime<Utc>,
}

impl ConversationRecord {
    pub fn last_objection(&self) -> Option<ObjectionCategory> {
        self.objections_raised.last().copied()
    }

    /// No inbound message has arrived since our last outbound. An inbound
    /// that predates the outbound does not count as a reply to it.
    pub fn unanswered_since(&self, outbound_at: DateTime<Utc>) -> bool {
        self.last_inbound_at.map_or(true, |inbound| inbound < outbound_at)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::{ConversationRecord, ConversationState};
    use crate::domain::contact::{ContactId, OrganizationId};

    fn record() -> ConversationRecord {
        ConversationRecord {
            contact_id: ContactId("c-1".to_string()),
            organization_id: OrganizationId("org-1".to_string()),
            state: ConversationState::Qualifying,
            last_ai_message_at: None,
            last_human_message_at: None,
            last_inbound_at: None,
            lead_score: 60,
            qualification: Default::default(),
            objections_raised: Vec::new(),
            active: true,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn reply_before_outbound_does_not_count_as_an_answer() {
        let outbound = Utc::now();
        let mut conversation = record();

        conversation.last_inbound_at = Some(outbound - Duration::hours(3));
        assert!(conversation.unanswered_since(outbound));

        conversation.last_inbound_at = Some(outbound + Duration::minutes(10));
        assert!(!conversation.unanswered_since(outbound));

        conversation.last_inbound_at = None;
        assert!(conversation.unanswered_since(outbound));
    }

    #[test]
    fn state_parse_round_trips() {
        for state in [
            ConversationState::Initial,
            ConversationState::Qualifying,
            ConversationState::ObjectionHandling,
            ConversationState::Scheduling,
            ConversationState::Nurture,
            ConversationState::HandedOff,
            ConversationState::Completed,
            ConversationState::Engaged,
        ] {
            let parsed: ConversationState = state.as_str().parse().expect("known state");
            assert_eq!(parsed, state);
        }
        assert!("escalated".parse::<ConversationState>().is_err());
    }
}
