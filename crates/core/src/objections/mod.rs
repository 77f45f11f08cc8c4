//! Objection policy: given a classified objection and its conversation
//! context, pick a response strategy, draw a script, and derive secondary
//! effects. Everything comes back as data; the caller applies state changes.

pub mod rules;
pub mod scripts;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::contact::ContactId;
use crate::errors::DomainError;

/// Closed set of objection categories. Classification happens upstream; this
/// core only consumes the label.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectionCategory {
    AlreadyHasAgent,
    NotInterested,
    Loyalty,
    NotReady,
    NeedTime,
    JustBrowsing,
    PriceTooHigh,
    FinancingWorry,
    BadTiming,
    NeedsSpouse,
    HadBadExperience,
}

impl ObjectionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AlreadyHasAgent => "already_has_agent",
            Self::NotInterested => "not_interested",
            Self::Loyalty => "loyalty",
            Self::NotReady => "not_ready",
            Self::NeedTime => "need_time",
            Self::JustBrowsing => "just_browsing",
            Self::PriceTooHigh => "price_too_high",
            Self::FinancingWorry => "financing_worry",
            Self::BadTiming => "bad_timing",
            Self::NeedsSpouse => "needs_spouse",
            Self::HadBadExperience => "had_bad_experience",
        }
    }
}

impl std::str::FromStr for ObjectionCategory {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "already_has_agent" => Ok(Self::AlreadyHasAgent),
            "not_interested" => Ok(Self::NotInterested),
            "loyalty" => Ok(Self::Loyalty),
            "not_ready" => Ok(Self::NotReady),
            "need_time" => Ok(Self::NeedTime),
            "just_browsing" => Ok(Self::JustBrowsing),
            "price_too_high" => Ok(Self::PriceTooHigh),
            "financing_worry" => Ok(Self::FinancingWorry),
            "bad_timing" => Ok(Self::BadTiming),
            "needs_spouse" => Ok(Self::NeedsSpouse),
            "had_bad_experience" => Ok(Self::HadBadExperience),
            other => Err(DomainError::UnknownObjectionCategory(other.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Negative,
    Neutral,
    Positive,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatedTimeline {
    Short,
    Medium,
    Long,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    AcknowledgeAndRespect,
    SoftPivot,
    ValueAdd,
    FutureFocus,
    InformationOffer,
    EmpathyConnect,
    GracefulExit,
}

/// One classified inbound objection plus the context the policy needs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectionSignal {
    pub contact_id: ContactId,
    pub category: ObjectionCategory,
    pub sentiment: Sentiment,
    pub lead_score: i32,
    pub stated_timeline: Option<StatedTimeline>,
}

/// The chosen strategy and its secondary effects, returned as data for the
/// caller to apply. This component never mutates the contact record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectionResponse {
    pub strategy: Strategy,
    pub script: String,
    pub should_follow_up: bool,
    pub follow_up_delay_days: Option<u32>,
    pub tags: Vec<String>,
    pub nurture: bool,
    pub mark_closed: bool,
    pub objection_count: usize,
    pub same_objection_count: usize,
}

/// In-process ledger of objections observed per contact. This is a cache of
/// state the conversation store persists: it must be rebuildable via
/// [`ObjectionLedger::rehydrate`] and no decision may depend on it surviving
/// a process restart.
#[derive(Clone, Debug, Default)]
pub struct ObjectionLedger {
    entries: HashMap<String, Vec<ObjectionCategory>>,
}

impl ObjectionLedger {
    pub fn record(&mut self, contact: &ContactId, category: ObjectionCategory) {
        self.entries.entry(contact.0.clone()).or_default().push(category);
    }

    pub fn objection_count(&self, contact: &ContactId) -> usize {
        self.entries.get(&contact.0).map(Vec::len).unwrap_or(0)
    }

    pub fn same_objection_count(&self, contact: &ContactId, category: ObjectionCategory) -> usize {
        self.entries
            .get(&contact.0)
            .map(|history| history.iter().filter(|entry| **entry == category).count())
            .unwrap_or(0)
    }

    /// Replace this contact's in-memory history with the persisted one.
    pub fn rehydrate(&mut self, contact: &ContactId, history: &[ObjectionCategory]) {
        self.entries.insert(contact.0.clone(), history.to_vec());
    }

    pub fn forget(&mut self, contact: &ContactId) {
        self.entries.remove(&contact.0);
    }
}

#[derive(Debug, Default)]
pub struct StrategySelector {
    ledger: ObjectionLedger,
}

impl StrategySelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild one contact's ledger entry from persisted history, e.g. after
    /// a process restart.
    pub fn rehydrate(&mut self, contact: &ContactId, history: &[ObjectionCategory]) {
        self.ledger.rehydrate(contact, history);
    }

    /// Record the objection and choose how to respond.
    pub fn respond(&mut self, signal: &ObjectionSignal) -> ObjectionResponse {
        self.ledger.record(&signal.contact_id, signal.category);
        let objection_count = self.ledger.objection_count(&signal.contact_id);
        let same_objection_count =
            self.ledger.same_objection_count(&signal.contact_id, signal.category);

        let strategy =
            select_strategy(signal, objection_count, same_objection_count);
        let script = scripts::draw(signal.category, strategy);

        let mut response = ObjectionResponse {
            strategy,
            script,
            should_follow_up: true,
            follow_up_delay_days: None,
            tags: Vec::new(),
            nurture: false,
            mark_closed: false,
            objection_count,
            same_objection_count,
        };
        apply_secondary_effects(signal, same_objection_count, &mut response);
        response
    }
}

/// Strategy selection, in fixed precedence order.
fn select_strategy(
    signal: &ObjectionSignal,
    objection_count: usize,
    same_objection_count: usize,
) -> Strategy {
    // 1. A contact who is both negative and repeatedly objecting wants out.
    if signal.sentiment == Sentiment::Negative && objection_count >= 2 {
        return Strategy::GracefulExit;
    }

    // 2. Same objection again: consult the repeat table, exit by default.
    if same_objection_count >= 2 {
        return rules::repeat_objection_strategy(signal.category)
            .unwrap_or(Strategy::GracefulExit);
    }

    // 3. Hot leads earn a little persistence on timing objections.
    if signal.lead_score >= rules::HIGH_INTENT_LEAD_SCORE {
        if let Some(strategy) = rules::hot_lead_override(signal.category) {
            return strategy;
        }
    }

    // 4. First-time objection.
    match rules::first_objection_strategy(signal.category) {
        Some(strategy) => strategy,
        None if rules::ALWAYS_EXIT_CATEGORIES.contains(&signal.category) => {
            Strategy::AcknowledgeAndRespect
        }
        None => Strategy::ValueAdd,
    }
}

fn apply_secondary_effects(
    signal: &ObjectionSignal,
    same_objection_count: usize,
    response: &mut ObjectionResponse,
) {
    if response.strategy == Strategy::GracefulExit
        || signal.category == ObjectionCategory::AlreadyHasAgent
    {
        response.should_follow_up = false;
        response.nurture = true;
        response.tags.push(rules::LONG_NURTURE_TAG.to_string());
    }

    if signal.category == ObjectionCategory::NotInterested && same_objection_count >= 2 {
        response.mark_closed = true;
        response.should_follow_up = false;
    }

    if response.should_follow_up {
        if matches!(
            signal.category,
            ObjectionCategory::PriceTooHigh | ObjectionCategory::FinancingWorry
        ) {
            response.follow_up_delay_days = Some(rules::FINANCING_FOLLOW_UP_DELAY_DAYS);
            response.tags.push(rules::FINANCING_TAG.to_string());
        }

        // A stated long timeline overrides whatever cadence the category set.
        if signal.stated_timeline == Some(StatedTimeline::Long) {
            response.follow_up_delay_days = Some(rules::LONG_TIMELINE_DELAY_DAYS);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ObjectionCategory, ObjectionSignal, Sentiment, StatedTimeline, Strategy, StrategySelector,
    };
    use crate::domain::contact::ContactId;

    fn signal(category: ObjectionCategory) -> ObjectionSignal {
        ObjectionSignal {
            contact_id: ContactId("c-1".to_string()),
            category,
            sentiment: Sentiment::Neutral,
            lead_score: 40,
            stated_timeline: None,
        }
    }

    #[test]
    fn repeated_objection_without_override_exits_gracefully() {
        let mut selector = StrategySelector::new();

        let first = selector.respond(&signal(ObjectionCategory::JustBrowsing));
        assert_eq!(first.strategy, Strategy::InformationOffer);
        assert!(first.should_follow_up);

        let second = selector.respond(&signal(ObjectionCategory::JustBrowsing));
        assert_eq!(second.strategy, Strategy::GracefulExit);
        assert!(!second.should_follow_up);
        assert_eq!(second.same_objection_count, 2);
    }

    #[test]
    fn repeated_objection_with_override_uses_the_repeat_table() {
        let mut selector = StrategySelector::new();

        selector.respond(&signal(ObjectionCategory::PriceTooHigh));
        let second = selector.respond(&signal(ObjectionCategory::PriceTooHigh));
        assert_eq!(second.strategy, Strategy::InformationOffer);
    }

    #[test]
    fn negative_sentiment_with_multiple_objections_forces_exit() {
        let mut selector = StrategySelector::new();
        selector.respond(&signal(ObjectionCategory::PriceTooHigh));

        let mut second = signal(ObjectionCategory::BadTiming);
        second.sentiment = Sentiment::Negative;
        second.lead_score = 95; // even a hot lead does not override the exit

        let response = selector.respond(&second);
        assert_eq!(response.strategy, Strategy::GracefulExit);
    }

    #[test]
    fn hot_lead_gets_persistence_on_timing_objections() {
        let mut selector = StrategySelector::new();

        let mut hot = signal(ObjectionCategory::NotReady);
        hot.lead_score = 85;
        assert_eq!(selector.respond(&hot).strategy, Strategy::SoftPivot);

        let mut selector = StrategySelector::new();
        let mut hot_timing = signal(ObjectionCategory::BadTiming);
        hot_timing.lead_score = 70;
        assert_eq!(selector.respond(&hot_timing).strategy, Strategy::ValueAdd);

        let mut selector = StrategySelector::new();
        let cool = signal(ObjectionCategory::NotReady);
        assert_eq!(selector.respond(&cool).strategy, Strategy::FutureFocus);
    }

    #[test]
    fn always_exit_categories_acknowledge_on_first_contact() {
        let mut selector = StrategySelector::new();
        let response = selector.respond(&signal(ObjectionCategory::AlreadyHasAgent));

        assert_eq!(response.strategy, Strategy::AcknowledgeAndRespect);
        assert!(!response.should_follow_up);
        assert!(response.nurture);
        assert!(response.tags.iter().any(|tag| tag.contains("nurture")));
    }

    #[test]
    fn second_not_interested_marks_the_contact_closed() {
        let mut selector = StrategySelector::new();
        selector.respond(&signal(ObjectionCategory::NotInterested));

        let second = selector.respond(&signal(ObjectionCategory::NotInterested));
        assert!(second.mark_closed);
        assert!(!second.should_follow_up);
    }

    #[test]
    fn financial_objection_schedules_a_thirty_day_follow_up() {
        let mut selector = StrategySelector::new();
        let response = selector.respond(&signal(ObjectionCategory::FinancingWorry));

        assert_eq!(response.follow_up_delay_days, Some(30));
        assert!(response.tags.iter().any(|tag| tag == "needs_financing_help"));
        assert!(response.should_follow_up);
    }

    #[test]
    fn stated_long_timeline_overrides_the_delay() {
        let mut selector = StrategySelector::new();
        let mut browsing = signal(ObjectionCategory::JustBrowsing);
        browsing.stated_timeline = Some(StatedTimeline::Long);

        let response = selector.respond(&browsing);
        assert_eq!(response.follow_up_delay_days, Some(30));
    }

    #[test]
    fn script_is_never_empty() {
        let mut selector = StrategySelector::new();
        for category in [
            ObjectionCategory::AlreadyHasAgent,
            ObjectionCategory::NeedsSpouse,
            ObjectionCategory::Loyalty,
        ] {
            let response = selector.respond(&signal(category));
            assert!(!response.script.is_empty());
        }
    }

    #[test]
    fn rehydrated_selector_decides_like_the_one_that_never_restarted() {
        // First process: two objections land.
        let mut original = StrategySelector::new();
        original.respond(&signal(ObjectionCategory::NotReady));
        original.respond(&signal(ObjectionCategory::PriceTooHigh));
        let continued = original.respond(&signal(ObjectionCategory::PriceTooHigh));

        // Restarted process: ledger rebuilt from the persisted history.
        let mut restarted = StrategySelector::new();
        restarted.rehydrate(
            &ContactId("c-1".to_string()),
            &[ObjectionCategory::NotReady, ObjectionCategory::PriceTooHigh],
        );
        let after_restart = restarted.respond(&signal(ObjectionCategory::PriceTooHigh));

        assert_eq!(continued.strategy, after_restart.strategy);
        assert_eq!(continued.should_follow_up, after_restart.should_follow_up);
        assert_eq!(continued.follow_up_delay_days, after_restart.follow_up_delay_days);
        assert_eq!(continued.same_objection_count, after_restart.same_objection_count);
    }
}
