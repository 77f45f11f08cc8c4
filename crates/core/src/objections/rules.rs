//! Objection policy tables. These are data: the selection logic in the
//! parent module only consults them, so the policy can be unit-tested (and
//! eventually operator-tuned) without touching control flow.

use super::{ObjectionCategory, Strategy};

/// Lead score at or above which we do not give up easily.
pub const HIGH_INTENT_LEAD_SCORE: i32 = 70;

/// Days before the follow-up for a financial objection.
pub const FINANCING_FOLLOW_UP_DELAY_DAYS: u32 = 30;

/// Days before the follow-up when the contact states a long timeline.
pub const LONG_TIMELINE_DELAY_DAYS: u32 = 30;

pub const LONG_NURTURE_TAG: &str = "nurture_60_90_day";
pub const FINANCING_TAG: &str = "needs_financing_help";

/// Categories where the only respectful first response is to acknowledge and
/// step back.
pub const ALWAYS_EXIT_CATEGORIES: &[ObjectionCategory] = &[
    ObjectionCategory::AlreadyHasAgent,
    ObjectionCategory::NotInterested,
    ObjectionCategory::Loyalty,
];

pub fn first_objection_strategy(category: ObjectionCategory) -> Option<Strategy> {
    use ObjectionCategory::*;

    match category {
        NotReady => Some(Strategy::FutureFocus),
        NeedTime => Some(Strategy::FutureFocus),
        JustBrowsing => Some(Strategy::InformationOffer),
        PriceTooHigh => Some(Strategy::ValueAdd),
        FinancingWorry => Some(Strategy::InformationOffer),
        BadTiming => Some(Strategy::FutureFocus),
        NeedsSpouse => Some(Strategy::EmpathyConnect),
        HadBadExperience => Some(Strategy::EmpathyConnect),
        AlreadyHasAgent | NotInterested | Loyalty => None,
    }
}

/// Second-and-later occurrences of the same objection. Softer and
/// exit-biased: a category with no entry here exits gracefully.
pub fn repeat_objection_strategy(category: ObjectionCategory) -> Option<Strategy> {
    use ObjectionCategory::*;

    match category {
        NotReady | NeedTime => Some(Strategy::FutureFocus),
        PriceTooHigh => Some(Strategy::InformationOffer),
        _ => None,
    }
}

/// Persistence overrides for hot leads on their first pass through a
/// category.
pub fn hot_lead_override(category: ObjectionCategory) -> Option<Strategy> {
    use ObjectionCategory::*;

    match category {
        NotReady | NeedTime => Some(Strategy::SoftPivot),
        BadTiming => Some(Strategy::ValueAdd),
        _ => None,
    }
}
