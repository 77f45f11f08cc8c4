//! Response script pools. Selection falls through pool by pool so a chosen
//! strategy never comes back empty-handed: (category, strategy) pool, then
//! the strategy's default pool, then one universal sentence.

use rand::seq::SliceRandom;

use super::{ObjectionCategory, Strategy};

pub const UNIVERSAL_FALLBACK: &str =
    "Totally understand. I'll step back for now, and I'm here whenever the timing feels right.";

fn category_pool(category: ObjectionCategory, strategy: Strategy) -> &'static [&'static str] {
    use ObjectionCategory::*;
    use Strategy::*;

    match (category, strategy) {
        (AlreadyHasAgent, AcknowledgeAndRespect) => &[
            "Sounds like you're in good hands. I'll step out of the way, and best of luck with the search!",
            "Good to hear you have someone working for you already. If anything changes down the road, I'm easy to find.",
        ],
        (NotInterested, AcknowledgeAndRespect) => &[
            "No problem at all. I'll close this out on my end, and thanks for letting me know.",
            "Understood, I appreciate the straight answer. I won't keep messaging you.",
        ],
        (NotReady, FutureFocus) => &[
            "That makes sense, timing is everything with a move. Want me to check back in a few months instead?",
            "No rush at all. Markets shift, so I'll keep an eye out and reach back out when it's more useful.",
        ],
        (NotReady, SoftPivot) => &[
            "Totally fair. Out of curiosity, what would need to change for the timing to feel right?",
            "Makes sense. While you wait, would it help to see what homes like yours have been doing lately?",
        ],
        (PriceTooHigh, ValueAdd) => &[
            "I hear you, prices are a lot right now. There are a few neighborhoods where the numbers work better, want me to send those?",
            "Fair concern. A lot depends on the monthly payment picture; I can run a quick comparison if that's useful.",
        ],
        (PriceTooHigh, InformationOffer) => &[
            "Understood. If it helps, I can share what similar homes actually closed for versus asking price.",
        ],
        (FinancingWorry, InformationOffer) => &[
            "That's a common worry, and there are more programs out there than most people expect. Want me to connect you with a lender who can lay out options, no pressure?",
            "Completely understandable. A quick pre-qual chat usually costs nothing and clears a lot up, I can point you to someone good.",
        ],
        (BadTiming, FutureFocus) => &[
            "Got it, now's not the moment. I'll check back when things calm down, just tell me when works.",
        ],
        (BadTiming, ValueAdd) => &[
            "Understood. One thing worth knowing: this season has actually been favorable for buyers like you. Happy to share the quick version whenever.",
        ],
        (NeedsSpouse, EmpathyConnect) => &[
            "Of course, it's a decision you make together. Happy to answer questions for both of you whenever you're ready.",
            "Makes total sense. If it would help to have the numbers in one place to talk over together, I can put that together.",
        ],
        (HadBadExperience, EmpathyConnect) => &[
            "I'm sorry you went through that. No pitch from me, just here if you ever want a second opinion.",
            "That's rough, and I get why you'd be cautious. If you ever want to talk through what went wrong, I'm happy to listen.",
        ],
        (JustBrowsing, InformationOffer) => &[
            "Browsing is the fun part! I can set up a no-pressure feed of homes that match what you're looking at, want that?",
        ],
        _ => &[],
    }
}

fn strategy_pool(strategy: Strategy) -> &'static [&'static str] {
    use Strategy::*;

    match strategy {
        AcknowledgeAndRespect => &[
            "Completely understood, and thanks for telling me. I'll respect that.",
            "Got it. I'll step back, no hard feelings at all.",
        ],
        SoftPivot => &[
            "Fair enough. Can I ask what the biggest factor is for you right now?",
        ],
        ValueAdd => &[
            "Understood. Before I go quiet, want me to send over the latest numbers for your area? Some of them surprise people.",
        ],
        FutureFocus => &[
            "No problem. I'll check back down the road, and feel free to ping me sooner if anything changes.",
        ],
        InformationOffer => &[
            "Happy to just be a resource. Want me to send some information over, zero commitment?",
        ],
        EmpathyConnect => &[
            "That makes sense, and I appreciate you sharing it. I'm here if and when it's useful.",
        ],
        GracefulExit => &[
            "Understood, I'll leave you be. Wishing you the best, and my door's open if that ever changes.",
            "Thanks for being upfront. I'll close this out; reach out anytime if things change.",
        ],
    }
}

/// Draw a script for the chosen strategy. Never returns an empty string.
pub fn draw(category: ObjectionCategory, strategy: Strategy) -> String {
    let mut rng = rand::thread_rng();

    if let Some(script) = category_pool(category, strategy).choose(&mut rng) {
        return (*script).to_string();
    }
    if let Some(script) = strategy_pool(strategy).choose(&mut rng) {
        return (*script).to_string();
    }
    UNIVERSAL_FALLBACK.to_string()
}

#[cfg(test)]
mod tests {
    use super::{draw, strategy_pool};
    use crate::objections::{ObjectionCategory, Strategy};

    #[test]
    fn every_strategy_has_a_default_pool() {
        for strategy in [
            Strategy::AcknowledgeAndRespect,
            Strategy::SoftPivot,
            Strategy::ValueAdd,
            Strategy::FutureFocus,
            Strategy::InformationOffer,
            Strategy::EmpathyConnect,
            Strategy::GracefulExit,
        ] {
            assert!(!strategy_pool(strategy).is_empty(), "{strategy:?} pool is empty");
        }
    }

    #[test]
    fn draw_never_returns_an_empty_script() {
        for category in [
            ObjectionCategory::AlreadyHasAgent,
            ObjectionCategory::NotInterested,
            ObjectionCategory::Loyalty,
            ObjectionCategory::NotReady,
            ObjectionCategory::NeedTime,
            ObjectionCategory::JustBrowsing,
            ObjectionCategory::PriceTooHigh,
            ObjectionCategory::FinancingWorry,
            ObjectionCategory::BadTiming,
            ObjectionCategory::NeedsSpouse,
            ObjectionCategory::HadBadExperience,
        ] {
            for strategy in [
                Strategy::AcknowledgeAndRespect,
                Strategy::SoftPivot,
                Strategy::ValueAdd,
                Strategy::FutureFocus,
                Strategy::InformationOffer,
                Strategy::EmpathyConnect,
                Strategy::GracefulExit,
            ] {
                assert!(!draw(category, strategy).is_empty());
            }
        }
    }
}
