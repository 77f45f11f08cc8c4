//! Pipeline-stage eligibility. Operator-configured exclusions win over the
//! built-in pattern sets; the built-ins are data so the block and handoff
//! lists can be tested exhaustively.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Eligible,
    Excluded,
    Blocked,
    Handoff,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageEligibility {
    pub eligible: bool,
    pub status: StageStatus,
    pub reason: String,
    pub requires_human: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StageRule {
    /// Never auto-contact: the deal is over or contact is forbidden.
    Blocked,
    /// Still messageable, but a human must be routed in as well.
    Handoff,
}

struct StagePatterns {
    rule: StageRule,
    patterns: &'static [&'static str],
}

/// Matched in order: a stage that reads both "closed" and "showing" is
/// blocked, not handed off.
const STAGE_RULES: &[StagePatterns] = &[
    StagePatterns {
        rule: StageRule::Blocked,
        patterns: &["closed", "sold", "dnc", "do not contact", "trash", "deceased", "archived"],
    },
    StagePatterns {
        rule: StageRule::Handoff,
        patterns: &[
            "showing",
            "appointment",
            "under contract",
            "under agreement",
            "escrow",
            "negotiat",
            "offer",
        ],
    },
];

/// Stages that take a contact out of dormant re-engagement entirely.
const TERMINAL_STAGE_PATTERNS: &[&str] = &["closed", "lost", "trash"];

pub fn evaluate_stage_eligibility(stage: &str, excluded: &[String]) -> StageEligibility {
    let normalized = stage.trim().to_ascii_lowercase();

    // Operator overrides are exact matches and always win.
    if excluded.iter().any(|entry| entry.trim().eq_ignore_ascii_case(&normalized)) {
        return StageEligibility {
            eligible: false,
            status: StageStatus::Excluded,
            reason: format!("stage `{stage}` is excluded by operator configuration"),
            requires_human: false,
        };
    }

    for rule_set in STAGE_RULES {
        if let Some(pattern) =
            rule_set.patterns.iter().find(|pattern| normalized.contains(*pattern))
        {
            return match rule_set.rule {
                StageRule::Blocked => StageEligibility {
                    eligible: false,
                    status: StageStatus::Blocked,
                    reason: format!("stage `{stage}` matches do-not-contact pattern `{pattern}`"),
                    requires_human: false,
                },
                StageRule::Handoff => StageEligibility {
                    eligible: true,
                    status: StageStatus::Handoff,
                    reason: format!(
                        "stage `{stage}` matches handoff pattern `{pattern}`; route a human in"
                    ),
                    requires_human: true,
                },
            };
        }
    }

    StageEligibility {
        eligible: true,
        status: StageStatus::Eligible,
        reason: format!("stage `{stage}` is eligible for automated outreach"),
        requires_human: false,
    }
}

pub fn is_terminal_stage(stage: &str) -> bool {
    let normalized = stage.trim().to_ascii_lowercase();
    TERMINAL_STAGE_PATTERNS.iter().any(|pattern| normalized.contains(pattern))
}
