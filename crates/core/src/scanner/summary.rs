//! Conversation summary for resumption messages. The downstream generator
//! gets this so it never re-asks a question the contact already answered.

use crate::domain::ConversationRecord;

/// Qualification topics the conversation flow works through, in the order a
/// summary lists them.
pub const QUALIFICATION_TOPICS: &[&str] = &["timeline", "financing", "search_area", "property_type"];

pub fn conversation_summary(conversation: &ConversationRecord) -> String {
    let mut parts = vec![format!("state: {}", conversation.state.as_str())];

    let answered: Vec<String> = QUALIFICATION_TOPICS
        .iter()
        .filter_map(|topic| {
            conversation
                .qualification
                .get(*topic)
                .map(|answer| format!("{topic}={answer}"))
        })
        .collect();
    if !answered.is_empty() {
        parts.push(format!("answered: {}", answered.join(", ")));
    }

    let open: Vec<&str> = QUALIFICATION_TOPICS
        .iter()
        .copied()
        .filter(|topic| !conversation.qualification.contains_key(*topic))
        .collect();
    if !open.is_empty() {
        parts.push(format!("open: {}", open.join(", ")));
    }

    if !conversation.objections_raised.is_empty() {
        let raised: Vec<&str> =
            conversation.objections_raised.iter().map(|objection| objection.as_str()).collect();
        parts.push(format!("objections: {}", raised.join(", ")));
    }

    parts.join("; ")
}
