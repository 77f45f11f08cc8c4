pub mod action;
pub mod consent;
pub mod contact;
pub mod conversation;

pub use action::{ActionType, RecommendedAction};
pub use consent::ConsentRecord;
pub use contact::{ContactId, ContactSnapshot, OrganizationId};
pub use conversation::{ConversationRecord, ConversationState};
