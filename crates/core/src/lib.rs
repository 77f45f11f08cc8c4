pub mod audit;
pub mod collaborators;
pub mod compliance;
pub mod config;
pub mod domain;
pub mod errors;
pub mod executor;
pub mod objections;
pub mod scanner;

pub use audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink};
pub use collaborators::{
    CollaboratorError, ConsentStore, ContactDirectory, DeliveryReceipt, DueFollowup,
    EscalationDesk, MessageDelivery, SendInstruction, SequenceScheduler,
};
pub use compliance::{
    ComplianceConfig, ComplianceGate, ComplianceResult, ComplianceStatus, StageEligibility,
    StageStatus,
};
pub use domain::{
    ActionType, ConsentRecord, ContactId, ContactSnapshot, ConversationRecord, ConversationState,
    OrganizationId, RecommendedAction,
};
pub use errors::{ApplicationError, DomainError};
pub use executor::{ActionExecutor, ActionOutcome, ActionStatus, BatchOutcome, RunSummary};
pub use objections::{
    ObjectionCategory, ObjectionLedger, ObjectionResponse, ObjectionSignal, Sentiment,
    StatedTimeline, Strategy, StrategySelector,
};
pub use scanner::{PriorityScanner, ScanReport, ScanSource, ScannerConfig, SubScanSummary};
