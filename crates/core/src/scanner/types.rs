//! Types for the priority scanner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::RecommendedAction;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Bounds each of the three population sub-scans (new/silent/dormant);
    /// each gets a third.
    pub batch_size: usize,
    /// Hard cap on actions returned by one run, independent of batch size.
    pub run_ceiling: usize,
    pub silent_after_hours: i64,
    pub dormant_after_days: i64,
    pub revival_after_days: i64,
    pub stale_handoff_after_hours: i64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            run_ceiling: 100,
            silent_after_hours: 24,
            dormant_after_days: 30,
            revival_after_days: 90,
            stale_handoff_after_hours: 48,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanSource {
    NewLeads,
    SilentLeads,
    DormantLeads,
    DueFollowups,
    StaleHandoffs,
}

impl ScanSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewLeads => "new_leads",
            Self::SilentLeads => "silent_leads",
            Self::DormantLeads => "dormant_leads",
            Self::DueFollowups => "due_followups",
            Self::StaleHandoffs => "stale_handoffs",
        }
    }
}

/// What one sub-scan contributed. A failed sub-scan contributes nothing but
/// keeps its error visible instead of silently vanishing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubScanSummary {
    pub source: ScanSource,
    pub found: usize,
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    /// Sorted by priority descending; ties keep discovery order.
    pub actions: Vec<RecommendedAction>,
    pub sources: Vec<SubScanSummary>,
    pub started_at: DateTime<Utc>,
    /// True when the run ceiling cut candidates off.
    pub truncated: bool,
}

impl ScanReport {
    pub fn had_errors(&self) -> bool {
        self.sources.iter().any(|summary| summary.error.is_some())
    }
}
