use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Impact-score field ids that carry the 0-100 priority score.
pub const PRIORITY_FIELD_IDS: [&str; 2] = ["priority", "priority_impact"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightStatus {
    New,
    Open,
    InProgress,
    ReadyToResolve,
    Resolved,
    Ignored,
    Deleted,
}

impl InsightStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::ReadyToResolve => "ready_to_resolve",
            Self::Resolved => "resolved",
            Self::Ignored => "ignored",
            Self::Deleted => "deleted",
        }
    }

    /// Statuses counted as "active" by the statistics rollups.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            Self::New | Self::Open | Self::InProgress | Self::ReadyToResolve
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightState {
    Active,
    Archived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightType {
    Alert,
    Fault,
    Energy,
    Alarm,
    Note,
    GoldenStandard,
    Infrastructure,
    IntegrityKpi,
    EnergyKpi,
    Commissioning,
    Comfort,
    Wellness,
    Diagnostic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Platform,
    App,
    Inspection,
}

impl SourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Platform => "platform",
            Self::App => "app",
            Self::Inspection => "inspection",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactScore {
    pub field_id: String,
    pub name: String,
    pub value: f64,
    pub unit: Option<String>,
    pub external_id: Option<String>,
}

impl ImpactScore {
    pub fn is_priority(&self) -> bool {
        PRIORITY_FIELD_IDS
            .iter()
            .any(|field_id| self.field_id.eq_ignore_ascii_case(field_id))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightOccurrence {
    pub id: Uuid,
    pub insight_id: Uuid,
    pub started: DateTime<Utc>,
    /// `None` means the occurrence is still open.
    pub ended: Option<DateTime<Utc>>,
    pub is_faulted: bool,
    pub is_valid: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusLog {
    pub id: Uuid,
    pub insight_id: Uuid,
    pub status: InsightStatus,
    pub reason: Option<String>,
    pub source_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub priority: i32,
    pub occurrence_count: i64,
    pub created_at: DateTime<Utc>,
}

impl StatusLog {
    /// Snapshot a status change against the insight's current priority and
    /// occurrence count.
    pub fn record(
        insight: &Insight,
        status: InsightStatus,
        reason: Option<String>,
        source_id: Option<Uuid>,
        user_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            insight_id: insight.id,
            status,
            reason,
            source_id,
            user_id,
            priority: insight.priority,
            occurrence_count: insight.occurrence_count,
            created_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub from_insight_id: Uuid,
    pub to_insight_id: Uuid,
    pub relationship: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub id: Uuid,
    pub site_id: Uuid,
    pub twin_id: Option<String>,
    pub twin_name: Option<String>,
    pub floor_id: Option<Uuid>,
    pub primary_model_id: Option<String>,
    pub insight_type: InsightType,
    pub name: String,
    pub description: String,
    pub recommendation: Option<String>,
    pub priority: i32,
    pub status: InsightStatus,
    pub state: InsightState,
    pub occurrence_count: i64,
    pub last_occurred_date: DateTime<Utc>,
    pub detected_date: DateTime<Utc>,
    pub created_date: DateTime<Utc>,
    pub updated_date: DateTime<Utc>,
    pub source_type: SourceType,
    pub source_id: Option<Uuid>,
    pub created_user_id: Option<Uuid>,
    pub external_id: Option<String>,
    pub rule_id: Option<String>,
    pub rule_name: Option<String>,
    pub sequence_number: String,
    pub impact_scores: Vec<ImpactScore>,
    pub dependencies: Vec<Dependency>,
    pub occurrences: Vec<InsightOccurrence>,
    pub status_logs: Vec<StatusLog>,
}

/// Creation request. `occurrence_count`, `occurrences`, and `dependencies`
/// are taken as reported by the detection source.
#[derive(Debug, Clone)]
pub struct NewInsight {
    pub site_id: Uuid,
    pub twin_id: Option<String>,
    pub insight_type: InsightType,
    pub name: String,
    pub description: String,
    pub recommendation: Option<String>,
    pub priority: i32,
    pub state: InsightState,
    pub occurred_date: DateTime<Utc>,
    pub detected_date: DateTime<Utc>,
    pub source_type: SourceType,
    pub source_id: Option<Uuid>,
    pub created_user_id: Option<Uuid>,
    pub external_id: Option<String>,
    pub rule_id: Option<String>,
    pub rule_name: Option<String>,
    pub primary_model_id: Option<String>,
    pub occurrence_count: i64,
    pub impact_scores: Vec<ImpactScore>,
    pub occurrences: Vec<InsightOccurrence>,
    pub dependencies: Vec<Dependency>,
    pub sequence_number_prefix: String,
}

/// Partial update. `None` means "field not supplied"; no field supports an
/// explicit clear.
#[derive(Debug, Clone, Default)]
pub struct InsightPatch {
    pub status: Option<InsightStatus>,
    pub reason: Option<String>,
    pub source_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub recommendation: Option<String>,
    pub impact_scores: Option<Vec<ImpactScore>>,
    pub priority: Option<i32>,
    pub insight_type: Option<InsightType>,
    pub state: Option<InsightState>,
    pub occurrences: Option<Vec<InsightOccurrence>>,
    pub occurred_date: Option<DateTime<Utc>>,
    pub detected_date: Option<DateTime<Utc>>,
    pub occurrence_count: Option<i64>,
    pub external_id: Option<String>,
    pub primary_model_id: Option<String>,
    pub rule_name: Option<String>,
    pub dependencies: Option<Vec<Dependency>>,
}

#[derive(Debug, Clone)]
pub struct BatchStatusUpdate {
    pub site_id: Uuid,
    pub ids: Vec<Uuid>,
    pub status: InsightStatus,
    pub reason: Option<String>,
    pub source_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticsSnapshot {
    pub id: Uuid,
    pub name: String,
    pub rule_name: Option<String>,
    /// `true` when the node's representative occurrence is not faulted.
    pub check: bool,
    pub started: Option<DateTime<Utc>>,
    pub ended: Option<DateTime<Utc>>,
    pub diagnostics: Vec<DiagnosticsSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticPoint {
    pub timestamp: DateTime<Utc>,
    pub is_faulted: bool,
}

/// One row of the flattened, time-bucketed diagnostics view used for
/// charting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsightDiagnostic {
    pub id: Uuid,
    pub name: String,
    pub rule_name: Option<String>,
    pub parent_id: Option<Uuid>,
    pub started: DateTime<Utc>,
    pub ended: DateTime<Utc>,
    pub occurrence_liveness: Vec<DiagnosticPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwinSummary {
    pub id: String,
    pub site_id: Uuid,
    pub name: Option<String>,
    pub model_id: Option<String>,
    pub floor_id: Option<Uuid>,
    pub unique_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct SiteTwinIds {
    pub site_id: Uuid,
    pub twin_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationMessage {
    pub source: &'static str,
    pub source_id: String,
    pub title: String,
    pub property_bag: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsightActivity {
    pub timestamp: DateTime<Utc>,
    pub status_log: Option<StatusLog>,
    pub occurrence: Option<InsightOccurrence>,
}
