use crate::models::{
    Insight, InsightOccurrence, NotificationMessage, SiteTwinIds, StatusLog, TwinSummary,
};
use anyhow::Result;
use uuid::Uuid;

/// Filter for `InsightStore::load_insights_with_occurrences`. Empty filters
/// match everything.
#[derive(Debug, Clone, Default)]
pub struct InsightQuery {
    pub site_ids: Option<Vec<Uuid>>,
    pub insight_ids: Option<Vec<Uuid>>,
    pub rule_ids: Option<Vec<String>>,
}

impl InsightQuery {
    pub fn by_insight_ids(insight_ids: Vec<Uuid>) -> Self {
        Self {
            insight_ids: Some(insight_ids),
            ..Self::default()
        }
    }

    pub fn by_site_ids(site_ids: Vec<Uuid>) -> Self {
        Self {
            site_ids: Some(site_ids),
            ..Self::default()
        }
    }
}

/// Persistence contract. Implementations are expected to persist an
/// insight's full sub-graph (occurrences, status logs, impact scores,
/// dependencies) atomically per save.
#[allow(async_fn_in_trait)]
pub trait InsightStore {
    /// Load a single insight with its sub-graph. `include_deleted` bypasses
    /// the soft-delete filter.
    async fn load_insight(&self, insight_id: Uuid, include_deleted: bool)
        -> Result<Option<Insight>>;

    async fn load_insights_with_occurrences(&self, query: InsightQuery) -> Result<Vec<Insight>>;

    /// Active, unresolved insights matching the creation dedup key: same
    /// site, twin, and name, with status `New | Open | ReadyToResolve` and
    /// state `Active`.
    async fn active_unique_insights(
        &self,
        site_id: Uuid,
        twin_id: Option<&str>,
        name: &str,
    ) -> Result<Vec<Insight>>;

    async fn last_occurrence(&self, insight_id: Uuid) -> Result<Option<InsightOccurrence>>;

    /// Faulted occurrence with the latest `started`, if any.
    async fn last_faulty_occurrence(&self, insight_id: Uuid)
        -> Result<Option<InsightOccurrence>>;

    async fn save_insight(&self, insight: &Insight, status_logs: &[StatusLog]) -> Result<()>;

    async fn save_insights(&self, insights: &[Insight], status_logs: &[StatusLog]) -> Result<()>;

    /// Next human-facing sequence number for the prefix, `PREFIX-I-n`.
    async fn generate_sequence_number(&self, prefix: &str) -> Result<String>;
}

/// Ticket/workflow collaborator, consulted during `InProgress -> Resolved`
/// transitions.
#[allow(async_fn_in_trait)]
pub trait WorkflowApi {
    async fn has_open_tickets(&self, insight_id: Uuid) -> Result<bool>;
}

/// Twin-name resolution collaborator. Batched; results are cached by the
/// resolver in front of it.
#[allow(async_fn_in_trait)]
pub trait TwinApi {
    async fn twins_by_ids(&self, requests: Vec<SiteTwinIds>) -> Result<Vec<TwinSummary>>;
}

/// Notification delivery. Fire-and-forget from the orchestrator's
/// perspective; failures are logged, never propagated.
#[allow(async_fn_in_trait)]
pub trait NotificationSink {
    async fn notify(&self, message: NotificationMessage) -> Result<()>;
}
