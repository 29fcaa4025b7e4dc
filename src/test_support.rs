use crate::models::{
    Insight, InsightOccurrence, InsightState, InsightStatus, InsightType, NotificationMessage,
    SiteTwinIds, SourceType, StatusLog, TwinSummary,
};
use crate::store::{InsightQuery, InsightStore, NotificationSink, TwinApi, WorkflowApi};
use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
}

pub fn insight_fixture(status: InsightStatus) -> Insight {
    Insight {
        id: Uuid::new_v4(),
        site_id: Uuid::new_v4(),
        twin_id: None,
        twin_name: None,
        floor_id: None,
        primary_model_id: None,
        insight_type: InsightType::Fault,
        name: "supply fan fault".to_string(),
        description: "supply fan not running while commanded on".to_string(),
        recommendation: None,
        priority: 3,
        status,
        state: InsightState::Active,
        occurrence_count: 0,
        last_occurred_date: epoch(),
        detected_date: epoch(),
        created_date: epoch(),
        updated_date: epoch(),
        source_type: SourceType::App,
        source_id: Some(Uuid::new_v4()),
        created_user_id: None,
        external_id: None,
        rule_id: Some("supply-fan-fault".to_string()),
        rule_name: Some("Supply Fan Fault".to_string()),
        sequence_number: "HQ-I-1".to_string(),
        impact_scores: Vec::new(),
        dependencies: Vec::new(),
        occurrences: Vec::new(),
        status_logs: Vec::new(),
    }
}

pub fn occurrence_between(
    insight_id: Uuid,
    started: DateTime<Utc>,
    ended: Option<DateTime<Utc>>,
    is_faulted: bool,
) -> InsightOccurrence {
    InsightOccurrence {
        id: Uuid::new_v4(),
        insight_id,
        started,
        ended,
        is_faulted,
        is_valid: true,
    }
}

pub fn occurrence_at(
    insight_id: Uuid,
    started: DateTime<Utc>,
    is_faulted: bool,
) -> InsightOccurrence {
    occurrence_between(insight_id, started, Some(started + Duration::hours(1)), is_faulted)
}

pub fn status_log_at(insight: &Insight, status: InsightStatus, at: DateTime<Utc>) -> StatusLog {
    StatusLog::record(insight, status, None, insight.source_id, None, at)
}

pub fn twin_summary(twin_id: &str, site_id: Uuid) -> TwinSummary {
    TwinSummary {
        id: twin_id.to_string(),
        site_id,
        name: Some("Air Handler 1".to_string()),
        model_id: Some("dtmi:example:AirHandler;1".to_string()),
        floor_id: Some(Uuid::new_v4()),
        unique_id: Some(Uuid::new_v4()),
    }
}

#[derive(Default)]
pub struct MockStore {
    insights: Mutex<HashMap<Uuid, Insight>>,
    saved_logs: Mutex<Vec<StatusLog>>,
    sequence: AtomicU64,
}

impl MockStore {
    pub fn with_insights(insights: Vec<Insight>) -> Self {
        let store = Self::default();
        {
            let mut map = store.insights.lock().unwrap();
            for insight in insights {
                map.insert(insight.id, insight);
            }
        }
        store
    }

    pub fn insight(&self, insight_id: Uuid) -> Insight {
        self.insights
            .lock()
            .unwrap()
            .get(&insight_id)
            .cloned()
            .expect("insight stored")
    }

    pub fn insight_count(&self) -> usize {
        self.insights.lock().unwrap().len()
    }

    pub fn logs(&self) -> Vec<StatusLog> {
        self.saved_logs.lock().unwrap().clone()
    }
}

impl InsightStore for MockStore {
    async fn load_insight(
        &self,
        insight_id: Uuid,
        include_deleted: bool,
    ) -> Result<Option<Insight>> {
        let map = self.insights.lock().unwrap();
        Ok(map
            .get(&insight_id)
            .filter(|insight| include_deleted || insight.status != InsightStatus::Deleted)
            .cloned())
    }

    async fn load_insights_with_occurrences(&self, query: InsightQuery) -> Result<Vec<Insight>> {
        let map = self.insights.lock().unwrap();
        let mut insights: Vec<Insight> = map
            .values()
            .filter(|insight| {
                query
                    .site_ids
                    .as_ref()
                    .map_or(true, |ids| ids.contains(&insight.site_id))
                    && query
                        .insight_ids
                        .as_ref()
                        .map_or(true, |ids| ids.contains(&insight.id))
                    && query.rule_ids.as_ref().map_or(true, |ids| {
                        insight
                            .rule_id
                            .as_ref()
                            .map_or(false, |rule_id| ids.contains(rule_id))
                    })
            })
            .cloned()
            .collect();
        insights.sort_by_key(|insight| insight.id);
        Ok(insights)
    }

    async fn active_unique_insights(
        &self,
        site_id: Uuid,
        twin_id: Option<&str>,
        name: &str,
    ) -> Result<Vec<Insight>> {
        use crate::models::InsightStatus::*;
        let map = self.insights.lock().unwrap();
        Ok(map
            .values()
            .filter(|insight| {
                insight.site_id == site_id
                    && insight.twin_id.as_deref() == twin_id
                    && insight.name == name
                    && matches!(insight.status, New | Open | ReadyToResolve)
                    && insight.state == InsightState::Active
            })
            .cloned()
            .collect())
    }

    async fn last_occurrence(&self, insight_id: Uuid) -> Result<Option<InsightOccurrence>> {
        let map = self.insights.lock().unwrap();
        Ok(map.get(&insight_id).and_then(|insight| {
            insight
                .occurrences
                .iter()
                .max_by_key(|occurrence| occurrence.started)
                .cloned()
        }))
    }

    async fn last_faulty_occurrence(
        &self,
        insight_id: Uuid,
    ) -> Result<Option<InsightOccurrence>> {
        let map = self.insights.lock().unwrap();
        Ok(map.get(&insight_id).and_then(|insight| {
            insight
                .occurrences
                .iter()
                .filter(|occurrence| occurrence.is_faulted)
                .max_by_key(|occurrence| occurrence.started)
                .cloned()
        }))
    }

    async fn save_insight(&self, insight: &Insight, status_logs: &[StatusLog]) -> Result<()> {
        let mut stored = insight.clone();
        stored.status_logs.extend(status_logs.iter().cloned());
        self.insights.lock().unwrap().insert(stored.id, stored);
        self.saved_logs
            .lock()
            .unwrap()
            .extend(status_logs.iter().cloned());
        Ok(())
    }

    async fn save_insights(&self, insights: &[Insight], status_logs: &[StatusLog]) -> Result<()> {
        let mut map = self.insights.lock().unwrap();
        for insight in insights {
            let mut stored = insight.clone();
            stored.status_logs.extend(
                status_logs
                    .iter()
                    .filter(|log| log.insight_id == insight.id)
                    .cloned(),
            );
            map.insert(stored.id, stored);
        }
        self.saved_logs
            .lock()
            .unwrap()
            .extend(status_logs.iter().cloned());
        Ok(())
    }

    async fn generate_sequence_number(&self, prefix: &str) -> Result<String> {
        let next = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("{prefix}-I-{next}"))
    }
}

#[derive(Default)]
pub struct MockWorkflow {
    open_tickets: HashSet<Uuid>,
}

impl MockWorkflow {
    pub fn with_open_tickets(insight_ids: &[Uuid]) -> Self {
        Self {
            open_tickets: insight_ids.iter().copied().collect(),
        }
    }
}

impl WorkflowApi for MockWorkflow {
    async fn has_open_tickets(&self, insight_id: Uuid) -> Result<bool> {
        Ok(self.open_tickets.contains(&insight_id))
    }
}

#[derive(Default)]
pub struct MockTwinApi {
    twins: Vec<TwinSummary>,
    calls: AtomicU64,
    fail: bool,
}

impl MockTwinApi {
    pub fn with_twins(twins: Vec<TwinSummary>) -> Self {
        Self {
            twins,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TwinApi for MockTwinApi {
    async fn twins_by_ids(&self, requests: Vec<SiteTwinIds>) -> Result<Vec<TwinSummary>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(anyhow!("twin service unavailable"));
        }
        Ok(self
            .twins
            .iter()
            .filter(|twin| {
                requests.iter().any(|request| {
                    request.site_id == twin.site_id && request.twin_ids.contains(&twin.id)
                })
            })
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<NotificationMessage>>,
    fail: bool,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn messages(&self) -> Vec<NotificationMessage> {
        self.messages.lock().unwrap().clone()
    }
}

impl NotificationSink for RecordingSink {
    async fn notify(&self, message: NotificationMessage) -> Result<()> {
        if self.fail {
            return Err(anyhow!("notification channel unavailable"));
        }
        self.messages.lock().unwrap().push(message);
        Ok(())
    }
}
