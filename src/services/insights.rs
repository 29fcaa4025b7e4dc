use crate::config::InsightConfig;
use crate::error::{InsightError, InsightResult};
use crate::models::{
    BatchStatusUpdate, DiagnosticsSnapshot, ImpactScore, Insight, InsightActivity,
    InsightDiagnostic, InsightPatch, InsightState, InsightStatus, InsightType, NewInsight,
    NotificationMessage, SourceType, StatusLog,
};
use crate::services::occurrences;
use crate::services::priority::priority_from_impact_scores;
use crate::services::status::{validate_status_change, StatusChange};
use crate::services::twin_resolver::{TwinCache, TwinNameResolver};
use crate::services::{activity, diagnostics, stats};
use crate::store::{InsightQuery, InsightStore, NotificationSink, TwinApi, WorkflowApi};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Top-level entry points for the insight lifecycle. Sequences priority
/// conversion, status validation, and occurrence reconciliation around a
/// load-modify-persist cycle per request, and decides when a status log and
/// a notification are emitted.
pub struct InsightService<S, W, T, C, N>
where
    S: InsightStore,
    W: WorkflowApi,
    T: TwinApi,
    C: TwinCache,
    N: NotificationSink,
{
    store: S,
    workflow: W,
    twins: TwinNameResolver<T, C>,
    notifications: N,
    config: InsightConfig,
}

impl<S, W, T, C, N> InsightService<S, W, T, C, N>
where
    S: InsightStore,
    W: WorkflowApi,
    T: TwinApi,
    C: TwinCache,
    N: NotificationSink,
{
    pub fn new(
        store: S,
        workflow: W,
        twins: TwinNameResolver<T, C>,
        notifications: N,
        config: InsightConfig,
    ) -> Self {
        Self {
            store,
            workflow,
            twins,
            notifications,
            config,
        }
    }

    pub async fn get_insight(&self, insight_id: Uuid) -> InsightResult<Insight> {
        let insight = self
            .store
            .load_insight(insight_id, false)
            .await
            .map_err(InsightError::Store)?;
        let Some(mut insight) = insight.filter(|insight| insight.status != InsightStatus::Deleted)
        else {
            return Err(InsightError::not_found(format!("insight: {insight_id}")));
        };
        self.twins.enrich(&mut insight).await;
        Ok(insight)
    }

    /// Create an insight, deduplicating against active unresolved insights
    /// with the same site, twin, and name. A duplicate only refreshes the
    /// existing row's occurrence bookkeeping.
    pub async fn create_insight(&self, request: NewInsight) -> InsightResult<Insight> {
        let existing = self
            .store
            .active_unique_insights(request.site_id, request.twin_id.as_deref(), &request.name)
            .await
            .map_err(InsightError::Store)?;
        let duplicate = if request.source_type == SourceType::Inspection {
            existing
                .into_iter()
                .find(|insight| insight.description.eq_ignore_ascii_case(&request.description))
        } else {
            existing.into_iter().next()
        };
        if let Some(mut insight) = duplicate {
            insight.occurrence_count = request.occurrence_count;
            insight.last_occurred_date = request.occurred_date;
            self.store
                .save_insight(&insight, &[])
                .await
                .map_err(InsightError::Store)?;
            return Ok(insight);
        }

        if request.created_user_id.is_none() && request.source_id.is_none() {
            return Err(InsightError::bad_request(format!(
                "insight '{}' for site {} carries neither a created user id nor a source id",
                request.name, request.site_id
            )));
        }

        let now = Utc::now();
        let inspection_alert = request.source_type == SourceType::Inspection
            && request.insight_type == InsightType::Alert;
        let rule_id = if inspection_alert {
            self.config.inspection_rule_id.clone().or(request.rule_id)
        } else {
            request.rule_id
        };
        let rule_name = if inspection_alert {
            self.config.inspection_rule_name.clone().or(request.rule_name)
        } else {
            request.rule_name
        };

        let sequence_number = self
            .store
            .generate_sequence_number(&request.sequence_number_prefix)
            .await
            .map_err(InsightError::Store)?;

        let mut insight = Insight {
            id: Uuid::new_v4(),
            site_id: request.site_id,
            twin_id: request.twin_id,
            twin_name: None,
            floor_id: None,
            primary_model_id: request.primary_model_id,
            insight_type: request.insight_type,
            name: request.name,
            description: request.description,
            recommendation: request.recommendation,
            priority: request.priority,
            status: InsightStatus::New,
            state: request.state,
            occurrence_count: request.occurrence_count,
            last_occurred_date: request.occurred_date,
            detected_date: request.detected_date,
            created_date: now,
            updated_date: now,
            source_type: request.source_type,
            source_id: request.source_id,
            created_user_id: request.created_user_id,
            external_id: request.external_id,
            rule_id,
            rule_name,
            sequence_number,
            impact_scores: request.impact_scores,
            dependencies: request.dependencies,
            occurrences: request.occurrences,
            status_logs: Vec::new(),
        };

        if let Some(priority) = priority_from_impact_scores(&insight.impact_scores) {
            insight.priority = priority;
        }
        self.twins.enrich(&mut insight).await;

        let initial_log = StatusLog::record(
            &insight,
            InsightStatus::New,
            None,
            insight.source_id,
            insight.created_user_id,
            now,
        );
        self.store
            .save_insight(&insight, &[initial_log])
            .await
            .map_err(InsightError::Store)?;

        self.send_notification(&insight).await;
        Ok(insight)
    }

    /// Update an insight from the platform. Returns `Ok(None)` when the
    /// insight has already been soft-deleted.
    pub async fn update_insight(
        &self,
        insight_id: Uuid,
        patch: InsightPatch,
    ) -> InsightResult<Option<Insight>> {
        self.apply_update(insight_id, patch, false).await
    }

    /// Update an insight on behalf of a source app. Deleted insights are
    /// loaded (the detection source must not see a not-found) but left
    /// untouched.
    pub async fn update_insight_from_app(
        &self,
        insight_id: Uuid,
        patch: InsightPatch,
    ) -> InsightResult<Option<Insight>> {
        self.apply_update(insight_id, patch, true).await
    }

    async fn apply_update(
        &self,
        insight_id: Uuid,
        patch: InsightPatch,
        include_deleted: bool,
    ) -> InsightResult<Option<Insight>> {
        if patch.user_id.is_none() && patch.source_id.is_none() {
            return Err(InsightError::bad_request(format!(
                "update for insight {insight_id} carries neither a user id nor a source id"
            )));
        }

        let insight = self
            .store
            .load_insight(insight_id, include_deleted)
            .await
            .map_err(InsightError::Store)?;
        let Some(mut insight) = insight else {
            return Err(InsightError::not_found(format!("insight: {insight_id}")));
        };
        if insight.status == InsightStatus::Deleted {
            return Ok(None);
        }

        let now = Utc::now();
        let mut status_logs: Vec<StatusLog> = Vec::new();
        let mut reactivated = false;

        if let Some(requested) = patch.status {
            let change = StatusChange {
                status: requested,
                reason: patch.reason.clone(),
                source_id: patch.source_id,
                user_id: patch.user_id,
            };
            let log = validate_status_change(
                &self.store,
                &self.workflow,
                &self.config,
                &insight,
                &change,
                now,
            )
            .await?;
            if let Some(log) = log {
                insight.status = log.status;
                // A validator-produced return to New (explicit reopen or
                // unignore) notifies like an automatic reactivation.
                reactivated = log.status == InsightStatus::New;
                status_logs.push(log);
            }
        }

        apply_patch_fields(&mut insight, &patch, now);

        if let Some(batch) = patch.occurrences.as_deref() {
            if let Some(outcome) = occurrences::reconcile(&insight.occurrences, batch) {
                insight.occurrences = outcome.occurrences;
                insight.occurrence_count = outcome.occurrence_count;
                // A fault reported against a resolved insight reopens it,
                // unless an explicit status change already landed above.
                if outcome.batch_has_fault
                    && insight.status == InsightStatus::Resolved
                    && status_logs.is_empty()
                {
                    insight.status = InsightStatus::New;
                    status_logs.push(StatusLog::record(
                        &insight,
                        InsightStatus::New,
                        Some(
                            "Automatically reactivated after a faulted occurrence was reported."
                                .to_string(),
                        ),
                        patch.source_id,
                        patch.user_id,
                        now,
                    ));
                    reactivated = true;
                }
            }
        }

        if let Some(priority) = priority_from_impact_scores(&insight.impact_scores) {
            insight.priority = priority;
        }
        insight.updated_date = now;

        self.store
            .save_insight(&insight, &status_logs)
            .await
            .map_err(InsightError::Store)?;

        if reactivated {
            self.send_notification(&insight).await;
        }
        Ok(Some(insight))
    }

    /// Apply one status change across a batch of insights. Insights already
    /// in the requested status are skipped, except for `Ignored` requests,
    /// which must reach the validator to trigger the unignore rule. Returns
    /// the number of status logs written.
    pub async fn batch_update_status(&self, request: BatchStatusUpdate) -> InsightResult<usize> {
        if request.user_id.is_none() && request.source_id.is_none() {
            return Err(InsightError::bad_request(format!(
                "batch status update for site {} carries neither a user id nor a source id",
                request.site_id
            )));
        }

        let mut insights = self
            .store
            .load_insights_with_occurrences(InsightQuery::by_insight_ids(request.ids.clone()))
            .await
            .map_err(InsightError::Store)?;
        insights.retain(|insight| {
            request.status == InsightStatus::Ignored || insight.status != request.status
        });
        if insights.is_empty() {
            return Ok(0);
        }

        let now = Utc::now();
        let mut status_logs: Vec<StatusLog> = Vec::new();
        for insight in &mut insights {
            let change = StatusChange {
                status: request.status,
                reason: request.reason.clone(),
                source_id: request.source_id,
                user_id: request.user_id,
            };
            let log = validate_status_change(
                &self.store,
                &self.workflow,
                &self.config,
                insight,
                &change,
                now,
            )
            .await?;
            if let Some(log) = log {
                insight.status = log.status;
                status_logs.push(log);
            }
            insight.updated_date = now;
        }

        self.store
            .save_insights(&insights, &status_logs)
            .await
            .map_err(InsightError::Store)?;
        Ok(status_logs.len())
    }

    pub async fn diagnostics_snapshot(&self, insight_id: Uuid) -> InsightResult<DiagnosticsSnapshot> {
        diagnostics::diagnostics_snapshot(&self.store, insight_id).await
    }

    pub async fn insight_diagnostics(
        &self,
        insight_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        interval_minutes: i64,
    ) -> InsightResult<Vec<InsightDiagnostic>> {
        diagnostics::insight_diagnostics(&self.store, insight_id, start, end, interval_minutes)
            .await
    }

    pub async fn insight_activities(&self, insight_id: Uuid) -> InsightResult<Vec<InsightActivity>> {
        let insight = self
            .store
            .load_insight(insight_id, false)
            .await
            .map_err(InsightError::Store)?
            .ok_or_else(|| InsightError::not_found(format!("insight: {insight_id}")))?;
        Ok(activity::insight_activities(
            &insight.occurrences,
            &insight.status_logs,
        ))
    }

    pub async fn site_statistics_by_priority(
        &self,
        site_ids: Vec<Uuid>,
    ) -> InsightResult<Vec<stats::InsightStatisticsByPriority>> {
        let insights = self
            .store
            .load_insights_with_occurrences(InsightQuery::by_site_ids(site_ids.clone()))
            .await
            .map_err(InsightError::Store)?;
        Ok(stats::statistics_by_priority(&site_ids, &insights))
    }

    pub async fn site_statistics_by_status(
        &self,
        site_ids: Vec<Uuid>,
    ) -> InsightResult<Vec<stats::InsightStatisticsByStatus>> {
        let insights = self
            .store
            .load_insights_with_occurrences(InsightQuery::by_site_ids(site_ids.clone()))
            .await
            .map_err(InsightError::Store)?;
        Ok(stats::statistics_by_status(&site_ids, &insights))
    }

    pub async fn impact_scores_summary(
        &self,
        site_ids: Vec<Uuid>,
    ) -> InsightResult<Vec<ImpactScore>> {
        let insights = self
            .store
            .load_insights_with_occurrences(InsightQuery::by_site_ids(site_ids))
            .await
            .map_err(InsightError::Store)?;
        Ok(stats::impact_scores_summary(&insights))
    }

    /// Human-facing source name. App-sourced insights resolve to the
    /// configured automation-app name, or the mapped-integration name when
    /// the source id matches it.
    pub fn source_name(&self, source_type: SourceType, source_id: Option<Uuid>) -> String {
        if source_type != SourceType::App || source_id.is_none() {
            return source_type.as_str().to_string();
        }
        match (self.config.mapped_app_id, source_id) {
            (Some(mapped), Some(source)) if mapped == source => self.config.mapped_app_name.clone(),
            _ => self.config.automation_app_name.clone(),
        }
    }

    async fn send_notification(&self, insight: &Insight) {
        if !self.config.notifications_enabled {
            return;
        }
        let message = NotificationMessage {
            source: "insight",
            source_id: insight.id.to_string(),
            title: insight.name.clone(),
            property_bag: serde_json::json!({
                "twinId": insight.twin_id,
                "twinName": insight.twin_name,
                "modelId": insight.primary_model_id,
                "skillId": insight.rule_id,
                "type": insight.insight_type,
                "priority": insight.priority,
            }),
        };
        if let Err(err) = self.notifications.notify(message).await {
            tracing::warn!(error = %err, insight_id = %insight.id, "insight notification failed");
        }
    }
}

/// Overwrite exactly the fields the patch supplies, leaving the rest
/// untouched.
fn apply_patch_fields(insight: &mut Insight, patch: &InsightPatch, now: DateTime<Utc>) {
    if let Some(name) = patch
        .name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
    {
        insight.name = name.to_string();
    }
    if let Some(description) = &patch.description {
        insight.description = description.clone();
    }
    if let Some(recommendation) = &patch.recommendation {
        insight.recommendation = Some(recommendation.clone());
    }
    if let Some(impact_scores) = &patch.impact_scores {
        insight.impact_scores = impact_scores.clone();
    }
    if let Some(priority) = patch.priority {
        insight.priority = priority;
    }
    if let Some(insight_type) = patch.insight_type {
        insight.insight_type = insight_type;
    }
    if let Some(state) = patch.state {
        // Coming back from the archive counts as a fresh occurrence.
        if state == InsightState::Active && insight.state == InsightState::Archived {
            insight.occurrence_count += 1;
            insight.last_occurred_date = now;
        }
        insight.state = state;
    }
    if let Some(occurred_date) = patch.occurred_date {
        if occurred_date > insight.last_occurred_date {
            insight.occurrence_count += 1;
            insight.last_occurred_date = occurred_date;
        }
    }
    if let Some(detected_date) = patch.detected_date {
        insight.detected_date = detected_date;
    }
    if let Some(occurrence_count) = patch.occurrence_count.filter(|count| *count != 0) {
        insight.occurrence_count = occurrence_count;
    }
    if let Some(external_id) = &patch.external_id {
        insight.external_id = Some(external_id.clone());
    }
    if let Some(primary_model_id) = &patch.primary_model_id {
        insight.primary_model_id = Some(primary_model_id.clone());
    }
    if let Some(rule_name) = patch
        .rule_name
        .as_deref()
        .map(str::trim)
        .filter(|rule_name| !rule_name.is_empty())
    {
        insight.rule_name = Some(rule_name.to_string());
    }
    if let Some(dependencies) = &patch.dependencies {
        insight.dependencies = dependencies.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::twin_resolver::InMemoryTwinCache;
    use crate::test_support::{
        epoch, insight_fixture, occurrence_at, twin_summary, MockStore, MockTwinApi, MockWorkflow,
        RecordingSink,
    };
    use chrono::Duration;

    type TestService =
        InsightService<MockStore, MockWorkflow, MockTwinApi, InMemoryTwinCache, RecordingSink>;

    fn service(store: MockStore) -> TestService {
        service_with(
            store,
            MockWorkflow::default(),
            MockTwinApi::default(),
            RecordingSink::default(),
            InsightConfig::default(),
        )
    }

    fn service_with(
        store: MockStore,
        workflow: MockWorkflow,
        twins: MockTwinApi,
        sink: RecordingSink,
        config: InsightConfig,
    ) -> TestService {
        let ttl = std::time::Duration::from_secs(config.twin_cache_ttl_seconds);
        InsightService::new(
            store,
            workflow,
            TwinNameResolver::new(twins, InMemoryTwinCache::new(ttl)),
            sink,
            config,
        )
    }

    fn new_insight_request() -> NewInsight {
        NewInsight {
            site_id: Uuid::new_v4(),
            twin_id: None,
            insight_type: InsightType::Fault,
            name: "chiller surge".to_string(),
            description: "chiller surging at low load".to_string(),
            recommendation: None,
            priority: 3,
            state: InsightState::Active,
            occurred_date: epoch() + Duration::hours(1),
            detected_date: epoch(),
            source_type: SourceType::App,
            source_id: Some(Uuid::new_v4()),
            created_user_id: None,
            external_id: None,
            rule_id: Some("chiller-surge".to_string()),
            rule_name: Some("Chiller Surge".to_string()),
            primary_model_id: None,
            occurrence_count: 1,
            impact_scores: Vec::new(),
            occurrences: Vec::new(),
            dependencies: Vec::new(),
            sequence_number_prefix: "HQ".to_string(),
        }
    }

    fn patch_from(source_id: Option<Uuid>) -> InsightPatch {
        InsightPatch {
            source_id,
            user_id: Some(Uuid::new_v4()),
            ..InsightPatch::default()
        }
    }

    #[tokio::test]
    async fn creates_a_new_insight_with_log_sequence_and_notification() {
        let service = service(MockStore::default());

        let created = service
            .create_insight(new_insight_request())
            .await
            .expect("create");

        assert_eq!(created.status, InsightStatus::New);
        assert_eq!(created.sequence_number, "HQ-I-1");
        let logs = service.store.logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, InsightStatus::New);
        let messages = service.notifications.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].title, "chiller surge");
    }

    #[tokio::test]
    async fn creation_requires_a_user_or_source_id() {
        let service = service(MockStore::default());
        let mut request = new_insight_request();
        request.source_id = None;
        request.created_user_id = None;

        let err = service.create_insight(request).await.unwrap_err();
        assert!(matches!(err, InsightError::BadRequest(_)));
    }

    #[tokio::test]
    async fn creation_converts_priority_from_the_impact_score() {
        let service = service(MockStore::default());
        let mut request = new_insight_request();
        request.priority = 4;
        request.impact_scores = vec![ImpactScore {
            field_id: "priority".to_string(),
            name: "Priority".to_string(),
            value: 90.0,
            unit: None,
            external_id: None,
        }];

        let created = service.create_insight(request).await.expect("create");
        assert_eq!(created.priority, 1);
    }

    #[tokio::test]
    async fn creation_enriches_twin_details_best_effort() {
        let mut request = new_insight_request();
        request.twin_id = Some("AHU-1".to_string());
        let twin = twin_summary("AHU-1", request.site_id);
        let service = service_with(
            MockStore::default(),
            MockWorkflow::default(),
            MockTwinApi::with_twins(vec![twin.clone()]),
            RecordingSink::default(),
            InsightConfig::default(),
        );

        let created = service.create_insight(request).await.expect("create");
        assert_eq!(created.twin_name, twin.name);
        assert_eq!(created.primary_model_id, twin.model_id);
    }

    #[tokio::test]
    async fn duplicate_creation_refreshes_the_existing_insight() {
        let mut existing = insight_fixture(InsightStatus::Open);
        existing.occurrence_count = 3;
        let mut request = new_insight_request();
        request.site_id = existing.site_id;
        request.name = existing.name.clone();
        request.occurrence_count = 7;

        let service = service(MockStore::with_insights(vec![existing.clone()]));
        let result = service.create_insight(request.clone()).await.expect("create");

        assert_eq!(result.id, existing.id);
        assert_eq!(result.occurrence_count, 7);
        assert_eq!(result.last_occurred_date, request.occurred_date);
        assert_eq!(service.store.insight_count(), 1);
        assert!(service.notifications.messages().is_empty());
        assert!(service.store.logs().is_empty());
    }

    #[tokio::test]
    async fn inspection_duplicates_must_also_match_the_description() {
        let existing = insight_fixture(InsightStatus::Open);
        let mut request = new_insight_request();
        request.site_id = existing.site_id;
        request.name = existing.name.clone();
        request.source_type = SourceType::Inspection;
        request.description = "a different finding".to_string();

        let service = service(MockStore::with_insights(vec![existing]));
        service.create_insight(request).await.expect("create");

        // no description match, so a second insight is created
        assert_eq!(service.store.insight_count(), 2);
    }

    #[tokio::test]
    async fn inspection_alerts_take_the_configured_rule_override() {
        let config = InsightConfig {
            inspection_rule_id: Some("inspection-note".to_string()),
            inspection_rule_name: Some("Inspection Note".to_string()),
            ..InsightConfig::default()
        };
        let service = service_with(
            MockStore::default(),
            MockWorkflow::default(),
            MockTwinApi::default(),
            RecordingSink::default(),
            config,
        );
        let mut request = new_insight_request();
        request.source_type = SourceType::Inspection;
        request.insight_type = InsightType::Alert;

        let created = service.create_insight(request).await.expect("create");
        assert_eq!(created.rule_id.as_deref(), Some("inspection-note"));
        assert_eq!(created.rule_name.as_deref(), Some("Inspection Note"));
    }

    #[tokio::test]
    async fn notification_failures_do_not_fail_creation() {
        let service = service_with(
            MockStore::default(),
            MockWorkflow::default(),
            MockTwinApi::default(),
            RecordingSink::failing(),
            InsightConfig::default(),
        );

        service
            .create_insight(new_insight_request())
            .await
            .expect("create succeeds despite the sink failing");
    }

    #[tokio::test]
    async fn updating_a_missing_insight_is_not_found() {
        let service = service(MockStore::default());
        let err = service
            .update_insight(Uuid::new_v4(), patch_from(None))
            .await
            .unwrap_err();
        assert!(matches!(err, InsightError::NotFound(_)));
    }

    #[tokio::test]
    async fn updating_a_deleted_insight_from_an_app_returns_none() {
        let insight = insight_fixture(InsightStatus::Deleted);
        let service = service(MockStore::with_insights(vec![insight.clone()]));

        let result = service
            .update_insight_from_app(insight.id, patch_from(insight.source_id))
            .await
            .expect("update");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn update_requires_a_user_or_source_id() {
        let insight = insight_fixture(InsightStatus::Open);
        let service = service(MockStore::with_insights(vec![insight.clone()]));
        let patch = InsightPatch::default();

        let err = service.update_insight(insight.id, patch).await.unwrap_err();
        assert!(matches!(err, InsightError::BadRequest(_)));
    }

    #[tokio::test]
    async fn partial_updates_only_touch_supplied_fields() {
        let insight = insight_fixture(InsightStatus::Open);
        let original_description = insight.description.clone();
        let service = service(MockStore::with_insights(vec![insight.clone()]));

        let mut patch = patch_from(insight.source_id);
        patch.name = Some("renamed fault".to_string());
        patch.priority = Some(2);

        let updated = service
            .update_insight(insight.id, patch)
            .await
            .expect("update")
            .expect("insight");

        assert_eq!(updated.name, "renamed fault");
        assert_eq!(updated.priority, 2);
        assert_eq!(updated.description, original_description);
        assert_eq!(updated.status, InsightStatus::Open);
    }

    #[tokio::test]
    async fn a_newer_occurred_date_bumps_the_counting_path() {
        let mut insight = insight_fixture(InsightStatus::Open);
        insight.occurrence_count = 4;
        let service = service(MockStore::with_insights(vec![insight.clone()]));

        let mut patch = patch_from(insight.source_id);
        patch.occurred_date = Some(insight.last_occurred_date + Duration::hours(2));
        let updated = service
            .update_insight(insight.id, patch)
            .await
            .expect("update")
            .expect("insight");
        assert_eq!(updated.occurrence_count, 5);

        // an older date changes nothing
        let mut stale = patch_from(insight.source_id);
        stale.occurred_date = Some(insight.last_occurred_date - Duration::hours(2));
        let unchanged = service
            .update_insight(insight.id, stale)
            .await
            .expect("update")
            .expect("insight");
        assert_eq!(unchanged.occurrence_count, 5);
    }

    #[tokio::test]
    async fn restoring_an_archived_insight_counts_as_an_occurrence() {
        let mut insight = insight_fixture(InsightStatus::Open);
        insight.state = InsightState::Archived;
        insight.occurrence_count = 2;
        let service = service(MockStore::with_insights(vec![insight.clone()]));

        let mut patch = patch_from(insight.source_id);
        patch.state = Some(InsightState::Active);
        let updated = service
            .update_insight(insight.id, patch)
            .await
            .expect("update")
            .expect("insight");

        assert_eq!(updated.state, InsightState::Active);
        assert_eq!(updated.occurrence_count, 3);
        assert!(updated.last_occurred_date > insight.last_occurred_date);
    }

    #[tokio::test]
    async fn faulted_batch_reactivates_a_resolved_insight() {
        let mut insight = insight_fixture(InsightStatus::Resolved);
        insight.occurrences = vec![occurrence_at(insight.id, epoch(), true)];
        let service = service(MockStore::with_insights(vec![insight.clone()]));

        let mut patch = patch_from(insight.source_id);
        patch.occurrences = Some(vec![occurrence_at(
            insight.id,
            epoch() + Duration::hours(5),
            true,
        )]);

        let updated = service
            .update_insight(insight.id, patch)
            .await
            .expect("update")
            .expect("insight");

        assert_eq!(updated.status, InsightStatus::New);
        let logs = service.store.logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, InsightStatus::New);
        assert!(logs[0].reason.as_deref().unwrap().contains("Automatically"));
        assert_eq!(service.notifications.messages().len(), 1);
    }

    #[tokio::test]
    async fn an_explicit_status_change_suppresses_auto_reactivation() {
        let mut insight = insight_fixture(InsightStatus::Resolved);
        insight.occurrences = vec![occurrence_at(insight.id, epoch(), true)];
        let service = service(MockStore::with_insights(vec![insight.clone()]));

        let mut patch = patch_from(insight.source_id);
        patch.status = Some(InsightStatus::New);
        patch.occurrences = Some(vec![occurrence_at(
            insight.id,
            epoch() + Duration::hours(5),
            true,
        )]);

        let updated = service
            .update_insight(insight.id, patch)
            .await
            .expect("update")
            .expect("insight");

        assert_eq!(updated.status, InsightStatus::New);
        // only the explicit transition is logged, and it notifies as a
        // reactivation in its own right
        let logs = service.store.logs();
        assert_eq!(logs.len(), 1);
        assert!(logs[0].reason.is_none());
        assert_eq!(service.notifications.messages().len(), 1);
    }

    #[tokio::test]
    async fn clear_batch_does_not_reactivate_a_resolved_insight() {
        let mut insight = insight_fixture(InsightStatus::Resolved);
        insight.occurrences = vec![occurrence_at(insight.id, epoch(), true)];
        let service = service(MockStore::with_insights(vec![insight.clone()]));

        let mut patch = patch_from(insight.source_id);
        patch.occurrences = Some(vec![occurrence_at(
            insight.id,
            epoch() + Duration::hours(5),
            false,
        )]);

        let updated = service
            .update_insight(insight.id, patch)
            .await
            .expect("update")
            .expect("insight");

        assert_eq!(updated.status, InsightStatus::Resolved);
        assert!(service.store.logs().is_empty());
    }

    #[tokio::test]
    async fn patched_impact_scores_reconvert_the_priority() {
        let mut insight = insight_fixture(InsightStatus::Open);
        insight.priority = 4;
        let service = service(MockStore::with_insights(vec![insight.clone()]));

        let mut patch = patch_from(insight.source_id);
        patch.impact_scores = Some(vec![ImpactScore {
            field_id: "priority".to_string(),
            name: "Priority".to_string(),
            value: 60.0,
            unit: None,
            external_id: None,
        }]);

        let updated = service
            .update_insight(insight.id, patch)
            .await
            .expect("update")
            .expect("insight");
        assert_eq!(updated.priority, 2);
    }

    #[tokio::test]
    async fn batch_update_skips_insights_already_in_the_requested_status() {
        let open = insight_fixture(InsightStatus::Open);
        let new = insight_fixture(InsightStatus::New);
        let service = service(MockStore::with_insights(vec![open.clone(), new.clone()]));

        let written = service
            .batch_update_status(BatchStatusUpdate {
                site_id: open.site_id,
                ids: vec![open.id, new.id],
                status: InsightStatus::Open,
                reason: None,
                source_id: None,
                user_id: Some(Uuid::new_v4()),
            })
            .await
            .expect("batch update");

        assert_eq!(written, 1);
        assert_eq!(service.store.insight(new.id).status, InsightStatus::Open);
        assert_eq!(service.store.insight(open.id).status, InsightStatus::Open);
    }

    #[tokio::test]
    async fn batch_update_rejects_an_illegal_transition_for_any_member() {
        let open = insight_fixture(InsightStatus::Open);
        let service = service(MockStore::with_insights(vec![open.clone()]));

        let err = service
            .batch_update_status(BatchStatusUpdate {
                site_id: open.site_id,
                ids: vec![open.id],
                status: InsightStatus::Resolved,
                reason: None,
                source_id: None,
                user_id: Some(Uuid::new_v4()),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, InsightError::InvalidTransition { .. }));
        // nothing was persisted
        assert_eq!(service.store.insight(open.id).status, InsightStatus::Open);
    }

    #[tokio::test]
    async fn batch_ignore_requests_pass_through_for_the_unignore_rule() {
        let mut ignored = insight_fixture(InsightStatus::Ignored);
        ignored.occurrences = vec![occurrence_at(ignored.id, epoch(), true)];
        let service = service(MockStore::with_insights(vec![ignored.clone()]));

        let written = service
            .batch_update_status(BatchStatusUpdate {
                site_id: ignored.site_id,
                ids: vec![ignored.id],
                status: InsightStatus::Ignored,
                reason: None,
                source_id: None,
                user_id: Some(Uuid::new_v4()),
            })
            .await
            .expect("batch update");

        assert_eq!(written, 1);
        assert_eq!(service.store.insight(ignored.id).status, InsightStatus::New);
    }

    #[tokio::test]
    async fn source_name_resolves_app_identities() {
        let mapped = Uuid::new_v4();
        let config = InsightConfig {
            automation_app_name: "Rules Engine".to_string(),
            mapped_app_id: Some(mapped),
            mapped_app_name: "Mapped Integration".to_string(),
            ..InsightConfig::default()
        };
        let service = service_with(
            MockStore::default(),
            MockWorkflow::default(),
            MockTwinApi::default(),
            RecordingSink::default(),
            config,
        );

        assert_eq!(
            service.source_name(SourceType::Inspection, Some(Uuid::new_v4())),
            "inspection"
        );
        assert_eq!(service.source_name(SourceType::App, None), "app");
        assert_eq!(
            service.source_name(SourceType::App, Some(Uuid::new_v4())),
            "Rules Engine"
        );
        assert_eq!(
            service.source_name(SourceType::App, Some(mapped)),
            "Mapped Integration"
        );
    }

    #[tokio::test]
    async fn get_insight_hides_deleted_insights() {
        let deleted = insight_fixture(InsightStatus::Deleted);
        let service = service(MockStore::with_insights(vec![deleted.clone()]));

        let err = service.get_insight(deleted.id).await.unwrap_err();
        assert!(matches!(err, InsightError::NotFound(_)));
    }

    #[tokio::test]
    async fn site_statistics_cover_sites_without_insights() {
        let insight = insight_fixture(InsightStatus::New);
        let empty_site = Uuid::new_v4();
        let service = service(MockStore::with_insights(vec![insight.clone()]));

        let stats = service
            .site_statistics_by_priority(vec![insight.site_id, empty_site])
            .await
            .expect("stats");

        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].counts.open_count, 1);
        assert_eq!(stats[1].counts.open_count, 0);
    }

    #[tokio::test]
    async fn activities_pair_new_logs_with_their_triggering_fault() {
        let mut insight = insight_fixture(InsightStatus::New);
        let fault = occurrence_at(insight.id, epoch() + Duration::hours(1), true);
        insight.occurrences = vec![fault.clone()];
        insight.status_logs = vec![StatusLog::record(
            &insight,
            InsightStatus::New,
            None,
            insight.source_id,
            None,
            epoch() + Duration::hours(2),
        )];
        let service = service(MockStore::with_insights(vec![insight.clone()]));

        let activities = service
            .insight_activities(insight.id)
            .await
            .expect("activities");
        let status_entry = activities
            .iter()
            .find(|entry| entry.status_log.is_some())
            .expect("status entry");
        assert_eq!(status_entry.occurrence.as_ref(), Some(&fault));
    }
}
