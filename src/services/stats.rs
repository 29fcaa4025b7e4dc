use crate::models::{ImpactScore, Insight, InsightStatus, InsightType};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PriorityCounts {
    pub open_count: i64,
    pub urgent_count: i64,
    pub high_count: i64,
    pub medium_count: i64,
    pub low_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsightStatisticsByPriority {
    pub id: Uuid,
    pub counts: PriorityCounts,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusCounts {
    pub new_count: i64,
    pub open_count: i64,
    pub in_progress_count: i64,
    pub ready_to_resolve_count: i64,
    pub resolved_count: i64,
    pub ignored_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsightStatisticsByStatus {
    pub id: Uuid,
    pub counts: StatusCounts,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TwinInsightStatistics {
    pub twin_id: String,
    pub insight_count: i64,
    pub highest_priority: Option<i32>,
    pub rule_ids: Vec<String>,
    pub priority_counts: Option<PriorityCounts>,
}

fn counts_for(insights: &[&Insight]) -> PriorityCounts {
    PriorityCounts {
        open_count: insights
            .iter()
            .filter(|insight| {
                matches!(insight.status, InsightStatus::New | InsightStatus::Open)
            })
            .count() as i64,
        urgent_count: insights.iter().filter(|insight| insight.priority == 1).count() as i64,
        high_count: insights.iter().filter(|insight| insight.priority == 2).count() as i64,
        medium_count: insights.iter().filter(|insight| insight.priority == 3).count() as i64,
        low_count: insights.iter().filter(|insight| insight.priority == 4).count() as i64,
    }
}

/// Per-site open/priority counts across active, non-diagnostic insights.
/// Sites without matching insights appear with zero counts.
pub fn statistics_by_priority(
    site_ids: &[Uuid],
    insights: &[Insight],
) -> Vec<InsightStatisticsByPriority> {
    site_ids
        .iter()
        .map(|&site_id| {
            let site_insights: Vec<&Insight> = insights
                .iter()
                .filter(|insight| {
                    insight.site_id == site_id
                        && insight.insight_type != InsightType::Diagnostic
                        && insight.status.is_active()
                })
                .collect();
            InsightStatisticsByPriority {
                id: site_id,
                counts: counts_for(&site_insights),
            }
        })
        .collect()
}

/// Per-site counts per status across non-diagnostic insights. Sites without
/// matching insights appear with zero counts.
pub fn statistics_by_status(
    site_ids: &[Uuid],
    insights: &[Insight],
) -> Vec<InsightStatisticsByStatus> {
    site_ids
        .iter()
        .map(|&site_id| {
            let mut counts = StatusCounts::default();
            for insight in insights.iter().filter(|insight| {
                insight.site_id == site_id && insight.insight_type != InsightType::Diagnostic
            }) {
                match insight.status {
                    InsightStatus::New => counts.new_count += 1,
                    InsightStatus::Open => counts.open_count += 1,
                    InsightStatus::InProgress => counts.in_progress_count += 1,
                    InsightStatus::ReadyToResolve => counts.ready_to_resolve_count += 1,
                    InsightStatus::Resolved => counts.resolved_count += 1,
                    InsightStatus::Ignored => counts.ignored_count += 1,
                    InsightStatus::Deleted => {}
                }
            }
            InsightStatisticsByStatus { id: site_id, counts }
        })
        .collect()
}

/// Per-twin rollup across active, non-diagnostic insights.
pub fn statistics_by_twin(
    insights: &[Insight],
    include_priority_counts: bool,
) -> Vec<TwinInsightStatistics> {
    let mut by_twin: BTreeMap<String, Vec<&Insight>> = BTreeMap::new();
    for insight in insights {
        if insight.insight_type == InsightType::Diagnostic || !insight.status.is_active() {
            continue;
        }
        let Some(twin_id) = insight
            .twin_id
            .as_deref()
            .map(str::trim)
            .filter(|twin_id| !twin_id.is_empty())
        else {
            continue;
        };
        by_twin.entry(twin_id.to_string()).or_default().push(insight);
    }

    by_twin
        .into_iter()
        .map(|(twin_id, group)| {
            let mut rule_ids: Vec<String> = group
                .iter()
                .filter_map(|insight| insight.rule_id.clone())
                .collect();
            rule_ids.sort();
            rule_ids.dedup();

            TwinInsightStatistics {
                twin_id,
                insight_count: group.len() as i64,
                highest_priority: group.iter().map(|insight| insight.priority).min(),
                rule_ids,
                priority_counts: include_priority_counts.then(|| counts_for(&group)),
            }
        })
        .collect()
}

/// Collapse all impact scores across non-diagnostic insights into one entry
/// per field id. Priority fields aggregate by max (they are 0-100 scores,
/// not additive); every other field sums.
pub fn impact_scores_summary(insights: &[Insight]) -> Vec<ImpactScore> {
    let mut by_field: BTreeMap<String, Vec<&ImpactScore>> = BTreeMap::new();
    for insight in insights {
        if insight.insight_type == InsightType::Diagnostic {
            continue;
        }
        for score in &insight.impact_scores {
            by_field.entry(score.field_id.clone()).or_default().push(score);
        }
    }

    by_field
        .into_iter()
        .map(|(field_id, group)| {
            let is_priority = group.first().map(|score| score.is_priority()).unwrap_or(false);
            let value = if is_priority {
                group
                    .iter()
                    .map(|score| score.value)
                    .fold(f64::MIN, f64::max)
            } else {
                group.iter().map(|score| score.value).sum()
            };
            ImpactScore {
                field_id,
                name: group
                    .iter()
                    .map(|score| score.name.clone())
                    .max()
                    .unwrap_or_default(),
                value,
                unit: group.iter().filter_map(|score| score.unit.clone()).max(),
                external_id: None,
            }
        })
        .collect()
}
