use crate::error::{InsightError, InsightResult};
use crate::models::{
    DiagnosticPoint, DiagnosticsSnapshot, Insight, InsightDiagnostic, InsightOccurrence,
};
use crate::store::{InsightQuery, InsightStore};
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Dependency graphs carry no acyclicity guarantee; the traversal treats
/// revisited insights as leaves and stops expanding past this depth.
pub const MAX_DEPTH: usize = 10;

fn overlaps(
    occurrence: &InsightOccurrence,
    start: DateTime<Utc>,
    end: Option<DateTime<Utc>>,
) -> bool {
    let starts_before_end = match end {
        Some(end) => occurrence.started < end,
        None => true,
    };
    let ends_after_start = occurrence
        .ended
        .map_or(true, |ended| ended > start);
    starts_before_end && ends_after_start
}

/// Latest-started occurrence of `insight` overlapping the window.
fn representative_occurrence<'a>(
    insight: &'a Insight,
    start: DateTime<Utc>,
    end: Option<DateTime<Utc>>,
) -> Option<&'a InsightOccurrence> {
    insight
        .occurrences
        .iter()
        .filter(|occurrence| overlaps(occurrence, start, end))
        .max_by_key(|occurrence| occurrence.started)
}

/// Point-in-time snapshot of the conditions behind an insight's last fault:
/// the window of its last faulty occurrence, and a tree of pass/fail states
/// over its dependency graph bounded by that window.
pub async fn diagnostics_snapshot<S: InsightStore>(
    store: &S,
    insight_id: Uuid,
) -> InsightResult<DiagnosticsSnapshot> {
    let root = store
        .load_insight(insight_id, true)
        .await
        .map_err(InsightError::Store)?
        .ok_or_else(|| InsightError::not_found(format!("insight: {insight_id}")))?;

    let mut snapshot = DiagnosticsSnapshot {
        id: root.id,
        name: root.name.clone(),
        rule_name: root.rule_name.clone(),
        check: true,
        started: None,
        ended: None,
        diagnostics: Vec::new(),
    };

    let last_faulty = store
        .last_faulty_occurrence(insight_id)
        .await
        .map_err(InsightError::Store)?;
    let Some(last_faulty) = last_faulty else {
        return Ok(snapshot);
    };

    snapshot.started = Some(last_faulty.started);
    snapshot.ended = last_faulty.ended;
    snapshot.check = !last_faulty.is_faulted;
    snapshot.diagnostics =
        resolve_children(store, &root, last_faulty.started, last_faulty.ended).await?;

    Ok(snapshot)
}

/// Resolve the dependency tree level by level. The fixed window is passed
/// down unchanged at every depth, and each level costs one store
/// round-trip across the full frontier rather than one per edge.
async fn resolve_children<S: InsightStore>(
    store: &S,
    root: &Insight,
    window_start: DateTime<Utc>,
    window_end: Option<DateTime<Utc>>,
) -> InsightResult<Vec<DiagnosticsSnapshot>> {
    // Flat arena: nodes[i] is the snapshot, edges[i] its child indexes, and
    // pending[i] the dependency targets not yet resolved for it. Index 0 is
    // a placeholder for the root, whose own snapshot lives with the caller.
    let mut nodes: Vec<Option<DiagnosticsSnapshot>> = vec![None];
    let mut edges: Vec<Vec<usize>> = vec![Vec::new()];
    let mut pending: Vec<Vec<Uuid>> = vec![root
        .dependencies
        .iter()
        .map(|dependency| dependency.to_insight_id)
        .collect()];

    let mut loaded: HashMap<Uuid, Insight> = HashMap::from([(root.id, root.clone())]);
    let mut visited: HashSet<Uuid> = HashSet::from([root.id]);

    let mut frontier: Vec<usize> = vec![0];
    let mut depth = 0usize;

    while !frontier.is_empty() && depth < MAX_DEPTH {
        let wanted: Vec<Uuid> = frontier
            .iter()
            .flat_map(|&index| pending[index].iter().copied())
            .filter(|id| !loaded.contains_key(id))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        if !wanted.is_empty() {
            let fetched = store
                .load_insights_with_occurrences(InsightQuery::by_insight_ids(wanted))
                .await
                .map_err(InsightError::Store)?;
            for insight in fetched {
                loaded.insert(insight.id, insight);
            }
        }

        let mut next_frontier: Vec<usize> = Vec::new();
        for &parent_index in &frontier {
            let dependency_ids = std::mem::take(&mut pending[parent_index]);
            for dependency_id in dependency_ids {
                let Some(child) = loaded.get(&dependency_id) else {
                    continue;
                };
                let Some(occurrence) =
                    representative_occurrence(child, window_start, window_end)
                else {
                    continue;
                };

                let child_index = nodes.len();
                nodes.push(Some(DiagnosticsSnapshot {
                    id: child.id,
                    name: child.name.clone(),
                    rule_name: child.rule_name.clone(),
                    check: !occurrence.is_faulted,
                    started: Some(occurrence.started),
                    ended: occurrence.ended,
                    diagnostics: Vec::new(),
                }));
                edges.push(Vec::new());
                if visited.insert(child.id) {
                    pending.push(
                        child
                            .dependencies
                            .iter()
                            .map(|dependency| dependency.to_insight_id)
                            .collect(),
                    );
                    next_frontier.push(child_index);
                } else {
                    // Revisited insight: keep it as a leaf.
                    pending.push(Vec::new());
                }
                edges[parent_index].push(child_index);
            }
        }

        frontier = next_frontier;
        depth += 1;
    }

    let root_children = edges[0].clone();
    Ok(root_children
        .into_iter()
        .map(|index| assemble(index, &mut nodes, &edges))
        .collect())
}

fn assemble(
    index: usize,
    nodes: &mut [Option<DiagnosticsSnapshot>],
    edges: &[Vec<usize>],
) -> DiagnosticsSnapshot {
    let mut node = nodes[index].take().expect("arena node assembled once");
    node.diagnostics = edges[index]
        .iter()
        .map(|&child_index| assemble(child_index, nodes, edges))
        .collect();
    node
}

/// Flattened, time-bucketed diagnostics across an insight and its direct
/// and second-level dependents, for charting. The dependency walk is fixed
/// at two hops; there is no further recursion.
pub async fn insight_diagnostics<S: InsightStore>(
    store: &S,
    insight_id: Uuid,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    interval_minutes: i64,
) -> InsightResult<Vec<InsightDiagnostic>> {
    let root = store
        .load_insights_with_occurrences(InsightQuery::by_insight_ids(vec![insight_id]))
        .await
        .map_err(InsightError::Store)?
        .into_iter()
        .next()
        .ok_or_else(|| InsightError::not_found(format!("insight: {insight_id}")))?;

    let end = snap_end_date(start, end, interval_minutes);

    let mut rows: Vec<InsightDiagnostic> = Vec::new();
    if root.dependencies.is_empty() {
        return Ok(rows);
    }

    rows.push(diagnostic_row(&root, None, start, end, interval_minutes));

    let direct = load_dependents(store, &root).await?;
    for dependent in &direct {
        rows.push(diagnostic_row(
            dependent,
            Some(root.id),
            start,
            end,
            interval_minutes,
        ));
    }

    for dependent in &direct {
        if dependent.dependencies.is_empty() {
            continue;
        }
        let second_level = load_dependents(store, dependent).await?;
        for insight in &second_level {
            rows.push(diagnostic_row(
                insight,
                Some(dependent.id),
                start,
                end,
                interval_minutes,
            ));
        }
    }

    Ok(rows)
}

async fn load_dependents<S: InsightStore>(
    store: &S,
    parent: &Insight,
) -> InsightResult<Vec<Insight>> {
    let ids: Vec<Uuid> = parent
        .dependencies
        .iter()
        .map(|dependency| dependency.to_insight_id)
        .collect();
    store
        .load_insights_with_occurrences(InsightQuery::by_insight_ids(ids))
        .await
        .map_err(InsightError::Store)
}

fn diagnostic_row(
    insight: &Insight,
    parent_id: Option<Uuid>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    interval_minutes: i64,
) -> InsightDiagnostic {
    let in_window: Vec<&InsightOccurrence> = insight
        .occurrences
        .iter()
        .filter(|occurrence| overlaps(occurrence, start, Some(end)))
        .collect();

    InsightDiagnostic {
        id: insight.id,
        name: insight.name.clone(),
        rule_name: insight.rule_name.clone(),
        parent_id,
        started: start,
        ended: end,
        occurrence_liveness: bucket_series(&in_window, start, end, interval_minutes),
    }
}

/// One point per `interval_minutes` bucket; a bucket is faulted when any
/// faulted occurrence overlaps it.
fn bucket_series(
    occurrences: &[&InsightOccurrence],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    interval_minutes: i64,
) -> Vec<DiagnosticPoint> {
    let step = Duration::minutes(interval_minutes.max(1));
    let mut points = Vec::new();
    let mut bucket_start = start;
    while bucket_start < end {
        let bucket_end = bucket_start + step;
        let is_faulted = occurrences.iter().any(|occurrence| {
            occurrence.is_faulted
                && occurrence.started < bucket_end
                && occurrence.ended.map_or(true, |ended| ended > bucket_start)
        });
        points.push(DiagnosticPoint {
            timestamp: bucket_start,
            is_faulted,
        });
        bucket_start = bucket_end;
    }
    points
}

/// Snap the end of the charting window up to the next whole multiple of the
/// interval from `start`. An end before `start` is returned unchanged; a
/// window shorter than one interval becomes exactly one interval.
fn snap_end_date(start: DateTime<Utc>, end: DateTime<Utc>, interval_minutes: i64) -> DateTime<Utc> {
    if end < start {
        return end;
    }
    let interval = interval_minutes.max(1);
    let total_minutes = (end - start).num_minutes();
    if total_minutes < interval {
        return start + Duration::minutes(interval);
    }
    let remainder = total_minutes % interval;
    if remainder == 0 {
        end
    } else {
        end + Duration::minutes(interval - remainder)
    }
}
