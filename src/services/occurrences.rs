use crate::models::InsightOccurrence;

/// Result of merging a reported occurrence batch into stored history.
#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    /// Kept stored occurrences plus the batch, ordered by `started`.
    pub occurrences: Vec<InsightOccurrence>,
    /// Faulted occurrences across the merged set.
    pub occurrence_count: i64,
    /// Whether the batch itself reported at least one faulted occurrence.
    pub batch_has_fault: bool,
}

/// Merge a reported batch into the stored occurrence list. The batch is the
/// sole source of truth for the span `[min(batch.started), max(batch.started)]`:
/// stored occurrences whose `started` falls inside that span are replaced,
/// everything outside is kept. Returns `None` for an empty batch.
///
/// Re-running with the same stored state and batch replaces the identical
/// span with identical data, so the operation is idempotent.
pub fn reconcile(
    existing: &[InsightOccurrence],
    batch: &[InsightOccurrence],
) -> Option<ReconcileOutcome> {
    let first_started = batch.iter().map(|occurrence| occurrence.started).min()?;
    let last_started = batch.iter().map(|occurrence| occurrence.started).max()?;

    let mut occurrences: Vec<InsightOccurrence> = existing
        .iter()
        .filter(|occurrence| {
            occurrence.started < first_started || occurrence.started > last_started
        })
        .cloned()
        .collect();

    let kept_faulted = occurrences
        .iter()
        .filter(|occurrence| occurrence.is_faulted)
        .count();
    let batch_faulted = batch
        .iter()
        .filter(|occurrence| occurrence.is_faulted)
        .count();

    occurrences.extend_from_slice(batch);
    occurrences.sort_by_key(|occurrence| occurrence.started);

    Some(ReconcileOutcome {
        occurrences,
        occurrence_count: (kept_faulted + batch_faulted) as i64,
        batch_has_fault: batch_faulted > 0,
    })
}
