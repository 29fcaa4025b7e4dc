use crate::models::{InsightActivity, InsightOccurrence, InsightStatus, StatusLog};

/// Merge status logs and occurrences into a chronological activity
/// timeline. Each `New` status entry carries the latest faulted occurrence
/// started before it, so the UI can show what reactivated the insight.
pub fn insight_activities(
    occurrences: &[InsightOccurrence],
    status_logs: &[StatusLog],
) -> Vec<InsightActivity> {
    let mut activities: Vec<InsightActivity> = status_logs
        .iter()
        .map(|log| InsightActivity {
            timestamp: log.created_at,
            status_log: Some(log.clone()),
            occurrence: None,
        })
        .chain(occurrences.iter().map(|occurrence| InsightActivity {
            timestamp: occurrence.started,
            status_log: None,
            occurrence: Some(occurrence.clone()),
        }))
        .collect();
    activities.sort_by_key(|activity| activity.timestamp);

    for activity in &mut activities {
        let Some(log) = &activity.status_log else {
            continue;
        };
        if log.status != InsightStatus::New {
            continue;
        }
        activity.occurrence = occurrences
            .iter()
            .filter(|occurrence| occurrence.is_faulted && occurrence.started < log.created_at)
            .max_by_key(|occurrence| occurrence.started)
            .cloned();
    }

    activities
}
