use crate::config::InsightConfig;
use crate::error::{InsightError, InsightResult};
use crate::models::{Insight, InsightStatus, StatusLog};
use crate::store::{InsightStore, WorkflowApi};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A requested status change with its correlation ids.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub status: InsightStatus,
    pub reason: Option<String>,
    pub source_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
}

/// Legal transition targets per current status. `from == to` is handled as
/// a no-op before the table is consulted and does not appear here.
pub fn allowed_targets(from: InsightStatus) -> &'static [InsightStatus] {
    use crate::models::InsightStatus::*;
    match from {
        New => &[Open, InProgress, ReadyToResolve, Ignored, Deleted],
        Open => &[New, InProgress, ReadyToResolve, Ignored, Deleted],
        // No restrictions are placed on ReadyToResolve.
        ReadyToResolve => &[New, Open, InProgress, Resolved, Ignored, Deleted],
        InProgress => &[Resolved],
        Resolved => &[New],
        Ignored => &[New, Deleted],
        Deleted => &[],
    }
}

pub fn check_transition(from: InsightStatus, to: InsightStatus) -> InsightResult<()> {
    if allowed_targets(from).contains(&to) {
        Ok(())
    } else {
        Err(InsightError::invalid_transition(from, to))
    }
}

fn is_privileged_source(config: &InsightConfig, source_id: Option<Uuid>) -> bool {
    matches!(
        (source_id, config.automation_app_id),
        (Some(source), Some(app)) if source == app
    )
}

/// Validate a status-change request against the insight's current status.
///
/// Returns the status log to append when a transition (possibly rewritten)
/// is accepted, `None` for a true no-op. Ordinary callers go through the
/// transition table; the privileged automation source bypasses it, keeping
/// only the open-tickets downgrade on `InProgress -> Resolved`.
pub async fn validate_status_change<S: InsightStore, W: WorkflowApi>(
    store: &S,
    workflow: &W,
    config: &InsightConfig,
    insight: &Insight,
    change: &StatusChange,
    now: DateTime<Utc>,
) -> InsightResult<Option<StatusLog>> {
    if change.source_id.is_none() && change.user_id.is_none() {
        return Err(InsightError::bad_request(
            "insight status changes require a source id or a user id",
        ));
    }

    let requested = change.status;

    if insight.status != requested {
        let mut resulting = requested;
        if is_privileged_source(config, change.source_id) {
            if insight.status == InsightStatus::InProgress && requested == InsightStatus::Resolved {
                let has_open_tickets = workflow
                    .has_open_tickets(insight.id)
                    .await
                    .map_err(InsightError::Store)?;
                if has_open_tickets {
                    resulting = InsightStatus::ReadyToResolve;
                }
            }
        } else {
            check_transition(insight.status, requested)?;
            if insight.status == InsightStatus::InProgress && requested == InsightStatus::Resolved {
                let has_open_tickets = workflow
                    .has_open_tickets(insight.id)
                    .await
                    .map_err(InsightError::Store)?;
                if has_open_tickets {
                    return Err(InsightError::invalid_transition_because(
                        insight.status,
                        requested,
                        "it has open tickets",
                    ));
                }
            }
        }

        return Ok(Some(StatusLog::record(
            insight,
            resulting,
            change.reason.clone(),
            change.source_id,
            change.user_id,
            now,
        )));
    }

    // Re-requesting Ignored on an ignored insight means "unignore": the last
    // occurrence decides whether it comes back as New or Resolved.
    if requested == InsightStatus::Ignored && insight.status == InsightStatus::Ignored {
        let last_occurrence = store
            .last_occurrence(insight.id)
            .await
            .map_err(InsightError::Store)?;

        if let Some(last_occurrence) = last_occurrence {
            let (resulting, action) = if last_occurrence.is_valid && last_occurrence.is_faulted {
                (InsightStatus::New, "reactivated")
            } else {
                (InsightStatus::Resolved, "resolved")
            };
            let reason =
                format!("Admin {action} this insight to bring it out of the Ignored state.");

            return Ok(Some(StatusLog::record(
                insight,
                resulting,
                Some(reason),
                change.source_id,
                change.user_id,
                now,
            )));
        }
    }

    Ok(None)
}
