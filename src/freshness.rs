//! Freshness comparison between the evaluated run and zarr's latest commit.
use crate::schema::{Commit, FreshnessVerdict, WorkflowRun};

const CURRENT_WINDOW_HOURS: f64 = 24.0;
const SLIGHTLY_STALE_WINDOW_HOURS: f64 = 72.0;

/// Classify how far behind zarr's latest commit the run started.
///
/// No commit means no comparison is possible; the verdict is absent rather
/// than pessimistic.
pub fn compare_freshness(run: &WorkflowRun, commit: Option<&Commit>) -> Option<FreshnessVerdict> {
    let commit = commit?;
    let delta = run.created_at.signed_duration_since(commit.date);
    let hours = (delta.num_seconds() as f64 / 3600.0).abs();

    let verdict = if hours <= CURRENT_WINDOW_HOURS && run.created_at >= commit.date {
        FreshnessVerdict::Current
    } else if hours <= SLIGHTLY_STALE_WINDOW_HOURS {
        FreshnessVerdict::SlightlyStale {
            hours_behind: hours,
        }
    } else {
        FreshnessVerdict::Stale {
            hours_behind: hours,
        }
    };
    Some(verdict)
}
