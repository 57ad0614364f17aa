//! Data model for workflow runs, jobs, and the compatibility report.
//!
//! The serde types mirror the field set requested from `gh run list --json`;
//! the REST transport maps GitHub's snake_case payloads into the same
//! structs so the rest of the pipeline never knows which transport ran.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeSet;

/// One execution instance of a CI workflow.
///
/// Immutable once fetched; represents a historical fact. Identity is
/// `database_id`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRun {
    #[serde(rename = "databaseId")]
    pub database_id: u64,
    pub number: u64,
    pub head_branch: String,
    pub head_sha: String,
    pub status: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub conclusion: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub event: String,
}

/// A named unit of work within a run (e.g. one test matrix cell).
///
/// `name` is unstructured text used for heuristic matching, not a stable key.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    #[serde(rename = "databaseId")]
    pub database_id: u64,
    pub name: String,
    pub status: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub conclusion: Option<String>,
}

impl Job {
    /// Whether the job genuinely ran its steps, as opposed to being skipped,
    /// cancelled, or still in progress.
    pub fn executed(&self) -> bool {
        matches!(self.conclusion.as_deref(), Some("success") | Some("failure"))
    }

    pub fn failed(&self) -> bool {
        self.conclusion.as_deref() == Some("failure")
    }
}

/// Latest known state of the tracked dependency's source branch.
#[derive(Debug, Clone, Deserialize)]
pub struct Commit {
    pub sha: String,
    pub date: DateTime<Utc>,
}

/// Categorized test failures mined from one job's logs.
///
/// Display names keep at most the last two `::` segments of the raw test id,
/// with the run-wide error-type set appended in parentheses when non-empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureReport {
    pub zarr_related: Vec<String>,
    pub other_failures: Vec<String>,
    pub error_types: BTreeSet<String>,
    pub total_failures: usize,
}

impl FailureReport {
    pub fn is_empty(&self) -> bool {
        self.total_failures == 0
    }
}

/// How recent the evaluated run is relative to zarr's latest commit.
///
/// A heuristic signal, not a correctness guarantee: a run can be current by
/// this rule yet predate a commit pushed while the job was running.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FreshnessVerdict {
    Current,
    SlightlyStale { hours_behind: f64 },
    Stale { hours_behind: f64 },
}

/// Aggregate result of one compatibility check, consumed by the renderer.
#[derive(Debug)]
pub struct CompatibilityResult {
    pub run: WorkflowRun,
    pub detect_trigger_job: Option<Job>,
    pub upstream_dev_job: Option<Job>,
    pub zarr_version: Option<String>,
    pub failures: FailureReport,
    pub zarr_commit: Option<Commit>,
}

// The gh CLI reports in-flight conclusions as "" while REST reports null;
// normalize both to None so conclusion checks behave the same on either
// transport.
fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}
