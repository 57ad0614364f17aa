//! Pipeline driver: select a run, gather evidence, assemble the result.
use thiserror::Error;

use crate::gateway::{GatewayError, RunGateway};
use crate::jobs::{find_detect_trigger_job, find_upstream_dev_job, jobs_or_empty};
use crate::logs::{extract_test_failures, extract_zarr_version};
use crate::schema::{Commit, CompatibilityResult, FailureReport, Job};
use crate::selector::select_evaluated_run;

/// Repository whose CI history is analyzed.
pub const XARRAY_REPO: &str = "pydata/xarray";
/// Repository of the tracked dependency.
pub const ZARR_REPO: &str = "zarr-developers/zarr-python";
/// Workflow file that carries the upstream-dev job.
pub const WORKFLOW_FILE: &str = "upstream-dev-ci.yaml";

const ZARR_BRANCH: &str = "main";

/// Fatal pipeline failures. Everything recoverable degrades to absent
/// fields on the result instead of surfacing here.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("no workflow runs found on main branch")]
    NoRunsFound,
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// One-shot analyzer for xarray's upstream-dev CI.
pub struct UpstreamChecker<'a> {
    gateway: &'a dyn RunGateway,
}

impl<'a> UpstreamChecker<'a> {
    pub fn new(gateway: &'a dyn RunGateway) -> Self {
        Self { gateway }
    }

    /// Run the full pipeline and assemble the compatibility result.
    pub fn check(&self) -> Result<CompatibilityResult, CheckError> {
        let run = select_evaluated_run(self.gateway, XARRAY_REPO, WORKFLOW_FILE)?;

        let jobs = jobs_or_empty(self.gateway, XARRAY_REPO, run.database_id);
        let detect_trigger_job = find_detect_trigger_job(&jobs).cloned();
        let upstream_dev_job = find_upstream_dev_job(&jobs).cloned();

        let logs = upstream_dev_job
            .as_ref()
            .and_then(|job| self.fetch_job_logs(job));
        let zarr_version = logs.as_deref().and_then(extract_zarr_version);

        let failures = match (&upstream_dev_job, logs.as_deref()) {
            (Some(job), Some(text)) if job.failed() => extract_test_failures(text),
            _ => FailureReport::default(),
        };

        let zarr_commit = self.latest_zarr_commit();

        Ok(CompatibilityResult {
            run,
            detect_trigger_job,
            upstream_dev_job,
            zarr_version,
            failures,
            zarr_commit,
        })
    }

    /// Fetch the target job's logs; inaccessible logs degrade to `None`.
    fn fetch_job_logs(&self, job: &Job) -> Option<String> {
        tracing::info!("getting logs for upstream-dev job {}", job.database_id);
        match self.gateway.job_logs(XARRAY_REPO, job.database_id) {
            Ok(logs) => {
                tracing::debug!("analyzing {} bytes of log data", logs.len());
                Some(logs)
            }
            Err(err) => {
                tracing::warn!("could not access logs for job {}: {err}", job.database_id);
                None
            }
        }
    }

    fn latest_zarr_commit(&self) -> Option<Commit> {
        match self.gateway.latest_commit(ZARR_REPO, ZARR_BRANCH) {
            Ok(commit) => commit,
            Err(err) => {
                tracing::warn!("could not fetch latest zarr commit: {err}");
                None
            }
        }
    }
}
