//! Job-matching heuristics for the upstream-dev workflow.
//!
//! Job names are free text from the workflow definition (matrix cells render
//! as e.g. `upstream-dev (3.13)`), so matching is by name prefix/substring,
//! first match in gateway order. Absence of a match is a legitimate outcome:
//! skip-matrix and docs-only runs simply do not carry the job.
use crate::gateway::RunGateway;
use crate::schema::Job;

/// Find the job that exercises zarr's development branch against the suite.
///
/// Excludes the `detect-ci-trigger` helper and the mypy variant, both of
/// which share the `upstream-dev` name family without running the tests.
pub fn find_upstream_dev_job(jobs: &[Job]) -> Option<&Job> {
    jobs.iter().find(|job| {
        let name = job.name.to_lowercase();
        name.starts_with("upstream-dev") && !name.contains("detect") && !name.contains("mypy")
    })
}

/// Find the helper job that decides whether upstream tests get triggered.
///
/// Reported separately in the output but never analyzed further.
pub fn find_detect_trigger_job(jobs: &[Job]) -> Option<&Job> {
    jobs.iter().find(|job| {
        let name = job.name.to_lowercase();
        name.contains("detect") && name.contains("trigger")
    })
}

/// Fetch a run's jobs, degrading a transport failure to an empty list.
///
/// A single run with unreadable jobs must not abort the search; the caller
/// sees "no jobs" and moves on.
pub fn jobs_or_empty(gateway: &dyn RunGateway, repo: &str, run_id: u64) -> Vec<Job> {
    match gateway.list_jobs(repo, run_id) {
        Ok(jobs) => jobs,
        Err(err) => {
            tracing::warn!("could not get jobs for run {run_id}: {err}");
            Vec::new()
        }
    }
}
