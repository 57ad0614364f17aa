//! Plain-text report rendering.
//!
//! Pure string assembly: the renderer never talks to the gateway and never
//! prints, so every output shape is testable without capturing stdout.
use chrono::{DateTime, SecondsFormat, Utc};

use crate::checker::XARRAY_REPO;
use crate::schema::{CompatibilityResult, FailureReport, FreshnessVerdict, Job, WorkflowRun};

const MAX_LISTED_FAILURES: usize = 3;

/// Render the full report for one compatibility check.
pub fn render_report(
    result: &CompatibilityResult,
    freshness: Option<&FreshnessVerdict>,
) -> String {
    let mut out = String::new();

    push_section(&mut out, "Most recent run with tests");
    let run = &result.run;
    let conclusion = run.conclusion.as_deref().unwrap_or(&run.status);
    push_line(&mut out, &format!("Workflow status: {conclusion}"));
    push_line(&mut out, "");
    render_run_details(&mut out, run);

    push_section(&mut out, "Upstream-dev job");
    push_line(&mut out, &job_status_line(result.upstream_dev_job.as_ref()));
    if let Some(job) = &result.detect_trigger_job {
        let state = job.conclusion.as_deref().unwrap_or(&job.status);
        push_line(&mut out, &format!("Trigger detection: {} ({state})", job.name));
    }

    if let Some(version) = &result.zarr_version {
        push_section(&mut out, "Version info");
        push_line(&mut out, &format!("Zarr version tested: {version}"));
    }

    render_failures(&mut out, result);

    if let Some(verdict) = freshness {
        render_freshness(&mut out, result, verdict);
    }

    push_section(&mut out, "Summary");
    push_line(&mut out, &summary_line(result));

    out
}

fn render_run_details(out: &mut String, run: &WorkflowRun) {
    push_line(out, &format!("Workflow ID: {}", run.database_id));
    push_line(out, &format!("Run number:  {}", run.number));
    push_line(out, &format!("Branch:      {}", run.head_branch));
    push_line(out, &format!("Commit:      {}", short_sha(&run.head_sha)));
    push_line(out, &format!("Event:       {}", run.event));
    push_line(out, &format!("Started:     {}", format_time(&run.created_at)));
    push_line(out, &format!("Completed:   {}", format_time(&run.updated_at)));
    push_line(out, &format!("URL:         {}", run_url(run)));
}

fn job_status_line(job: Option<&Job>) -> String {
    let Some(job) = job else {
        return "Upstream-dev job not found in this run".to_string();
    };
    match job.conclusion.as_deref() {
        Some("skipped") => "Upstream-dev job was skipped (tests not triggered)".to_string(),
        Some("success") => "Upstream-dev job ran successfully".to_string(),
        Some("failure") => "Upstream-dev job failed".to_string(),
        Some(other) => format!("Upstream-dev job concluded: {other}"),
        None => format!("Upstream-dev job status: {}", job.status),
    }
}

fn render_failures(out: &mut String, result: &CompatibilityResult) {
    let failures = &result.failures;
    if !failures.is_empty() {
        push_section(
            out,
            &format!("Test failures ({} total)", failures.total_failures),
        );
        render_failure_list(out, "Zarr-related", &failures.zarr_related);
        render_failure_list(out, "Other upstream", &failures.other_failures);
        if !failures.error_types.is_empty() {
            let joined = failures
                .error_types
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            push_line(out, &format!("Error types: {joined}"));
        }
        push_line(out, &analysis_line(failures));
    } else if result
        .upstream_dev_job
        .as_ref()
        .is_some_and(|job| job.failed())
    {
        // There were failures, but the logs could not be mined.
        push_section(out, "Test failures");
        push_line(
            out,
            "Tests failed, but logs were not accessible to determine specific failures.",
        );
        push_line(
            out,
            &format!("Check the workflow logs manually: {}", run_url(&result.run)),
        );
    }
}

fn render_failure_list(out: &mut String, label: &str, names: &[String]) {
    if names.is_empty() {
        return;
    }
    push_line(out, &format!("{label} ({}):", names.len()));
    for name in names.iter().take(MAX_LISTED_FAILURES) {
        push_line(out, &format!("  {name}"));
    }
    if names.len() > MAX_LISTED_FAILURES {
        push_line(
            out,
            &format!("  ... and {} more", names.len() - MAX_LISTED_FAILURES),
        );
    }
}

fn analysis_line(failures: &FailureReport) -> String {
    let zarr = !failures.zarr_related.is_empty();
    let other = !failures.other_failures.is_empty();
    match (zarr, other) {
        (true, false) => "All failures appear to be zarr-related".to_string(),
        (false, true) => "All failures appear to be from other upstream dependencies".to_string(),
        (true, true) => "Mixed failures: both zarr and other upstream issues".to_string(),
        (false, false) => "Could not categorize test failures".to_string(),
    }
}

fn render_freshness(out: &mut String, result: &CompatibilityResult, verdict: &FreshnessVerdict) {
    push_section(out, "Freshness");
    let line = match verdict {
        FreshnessVerdict::Current => {
            "Workflow is current with latest zarr commits".to_string()
        }
        FreshnessVerdict::SlightlyStale { hours_behind } => format!(
            "Workflow may be slightly outdated ({hours_behind:.1} hours behind zarr)"
        ),
        FreshnessVerdict::Stale { hours_behind } => format!(
            "Workflow appears outdated ({:.1} days behind zarr)",
            hours_behind / 24.0
        ),
    };
    push_line(out, &line);
    if let Some(commit) = &result.zarr_commit {
        push_line(
            out,
            &format!(
                "Latest zarr commit: {} ({})",
                short_sha(&commit.sha),
                format_time(&commit.date)
            ),
        );
    }
    push_line(
        out,
        &format!("Workflow started: {}", format_time(&result.run.created_at)),
    );
}

fn summary_line(result: &CompatibilityResult) -> String {
    match result.upstream_dev_job.as_ref() {
        Some(job) if job.conclusion.as_deref() == Some("success") => {
            match &result.zarr_version {
                Some(version) => {
                    format!("All upstream-dev tests passed with zarr {version}")
                }
                None => "All upstream-dev tests passed (zarr version not detected)".to_string(),
            }
        }
        Some(job) if job.failed() => "Upstream-dev tests ran but failed".to_string(),
        _ => "Upstream-dev tests were skipped (likely no changes detected)".to_string(),
    }
}

fn run_url(run: &WorkflowRun) -> String {
    format!(
        "https://github.com/{XARRAY_REPO}/actions/runs/{}",
        run.database_id
    )
}

fn short_sha(sha: &str) -> &str {
    &sha[..sha.len().min(8)]
}

fn format_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn push_section(out: &mut String, title: &str) {
    if !out.is_empty() {
        out.push('\n');
    }
    push_line(out, &format!("== {title} =="));
}

fn push_line(out: &mut String, line: &str) {
    out.push_str(line);
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::{job, run_at};
    use crate::schema::Commit;
    use std::collections::BTreeSet;

    fn failed_result() -> CompatibilityResult {
        let mut error_types = BTreeSet::new();
        error_types.insert("ValueError".to_string());
        CompatibilityResult {
            run: run_at(17065239847, "schedule", "2025-08-18T00:21:14Z"),
            detect_trigger_job: Some(job(11, "detect ci trigger", Some("success"))),
            upstream_dev_job: Some(job(12, "upstream-dev (3.13)", Some("failure"))),
            zarr_version: Some("3.1.3.dev23+g62d1a6abc".to_string()),
            failures: FailureReport {
                zarr_related: vec![
                    "TestZarr::test_chunk (ValueError)".to_string(),
                    "TestZarr::test_codec (ValueError)".to_string(),
                    "TestZarr::test_storage (ValueError)".to_string(),
                    "TestZarr::test_buffer (ValueError)".to_string(),
                ],
                other_failures: vec!["TestMisc::test_other (ValueError)".to_string()],
                error_types,
                total_failures: 5,
            },
            zarr_commit: Some(Commit {
                sha: "62d1a6abc0d7f8e9a1b2".to_string(),
                date: "2025-08-17T20:00:00Z".parse().expect("commit date"),
            }),
        }
    }

    #[test]
    fn renders_failed_run_report() {
        let result = failed_result();
        let report = render_report(&result, Some(&FreshnessVerdict::Current));

        assert!(report.contains("Workflow status: failure"));
        assert!(report.contains("Workflow ID: 17065239847"));
        assert!(report.contains(
            "URL:         https://github.com/pydata/xarray/actions/runs/17065239847"
        ));
        assert!(report.contains("Upstream-dev job failed"));
        assert!(report.contains("Trigger detection: detect ci trigger (success)"));
        assert!(report.contains("Zarr version tested: 3.1.3.dev23+g62d1a6abc"));
        assert!(report.contains("== Test failures (5 total) =="));
        assert!(report.contains("Zarr-related (4):"));
        assert!(report.contains("  ... and 1 more"));
        assert!(report.contains("Error types: ValueError"));
        assert!(report.contains("Mixed failures: both zarr and other upstream issues"));
        assert!(report.contains("Workflow is current with latest zarr commits"));
        assert!(report.contains("Latest zarr commit: 62d1a6ab (2025-08-17T20:00:00Z)"));
        assert!(report.contains("Upstream-dev tests ran but failed"));
    }

    #[test]
    fn renders_manual_log_hint_when_failure_details_missing() {
        let mut result = failed_result();
        result.failures = FailureReport::default();
        result.zarr_version = None;
        let report = render_report(&result, None);

        assert!(report.contains("logs were not accessible"));
        assert!(report.contains("Check the workflow logs manually:"));
        assert!(!report.contains("== Version info =="));
        assert!(!report.contains("== Freshness =="));
    }

    #[test]
    fn renders_skipped_job_summary() {
        let mut result = failed_result();
        result.upstream_dev_job = Some(job(12, "upstream-dev", Some("skipped")));
        result.failures = FailureReport::default();
        let report = render_report(&result, None);

        assert!(report.contains("Upstream-dev job was skipped (tests not triggered)"));
        assert!(report.contains("Upstream-dev tests were skipped (likely no changes detected)"));
    }

    #[test]
    fn renders_success_summary_with_and_without_version() {
        let mut result = failed_result();
        result.upstream_dev_job = Some(job(12, "upstream-dev", Some("success")));
        result.failures = FailureReport::default();
        let report = render_report(&result, None);
        assert!(report.contains("All upstream-dev tests passed with zarr 3.1.3.dev23+g62d1a6abc"));

        result.zarr_version = None;
        let report = render_report(&result, None);
        assert!(report.contains("All upstream-dev tests passed (zarr version not detected)"));
    }

    #[test]
    fn renders_missing_job_state() {
        let mut result = failed_result();
        result.upstream_dev_job = None;
        result.failures = FailureReport::default();
        let report = render_report(&result, None);
        assert!(report.contains("Upstream-dev job not found in this run"));
    }

    #[test]
    fn renders_stale_freshness_in_days() {
        let result = failed_result();
        let report = render_report(
            &result,
            Some(&FreshnessVerdict::Stale {
                hours_behind: 200.0,
            }),
        );
        assert!(report.contains("Workflow appears outdated (8.3 days behind zarr)"));
    }
}
