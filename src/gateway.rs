//! GitHub data access behind a single capability surface.
//!
//! The pipeline consumes four operations (list runs, list jobs, fetch job
//! logs, fetch latest commit) through [`RunGateway`]; which transport serves
//! them is decided once at startup. The gh CLI transport shells out to `gh`
//! and parses its JSON stdout; the REST transport issues blocking HTTP
//! requests against api.github.com and maps the snake_case payloads into the
//! gh-shaped model. Core code never branches on the active transport.
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::env;
use std::io;
use std::process::Command;
use std::time::Duration;
use thiserror::Error;

use crate::schema::{Commit, Job, WorkflowRun};

/// Environment variable selecting the transport when `--api` is `auto`.
pub const API_ENV: &str = "UWATCH_API";
/// Environment variable overriding the `gh` invocation (shell-words parsed).
pub const GH_COMMAND_ENV: &str = "UWATCH_GH_COMMAND";

const GITHUB_API_BASE: &str = "https://api.github.com";
const USER_AGENT: &str = concat!("upstream-watch/", env!("CARGO_PKG_VERSION"));
const RUN_LIST_FIELDS: &str =
    "databaseId,number,headBranch,headSha,status,conclusion,createdAt,updatedAt,event";

// Job logs for a full matrix cell routinely run to tens of megabytes.
const LOG_BYTE_LIMIT: u64 = 64 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gh CLI not found. Install GitHub CLI: https://cli.github.com/")]
    GhMissing,
    #[error("gh CLI not authenticated. Run: gh auth login")]
    GhUnauthenticated,
    #[error("gh CLI error: {0}")]
    GhFailed(String),
    #[error("invalid UWATCH_GH_COMMAND override: {0}")]
    BadGhCommand(String),
    #[error(
        "GitHub API rate limit exceeded. Try again later or authenticate the gh CLI for higher limits."
    )]
    RateLimited,
    #[error("repository or resource not found")]
    NotFound,
    #[error("GitHub API returned status {0}")]
    Http(u16),
    #[error("network error accessing GitHub API: {0}")]
    Network(String),
    #[error("invalid JSON response: {0}")]
    InvalidJson(String),
}

/// Filter for [`RunGateway::list_runs`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RunFilter<'a> {
    pub event: Option<&'a str>,
    pub branch: Option<&'a str>,
    pub limit: usize,
}

/// The capability surface the pipeline runs against.
pub trait RunGateway {
    fn list_runs(
        &self,
        repo: &str,
        workflow: &str,
        filter: &RunFilter,
    ) -> Result<Vec<WorkflowRun>, GatewayError>;

    fn list_jobs(&self, repo: &str, run_id: u64) -> Result<Vec<Job>, GatewayError>;

    fn job_logs(&self, repo: &str, job_id: u64) -> Result<String, GatewayError>;

    fn latest_commit(&self, repo: &str, branch: &str) -> Result<Option<Commit>, GatewayError>;
}

/// Transport preference from the CLI flag or `UWATCH_API`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiPreference {
    Auto,
    Gh,
    Rest,
}

impl ApiPreference {
    /// Read `UWATCH_API`; unknown values are warned about and ignored.
    pub fn from_env() -> Option<Self> {
        let raw = env::var(API_ENV).ok()?;
        match raw.to_lowercase().as_str() {
            "auto" => Some(ApiPreference::Auto),
            "gh" => Some(ApiPreference::Gh),
            "rest" => Some(ApiPreference::Rest),
            other => {
                tracing::warn!("ignoring unknown {API_ENV} value: {other}");
                None
            }
        }
    }
}

/// Pick a transport by preference and availability probing.
///
/// `auto` and `gh` probe for an authenticated gh CLI and fall back to the
/// REST transport when the probe fails; `rest` skips probing entirely.
pub fn select_gateway(preference: ApiPreference) -> Result<Box<dyn RunGateway>, GatewayError> {
    match preference {
        ApiPreference::Rest => {
            tracing::info!("using direct GitHub REST API (as requested)");
            Ok(Box::new(RestGateway::new()))
        }
        ApiPreference::Gh => {
            let gh = GhCliGateway::from_env()?;
            if gh.available() {
                tracing::info!("using gh CLI (as requested)");
                Ok(Box::new(gh))
            } else {
                tracing::warn!("gh CLI requested but not available, falling back to REST API");
                Ok(Box::new(RestGateway::new()))
            }
        }
        ApiPreference::Auto => {
            let gh = GhCliGateway::from_env()?;
            if gh.available() {
                tracing::info!("using gh CLI (authenticated)");
                Ok(Box::new(gh))
            } else {
                tracing::warn!("gh CLI not available, using direct GitHub API (rate limited)");
                Ok(Box::new(RestGateway::new()))
            }
        }
    }
}

/// Transport that shells out to the gh CLI and parses its JSON stdout.
pub struct GhCliGateway {
    argv: Vec<String>,
}

impl GhCliGateway {
    /// Build the gh invocation, honoring the `UWATCH_GH_COMMAND` override.
    pub fn from_env() -> Result<Self, GatewayError> {
        let argv = match env::var(GH_COMMAND_ENV) {
            Ok(raw) => shell_words::split(&raw)
                .map_err(|err| GatewayError::BadGhCommand(err.to_string()))?,
            Err(_) => vec!["gh".to_string()],
        };
        if argv.is_empty() {
            return Err(GatewayError::BadGhCommand("empty command".to_string()));
        }
        Ok(Self { argv })
    }

    /// Probe for a usable, authenticated gh CLI.
    pub fn available(&self) -> bool {
        if which::which(&self.argv[0]).is_err() {
            return false;
        }
        let authenticated = self
            .command(&["auth", "status"])
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false);
        if !authenticated {
            tracing::warn!("gh CLI found but not authenticated");
        }
        authenticated
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut command = Command::new(&self.argv[0]);
        command.args(&self.argv[1..]).args(args);
        command
    }

    fn run_text(&self, args: &[&str]) -> Result<String, GatewayError> {
        let output = self.command(args).output().map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                GatewayError::GhMissing
            } else {
                GatewayError::GhFailed(err.to_string())
            }
        })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_gh_stderr(&stderr));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn run_json<T: DeserializeOwned>(&self, args: &[&str]) -> Result<T, GatewayError> {
        let stdout = self.run_text(args)?;
        serde_json::from_str(&stdout).map_err(|err| GatewayError::InvalidJson(err.to_string()))
    }
}

fn classify_gh_stderr(stderr: &str) -> GatewayError {
    let lower = stderr.to_lowercase();
    if lower.contains("command not found") || lower.contains("not found") {
        GatewayError::GhMissing
    } else if lower.contains("authentication") || lower.contains("not logged in") {
        GatewayError::GhUnauthenticated
    } else {
        GatewayError::GhFailed(stderr.trim().to_string())
    }
}

#[derive(Deserialize)]
struct JobsPayload {
    #[serde(default)]
    jobs: Vec<Job>,
}

impl RunGateway for GhCliGateway {
    fn list_runs(
        &self,
        repo: &str,
        workflow: &str,
        filter: &RunFilter,
    ) -> Result<Vec<WorkflowRun>, GatewayError> {
        let limit = filter.limit.to_string();
        let mut args = vec![
            "run",
            "list",
            "--repo",
            repo,
            "--workflow",
            workflow,
            "--limit",
            limit.as_str(),
            "--json",
            RUN_LIST_FIELDS,
        ];
        if let Some(event) = filter.event {
            args.extend(["--event", event]);
        }
        if let Some(branch) = filter.branch {
            args.extend(["--branch", branch]);
        }
        self.run_json(&args)
    }

    fn list_jobs(&self, repo: &str, run_id: u64) -> Result<Vec<Job>, GatewayError> {
        let id = run_id.to_string();
        let payload: JobsPayload =
            self.run_json(&["run", "view", &id, "--repo", repo, "--json", "jobs"])?;
        Ok(payload.jobs)
    }

    fn job_logs(&self, repo: &str, job_id: u64) -> Result<String, GatewayError> {
        let endpoint = format!("repos/{repo}/actions/jobs/{job_id}/logs");
        self.run_text(&["api", &endpoint])
    }

    fn latest_commit(&self, repo: &str, branch: &str) -> Result<Option<Commit>, GatewayError> {
        let endpoint = format!("repos/{repo}/commits?sha={branch}&per_page=1");
        let commit: Commit = self.run_json(&[
            "api",
            &endpoint,
            "--jq",
            ".[0] | {sha: .sha, date: .commit.author.date}",
        ])?;
        Ok(Some(commit))
    }
}

/// Transport that issues blocking HTTP requests against api.github.com.
pub struct RestGateway {
    agent: ureq::Agent,
    base: String,
}

impl RestGateway {
    pub fn new() -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(30)))
            .build();
        Self {
            agent: config.into(),
            base: GITHUB_API_BASE.to_string(),
        }
    }

    fn request(
        &self,
        path_and_query: &str,
    ) -> Result<ureq::http::Response<ureq::Body>, GatewayError> {
        let url = format!("{}/{}", self.base, path_and_query.trim_start_matches('/'));
        match self
            .agent
            .get(&url)
            .header("Accept", "application/vnd.github.v3+json")
            .header("User-Agent", USER_AGENT)
            .call()
        {
            Ok(response) => Ok(response),
            Err(ureq::Error::StatusCode(403)) => Err(GatewayError::RateLimited),
            Err(ureq::Error::StatusCode(404)) => Err(GatewayError::NotFound),
            Err(ureq::Error::StatusCode(code)) => Err(GatewayError::Http(code)),
            Err(err) => Err(GatewayError::Network(err.to_string())),
        }
    }

    fn get_json<T: DeserializeOwned>(&self, path_and_query: &str) -> Result<T, GatewayError> {
        let mut response = self.request(path_and_query)?;
        response
            .body_mut()
            .read_json()
            .map_err(|err| GatewayError::InvalidJson(err.to_string()))
    }
}

impl Default for RestGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct RestRunsPayload {
    #[serde(default)]
    workflow_runs: Vec<RestRun>,
}

#[derive(Deserialize)]
struct RestRun {
    id: u64,
    run_number: u64,
    head_branch: String,
    head_sha: String,
    status: String,
    conclusion: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    event: String,
    #[serde(default)]
    path: String,
}

impl From<RestRun> for WorkflowRun {
    fn from(run: RestRun) -> Self {
        WorkflowRun {
            database_id: run.id,
            number: run.run_number,
            head_branch: run.head_branch,
            head_sha: run.head_sha,
            status: run.status,
            conclusion: run.conclusion.filter(|c| !c.is_empty()),
            created_at: run.created_at,
            updated_at: run.updated_at,
            event: run.event,
        }
    }
}

#[derive(Deserialize)]
struct RestJobsPayload {
    #[serde(default)]
    jobs: Vec<RestJob>,
}

#[derive(Deserialize)]
struct RestJob {
    id: u64,
    name: String,
    status: String,
    conclusion: Option<String>,
}

impl From<RestJob> for Job {
    fn from(job: RestJob) -> Self {
        Job {
            database_id: job.id,
            name: job.name,
            status: job.status,
            conclusion: job.conclusion.filter(|c| !c.is_empty()),
        }
    }
}

#[derive(Deserialize)]
struct RestCommit {
    sha: String,
    commit: RestCommitMeta,
}

#[derive(Deserialize)]
struct RestCommitMeta {
    author: RestCommitAuthor,
}

#[derive(Deserialize)]
struct RestCommitAuthor {
    date: DateTime<Utc>,
}

impl RunGateway for RestGateway {
    fn list_runs(
        &self,
        repo: &str,
        workflow: &str,
        filter: &RunFilter,
    ) -> Result<Vec<WorkflowRun>, GatewayError> {
        let mut query = format!("per_page={}", filter.limit);
        if let Some(event) = filter.event {
            query.push_str(&format!("&event={event}"));
        }
        if let Some(branch) = filter.branch {
            query.push_str(&format!("&branch={branch}"));
        }
        let payload: RestRunsPayload =
            self.get_json(&format!("repos/{repo}/actions/runs?{query}"))?;
        // The runs endpoint is not filterable by workflow file; match on the
        // workflow path instead, as `gh run list --workflow` would.
        Ok(payload
            .workflow_runs
            .into_iter()
            .filter(|run| run.path.contains(workflow))
            .map(Into::into)
            .collect())
    }

    fn list_jobs(&self, repo: &str, run_id: u64) -> Result<Vec<Job>, GatewayError> {
        let payload: RestJobsPayload =
            self.get_json(&format!("repos/{repo}/actions/runs/{run_id}/jobs"))?;
        Ok(payload.jobs.into_iter().map(Into::into).collect())
    }

    fn job_logs(&self, repo: &str, job_id: u64) -> Result<String, GatewayError> {
        let mut response = self.request(&format!("repos/{repo}/actions/jobs/{job_id}/logs"))?;
        response
            .body_mut()
            .with_config()
            .limit(LOG_BYTE_LIMIT)
            .read_to_string()
            .map_err(|err| GatewayError::Network(err.to_string()))
    }

    fn latest_commit(&self, repo: &str, branch: &str) -> Result<Option<Commit>, GatewayError> {
        let commits: Vec<RestCommit> =
            self.get_json(&format!("repos/{repo}/commits?sha={branch}&per_page=1"))?;
        Ok(commits.into_iter().next().map(|entry| Commit {
            sha: entry.sha,
            date: entry.commit.author.date,
        }))
    }
}
