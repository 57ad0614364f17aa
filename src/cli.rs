//! CLI argument parsing for the upstream compatibility check.
//!
//! The CLI is intentionally thin: one no-argument invocation runs the whole
//! pipeline, and the only knobs select the transport and verbosity.
use clap::{Parser, ValueEnum};

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "uwatch",
    version,
    about = "Check xarray's upstream-dev CI for zarr compatibility",
    after_help = "Examples:\n  uwatch                Check the latest upstream-dev CI results\n  uwatch --api rest     Force the direct REST API (no gh CLI)\n  uwatch --verbose      Show per-run search progress\n\nThe check needs network access to GitHub. An authenticated gh CLI is\npicked up automatically and avoids REST rate limits; set UWATCH_API or\n--api to override detection."
)]
pub struct RootArgs {
    /// Transport for GitHub data: the gh CLI, direct REST calls, or
    /// availability-based auto-detection
    #[arg(long, value_enum, default_value_t = ApiChoice::Auto)]
    pub api: ApiChoice,

    /// Emit debug-level progress events to stderr
    #[arg(long)]
    pub verbose: bool,
}

/// Transport override accepted by `--api`.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApiChoice {
    Auto,
    Gh,
    Rest,
}
