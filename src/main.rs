use anyhow::Result;
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

mod checker;
mod cli;
mod freshness;
mod gateway;
mod jobs;
mod logs;
mod render;
mod schema;
mod selector;

use cli::{ApiChoice, RootArgs};
use gateway::ApiPreference;

fn main() -> Result<()> {
    let args = RootArgs::parse();
    init_tracing(args.verbose);

    let gateway = gateway::select_gateway(resolve_api_preference(args.api))?;
    let checker = checker::UpstreamChecker::new(gateway.as_ref());
    let result = checker.check()?;
    let verdict = freshness::compare_freshness(&result.run, result.zarr_commit.as_ref());
    print!("{}", render::render_report(&result, verdict.as_ref()));
    Ok(())
}

/// An explicit flag wins; `auto` defers to the `UWATCH_API` environment
/// variable before falling back to availability probing.
fn resolve_api_preference(choice: ApiChoice) -> ApiPreference {
    match choice {
        ApiChoice::Gh => ApiPreference::Gh,
        ApiChoice::Rest => ApiPreference::Rest,
        ApiChoice::Auto => ApiPreference::from_env().unwrap_or(ApiPreference::Auto),
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("UWATCH_LOG")
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init()
        .ok();
}
