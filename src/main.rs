pub mod cache;
pub mod config;
pub mod exec;
pub mod loc;
pub mod outcome;
pub mod run;
pub mod types;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use clap::builder::FalseyValueParser;

use crate::config::{Config, DEFAULT_STATS_TOOL};
use crate::exec::SystemRunner;
use crate::run::{RunError, run};

#[derive(Parser)]
#[command(
    name = "gitloc",
    version,
    about = "Mirror a git repository locally and report its lines of code"
)]
struct Cli {
    /// Repository URL, e.g. https://github.com/owner/repo.git
    url: String,

    /// Root directory for working copies
    #[arg(long, env = "DA_GIT_REPOS_PATH")]
    repos_path: Option<PathBuf>,

    /// Root directory for per-organization stats caches
    #[arg(long, env = "DA_GIT_CACHE_PATH")]
    cache_path: Option<PathBuf>,

    /// Log every external command and cache access
    #[arg(long, env = "GITOPS_VERBOSE", value_parser = FalseyValueParser::new())]
    verbose: bool,

    /// Keep the working copy after measuring
    #[arg(long, env = "SKIP_CLEANUP", value_parser = FalseyValueParser::new())]
    skip_cleanup: bool,

    /// Delete the working copy whatever its size
    #[arg(long, env = "GITOPS_FORCE_CLEANUP", value_parser = FalseyValueParser::new())]
    force_cleanup: bool,

    /// Lay working copies out as <org>/<repo> instead of <org>-<repo>
    #[arg(long, env = "GITOPS_FOLLOW_HIERARCHY", value_parser = FalseyValueParser::new())]
    follow_hierarchy: bool,

    /// Line counter to run against the working copy
    #[arg(long, env = "GITOPS_STATS_TOOL", default_value = DEFAULT_STATS_TOOL)]
    stats_tool: String,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let filter = if cli.verbose { "warn,gitloc=debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    match cmd_run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn cmd_run(cli: Cli) -> Result<ExitCode, RunError> {
    let config = Config::with_home_defaults(cli.repos_path, cli.cache_path)?
        .with_verbose(cli.verbose)
        .with_skip_cleanup(cli.skip_cleanup)
        .with_force_cleanup(cli.force_cleanup)
        .with_follow_hierarchy(cli.follow_hierarchy)
        .with_stats_tool(cli.stats_tool);

    let report = run(&config, &SystemRunner, &cli.url)?;

    log::debug!("repository path: {}", report.working_copy.display());
    log::debug!("cache path: {}", report.stats_file.display());

    if report.outcome.is_errored() {
        return Ok(ExitCode::FAILURE);
    }

    match serde_json::to_string(&report.loc) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error: cannot encode result: {}", e);
            return Ok(ExitCode::FAILURE);
        }
    }

    Ok(ExitCode::SUCCESS)
}
