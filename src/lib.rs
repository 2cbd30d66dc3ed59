#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]

pub mod buffer;
pub mod cli;
pub mod config;
pub mod demo;
pub mod errors;
pub mod group;
pub mod harness;
pub mod listener;
pub mod models;
pub mod output;
pub mod ranges;
pub mod session;
pub mod transfer;

use anyhow::{Context, Result, anyhow};
use tracing::info;

use cli::{Cli, Commands, RunArgs};
use config::ReportConfig;
use group::{LocalGroup, ProcessGroup};
use listener::RankListener;
use output::Output;

pub use errors::{Error, Stage};

/// Applies command-line overrides on top of the file (or default) config.
fn resolve_config(args: &RunArgs) -> Result<ReportConfig> {
    let mut config = ReportConfig::load_or_default(args.config.as_deref())?;

    if let Some(printer) = args.printer {
        config.printer = printer;
    }
    if let Some(color) = args.color {
        config.color = color;
    }
    if args.show_successes {
        config.show_successes = true;
    }
    if args.no_elapsed {
        config.show_elapsed = false;
    }
    Ok(config)
}

/// Runs the demo suite on `args.ranks` in-process ranks. Returns whether
/// every rank passed every test.
fn run_ranks(args: RunArgs) -> Result<bool> {
    let config = resolve_config(&args)?;
    let color = config.color.resolve();
    let fail_on = args
        .fail_on
        .as_deref()
        .map(|list| ranges::parse_ranges(list, args.ranks))
        .transpose()
        .context("Invalid --fail-on rank list")?
        .unwrap_or_default();

    let harness = demo::harness(fail_on).with_filter(args.filter);
    let json = args.json;

    info!(ranks = args.ranks, delivery = args.delivery.as_ref(), "starting run");
    let results = LocalGroup::run(args.ranks, args.delivery, |group| {
        let rank = group.rank();
        let size = group.size();
        let mut listener = RankListener::new(group, config.max_payload_bytes, || {
            Output::stdout(&config, color, size).with_json(json)
        });
        harness.run(rank, size, &mut listener)
    })
    .context("Failed to run ranks")?;

    let mut passed = true;
    for (rank, result) in results.into_iter().enumerate() {
        passed &= result.with_context(|| format!("Rank {rank} aborted"))?;
    }
    Ok(passed)
}

/// Executes `cli`. `Ok(false)` means the run completed with test failures.
pub fn run(cli: Cli) -> Result<bool> {
    match cli.command {
        Commands::Run(args) => {
            if args.ranks == 0 {
                return Err(anyhow!("--ranks must be at least 1"));
            }
            run_ranks(args)
        }
        Commands::Ranges { list } => {
            let normalized = ranges::normalize_ranges(&list).context("Invalid rank list")?;
            println!("{normalized}");
            Ok(true)
        }
    }
}
