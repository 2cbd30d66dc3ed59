use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::config::{ColorChoice, PrinterKind};
use crate::group::Delivery;

#[derive(Parser)]
#[command(name = "rankreport")]
#[command(about = "One coherent test report for process-parallel test runs", long_about = None)]
pub struct Cli {
    /// Log more to stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the demo suite on a group of in-process ranks
    Run(RunArgs),

    /// Normalize a rank list into compact range notation
    Ranges {
        /// Ranks and ranges, e.g. "7,0-2,5,8"
        list: String,
    },
}

#[derive(Args)]
pub struct RunArgs {
    /// Number of ranks in the group
    #[arg(long, short = 'n', default_value_t = 4)]
    pub ranks: usize,

    /// Report configuration file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Report layout
    #[arg(long, value_enum)]
    pub printer: Option<PrinterKind>,

    /// When to color output
    #[arg(long, value_enum)]
    pub color: Option<ColorChoice>,

    /// Also print passing assertions
    #[arg(long)]
    pub show_successes: bool,

    /// Omit elapsed times from the report
    #[arg(long)]
    pub no_elapsed: bool,

    /// Send semantics of the in-process group
    #[arg(long, value_enum, default_value_t = Delivery::Buffered)]
    pub delivery: Delivery,

    /// Ranks on which FailOnSelectedRanks fails, e.g. "1-3,6"
    #[arg(long)]
    pub fail_on: Option<String>,

    /// Only run tests whose Suite.Name contains this text
    #[arg(long)]
    pub filter: Option<String>,

    /// Output the run summary as JSON instead of the text report
    #[arg(long)]
    pub json: bool,
}
