use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// autosnap - tag-driven snapshot scheduling, expiry and replication
#[derive(Parser)]
#[command(name = "autosnap")]
#[command(about = "Create, expire and replicate volume snapshots as configured by tags")]
#[command(version)]
pub struct Cli {
    /// Dry-run mode: decide everything, change nothing.
    ///
    /// Listing calls still run so the decisions are realistic; create,
    /// delete, copy and tag calls are logged instead of executed.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Log debug-level decisions (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one snapshot pass over every region
    Run {
        /// Inventory file the provider reads and writes
        #[arg(short, long)]
        inventory: PathBuf,

        /// Settings file (JSON); environment variables are used otherwise
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Evaluate schedules and expiry as of this date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        today: Option<NaiveDate>,

        /// Comma-separated regions to process instead of discovering them
        #[arg(short, long)]
        regions: Option<String>,

        /// Management tag key
        #[arg(long)]
        tag_key: Option<String>,

        /// Retention for volumes whose tag has none
        #[arg(long)]
        retention_days: Option<u32>,

        /// Maximum number of regions processed at once
        #[arg(short, long)]
        workers: Option<usize>,

        /// Write the JSON run report to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Decode a management tag value and show the decisions it leads to
    Inspect {
        #[command(subcommand)]
        target: InspectCommands,
    },
    /// Validate a settings file
    Validate {
        /// Path to the settings file to validate
        config: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum InspectCommands {
    /// Decode a volume tag (`enable=yes;type=weekly;when=mon;...`)
    VolumeTag {
        /// Raw tag value
        value: String,
        /// Evaluate as of this date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        today: Option<NaiveDate>,
        /// Retention for tags without a valid `retention`
        #[arg(long, default_value_t = crate::config::DEFAULT_RETENTION_DAYS)]
        retention_days: u32,
    },
    /// Decode a snapshot tag (`YYYY-MM-DD;region,region`)
    SnapshotTag {
        /// Raw tag value
        value: String,
        /// Evaluate as of this date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        today: Option<NaiveDate>,
    },
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, crate::run_context::DATE_FORMAT)
        .map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}

impl Cli {
    pub fn parse_args() -> Self {
        <Self as clap::Parser>::parse()
    }
}
