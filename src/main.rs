//! autosnap - Main entry point
//!
//! Loads settings and an inventory, runs the snapshot policy engine over it
//! and reports what happened.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, NaiveDateTime};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use autosnap::cli::{Cli, Commands, InspectCommands};
use autosnap::config::{parse_region_list, Settings};
use autosnap::engine::replication::plan_copies;
use autosnap::engine::retention::{self, RetentionDecision};
use autosnap::engine::schedule::{self, ScheduleDecision};
use autosnap::engine::{SnapshotRecord, VolumePolicy};
use autosnap::{
    coordinator, init_signal_handlers, CancelFlag, DryRunProvider, InventoryProvider, RunContext,
};

/// Initialize the subscriber; RUST_LOG overrides the level chosen here
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Options of the `run` command after parsing
struct RunArgs {
    inventory: PathBuf,
    config: Option<PathBuf>,
    today: Option<NaiveDate>,
    regions: Option<String>,
    tag_key: Option<String>,
    retention_days: Option<u32>,
    workers: Option<usize>,
    report: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_tracing(cli.verbose);
    debug!("CLI arguments parsed");

    match cli.command {
        Commands::Run {
            inventory,
            config,
            today,
            regions,
            tag_key,
            retention_days,
            workers,
            report,
        } => {
            let args = RunArgs {
                inventory,
                config,
                today,
                regions,
                tag_key,
                retention_days,
                workers,
                report,
            };
            run_snapshot_job(args, cli.dry_run)
        }
        Commands::Inspect { target } => match target {
            InspectCommands::VolumeTag {
                value,
                today,
                retention_days,
            } => inspect_volume_tag(&value, today, retention_days),
            InspectCommands::SnapshotTag { value, today } => inspect_snapshot_tag(&value, today),
        },
        Commands::Validate { config } => validate_settings(&config),
    }
}

/// Settings from file or environment, with CLI overrides applied last
fn resolve_settings(args: &RunArgs, dry_run: bool) -> Result<Settings> {
    let mut settings = match &args.config {
        Some(path) => {
            info!("Loading settings from: {:?}", path);
            Settings::load_from_file(path)?
        }
        None => Settings::from_env().context("Invalid settings in environment")?,
    };

    if let Some(tag_key) = &args.tag_key {
        settings.management_tag_key = tag_key.clone();
    }
    if let Some(days) = args.retention_days {
        settings.default_retention_days = days;
    }
    if let Some(regions) = &args.regions {
        settings.region_override = Some(parse_region_list(regions));
    }
    if let Some(workers) = args.workers {
        settings.max_parallel_regions = workers;
    }
    settings.dry_run |= dry_run;

    settings.validate()?;
    Ok(settings)
}

/// Wall-clock now, or the given date at the current time of day
fn evaluation_time(today: Option<NaiveDate>) -> NaiveDateTime {
    let now = Local::now().naive_local();
    match today {
        Some(date) => date.and_time(now.time()),
        None => now,
    }
}

fn run_snapshot_job(args: RunArgs, dry_run: bool) -> Result<()> {
    let settings = resolve_settings(&args, dry_run)?;

    let cancel = CancelFlag::new();
    if let Err(e) = init_signal_handlers(&cancel) {
        warn!("Failed to initialize signal handlers: {}", e);
    }

    let inventory = InventoryProvider::load(&args.inventory)?;
    info!("Loaded inventory from: {:?}", args.inventory);

    let now = evaluation_time(args.today);
    let report = if settings.dry_run {
        let provider = DryRunProvider::new(&inventory);
        coordinator::run(&provider, &settings, now, &cancel)?
    } else {
        coordinator::run(&inventory, &settings, now, &cancel)?
    };

    if !settings.dry_run {
        inventory.save(&args.inventory)?;
        debug!("Inventory saved to: {:?}", args.inventory);
    }

    if let Some(path) = &args.report {
        report
            .write_to(path)
            .with_context(|| format!("Failed to write run report to {:?}", path))?;
        info!("Run report written to: {:?}", path);
    }

    let summary = report.summary();
    println!("Run {} for {}", report.request_id, report.today);
    for region in &report.regions {
        for err in &region.errors {
            println!("  {}: {}", region.region, err);
        }
    }
    println!("{}", summary);

    if report.interrupted {
        eprintln!("✗ Run interrupted before all regions were processed");
        std::process::exit(130);
    }
    if summary.has_failures() {
        error!("Run finished with failures");
        std::process::exit(1);
    }

    Ok(())
}

fn inspect_volume_tag(value: &str, today: Option<NaiveDate>, retention_days: u32) -> Result<()> {
    let policy = VolumePolicy::decode(value, retention_days)?;
    let settings = Settings {
        default_retention_days: retention_days,
        ..Settings::default()
    };
    let ctx = RunContext::new(&settings, evaluation_time(today), Vec::<String>::new());

    println!("enabled:      {}", policy.enabled);
    println!("schedule:     {}", policy.schedule_type);
    println!("when:         {}", policy.when.join(","));
    println!("retention:    {} days", policy.retention_days);
    println!("copy tags:    {}", policy.copy_tags);

    let decision = schedule::evaluate(&policy, &ctx);
    let due = match decision {
        ScheduleDecision::Due => "yes",
        ScheduleDecision::NotToday => "no",
        ScheduleDecision::Unset => "no (schedule type unset)",
    };
    println!("due {}: {}", ctx.date_label(), due);

    if policy.enabled && decision.is_due() {
        let record = policy.record_for(ctx.today());
        println!("snapshot tag: {}", record.encode());
        println!(
            "label:        {}",
            schedule::description_label(policy.schedule_type, &ctx)
        );
    }

    Ok(())
}

fn inspect_snapshot_tag(value: &str, today: Option<NaiveDate>) -> Result<()> {
    let record: SnapshotRecord = value.parse()?;
    let now = evaluation_time(today);
    let settings = Settings::default();
    let ctx = RunContext::new(&settings, now, record.pending_destinations.iter().cloned());

    println!("expires:      {}", record.expiry_date);
    let destinations: Vec<&str> = record.pending_destinations.iter().map(String::as_str).collect();
    println!(
        "destinations: {}",
        if destinations.is_empty() { "none".to_string() } else { destinations.join(",") }
    );

    match retention::evaluate(&record, ctx.today()) {
        RetentionDecision::Expire(_) => println!("on {}: delete", ctx.date_label()),
        RetentionDecision::Keep(_) => {
            println!("on {}: keep", ctx.date_label());
            // Every listed destination is treated as a valid region here.
            let plan = plan_copies(&record, "<source>", "<snapshot>", &ctx);
            for task in &plan.tasks {
                println!("copy:         {}", task.destination_region);
            }
            println!("source after: {}", plan.source_after_attempt.encode());
        }
    }

    Ok(())
}

fn validate_settings(path: &Path) -> Result<()> {
    info!("Validating settings file: {:?}", path);
    let settings = Settings::load_from_file(path)?;
    match settings.validate() {
        Ok(()) => {
            info!("Settings validation successful");
            println!("✓ Settings file is valid: {:?}", path);
            Ok(())
        }
        Err(e) => {
            error!("Settings validation failed: {}", e);
            eprintln!("✗ Settings validation failed: {}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluation_time_uses_given_date() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(evaluation_time(Some(date)).date(), date);
    }

    #[test]
    fn test_evaluation_time_follows_local_clock() {
        let before = Local::now().naive_local();
        let now = evaluation_time(None);
        let after = Local::now().naive_local();
        assert!(before <= now && now <= after);
    }
}
