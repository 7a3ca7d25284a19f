//! Run coordinator.
//!
//! Ties the policy engine to a [`CloudProvider`]. For every region:
//!
//! ```text
//! list tagged volumes ──► decode policy ──► schedule ──► dedup ──► create
//!                                     (all volumes done)
//! list completed snapshots ──► decode record ──► expire ──► delete
//!                                                   └─► keep ──► copy ──► re-tag
//! ```
//!
//! Regions are independent and run on a bounded pool of scoped threads that
//! share nothing but the [`RunContext`] and the provider. Inside a region
//! the volume pass always completes before the snapshot pass, and snapshots
//! created by the volume pass are never expired or copied in the same run.
//!
//! Nothing below the region-discovery step returns an error: each decision
//! becomes an [`Outcome`] and failures stay local to the entity they concern.

use chrono::NaiveDateTime;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use tracing::{debug, error, info, info_span, warn, Span};

use crate::config::Settings;
use crate::engine::description::{copy_description, snapshot_description};
use crate::engine::replication::{plan_copies, target_tags};
use crate::engine::retention::{self, RetentionDecision};
use crate::engine::schedule::{self, ScheduleDecision};
use crate::engine::tag_codec::{SnapshotRecord, VolumePolicy};
use crate::error::{ProviderError, Result};
use crate::provider::{CloudProvider, Snapshot, Volume};
use crate::report::{Action, Operation, Outcome, RegionReport, RunReport, SkipReason};
use crate::run_context::RunContext;
use crate::shutdown::CancelFlag;
use crate::types::{SnapshotStatus, Tags, VolumeStatus};

/// Run one full invocation: resolve regions, build the context, process
/// every region and return the aggregated report.
///
/// Only region discovery can fail the run; every later failure is recorded
/// in the report.
pub fn run(
    provider: &dyn CloudProvider,
    settings: &Settings,
    now: NaiveDateTime,
    cancel: &CancelFlag,
) -> Result<RunReport> {
    let regions = resolve_regions(provider, settings)?;
    let ctx = RunContext::new(settings, now, regions.iter().cloned());

    let span = info_span!("run", request_id = %ctx.request_id());
    let _enter = span.enter();

    info!(
        regions = regions.len(),
        dry_run = ctx.is_dry_run(),
        "Starting snapshot run for {}",
        ctx.date_label()
    );

    let coordinator = Coordinator::new(provider, &ctx, cancel);
    let region_reports = coordinator.run_regions(&regions, settings.max_parallel_regions);

    let report = RunReport {
        request_id: ctx.request_id(),
        today: ctx.today(),
        dry_run: ctx.is_dry_run(),
        regions: region_reports,
        interrupted: cancel.is_cancelled(),
    };

    if report.interrupted {
        warn!(summary = %report.summary(), "Snapshot run interrupted");
    } else {
        info!(summary = %report.summary(), "Snapshot run finished");
    }

    Ok(report)
}

/// Regions to process: the configured override, or every provider region.
pub fn resolve_regions(
    provider: &dyn CloudProvider,
    settings: &Settings,
) -> std::result::Result<Vec<String>, ProviderError> {
    match &settings.region_override {
        Some(regions) => Ok(regions.clone()),
        None => provider.list_regions(),
    }
}

/// Per-run orchestration state; borrows everything, owns nothing mutable
pub struct Coordinator<'a> {
    provider: &'a dyn CloudProvider,
    ctx: &'a RunContext,
    cancel: &'a CancelFlag,
    run_span: Span,
}

impl<'a> Coordinator<'a> {
    pub fn new(provider: &'a dyn CloudProvider, ctx: &'a RunContext, cancel: &'a CancelFlag) -> Self {
        Self {
            provider,
            ctx,
            cancel,
            run_span: Span::current(),
        }
    }

    /// Process `regions` on at most `max_parallel` worker threads.
    ///
    /// Reports come back in the order of `regions`. Regions that were never
    /// started because the run was cancelled are reported as interrupted.
    pub fn run_regions(&self, regions: &[String], max_parallel: usize) -> Vec<RegionReport> {
        let workers = max_parallel.clamp(1, regions.len().max(1));
        let next = &AtomicUsize::new(0);

        let mut finished: Vec<(usize, RegionReport)> = thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    scope.spawn(move || {
                        let mut done = Vec::new();
                        while !self.cancel.is_cancelled() {
                            let idx = next.fetch_add(1, Ordering::SeqCst);
                            let Some(region) = regions.get(idx) else {
                                break;
                            };
                            done.push((idx, self.process_region(region)));
                        }
                        done
                    })
                })
                .collect();

            handles
                .into_iter()
                .flat_map(|handle| match handle.join() {
                    Ok(done) => done,
                    Err(_) => {
                        error!("Region worker panicked; its regions are reported as failed");
                        Vec::new()
                    }
                })
                .collect()
        });

        finished.sort_by_key(|(idx, _)| *idx);
        let mut finished = finished.into_iter().peekable();

        regions
            .iter()
            .enumerate()
            .map(|(idx, region)| {
                if let Some((_, report)) = finished.next_if(|(done_idx, _)| *done_idx == idx) {
                    return report;
                }
                let mut report = RegionReport::new(region.as_str());
                if self.cancel.is_cancelled() {
                    report.interrupted = true;
                } else {
                    report.errors.push("region worker terminated unexpectedly".to_string());
                }
                report
            })
            .collect()
    }

    /// Volume pass followed by snapshot pass for one region.
    pub fn process_region(&self, region: &str) -> RegionReport {
        let span = info_span!(parent: &self.run_span, "region", region = %region);
        let _enter = span.enter();
        debug!("Entering region");

        let mut report = RegionReport::new(region);

        self.snapshot_volumes(region, &mut report);
        if report.interrupted {
            return report;
        }
        self.expire_and_replicate(region, &mut report);

        debug!("Exiting region");
        report
    }

    fn snapshot_volumes(&self, region: &str, report: &mut RegionReport) {
        let volumes = match self.provider.list_tagged_volumes(
            region,
            self.ctx.management_tag_key(),
            VolumeStatus::SNAPSHOTTABLE,
        ) {
            Ok(volumes) => volumes,
            Err(err) => {
                error!(operation = %Operation::ListVolumes, "Error listing volumes: {}", err);
                report.errors.push(err.to_string());
                return;
            }
        };

        for volume in &volumes {
            if self.cancel.is_cancelled() {
                report.interrupted = true;
                return;
            }
            report.volumes.push(self.process_volume(region, volume));
        }
    }

    /// Decide and, if due, create today's snapshot of `volume`.
    fn process_volume(&self, region: &str, volume: &Volume) -> Outcome {
        let ctx = self.ctx;
        let tag_key = ctx.management_tag_key();
        let volume_id = volume.id.as_str();

        let raw = volume.tag(tag_key).unwrap_or_default();
        let policy = match VolumePolicy::decode(raw, ctx.default_retention_days()) {
            Ok(policy) => policy,
            Err(err) => {
                warn!(volume_id, "Parser error for volume: {}", err);
                return Outcome::skipped(volume_id, SkipReason::InvalidTag { raw: err.raw().to_string() });
            }
        };

        if !policy.enabled {
            debug!(volume_id, "Backup disabled for volume");
            return Outcome::skipped(volume_id, SkipReason::Disabled);
        }

        match schedule::evaluate(&policy, ctx) {
            ScheduleDecision::Due => {}
            ScheduleDecision::NotToday => {
                debug!(
                    volume_id,
                    "Skipping volume, snapshot will be taken {} on [{}]",
                    policy.schedule_type,
                    policy.when.join(",")
                );
                return Outcome::skipped(
                    volume_id,
                    SkipReason::NotScheduledToday {
                        schedule: policy.schedule_type,
                        when: policy.when,
                    },
                );
            }
            ScheduleDecision::Unset => {
                warn!(volume_id, "Backup enabled but no valid schedule type, skipping volume");
                return Outcome::skipped(volume_id, SkipReason::ScheduleUnset);
            }
        }

        let label = schedule::description_label(policy.schedule_type, ctx);
        let description = snapshot_description(volume_id, volume.primary_attachment(), &label);

        match self.provider.find_snapshot_by_description(region, &description) {
            Ok(Some(existing)) => {
                info!(volume_id, snapshot_id = %existing.id, "Snapshot for volume already taken");
                return Outcome::skipped(
                    volume_id,
                    SkipReason::AlreadyTaken {
                        snapshot_id: existing.id,
                    },
                );
            }
            Ok(None) => {}
            Err(err) => {
                error!(volume_id, "Error looking up existing snapshot: {}", err);
                return Outcome::failed(volume_id, Operation::FindSnapshot, err.to_string());
            }
        }

        let record = policy.record_for(ctx.today());
        let mut tags = if policy.copy_tags {
            volume.tags.clone()
        } else {
            Tags::new()
        };
        tags.insert(tag_key.to_string(), record.encode());

        match self
            .provider
            .create_snapshot(region, volume_id, &description, &tags)
        {
            Ok(snapshot_id) => {
                info!(
                    volume_id,
                    snapshot_id = %snapshot_id,
                    "Snapshot for volume created, to be removed on {}",
                    record.expiry_date
                );
                Outcome::done(
                    volume_id,
                    Action::Created {
                        snapshot_id,
                        expires: record.expiry_date,
                    },
                )
            }
            Err(err) => {
                error!(volume_id, "Error creating snapshot: {}", err);
                Outcome::failed(volume_id, Operation::CreateSnapshot, err.to_string())
            }
        }
    }

    fn expire_and_replicate(&self, region: &str, report: &mut RegionReport) {
        let snapshots = match self.provider.list_tagged_snapshots(
            region,
            self.ctx.management_tag_key(),
            SnapshotStatus::Completed,
        ) {
            Ok(snapshots) => snapshots,
            Err(err) => {
                error!(operation = %Operation::ListSnapshots, "Error listing snapshots: {}", err);
                report.errors.push(err.to_string());
                return;
            }
        };

        let created_this_run: HashSet<String> = report
            .created_snapshot_ids()
            .into_iter()
            .map(str::to_string)
            .collect();

        for snapshot in &snapshots {
            if self.cancel.is_cancelled() {
                report.interrupted = true;
                return;
            }
            if created_this_run.contains(&snapshot.id) {
                report
                    .snapshots
                    .push(Outcome::skipped(&snapshot.id, SkipReason::CreatedThisRun));
                continue;
            }
            self.process_snapshot(region, snapshot, &mut report.snapshots);
        }
    }

    /// Expire `snapshot` or keep it and run its pending copies.
    fn process_snapshot(&self, region: &str, snapshot: &Snapshot, out: &mut Vec<Outcome>) {
        let snapshot_id = snapshot.id.as_str();
        let raw = snapshot.tag(self.ctx.management_tag_key()).unwrap_or_default();

        let record = match SnapshotRecord::decode(raw) {
            Ok(record) => record,
            Err(err) => {
                warn!(snapshot_id, "Parser error for snapshot: {}", err);
                out.push(Outcome::skipped(
                    snapshot_id,
                    SkipReason::InvalidTag {
                        raw: err.raw().to_string(),
                    },
                ));
                return;
            }
        };

        match retention::evaluate(&record, self.ctx.today()) {
            RetentionDecision::Expire(expired_on) => {
                match self.provider.delete_snapshot(region, snapshot_id) {
                    Ok(()) => {
                        info!(snapshot_id, "Removing snapshot expired on {}", expired_on);
                        out.push(Outcome::done(snapshot_id, Action::Deleted { expired_on }));
                    }
                    Err(err) => {
                        error!(
                            snapshot_id,
                            "Error removing snapshot expired on {}: {}", expired_on, err
                        );
                        out.push(Outcome::failed(
                            snapshot_id,
                            Operation::DeleteSnapshot,
                            err.to_string(),
                        ));
                    }
                }
            }
            RetentionDecision::Keep(until) => {
                debug!(snapshot_id, "Keeping snapshot until {}", until);
                out.push(Outcome::done(snapshot_id, Action::Kept { until }));
                self.replicate(region, snapshot, &record, out);
            }
        }
    }

    /// Attempt every planned copy of `snapshot` once, then record the
    /// attempt on the source.
    fn replicate(
        &self,
        region: &str,
        snapshot: &Snapshot,
        record: &SnapshotRecord,
        out: &mut Vec<Outcome>,
    ) {
        let tag_key = self.ctx.management_tag_key();
        let snapshot_id = snapshot.id.as_str();
        let plan = plan_copies(record, region, snapshot_id, self.ctx);

        for destination in &plan.invalid_destinations {
            warn!(
                snapshot_id,
                destination = %destination,
                "Copy destination is not a known region, leaving it on the tag"
            );
            out.push(Outcome::skipped(
                snapshot_id,
                SkipReason::InvalidDestination {
                    destination: destination.clone(),
                },
            ));
        }

        // The source record drops every valid destination, so each one is
        // attempted even after cancellation.
        let mut source_retagged = false;
        for task in &plan.tasks {
            let destination = task.destination_region.as_str();
            let description = copy_description(&snapshot.description, snapshot_id, region);

            match self.provider.copy_snapshot(
                &task.source_region,
                destination,
                &task.snapshot_id,
                &description,
            ) {
                Ok(copy_id) => {
                    info!(
                        snapshot_id,
                        destination,
                        copy_id = %copy_id,
                        "Copying snapshot from {} to {}",
                        region,
                        destination
                    );
                    let tags = target_tags(&snapshot.tags, tag_key, &plan.target);
                    if let Err(err) = self.provider.tag_resource(destination, &copy_id, &tags) {
                        error!(copy_id = %copy_id, destination, "Error tagging snapshot copy: {}", err);
                        out.push(Outcome::failed(
                            copy_id.as_str(),
                            Operation::TagResource,
                            err.to_string(),
                        ));
                    }
                    out.push(Outcome::done(
                        snapshot_id,
                        Action::Copied {
                            destination: destination.to_string(),
                            snapshot_id: copy_id,
                        },
                    ));
                }
                Err(err) if err.is_rate_limited() => {
                    info!(snapshot_id, destination, "Skipping snapshot copy: {}", err);
                    out.push(Outcome::skipped(
                        snapshot_id,
                        SkipReason::RateLimited {
                            destination: destination.to_string(),
                            message: err.to_string(),
                        },
                    ));
                }
                Err(err) => {
                    error!(
                        snapshot_id,
                        destination,
                        "Error copying snapshot from {} to {}: {}",
                        region,
                        destination,
                        err
                    );
                    out.push(Outcome::failed(
                        snapshot_id,
                        Operation::CopySnapshot,
                        format!("{region} -> {destination}: {err}"),
                    ));
                }
            }

            // Same value after every attempt; one successful write is enough.
            if !source_retagged {
                let tags = Tags::from([(tag_key.to_string(), plan.source_after_attempt.encode())]);
                match self.provider.tag_resource(region, snapshot_id, &tags) {
                    Ok(()) => source_retagged = true,
                    Err(err) => {
                        error!(snapshot_id, "Error updating source snapshot tag: {}", err);
                        out.push(Outcome::failed(
                            snapshot_id,
                            Operation::TagResource,
                            err.to_string(),
                        ));
                    }
                }
            }
        }
    }
}
