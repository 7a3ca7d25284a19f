//! Run report: one explicit outcome per decision.
//!
//! The coordinator never signals "skip" through control flow. Every volume
//! and snapshot it looks at yields [`Outcome`] values that end up here, and
//! partial failure is data in the report rather than an error.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::Path;
use strum::Display;
use uuid::Uuid;

use crate::error::Result;
use crate::types::ScheduleType;

/// Provider operation that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Operation {
    ListVolumes,
    ListSnapshots,
    FindSnapshot,
    CreateSnapshot,
    DeleteSnapshot,
    CopySnapshot,
    TagResource,
}

/// Something the run did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Created {
        snapshot_id: String,
        expires: NaiveDate,
    },
    Deleted {
        expired_on: NaiveDate,
    },
    Kept {
        until: NaiveDate,
    },
    Copied {
        destination: String,
        snapshot_id: String,
    },
}

/// Why an entity was left alone
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// The management tag could not be decoded
    InvalidTag { raw: String },
    Disabled,
    ScheduleUnset,
    NotScheduledToday { schedule: ScheduleType, when: Vec<String> },
    /// A snapshot with the same description exists
    AlreadyTaken { snapshot_id: String },
    InvalidDestination { destination: String },
    RateLimited { destination: String, message: String },
    /// Created earlier in this run; not eligible for expiry or copy yet
    CreatedThisRun,
}

/// Result of one decision about one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Done {
        resource_id: String,
        #[serde(flatten)]
        action: Action,
    },
    Skipped {
        resource_id: String,
        #[serde(flatten)]
        reason: SkipReason,
    },
    Failed {
        resource_id: String,
        operation: Operation,
        message: String,
    },
}

impl Outcome {
    pub fn done(resource_id: impl Into<String>, action: Action) -> Self {
        Self::Done {
            resource_id: resource_id.into(),
            action,
        }
    }

    pub fn skipped(resource_id: impl Into<String>, reason: SkipReason) -> Self {
        Self::Skipped {
            resource_id: resource_id.into(),
            reason,
        }
    }

    pub fn failed(
        resource_id: impl Into<String>,
        operation: Operation,
        message: impl Into<String>,
    ) -> Self {
        Self::Failed {
            resource_id: resource_id.into(),
            operation,
            message: message.into(),
        }
    }

    pub fn resource_id(&self) -> &str {
        match self {
            Self::Done { resource_id, .. }
            | Self::Skipped { resource_id, .. }
            | Self::Failed { resource_id, .. } => resource_id,
        }
    }
}

/// Everything that happened in one region
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionReport {
    pub region: String,
    /// Decisions from the volume pass
    pub volumes: Vec<Outcome>,
    /// Decisions from the expiry and replication pass
    pub snapshots: Vec<Outcome>,
    /// Region-level failures (listing calls) that cut a pass short
    pub errors: Vec<String>,
    pub interrupted: bool,
}

impl RegionReport {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            volumes: Vec::new(),
            snapshots: Vec::new(),
            errors: Vec::new(),
            interrupted: false,
        }
    }

    pub fn outcomes(&self) -> impl Iterator<Item = &Outcome> {
        self.volumes.iter().chain(self.snapshots.iter())
    }

    /// Ids of snapshots created in this region during the run
    pub fn created_snapshot_ids(&self) -> Vec<&str> {
        self.volumes
            .iter()
            .filter_map(|outcome| match outcome {
                Outcome::Done {
                    action: Action::Created { snapshot_id, .. },
                    ..
                } => Some(snapshot_id.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// Counters over a whole run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub created: usize,
    pub already_taken: usize,
    pub deleted: usize,
    pub kept: usize,
    pub copied: usize,
    pub skipped: usize,
    pub failed: usize,
    pub region_errors: usize,
}

impl RunSummary {
    fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Done { action, .. } => match action {
                Action::Created { .. } => self.created += 1,
                Action::Deleted { .. } => self.deleted += 1,
                Action::Kept { .. } => self.kept += 1,
                Action::Copied { .. } => self.copied += 1,
            },
            Outcome::Skipped {
                reason: SkipReason::AlreadyTaken { .. },
                ..
            } => self.already_taken += 1,
            Outcome::Skipped { .. } => self.skipped += 1,
            Outcome::Failed { .. } => self.failed += 1,
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0 || self.region_errors > 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "created={} already_taken={} deleted={} kept={} copied={} skipped={} failed={} region_errors={}",
            self.created,
            self.already_taken,
            self.deleted,
            self.kept,
            self.copied,
            self.skipped,
            self.failed,
            self.region_errors
        )
    }
}

/// Report of one invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub request_id: Uuid,
    pub today: NaiveDate,
    pub dry_run: bool,
    /// Regions in the order they were resolved
    pub regions: Vec<RegionReport>,
    pub interrupted: bool,
}

impl RunReport {
    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary::default();
        for region in &self.regions {
            summary.region_errors += region.errors.len();
            for outcome in region.outcomes() {
                summary.record(outcome);
            }
        }
        summary
    }

    pub fn region(&self, name: &str) -> Option<&RegionReport> {
        self.regions.iter().find(|r| r.region == name)
    }

    pub fn outcomes(&self) -> impl Iterator<Item = &Outcome> {
        self.regions.iter().flat_map(|region| region.outcomes())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the report as pretty JSON to `path`
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
