//! Per-invocation run context.
//!
//! The context is computed once at the start of a run and then only ever
//! borrowed. Region workers share it by reference; nothing mutates it.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::config::Settings;

/// Date format used in snapshot tags and date-precision descriptions
pub const DATE_FORMAT: &str = "%Y-%m-%d";
/// Format of the second-precision description label
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Immutable facts about the current invocation
#[derive(Debug, Clone)]
pub struct RunContext {
    request_id: Uuid,
    now: NaiveDateTime,
    weekday_abbrev: String,
    valid_regions: BTreeSet<String>,
    default_retention_days: u32,
    management_tag_key: String,
    dry_run: bool,
}

impl RunContext {
    /// Build the context for a run starting at `now` over `regions`.
    pub fn new<I>(settings: &Settings, now: NaiveDateTime, regions: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self {
            request_id: Uuid::new_v4(),
            now,
            weekday_abbrev: now.format("%a").to_string().to_lowercase(),
            valid_regions: regions.into_iter().collect(),
            default_retention_days: settings.default_retention_days,
            management_tag_key: settings.management_tag_key.clone(),
            dry_run: settings.dry_run,
        }
    }

    /// Identifier attached to every log line and the report of this run
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn today(&self) -> NaiveDate {
        self.now.date()
    }

    pub fn now(&self) -> NaiveDateTime {
        self.now
    }

    /// Lowercase three-letter weekday, e.g. `"wed"`
    pub fn weekday_abbrev(&self) -> &str {
        &self.weekday_abbrev
    }

    /// Day of month, 1-31
    pub fn day_of_month(&self) -> u32 {
        self.now.day()
    }

    /// Regions this run may create or copy snapshots in
    pub fn valid_regions(&self) -> &BTreeSet<String> {
        &self.valid_regions
    }

    pub fn is_valid_region(&self, region: &str) -> bool {
        self.valid_regions.contains(region)
    }

    pub fn default_retention_days(&self) -> u32 {
        self.default_retention_days
    }

    pub fn management_tag_key(&self) -> &str {
        &self.management_tag_key
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// `YYYY-MM-DD` for today
    pub fn date_label(&self) -> String {
        self.today().format(DATE_FORMAT).to_string()
    }

    /// `YYYY-MM-DD_HH-MM-SS` for the start of the run
    pub fn timestamp_label(&self) -> String {
        self.now.format(TIMESTAMP_FORMAT).to_string()
    }
}
