//! Management tag codec.
//!
//! One tag key carries two different grammars depending on what it is
//! attached to:
//!
//! | Resource | Grammar | Example |
//! |----------|---------|---------|
//! | Volume   | `key=value;key=value` | `enable=yes;type=weekly;when=mon,fri;retention=14;copyto=us-west-2` |
//! | Snapshot | `YYYY-MM-DD;dest,dest` or `YYYY-MM-DD;None` | `2024-03-01;us-west-2` |
//!
//! Decoding never panics: a value outside the grammar becomes a
//! [`TagParseError`] that keeps the raw string for reporting. A malformed
//! volume tag is rejected as a whole; no key is partially applied.

use chrono::{Days, NaiveDate};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::error::TagParseError;
use crate::run_context::DATE_FORMAT;
use crate::types::ScheduleType;

/// Recognized volume tag keys
pub mod keys {
    pub const ENABLE: &str = "enable";
    pub const TYPE: &str = "type";
    pub const WHEN: &str = "when";
    pub const RETENTION: &str = "retention";
    pub const COPY_TAGS: &str = "copytags";
    pub const COPY_TO: &str = "copyto";
}

/// Destination list written when there is nothing left to copy
pub const NO_DESTINATIONS: &str = "None";

// ============================================================================
// Volume policy
// ============================================================================

/// Snapshot policy decoded from a volume's management tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumePolicy {
    pub enabled: bool,
    pub schedule_type: ScheduleType,
    /// Weekday names or days of month, in tag order
    pub when: Vec<String>,
    pub retention_days: u32,
    /// Copy the volume's tags onto its snapshots
    pub copy_tags: bool,
    pub destination_regions: BTreeSet<String>,
}

impl VolumePolicy {
    /// Decode a volume tag value.
    ///
    /// `default_retention_days` applies when `retention` is missing or not
    /// a non-negative integer literal.
    pub fn decode(raw: &str, default_retention_days: u32) -> Result<Self, TagParseError> {
        let mut config: BTreeMap<String, String> = BTreeMap::new();

        for segment in raw.split(';') {
            let parts: Vec<&str> = segment.split('=').collect();
            let [key, value] = parts.as_slice() else {
                return Err(TagParseError::MissingSeparator {
                    raw: raw.to_string(),
                    segment: segment.to_string(),
                });
            };
            config.insert(key.trim().to_lowercase(), value.trim().to_lowercase());
        }

        let get = |key: &str| config.get(key).map(String::as_str).unwrap_or("");

        Ok(Self {
            enabled: parse_bool(get(keys::ENABLE)),
            schedule_type: ScheduleType::from_tag_value(get(keys::TYPE)),
            when: split_list(get(keys::WHEN)),
            retention_days: parse_retention(get(keys::RETENTION)).unwrap_or(default_retention_days),
            copy_tags: parse_bool(get(keys::COPY_TAGS)),
            destination_regions: split_list(get(keys::COPY_TO)).into_iter().collect(),
        })
    }

    /// Expiry date for a snapshot taken on `today`.
    pub fn expiry_for(&self, today: NaiveDate) -> NaiveDate {
        today
            .checked_add_days(Days::new(u64::from(self.retention_days)))
            .unwrap_or(NaiveDate::MAX)
    }

    /// State record for a snapshot taken on `today` under this policy.
    pub fn record_for(&self, today: NaiveDate) -> SnapshotRecord {
        SnapshotRecord {
            expiry_date: self.expiry_for(today),
            pending_destinations: self.destination_regions.clone(),
        }
    }
}

fn parse_bool(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("yes")
}

fn parse_retention(value: &str) -> Option<u32> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_lowercase)
        .collect()
}

// ============================================================================
// Snapshot record
// ============================================================================

/// Expiry and replication state stored on a managed snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRecord {
    pub expiry_date: NaiveDate,
    /// Regions this snapshot still has to be copied to
    pub pending_destinations: BTreeSet<String>,
}

impl SnapshotRecord {
    /// Destinations are normalized the way [`SnapshotRecord::decode`] reads
    /// them: trimmed, lower-cased, empty entries and `None` dropped.
    pub fn new<I>(expiry_date: NaiveDate, pending_destinations: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self {
            expiry_date,
            pending_destinations: pending_destinations
                .into_iter()
                .map(|dest| dest.trim().to_lowercase())
                .filter(|dest| !dest.is_empty() && !dest.eq_ignore_ascii_case(NO_DESTINATIONS))
                .collect(),
        }
    }

    /// Decode `YYYY-MM-DD;dest,dest` or `YYYY-MM-DD;None`.
    pub fn decode(raw: &str) -> Result<Self, TagParseError> {
        let fields: Vec<&str> = raw.split(';').collect();
        let [date, destinations] = fields.as_slice() else {
            return Err(TagParseError::WrongFieldCount {
                raw: raw.to_string(),
                found: fields.len(),
            });
        };

        let expiry_date = NaiveDate::parse_from_str(date.trim(), DATE_FORMAT).map_err(|_| {
            TagParseError::InvalidDate {
                raw: raw.to_string(),
                value: date.trim().to_string(),
            }
        })?;

        let pending_destinations = split_list(destinations)
            .into_iter()
            .filter(|dest| !dest.eq_ignore_ascii_case(NO_DESTINATIONS))
            .collect();

        Ok(Self {
            expiry_date,
            pending_destinations,
        })
    }

    /// Encode back into the tag grammar. Inverse of [`SnapshotRecord::decode`].
    pub fn encode(&self) -> String {
        let destinations = if self.pending_destinations.is_empty() {
            NO_DESTINATIONS.to_string()
        } else {
            self.pending_destinations
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(",")
        };
        format!("{};{}", self.expiry_date.format(DATE_FORMAT), destinations)
    }
}

impl fmt::Display for SnapshotRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for SnapshotRecord {
    type Err = TagParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}
