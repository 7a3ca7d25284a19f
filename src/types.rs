//! Shared value types for autosnap
//!
//! Enums replace the stringly-typed values found in tags and provider
//! responses so that matching on them is exhaustive.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{Display, EnumIter, EnumString};

/// Key/value tags attached to a provider resource.
pub type Tags = BTreeMap<String, String>;

/// Tag key holding an instance's human-readable name.
pub const NAME_TAG: &str = "Name";

/// Snapshot cadence configured by the `type` key of a volume tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleType {
    /// Every invocation; the dedup label has second precision
    Always,
    Daily,
    /// On the weekdays listed in `when`
    Weekly,
    /// On the days of month listed in `when`
    Monthly,
    /// `type` missing or unrecognized
    #[default]
    Unset,
}

impl ScheduleType {
    /// Parse a `type` value; anything unrecognized is `Unset`.
    pub fn from_tag_value(value: &str) -> Self {
        match value.parse::<Self>() {
            Ok(Self::Unset) | Err(_) => Self::Unset,
            Ok(schedule) => schedule,
        }
    }

    /// Whether snapshots may be taken more than once per day.
    pub fn uses_timestamp_label(self) -> bool {
        matches!(self, Self::Always)
    }
}

/// Volume lifecycle state as reported by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum VolumeStatus {
    Creating,
    #[default]
    Available,
    InUse,
    Deleting,
    Deleted,
    Error,
}

impl VolumeStatus {
    /// Statuses whose volumes are considered for snapshots.
    pub const SNAPSHOTTABLE: &'static [Self] = &[Self::Available, Self::InUse];
}

/// Snapshot lifecycle state as reported by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SnapshotStatus {
    Pending,
    #[default]
    Completed,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_schedule_type_from_tag_value() {
        assert_eq!(ScheduleType::from_tag_value("weekly"), ScheduleType::Weekly);
        assert_eq!(ScheduleType::from_tag_value("MONTHLY"), ScheduleType::Monthly);
        assert_eq!(ScheduleType::from_tag_value("hourly"), ScheduleType::Unset);
        assert_eq!(ScheduleType::from_tag_value(""), ScheduleType::Unset);
        // "unset" is not a value users may write
        assert_eq!(ScheduleType::from_tag_value("unset"), ScheduleType::Unset);
    }

    #[test]
    fn test_only_always_uses_timestamp_label() {
        for schedule in ScheduleType::iter() {
            assert_eq!(
                schedule.uses_timestamp_label(),
                schedule == ScheduleType::Always,
                "{schedule}"
            );
        }
    }

    #[test]
    fn test_volume_status_strings() {
        assert_eq!(VolumeStatus::InUse.to_string(), "in-use");
        assert_eq!("available".parse::<VolumeStatus>().unwrap(), VolumeStatus::Available);
        assert_eq!(
            serde_json::to_string(&VolumeStatus::InUse).unwrap(),
            "\"in-use\""
        );
    }

    #[test]
    fn test_snapshot_status_strings() {
        assert_eq!(SnapshotStatus::Completed.to_string(), "completed");
        assert_eq!("pending".parse::<SnapshotStatus>().unwrap(), SnapshotStatus::Pending);
    }
}
