//! Cross-region replication planning.
//!
//! Given a snapshot's pending destinations, produce the copies to attempt and
//! the state both sides carry afterwards:
//!
//! - the **source** keeps its expiry and drops every valid destination, so
//!   each destination is attempted at most once per snapshot;
//! - the **target** keeps the expiry and has no destinations, so a copy
//!   never propagates further and replication cannot cycle between regions.
//!
//! Destinations outside the valid region set are never copied to; they stay
//! on the source tag where they remain visible.

use std::fmt;

use crate::engine::tag_codec::SnapshotRecord;
use crate::run_context::RunContext;
use crate::types::Tags;

/// One snapshot copy to request from the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyTask {
    pub source_region: String,
    pub destination_region: String,
    pub snapshot_id: String,
}

impl fmt::Display for CopyTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Copy({} {} -> {})",
            self.snapshot_id, self.source_region, self.destination_region
        )
    }
}

/// Copies to attempt for one snapshot and the resulting tag states
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyPlan {
    /// One task per valid pending destination
    pub tasks: Vec<CopyTask>,
    /// Pending destinations that are not valid regions
    pub invalid_destinations: Vec<String>,
    /// Source state once any copy has been attempted
    pub source_after_attempt: SnapshotRecord,
    /// State for every new copy
    pub target: SnapshotRecord,
}

impl CopyPlan {
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Plan the copies of `snapshot_id` (in `source_region`) described by `record`.
pub fn plan_copies(
    record: &SnapshotRecord,
    source_region: &str,
    snapshot_id: &str,
    ctx: &RunContext,
) -> CopyPlan {
    let (valid, invalid): (Vec<&String>, Vec<&String>) = record
        .pending_destinations
        .iter()
        .partition(|dest| ctx.is_valid_region(dest));

    let tasks = valid
        .into_iter()
        .map(|dest| CopyTask {
            source_region: source_region.to_string(),
            destination_region: dest.clone(),
            snapshot_id: snapshot_id.to_string(),
        })
        .collect();

    let source_after_attempt = SnapshotRecord {
        expiry_date: record.expiry_date,
        pending_destinations: record
            .pending_destinations
            .iter()
            .filter(|dest| !ctx.is_valid_region(dest))
            .cloned()
            .collect(),
    };

    CopyPlan {
        tasks,
        invalid_destinations: invalid.into_iter().cloned().collect(),
        source_after_attempt,
        target: SnapshotRecord::new(record.expiry_date, Vec::new()),
    }
}

/// Tags for a new copy: every source tag, with the management tag replaced
/// by the target record.
pub fn target_tags(source_tags: &Tags, management_tag_key: &str, target: &SnapshotRecord) -> Tags {
    let mut tags = source_tags.clone();
    tags.insert(management_tag_key.to_string(), target.encode());
    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use chrono::NaiveDate;

    fn ctx(regions: &[&str]) -> RunContext {
        let now = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        RunContext::new(
            &Settings::default(),
            now,
            regions.iter().map(|r| r.to_string()),
        )
    }

    #[test]
    fn test_plan_only_valid_destinations() {
        let record = SnapshotRecord::decode("2024-02-01;us-west-2,mars-north-1").unwrap();
        let plan = plan_copies(&record, "us-east-1", "snap-1", &ctx(&["us-east-1", "us-west-2"]));

        assert_eq!(
            plan.tasks,
            vec![CopyTask {
                source_region: "us-east-1".to_string(),
                destination_region: "us-west-2".to_string(),
                snapshot_id: "snap-1".to_string(),
            }]
        );
        assert_eq!(plan.invalid_destinations, vec!["mars-north-1"]);
    }

    #[test]
    fn test_source_drops_valid_destinations_and_keeps_invalid() {
        let record = SnapshotRecord::decode("2024-02-01;us-west-2,eu-west-1,mars-north-1").unwrap();
        let plan = plan_copies(
            &record,
            "us-east-1",
            "snap-1",
            &ctx(&["us-east-1", "us-west-2", "eu-west-1"]),
        );

        assert_eq!(plan.tasks.len(), 2);
        assert_eq!(plan.source_after_attempt.encode(), "2024-02-01;mars-north-1");
        assert_eq!(plan.source_after_attempt.expiry_date, record.expiry_date);
    }

    #[test]
    fn test_target_never_propagates() {
        let record = SnapshotRecord::decode("2024-02-01;us-west-2").unwrap();
        let plan = plan_copies(&record, "us-east-1", "snap-1", &ctx(&["us-east-1", "us-west-2"]));

        assert!(plan.target.pending_destinations.is_empty());
        assert_eq!(plan.target.encode(), "2024-02-01;None");
        assert_eq!(plan.source_after_attempt.encode(), "2024-02-01;None");
    }

    #[test]
    fn test_no_destinations_no_tasks() {
        let record = SnapshotRecord::decode("2024-01-01;None").unwrap();
        let plan = plan_copies(&record, "us-east-1", "snap-1", &ctx(&["us-east-1"]));
        assert!(plan.is_empty());
        assert!(plan.invalid_destinations.is_empty());
    }

    #[test]
    fn test_target_tags_overwrite_management_tag() {
        let mut source = Tags::new();
        source.insert("Name".to_string(), "db-data".to_string());
        source.insert("policy".to_string(), "2024-02-01;us-west-2".to_string());

        let target = SnapshotRecord::decode("2024-02-01;None").unwrap();
        let tags = target_tags(&source, "policy", &target);

        assert_eq!(tags.get("Name").map(String::as_str), Some("db-data"));
        assert_eq!(tags.get("policy").map(String::as_str), Some("2024-02-01;None"));
    }
}
