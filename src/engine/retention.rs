//! Retention evaluation for managed snapshots.

use chrono::NaiveDate;

use crate::engine::tag_codec::SnapshotRecord;

/// What to do with a snapshot given its recorded expiry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionDecision {
    /// Expired on the given date; delete now
    Expire(NaiveDate),
    /// Keep until the given date
    Keep(NaiveDate),
}

/// True iff the snapshot has expired. A snapshot expiring today is expired.
pub fn should_expire(record: &SnapshotRecord, today: NaiveDate) -> bool {
    record.expiry_date <= today
}

pub fn evaluate(record: &SnapshotRecord, today: NaiveDate) -> RetentionDecision {
    if should_expire(record, today) {
        RetentionDecision::Expire(record.expiry_date)
    } else {
        RetentionDecision::Keep(record.expiry_date)
    }
}
