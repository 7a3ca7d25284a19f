//! Policy engine: the decisions behind every provider call.
//!
//! Each module is pure logic over typed values. Raw tag strings enter
//! through [`tag_codec`] and leave through it; everything in between works on
//! [`VolumePolicy`] and [`SnapshotRecord`].
//!
//! - `tag_codec`: management tag grammar for volumes and snapshots
//! - `schedule`: is a snapshot due today
//! - `description`: snapshot descriptions used for de-duplication
//! - `retention`: has a snapshot expired
//! - `replication`: which copies to make and how both sides are re-tagged

pub mod description;
pub mod replication;
pub mod retention;
pub mod schedule;
pub mod tag_codec;

pub use replication::{plan_copies, CopyPlan, CopyTask};
pub use retention::{should_expire, RetentionDecision};
pub use schedule::{is_due, ScheduleDecision};
pub use tag_codec::{SnapshotRecord, VolumePolicy};
