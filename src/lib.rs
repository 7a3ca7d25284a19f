//! autosnap library
//!
//! Tag-driven snapshot policy engine: decides from resource tags which
//! volumes to snapshot today, which snapshots have expired, and which
//! snapshots still have to be copied to other regions.

pub mod cli;
pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod provider;
pub mod report;
pub mod run_context;
pub mod shutdown;
pub mod types;

// Re-export main types for convenience
pub use config::Settings;
pub use coordinator::{resolve_regions, run, Coordinator};
pub use error::{AutosnapError, ProviderError, TagParseError};
pub use provider::{
    Attachment, CloudProvider, DryRunProvider, Inventory, InventoryProvider, RegionInventory,
    Snapshot, Volume,
};
pub use report::{Action, Operation, Outcome, RegionReport, RunReport, RunSummary, SkipReason};
pub use run_context::RunContext;
pub use shutdown::{init_signal_handlers, CancelFlag};
pub use types::{ScheduleType, SnapshotStatus, Tags, VolumeStatus};

// Policy engine
pub use engine::{
    is_due, plan_copies, should_expire, CopyPlan, CopyTask, RetentionDecision, ScheduleDecision,
    SnapshotRecord, VolumePolicy,
};
