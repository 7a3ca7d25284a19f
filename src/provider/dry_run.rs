//! Dry-run provider decorator.
//!
//! Reads go to the wrapped provider so decisions are computed against real
//! data. Mutations are logged and answered with synthetic ids; nothing is
//! created, copied, deleted or tagged.

use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

use super::{CloudProvider, Snapshot, Volume};
use crate::error::ProviderError;
use crate::types::{SnapshotStatus, Tags, VolumeStatus};

/// Prefix of every id handed out in dry-run mode
pub const DRY_RUN_ID_PREFIX: &str = "dry-run-snap-";

/// Wraps a provider and suppresses its mutations
#[derive(Debug)]
pub struct DryRunProvider<P> {
    inner: P,
    next_id: AtomicUsize,
}

impl<P: CloudProvider> DryRunProvider<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            next_id: AtomicUsize::new(1),
        }
    }

    pub fn into_inner(self) -> P {
        self.inner
    }

    fn synthetic_id(&self) -> String {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        format!("{DRY_RUN_ID_PREFIX}{n}")
    }
}

impl<P: CloudProvider> CloudProvider for DryRunProvider<P> {
    fn list_regions(&self) -> Result<Vec<String>, ProviderError> {
        self.inner.list_regions()
    }

    fn list_tagged_volumes(
        &self,
        region: &str,
        tag_key: &str,
        statuses: &[VolumeStatus],
    ) -> Result<Vec<Volume>, ProviderError> {
        self.inner.list_tagged_volumes(region, tag_key, statuses)
    }

    fn list_tagged_snapshots(
        &self,
        region: &str,
        tag_key: &str,
        status: SnapshotStatus,
    ) -> Result<Vec<Snapshot>, ProviderError> {
        self.inner.list_tagged_snapshots(region, tag_key, status)
    }

    fn find_snapshot_by_description(
        &self,
        region: &str,
        description: &str,
    ) -> Result<Option<Snapshot>, ProviderError> {
        self.inner.find_snapshot_by_description(region, description)
    }

    fn create_snapshot(
        &self,
        region: &str,
        volume_id: &str,
        description: &str,
        tags: &Tags,
    ) -> Result<String, ProviderError> {
        let id = self.synthetic_id();
        info!(
            dry_run = true,
            region,
            volume_id,
            snapshot_id = %id,
            tags = tags.len(),
            "[DRY RUN] Would create snapshot: {}",
            description
        );
        Ok(id)
    }

    fn delete_snapshot(&self, region: &str, snapshot_id: &str) -> Result<(), ProviderError> {
        info!(dry_run = true, region, snapshot_id, "[DRY RUN] Would delete snapshot");
        Ok(())
    }

    fn copy_snapshot(
        &self,
        source_region: &str,
        destination_region: &str,
        snapshot_id: &str,
        description: &str,
    ) -> Result<String, ProviderError> {
        let id = self.synthetic_id();
        info!(
            dry_run = true,
            source_region,
            destination_region,
            snapshot_id,
            copy_id = %id,
            "[DRY RUN] Would copy snapshot: {}",
            description
        );
        Ok(id)
    }

    fn tag_resource(
        &self,
        region: &str,
        resource_id: &str,
        tags: &Tags,
    ) -> Result<(), ProviderError> {
        info!(
            dry_run = true,
            region,
            resource_id,
            "[DRY RUN] Would tag resource with {:?}",
            tags
        );
        Ok(())
    }
}
