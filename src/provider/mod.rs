//! Cloud provider seam.
//!
//! The policy engine only needs a handful of provider operations. They are
//! collected in the [`CloudProvider`] trait so the run coordinator can be
//! driven by any backend:
//!
//! - [`InventoryProvider`](inventory::InventoryProvider): JSON-backed
//!   inventory used by the CLI and the test-suite
//! - [`DryRunProvider`](dry_run::DryRunProvider): wraps another provider and
//!   turns every mutation into a log line
//!
//! Every call is one bounded request. Timeouts and retries belong to the
//! implementation, not to the coordinator.

pub mod dry_run;
pub mod inventory;

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::types::{SnapshotStatus, Tags, VolumeStatus, NAME_TAG};

pub use dry_run::DryRunProvider;
pub use inventory::{Inventory, InventoryProvider, RegionInventory};

/// Instance a volume is attached to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub instance_id: String,
    /// Value of the instance's `Name` tag, if any
    #[serde(default)]
    pub instance_name: Option<String>,
    pub device: String,
}

impl Attachment {
    /// Attachment to an instance, named after the instance's `Name` tag.
    pub fn to_instance(instance_id: impl Into<String>, instance_tags: &Tags, device: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            instance_name: instance_tags.get(NAME_TAG).cloned(),
            device: device.into(),
        }
    }
}

/// A block-storage volume
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    pub id: String,
    #[serde(default)]
    pub status: VolumeStatus,
    #[serde(default)]
    pub tags: Tags,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl Volume {
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// First attachment; descriptions only ever mention one.
    pub fn primary_attachment(&self) -> Option<&Attachment> {
        self.attachments.first()
    }
}

/// A point-in-time snapshot of a volume
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: String,
    #[serde(default)]
    pub volume_id: Option<String>,
    #[serde(default)]
    pub status: SnapshotStatus,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Tags,
}

impl Snapshot {
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

/// Provider operations consumed by the run coordinator.
///
/// Implementations are shared by reference across region workers, hence
/// `Send + Sync`.
pub trait CloudProvider: Send + Sync {
    /// All regions the account can operate in.
    fn list_regions(&self) -> Result<Vec<String>, ProviderError>;

    /// Volumes in `region` carrying `tag_key` whose status is in `statuses`.
    fn list_tagged_volumes(
        &self,
        region: &str,
        tag_key: &str,
        statuses: &[VolumeStatus],
    ) -> Result<Vec<Volume>, ProviderError>;

    /// Snapshots in `region` carrying `tag_key` with the given status.
    fn list_tagged_snapshots(
        &self,
        region: &str,
        tag_key: &str,
        status: SnapshotStatus,
    ) -> Result<Vec<Snapshot>, ProviderError>;

    /// A snapshot in `region` whose description is exactly `description`,
    /// in any status.
    fn find_snapshot_by_description(
        &self,
        region: &str,
        description: &str,
    ) -> Result<Option<Snapshot>, ProviderError>;

    /// Start a snapshot of `volume_id`; returns the new snapshot id.
    fn create_snapshot(
        &self,
        region: &str,
        volume_id: &str,
        description: &str,
        tags: &Tags,
    ) -> Result<String, ProviderError>;

    fn delete_snapshot(&self, region: &str, snapshot_id: &str) -> Result<(), ProviderError>;

    /// Copy `snapshot_id` from `source_region` into `destination_region`;
    /// returns the id of the copy.
    fn copy_snapshot(
        &self,
        source_region: &str,
        destination_region: &str,
        snapshot_id: &str,
        description: &str,
    ) -> Result<String, ProviderError>;

    /// Add or overwrite tags on a volume or snapshot.
    fn tag_resource(&self, region: &str, resource_id: &str, tags: &Tags)
    -> Result<(), ProviderError>;
}

impl<P: CloudProvider + ?Sized> CloudProvider for &P {
    fn list_regions(&self) -> Result<Vec<String>, ProviderError> {
        (**self).list_regions()
    }

    fn list_tagged_volumes(
        &self,
        region: &str,
        tag_key: &str,
        statuses: &[VolumeStatus],
    ) -> Result<Vec<Volume>, ProviderError> {
        (**self).list_tagged_volumes(region, tag_key, statuses)
    }

    fn list_tagged_snapshots(
        &self,
        region: &str,
        tag_key: &str,
        status: SnapshotStatus,
    ) -> Result<Vec<Snapshot>, ProviderError> {
        (**self).list_tagged_snapshots(region, tag_key, status)
    }

    fn find_snapshot_by_description(
        &self,
        region: &str,
        description: &str,
    ) -> Result<Option<Snapshot>, ProviderError> {
        (**self).find_snapshot_by_description(region, description)
    }

    fn create_snapshot(
        &self,
        region: &str,
        volume_id: &str,
        description: &str,
        tags: &Tags,
    ) -> Result<String, ProviderError> {
        (**self).create_snapshot(region, volume_id, description, tags)
    }

    fn delete_snapshot(&self, region: &str, snapshot_id: &str) -> Result<(), ProviderError> {
        (**self).delete_snapshot(region, snapshot_id)
    }

    fn copy_snapshot(
        &self,
        source_region: &str,
        destination_region: &str,
        snapshot_id: &str,
        description: &str,
    ) -> Result<String, ProviderError> {
        (**self).copy_snapshot(source_region, destination_region, snapshot_id, description)
    }

    fn tag_resource(
        &self,
        region: &str,
        resource_id: &str,
        tags: &Tags,
    ) -> Result<(), ProviderError> {
        (**self).tag_resource(region, resource_id, tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attachment_name_comes_from_name_tag() {
        let tags = Tags::from([
            ("Name".to_string(), "web-1".to_string()),
            ("team".to_string(), "ops".to_string()),
        ]);
        let attachment = Attachment::to_instance("i-1", &tags, "/dev/xvdf");
        assert_eq!(attachment.instance_name.as_deref(), Some("web-1"));

        let unnamed = Attachment::to_instance("i-2", &Tags::new(), "/dev/xvdg");
        assert!(unnamed.instance_name.is_none());
    }

    #[test]
    fn test_volume_deserializes_with_defaults() {
        let volume: Volume = serde_json::from_str(r#"{"id": "vol-1"}"#).unwrap();
        assert_eq!(volume.status, VolumeStatus::Available);
        assert!(volume.tags.is_empty());
        assert!(volume.primary_attachment().is_none());
    }
}
