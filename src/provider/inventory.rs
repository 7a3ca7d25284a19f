//! JSON-backed inventory provider.
//!
//! Holds every region's volumes and snapshots in memory behind a mutex and
//! implements [`CloudProvider`] over them. The CLI loads an inventory file,
//! runs against it and saves it back, which makes the whole lifecycle
//! observable without a cloud account.
//!
//! Provider behaviour that matters to the engine is reproduced:
//!
//! - new snapshots and copies start `pending` and only become `completed`
//!   when the inventory is next loaded
//! - a region with `snapshot_limit` set refuses new snapshots beyond it with
//!   a rate-limit error, like `ResourceLimitExceeded`

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::{CloudProvider, Snapshot, Volume};
use crate::error::ProviderError;
use crate::types::{SnapshotStatus, Tags, VolumeStatus};

/// Contents of one region
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionInventory {
    pub volumes: Vec<Volume>,
    pub snapshots: Vec<Snapshot>,
    /// Maximum number of snapshots the region accepts
    pub snapshot_limit: Option<usize>,
}

impl RegionInventory {
    fn has_capacity(&self) -> bool {
        self.snapshot_limit
            .is_none_or(|limit| self.snapshots.len() < limit)
    }

    fn snapshot_mut(&mut self, id: &str) -> Option<&mut Snapshot> {
        self.snapshots.iter_mut().find(|s| s.id == id)
    }
}

/// Every region known to the provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Inventory {
    pub regions: BTreeMap<String, RegionInventory>,
}

impl Inventory {
    /// Mark every pending snapshot completed.
    pub fn settle_pending(&mut self) -> usize {
        let mut settled = 0;
        for snapshot in self
            .regions
            .values_mut()
            .flat_map(|region| region.snapshots.iter_mut())
            .filter(|s| s.status == SnapshotStatus::Pending)
        {
            snapshot.status = SnapshotStatus::Completed;
            settled += 1;
        }
        settled
    }

    pub fn region(&self, name: &str) -> Option<&RegionInventory> {
        self.regions.get(name)
    }
}

/// [`CloudProvider`] over an [`Inventory`]
#[derive(Debug, Default)]
pub struct InventoryProvider {
    state: Mutex<Inventory>,
}

impl InventoryProvider {
    pub fn new(inventory: Inventory) -> Self {
        Self {
            state: Mutex::new(inventory),
        }
    }

    /// Load an inventory file; snapshots left pending by the previous run
    /// are completed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read inventory from {:?}", path.as_ref()))?;

        let mut inventory: Inventory =
            serde_json::from_str(&content).context("Failed to parse inventory JSON")?;

        let settled = inventory.settle_pending();
        if settled > 0 {
            tracing::debug!(settled, "Pending snapshots completed since last run");
        }

        Ok(Self::new(inventory))
    }

    /// Write the current inventory to a JSON file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(&*self.lock())
            .context("Failed to serialize inventory to JSON")?;

        fs::write(&path, json)
            .with_context(|| format!("Failed to write inventory to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Copy of the current inventory
    pub fn inventory(&self) -> Inventory {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Inventory> {
        // A panic while holding the lock leaves plain data behind; keep using it.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn new_snapshot_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("snap-{}", &hex[..17])
}

fn region_mut<'a>(
    inventory: &'a mut Inventory,
    operation: &str,
    region: &str,
) -> Result<&'a mut RegionInventory, ProviderError> {
    inventory
        .regions
        .get_mut(region)
        .ok_or_else(|| ProviderError::api(operation, region, "InvalidRegion", "unknown region"))
}

impl CloudProvider for InventoryProvider {
    fn list_regions(&self) -> Result<Vec<String>, ProviderError> {
        Ok(self.lock().regions.keys().cloned().collect())
    }

    fn list_tagged_volumes(
        &self,
        region: &str,
        tag_key: &str,
        statuses: &[VolumeStatus],
    ) -> Result<Vec<Volume>, ProviderError> {
        let mut inventory = self.lock();
        let region = region_mut(&mut inventory, "DescribeVolumes", region)?;
        Ok(region
            .volumes
            .iter()
            .filter(|v| v.tags.contains_key(tag_key) && statuses.contains(&v.status))
            .cloned()
            .collect())
    }

    fn list_tagged_snapshots(
        &self,
        region: &str,
        tag_key: &str,
        status: SnapshotStatus,
    ) -> Result<Vec<Snapshot>, ProviderError> {
        let mut inventory = self.lock();
        let region = region_mut(&mut inventory, "DescribeSnapshots", region)?;
        Ok(region
            .snapshots
            .iter()
            .filter(|s| s.tags.contains_key(tag_key) && s.status == status)
            .cloned()
            .collect())
    }

    fn find_snapshot_by_description(
        &self,
        region: &str,
        description: &str,
    ) -> Result<Option<Snapshot>, ProviderError> {
        let mut inventory = self.lock();
        let region = region_mut(&mut inventory, "DescribeSnapshots", region)?;
        Ok(region
            .snapshots
            .iter()
            .find(|s| s.description == description)
            .cloned())
    }

    fn create_snapshot(
        &self,
        region_name: &str,
        volume_id: &str,
        description: &str,
        tags: &Tags,
    ) -> Result<String, ProviderError> {
        const OP: &str = "CreateSnapshot";
        let mut inventory = self.lock();
        let region = region_mut(&mut inventory, OP, region_name)?;

        if !region.volumes.iter().any(|v| v.id == volume_id) {
            return Err(ProviderError::not_found(OP, region_name, volume_id));
        }
        if !region.has_capacity() {
            return Err(ProviderError::rate_limited(
                OP,
                region_name,
                "ResourceLimitExceeded: snapshot limit reached",
            ));
        }

        let id = new_snapshot_id();
        region.snapshots.push(Snapshot {
            id: id.clone(),
            volume_id: Some(volume_id.to_string()),
            status: SnapshotStatus::Pending,
            description: description.to_string(),
            tags: tags.clone(),
        });
        Ok(id)
    }

    fn delete_snapshot(&self, region_name: &str, snapshot_id: &str) -> Result<(), ProviderError> {
        const OP: &str = "DeleteSnapshot";
        let mut inventory = self.lock();
        let region = region_mut(&mut inventory, OP, region_name)?;

        let before = region.snapshots.len();
        region.snapshots.retain(|s| s.id != snapshot_id);
        if region.snapshots.len() == before {
            return Err(ProviderError::not_found(OP, region_name, snapshot_id));
        }
        Ok(())
    }

    fn copy_snapshot(
        &self,
        source_region: &str,
        destination_region: &str,
        snapshot_id: &str,
        description: &str,
    ) -> Result<String, ProviderError> {
        const OP: &str = "CopySnapshot";
        let mut inventory = self.lock();

        let volume_id = {
            let source = region_mut(&mut inventory, OP, source_region)?;
            let snapshot = source
                .snapshot_mut(snapshot_id)
                .ok_or_else(|| ProviderError::not_found(OP, source_region, snapshot_id))?;
            if snapshot.status != SnapshotStatus::Completed {
                return Err(ProviderError::api(
                    OP,
                    source_region,
                    "IncorrectState",
                    format!("snapshot {snapshot_id} is {}", snapshot.status),
                ));
            }
            snapshot.volume_id.clone()
        };

        let destination = region_mut(&mut inventory, OP, destination_region)?;
        if !destination.has_capacity() {
            return Err(ProviderError::rate_limited(
                OP,
                destination_region,
                "ResourceLimitExceeded: snapshot limit reached",
            ));
        }

        let id = new_snapshot_id();
        destination.snapshots.push(Snapshot {
            id: id.clone(),
            volume_id,
            status: SnapshotStatus::Pending,
            description: description.to_string(),
            tags: Tags::new(),
        });
        Ok(id)
    }

    fn tag_resource(
        &self,
        region_name: &str,
        resource_id: &str,
        tags: &Tags,
    ) -> Result<(), ProviderError> {
        const OP: &str = "CreateTags";
        let mut inventory = self.lock();
        let region = region_mut(&mut inventory, OP, region_name)?;

        let snapshot_idx = region.snapshots.iter().position(|s| s.id == resource_id);
        let volume_idx = region.volumes.iter().position(|v| v.id == resource_id);
        let target = match (snapshot_idx, volume_idx) {
            (Some(i), _) => &mut region.snapshots[i].tags,
            (None, Some(i)) => &mut region.volumes[i].tags,
            (None, None) => return Err(ProviderError::not_found(OP, region_name, resource_id)),
        };

        target.extend(tags.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "backup";

    fn tags(pairs: &[(&str, &str)]) -> Tags {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn provider() -> InventoryProvider {
        let mut inventory = Inventory::default();
        inventory.regions.insert(
            "us-east-1".to_string(),
            RegionInventory {
                volumes: vec![
                    Volume {
                        id: "vol-1".to_string(),
                        status: VolumeStatus::InUse,
                        tags: tags(&[(KEY, "enable=yes")]),
                        attachments: Vec::new(),
                    },
                    Volume {
                        id: "vol-2".to_string(),
                        status: VolumeStatus::Creating,
                        tags: tags(&[(KEY, "enable=yes")]),
                        attachments: Vec::new(),
                    },
                    Volume {
                        id: "vol-3".to_string(),
                        status: VolumeStatus::Available,
                        tags: Tags::new(),
                        attachments: Vec::new(),
                    },
                ],
                snapshots: Vec::new(),
                snapshot_limit: None,
            },
        );
        inventory.regions.insert(
            "us-west-2".to_string(),
            RegionInventory {
                snapshot_limit: Some(0),
                ..RegionInventory::default()
            },
        );
        InventoryProvider::new(inventory)
    }

    #[test]
    fn test_list_tagged_volumes_filters_tag_and_status() {
        let p = provider();
        let volumes = p
            .list_tagged_volumes("us-east-1", KEY, VolumeStatus::SNAPSHOTTABLE)
            .unwrap();
        let ids: Vec<&str> = volumes.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["vol-1"]);
    }

    #[test]
    fn test_unknown_region_is_an_error() {
        let p = provider();
        let err = p.list_tagged_volumes("nowhere", KEY, &[]).unwrap_err();
        assert!(matches!(err, ProviderError::Api { .. }));
    }

    #[test]
    fn test_created_snapshot_is_pending_until_settled() {
        let p = provider();
        let id = p
            .create_snapshot("us-east-1", "vol-1", "desc", &tags(&[(KEY, "2024-01-01;None")]))
            .unwrap();

        let completed = p
            .list_tagged_snapshots("us-east-1", KEY, SnapshotStatus::Completed)
            .unwrap();
        assert!(completed.is_empty());

        let found = p.find_snapshot_by_description("us-east-1", "desc").unwrap();
        assert_eq!(found.map(|s| s.id), Some(id));

        let mut inventory = p.inventory();
        assert_eq!(inventory.settle_pending(), 1);
    }

    #[test]
    fn test_create_for_unknown_volume_fails() {
        let p = provider();
        let err = p
            .create_snapshot("us-east-1", "vol-404", "desc", &Tags::new())
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotFound { .. }));
    }

    #[test]
    fn test_copy_into_full_region_is_rate_limited() {
        let mut inventory = provider().inventory();
        inventory.regions.get_mut("us-east-1").unwrap().snapshots.push(Snapshot {
            id: "snap-1".to_string(),
            volume_id: Some("vol-1".to_string()),
            status: SnapshotStatus::Completed,
            description: "desc".to_string(),
            tags: Tags::new(),
        });
        let p = InventoryProvider::new(inventory);

        let err = p
            .copy_snapshot("us-east-1", "us-west-2", "snap-1", "copy")
            .unwrap_err();
        assert!(err.is_rate_limited());
    }

    #[test]
    fn test_tag_and_delete_snapshot() {
        let p = provider();
        let id = p
            .create_snapshot("us-east-1", "vol-1", "desc", &Tags::new())
            .unwrap();

        p.tag_resource("us-east-1", &id, &tags(&[(KEY, "2024-01-01;None")]))
            .unwrap();
        let snapshot = p.find_snapshot_by_description("us-east-1", "desc").unwrap().unwrap();
        assert_eq!(snapshot.tag(KEY), Some("2024-01-01;None"));

        p.delete_snapshot("us-east-1", &id).unwrap();
        assert!(p.delete_snapshot("us-east-1", &id).is_err());
    }

    #[test]
    fn test_load_and_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inventory.json");

        let p = provider();
        p.create_snapshot("us-east-1", "vol-1", "desc", &Tags::new())
            .unwrap();
        p.save(&path).unwrap();

        let loaded = InventoryProvider::load(&path).unwrap();
        let snapshots = loaded.inventory().regions["us-east-1"].snapshots.clone();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].status, SnapshotStatus::Completed);
    }
}
