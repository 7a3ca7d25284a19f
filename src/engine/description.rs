//! Snapshot descriptions.
//!
//! The description of a scheduled snapshot is its idempotency key: it
//! embeds the volume, the attachment and the schedule label, so a rerun in
//! the same schedule period produces the same string and finds the snapshot
//! it already created.

use crate::provider::Attachment;

/// Placeholder for attachment fields that do not exist
pub const ABSENT: &str = "-";

/// Description of a snapshot of `volume_id` taken under `label`.
///
/// `Snapshot of [vol] attached to [instance-id] [instance-name] as [device] on [label]`
pub fn snapshot_description(
    volume_id: &str,
    attachment: Option<&Attachment>,
    label: &str,
) -> String {
    let (instance_id, instance_name, device) = match attachment {
        Some(attachment) => (
            attachment.instance_id.as_str(),
            attachment.instance_name.as_deref().unwrap_or(ABSENT),
            attachment.device.as_str(),
        ),
        None => (ABSENT, ABSENT, ABSENT),
    };

    format!(
        "Snapshot of [{volume_id}] attached to [{instance_id}] [{instance_name}] as [{device}] on [{label}]"
    )
}

/// Description of a cross-region copy of `snapshot_id`.
pub fn copy_description(source_description: &str, snapshot_id: &str, source_region: &str) -> String {
    format!("{source_description} [Copy of ({snapshot_id}) from ({source_region})]")
}
