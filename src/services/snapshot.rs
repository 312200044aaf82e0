//! Snapshot operations addressed by vmid.

use chrono::Local;

use crate::api::{ProxmoxClient, SnapshotInfo};
use crate::error::ForgeError;
use crate::hypervisor::locate_vm;

/// Name used when the operator does not supply one.
pub fn default_snapshot_name() -> String {
    format!("snap-{}", Local::now().format("%Y%m%d-%H%M%S"))
}

pub async fn list(
    api: &ProxmoxClient,
    vmid: u32,
) -> Result<(String, Vec<SnapshotInfo>), ForgeError> {
    let (node, _) = locate_vm(api, vmid).await?;
    let snapshots = api.list_snapshots(&node, vmid).await?;
    Ok((node, snapshots))
}

/// Create a snapshot, generating a timestamped name when none is given.
pub async fn create(
    api: &ProxmoxClient,
    vmid: u32,
    name: Option<&str>,
    description: Option<&str>,
) -> Result<(String, String), ForgeError> {
    let (node, _) = locate_vm(api, vmid).await?;
    let name = name
        .map(|n| n.to_string())
        .unwrap_or_else(default_snapshot_name);
    api.create_snapshot(&node, vmid, &name, description).await?;
    Ok((node, name))
}

pub async fn delete(api: &ProxmoxClient, vmid: u32, name: &str) -> Result<String, ForgeError> {
    let (node, _) = locate_vm(api, vmid).await?;
    api.delete_snapshot(&node, vmid, name).await?;
    Ok(node)
}

/// Roll back to a named snapshot after confirming it exists.
pub async fn rollback(api: &ProxmoxClient, vmid: u32, name: &str) -> Result<String, ForgeError> {
    let (node, _) = locate_vm(api, vmid).await?;
    let snapshots = api.list_snapshots(&node, vmid).await?;
    if !snapshots.iter().any(|s| s.name == name) {
        return Err(ForgeError::NotFound(format!(
            "snapshot '{}' on VM {}",
            name, vmid
        )));
    }
    api.rollback_snapshot(&node, vmid, name).await?;
    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_snapshot_name_shape() {
        let name = default_snapshot_name();
        assert!(name.starts_with("snap-"));
        // snap-YYYYMMDD-HHMMSS
        assert_eq!(name.len(), "snap-20250101-120000".len());
    }
}
