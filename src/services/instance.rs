//! Ad-hoc operations against existing VMs: listing, status, lifecycle,
//! and disk growth. Commands address VMs by vmid alone; the owning node
//! is resolved by scanning node listings.

use std::time::Duration;

use tokio::time::sleep;

use crate::api::{ProxmoxClient, VmStatusView, VmSummary};
use crate::error::ForgeError;
use crate::hypervisor::locate_vm;

use super::provision::PRIMARY_DISK;
use super::resize;

const DELETE_STOP_SETTLE: Duration = Duration::from_secs(4);

/// One row of the instance table.
#[derive(Debug, Clone)]
pub struct InstanceRow {
    pub node: String,
    pub vm: VmSummary,
}

/// List VMs for one node, or across every online node.
pub async fn list_instances(
    api: &ProxmoxClient,
    node: Option<&str>,
) -> Result<Vec<InstanceRow>, ForgeError> {
    let nodes: Vec<String> = match node {
        Some(n) => vec![n.to_string()],
        None => api
            .list_nodes()
            .await?
            .into_iter()
            .filter(|n| n.is_online())
            .map(|n| n.node)
            .collect(),
    };

    let mut rows = Vec::new();
    for node in nodes {
        for vm in api.list_vms(&node).await? {
            rows.push(InstanceRow {
                node: node.clone(),
                vm,
            });
        }
    }
    rows.sort_by_key(|r| r.vm.vmid);
    Ok(rows)
}

/// Resolve a vmid and fetch its live status.
pub async fn instance_status(
    api: &ProxmoxClient,
    vmid: u32,
) -> Result<(String, VmSummary, VmStatusView), ForgeError> {
    let (node, vm) = locate_vm(api, vmid).await?;
    let status = api.vm_status(&node, vmid).await?;
    Ok((node, vm, status))
}

pub async fn start_instance(api: &ProxmoxClient, vmid: u32) -> Result<String, ForgeError> {
    let (node, _) = locate_vm(api, vmid).await?;
    api.start_vm(&node, vmid).await?;
    Ok(node)
}

pub async fn stop_instance(api: &ProxmoxClient, vmid: u32) -> Result<String, ForgeError> {
    let (node, _) = locate_vm(api, vmid).await?;
    api.stop_vm(&node, vmid).await?;
    Ok(node)
}

/// Delete a VM with disk purge. A running VM is stopped first; a held
/// lock gets one best-effort release before the delete call.
pub async fn delete_instance(api: &ProxmoxClient, vmid: u32) -> Result<String, ForgeError> {
    let (node, _) = locate_vm(api, vmid).await?;

    match api.vm_status(&node, vmid).await {
        Ok(status) if status.is_running() => {
            if let Err(e) = api.stop_vm(&node, vmid).await {
                tracing::warn!(vmid, error = %e, "stop before delete failed");
            }
            sleep(DELETE_STOP_SETTLE).await;
        }
        Ok(_) => {}
        Err(e) => tracing::warn!(vmid, error = %e, "status check before delete failed"),
    }

    if let Err(e) = api.unlock_vm(&node, vmid).await {
        tracing::debug!(vmid, error = %e, "unlock before delete failed");
    }

    api.delete_vm(&node, vmid).await?;
    Ok(node)
}

/// Apply new core/memory counts to an existing VM.
pub async fn modify_instance(
    api: &ProxmoxClient,
    vmid: u32,
    cores: u32,
    memory_mb: u32,
) -> Result<String, ForgeError> {
    if cores == 0 || memory_mb == 0 {
        return Err(ForgeError::Validation(
            "cores and memory must both be positive".to_string(),
        ));
    }
    let (node, _) = locate_vm(api, vmid).await?;
    let options = [
        ("cores", cores.to_string()),
        ("memory", memory_mb.to_string()),
    ];
    api.set_vm_config(&node, vmid, &options).await?;
    Ok(node)
}

/// Parse the operator's size argument against the current disk size and
/// issue the growth. Returns the node and the normalized growth string.
pub async fn resize_instance(
    api: &ProxmoxClient,
    vmid: u32,
    size: &str,
) -> Result<(String, String), ForgeError> {
    let (node, _) = locate_vm(api, vmid).await?;
    let config = api.vm_config(&node, vmid).await?;
    let current_bytes = config
        .primary_disk_size()
        .and_then(|attr| resize::parse_size_attribute(&attr));
    let growth = resize::parse_resize_instruction(size, current_bytes)?;
    api.resize_disk(&node, vmid, PRIMARY_DISK, &growth).await?;
    Ok((node, growth))
}
