//! Thin trait over the Proxmox client so the wizard and the provisioning
//! pipeline can be driven against a fake cluster in tests.

use crate::api::{
    AgentInterface, ArpEntry, NodeSummary, ProxmoxClient, StorageSummary, VmConfigView,
    VmStatusView, VmSummary,
};
use crate::cloudinit;
use crate::error::ForgeError;

#[allow(async_fn_in_trait)]
pub trait Hypervisor {
    async fn list_nodes(&self) -> Result<Vec<NodeSummary>, ForgeError>;
    async fn list_templates(&self, node: &str) -> Result<Vec<VmSummary>, ForgeError>;
    async fn image_storages(&self, node: &str) -> Result<Vec<StorageSummary>, ForgeError>;
    async fn next_id(&self) -> Result<u32, ForgeError>;
    async fn clone_vm(
        &self,
        node: &str,
        template_vmid: u32,
        new_vmid: u32,
        name: &str,
        storage: &str,
    ) -> Result<(), ForgeError>;
    /// Push rendered user-data to the snippets store. Returns the volume id
    /// to reference from `cicustom`, or `None` when the upload did not stick
    /// and the caller should fall back to inline `ciuser`/`cipassword`.
    async fn upload_user_data(
        &self,
        node: &str,
        vmid: u32,
        content: &str,
    ) -> Result<Option<String>, ForgeError>;
    async fn set_vm_config(
        &self,
        node: &str,
        vmid: u32,
        options: &[(&str, String)],
    ) -> Result<(), ForgeError>;
    async fn vm_config(&self, node: &str, vmid: u32) -> Result<VmConfigView, ForgeError>;
    async fn vm_status(&self, node: &str, vmid: u32) -> Result<VmStatusView, ForgeError>;
    async fn start_vm(&self, node: &str, vmid: u32) -> Result<(), ForgeError>;
    async fn stop_vm(&self, node: &str, vmid: u32) -> Result<(), ForgeError>;
    async fn resize_disk(
        &self,
        node: &str,
        vmid: u32,
        disk: &str,
        size: &str,
    ) -> Result<(), ForgeError>;
    async fn unlock_vm(&self, node: &str, vmid: u32) -> Result<(), ForgeError>;
    async fn agent_interfaces(
        &self,
        node: &str,
        vmid: u32,
    ) -> Result<Vec<AgentInterface>, ForgeError>;
    async fn monitor(&self, node: &str, vmid: u32, command: &str) -> Result<String, ForgeError>;
    async fn arp_table(&self, node: &str) -> Result<Vec<ArpEntry>, ForgeError>;
}

impl Hypervisor for ProxmoxClient {
    async fn list_nodes(&self) -> Result<Vec<NodeSummary>, ForgeError> {
        ProxmoxClient::list_nodes(self).await
    }

    async fn list_templates(&self, node: &str) -> Result<Vec<VmSummary>, ForgeError> {
        ProxmoxClient::list_templates(self, node).await
    }

    async fn image_storages(&self, node: &str) -> Result<Vec<StorageSummary>, ForgeError> {
        ProxmoxClient::image_storages(self, node).await
    }

    async fn next_id(&self) -> Result<u32, ForgeError> {
        ProxmoxClient::next_id(self).await
    }

    async fn clone_vm(
        &self,
        node: &str,
        template_vmid: u32,
        new_vmid: u32,
        name: &str,
        storage: &str,
    ) -> Result<(), ForgeError> {
        ProxmoxClient::clone_vm(self, node, template_vmid, new_vmid, name, storage).await
    }

    async fn upload_user_data(
        &self,
        node: &str,
        vmid: u32,
        content: &str,
    ) -> Result<Option<String>, ForgeError> {
        let filename = cloudinit::snippet_filename(vmid);
        let storage = crate::config::get_snippets_storage();
        match self.upload_snippet(node, &storage, &filename, content).await {
            Ok(volid) => Ok(Some(volid)),
            Err(e) => {
                tracing::warn!(vmid, error = %e, "snippet upload failed, will inline credentials");
                Ok(None)
            }
        }
    }

    async fn set_vm_config(
        &self,
        node: &str,
        vmid: u32,
        options: &[(&str, String)],
    ) -> Result<(), ForgeError> {
        ProxmoxClient::set_vm_config(self, node, vmid, options).await
    }

    async fn vm_config(&self, node: &str, vmid: u32) -> Result<VmConfigView, ForgeError> {
        ProxmoxClient::vm_config(self, node, vmid).await
    }

    async fn vm_status(&self, node: &str, vmid: u32) -> Result<VmStatusView, ForgeError> {
        ProxmoxClient::vm_status(self, node, vmid).await
    }

    async fn start_vm(&self, node: &str, vmid: u32) -> Result<(), ForgeError> {
        ProxmoxClient::start_vm(self, node, vmid).await
    }

    async fn stop_vm(&self, node: &str, vmid: u32) -> Result<(), ForgeError> {
        ProxmoxClient::stop_vm(self, node, vmid).await
    }

    async fn resize_disk(
        &self,
        node: &str,
        vmid: u32,
        disk: &str,
        size: &str,
    ) -> Result<(), ForgeError> {
        ProxmoxClient::resize_disk(self, node, vmid, disk, size).await
    }

    async fn unlock_vm(&self, node: &str, vmid: u32) -> Result<(), ForgeError> {
        ProxmoxClient::unlock_vm(self, node, vmid).await
    }

    async fn agent_interfaces(
        &self,
        node: &str,
        vmid: u32,
    ) -> Result<Vec<AgentInterface>, ForgeError> {
        ProxmoxClient::agent_interfaces(self, node, vmid).await
    }

    async fn monitor(&self, node: &str, vmid: u32, command: &str) -> Result<String, ForgeError> {
        ProxmoxClient::monitor(self, node, vmid, command).await
    }

    async fn arp_table(&self, node: &str) -> Result<Vec<ArpEntry>, ForgeError> {
        ProxmoxClient::arp_table(self, node).await
    }
}

/// Convenience helper shared by the CLI commands: find which node hosts a
/// given vmid by scanning every online node.
pub async fn locate_vm(api: &ProxmoxClient, vmid: u32) -> Result<(String, VmSummary), ForgeError> {
    for node in ProxmoxClient::list_nodes(api).await? {
        if !node.is_online() {
            continue;
        }
        let vms = ProxmoxClient::list_vms(api, &node.node).await?;
        if let Some(vm) = vms.into_iter().find(|v| v.vmid == vmid) {
            return Ok((node.node, vm));
        }
    }
    Err(ForgeError::NotFound(format!("VM {}", vmid)))
}
