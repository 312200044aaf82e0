use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::ForgeError;

use super::client::ProxmoxClient;

static MAC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)((?:[0-9a-f]{2}:){5}[0-9a-f]{2})").unwrap());
static DISK_SIZE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"size=([^,\s]+)").unwrap());

/// One VM row from a node's inventory listing.
#[derive(Debug, Clone)]
pub struct VmSummary {
    pub vmid: u32,
    pub name: String,
    pub status: String,
    pub template: bool,
}

/// The subset of a VM's configuration the orchestrator inspects.
#[derive(Debug, Clone, Default)]
pub struct VmConfigView {
    pub name: Option<String>,
    pub ciuser: Option<String>,
    pub cipassword: Option<String>,
    pub net0: Option<String>,
    pub scsi0: Option<String>,
}

impl VmConfigView {
    pub fn from_value(data: &Value) -> Self {
        let field = |key: &str| {
            data.get(key).and_then(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
        };
        Self {
            name: field("name"),
            ciuser: field("ciuser"),
            cipassword: field("cipassword"),
            net0: field("net0"),
            scsi0: field("scsi0"),
        }
    }

    /// MAC address of the first NIC, lowercased, if one is configured.
    pub fn mac_address(&self) -> Option<String> {
        let net0 = self.net0.as_deref()?;
        MAC_RE
            .captures(net0)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_lowercase())
    }

    /// `size=` attribute of the primary disk, e.g. `20G`, if present.
    pub fn primary_disk_size(&self) -> Option<String> {
        let scsi0 = self.scsi0.as_deref()?;
        DISK_SIZE_RE
            .captures(scsi0)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    }
}

/// Live status of a VM.
#[derive(Debug, Clone)]
pub struct VmStatusView {
    pub status: String,
    pub uptime: u64,
    pub cpu: f64,
    pub mem_bytes: u64,
    pub maxmem_bytes: u64,
}

impl VmStatusView {
    pub fn from_value(data: &Value) -> Self {
        Self {
            status: data.get("status").and_then(Value::as_str).unwrap_or("unknown").to_string(),
            uptime: data.get("uptime").and_then(Value::as_u64).unwrap_or(0),
            cpu: data.get("cpu").and_then(Value::as_f64).unwrap_or(0.0),
            mem_bytes: data.get("mem").and_then(Value::as_u64).unwrap_or(0),
            maxmem_bytes: data.get("maxmem").and_then(Value::as_u64).unwrap_or(0),
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == "running"
    }
}

impl ProxmoxClient {
    /// All VMs on a node.
    pub async fn list_vms(&self, node: &str) -> Result<Vec<VmSummary>, ForgeError> {
        let path = format!("/api2/json/nodes/{}/qemu", node);
        let data = self.request_retry("GET", &path, None).await?;
        let mut vms = Vec::new();
        if let Some(arr) = data.as_array() {
            for item in arr {
                if let Some(obj) = item.as_object() {
                    vms.push(VmSummary {
                        vmid: obj.get("vmid").and_then(Value::as_u64).unwrap_or(0) as u32,
                        name: obj.get("name").and_then(Value::as_str).unwrap_or("").to_string(),
                        status: obj.get("status").and_then(Value::as_str).unwrap_or("unknown").to_string(),
                        template: obj.get("template").and_then(Value::as_u64).unwrap_or(0) == 1,
                    });
                }
            }
        }
        vms.retain(|v| v.vmid != 0);
        vms.sort_by_key(|v| v.vmid);
        Ok(vms)
    }

    /// Template VMs on a node (clone sources).
    pub async fn list_templates(&self, node: &str) -> Result<Vec<VmSummary>, ForgeError> {
        let mut vms = self.list_vms(node).await?;
        vms.retain(|v| v.template);
        Ok(vms)
    }

    /// Full clone of a template onto the selected storage.
    pub async fn clone_vm(
        &self,
        node: &str,
        template_vmid: u32,
        newid: u32,
        name: &str,
        storage: &str,
    ) -> Result<(), ForgeError> {
        let path = format!("/api2/json/nodes/{}/qemu/{}/clone", node, template_vmid);
        let form = [
            ("newid", newid.to_string()),
            ("name", name.to_string()),
            ("full", "1".to_string()),
            ("storage", storage.to_string()),
        ];
        self.request("POST", &path, Some(&form)).await?;
        Ok(())
    }

    pub async fn vm_config(&self, node: &str, vmid: u32) -> Result<VmConfigView, ForgeError> {
        let path = format!("/api2/json/nodes/{}/qemu/{}/config", node, vmid);
        let data = self.request_retry("GET", &path, None).await?;
        Ok(VmConfigView::from_value(&data))
    }

    pub async fn set_vm_config(
        &self,
        node: &str,
        vmid: u32,
        pairs: &[(&str, String)],
    ) -> Result<(), ForgeError> {
        let path = format!("/api2/json/nodes/{}/qemu/{}/config", node, vmid);
        self.request("PUT", &path, Some(pairs)).await?;
        Ok(())
    }

    /// Grow a named disk. `size` is either absolute (`30G`) or a delta
    /// (`+10G`); callers validate before reaching this point.
    pub async fn resize_disk(
        &self,
        node: &str,
        vmid: u32,
        disk: &str,
        size: &str,
    ) -> Result<(), ForgeError> {
        let path = format!("/api2/json/nodes/{}/qemu/{}/resize", node, vmid);
        let form = [("disk", disk.to_string()), ("size", size.to_string())];
        self.request("PUT", &path, Some(&form)).await?;
        Ok(())
    }

    pub async fn start_vm(&self, node: &str, vmid: u32) -> Result<(), ForgeError> {
        let path = format!("/api2/json/nodes/{}/qemu/{}/status/start", node, vmid);
        self.request("POST", &path, None).await?;
        Ok(())
    }

    pub async fn stop_vm(&self, node: &str, vmid: u32) -> Result<(), ForgeError> {
        let path = format!("/api2/json/nodes/{}/qemu/{}/status/stop", node, vmid);
        self.request("POST", &path, None).await?;
        Ok(())
    }

    pub async fn vm_status(&self, node: &str, vmid: u32) -> Result<VmStatusView, ForgeError> {
        let path = format!("/api2/json/nodes/{}/qemu/{}/status/current", node, vmid);
        let data = self.request_retry("GET", &path, None).await?;
        Ok(VmStatusView::from_value(&data))
    }

    /// Delete a VM together with its disks and any leftover references.
    pub async fn delete_vm(&self, node: &str, vmid: u32) -> Result<(), ForgeError> {
        let path = format!(
            "/api2/json/nodes/{}/qemu/{}?purge=1&destroy-unreferenced-disks=1",
            node, vmid
        );
        self.request("DELETE", &path, None).await?;
        Ok(())
    }

    /// Clear a stale lock left behind by an interrupted operation.
    pub async fn unlock_vm(&self, node: &str, vmid: u32) -> Result<(), ForgeError> {
        let path = format!("/api2/json/nodes/{}/qemu/{}/unlock", node, vmid);
        self.request("DELETE", &path, None).await?;
        Ok(())
    }

    /// Run a monitor command inside the VM's QEMU instance and return the
    /// raw text reply.
    pub async fn monitor(&self, node: &str, vmid: u32, command: &str) -> Result<String, ForgeError> {
        let path = format!("/api2/json/nodes/{}/qemu/{}/monitor", node, vmid);
        let form = [("command", command.to_string())];
        let data = self.request_retry("POST", &path, Some(&form)).await?;
        Ok(data.as_str().unwrap_or("").to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_view_extracts_fields() {
        let data = serde_json::json!({
            "name": "web-1",
            "ciuser": "admin",
            "cipassword": "**********",
            "net0": "virtio=BC:24:11:2A:6F:11,bridge=vmbr0,firewall=1",
            "scsi0": "local-lvm:vm-104-disk-0,iothread=1,size=20G",
            "cores": 2
        });
        let view = VmConfigView::from_value(&data);
        assert_eq!(view.ciuser.as_deref(), Some("admin"));
        assert_eq!(view.mac_address().as_deref(), Some("bc:24:11:2a:6f:11"));
        assert_eq!(view.primary_disk_size().as_deref(), Some("20G"));
    }

    #[test]
    fn test_config_view_tolerates_missing_fields() {
        let view = VmConfigView::from_value(&serde_json::json!({}));
        assert!(view.ciuser.is_none());
        assert!(view.mac_address().is_none());
        assert!(view.primary_disk_size().is_none());
    }
}
