use serde::Deserialize;

use crate::error::ForgeError;

use super::client::ProxmoxClient;

/// One snapshot entry. Proxmox always includes a synthetic `current`
/// entry marking the live state; callers filter it out before display.
#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotInfo {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub snaptime: Option<i64>,
    #[serde(default)]
    pub vmstate: Option<u8>,
}

impl SnapshotInfo {
    pub fn is_current_marker(&self) -> bool {
        self.name == "current"
    }
}

impl ProxmoxClient {
    pub async fn list_snapshots(
        &self,
        node: &str,
        vmid: u32,
    ) -> Result<Vec<SnapshotInfo>, ForgeError> {
        let path = format!("/api2/json/nodes/{}/qemu/{}/snapshot", node, vmid);
        let data = self.request_retry("GET", &path, None).await?;
        let mut snapshots: Vec<SnapshotInfo> = serde_json::from_value(data)
            .map_err(|e| ForgeError::Api(format!("unexpected snapshot payload: {}", e)))?;
        snapshots.retain(|s| !s.is_current_marker());
        snapshots.sort_by_key(|s| s.snaptime.unwrap_or(0));
        Ok(snapshots)
    }

    pub async fn create_snapshot(
        &self,
        node: &str,
        vmid: u32,
        name: &str,
        description: Option<&str>,
    ) -> Result<(), ForgeError> {
        let path = format!("/api2/json/nodes/{}/qemu/{}/snapshot", node, vmid);
        let mut form: Vec<(&str, String)> = vec![("snapname", name.to_string())];
        if let Some(desc) = description {
            form.push(("description", desc.to_string()));
        }
        self.request("POST", &path, Some(&form)).await?;
        Ok(())
    }

    pub async fn delete_snapshot(
        &self,
        node: &str,
        vmid: u32,
        name: &str,
    ) -> Result<(), ForgeError> {
        let path = format!(
            "/api2/json/nodes/{}/qemu/{}/snapshot/{}",
            node,
            vmid,
            urlencoding::encode(name)
        );
        self.request("DELETE", &path, None).await?;
        Ok(())
    }

    pub async fn rollback_snapshot(
        &self,
        node: &str,
        vmid: u32,
        name: &str,
    ) -> Result<(), ForgeError> {
        let path = format!(
            "/api2/json/nodes/{}/qemu/{}/snapshot/{}/rollback",
            node,
            vmid,
            urlencoding::encode(name)
        );
        self.request("POST", &path, None).await?;
        Ok(())
    }
}
