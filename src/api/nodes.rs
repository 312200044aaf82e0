use serde_json::Value;

use crate::error::ForgeError;

use super::client::ProxmoxClient;

/// One cluster node as reported by the inventory endpoint.
#[derive(Debug, Clone)]
pub struct NodeSummary {
    pub node: String,
    pub status: String,
}

impl NodeSummary {
    pub fn is_online(&self) -> bool {
        self.status == "online"
    }
}

/// A node storage capable of holding VM disk images.
#[derive(Debug, Clone)]
pub struct StorageSummary {
    pub storage: String,
    pub avail_bytes: u64,
    pub content: String,
}

/// One entry of a node's ARP table.
#[derive(Debug, Clone)]
pub struct ArpEntry {
    pub ip: String,
    pub mac: String,
}

impl ProxmoxClient {
    /// List cluster nodes.
    pub async fn list_nodes(&self) -> Result<Vec<NodeSummary>, ForgeError> {
        let data = self.request_retry("GET", "/api2/json/nodes", None).await?;
        let mut nodes = Vec::new();
        if let Some(arr) = data.as_array() {
            for item in arr {
                if let Some(obj) = item.as_object() {
                    nodes.push(NodeSummary {
                        node: obj.get("node").and_then(Value::as_str).unwrap_or("").to_string(),
                        status: obj.get("status").and_then(Value::as_str).unwrap_or("unknown").to_string(),
                    });
                }
            }
        }
        nodes.retain(|n| !n.node.is_empty());
        Ok(nodes)
    }

    /// Allocate the next free VM id from the cluster.
    pub async fn next_id(&self) -> Result<u32, ForgeError> {
        let data = self.request_retry("GET", "/api2/json/cluster/nextid", None).await?;
        let parsed = match &data {
            Value::String(s) => s.trim().parse::<u32>().ok(),
            Value::Number(n) => n.as_u64().map(|v| v as u32),
            _ => None,
        };
        parsed.ok_or_else(|| ForgeError::Api(format!("unusable next-id payload: {}", data)))
    }

    /// Storages on a node whose content types include disk images.
    pub async fn image_storages(&self, node: &str) -> Result<Vec<StorageSummary>, ForgeError> {
        let path = format!("/api2/json/nodes/{}/storage", node);
        let data = self.request_retry("GET", &path, None).await?;
        let mut storages = Vec::new();
        if let Some(arr) = data.as_array() {
            for item in arr {
                if let Some(obj) = item.as_object() {
                    let content = obj.get("content").and_then(Value::as_str).unwrap_or("").to_string();
                    if !content.split(',').any(|c| c.trim() == "images") {
                        continue;
                    }
                    storages.push(StorageSummary {
                        storage: obj.get("storage").and_then(Value::as_str).unwrap_or("").to_string(),
                        avail_bytes: obj.get("avail").and_then(Value::as_u64).unwrap_or(0),
                        content,
                    });
                }
            }
        }
        storages.retain(|s| !s.storage.is_empty());
        Ok(storages)
    }

    /// Read a node's ARP table, used as a last-resort address source.
    pub async fn arp_table(&self, node: &str) -> Result<Vec<ArpEntry>, ForgeError> {
        let path = format!("/api2/json/nodes/{}/network/arp", node);
        let data = self.request_retry("GET", &path, None).await?;
        let mut entries = Vec::new();
        if let Some(arr) = data.as_array() {
            for item in arr {
                if let Some(obj) = item.as_object() {
                    let ip = obj.get("ip").and_then(Value::as_str).unwrap_or("").to_string();
                    let mac = obj.get("mac").and_then(Value::as_str).unwrap_or("").to_string();
                    if !ip.is_empty() && !mac.is_empty() {
                        entries.push(ArpEntry { ip, mac: mac.to_lowercase() });
                    }
                }
            }
        }
        Ok(entries)
    }
}
