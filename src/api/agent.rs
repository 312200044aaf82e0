use serde::Deserialize;

use crate::error::ForgeError;

use super::client::ProxmoxClient;

/// One address reported by the guest agent for an interface.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentAddress {
    #[serde(rename = "ip-address")]
    pub ip_address: Option<String>,
    #[serde(rename = "ip-address-type")]
    pub address_type: Option<String>,
}

/// One guest network interface as reported by the agent.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentInterface {
    pub name: Option<String>,
    #[serde(rename = "ip-addresses", default)]
    pub ip_addresses: Vec<AgentAddress>,
}

impl ProxmoxClient {
    /// Query the guest agent for live interface/address information.
    /// Fails whenever the agent is not running yet; callers treat that as
    /// a soft miss.
    pub async fn agent_interfaces(
        &self,
        node: &str,
        vmid: u32,
    ) -> Result<Vec<AgentInterface>, ForgeError> {
        let path = format!(
            "/api2/json/nodes/{}/qemu/{}/agent/network-get-interfaces",
            node, vmid
        );
        let data = self.request_retry("GET", &path, None).await?;
        // Some agent versions wrap the list in a `result` member.
        let list = data.get("result").cloned().unwrap_or(data);
        serde_json::from_value(list)
            .map_err(|e| ForgeError::Api(format!("unexpected agent payload: {}", e)))
    }
}
