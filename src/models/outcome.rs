use serde::Serialize;

/// Final report of one committed provisioning run. Built once, handed to
/// the caller together with the generated credentials, then discarded.
#[derive(Debug, Clone, Serialize)]
pub struct ProvisioningOutcome {
    pub vmid: u32,
    pub node: String,
    pub name: String,
    pub username: String,
    pub password: String,
    /// Discovered address, or the `"unknown"` sentinel when every
    /// discovery round came up empty.
    pub ip: String,
    pub ssh_verified: bool,
    pub ssh_attempts: u32,
    /// Non-fatal degradations collected along the way (failed resize,
    /// unverified cloud-init, unreachable SSH).
    pub warnings: Vec<String>,
}

impl ProvisioningOutcome {
    /// True when the VM was created but some step degraded.
    pub fn is_degraded(&self) -> bool {
        !self.ssh_verified || !self.warnings.is_empty()
    }
}
