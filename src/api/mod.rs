// Atomic API modules
pub mod agent;
pub mod client;
pub mod nodes;
pub mod snapshots;
pub mod vms;

// Re-export commonly used items
pub use agent::{AgentAddress, AgentInterface};
pub use client::{set_silent, ProxmoxClient};
pub use nodes::{ArpEntry, NodeSummary, StorageSummary};
pub use snapshots::SnapshotInfo;
pub use vms::{VmConfigView, VmStatusView, VmSummary};
