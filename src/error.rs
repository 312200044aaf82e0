/// Error types shared across the orchestrator
use thiserror::Error;

use crate::ssh::ShellError;

/// Errors that can occur while driving the wizard, the provisioning
/// pipeline, or ad-hoc hypervisor operations.
#[derive(Debug, Error)]
pub enum ForgeError {
    /// Malformed user input; the caller should re-prompt
    #[error("Invalid input: {0}")]
    Validation(String),

    /// A referenced node, VM, template, storage or snapshot does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Transport timeout, connect failure or 5xx that survived the retry budget
    #[error("Hypervisor API unreachable: {0}")]
    TransientApi(String),

    /// The hypervisor rejected the request (error envelope or 4xx)
    #[error("Hypervisor API error: {0}")]
    Api(String),

    /// Cloud-init readback did not contain the values that were written
    #[error("Cloud-init configuration for VM {vmid} could not be verified")]
    ConfigVerification {
        /// VM whose config readback failed
        vmid: u32,
    },

    /// Remote shell failure; never fatal to a pipeline that already started the VM
    #[error("Remote shell failure: {0}")]
    Shell(#[from] ShellError),

    /// Clone or start failed; the pipeline aborts without VM teardown
    #[error("Provisioning step '{step}' failed for VM {vmid}: {reason}")]
    FatalPipeline {
        step: &'static str,
        vmid: u32,
        reason: String,
    },

    /// A provisioning wizard is already active for this user
    #[error("A provisioning wizard is already in progress for this user")]
    WizardActive,
}

impl ForgeError {
    /// True for failures worth retrying on an idempotent read.
    pub fn is_transient(&self) -> bool {
        matches!(self, ForgeError::TransientApi(_))
    }
}
