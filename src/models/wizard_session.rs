use serde::{Deserialize, Serialize};

/// Steps of the provisioning wizard, in traversal order. `DiskCustom`
/// is a sub-menu reachable from `DiskSelect` and able to return to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WizardStep {
    NodeSelect,
    TemplateSelect,
    RamSelect,
    CoresSelect,
    StorageSelect,
    DiskSelect,
    DiskCustom,
    NameInput,
    Confirm,
}

/// Parameters accumulated across wizard steps.
///
/// `password` and `vmid` are assigned exactly once (entering the confirm
/// step and accepting the name form, respectively) and never regenerated.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VmRequest {
    pub node: String,
    pub template_vmid: u32,
    pub template_name: String,
    pub ram_mb: u32,
    pub cores: u32,
    pub storage: String,
    pub disk_gb: u32,
    pub name: String,
    pub username: String,
    pub password: Option<String>,
    pub vmid: Option<u32>,
}

/// One active wizard per user while it runs.
#[derive(Debug, Clone)]
pub struct WizardSession {
    pub user_id: String,
    pub step: WizardStep,
    pub request: VmRequest,
}

impl WizardSession {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            step: WizardStep::NodeSelect,
            request: VmRequest::default(),
        }
    }
}
