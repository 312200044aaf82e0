use vmforge::api::{
    AgentInterface, ArpEntry, NodeSummary, StorageSummary, VmConfigView, VmStatusView, VmSummary,
};
use vmforge::error::ForgeError;
use vmforge::hypervisor::Hypervisor;
use vmforge::models::{StepPrompt, WizardReply, WizardSession, WizardStep};
use vmforge::sessions::SessionStore;
use vmforge::wizard;

const GIB: u64 = 1024 * 1024 * 1024;

/// Two-node cluster with one template and one storage; offline node must
/// never show up in wizard menus.
struct FakeCluster {
    templates_fail: bool,
}

impl FakeCluster {
    fn new() -> Self {
        Self {
            templates_fail: false,
        }
    }
}

impl Hypervisor for FakeCluster {
    async fn list_nodes(&self) -> Result<Vec<NodeSummary>, ForgeError> {
        Ok(vec![
            NodeSummary {
                node: "pve1".into(),
                status: "online".into(),
            },
            NodeSummary {
                node: "pve2".into(),
                status: "offline".into(),
            },
        ])
    }

    async fn list_templates(&self, _node: &str) -> Result<Vec<VmSummary>, ForgeError> {
        if self.templates_fail {
            return Err(ForgeError::Api("template listing exploded".to_string()));
        }
        Ok(vec![VmSummary {
            vmid: 9000,
            name: "debian-12-template".into(),
            status: "stopped".into(),
            template: true,
        }])
    }

    async fn image_storages(&self, _node: &str) -> Result<Vec<StorageSummary>, ForgeError> {
        Ok(vec![StorageSummary {
            storage: "local-lvm".into(),
            avail_bytes: 200 * GIB,
            content: "images,rootdir".into(),
        }])
    }

    async fn next_id(&self) -> Result<u32, ForgeError> {
        Ok(4242)
    }

    async fn clone_vm(
        &self,
        _node: &str,
        _template_vmid: u32,
        _new_vmid: u32,
        _name: &str,
        _storage: &str,
    ) -> Result<(), ForgeError> {
        Err(ForgeError::Api("not scripted".to_string()))
    }

    async fn upload_user_data(
        &self,
        _node: &str,
        _vmid: u32,
        _content: &str,
    ) -> Result<Option<String>, ForgeError> {
        Err(ForgeError::Api("not scripted".to_string()))
    }

    async fn set_vm_config(
        &self,
        _node: &str,
        _vmid: u32,
        _options: &[(&str, String)],
    ) -> Result<(), ForgeError> {
        Err(ForgeError::Api("not scripted".to_string()))
    }

    async fn vm_config(&self, _node: &str, _vmid: u32) -> Result<VmConfigView, ForgeError> {
        Err(ForgeError::Api("not scripted".to_string()))
    }

    async fn vm_status(&self, _node: &str, _vmid: u32) -> Result<VmStatusView, ForgeError> {
        Err(ForgeError::Api("not scripted".to_string()))
    }

    async fn start_vm(&self, _node: &str, _vmid: u32) -> Result<(), ForgeError> {
        Err(ForgeError::Api("not scripted".to_string()))
    }

    async fn stop_vm(&self, _node: &str, _vmid: u32) -> Result<(), ForgeError> {
        Err(ForgeError::Api("not scripted".to_string()))
    }

    async fn resize_disk(
        &self,
        _node: &str,
        _vmid: u32,
        _disk: &str,
        _size: &str,
    ) -> Result<(), ForgeError> {
        Err(ForgeError::Api("not scripted".to_string()))
    }

    async fn unlock_vm(&self, _node: &str, _vmid: u32) -> Result<(), ForgeError> {
        Err(ForgeError::Api("not scripted".to_string()))
    }

    async fn agent_interfaces(
        &self,
        _node: &str,
        _vmid: u32,
    ) -> Result<Vec<AgentInterface>, ForgeError> {
        Err(ForgeError::Api("not scripted".to_string()))
    }

    async fn monitor(&self, _node: &str, _vmid: u32, _command: &str) -> Result<String, ForgeError> {
        Err(ForgeError::Api("not scripted".to_string()))
    }

    async fn arp_table(&self, _node: &str) -> Result<Vec<ArpEntry>, ForgeError> {
        Err(ForgeError::Api("not scripted".to_string()))
    }
}

async fn advance_expect_prompt(
    hv: &FakeCluster,
    wizards: &SessionStore<WizardSession>,
    user: &str,
    input: &str,
) -> StepPrompt {
    match wizard::advance(hv, wizards, user, input).await.unwrap() {
        WizardReply::Prompt(p) => p,
        other => panic!("expected a prompt, got {:?}", other),
    }
}

/// Walk a fresh wizard up to (and including) the storage pick, leaving it
/// on the disk step.
async fn walk_to_disk(hv: &FakeCluster, wizards: &SessionStore<WizardSession>, user: &str) {
    wizard::start(hv, wizards, user).await.unwrap();
    advance_expect_prompt(hv, wizards, user, "pve1").await;
    advance_expect_prompt(hv, wizards, user, "9000").await;
    advance_expect_prompt(hv, wizards, user, "4096").await;
    advance_expect_prompt(hv, wizards, user, "2").await;
    let p = advance_expect_prompt(hv, wizards, user, "local-lvm").await;
    assert_eq!(p.step, WizardStep::DiskSelect);
}

#[tokio::test]
async fn test_start_lists_only_online_nodes() {
    let hv = FakeCluster::new();
    let wizards = SessionStore::new();

    let prompt = wizard::start(&hv, &wizards, "alice").await.unwrap();

    assert_eq!(prompt.step, WizardStep::NodeSelect);
    let values: Vec<&str> = prompt.options.iter().map(|o| o.value.as_str()).collect();
    assert_eq!(values, ["pve1"]);
    assert!(wizards.contains("alice"));
}

#[tokio::test]
async fn test_second_wizard_for_same_user_is_rejected() {
    let hv = FakeCluster::new();
    let wizards = SessionStore::new();

    wizard::start(&hv, &wizards, "alice").await.unwrap();
    let err = wizard::start(&hv, &wizards, "alice").await.unwrap_err();

    assert!(matches!(err, ForgeError::WizardActive));
    assert!(wizards.contains("alice"));
}

#[tokio::test]
async fn test_different_users_run_independent_wizards() {
    let hv = FakeCluster::new();
    let wizards = SessionStore::new();

    wizard::start(&hv, &wizards, "alice").await.unwrap();
    wizard::start(&hv, &wizards, "bob").await.unwrap();

    assert_eq!(wizards.len(), 2);
}

#[tokio::test]
async fn test_full_walk_reaches_commit() {
    let hv = FakeCluster::new();
    let wizards = SessionStore::new();
    walk_to_disk(&hv, &wizards, "alice").await;

    let p = advance_expect_prompt(&hv, &wizards, "alice", "40").await;
    assert_eq!(p.step, WizardStep::NameInput);
    assert!(p.free_text);

    let p = advance_expect_prompt(&hv, &wizards, "alice", "Web Server\nAdmin User").await;
    assert_eq!(p.step, WizardStep::Confirm);
    let summary = p.summary.expect("confirm prompt carries a summary");
    assert!(summary.contains("web-server"));
    assert!(summary.contains("Admin_User"));
    assert!(summary.contains("4242"));
    assert!(summary.contains("debian-12-template"));

    let reply = wizard::advance(&hv, &wizards, "alice", "create")
        .await
        .unwrap();
    assert!(matches!(reply, WizardReply::Committed));

    // The committed session stays for the pipeline to pick up.
    let session = wizards.get("alice").expect("session kept after commit");
    assert_eq!(session.step, WizardStep::Confirm);
    assert_eq!(session.request.node, "pve1");
    assert_eq!(session.request.template_vmid, 9000);
    assert_eq!(session.request.ram_mb, 4096);
    assert_eq!(session.request.cores, 2);
    assert_eq!(session.request.storage, "local-lvm");
    assert_eq!(session.request.disk_gb, 40);
    assert_eq!(session.request.name, "web-server");
    assert_eq!(session.request.username, "Admin_User");
    assert_eq!(session.request.vmid, Some(4242));
    assert_eq!(
        session.request.password.expect("password assigned").len(),
        12
    );
}

#[tokio::test]
async fn test_rejected_input_reprompts_with_notice() {
    let hv = FakeCluster::new();
    let wizards = SessionStore::new();
    wizard::start(&hv, &wizards, "alice").await.unwrap();

    let p = advance_expect_prompt(&hv, &wizards, "alice", "not-a-node").await;
    assert_eq!(p.step, WizardStep::NodeSelect);
    assert!(p.notice.is_some());

    // The wizard survives the rejection and continues on valid input.
    let p = advance_expect_prompt(&hv, &wizards, "alice", "pve1").await;
    assert_eq!(p.step, WizardStep::TemplateSelect);
}

#[tokio::test]
async fn test_confirm_rejects_anything_but_create() {
    let hv = FakeCluster::new();
    let wizards = SessionStore::new();
    walk_to_disk(&hv, &wizards, "alice").await;
    advance_expect_prompt(&hv, &wizards, "alice", "40").await;
    advance_expect_prompt(&hv, &wizards, "alice", "app\nadmin").await;

    let p = advance_expect_prompt(&hv, &wizards, "alice", "yes").await;
    assert_eq!(p.step, WizardStep::Confirm);
    assert!(p.notice.is_some());

    let reply = wizard::advance(&hv, &wizards, "alice", "CREATE")
        .await
        .unwrap();
    assert!(matches!(reply, WizardReply::Committed));
}

#[tokio::test]
async fn test_cancel_removes_session_and_frees_slot() {
    let hv = FakeCluster::new();
    let wizards = SessionStore::new();
    wizard::start(&hv, &wizards, "alice").await.unwrap();
    advance_expect_prompt(&hv, &wizards, "alice", "pve1").await;

    let reply = wizard::advance(&hv, &wizards, "alice", "Cancel")
        .await
        .unwrap();
    assert!(matches!(reply, WizardReply::Cancelled));
    assert!(!wizards.contains("alice"));

    // The slot is free again.
    wizard::start(&hv, &wizards, "alice").await.unwrap();
}

#[tokio::test]
async fn test_custom_disk_menu_roundtrip() {
    let hv = FakeCluster::new();
    let wizards = SessionStore::new();
    walk_to_disk(&hv, &wizards, "alice").await;

    let p = advance_expect_prompt(&hv, &wizards, "alice", "custom").await;
    assert_eq!(p.step, WizardStep::DiskCustom);

    let p = advance_expect_prompt(&hv, &wizards, "alice", "back").await;
    assert_eq!(p.step, WizardStep::DiskSelect);

    advance_expect_prompt(&hv, &wizards, "alice", "custom").await;
    // 17 is not on the custom menu either
    let p = advance_expect_prompt(&hv, &wizards, "alice", "17").await;
    assert_eq!(p.step, WizardStep::DiskCustom);
    assert!(p.notice.is_some());

    let p = advance_expect_prompt(&hv, &wizards, "alice", "120").await;
    assert_eq!(p.step, WizardStep::NameInput);
    assert_eq!(wizards.get("alice").unwrap().request.disk_gb, 120);
}

#[tokio::test]
async fn test_name_submission_without_username_defaults() {
    let hv = FakeCluster::new();
    let wizards = SessionStore::new();
    walk_to_disk(&hv, &wizards, "alice").await;
    advance_expect_prompt(&hv, &wizards, "alice", "20").await;

    let p = advance_expect_prompt(&hv, &wizards, "alice", "just-a-name").await;
    assert_eq!(p.step, WizardStep::Confirm);
    assert_eq!(wizards.get("alice").unwrap().request.username, "user");
}

#[tokio::test]
async fn test_hypervisor_failure_tears_the_wizard_down() {
    let hv = FakeCluster {
        templates_fail: true,
    };
    let wizards = SessionStore::new();
    wizard::start(&hv, &wizards, "alice").await.unwrap();

    let err = wizard::advance(&hv, &wizards, "alice", "pve1")
        .await
        .unwrap_err();
    assert!(matches!(err, ForgeError::Api(_)));
    assert!(!wizards.contains("alice"));
}

#[tokio::test]
async fn test_advance_without_session_is_not_found() {
    let hv = FakeCluster::new();
    let wizards: SessionStore<WizardSession> = SessionStore::new();

    let err = wizard::advance(&hv, &wizards, "nobody", "pve1")
        .await
        .unwrap_err();
    assert!(matches!(err, ForgeError::NotFound(_)));
}
