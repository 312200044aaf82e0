//! The provisioning wizard state machine.
//!
//! Pure request/reply: the caller feeds one submission at a time and
//! renders the returned prompt. Rejected input never tears the wizard
//! down; it re-prompts the same step with a notice. Hypervisor failures
//! do tear it down, removing the session.

use crate::error::ForgeError;
use crate::hypervisor::Hypervisor;
use crate::models::{
    PromptOption, StepPrompt, VmRequest, WizardReply, WizardSession, WizardStep,
};
use crate::sessions::SessionStore;
use crate::util::{bytes_to_gib, random_password, PASSWORD_LENGTH};

use super::normalize::{normalize_username, normalize_vm_name};
use super::options::{
    CANCEL_VALUE, CONFIRM_VALUE, CORE_OPTIONS, CUSTOM_DISK_OPTIONS_GB, DISK_BACK_VALUE,
    DISK_CUSTOM_VALUE, DISK_OPTIONS_GB, RAM_OPTIONS_MB,
};

/// Open a wizard for `user_id`. At most one may exist per user.
pub async fn start<H: Hypervisor>(
    hv: &H,
    wizards: &SessionStore<WizardSession>,
    user_id: &str,
) -> Result<StepPrompt, ForgeError> {
    if !wizards.insert_new(user_id, WizardSession::new(user_id)) {
        return Err(ForgeError::WizardActive);
    }
    match node_prompt(hv).await {
        Ok(prompt) => Ok(prompt),
        Err(e) => {
            wizards.remove(user_id);
            Err(e)
        }
    }
}

/// Feed one submission to the user's wizard.
pub async fn advance<H: Hypervisor>(
    hv: &H,
    wizards: &SessionStore<WizardSession>,
    user_id: &str,
    input: &str,
) -> Result<WizardReply, ForgeError> {
    let mut session = wizards
        .get(user_id)
        .ok_or_else(|| ForgeError::NotFound(format!("wizard session for {}", user_id)))?;

    let submission = input.trim();
    if submission.eq_ignore_ascii_case(CANCEL_VALUE) {
        wizards.remove(user_id);
        return Ok(WizardReply::Cancelled);
    }

    match step_input(hv, &mut session, submission).await {
        Ok(reply) => {
            // Persist the mutated session; Committed leaves it in place
            // for the pipeline to consume.
            wizards.replace(user_id, session);
            Ok(reply)
        }
        Err(e) => {
            wizards.remove(user_id);
            Err(e)
        }
    }
}

/// Abandon the user's wizard if one exists.
pub fn cancel(wizards: &SessionStore<WizardSession>, user_id: &str) -> bool {
    wizards.remove(user_id).is_some()
}

async fn step_input<H: Hypervisor>(
    hv: &H,
    session: &mut WizardSession,
    input: &str,
) -> Result<WizardReply, ForgeError> {
    match session.step {
        WizardStep::NodeSelect => {
            let nodes = online_nodes(hv).await?;
            if !nodes.iter().any(|n| n == input) {
                return reprompt(node_prompt(hv).await?, "Pick one of the listed nodes.");
            }
            session.request.node = input.to_string();
            session.step = WizardStep::TemplateSelect;
            Ok(WizardReply::Prompt(template_prompt(hv, &session.request.node).await?))
        }
        WizardStep::TemplateSelect => {
            let templates = hv.list_templates(&session.request.node).await?;
            let picked = input
                .parse::<u32>()
                .ok()
                .and_then(|vmid| templates.into_iter().find(|t| t.vmid == vmid));
            let Some(template) = picked else {
                return reprompt(
                    template_prompt(hv, &session.request.node).await?,
                    "Pick one of the listed templates.",
                );
            };
            session.request.template_vmid = template.vmid;
            session.request.template_name = template.name;
            session.step = WizardStep::RamSelect;
            Ok(WizardReply::Prompt(ram_prompt()))
        }
        WizardStep::RamSelect => {
            let Some(ram) = parse_choice(input, &RAM_OPTIONS_MB) else {
                return reprompt(ram_prompt(), "Pick one of the listed RAM sizes.");
            };
            session.request.ram_mb = ram;
            session.step = WizardStep::CoresSelect;
            Ok(WizardReply::Prompt(cores_prompt()))
        }
        WizardStep::CoresSelect => {
            let Some(cores) = parse_choice(input, &CORE_OPTIONS) else {
                return reprompt(cores_prompt(), "Pick one of the listed core counts.");
            };
            session.request.cores = cores;
            session.step = WizardStep::StorageSelect;
            Ok(WizardReply::Prompt(storage_prompt(hv, &session.request.node).await?))
        }
        WizardStep::StorageSelect => {
            let storages = hv.image_storages(&session.request.node).await?;
            if !storages.iter().any(|s| s.storage == input) {
                return reprompt(
                    storage_prompt(hv, &session.request.node).await?,
                    "Pick one of the listed storages.",
                );
            }
            session.request.storage = input.to_string();
            session.step = WizardStep::DiskSelect;
            Ok(WizardReply::Prompt(disk_prompt()))
        }
        WizardStep::DiskSelect => {
            if input.eq_ignore_ascii_case(DISK_CUSTOM_VALUE) {
                session.step = WizardStep::DiskCustom;
                return Ok(WizardReply::Prompt(disk_custom_prompt()));
            }
            let Some(disk) = parse_choice(input, &DISK_OPTIONS_GB) else {
                return reprompt(disk_prompt(), "Pick a listed size or `custom`.");
            };
            session.request.disk_gb = disk;
            session.step = WizardStep::NameInput;
            Ok(WizardReply::Prompt(name_prompt()))
        }
        WizardStep::DiskCustom => {
            if input.eq_ignore_ascii_case(DISK_BACK_VALUE) {
                session.step = WizardStep::DiskSelect;
                return Ok(WizardReply::Prompt(disk_prompt()));
            }
            let Some(disk) = parse_choice(input, &CUSTOM_DISK_OPTIONS_GB) else {
                return reprompt(disk_custom_prompt(), "Pick a listed size or `back`.");
            };
            session.request.disk_gb = disk;
            session.step = WizardStep::NameInput;
            Ok(WizardReply::Prompt(name_prompt()))
        }
        WizardStep::NameInput => {
            // Two-field form: first line the VM name, second the login user.
            let (raw_name, raw_user) = match input.split_once('\n') {
                Some((n, u)) => (n, u),
                None => (input, ""),
            };
            session.request.name = normalize_vm_name(raw_name);
            session.request.username = normalize_username(raw_user);
            session.request.vmid = Some(hv.next_id().await?);
            session.request.password = Some(random_password(PASSWORD_LENGTH));
            session.step = WizardStep::Confirm;
            Ok(WizardReply::Prompt(confirm_prompt(&session.request)))
        }
        WizardStep::Confirm => {
            if input.eq_ignore_ascii_case(CONFIRM_VALUE) {
                Ok(WizardReply::Committed)
            } else {
                reprompt(
                    confirm_prompt(&session.request),
                    "Reply `create` to provision or `cancel` to abort.",
                )
            }
        }
    }
}

fn reprompt(prompt: StepPrompt, notice: &str) -> Result<WizardReply, ForgeError> {
    Ok(WizardReply::Prompt(prompt.with_notice(notice)))
}

fn parse_choice(input: &str, allowed: &[u32]) -> Option<u32> {
    input
        .parse::<u32>()
        .ok()
        .filter(|v| allowed.contains(v))
}

async fn online_nodes<H: Hypervisor>(hv: &H) -> Result<Vec<String>, ForgeError> {
    let nodes: Vec<String> = hv
        .list_nodes()
        .await?
        .into_iter()
        .filter(|n| n.is_online())
        .map(|n| n.node)
        .collect();
    if nodes.is_empty() {
        return Err(ForgeError::NotFound("online cluster nodes".to_string()));
    }
    Ok(nodes)
}

async fn node_prompt<H: Hypervisor>(hv: &H) -> Result<StepPrompt, ForgeError> {
    let options = online_nodes(hv)
        .await?
        .into_iter()
        .map(|n| PromptOption::new(n.clone(), n))
        .collect();
    Ok(StepPrompt::menu(
        WizardStep::NodeSelect,
        "Select a node",
        options,
    ))
}

async fn template_prompt<H: Hypervisor>(hv: &H, node: &str) -> Result<StepPrompt, ForgeError> {
    let templates = hv.list_templates(node).await?;
    if templates.is_empty() {
        return Err(ForgeError::NotFound(format!("templates on node {}", node)));
    }
    let options = templates
        .into_iter()
        .map(|t| PromptOption::new(t.vmid.to_string(), format!("{} ({})", t.name, t.vmid)))
        .collect();
    Ok(StepPrompt::menu(
        WizardStep::TemplateSelect,
        "Select a template",
        options,
    ))
}

fn ram_prompt() -> StepPrompt {
    let options = RAM_OPTIONS_MB
        .iter()
        .map(|mb| PromptOption::new(mb.to_string(), format!("{} GB", mb / 1024)))
        .collect();
    StepPrompt::menu(WizardStep::RamSelect, "Select RAM", options)
}

fn cores_prompt() -> StepPrompt {
    let options = CORE_OPTIONS
        .iter()
        .map(|c| {
            let label = if *c == 1 { "1 core".to_string() } else { format!("{} cores", c) };
            PromptOption::new(c.to_string(), label)
        })
        .collect();
    StepPrompt::menu(WizardStep::CoresSelect, "Select CPU cores", options)
}

async fn storage_prompt<H: Hypervisor>(hv: &H, node: &str) -> Result<StepPrompt, ForgeError> {
    let storages = hv.image_storages(node).await?;
    if storages.is_empty() {
        return Err(ForgeError::NotFound(format!(
            "image-capable storage on node {}",
            node
        )));
    }
    let options = storages
        .into_iter()
        .map(|s| {
            let label = format!("{} ({} free)", s.storage, bytes_to_gib(s.avail_bytes));
            PromptOption::new(s.storage, label)
        })
        .collect();
    Ok(StepPrompt::menu(
        WizardStep::StorageSelect,
        "Select target storage",
        options,
    ))
}

fn disk_prompt() -> StepPrompt {
    let mut options: Vec<PromptOption> = DISK_OPTIONS_GB
        .iter()
        .map(|gb| PromptOption::new(gb.to_string(), format!("{} GB", gb)))
        .collect();
    options.push(PromptOption::new(DISK_CUSTOM_VALUE, "Custom size"));
    StepPrompt::menu(WizardStep::DiskSelect, "Select disk size", options)
}

fn disk_custom_prompt() -> StepPrompt {
    let mut options: Vec<PromptOption> = CUSTOM_DISK_OPTIONS_GB
        .iter()
        .map(|gb| PromptOption::new(gb.to_string(), format!("{} GB", gb)))
        .collect();
    options.push(PromptOption::new(DISK_BACK_VALUE, "Back"));
    StepPrompt::menu(WizardStep::DiskCustom, "Select custom disk size", options)
}

fn name_prompt() -> StepPrompt {
    StepPrompt::text(
        WizardStep::NameInput,
        "Enter a VM name and a login username",
    )
}

fn confirm_prompt(request: &VmRequest) -> StepPrompt {
    let summary = format!(
        "node: {}\ntemplate: {} ({})\nram: {} MB\ncores: {}\nstorage: {}\ndisk: {} GB\nname: {}\nuser: {}\nvmid: {}",
        request.node,
        request.template_name,
        request.template_vmid,
        request.ram_mb,
        request.cores,
        request.storage,
        request.disk_gb,
        request.name,
        request.username,
        request.vmid.unwrap_or(0),
    );
    let mut prompt = StepPrompt::menu(
        WizardStep::Confirm,
        "Create this VM?",
        vec![
            PromptOption::new(CONFIRM_VALUE, "Create the VM"),
            PromptOption::new(CANCEL_VALUE, "Cancel"),
        ],
    );
    prompt.summary = Some(summary);
    prompt
}
