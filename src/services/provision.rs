//! The post-confirm provisioning pipeline. Steps run strictly in order;
//! clone and start failures abort, everything else degrades into
//! warnings on the final outcome. The wizard session is removed on
//! every exit path so the user can always start over.

use std::time::Duration;

use tokio::time::sleep;

use crate::cloudinit;
use crate::config;
use crate::error::ForgeError;
use crate::hypervisor::Hypervisor;
use crate::models::{ProvisioningOutcome, VmRequest, WizardSession};
use crate::sessions::SessionStore;
use crate::ssh::AccessProbe;

use super::discovery::{self, UNKNOWN_IP};

/// Disk the templates boot from; resize targets it.
pub const PRIMARY_DISK: &str = "scsi0";

/// Templates ship with a 2 GiB disk; smaller or equal requests skip the
/// resize call.
pub const TEMPLATE_BASE_DISK_GB: u32 = 2;

const CONFIG_SETTLE: Duration = Duration::from_secs(5);
const STOP_SETTLE: Duration = Duration::from_secs(5);
const RECOVERY_SETTLE: Duration = Duration::from_secs(3);
const BOOT_SETTLE: Duration = Duration::from_secs(15);
const PRE_PROBE_DELAY: Duration = Duration::from_secs(10);

/// Run the pipeline for the user's confirmed wizard. The session is
/// removed whether the pipeline succeeds or aborts.
pub async fn commit<H: Hypervisor, P: AccessProbe>(
    hv: &H,
    probe: &P,
    wizards: &SessionStore<WizardSession>,
    user_id: &str,
) -> Result<ProvisioningOutcome, ForgeError> {
    let session = wizards
        .get(user_id)
        .ok_or_else(|| ForgeError::NotFound(format!("wizard session for {}", user_id)))?;
    let result = run_pipeline(hv, probe, &session).await;
    wizards.remove(user_id);
    result
}

async fn run_pipeline<H: Hypervisor, P: AccessProbe>(
    hv: &H,
    probe: &P,
    session: &WizardSession,
) -> Result<ProvisioningOutcome, ForgeError> {
    let request = &session.request;
    let vmid = request
        .vmid
        .ok_or_else(|| ForgeError::Validation("wizard was not confirmed: no vmid".to_string()))?;
    let password = request
        .password
        .clone()
        .ok_or_else(|| ForgeError::Validation("wizard was not confirmed: no password".to_string()))?;

    let mut warnings: Vec<String> = Vec::new();

    tracing::info!(vmid, name = %request.name, node = %request.node, "provisioning started");

    hv.clone_vm(
        &request.node,
        request.template_vmid,
        vmid,
        &request.name,
        &request.storage,
    )
    .await
    .map_err(|e| ForgeError::FatalPipeline {
        step: "clone",
        vmid,
        reason: e.to_string(),
    })?;

    apply_cloud_init(hv, request, vmid, &password, &mut warnings).await;

    if request.disk_gb > TEMPLATE_BASE_DISK_GB {
        let size = format!("{}G", request.disk_gb);
        if let Err(e) = hv.resize_disk(&request.node, vmid, PRIMARY_DISK, &size).await {
            tracing::warn!(vmid, error = %e, "disk resize failed");
            warnings.push(format!("disk resize to {} failed: {}", size, e));
        }
    }

    hv.start_vm(&request.node, vmid)
        .await
        .map_err(|e| ForgeError::FatalPipeline {
            step: "start",
            vmid,
            reason: e.to_string(),
        })?;

    // Give first boot a chance to run cloud-init before polling.
    sleep(BOOT_SETTLE).await;

    let ip = discovery::discover_ip(hv, &request.node, vmid).await;

    let mut ssh_verified = false;
    let mut ssh_attempts = 0;
    if ip == UNKNOWN_IP {
        warnings.push("IP address was not discovered; SSH verification skipped".to_string());
    } else {
        sleep(PRE_PROBE_DELAY).await;
        let report = probe
            .verify(&ip, config::get_ssh_port(), &request.username, &password)
            .await;
        ssh_attempts = report.attempts;
        if report.verified() {
            ssh_verified = true;
        } else if report.reachable {
            warnings.push(format!(
                "SSH login works but the elevation probe failed after {} attempts",
                report.attempts
            ));
        } else {
            warnings.push(format!(
                "SSH verification failed after {} attempts",
                report.attempts
            ));
        }
    }

    tracing::info!(vmid, %ip, ssh_verified, warnings = warnings.len(), "provisioning finished");

    Ok(ProvisioningOutcome {
        vmid,
        node: request.node.clone(),
        name: request.name.clone(),
        username: request.username.clone(),
        password,
        ip,
        ssh_verified,
        ssh_attempts,
        warnings,
    })
}

/// Upload user-data, write the init fields, verify by readback, and run
/// at most one stop/reapply recovery. Never aborts the pipeline.
async fn apply_cloud_init<H: Hypervisor>(
    hv: &H,
    request: &VmRequest,
    vmid: u32,
    password: &str,
    warnings: &mut Vec<String>,
) {
    let user_data = cloudinit::build_user_data(&request.username, password);
    let volid = match hv.upload_user_data(&request.node, vmid, &user_data).await {
        Ok(Some(volid)) => Some(volid),
        Ok(None) => {
            warnings.push(
                "cloud-init snippet upload failed; credentials were applied inline only"
                    .to_string(),
            );
            None
        }
        Err(e) => {
            warnings.push(format!("cloud-init snippet upload failed: {}", e));
            None
        }
    };

    if let Err(e) = write_init_config(hv, request, vmid, password, volid.as_deref()).await {
        warnings.push(format!("cloud-init configuration write failed: {}", e));
        return;
    }
    sleep(CONFIG_SETTLE).await;

    if verify_init_config(hv, request, vmid).await.is_ok() {
        return;
    }
    tracing::warn!(vmid, "cloud-init readback mismatch, running recovery");
    recover_cloud_init(hv, request, vmid, password, volid.as_deref()).await;
    sleep(RECOVERY_SETTLE).await;

    if let Err(e) = verify_init_config(hv, request, vmid).await {
        warnings.push(e.to_string());
    }
}

async fn write_init_config<H: Hypervisor>(
    hv: &H,
    request: &VmRequest,
    vmid: u32,
    password: &str,
    volid: Option<&str>,
) -> Result<(), ForgeError> {
    let mut options: Vec<(&str, String)> = vec![
        ("ciuser", request.username.clone()),
        ("cipassword", password.to_string()),
    ];
    if let Some(volid) = volid {
        options.push(("cicustom", format!("user={}", volid)));
    }
    hv.set_vm_config(&request.node, vmid, &options).await
}

/// Readback check: the init user must match and a password must be set.
/// Proxmox masks `cipassword` on read, so only presence is checkable.
async fn verify_init_config<H: Hypervisor>(
    hv: &H,
    request: &VmRequest,
    vmid: u32,
) -> Result<(), ForgeError> {
    let view = hv.vm_config(&request.node, vmid).await?;
    let user_ok = view.ciuser.as_deref() == Some(request.username.as_str());
    let password_ok = view.cipassword.as_deref().is_some_and(|p| !p.is_empty());
    if user_ok && password_ok {
        Ok(())
    } else {
        Err(ForgeError::ConfigVerification { vmid })
    }
}

/// One-shot recovery: stop a running VM, wait, reapply the init fields.
/// A locked VM gets a single unlock attempt before the retry.
async fn recover_cloud_init<H: Hypervisor>(
    hv: &H,
    request: &VmRequest,
    vmid: u32,
    password: &str,
    volid: Option<&str>,
) {
    match hv.vm_status(&request.node, vmid).await {
        Ok(status) if status.is_running() => {
            if let Err(e) = hv.stop_vm(&request.node, vmid).await {
                tracing::warn!(vmid, error = %e, "stop before cloud-init reapply failed");
            }
            sleep(STOP_SETTLE).await;
        }
        Ok(_) => {}
        Err(e) => {
            tracing::warn!(vmid, error = %e, "status check before cloud-init reapply failed");
        }
    }

    if let Err(e) = write_init_config(hv, request, vmid, password, volid).await {
        if e.to_string().to_lowercase().contains("lock") {
            tracing::warn!(vmid, "VM is locked, attempting unlock before reapply");
            if let Err(unlock_err) = hv.unlock_vm(&request.node, vmid).await {
                tracing::warn!(vmid, error = %unlock_err, "unlock failed");
            }
            if let Err(retry_err) = write_init_config(hv, request, vmid, password, volid).await {
                tracing::warn!(vmid, error = %retry_err, "cloud-init reapply failed after unlock");
            }
        } else {
            tracing::warn!(vmid, error = %e, "cloud-init reapply failed");
        }
    }
}
