use std::fmt::Write;

/// Build the `#cloud-config` user-data applied to a freshly cloned VM.
///
/// The document creates the requested user with passwordless sudo, sets
/// the same password for that user and for root, enables SSH password
/// login, and grows the root filesystem on first boot.
pub fn build_user_data(username: &str, password: &str) -> String {
    let mut doc = String::from("#cloud-config\n");
    writeln!(doc, "users:").ok();
    writeln!(doc, "  - name: {}", username).ok();
    writeln!(doc, "    sudo: ALL=(ALL) NOPASSWD:ALL").ok();
    writeln!(doc, "    groups: [sudo, adm]").ok();
    writeln!(doc, "    shell: /bin/bash").ok();
    writeln!(doc, "    lock_passwd: false").ok();
    writeln!(doc, "ssh_pwauth: true").ok();
    writeln!(doc, "disable_root: false").ok();
    writeln!(doc, "chpasswd:").ok();
    writeln!(doc, "  list: |").ok();
    writeln!(doc, "    {}:{}", username, password).ok();
    writeln!(doc, "    root:{}", password).ok();
    writeln!(doc, "  expire: false").ok();
    writeln!(doc, "packages:").ok();
    writeln!(doc, "  - cloud-guest-utils").ok();
    writeln!(doc, "growpart:").ok();
    writeln!(doc, "  mode: auto").ok();
    writeln!(doc, "  devices: ['/']").ok();
    writeln!(doc, "  ignore_growroot_disabled: false").ok();
    writeln!(doc, "resize_rootfs: true").ok();
    doc
}

/// Filename of the uploaded snippet for a VM.
pub fn snippet_filename(vmid: u32) -> String {
    format!("user-data-{}.yml", vmid)
}
