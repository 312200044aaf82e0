//! Instance and snapshot subcommands: resolve, act, render.
//!
//! Table rendering sizes itself to the terminal; everything else is a
//! thin pass through the service layer.

use chrono::{Local, TimeZone};
use comfy_table::{modifiers, presets, ContentArrangement, Table};
use terminal_size::{terminal_size, Width};

use crate::api::ProxmoxClient;
use crate::error::ForgeError;
use crate::services::{instance, snapshot};
use crate::util::{bytes_to_gib, format_uptime};

pub(crate) fn new_table() -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL);
    table.apply_modifier(modifiers::UTF8_ROUND_CORNERS);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    if let Some((Width(w), _)) = terminal_size() {
        table.set_width(w - 4);
    }
    table
}

pub async fn list(api: &ProxmoxClient, node: Option<&str>) -> Result<(), ForgeError> {
    let rows = instance::list_instances(api, node).await?;
    if rows.is_empty() {
        println!("(empty list)");
        return Ok(());
    }

    let mut table = new_table();
    table.set_header(vec!["VMID", "Name", "Node", "Status", "Template"]);
    for row in &rows {
        table.add_row(vec![
            row.vm.vmid.to_string(),
            row.vm.name.clone(),
            row.node.clone(),
            row.vm.status.clone(),
            if row.vm.template { "yes".into() } else { String::new() },
        ]);
    }
    println!("\n{table}\n");
    Ok(())
}

pub async fn status(api: &ProxmoxClient, vmid: u32) -> Result<(), ForgeError> {
    let (node, vm, status) = instance::instance_status(api, vmid).await?;

    let mut table = new_table();
    table.set_header(vec!["Field", "Value"]);
    table.add_row(vec!["VMID".to_string(), vm.vmid.to_string()]);
    table.add_row(vec!["Name".to_string(), vm.name.clone()]);
    table.add_row(vec!["Node".to_string(), node]);
    table.add_row(vec!["Status".to_string(), status.status.clone()]);
    if status.is_running() {
        table.add_row(vec!["Uptime".to_string(), format_uptime(status.uptime)]);
        table.add_row(vec!["CPU".to_string(), format!("{:.1}%", status.cpu * 100.0)]);
        table.add_row(vec![
            "Memory".to_string(),
            format!(
                "{} / {}",
                bytes_to_gib(status.mem_bytes),
                bytes_to_gib(status.maxmem_bytes)
            ),
        ]);
    }
    println!("\n{table}\n");
    Ok(())
}

pub async fn start(api: &ProxmoxClient, vmid: u32) -> Result<(), ForgeError> {
    let node = instance::start_instance(api, vmid).await?;
    println!(
        "{} {} {}",
        yansi::Paint::new("VM").green(),
        vmid,
        yansi::Paint::new(format!("starting on {}", node)).green()
    );
    Ok(())
}

pub async fn stop(api: &ProxmoxClient, vmid: u32) -> Result<(), ForgeError> {
    let node = instance::stop_instance(api, vmid).await?;
    println!(
        "{} {} {}",
        yansi::Paint::new("VM").green(),
        vmid,
        yansi::Paint::new(format!("stopping on {}", node)).green()
    );
    Ok(())
}

pub async fn delete(api: &ProxmoxClient, vmid: u32) -> Result<(), ForgeError> {
    let node = instance::delete_instance(api, vmid).await?;
    println!(
        "{} {} {}",
        yansi::Paint::new("VM").green(),
        vmid,
        yansi::Paint::new(format!("deleted from {}", node)).green()
    );
    Ok(())
}

pub async fn modify(
    api: &ProxmoxClient,
    vmid: u32,
    cores: u32,
    memory_mb: u32,
) -> Result<(), ForgeError> {
    let node = instance::modify_instance(api, vmid, cores, memory_mb).await?;
    println!(
        "{} {} {}",
        yansi::Paint::new("VM").green(),
        vmid,
        yansi::Paint::new(format!("set to {} cores / {} MB on {}", cores, memory_mb, node)).green()
    );
    Ok(())
}

pub async fn resize(api: &ProxmoxClient, vmid: u32, size: &str) -> Result<(), ForgeError> {
    let (node, growth) = instance::resize_instance(api, vmid, size).await?;
    println!(
        "{} {} {}",
        yansi::Paint::new("Disk of VM").green(),
        vmid,
        yansi::Paint::new(format!("grown by {} on {}", growth, node)).green()
    );
    Ok(())
}

pub async fn snapshots_list(api: &ProxmoxClient, vmid: u32) -> Result<(), ForgeError> {
    let (_node, snapshots) = snapshot::list(api, vmid).await?;
    if snapshots.is_empty() {
        println!("(empty list)");
        return Ok(());
    }

    let mut table = new_table();
    table.set_header(vec!["Name", "Created", "RAM", "Description"]);
    for snap in &snapshots {
        table.add_row(vec![
            snap.name.clone(),
            snap.snaptime.map(format_snaptime).unwrap_or_default(),
            if snap.vmstate == Some(1) { "yes".into() } else { String::new() },
            snap.description.clone().unwrap_or_default(),
        ]);
    }
    println!("\n{table}\n");
    Ok(())
}

pub async fn snapshots_create(
    api: &ProxmoxClient,
    vmid: u32,
    name: Option<&str>,
    description: Option<&str>,
) -> Result<(), ForgeError> {
    let (node, name) = snapshot::create(api, vmid, name, description).await?;
    println!(
        "{} '{}' {}",
        yansi::Paint::new("Snapshot").green(),
        name,
        yansi::Paint::new(format!("created for VM {} on {}", vmid, node)).green()
    );
    Ok(())
}

pub async fn snapshots_delete(api: &ProxmoxClient, vmid: u32, name: &str) -> Result<(), ForgeError> {
    snapshot::delete(api, vmid, name).await?;
    println!(
        "{} '{}' {}",
        yansi::Paint::new("Snapshot").green(),
        name,
        yansi::Paint::new(format!("deleted from VM {}", vmid)).green()
    );
    Ok(())
}

pub async fn snapshots_rollback(
    api: &ProxmoxClient,
    vmid: u32,
    name: &str,
) -> Result<(), ForgeError> {
    snapshot::rollback(api, vmid, name).await?;
    println!(
        "{} {} {} '{}'",
        yansi::Paint::new("VM").green(),
        vmid,
        yansi::Paint::new("rolled back to").green(),
        name
    );
    Ok(())
}

fn format_snaptime(epoch: i64) -> String {
    match Local.timestamp_opt(epoch, 0) {
        chrono::LocalResult::Single(t) => t.format("%Y-%m-%d %H:%M:%S").to_string(),
        _ => epoch.to_string(),
    }
}
