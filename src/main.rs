use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use vmforge::api::{self, ProxmoxClient};
use vmforge::config;
use vmforge::error::ForgeError;
use vmforge::models::AppState;
use vmforge::{create, instances, shell};

#[derive(Parser)]
#[command(
    name = "vmforge",
    author,
    version,
    about = "Proxmox VM provisioning from the terminal",
    long_about = r#"vmforge — clone, configure and manage Proxmox VMs from your terminal.

The `create` wizard walks through node, template, sizing and naming, then
clones the template, injects credentials via cloud-init, waits for an IP
and verifies SSH access. The `instances` and `snapshots` commands cover
day-two housekeeping, and `shell` gives a remote console over SSH.

Examples:
  1) Provision a VM interactively:
      vmforge create
  2) Fleet overview:
      vmforge instances list
  3) Remote console:
      vmforge shell 203.0.113.17 --user debian
"#,
    after_help = "Use `vmforge <subcommand> --help` to get subcommand specific options and usage examples."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Disable colorized output
    #[arg(long, global = true)]
    no_color: bool,
    /// Disable request/response logging
    #[arg(long, global = true)]
    silent: bool,
    /// Path to .env file
    #[arg(long, global = true)]
    env_file: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate configuration (env vars / API credentials)
    #[command(about = "Validate configuration and ensure API connectivity.", long_about = "Validate the environment variables required to reach the Proxmox API, then attempt to list cluster nodes with the configured token.")]
    CheckConfig,
    /// Provision a new VM through the interactive wizard
    #[command(about = "Provision a new VM through the interactive wizard", long_about = "Walk through node, template, RAM, cores, storage, disk and naming, then clone the template, inject credentials via cloud-init, start the VM, discover its IP and verify SSH access. Credentials are printed once at the end.")]
    Create,
    /// Open an interactive SSH console to a host
    #[command(about = "Open an interactive SSH console", long_about = "Line-oriented remote console. Every command opens a fresh SSH connection; `sudo -i` switches the session to root for subsequent commands. Local commands: !close, !history, !status, !ps, !disk, !net. Append `#timeout=<seconds>` to a command to override its execution budget.")]
    Shell {
        /// Host name or IP address to connect to
        host: String,
        /// Login username (prompted when omitted)
        #[arg(long)]
        user: Option<String>,
        /// SSH port
        #[arg(long, default_value_t = config::DEFAULT_SSH_PORT)]
        port: u16,
        /// Command to run before the prompt opens
        #[arg(long)]
        cmd: Option<String>,
    },
    /// Manage VMs across the cluster
    #[command(about = "Manage VMs across the cluster (list, status, power, resize, delete)")]
    Instances {
        #[command(subcommand)]
        sub: InstanceCommands,
    },
    /// Manage VM snapshots
    #[command(about = "Manage VM snapshots (list, create, delete, rollback)")]
    Snapshots {
        #[command(subcommand)]
        sub: SnapshotCommands,
    },
}

#[derive(Subcommand)]
enum InstanceCommands {
    /// List VMs (optionally on one node)
    #[command(about = "List VMs", long_about = "List VMs across all online nodes, or on one node with `--node`. Templates are marked in their own column.")]
    List {
        /// Only list VMs on this node
        #[arg(long)]
        node: Option<String>,
    },
    /// Show the current status of a VM
    #[command(about = "Show VM status", long_about = "Resolve the VM to its node and show power state, uptime, CPU and memory usage.")]
    Status { vmid: u32 },
    /// Start a VM
    Start { vmid: u32 },
    /// Stop a VM
    Stop { vmid: u32 },
    /// Delete a VM and its disks
    #[command(about = "Delete a VM and its disks", long_about = "Stop the VM if it is running, release any held lock, then delete it together with its disks. Asks for the VMID to be re-typed unless `--force` is given.")]
    Delete {
        vmid: u32,
        /// Skip the confirmation prompt
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Grow the primary disk (e.g. `+10G` or an absolute `40G`)
    #[command(about = "Grow the primary disk", long_about = "Grow the scsi0 disk. `+<n><unit>` grows by that amount; an absolute `<n><unit>` above the current size is converted to the equivalent growth. Shrinking is not supported.")]
    Resize { vmid: u32, size: String },
    /// Change the CPU core and memory allocation of a VM
    Modify {
        vmid: u32,
        /// New CPU core count
        #[arg(long)]
        cores: u32,
        /// New memory size in MB
        #[arg(long)]
        memory: u32,
    },
}

#[derive(Subcommand)]
enum SnapshotCommands {
    /// List snapshots of a VM
    List { vmid: u32 },
    /// Create a snapshot (name defaults to a timestamp)
    Create {
        vmid: u32,
        /// Snapshot name; defaults to snap-<YYYYMMDD-HHMMSS>
        #[arg(long)]
        name: Option<String>,
        /// Free-form description
        #[arg(long)]
        description: Option<String>,
    },
    /// Delete a snapshot
    Delete { vmid: u32, name: String },
    /// Roll a VM back to a snapshot
    #[command(about = "Roll a VM back to a snapshot", long_about = "Verify the snapshot exists, then roll the VM back to it. Disk state after the snapshot is lost.")]
    Rollback { vmid: u32, name: String },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    // CLI parsing
    let cli = Cli::parse();

    if cli.no_color {
        yansi::whenever(yansi::Condition::NEVER);
    }

    if cli.silent {
        api::set_silent(true);
    }

    config::load_env_file(cli.env_file.as_deref());

    let api = match ProxmoxClient::from_env() {
        Ok(api) => api,
        Err(e) => bail(e),
    };
    let state = AppState::new(api);
    let operator = operator_id();

    match cli.command {
        Commands::CheckConfig => {
            let mut ok = true;
            if config::get_token_id().trim().is_empty() {
                eprintln!("{}", yansi::Paint::new("PROXMOX_TOKEN_ID is not configured").red());
                ok = false;
            }
            if config::get_token_secret().trim().is_empty() {
                eprintln!("{}", yansi::Paint::new("PROXMOX_TOKEN_SECRET is not configured").red());
                ok = false;
            }
            if !ok {
                process::exit(1);
            }
            match state.api.list_nodes().await {
                Ok(nodes) => {
                    println!(
                        "{}",
                        yansi::Paint::new(format!(
                            "Configuration looks valid ({} node(s) returned)",
                            nodes.len()
                        ))
                        .green()
                    );
                }
                Err(e) => {
                    eprintln!(
                        "{}: {}",
                        yansi::Paint::new("Configuration appears invalid").red(),
                        e
                    );
                    process::exit(1);
                }
            }
        }
        Commands::Create => {
            if let Err(e) = create::run(&state, &operator).await {
                bail(e);
            }
        }
        Commands::Shell { host, user, port, cmd } => {
            if let Err(e) = shell::run(
                &state,
                &operator,
                &host,
                user.as_deref(),
                port,
                cmd.as_deref(),
            )
            .await
            {
                bail(e);
            }
        }
        Commands::Instances { sub } => {
            let result = match sub {
                InstanceCommands::List { node } => instances::list(&state.api, node.as_deref()).await,
                InstanceCommands::Status { vmid } => instances::status(&state.api, vmid).await,
                InstanceCommands::Start { vmid } => instances::start(&state.api, vmid).await,
                InstanceCommands::Stop { vmid } => instances::stop(&state.api, vmid).await,
                InstanceCommands::Delete { vmid, force } => {
                    if !force && !confirm_delete(vmid) {
                        println!(
                            "{}",
                            yansi::Paint::new("Invalid confirmation. Deletion cancelled.").yellow()
                        );
                        return;
                    }
                    instances::delete(&state.api, vmid).await
                }
                InstanceCommands::Resize { vmid, size } => {
                    instances::resize(&state.api, vmid, &size).await
                }
                InstanceCommands::Modify { vmid, cores, memory } => {
                    instances::modify(&state.api, vmid, cores, memory).await
                }
            };
            if let Err(e) = result {
                bail(e);
            }
        }
        Commands::Snapshots { sub } => {
            let result = match sub {
                SnapshotCommands::List { vmid } => instances::snapshots_list(&state.api, vmid).await,
                SnapshotCommands::Create { vmid, name, description } => {
                    instances::snapshots_create(
                        &state.api,
                        vmid,
                        name.as_deref(),
                        description.as_deref(),
                    )
                    .await
                }
                SnapshotCommands::Delete { vmid, name } => {
                    instances::snapshots_delete(&state.api, vmid, &name).await
                }
                SnapshotCommands::Rollback { vmid, name } => {
                    instances::snapshots_rollback(&state.api, vmid, &name).await
                }
            };
            if let Err(e) = result {
                bail(e);
            }
        }
    }
}

/// Session-store key for this invocation. One operator per terminal.
fn operator_id() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "operator".to_string())
}

/// Deletion guard: the VMID has to be re-typed to proceed.
fn confirm_delete(vmid: u32) -> bool {
    use std::io::Write;
    print!("Type the VMID to confirm deletion of VM {}: ", vmid);
    let _ = std::io::stdout().flush();
    let mut entered = String::new();
    if std::io::stdin().read_line(&mut entered).is_err() {
        return false;
    }
    entered.trim() == vmid.to_string()
}

fn bail(e: ForgeError) -> ! {
    eprintln!("{}: {}", yansi::Paint::new("Error").red(), e);
    process::exit(1);
}
