//! The `shell` subcommand: a line-oriented remote console. Every
//! submission opens a fresh SSH connection; the session only carries
//! credentials, the elevation flag and history between commands.

use std::io::Write;

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::error::ForgeError;
use crate::models::{AppState, RemoteSession};
use crate::ssh;
use crate::util::mask_secret;

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^[a-z_][a-z0-9_.-]*$").unwrap());

const MAX_USERNAME_LEN: usize = 32;
const MAX_PASSWORD_LEN: usize = 128;

const STATUS_ALIAS: &str = "sudo systemctl status --no-pager | head -20 && echo \"\n=== UPTIME ===\" && uptime && echo \"\n=== MEMORY ===\" && free -h";
const PROCESSES_ALIAS: &str = "sudo ps aux --sort=-%cpu | head -10";
const DISK_ALIAS: &str = "df -h && echo \"\n=== INODES ===\" && df -i";
const NETWORK_ALIAS: &str = "sudo ss -tuln | head -15 && echo \"\n=== IP CONFIG ===\" && ip addr show | grep -E \"inet|UP\"";

const LOCAL_HELP: &str = "Local commands: !close !history !status !ps !disk !net";

pub async fn run(
    state: &AppState,
    user_id: &str,
    host: &str,
    username: Option<&str>,
    port: u16,
    initial_command: Option<&str>,
) -> Result<(), ForgeError> {
    if port == 0 {
        return Err(ForgeError::Validation("Invalid port".to_string()));
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let username = match username {
        Some(u) => u.to_string(),
        None => read_line(&mut lines, "Username: ")
            .await
            .unwrap_or_default(),
    };
    if username.len() > MAX_USERNAME_LEN || !USERNAME_RE.is_match(&username) {
        return Err(ForgeError::Validation("Invalid username".to_string()));
    }

    let password = read_line(&mut lines, "Password: ").await.unwrap_or_default();
    if password.is_empty() || password.len() > MAX_PASSWORD_LEN {
        return Err(ForgeError::Validation("Invalid password".to_string()));
    }

    // A new shell supersedes any previous one for this user.
    let mut session = RemoteSession::new(host, port, &username, &password);
    state.shells.replace(user_id, session.clone());

    println!(
        "{}",
        yansi::Paint::new(format!(
            "Shell session opened for {}@{}:{}",
            username, host, port
        ))
        .green()
    );
    println!("{}", yansi::Paint::new(LOCAL_HELP).dim());

    if let Some(cmd) = initial_command {
        if !cmd.trim().is_empty() {
            run_remote(state, user_id, &mut session, cmd).await;
        }
    }

    loop {
        let symbol = if session.elevated { "#" } else { "$" };
        let prompt = format!("{}@{}:~{} ", session.username, session.host, symbol);
        let Some(input) = read_line(&mut lines, &prompt).await else {
            break;
        };
        let input = input.trim().to_string();
        if input.is_empty() {
            continue;
        }

        if let Some(local) = input.strip_prefix('!') {
            match local {
                "close" => break,
                "history" => {
                    print_history(&session);
                    continue;
                }
                "status" => {
                    run_remote(state, user_id, &mut session, STATUS_ALIAS).await;
                    continue;
                }
                "ps" => {
                    run_remote(state, user_id, &mut session, PROCESSES_ALIAS).await;
                    continue;
                }
                "disk" => {
                    run_remote(state, user_id, &mut session, DISK_ALIAS).await;
                    continue;
                }
                "net" => {
                    run_remote(state, user_id, &mut session, NETWORK_ALIAS).await;
                    continue;
                }
                _ => {
                    println!(
                        "{} {}",
                        yansi::Paint::new("Unknown local command.").yellow(),
                        yansi::Paint::new(LOCAL_HELP).dim()
                    );
                    continue;
                }
            }
        }

        run_remote(state, user_id, &mut session, &input).await;
    }

    state.shells.remove(user_id);
    println!(
        "{}",
        yansi::Paint::new(format!(
            "Shell session to {}@{}:{} closed.",
            session.username, session.host, session.port
        ))
        .green()
    );
    Ok(())
}

/// Execute one submission and mirror the mutated session back into the
/// store. Failures are printed and leave the session usable.
async fn run_remote(state: &AppState, user_id: &str, session: &mut RemoteSession, input: &str) {
    match ssh::execute(session, input).await {
        Ok(output) => {
            println!("{}", output);
            state.shells.replace(user_id, session.clone());
        }
        Err(e) => {
            eprintln!("{}: {}", yansi::Paint::new("Command failed").red(), e);
        }
    }
}

fn print_history(session: &RemoteSession) {
    if session.history.is_empty() {
        println!("(empty history)");
        return;
    }
    let symbol = if session.elevated { "#" } else { "$" };
    for entry in &session.history {
        println!(
            "{} {}",
            yansi::Paint::new(format!(
                "{}@{}:~{}",
                session.username, session.host, symbol
            ))
            .cyan(),
            mask_secret(&entry.command, &session.password)
        );
        let output = entry.output.trim();
        if !output.is_empty() {
            println!("{}", mask_secret(output, &session.password));
        }
    }
}

async fn read_line(lines: &mut Lines<BufReader<Stdin>>, label: &str) -> Option<String> {
    print!("{}", label);
    let _ = std::io::stdout().flush();
    lines.next_line().await.ok().flatten()
}
