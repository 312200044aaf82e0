//! The `create` subcommand: the provisioning wizard on stdin, then the
//! pipeline behind a spinner, then the outcome report.

use std::io::Write;
use std::time::Duration;

use indicatif::ProgressBar;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::error::ForgeError;
use crate::models::{AppState, ProvisioningOutcome, StepPrompt, WizardReply};
use crate::services;
use crate::ssh::SshProber;
use crate::wizard;

pub async fn run(state: &AppState, user_id: &str) -> Result<(), ForgeError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let mut prompt = wizard::start(&state.api, &state.wizards, user_id).await?;
    loop {
        render_prompt(&prompt);
        let Some(submission) = read_submission(&mut lines, prompt.free_text).await else {
            // stdin closed mid-wizard; drop the session instead of
            // leaving it to block the next `create`.
            wizard::cancel(&state.wizards, user_id);
            println!("{}", yansi::Paint::new("Provisioning cancelled.").yellow());
            return Ok(());
        };
        match wizard::advance(&state.api, &state.wizards, user_id, &submission).await? {
            WizardReply::Prompt(next) => prompt = next,
            WizardReply::Committed => break,
            WizardReply::Cancelled => {
                println!("{}", yansi::Paint::new("Provisioning cancelled.").yellow());
                return Ok(());
            }
        }
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_message("Provisioning, this can take a few minutes...");
    spinner.enable_steady_tick(Duration::from_millis(120));
    let outcome =
        services::provision::commit(&state.api, &SshProber, &state.wizards, user_id).await;
    spinner.finish_and_clear();

    report_outcome(&outcome?);
    Ok(())
}

fn render_prompt(prompt: &StepPrompt) {
    println!();
    if let Some(notice) = &prompt.notice {
        println!("{}", yansi::Paint::new(notice).yellow());
    }
    println!("{}", yansi::Paint::new(&prompt.title).bold());
    if let Some(summary) = &prompt.summary {
        for line in summary.lines() {
            println!("  {}", line);
        }
    }
    for option in &prompt.options {
        if option.value == option.label {
            println!("  {}", yansi::Paint::new(&option.value).cyan());
        } else {
            println!(
                "  {} - {}",
                yansi::Paint::new(&option.value).cyan(),
                option.label
            );
        }
    }
}

/// Read one submission. The name form spans two lines, joined with a
/// newline the way the wizard expects; menu steps read a single line.
/// `None` means stdin was closed.
async fn read_submission(
    lines: &mut Lines<BufReader<Stdin>>,
    free_text: bool,
) -> Option<String> {
    if free_text {
        let name = read_line(lines, "VM name: ").await?;
        let user = read_line(lines, "Username: ").await?;
        Some(format!("{}\n{}", name, user))
    } else {
        read_line(lines, "> ").await
    }
}

async fn read_line(lines: &mut Lines<BufReader<Stdin>>, label: &str) -> Option<String> {
    print!("{}", label);
    let _ = std::io::stdout().flush();
    lines.next_line().await.ok().flatten()
}

fn report_outcome(outcome: &ProvisioningOutcome) {
    println!("\n{}", yansi::Paint::new("VM created").green().bold());

    let mut table = crate::instances::new_table();
    table.set_header(vec!["Field", "Value"]);
    table.add_row(vec!["Name".to_string(), outcome.name.clone()]);
    table.add_row(vec!["VMID".to_string(), outcome.vmid.to_string()]);
    table.add_row(vec!["Node".to_string(), outcome.node.clone()]);
    table.add_row(vec!["IP address".to_string(), outcome.ip.clone()]);
    table.add_row(vec!["Username".to_string(), outcome.username.clone()]);
    table.add_row(vec!["Password".to_string(), outcome.password.clone()]);
    println!("\n{table}");

    if outcome.ssh_verified {
        println!(
            "{}",
            yansi::Paint::new(format!(
                "SSH access verified after {} attempt(s).",
                outcome.ssh_attempts
            ))
            .green()
        );
    } else if outcome.ip == services::UNKNOWN_IP {
        println!(
            "{}",
            yansi::Paint::new(
                "No IP address was discovered; use the hypervisor console to log in."
            )
            .yellow()
        );
    } else {
        println!(
            "{}",
            yansi::Paint::new("SSH access could not be verified; try again in a minute.")
                .yellow()
        );
    }
    for warning in &outcome.warnings {
        println!("{} {}", yansi::Paint::new("warning:").yellow(), warning);
    }
    println!(
        "\n{}",
        yansi::Paint::new("Save the password now; it is not stored anywhere.").dim()
    );
}
