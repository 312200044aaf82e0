//! Remote command construction: elevation handling, timeout selection,
//! quoting, and output shaping. No I/O lives here so the whole surface
//! is unit-testable.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;

/// Inline override marker, e.g. `tail -f log #timeout=300`.
static TIMEOUT_MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)#\s*timeout\s*=\s*(\d{1,5})").unwrap());

static SUDO_PREFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\s*sudo\s+").unwrap());

/// Commands that routinely outlive the default budget: package managers,
/// upgrade verbs, compound chains, and log pagers.
static LONG_RUNNING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(apt|apt-get|yum|dnf|pacman|apk|zypper|snap|flatpak)\b|\b(update|upgrade|install|dist-upgrade|full-upgrade)\b|(&&|\|\|)|\b(systemctl\s+status)\b|\b(journalctl)\b",
    )
    .unwrap()
});

pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const LONG_RUNNING_TIMEOUT_SECS: u64 = 900;
pub const MIN_TIMEOUT_SECS: u64 = 5;
pub const MAX_TIMEOUT_SECS: u64 = 86_400;

/// Output larger than this is cut and annotated with [`TRUNCATION_HINT`].
pub const OUTPUT_LIMIT_CHARS: usize = 1500;

pub const TRUNCATION_HINT: &str =
    "\n[...output truncated, use filters like `| head -200` or add `#timeout=900` ...]";

pub const ELEVATION_NOTICE: &str =
    "You are now root. All subsequent commands will run as root.";

/// A fully shaped remote invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedCommand {
    /// Marker-stripped text, recorded in session history.
    pub recorded: String,
    /// What actually goes over the wire.
    pub wire: String,
    pub timeout: Duration,
}

/// `sudo -i` never reaches the remote host; it flips the session's
/// elevation flag locally.
pub fn is_elevation_request(input: &str) -> bool {
    input.trim().to_lowercase() == "sudo -i"
}

/// Split an inline `#timeout=N` marker out of the command text. The
/// value is clamped to `[MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS]`.
pub fn strip_timeout_marker(input: &str) -> (String, Option<u64>) {
    if let Some(caps) = TIMEOUT_MARKER_RE.captures(input) {
        let raw = caps.get(1).map(|m| m.as_str()).unwrap_or("0");
        let secs = raw
            .parse::<u64>()
            .unwrap_or(MIN_TIMEOUT_SECS)
            .clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS);
        let marker = caps.get(0).map(|m| m.as_str()).unwrap_or("");
        let stripped = input.replacen(marker, "", 1).trim().to_string();
        (stripped, Some(secs))
    } else {
        (input.trim().to_string(), None)
    }
}

fn is_long_running(command: &str) -> bool {
    LONG_RUNNING_RE.is_match(command)
}

/// Pick the execution budget: explicit marker wins, otherwise the
/// long-running classifier decides between 900 s and 60 s.
pub fn command_timeout(command: &str, override_secs: Option<u64>) -> Duration {
    let secs = override_secs.unwrap_or_else(|| {
        if is_long_running(command) {
            LONG_RUNNING_TIMEOUT_SECS
        } else {
            DEFAULT_TIMEOUT_SECS
        }
    });
    Duration::from_secs(secs)
}

fn escape_double_quotes(text: &str) -> String {
    text.replace('"', "\\\"")
}

/// Single-quote the sudo password for the shell, escaping embedded
/// single quotes as `'\''` so the secret never parses as shell syntax.
fn shell_quote_password(password: &str) -> String {
    password.replace('\'', "'\\''")
}

/// Wrap the user's text for remote execution. Everything runs through
/// `bash -lc` so pipes, globs, and `&&` chains work. An elevated session
/// gets a plain `sudo` wrapper; a `sudo `-prefixed command in a normal
/// session is rewritten to feed the session password via `sudo -S`.
pub fn build_wire_command(command: &str, elevated: bool, password: &str) -> String {
    let escaped = escape_double_quotes(command);
    if elevated {
        return format!("sudo bash -lc \"{}\"", escaped);
    }
    if SUDO_PREFIX_RE.is_match(command) {
        let rest = SUDO_PREFIX_RE.replacen(command, 1, "");
        let rest = escape_double_quotes(&rest);
        return format!(
            "bash -lc \"echo '{}' | sudo -S -p '' bash -lc \\\"{}\\\"\"",
            shell_quote_password(password),
            rest
        );
    }
    format!("bash -lc \"{}\"", escaped)
}

/// Prepare a non-elevation command end to end.
pub fn prepare(input: &str, elevated: bool, password: &str) -> PreparedCommand {
    let (stripped, override_secs) = strip_timeout_marker(input);
    let timeout = command_timeout(&stripped, override_secs);
    let wire = build_wire_command(&stripped, elevated, password);
    PreparedCommand {
        recorded: stripped,
        wire,
        timeout,
    }
}

/// Merge captured streams into the text shown to the user. The stderr
/// separator appears only when both streams produced output.
pub fn render_output(stdout: &str, stderr: &str, exit_code: Option<u32>) -> String {
    let mut result = String::new();
    if !stdout.is_empty() {
        result.push_str(stdout);
    }
    if !stderr.is_empty() {
        if !result.is_empty() {
            result.push_str("\n--- STDERR ---\n");
        }
        result.push_str(stderr);
    }
    if result.is_empty() {
        return match exit_code {
            Some(0) => "Command executed successfully (no output)".to_string(),
            Some(code) => format!("Command finished with error code {}", code),
            None => "Command finished without an exit status".to_string(),
        };
    }
    truncate_output(&result)
}

fn truncate_output(text: &str) -> String {
    if text.chars().count() <= OUTPUT_LIMIT_CHARS {
        return text.to_string();
    }
    let cut: String = text.chars().take(OUTPUT_LIMIT_CHARS).collect();
    format!("{}{}", cut, TRUNCATION_HINT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elevation_marker_is_case_and_space_insensitive() {
        assert!(is_elevation_request("sudo -i"));
        assert!(is_elevation_request("  SUDO -I  "));
        assert!(!is_elevation_request("sudo -iu admin"));
        assert!(!is_elevation_request("sudo ls"));
    }

    #[test]
    fn test_timeout_marker_stripped_and_clamped() {
        let (cmd, secs) = strip_timeout_marker("sleep 100 #timeout=300");
        assert_eq!(cmd, "sleep 100");
        assert_eq!(secs, Some(300));

        let (_, low) = strip_timeout_marker("x #timeout=1");
        assert_eq!(low, Some(MIN_TIMEOUT_SECS));

        let (_, high) = strip_timeout_marker("x #timeout=99999");
        assert_eq!(high, Some(MAX_TIMEOUT_SECS));

        let (cmd, none) = strip_timeout_marker("echo hi");
        assert_eq!(cmd, "echo hi");
        assert_eq!(none, None);
    }

    #[test]
    fn test_timeout_marker_tolerates_spacing() {
        let (cmd, secs) = strip_timeout_marker("ls # timeout = 42");
        assert_eq!(cmd, "ls");
        assert_eq!(secs, Some(42));
    }

    #[test]
    fn test_long_running_classifier() {
        assert_eq!(
            command_timeout("apt install nginx", None),
            Duration::from_secs(LONG_RUNNING_TIMEOUT_SECS)
        );
        assert_eq!(
            command_timeout("echo a && echo b", None),
            Duration::from_secs(LONG_RUNNING_TIMEOUT_SECS)
        );
        assert_eq!(
            command_timeout("journalctl -u nginx", None),
            Duration::from_secs(LONG_RUNNING_TIMEOUT_SECS)
        );
        assert_eq!(
            command_timeout("ls -la", None),
            Duration::from_secs(DEFAULT_TIMEOUT_SECS)
        );
    }

    #[test]
    fn test_marker_overrides_classifier() {
        let prepared = prepare("apt install nginx #timeout=30", false, "pw");
        assert_eq!(prepared.timeout, Duration::from_secs(30));
        assert_eq!(prepared.recorded, "apt install nginx");
    }

    #[test]
    fn test_plain_command_wrapping() {
        let prepared = prepare("echo \"hello\"", false, "pw");
        assert_eq!(prepared.wire, "bash -lc \"echo \\\"hello\\\"\"");
    }

    #[test]
    fn test_elevated_session_uses_sudo_wrapper() {
        let prepared = prepare("whoami", true, "pw");
        assert_eq!(prepared.wire, "sudo bash -lc \"whoami\"");
    }

    #[test]
    fn test_sudo_prefix_pipes_password() {
        let prepared = prepare("sudo systemctl restart nginx", false, "s3cret");
        assert_eq!(
            prepared.wire,
            "bash -lc \"echo 's3cret' | sudo -S -p '' bash -lc \\\"systemctl restart nginx\\\"\""
        );
    }

    #[test]
    fn test_password_single_quotes_are_escaped() {
        let prepared = prepare("sudo id", false, "pa'ss");
        assert!(prepared.wire.contains("pa'\\''ss"));
        assert!(!prepared.wire.contains("'pa'ss'"));
    }

    #[test]
    fn test_render_output_separator_rules() {
        assert_eq!(render_output("out", "", Some(0)), "out");
        assert_eq!(render_output("out", "err", Some(0)), "out\n--- STDERR ---\nerr");
        assert_eq!(render_output("", "err", Some(1)), "err");
    }

    #[test]
    fn test_render_output_canned_messages() {
        assert_eq!(
            render_output("", "", Some(0)),
            "Command executed successfully (no output)"
        );
        assert_eq!(
            render_output("", "", Some(2)),
            "Command finished with error code 2"
        );
    }

    #[test]
    fn test_render_output_truncates() {
        let long = "x".repeat(OUTPUT_LIMIT_CHARS + 100);
        let rendered = render_output(&long, "", Some(0));
        assert!(rendered.ends_with(TRUNCATION_HINT));
        assert_eq!(
            rendered.chars().count(),
            OUTPUT_LIMIT_CHARS + TRUNCATION_HINT.chars().count()
        );
    }
}
