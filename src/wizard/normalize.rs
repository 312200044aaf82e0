//! Input cleanup for the name form.
//!
//! VM names must satisfy Proxmox DNS-name rules; usernames must be safe
//! to hand to cloud-init and `chpasswd`. Both normalizers always produce
//! a usable value instead of rejecting.

use std::time::{SystemTime, UNIX_EPOCH};

/// Normalize a requested VM name into `[a-z0-9-]`, starting with a
/// letter, at least 3 characters. Unsalvageable input becomes
/// `vps-<nnnn>` from the current clock.
pub fn normalize_vm_name(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();

    let mut cleaned = String::with_capacity(lowered.len());
    for ch in lowered.chars() {
        if ch.is_whitespace() {
            cleaned.push('-');
        } else if ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' {
            cleaned.push(ch);
        } else {
            cleaned.push('-');
        }
    }

    // Collapse runs of '-' left behind by the substitutions above.
    let mut collapsed = String::with_capacity(cleaned.len());
    let mut prev_dash = false;
    for ch in cleaned.chars() {
        if ch == '-' {
            if !prev_dash {
                collapsed.push(ch);
            }
            prev_dash = true;
        } else {
            collapsed.push(ch);
            prev_dash = false;
        }
    }

    let mut name = collapsed;
    if !name.starts_with(|c: char| c.is_ascii_lowercase()) {
        name = format!("vps-{}", name);
    }
    if name.ends_with('-') {
        name.pop();
    }
    if name.len() < 3 {
        name = fallback_name();
    }
    name
}

fn fallback_name() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let digits = millis.to_string();
    let tail = if digits.len() > 4 {
        digits[digits.len() - 4..].to_string()
    } else {
        digits
    };
    format!("vps-{}", tail)
}

/// Normalize a user identity into a login name cloud-init will accept:
/// `[A-Za-z0-9_-]`, 2..=20 characters, starting with an ASCII letter.
pub fn normalize_username(raw: &str) -> String {
    let trimmed = raw.trim();

    let mut cleaned = String::with_capacity(trimmed.len());
    let mut prev_ws = false;
    for ch in trimmed.chars() {
        if ch.is_whitespace() {
            if !prev_ws {
                cleaned.push('_');
            }
            prev_ws = true;
        } else {
            prev_ws = false;
            if ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' {
                cleaned.push(ch);
            }
        }
    }

    let mut name = cleaned;
    if name.len() < 2 {
        name = "user".to_string();
    }
    if name.len() > 20 {
        name.truncate(20);
    }
    if !name.starts_with(|c: char| c.is_ascii_alphabetic()) {
        name = format!("user_{}", name);
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vm_name_lowercases_and_dashes() {
        assert_eq!(normalize_vm_name("My Web Server"), "my-web-server");
    }

    #[test]
    fn test_vm_name_collapses_symbol_runs() {
        assert_eq!(normalize_vm_name("db!!prod"), "db-prod");
    }

    #[test]
    fn test_vm_name_prefixes_when_not_letter_led() {
        assert_eq!(normalize_vm_name("42node"), "vps-42node");
    }

    #[test]
    fn test_vm_name_strips_trailing_dash() {
        assert_eq!(normalize_vm_name("web-"), "web");
    }

    #[test]
    fn test_vm_name_fallback_for_short_input() {
        let name = normalize_vm_name("ab");
        assert!(name.starts_with("vps-"));
        assert!(name.len() >= 5);
        assert!(name[4..].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_vm_name_prefix_applies_before_length_check() {
        assert_eq!(normalize_vm_name(""), "vps");
        assert_eq!(normalize_vm_name("!"), "vps-");
    }

    #[test]
    fn test_username_replaces_whitespace() {
        assert_eq!(normalize_username("john doe"), "john_doe");
    }

    #[test]
    fn test_username_strips_symbols() {
        assert_eq!(normalize_username("a@b.c"), "abc");
    }

    #[test]
    fn test_username_short_input_becomes_user() {
        assert_eq!(normalize_username("!"), "user");
        assert_eq!(normalize_username(""), "user");
    }

    #[test]
    fn test_username_truncates_to_twenty() {
        let long = "a".repeat(30);
        assert_eq!(normalize_username(&long).len(), 20);
    }

    #[test]
    fn test_username_digit_led_gets_prefix() {
        assert_eq!(normalize_username("1337"), "user_1337");
    }
}
