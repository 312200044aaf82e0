use rand::Rng;

/// Characters used for generated VM passwords. Ambiguous glyphs
/// (I, l, O, 0, 1) are left out so credentials survive being retyped.
const PASSWORD_CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnpqrstuvwxyz23456789";

pub const PASSWORD_LENGTH: usize = 12;

/// Generate a random password from the unambiguous charset.
pub fn random_password(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| {
            let idx = rng.gen_range(0..PASSWORD_CHARSET.len());
            PASSWORD_CHARSET[idx] as char
        })
        .collect()
}

/// Convert a raw byte count to a rounded GiB string for table output.
pub fn bytes_to_gib(bytes: u64) -> String {
    let gib = bytes as f64 / (1024.0 * 1024.0 * 1024.0);
    format!("{:.1} GiB", gib)
}

/// Format an uptime in seconds as `2d 3h 14m`.
pub fn format_uptime(seconds: u64) -> String {
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3_600;
    let minutes = (seconds % 3_600) / 60;
    if days > 0 {
        format!("{}d {}h {}m", days, hours, minutes)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

pub fn value_to_short_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Array(arr) => arr
            .iter()
            .map(value_to_short_string)
            .collect::<Vec<_>>()
            .join(", "),
        serde_json::Value::Object(obj) => {
            let mut parts = Vec::new();
            for (key, val) in obj {
                parts.push(format!("{}: {}", key, value_to_short_string(val)));
            }
            parts.join(", ")
        }
        serde_json::Value::Null => String::new(),
    }
}

/// Mask every occurrence of `secret` in `text` for display purposes.
pub fn mask_secret(text: &str, secret: &str) -> String {
    if secret.is_empty() {
        return text.to_string();
    }
    text.replace(secret, "********")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_password_length_and_charset() {
        let pw = random_password(PASSWORD_LENGTH);
        assert_eq!(pw.len(), PASSWORD_LENGTH);
        assert!(pw.bytes().all(|b| PASSWORD_CHARSET.contains(&b)));
    }

    #[test]
    fn test_password_avoids_ambiguous_characters() {
        for _ in 0..50 {
            let pw = random_password(32);
            assert!(!pw.contains('0'));
            assert!(!pw.contains('O'));
            assert!(!pw.contains('1'));
            assert!(!pw.contains('l'));
            assert!(!pw.contains('I'));
        }
    }

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(59), "0m");
        assert_eq!(format_uptime(3_660), "1h 1m");
        assert_eq!(format_uptime(180_000), "2d 2h 0m");
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("echo 'hunter2' | sudo -S id", "hunter2"), "echo '********' | sudo -S id");
        assert_eq!(mask_secret("no secret here", ""), "no secret here");
    }
}
