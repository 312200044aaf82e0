//! Disk-grow instruction parsing. Proxmox only grows disks, so every
//! accepted instruction normalizes to a `+<n><unit>` growth string; an
//! absolute target is converted against the current size when known.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ForgeError;

static SIZE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\+)?(\d+)(K|M|G|T)$").unwrap());
static BARE_NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\+)?\d+$").unwrap());
static ATTRIBUTE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)(K|M|G|T)$").unwrap());

fn unit_multiplier(unit: &str) -> u64 {
    match unit {
        "K" => 1024,
        "M" => 1024 * 1024,
        "G" => 1024 * 1024 * 1024,
        _ => 1024u64.pow(4),
    }
}

/// Parse a config `size=` attribute such as `20G` into bytes.
pub fn parse_size_attribute(attr: &str) -> Option<u64> {
    let caps = ATTRIBUTE_RE.captures(&attr.to_uppercase())?;
    let n = caps.get(1)?.as_str().parse::<u64>().ok()?;
    Some(n * unit_multiplier(caps.get(2)?.as_str()))
}

/// Turn the operator's size argument into the growth string handed to
/// the resize endpoint. `current_bytes` is the parsed size of the disk
/// being resized, when the config exposed one.
pub fn parse_resize_instruction(
    raw: &str,
    current_bytes: Option<u64>,
) -> Result<String, ForgeError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ForgeError::Validation(
            "missing size; use +<number><K|M|G|T>, e.g. +10G".to_string(),
        ));
    }
    if trimmed.starts_with('-') {
        return Err(ForgeError::Validation(
            "shrinking is not supported; use a growth format such as +10G".to_string(),
        ));
    }

    let size = trimmed.to_uppercase();
    if BARE_NUMBER_RE.is_match(&size) {
        return Err(ForgeError::Validation(
            "missing unit; add K/M/G/T, e.g. +4G, 4G or +512M".to_string(),
        ));
    }
    let caps = SIZE_RE.captures(&size).ok_or_else(|| {
        ForgeError::Validation(
            "invalid size; expected +<number><K|M|G|T> or <number><K|M|G|T>".to_string(),
        )
    })?;

    let has_plus = caps.get(1).is_some();
    let amount: u64 = caps
        .get(2)
        .and_then(|m| m.as_str().parse().ok())
        .ok_or_else(|| ForgeError::Validation("size number is out of range".to_string()))?;
    let unit = caps.get(3).map(|m| m.as_str()).unwrap_or("G");

    if has_plus {
        return Ok(size);
    }

    match current_bytes {
        Some(current) => {
            let mult = unit_multiplier(unit);
            let requested = amount * mult;
            if requested <= current {
                let current_in_unit = (current as f64 / mult as f64).round() as u64;
                return Err(ForgeError::Validation(format!(
                    "current size is about {}{}; shrinking to {}{} is not supported, use a growth format such as +4G",
                    current_in_unit, unit, amount, unit
                )));
            }
            let delta = requested - current;
            let delta_in_unit = ((delta as f64 / mult as f64).round() as u64).max(1);
            Ok(format!("+{}{}", delta_in_unit, unit))
        }
        // Unknown current size: read the bare value as growth.
        None => Ok(format!("+{}{}", amount, unit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GIB: u64 = 1024 * 1024 * 1024;

    fn parse(raw: &str, current: Option<u64>) -> Result<String, ForgeError> {
        parse_resize_instruction(raw, current)
    }

    #[test]
    fn test_empty_input_rejected() {
        assert!(parse("", None).is_err());
        assert!(parse("   ", None).is_err());
    }

    #[test]
    fn test_shrink_prefix_rejected() {
        assert!(parse("-5G", Some(20 * GIB)).is_err());
    }

    #[test]
    fn test_bare_numbers_rejected() {
        assert!(parse("4", Some(20 * GIB)).is_err());
        assert!(parse("+4", Some(20 * GIB)).is_err());
    }

    #[test]
    fn test_growth_passthrough_uppercases() {
        assert_eq!(parse("+10G", Some(20 * GIB)).unwrap(), "+10G");
        assert_eq!(parse("+512m", None).unwrap(), "+512M");
    }

    #[test]
    fn test_absolute_below_or_equal_current_rejected() {
        assert!(parse("10G", Some(20 * GIB)).is_err());
        assert!(parse("20G", Some(20 * GIB)).is_err());
    }

    #[test]
    fn test_absolute_above_current_becomes_delta() {
        assert_eq!(parse("30G", Some(20 * GIB)).unwrap(), "+10G");
    }

    #[test]
    fn test_absolute_with_unknown_current_is_growth() {
        assert_eq!(parse("30G", None).unwrap(), "+30G");
    }

    #[test]
    fn test_size_attribute_parsing() {
        assert_eq!(parse_size_attribute("20G"), Some(20 * GIB));
        assert_eq!(parse_size_attribute("512M"), Some(512 * 1024 * 1024));
        assert_eq!(parse_size_attribute("raw"), None);
    }
}
