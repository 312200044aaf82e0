//! Guest address discovery. Strategies are best-effort and fail
//! silently; the poller only ever returns an address or the `unknown`
//! sentinel.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::hypervisor::Hypervisor;

pub const DISCOVERY_ROUNDS: u32 = 10;
pub const ROUND_DELAY: Duration = Duration::from_secs(10);

/// Sentinel returned when every round came up empty.
pub const UNKNOWN_IP: &str = "unknown";

static IPV4_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{1,3}\.){3}\d{1,3}$").unwrap());

/// Pulls an address out of QEMU monitor `info network` text.
static MONITOR_IP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:ip|address)[\s:]+(\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})").unwrap()
});

fn is_dotted_quad(addr: &str) -> bool {
    IPV4_RE.is_match(addr)
}

/// Poll for the guest's address: up to [`DISCOVERY_ROUNDS`] rounds,
/// sleeping [`ROUND_DELAY`] before each. A strict IPv4 pass runs first
/// in every round, then the general pass that also accepts IPv6.
pub async fn discover_ip<H: Hypervisor>(hv: &H, node: &str, vmid: u32) -> String {
    for round in 1..=DISCOVERY_ROUNDS {
        tokio::time::sleep(ROUND_DELAY).await;
        if let Some(ip) = strict_ipv4_pass(hv, node, vmid).await {
            tracing::info!(vmid, %ip, round, "IPv4 address discovered");
            return ip;
        }
        if let Some(ip) = general_pass(hv, node, vmid).await {
            tracing::info!(vmid, %ip, round, "address discovered via general pass");
            return ip;
        }
    }
    tracing::warn!(vmid, "address discovery exhausted, reporting unknown");
    UNKNOWN_IP.to_string()
}

/// Agent first, then ARP, accepting only non-loopback dotted quads.
async fn strict_ipv4_pass<H: Hypervisor>(hv: &H, node: &str, vmid: u32) -> Option<String> {
    if let Ok(interfaces) = hv.agent_interfaces(node, vmid).await {
        for iface in &interfaces {
            for addr in &iface.ip_addresses {
                if let Some(ip) = addr.ip_address.as_deref() {
                    if is_dotted_quad(ip) && !ip.starts_with("127.") {
                        return Some(ip.to_string());
                    }
                }
            }
        }
    }
    arp_lookup(hv, node, vmid, true).await
}

/// Agent preferring IPv4 but falling back to routable IPv6, then DHCP
/// inspection through the monitor, then ARP without the IPv4 filter.
async fn general_pass<H: Hypervisor>(hv: &H, node: &str, vmid: u32) -> Option<String> {
    if let Ok(interfaces) = hv.agent_interfaces(node, vmid).await {
        for iface in &interfaces {
            if iface.ip_addresses.is_empty() {
                continue;
            }
            let mut fallback: Option<&str> = None;
            for addr in &iface.ip_addresses {
                let Some(ip) = addr.ip_address.as_deref() else {
                    continue;
                };
                if ip.starts_with("127.") || ip == "::1" || ip.starts_with("fe80:") {
                    continue;
                }
                if is_dotted_quad(ip) {
                    return Some(ip.to_string());
                }
                if fallback.is_none() {
                    fallback = Some(ip);
                }
            }
            if let Some(ip) = fallback {
                return Some(ip.to_string());
            }
        }
    }
    if let Some(ip) = dhcp_monitor_lookup(hv, node, vmid).await {
        return Some(ip);
    }
    arp_lookup(hv, node, vmid, false).await
}

async fn dhcp_monitor_lookup<H: Hypervisor>(hv: &H, node: &str, vmid: u32) -> Option<String> {
    let text = hv.monitor(node, vmid, "info network").await.ok()?;
    MONITOR_IP_RE
        .captures(&text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Match the ARP table against the MAC from the VM's `net0` line.
async fn arp_lookup<H: Hypervisor>(
    hv: &H,
    node: &str,
    vmid: u32,
    ipv4_only: bool,
) -> Option<String> {
    let entries = hv.arp_table(node).await.ok()?;
    let config = hv.vm_config(node, vmid).await.ok()?;
    let mac = config.mac_address()?;
    let entry = entries.iter().find(|e| e.mac == mac)?;
    if ipv4_only && !is_dotted_quad(&entry.ip) {
        return None;
    }
    Some(entry.ip.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dotted_quad_matcher() {
        assert!(is_dotted_quad("192.168.1.10"));
        assert!(!is_dotted_quad("fe80::1"));
        assert!(!is_dotted_quad("192.168.1"));
    }

    #[test]
    fn test_monitor_text_extraction() {
        let text = "virtio0: index=0,type=nic\n  ip: 10.0.3.77, mask 255.255.255.0";
        let caps = MONITOR_IP_RE.captures(text).unwrap();
        assert_eq!(&caps[1], "10.0.3.77");
    }

    #[test]
    fn test_monitor_text_address_keyword() {
        let text = "net0 Address: 172.16.0.5";
        let caps = MONITOR_IP_RE.captures(text).unwrap();
        assert_eq!(&caps[1], "172.16.0.5");
    }
}
