use std::env;
use std::path::Path;

// Default configuration constants
pub const DEFAULT_API_URL: &str = "https://127.0.0.1:8006";
pub const DEFAULT_TOKEN_ID: &str = "";
pub const DEFAULT_TOKEN_SECRET: &str = "";
pub const DEFAULT_SSH_PORT: u16 = 22;
pub const DEFAULT_SNIPPETS_STORAGE: &str = "local";

pub fn load_env_file(env_file: Option<&str>) {
    if let Some(path) = env_file {
        dotenvy::from_path(Path::new(path)).ok();
    } else {
        dotenvy::dotenv().ok();
    }
}

/// Base URL of the hypervisor API, e.g. `https://pve.example:8006`.
pub fn get_api_url() -> String {
    sanitize_base_url(&env::var("PROXMOX_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string()))
}

/// API token id in `user@realm!tokenname` form.
pub fn get_token_id() -> String {
    env::var("PROXMOX_TOKEN_ID").unwrap_or_else(|_| DEFAULT_TOKEN_ID.to_string())
}

pub fn get_token_secret() -> String {
    env::var("PROXMOX_TOKEN_SECRET").unwrap_or_else(|_| DEFAULT_TOKEN_SECRET.to_string())
}

/// Whether to verify the hypervisor's TLS certificate. Off unless
/// explicitly enabled; PVE clusters commonly run self-signed
/// certificates.
pub fn get_verify_tls() -> bool {
    matches!(
        env::var("PROXMOX_VERIFY_TLS").unwrap_or_default().trim().to_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}

pub fn get_ssh_port() -> u16 {
    env::var("SSH_PORT")
        .ok()
        .and_then(|v| v.trim().parse::<u16>().ok())
        .unwrap_or(DEFAULT_SSH_PORT)
}

/// Storage used for cloud-init snippet uploads.
pub fn get_snippets_storage() -> String {
    let raw = env::var("SNIPPETS_STORAGE").unwrap_or_default();
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        DEFAULT_SNIPPETS_STORAGE.to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn sanitize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        DEFAULT_API_URL.to_string()
    } else {
        trimmed.to_string()
    }
}
