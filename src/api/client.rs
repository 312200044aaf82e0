use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use reqwest::multipart;
use serde_json::Value;
use yansi::Paint;

use crate::config;
use crate::error::ForgeError;

static SILENT: AtomicBool = AtomicBool::new(false);

pub fn set_silent(silent: bool) {
    SILENT.store(silent, Ordering::Relaxed);
}

fn log_output(msg: String) {
    if !SILENT.load(Ordering::Relaxed) {
        println!("{}", msg);
    }
}

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);
/// Attempts for idempotent reads, including the first one.
const READ_ATTEMPTS: u32 = 2;
const READ_RETRY_DELAY_MS: u64 = 1500;
const UPLOAD_ATTEMPTS: u32 = 2;
const UPLOAD_RETRY_DELAY_MS: u64 = 5000;

/// HTTP client for the hypervisor REST API.
///
/// Holds the connection pool, base URL and API token. All responses use
/// the `{ "data": ..., "errors": ... }` envelope; a populated `errors`
/// member is a failure regardless of HTTP status.
#[derive(Clone)]
pub struct ProxmoxClient {
    client: reqwest::Client,
    base_url: String,
    token_id: String,
    token_secret: String,
}

impl ProxmoxClient {
    pub fn new(
        base_url: &str,
        token_id: &str,
        token_secret: &str,
        verify_tls: bool,
    ) -> Result<Self, ForgeError> {
        let client = reqwest::Client::builder()
            .user_agent(format!("vmforge/{}", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(!verify_tls)
            .build()
            .map_err(|e| ForgeError::Api(format!("could not build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: config::sanitize_base_url(base_url),
            token_id: token_id.to_string(),
            token_secret: token_secret.to_string(),
        })
    }

    /// Build a client from the process environment (see `config`).
    pub fn from_env() -> Result<Self, ForgeError> {
        Self::new(
            &config::get_api_url(),
            &config::get_token_id(),
            &config::get_token_secret(),
            config::get_verify_tls(),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn has_credentials(&self) -> bool {
        !self.token_id.trim().is_empty() && !self.token_secret.trim().is_empty()
    }

    fn auth_header(&self) -> String {
        format!("PVEAPIToken={}={}", self.token_id, self.token_secret)
    }

    /// Issue a single request. Mutating endpoints go through here so they
    /// are sent at most once per pipeline step.
    pub(crate) async fn request(
        &self,
        method: &str,
        path: &str,
        form: Option<&[(&str, String)]>,
    ) -> Result<Value, ForgeError> {
        let url = format!("{}{}", self.base_url, path);
        self.echo_request(method, &url, form);

        let mut req = match method {
            "POST" => self.client.post(&url),
            "PUT" => self.client.put(&url),
            "DELETE" => self.client.delete(&url),
            _ => self.client.get(&url),
        };
        req = req.header("Authorization", self.auth_header());
        if let Some(pairs) = form {
            req = req.form(pairs);
        }

        let resp = req.send().await.map_err(classify_transport)?;
        let status = resp.status();
        let body = resp.text().await.map_err(classify_transport)?;
        self.echo_response(&body);
        parse_envelope(status, &body, path)
    }

    /// Bounded retry wrapper for idempotent reads: transient failures are
    /// retried with an increasing delay, everything else surfaces at once.
    pub(crate) async fn request_retry(
        &self,
        method: &str,
        path: &str,
        form: Option<&[(&str, String)]>,
    ) -> Result<Value, ForgeError> {
        let mut attempt = 1u32;
        loop {
            match self.request(method, path, form).await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_transient() && attempt < READ_ATTEMPTS => {
                    tracing::warn!(attempt, path, error = %e, "transient API failure, retrying");
                    tokio::time::sleep(Duration::from_millis(
                        READ_RETRY_DELAY_MS * attempt as u64,
                    ))
                    .await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Upload a text snippet to a node storage. Returns the volume id the
    /// snippet is addressable under (`<storage>:snippets/<filename>`).
    pub async fn upload_snippet(
        &self,
        node: &str,
        storage: &str,
        filename: &str,
        content: &str,
    ) -> Result<String, ForgeError> {
        let path = format!("/api2/json/nodes/{}/storage/{}/upload", node, storage);
        let url = format!("{}{}", self.base_url, path);

        let mut attempt = 1u32;
        loop {
            let part = multipart::Part::bytes(content.as_bytes().to_vec())
                .file_name(filename.to_string())
                .mime_str("text/plain")
                .map_err(|e| ForgeError::Api(format!("invalid upload part: {}", e)))?;
            let form = multipart::Form::new()
                .text("content", "snippets")
                .part("filename", part);

            let sent = self
                .client
                .post(&url)
                .header("Authorization", self.auth_header())
                .timeout(UPLOAD_TIMEOUT)
                .multipart(form)
                .send()
                .await;

            let outcome = match sent {
                Ok(resp) => {
                    let status = resp.status();
                    match resp.text().await {
                        Ok(body) => parse_envelope(status, &body, &path),
                        Err(e) => Err(classify_transport(e)),
                    }
                }
                Err(e) => Err(classify_transport(e)),
            };

            match outcome {
                Ok(_) => return Ok(format!("{}:snippets/{}", storage, filename)),
                Err(e) if e.is_transient() && attempt < UPLOAD_ATTEMPTS => {
                    tracing::warn!(attempt, filename, error = %e, "snippet upload failed, retrying");
                    tokio::time::sleep(Duration::from_millis(
                        UPLOAD_RETRY_DELAY_MS * attempt as u64,
                    ))
                    .await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    // --- Curl-style request echo ---
    fn echo_request(&self, method: &str, url: &str, form: Option<&[(&str, String)]>) {
        if SILENT.load(Ordering::Relaxed) {
            return;
        }
        let mut parts = Vec::new();
        parts.push(Paint::new("curl").fg(yansi::Color::Green).bold().to_string());
        parts.push(format!("-k -X {}", Paint::new(method).fg(yansi::Color::Yellow).bold()));
        parts.push(format!("'{}'", Paint::new(url).fg(yansi::Color::Cyan)));
        parts.push(format!(
            "{} {}",
            Paint::new("-H").fg(yansi::Color::Magenta),
            Paint::new("'Authorization: PVEAPIToken=***'").fg(yansi::Color::Magenta)
        ));
        if let Some(pairs) = form {
            for (k, v) in pairs {
                let shown = if k.contains("password") { "***" } else { v.as_str() };
                parts.push(format!(
                    "{} {}",
                    Paint::new("-d").fg(yansi::Color::Blue),
                    Paint::new(format!("'{}={}'", k, shown)).fg(yansi::Color::White)
                ));
            }
        }
        log_output(format!("Request:\n{}", parts.join(" ")));
    }

    fn echo_response(&self, body: &str) {
        if SILENT.load(Ordering::Relaxed) {
            return;
        }
        let shown = if body.chars().count() > 600 {
            let cut: String = body.chars().take(600).collect();
            format!("{}...", cut)
        } else {
            body.to_string()
        };
        log_output(format!("Response:\n{}", Paint::new(shown).rgb(100, 100, 100)));
    }
}

fn classify_transport(e: reqwest::Error) -> ForgeError {
    if e.is_timeout() || e.is_connect() {
        ForgeError::TransientApi(e.to_string())
    } else {
        ForgeError::Api(e.to_string())
    }
}

/// Unwrap the `{data, errors}` envelope, mapping HTTP and envelope
/// failures onto the error taxonomy.
fn parse_envelope(
    status: reqwest::StatusCode,
    body: &str,
    path: &str,
) -> Result<Value, ForgeError> {
    let parsed: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) => {
            if status.is_server_error() {
                return Err(ForgeError::TransientApi(format!("{} returned {}", path, status)));
            }
            return Err(ForgeError::Api(format!(
                "unparseable response from {} ({})",
                path, status
            )));
        }
    };

    if let Some(errors) = parsed.get("errors") {
        if !errors.is_null() {
            let text = crate::util::value_to_short_string(errors);
            if text.contains("does not exist") {
                return Err(ForgeError::NotFound(text));
            }
            return Err(ForgeError::Api(text));
        }
    }

    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(ForgeError::NotFound(path.to_string()));
    }
    if status.is_server_error() {
        return Err(ForgeError::TransientApi(format!("{} returned {}", path, status)));
    }
    if !status.is_success() {
        return Err(ForgeError::Api(format!("{} returned {}", path, status)));
    }

    Ok(parsed.get("data").cloned().unwrap_or(Value::Null))
}
