/// One executed command and its captured output.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub command: String,
    pub output: String,
}

/// An operator's interactive shell target. Lives in the session store
/// between commands; the underlying connection is opened per command.
#[derive(Debug, Clone)]
pub struct RemoteSession {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Sticky once set by the explicit elevation action; cleared only by
    /// closing the session. Never inferred from command text.
    pub elevated: bool,
    pub history: Vec<HistoryEntry>,
}

impl RemoteSession {
    pub fn new(host: &str, port: u16, username: &str, password: &str) -> Self {
        Self {
            host: host.to_string(),
            port,
            username: username.to_string(),
            password: password.to_string(),
            elevated: false,
            history: Vec::new(),
        }
    }

    pub fn push_history(&mut self, command: &str, output: &str) {
        self.history.push(HistoryEntry {
            command: command.to_string(),
            output: output.to_string(),
        });
    }
}
