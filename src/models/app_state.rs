use crate::api::ProxmoxClient;
use crate::sessions::SessionStore;

use super::remote_session::RemoteSession;
use super::wizard_session::WizardSession;

/// Shared application state: the hypervisor client plus one session
/// store per session kind, keyed by user identity.
#[derive(Clone)]
pub struct AppState {
    pub wizards: SessionStore<WizardSession>,
    pub shells: SessionStore<RemoteSession>,
    pub api: ProxmoxClient,
}

impl AppState {
    pub fn new(api: ProxmoxClient) -> Self {
        Self {
            wizards: SessionStore::new(),
            shells: SessionStore::new(),
            api,
        }
    }
}
