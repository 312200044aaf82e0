pub mod app_state;
pub mod outcome;
pub mod prompt;
pub mod remote_session;
pub mod wizard_session;

pub use app_state::AppState;
pub use outcome::ProvisioningOutcome;
pub use prompt::{PromptOption, StepPrompt, WizardReply};
pub use remote_session::{HistoryEntry, RemoteSession};
pub use wizard_session::{VmRequest, WizardSession, WizardStep};
