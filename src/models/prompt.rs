use serde::Serialize;

use super::wizard_session::WizardStep;

/// One selectable entry of a step menu. `value` is what the caller
/// submits back; `label` is display-only and free for the caller to
/// localize or replace.
#[derive(Debug, Clone, Serialize)]
pub struct PromptOption {
    pub value: String,
    pub label: String,
}

impl PromptOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self { value: value.into(), label: label.into() }
    }
}

/// What the caller should render next.
#[derive(Debug, Clone, Serialize)]
pub struct StepPrompt {
    pub step: WizardStep,
    pub title: String,
    pub options: Vec<PromptOption>,
    /// The step expects free text (the name form) instead of a menu pick.
    pub free_text: bool,
    /// Validation feedback when the previous submission was rejected.
    pub notice: Option<String>,
    /// Recap of the collected parameters, present on the confirm step.
    pub summary: Option<String>,
}

impl StepPrompt {
    pub fn menu(step: WizardStep, title: impl Into<String>, options: Vec<PromptOption>) -> Self {
        Self {
            step,
            title: title.into(),
            options,
            free_text: false,
            notice: None,
            summary: None,
        }
    }

    pub fn text(step: WizardStep, title: impl Into<String>) -> Self {
        Self {
            step,
            title: title.into(),
            options: Vec::new(),
            free_text: true,
            notice: None,
            summary: None,
        }
    }

    pub fn with_notice(mut self, notice: impl Into<String>) -> Self {
        self.notice = Some(notice.into());
        self
    }
}

/// Result of feeding one user input to the wizard.
#[derive(Debug, Clone)]
pub enum WizardReply {
    /// Render this prompt and wait for the next submission.
    Prompt(StepPrompt),
    /// The user confirmed; the session is ready for the pipeline.
    Committed,
    /// The user cancelled; the session has been removed.
    Cancelled,
}
