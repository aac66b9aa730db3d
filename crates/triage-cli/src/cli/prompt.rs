use dialoguer::{theme::ColorfulTheme, Confirm, Select};
use triage_core::classify::{DecisionPrompt, DecisionRequest};
use triage_core::errors::ClassifyError;
use triage_core::ErrorCategory;

const DECLINE: &str = "skip";

/// Terminal prompt for manual classification.
#[derive(Default)]
pub struct DialoguerPrompt {
    theme: ColorfulTheme,
}

impl DecisionPrompt for DialoguerPrompt {
    fn choose(
        &mut self,
        request: &DecisionRequest<'_>,
    ) -> Result<Option<ErrorCategory>, ClassifyError> {
        eprintln!();
        eprintln!("{} ({} left)", request.test_name, request.remaining);
        eprintln!("  {}", request.summary);
        if request.similar > 0 {
            eprintln!("  {} similar failure(s) get the same category", request.similar);
        }
        let mut items: Vec<String> = request.choices.iter().map(|c| c.to_string()).collect();
        items.push(DECLINE.to_string());
        let default = request
            .choices
            .iter()
            .position(|c| *c == request.default)
            .unwrap_or(0);
        let picked = Select::with_theme(&self.theme)
            .with_prompt("Category")
            .items(&items)
            .default(default)
            .interact()
            .map_err(|e| ClassifyError::Prompt(e.to_string()))?;
        Ok(request.choices.get(picked).copied())
    }

    fn confirm_stop(&mut self) -> Result<bool, ClassifyError> {
        Confirm::with_theme(&self.theme)
            .with_prompt("Stop classifying?")
            .default(false)
            .interact()
            .map_err(|e| ClassifyError::Prompt(e.to_string()))
    }
}
