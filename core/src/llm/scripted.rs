use crate::interface::Prompt;
use crate::llm::LanguageModel;
use crate::prelude::ModelError;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Replays queued responses and keeps every prompt it was sent.
pub(crate) struct ScriptedModel {
    responses: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<Prompt>>,
}

impl ScriptedModel {
    pub(crate) fn new<S: Into<String>>(responses: impl IntoIterator<Item = S>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl LanguageModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    fn generate(&self, prompt: &Prompt) -> Result<String, ModelError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.clone());
        }
        self.responses
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front())
            .ok_or(ModelError::EmptyCompletion)
    }
}
