use crate::interface::{data_uri, Prompt, PromptBlock};
use crate::llm::LanguageModel;
use crate::prelude::ModelError;
use log::debug;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{json, Value};

const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";
const MAX_TOKENS: u32 = 4096;

/// OpenAI chat-completions client; the prompt travels as one user message.
pub struct OpenAiChat {
    version: String,
    api_key: String,
    endpoint: String,
    http: Client,
}

#[derive(Deserialize)]
struct Completion {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct Message {
    content: Option<String>,
}

impl OpenAiChat {
    pub fn new(version: &str, api_key: String) -> Result<Self, ModelError> {
        Ok(Self {
            version: version.to_string(),
            api_key,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            http: Client::builder().build()?,
        })
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.trim_end_matches('/').to_string();
        self
    }

    fn request_body(&self, prompt: &Prompt) -> Value {
        json!({
            "model": self.version,
            "messages": [{
                "role": "user",
                "content": message_content(prompt),
            }],
            "max_tokens": MAX_TOKENS,
            "temperature": 0,
        })
    }
}

/// Prompt blocks in order, images as `image_url` data URIs.
pub(crate) fn message_content(prompt: &Prompt) -> Vec<Value> {
    prompt
        .blocks()
        .iter()
        .map(|block| match block {
            PromptBlock::Text(text) => json!({"type": "text", "text": text}),
            PromptBlock::Image(bytes) => {
                json!({"type": "image_url", "image_url": {"url": data_uri(bytes)}})
            }
        })
        .collect()
}

impl LanguageModel for OpenAiChat {
    fn name(&self) -> &str {
        &self.version
    }

    fn generate(&self, prompt: &Prompt) -> Result<String, ModelError> {
        debug!(
            "sending prompt with {} image(s) to {}",
            prompt.image_count(),
            self.version
        );
        let response = self
            .http
            .post(format!("{}/chat/completions", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(&self.request_body(prompt))
            .send()?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ModelError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let completion: Completion = response.json()?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(ModelError::EmptyCompletion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_keeps_block_order() {
        let prompt = Prompt::with_images("question", vec![b"abc".to_vec()]);
        let content = message_content(&prompt);
        assert_eq!(content[0], json!({"type": "text", "text": "question"}));
        assert_eq!(content[1]["type"], "image_url");
        assert_eq!(content[1]["image_url"]["url"], "data:image/png;base64,YWJj");
    }

    #[test]
    fn request_uses_deterministic_sampling() {
        let client = OpenAiChat::new("gpt-4o", "key".into()).unwrap();
        let body = client.request_body(&Prompt::text("hi"));
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["max_tokens"], 4096);
        assert_eq!(body["temperature"], 0);
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[test]
    fn completion_without_content_is_empty() {
        let completion: Completion =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert!(completion.choices[0].message.content.is_none());
    }
}
