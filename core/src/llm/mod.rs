//! Language-model seam: the trait every backend implements and the factory
//! that picks one by name.

pub mod openai;
#[cfg(test)]
pub(crate) mod scripted;

pub use openai::OpenAiChat;

use crate::interface::Prompt;
use crate::prelude::{ConfigError, ModelError};
use std::fs;
use std::path::Path;

/// A model that answers one prompt with free text.
///
/// Calls block until the backend answers; there is no retry or timeout at
/// this layer.
pub trait LanguageModel: Send + Sync {
    fn name(&self) -> &str;
    fn generate(&self, prompt: &Prompt) -> Result<String, ModelError>;
}

/// Reads an API key file, trimming surrounding whitespace.
pub fn load_api_key(path: &Path) -> Result<String, ModelError> {
    fs::read_to_string(path)
        .map(|key| key.trim().to_string())
        .map_err(|source| ModelError::ApiKey {
            path: path.to_path_buf(),
            source,
        })
}

#[derive(thiserror::Error, Debug)]
pub enum BuildModelError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Builds the backend named `model` (case-insensitive).
pub fn build_model(
    model: &str,
    version: &str,
    key_path: &Path,
    endpoint: Option<&str>,
) -> Result<Box<dyn LanguageModel>, BuildModelError> {
    match model.to_ascii_lowercase().as_str() {
        "chatgpt" => {
            let api_key = load_api_key(key_path)?;
            let mut client = OpenAiChat::new(version, api_key)?;
            if let Some(endpoint) = endpoint {
                client = client.with_endpoint(endpoint);
            }
            Ok(Box::new(client))
        }
        other => Err(ConfigError::UnsupportedModel(other.to_string()).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn api_key_is_trimmed() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"  sk-test-key \n").unwrap();
        assert_eq!(load_api_key(file.path()).unwrap(), "sk-test-key");
    }

    #[test]
    fn missing_key_file_reports_path() {
        let err = load_api_key(Path::new("/nonexistent/key.txt")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/key.txt"));
    }

    #[test]
    fn only_chatgpt_is_supported() {
        let result = build_model("llama", "7b", Path::new("unused"), None);
        assert!(matches!(
            result,
            Err(BuildModelError::Config(ConfigError::UnsupportedModel(name))) if name == "llama"
        ));
    }

    #[test]
    fn chatgpt_name_is_case_insensitive() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"sk-test").unwrap();
        let model = build_model("ChatGPT", "gpt-4o", file.path(), Some("http://127.0.0.1:9/v1")).unwrap();
        assert_eq!(model.name(), "gpt-4o");
    }
}
