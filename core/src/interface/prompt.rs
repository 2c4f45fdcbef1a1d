use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// MIME type every rendered image is carried as.
pub const IMAGE_MIME: &str = "image/png";

/// One block of a prompt, in the order the model receives it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptBlock {
    Text(String),
    Image(Vec<u8>),
}

/// Ordered, non-empty sequence of prompt blocks: one text block first,
/// then any images.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    blocks: Vec<PromptBlock>,
}

impl Prompt {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            blocks: vec![PromptBlock::Text(text.into())],
        }
    }

    pub fn with_images(text: impl Into<String>, images: Vec<Vec<u8>>) -> Self {
        let mut blocks = Vec::with_capacity(images.len() + 1);
        blocks.push(PromptBlock::Text(text.into()));
        blocks.extend(images.into_iter().map(PromptBlock::Image));
        Self { blocks }
    }

    pub fn blocks(&self) -> &[PromptBlock] {
        &self.blocks
    }

    /// The leading text block.
    pub fn instruction(&self) -> &str {
        self.blocks
            .iter()
            .find_map(|block| match block {
                PromptBlock::Text(text) => Some(text.as_str()),
                PromptBlock::Image(_) => None,
            })
            .unwrap_or_default()
    }

    pub fn images(&self) -> impl Iterator<Item = &[u8]> {
        self.blocks.iter().filter_map(|block| match block {
            PromptBlock::Image(bytes) => Some(bytes.as_slice()),
            PromptBlock::Text(_) => None,
        })
    }

    pub fn image_count(&self) -> usize {
        self.images().count()
    }
}

/// Encodes image bytes as a `data:` URI.
pub fn data_uri(bytes: &[u8]) -> String {
    format!("data:{};base64,{}", IMAGE_MIME, BASE64.encode(bytes))
}

/// Estimated token cost of a prompt; derived only, never fed back into it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBudget {
    pub text_tokens: usize,
    pub image_tokens: usize,
}

impl TokenBudget {
    pub fn total(&self) -> usize {
        self.text_tokens + self.image_tokens
    }
}
