//! Token cost estimates for prompts. Used for logging only; nothing is ever
//! truncated or rejected on the basis of these numbers.

use crate::interface::{Prompt, TokenBudget};
use crate::prelude::{ConfigError, EncodeResult};
use image::codecs::png::PngDecoder;
use image::ImageDecoder;
use std::io::Cursor;
use tiktoken_rs::{get_bpe_from_model, CoreBPE};

const IMAGE_BASE_TOKENS: usize = 85;
const IMAGE_TILE_TOKENS: usize = 170;
const IMAGE_TILE_PX: u32 = 512;
const IMAGE_MAX_SIDE_PX: u32 = 1024;

/// Tokenizer-backed estimator bound to one model.
pub struct TokenEstimator {
    model: String,
    bpe: CoreBPE,
}

impl TokenEstimator {
    pub fn for_model(model: &str) -> Result<Self, ConfigError> {
        let bpe = get_bpe_from_model(model)
            .map_err(|_| ConfigError::UnsupportedModel(model.to_string()))?;
        Ok(Self {
            model: model.to_string(),
            bpe,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Special-token markers in `text` count as the ordinary text they are.
    pub fn count_text(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    /// Text tokens of the instruction plus the tiled cost of every image.
    pub fn estimate(&self, prompt: &Prompt) -> EncodeResult<TokenBudget> {
        let image_tokens = prompt
            .images()
            .map(count_image_tokens)
            .sum::<EncodeResult<usize>>()?;
        Ok(TokenBudget {
            text_tokens: self.count_text(prompt.instruction()),
            image_tokens,
        })
    }
}

pub fn count_text_tokens(text: &str, model: &str) -> Result<usize, ConfigError> {
    Ok(TokenEstimator::for_model(model)?.count_text(text))
}

/// `(width, height)` of a PNG image.
pub fn image_size(bytes: &[u8]) -> EncodeResult<(u32, u32)> {
    let decoder = PngDecoder::new(Cursor::new(bytes))?;
    Ok(decoder.dimensions())
}

pub fn count_image_tokens(bytes: &[u8]) -> EncodeResult<usize> {
    let (width, height) = image_size(bytes)?;
    Ok(image_tokens_for(width, height))
}

/// Base cost plus one surcharge per 512-pixel tile, after fitting the image
/// into 1024 pixels on its larger side.
pub fn image_tokens_for(width: u32, height: u32) -> usize {
    let (width, height) = fit_within(width, height, IMAGE_MAX_SIDE_PX);
    let rows = height.div_ceil(IMAGE_TILE_PX) as usize;
    let cols = width.div_ceil(IMAGE_TILE_PX) as usize;
    IMAGE_BASE_TOKENS + IMAGE_TILE_TOKENS * rows * cols
}

fn fit_within(width: u32, height: u32, limit: u32) -> (u32, u32) {
    if width <= limit && height <= limit {
        return (width, height);
    }
    if width > height {
        let scaled = (height as u64 * limit as u64 / width as u64) as u32;
        (limit, scaled)
    } else {
        let scaled = (width as u64 * limit as u64 / height as u64) as u32;
        (scaled, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::png::PngEncoder;
    use image::{ExtendedColorType, ImageEncoder};

    fn blank_png(width: u32, height: u32) -> Vec<u8> {
        let pixels = vec![255u8; (width * height * 3) as usize];
        let mut png = Vec::new();
        PngEncoder::new(&mut png)
            .write_image(&pixels, width, height, ExtendedColorType::Rgb8)
            .unwrap();
        png
    }

    #[test]
    fn single_tile_image_costs_base_plus_one_tile() {
        assert_eq!(count_image_tokens(&blank_png(512, 512)).unwrap(), 255);
    }

    #[test]
    fn two_tile_image_costs_two_surcharges() {
        assert_eq!(count_image_tokens(&blank_png(1024, 512)).unwrap(), 425);
    }

    #[test]
    fn large_images_are_scaled_before_tiling() {
        assert_eq!(image_tokens_for(2048, 1024), 425);
        assert_eq!(image_tokens_for(600, 2000), 425);
        assert_eq!(image_tokens_for(512, 409), 255);
    }

    #[test]
    fn non_png_bytes_are_rejected() {
        assert!(count_image_tokens(b"not an image").is_err());
    }

    #[test]
    fn text_tokens_follow_the_model_tokenizer() {
        let estimator = TokenEstimator::for_model("gpt-4").unwrap();
        assert_eq!(estimator.count_text("hello world"), 2);
        assert_eq!(count_text_tokens("", "gpt-4").unwrap(), 0);
    }

    #[test]
    fn special_token_markers_are_plain_text() {
        let estimator = TokenEstimator::for_model("gpt-4").unwrap();
        assert!(estimator.count_text("<|endoftext|>") > 1);
    }

    #[test]
    fn unknown_model_is_a_config_error() {
        assert!(matches!(
            TokenEstimator::for_model("no-such-model"),
            Err(ConfigError::UnsupportedModel(_))
        ));
    }

    #[test]
    fn prompt_estimate_adds_image_tiles() {
        let estimator = TokenEstimator::for_model("gpt-4").unwrap();
        let prompt = Prompt::with_images("hello world", vec![blank_png(512, 512), blank_png(100, 100)]);
        let budget = estimator.estimate(&prompt).unwrap();
        assert_eq!(budget, TokenBudget { text_tokens: 2, image_tokens: 510 });
        assert_eq!(budget.total(), 512);
    }
}
