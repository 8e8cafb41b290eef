//! Text encoding on top of the `tokenizers` crate.
//!
//! [`TextEncoder`] owns a tokenizer configured for single-sequence
//! classification: truncation to the model's maximum length, padding
//! parameters set, and a resolved baseline token used by the explainers to
//! stand in for an absent token.

use std::path::Path;

use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};

use crate::errors::{FilterError, FilterResult};

/// Model-ready encoding of one piece of text. All vectors share one length.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedText {
    pub ids: Vec<u32>,
    pub attention_mask: Vec<u32>,
    pub special_tokens_mask: Vec<u32>,
    pub tokens: Vec<String>,
}

impl EncodedText {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Positions that take part in attribution (everything except `[CLS]`,
    /// `[SEP]` and friends).
    pub fn feature_positions(&self) -> Vec<usize> {
        self.special_tokens_mask
            .iter()
            .enumerate()
            .filter(|(_, &special)| special == 0)
            .map(|(idx, _)| idx)
            .collect()
    }
}

pub struct TextEncoder {
    tokenizer: Tokenizer,
    baseline_id: u32,
}

impl TextEncoder {
    /// Load a `tokenizer.json` from disk.
    pub fn from_file(path: &Path, max_length: usize, baseline_token: &str) -> FilterResult<Self> {
        let tokenizer = Tokenizer::from_file(path).map_err(|e| {
            FilterError::model_load(format!(
                "Failed to load tokenizer from {}: {e}",
                path.display()
            ))
        })?;
        Self::new(tokenizer, max_length, baseline_token)
    }

    pub fn new(mut tokenizer: Tokenizer, max_length: usize, baseline_token: &str) -> FilterResult<Self> {
        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::BatchLongest,
            ..Default::default()
        }));
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length,
                ..Default::default()
            }))
            .map_err(|e| FilterError::model_load(format!("Invalid truncation settings: {e}")))?;

        let baseline_id = tokenizer.token_to_id(baseline_token).ok_or_else(|| {
            FilterError::model_load(format!(
                "Baseline token '{baseline_token}' is not in the tokenizer vocabulary"
            ))
        })?;

        Ok(Self {
            tokenizer,
            baseline_id,
        })
    }

    pub fn baseline_id(&self) -> u32 {
        self.baseline_id
    }

    pub fn encode(&self, text: &str) -> FilterResult<EncodedText> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| FilterError::tokenization(e.to_string()))?;

        Ok(EncodedText {
            ids: encoding.get_ids().to_vec(),
            attention_mask: encoding.get_attention_mask().to_vec(),
            special_tokens_mask: encoding.get_special_tokens_mask().to_vec(),
            tokens: encoding.get_tokens().to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    const FIXTURE: &str = include_str!("../tests/fixtures/tokenizer.json");

    fn encoder(max_length: usize) -> TextEncoder {
        let tokenizer = Tokenizer::from_str(FIXTURE).expect("fixture tokenizer parses");
        TextEncoder::new(tokenizer, max_length, "[MASK]").expect("encoder builds")
    }

    #[test]
    fn wraps_text_in_special_tokens() {
        let encoded = encoder(512).encode("Hello world").unwrap();
        assert_eq!(encoded.ids, vec![2, 5, 6, 3]);
        assert_eq!(encoded.attention_mask, vec![1, 1, 1, 1]);
        assert_eq!(encoded.special_tokens_mask, vec![1, 0, 0, 1]);
        assert_eq!(encoded.tokens, vec!["[CLS]", "hello", "world", "[SEP]"]);
        assert_eq!(encoded.feature_positions(), vec![1, 2]);
    }

    #[test]
    fn truncates_to_max_length() {
        let encoded = encoder(4).encode("free money now please").unwrap();
        assert_eq!(encoded.len(), 4);
        assert_eq!(encoded.ids.first(), Some(&2));
        assert_eq!(encoded.ids.last(), Some(&3));
    }

    #[test]
    fn unknown_words_map_to_unk() {
        let encoded = encoder(512).encode("zebra").unwrap();
        assert_eq!(encoded.ids, vec![2, 1, 3]);
    }

    #[test]
    fn baseline_token_must_exist() {
        let tokenizer = Tokenizer::from_str(FIXTURE).unwrap();
        let result = TextEncoder::new(tokenizer, 512, "<mask>");
        assert!(matches!(result, Err(FilterError::ModelLoad { .. })));
        assert_eq!(encoder(512).baseline_id(), 4);
    }
}
