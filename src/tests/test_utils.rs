use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use tokenizers::Tokenizer;

use crate::classifier::SequenceClassifier;
use crate::config_loader::ExplainerConfig;
use crate::content_filter::{ContentFilter, DecisionPolicy};
use crate::encoding::{EncodedText, TextEncoder};
use crate::errors::{FilterError, FilterResult};
use crate::explainer::build_explainer;

const TOKENIZER_FIXTURE: &str = include_str!("../../tests/fixtures/tokenizer.json");

/// Two-class classifier over the fixture vocabulary: the "blocked" logit is
/// the sum of per-token weights, the "allowed" logit is 0.
pub struct KeywordClassifier {
    encoder: TextEncoder,
    weights: HashMap<u32, f32>,
    labels: Vec<String>,
    fail_tokenization: bool,
}

impl KeywordClassifier {
    pub fn new() -> Self {
        let tokenizer = Tokenizer::from_str(TOKENIZER_FIXTURE).expect("fixture tokenizer parses");
        let encoder = TextEncoder::new(tokenizer, 512, "[MASK]").expect("fixture encoder builds");
        // free, money, now, click, here
        let weights = HashMap::from([(7, 3.0), (8, 3.0), (9, 1.5), (10, 2.0), (11, 1.0)]);
        Self {
            encoder,
            weights,
            labels: vec!["allowed".to_string(), "blocked".to_string()],
            fail_tokenization: false,
        }
    }

    /// A classifier whose tokenizer always errors
    pub fn failing() -> Self {
        Self {
            fail_tokenization: true,
            ..Self::new()
        }
    }
}

impl SequenceClassifier for KeywordClassifier {
    fn model_id(&self) -> &str {
        "keyword-test"
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn encode(&self, text: &str) -> FilterResult<EncodedText> {
        if self.fail_tokenization {
            return Err(FilterError::tokenization("simulated tokenizer failure"));
        }
        self.encoder.encode(text)
    }

    fn baseline_token_id(&self) -> u32 {
        self.encoder.baseline_id()
    }

    fn logits_batch(&self, input_ids: &[Vec<u32>], _attention_mask: &[u32]) -> FilterResult<Vec<Vec<f32>>> {
        Ok(input_ids
            .iter()
            .map(|ids| {
                let score: f32 = ids.iter().filter_map(|id| self.weights.get(id)).sum();
                vec![0.0, score]
            })
            .collect())
    }
}

pub fn keyword_filter() -> ContentFilter {
    filter_with(KeywordClassifier::new(), ExplainerConfig::default())
}

pub fn filter_with(classifier: KeywordClassifier, explainer: ExplainerConfig) -> ContentFilter {
    ContentFilter::new(
        Arc::new(classifier),
        build_explainer(&explainer),
        DecisionPolicy::default(),
        explainer.batch_size,
    )
}
