//! The filter itself: classify, explain, decide.
//!
//! A [`ContentFilter`] is built once at startup and shared read-only
//! between requests.

use std::sync::Arc;

use serde::Serialize;

use crate::classifier::{argmax, SequenceClassifier};
use crate::config_loader::{DecisionConfig, ExplainerMethod, FilterConfig};
use crate::distilbert::DistilBertClassifier;
use crate::encoding::EncodedText;
use crate::errors::{FilterError, FilterResult};
use crate::explainer::{build_explainer, Explainer};
use crate::model_store::ModelFiles;

/// Error text for requests that carry no text
pub const NO_TEXT_PROVIDED: &str = "No text provided";

/// Thresholding rule turning a probability vector into a block decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecisionPolicy {
    pub block_threshold: f32,
    pub blocked_index: usize,
}

impl DecisionPolicy {
    /// Blocked iff the blocked-class probability is strictly above the
    /// threshold. A missing class never blocks.
    pub fn is_blocked(&self, predictions: &[f32]) -> bool {
        predictions
            .get(self.blocked_index)
            .is_some_and(|&p| p > self.block_threshold)
    }
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        DecisionPolicy::from(&DecisionConfig::default())
    }
}

impl From<&DecisionConfig> for DecisionPolicy {
    fn from(config: &DecisionConfig) -> Self {
        Self {
            block_threshold: config.block_threshold,
            blocked_index: config.blocked_index,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterVerdict {
    pub predictions: Vec<f32>,
    pub explanation: Vec<f32>,
    pub blocked: bool,
}

pub struct ContentFilter {
    classifier: Arc<dyn SequenceClassifier>,
    explainer: Box<dyn Explainer>,
    policy: DecisionPolicy,
    batch_size: usize,
}

impl ContentFilter {
    pub fn new(
        classifier: Arc<dyn SequenceClassifier>,
        explainer: Box<dyn Explainer>,
        policy: DecisionPolicy,
        batch_size: usize,
    ) -> Self {
        Self {
            classifier,
            explainer,
            policy,
            batch_size: batch_size.max(1),
        }
    }

    /// Load DistilBERT from `files` and wire up the configured explainer.
    pub fn load(config: &FilterConfig, files: &ModelFiles) -> FilterResult<Self> {
        let classifier =
            DistilBertClassifier::load(files, &config.model, &config.explainer.baseline_token)?;

        Ok(Self::new(
            Arc::new(classifier),
            build_explainer(&config.explainer),
            DecisionPolicy::from(&config.decision),
            config.explainer.batch_size,
        ))
    }

    pub fn classifier(&self) -> &dyn SequenceClassifier {
        self.classifier.as_ref()
    }

    pub fn policy(&self) -> DecisionPolicy {
        self.policy
    }

    pub fn explainer_method(&self) -> ExplainerMethod {
        self.explainer.method()
    }

    /// Class probabilities for `text`.
    pub fn predict(&self, text: &str) -> FilterResult<Vec<f32>> {
        let encoded = self.encode(text)?;
        self.classifier.probabilities(&encoded)
    }

    /// Per-token attribution towards the predicted class of `text`.
    pub fn explain(&self, text: &str) -> FilterResult<Vec<f32>> {
        let encoded = self.encode(text)?;
        let predictions = self.classifier.probabilities(&encoded)?;
        self.explain_encoded(&encoded, &predictions)
    }

    /// Full verdict: probabilities, explanation and block decision.
    pub fn evaluate(&self, text: &str) -> FilterResult<FilterVerdict> {
        let encoded = self.encode(text)?;
        let predictions = self.classifier.probabilities(&encoded)?;
        let explanation = self.explain_encoded(&encoded, &predictions)?;
        let blocked = self.policy.is_blocked(&predictions);

        tracing::debug!(
            tokens = encoded.len(),
            blocked,
            "evaluated text with {} explainer",
            self.explainer.method().as_str()
        );

        Ok(FilterVerdict {
            predictions,
            explanation,
            blocked,
        })
    }

    // Empty text never reaches the model
    fn encode(&self, text: &str) -> FilterResult<EncodedText> {
        if text.is_empty() {
            return Err(FilterError::invalid_input(NO_TEXT_PROVIDED));
        }
        self.classifier.encode(text)
    }

    fn explain_encoded(&self, encoded: &EncodedText, predictions: &[f32]) -> FilterResult<Vec<f32>> {
        let target = argmax(predictions)
            .ok_or_else(|| FilterError::inference("model produced an empty prediction"))?;

        let mask = encoded.attention_mask.as_slice();
        let scorer = |batch: &[Vec<u32>]| -> FilterResult<Vec<Vec<f32>>> {
            let mut rows = Vec::with_capacity(batch.len());
            for chunk in batch.chunks(self.batch_size) {
                rows.extend(self.classifier.probabilities_batch(chunk, mask)?);
            }
            Ok(rows)
        };

        self.explainer
            .explain(encoded, self.classifier.baseline_token_id(), target, &scorer)
    }
}
