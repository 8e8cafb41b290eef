//! Sequence classification seam.
//!
//! The filter talks to its model only through [`SequenceClassifier`], so the
//! DistilBERT backend in [`crate::distilbert`] and the lightweight
//! classifiers used in tests are interchangeable.

use crate::encoding::EncodedText;
use crate::errors::{FilterError, FilterResult};

pub trait SequenceClassifier: Send + Sync {
    /// Identifier of the loaded weights (hub repo or local directory)
    fn model_id(&self) -> &str;

    /// Class names, indexed like the probability vector
    fn labels(&self) -> &[String];

    fn encode(&self, text: &str) -> FilterResult<EncodedText>;

    /// Token id substituted for a token that is absent from a perturbed input
    fn baseline_token_id(&self) -> u32;

    /// Raw logits for a batch of equal-length id sequences sharing one
    /// attention mask. Returns one row per sequence.
    fn logits_batch(&self, input_ids: &[Vec<u32>], attention_mask: &[u32]) -> FilterResult<Vec<Vec<f32>>>;

    fn probabilities_batch(
        &self,
        input_ids: &[Vec<u32>],
        attention_mask: &[u32],
    ) -> FilterResult<Vec<Vec<f32>>> {
        Ok(self
            .logits_batch(input_ids, attention_mask)?
            .iter()
            .map(|row| softmax(row))
            .collect())
    }

    fn probabilities(&self, input: &EncodedText) -> FilterResult<Vec<f32>> {
        self.probabilities_batch(std::slice::from_ref(&input.ids), &input.attention_mask)?
            .into_iter()
            .next()
            .ok_or_else(|| FilterError::inference("model returned no rows for a single input"))
    }
}

/// Numerically stable softmax over one row of logits.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Index of the most probable class. Ties resolve to the lowest index.
pub fn argmax(probs: &[f32]) -> Option<usize> {
    probs
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (idx, &p)| match best {
            Some((_, bp)) if bp >= p => best,
            _ => Some((idx, p)),
        })
        .map(|(idx, _)| idx)
}
