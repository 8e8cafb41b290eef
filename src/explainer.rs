//! Token attribution for a black-box classifier.
//!
//! An [`Explainer`] receives an encoded input and a batch scoring callback
//! and returns one attribution score per token. Special tokens are never
//! perturbed and always score 0.0, so the output length always equals the
//! encoded length.
//!
//! - [`PermutationExplainer`] estimates Shapley values by sampling random
//!   token orderings. Within every sampled ordering the credits telescope,
//!   so the attributions always sum to `f(x) - f(baseline)`.
//! - [`OcclusionExplainer`] masks one token at a time.

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::config_loader::{ExplainerConfig, ExplainerMethod};
use crate::encoding::EncodedText;
use crate::errors::{FilterError, FilterResult};

/// Scores a batch of equal-length id sequences, returning one probability
/// row per sequence.
pub type BatchScorer<'a> = dyn Fn(&[Vec<u32>]) -> FilterResult<Vec<Vec<f32>>> + 'a;

pub trait Explainer: Send + Sync {
    fn method(&self) -> ExplainerMethod;

    /// Attribution of every position in `input` towards class `target`.
    fn explain(
        &self,
        input: &EncodedText,
        baseline_id: u32,
        target: usize,
        scorer: &BatchScorer<'_>,
    ) -> FilterResult<Vec<f32>>;
}

pub fn build_explainer(config: &ExplainerConfig) -> Box<dyn Explainer> {
    match config.method {
        ExplainerMethod::Permutation => Box::new(PermutationExplainer::new(config.samples, config.seed)),
        ExplainerMethod::Occlusion => Box::new(OcclusionExplainer),
    }
}

/// Score `variants` and pull out the `target` column.
fn target_scores(
    scorer: &BatchScorer<'_>,
    variants: &[Vec<u32>],
    target: usize,
) -> FilterResult<Vec<f32>> {
    let rows = scorer(variants)?;
    if rows.len() != variants.len() {
        return Err(FilterError::explanation(format!(
            "scorer returned {} rows for {} inputs",
            rows.len(),
            variants.len()
        )));
    }
    rows.iter()
        .map(|row| {
            row.get(target).copied().ok_or_else(|| {
                FilterError::explanation(format!(
                    "class index {target} out of range for {} classes",
                    row.len()
                ))
            })
        })
        .collect()
}

pub struct PermutationExplainer {
    samples: usize,
    seed: u64,
}

impl PermutationExplainer {
    pub fn new(samples: usize, seed: u64) -> Self {
        Self {
            samples: samples.max(1),
            seed,
        }
    }
}

impl Explainer for PermutationExplainer {
    fn method(&self) -> ExplainerMethod {
        ExplainerMethod::Permutation
    }

    fn explain(
        &self,
        input: &EncodedText,
        baseline_id: u32,
        target: usize,
        scorer: &BatchScorer<'_>,
    ) -> FilterResult<Vec<f32>> {
        let mut attributions = vec![0.0f32; input.len()];
        let mut order = input.feature_positions();
        if order.is_empty() {
            return Ok(attributions);
        }

        let mut baseline = input.ids.clone();
        for &pos in &order {
            baseline[pos] = baseline_id;
        }

        // Seeded per request so identical inputs explain identically
        let mut rng = StdRng::seed_from_u64(self.seed);
        for _ in 0..self.samples {
            order.shuffle(&mut rng);

            // variants[k] has the first k positions of `order` restored
            let mut variants = Vec::with_capacity(order.len() + 1);
            let mut current = baseline.clone();
            variants.push(current.clone());
            for &pos in &order {
                current[pos] = input.ids[pos];
                variants.push(current.clone());
            }

            let scores = target_scores(scorer, &variants, target)?;
            for (k, &pos) in order.iter().enumerate() {
                attributions[pos] += scores[k + 1] - scores[k];
            }
        }

        let n = self.samples as f32;
        attributions.iter_mut().for_each(|a| *a /= n);
        Ok(attributions)
    }
}

pub struct OcclusionExplainer;

impl Explainer for OcclusionExplainer {
    fn method(&self) -> ExplainerMethod {
        ExplainerMethod::Occlusion
    }

    fn explain(
        &self,
        input: &EncodedText,
        baseline_id: u32,
        target: usize,
        scorer: &BatchScorer<'_>,
    ) -> FilterResult<Vec<f32>> {
        let mut attributions = vec![0.0f32; input.len()];
        let positions = input.feature_positions();
        if positions.is_empty() {
            return Ok(attributions);
        }

        let mut variants = Vec::with_capacity(positions.len() + 1);
        variants.push(input.ids.clone());
        for &pos in &positions {
            let mut occluded = input.ids.clone();
            occluded[pos] = baseline_id;
            variants.push(occluded);
        }

        let scores = target_scores(scorer, &variants, target)?;
        for (k, &pos) in positions.iter().enumerate() {
            attributions[pos] = scores[0] - scores[k + 1];
        }
        Ok(attributions)
    }
}
