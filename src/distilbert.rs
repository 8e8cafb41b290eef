//! DistilBERT sequence classifier on candle.
//!
//! Mirrors the layout of a Hugging Face `DistilBertForSequenceClassification`
//! checkpoint: the `distilbert` encoder, a `pre_classifier` projection with
//! ReLU, and a `classifier` head applied to the `[CLS]` hidden state. Base
//! checkpoints ship without the two head layers; those are initialized with
//! small random weights, as `transformers` does when a base checkpoint is
//! loaded as a classifier.

use candle_core::{DType, Device, IndexOp, Tensor};
use candle_nn::{Linear, Module, VarBuilder};
use candle_transformers::models::distilbert::{Config as DistilBertConfig, DistilBertModel};

use crate::classifier::SequenceClassifier;
use crate::config_loader::ModelConfig;
use crate::encoding::{EncodedText, TextEncoder};
use crate::errors::{FilterError, FilterResult};
use crate::model_store::ModelFiles;

const HEAD_INIT_STD: f32 = 0.02;

/// Pick the compute device named in the config.
pub fn select_device(name: &str) -> FilterResult<Device> {
    match name.to_ascii_lowercase().as_str() {
        "cpu" => Ok(Device::Cpu),
        "cuda" => Device::new_cuda(0)
            .map_err(|e| FilterError::model_load(format!("CUDA device unavailable: {e}"))),
        "metal" => Device::new_metal(0)
            .map_err(|e| FilterError::model_load(format!("Metal device unavailable: {e}"))),
        other => Err(FilterError::config(format!(
            "Unknown device '{other}', expected cpu, cuda or metal"
        ))),
    }
}

pub struct DistilBertClassifier {
    model_id: String,
    labels: Vec<String>,
    encoder: TextEncoder,
    model: DistilBertModel,
    pre_classifier: Linear,
    classifier: Linear,
    device: Device,
}

impl DistilBertClassifier {
    /// Load tokenizer, encoder weights and classification head. Slow; runs
    /// once at startup.
    pub fn load(files: &ModelFiles, config: &ModelConfig, baseline_token: &str) -> FilterResult<Self> {
        let device = select_device(&config.device)?;

        let config_str = std::fs::read_to_string(&files.config_path)
            .map_err(|e| FilterError::io(format!("reading {}", files.config_path.display()), e))?;
        let raw: serde_json::Value = serde_json::from_str(&config_str)
            .map_err(|e| FilterError::model_load(format!("Failed to parse model config: {e}")))?;
        let bert_config: DistilBertConfig = serde_json::from_str(&config_str)
            .map_err(|e| FilterError::model_load(format!("Unsupported DistilBERT config: {e}")))?;

        // `dim` is not exposed on the candle config
        let hidden_size = raw
            .get("dim")
            .or_else(|| raw.get("hidden_size"))
            .and_then(|v| v.as_u64())
            .unwrap_or(768) as usize;
        let max_positions = raw
            .get("max_position_embeddings")
            .and_then(|v| v.as_u64())
            .map(|v| v as usize)
            .unwrap_or(config.max_length);
        let max_length = config.max_length.min(max_positions);

        let encoder = TextEncoder::from_file(&files.tokenizer_path, max_length, baseline_token)?;

        // SAFETY: the weights file is memory-mapped and must not be modified
        // while the model is alive.
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[&files.weights_path], DType::F32, &device)
                .map_err(|e| FilterError::model_load(format!("Failed to load weights: {e}")))?
        };

        let encoder_vb = if vb.contains_tensor("distilbert.embeddings.word_embeddings.weight") {
            vb.pp("distilbert")
        } else {
            vb.clone()
        };
        let model = DistilBertModel::load(encoder_vb, &bert_config)
            .map_err(|e| FilterError::model_load(format!("Failed to build DistilBERT: {e}")))?;

        let num_labels = config.labels.len();
        let pre_classifier = load_or_init_linear(&vb, "pre_classifier", hidden_size, hidden_size, &device)?;
        let classifier = load_or_init_linear(&vb, "classifier", hidden_size, num_labels, &device)?;

        let model_id = config
            .local_dir
            .as_ref()
            .map(|dir| dir.display().to_string())
            .unwrap_or_else(|| config.repo_id.clone());

        tracing::info!(
            "Loaded DistilBERT classifier {} (hidden_size={}, max_length={}, labels={:?})",
            model_id,
            hidden_size,
            max_length,
            config.labels
        );

        Ok(Self {
            model_id,
            labels: config.labels.clone(),
            encoder,
            model,
            pre_classifier,
            classifier,
            device,
        })
    }

    fn forward_logits(&self, input_ids: &[Vec<u32>], attention_mask: &[u32]) -> FilterResult<Tensor> {
        let batch = input_ids.len();
        let seq_len = attention_mask.len();
        if let Some(bad) = input_ids.iter().find(|ids| ids.len() != seq_len) {
            return Err(FilterError::inference(format!(
                "sequence length {} does not match attention mask length {seq_len}",
                bad.len()
            )));
        }

        let ids = Tensor::from_vec(input_ids.concat(), (batch, seq_len), &self.device)?;

        // candle's DistilBERT fills positions whose mask value is 1 with -inf,
        // the inverse of the tokenizer's attention mask. Shaped to broadcast
        // over heads and query positions.
        let inverted: Vec<u8> = attention_mask.iter().map(|&m| u8::from(m == 0)).collect();
        let mask = Tensor::from_vec(inverted.repeat(batch), (batch, 1, 1, seq_len), &self.device)?;

        let hidden = self.model.forward(&ids, &mask)?;
        let cls = hidden.i((.., 0))?;
        let pooled = self.pre_classifier.forward(&cls)?.relu()?;
        Ok(self.classifier.forward(&pooled)?)
    }
}

impl SequenceClassifier for DistilBertClassifier {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn encode(&self, text: &str) -> FilterResult<EncodedText> {
        self.encoder.encode(text)
    }

    fn baseline_token_id(&self) -> u32 {
        self.encoder.baseline_id()
    }

    fn logits_batch(&self, input_ids: &[Vec<u32>], attention_mask: &[u32]) -> FilterResult<Vec<Vec<f32>>> {
        if input_ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.forward_logits(input_ids, attention_mask)?.to_vec2::<f32>()?)
    }

    fn probabilities_batch(
        &self,
        input_ids: &[Vec<u32>],
        attention_mask: &[u32],
    ) -> FilterResult<Vec<Vec<f32>>> {
        if input_ids.is_empty() {
            return Ok(Vec::new());
        }
        let logits = self.forward_logits(input_ids, attention_mask)?;
        Ok(candle_nn::ops::softmax_last_dim(&logits)?.to_vec2::<f32>()?)
    }
}

/// Load `<name>.weight`/`<name>.bias` when the checkpoint has them, otherwise
/// create a freshly initialized layer.
fn load_or_init_linear(
    vb: &VarBuilder,
    name: &str,
    in_dim: usize,
    out_dim: usize,
    device: &Device,
) -> FilterResult<Linear> {
    if vb.contains_tensor(&format!("{name}.weight")) {
        let linear = candle_nn::linear(in_dim, out_dim, vb.pp(name))
            .map_err(|e| FilterError::model_load(format!("Failed to load {name}: {e}")))?;
        tracing::info!("Loaded {name} from checkpoint ({in_dim} -> {out_dim})");
        return Ok(linear);
    }

    tracing::warn!(
        "Checkpoint has no {name} weights, initializing randomly ({in_dim} -> {out_dim}); \
         predictions are not meaningful until the head is fine-tuned"
    );
    let weight = Tensor::randn(0f32, HEAD_INIT_STD, (out_dim, in_dim), device)?;
    let bias = Tensor::zeros(out_dim, DType::F32, device)?;
    Ok(Linear::new(weight, Some(bias)))
}
