use anyhow::{Result, anyhow};
use std::path::Path;
use std::time::Instant;

use candle_core::{DType, Device, IndexOp, Tensor};
use candle_nn::{Linear, Module, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::Tokenizer;

use hiverag_core::traits::PairScorer;
use hiverag_embed::{load_weights, resolve_model_dir, select_device, tokenize};

const MAX_LEN: usize = 512;

/// BERT sequence-classification head over `[CLS] query [SEP] document [SEP]`.
///
/// Weights follow the `BertForSequenceClassification` layout used by the
/// ms-marco cross-encoders: encoder, tanh pooler over the `[CLS]` state, then
/// a linear classifier. Single-logit models are squashed with a sigmoid.
pub struct CrossEncoder {
    model: BertModel,
    pooler: Linear,
    classifier: Linear,
    tokenizer: Tokenizer,
    device: Device,
    model_id: String,
    num_labels: usize,
}

impl CrossEncoder {
    pub fn load(model_dir: &Path, model_id: &str) -> Result<Self> {
        let device = select_device();
        let model_dir = resolve_model_dir(model_dir)?;
        tracing::info!(model = model_id, dir = %model_dir.display(), "loading cross-encoder");
        let tokenizer = tokenize::load_tokenizer(&model_dir.join("tokenizer.json"), MAX_LEN)?;
        let raw_config = std::fs::read_to_string(model_dir.join("config.json"))?;
        let config: BertConfig = serde_json::from_str(&raw_config)?;
        let num_labels = serde_json::from_str::<serde_json::Value>(&raw_config)?
            .get("id2label")
            .and_then(|v| v.as_object())
            .map_or(1, |labels| labels.len().max(1));

        let weights = load_weights(&model_dir, &device)?;
        let vb = VarBuilder::from_tensors(weights, DType::F32, &device);
        let model = BertModel::load(vb.clone(), &config)?;
        let hidden = config.hidden_size;
        let pooler = candle_nn::linear(hidden, hidden, vb.pp("bert.pooler.dense"))
            .or_else(|_| candle_nn::linear(hidden, hidden, vb.pp("pooler.dense")))?;
        let classifier = candle_nn::linear(hidden, num_labels, vb.pp("classifier"))?;
        tracing::info!(model = model_id, num_labels, "cross-encoder loaded");
        Ok(Self { model, pooler, classifier, tokenizer, device, model_id: model_id.to_string(), num_labels })
    }

    fn predict(&self, query: &str, documents: &[&str]) -> Result<Vec<f32>> {
        let start = Instant::now();
        let encodings = documents
            .iter()
            .map(|doc| self.tokenizer.encode((query, *doc), true))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| anyhow!("Tokenization failed: {}", e))?;
        let batch = tokenize::pad_batch(&encodings, tokenize::pad_id(&self.tokenizer), &self.device)?;
        let hidden = self.model.forward(&batch.input_ids, &batch.token_type_ids, Some(&batch.attention_mask))?;
        let cls = hidden.i((.., 0))?;
        let pooled = self.pooler.forward(&cls)?.tanh()?;
        let logits = self.classifier.forward(&pooled)?;
        let scores = self.logits_to_scores(&logits)?;
        tracing::debug!(pairs = documents.len(), elapsed_ms = start.elapsed().as_millis() as u64, "scored pairs");
        Ok(scores)
    }

    fn logits_to_scores(&self, logits: &Tensor) -> Result<Vec<f32>> {
        let scores = if self.num_labels == 1 {
            candle_nn::ops::sigmoid(&logits.squeeze(1)?)?
        } else {
            // Probability of the last ("relevant") label.
            candle_nn::ops::softmax_last_dim(logits)?.i((.., self.num_labels - 1))?
        };
        Ok(scores.to_device(&Device::Cpu)?.to_vec1()?)
    }
}

impl PairScorer for CrossEncoder {
    fn model_id(&self) -> &str { &self.model_id }

    fn score_pairs(&self, query: &str, documents: &[&str]) -> hiverag_core::Result<Vec<f32>> {
        if documents.is_empty() { return Ok(Vec::new()); }
        self.predict(query, documents).map_err(|e| hiverag_core::Error::RerankModel(format!("{e:#}")))
    }
}
