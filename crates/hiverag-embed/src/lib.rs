use anyhow::{Result, anyhow};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::Tokenizer;

use hiverag_core::traits::Embedder;

pub mod device;
pub mod pool;
pub mod timeout;
pub mod tokenize;
pub mod weights;

pub use device::select_device;
pub use pool::masked_mean_l2;
pub use timeout::TimeoutEmbedder;
pub use weights::{load_weights, resolve_model_dir};

const MAX_LEN: usize = 256;

/// Sentence encoder: BERT forward pass, masked mean pooling, L2 normalization.
pub struct EmbeddingModel { model: BertModel, tokenizer: Tokenizer, device: Device, model_id: String, dim: usize }

impl EmbeddingModel {
    pub fn load(model_dir: &Path, model_id: &str) -> Result<Self> {
        let device = select_device();
        let model_dir = resolve_model_dir(model_dir)?;
        tracing::info!(model = model_id, dir = %model_dir.display(), "loading embedding model");
        let tokenizer = tokenize::load_tokenizer(&model_dir.join("tokenizer.json"), MAX_LEN)?;
        let config_path = model_dir.join("config.json");
        let config: BertConfig = serde_json::from_str(&std::fs::read_to_string(&config_path)?)
            .map_err(|e| anyhow!("Invalid model config {}: {}", config_path.display(), e))?;
        let dim = config.hidden_size;
        let weights = load_weights(&model_dir, &device)?;
        let vb = VarBuilder::from_tensors(weights, DType::F32, &device);
        let model = BertModel::load(vb, &config)?;
        tracing::info!(model = model_id, dim, max_len = MAX_LEN, "embedding model loaded");
        Ok(Self { model, tokenizer, device, model_id: model_id.to_string(), dim })
    }

    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let start = Instant::now();
        let batch = tokenize::tokenize_texts(&self.tokenizer, texts, &self.device)?;
        let hidden = self.model.forward(&batch.input_ids, &batch.token_type_ids, Some(&batch.attention_mask))?;
        let pooled = masked_mean_l2(&hidden, &batch.attention_mask)?;
        let vectors: Vec<Vec<f32>> = pooled.to_device(&Device::Cpu)?.to_vec2()?;
        tracing::debug!(texts = texts.len(), elapsed_ms = start.elapsed().as_millis() as u64, "encoded batch");
        Ok(vectors)
    }
}

impl Embedder for EmbeddingModel {
    fn model_id(&self) -> &str { &self.model_id }
    fn dim(&self) -> usize { self.dim }
    fn embed_batch(&self, texts: &[String]) -> hiverag_core::Result<Vec<Vec<f32>>> {
        if texts.is_empty() { return Ok(Vec::new()); }
        let vectors = self.encode(texts).map_err(|e| hiverag_core::Error::Encoding(format!("{e:#}")))?;
        check_shape(&vectors, texts.len(), self.dim)?;
        Ok(vectors)
    }
}

fn check_shape(vectors: &[Vec<f32>], expected: usize, dim: usize) -> hiverag_core::Result<()> {
    if vectors.len() != expected {
        return Err(hiverag_core::Error::Encoding(format!("encoder returned {} vectors for {} texts", vectors.len(), expected)));
    }
    if let Some(v) = vectors.iter().find(|v| v.len() != dim) {
        return Err(hiverag_core::Error::Encoding(format!("dim mismatch: got {} expected {}", v.len(), dim)));
    }
    Ok(())
}

/// Deterministic bag-of-tokens encoder for tests and development.
///
/// Each lowercase alphanumeric token is hashed into a bucket; the vector is
/// L2-normalized, so texts sharing words land close together.
pub struct FakeEmbedder { dim: usize, model_id: String }

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim, model_id: format!("fake:d{dim}") } }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher}; use twox_hash::XxHash64;
        let mut v = vec![0f32; self.dim];
        let tokens = text.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty());
        for token in tokens {
            let token = token.to_lowercase();
            let mut hasher = XxHash64::with_seed(0); token.hash(&mut hasher); let h = hasher.finish();
            let idx = (h % self.dim as u64) as usize;
            v[idx] += 0.5 + (((h >> 32) as u32) as f32) / (u32::MAX as f32);
        }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6); for x in &mut v { *x /= norm; }
        v
    }
}

impl Embedder for FakeEmbedder {
    fn model_id(&self) -> &str { &self.model_id }
    fn dim(&self) -> usize { self.dim }
    fn embed_batch(&self, texts: &[String]) -> hiverag_core::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// Dimension of the fake encoder; matches all-MiniLM-L6-v2.
pub const FAKE_DIM: usize = 384;

pub fn use_fake_embeddings() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

/// The encoder named by the settings, or the fake one when
/// `APP_USE_FAKE_EMBEDDINGS` is set.
pub fn get_default_embedder(model_dir: &Path, model_id: &str) -> hiverag_core::Result<Arc<dyn Embedder>> {
    if use_fake_embeddings() { tracing::info!("using FakeEmbedder"); return Ok(Arc::new(FakeEmbedder::new(FAKE_DIM))); }
    let model = EmbeddingModel::load(model_dir, model_id).map_err(|e| hiverag_core::Error::Encoding(format!("{e:#}")))?;
    Ok(Arc::new(model))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_check_rejects_wrong_count_and_dim() {
        assert!(check_shape(&[vec![0.0; 4]], 1, 4).is_ok());
        assert!(matches!(check_shape(&[vec![0.0; 4]], 2, 4), Err(hiverag_core::Error::Encoding(_))));
        assert!(matches!(check_shape(&[vec![0.0; 3]], 1, 4), Err(hiverag_core::Error::Encoding(_))));
    }

    #[test]
    fn fake_embedder_ignores_case_and_punctuation() {
        let e = FakeEmbedder::new(64);
        let a = e.embed_one("Beekeeping, hives!");
        let b = e.embed_one("beekeeping hives");
        assert_eq!(a, b);
    }
}
