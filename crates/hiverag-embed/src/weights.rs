use anyhow::{Result, anyhow};
use candle_core::{Device, Tensor};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Read model weights from `model.safetensors`, falling back to a PyTorch
/// `pytorch_model.bin` checkpoint.
pub fn load_weights(model_dir: &Path, device: &Device) -> Result<HashMap<String, Tensor>> {
    let safetensors = model_dir.join("model.safetensors");
    if safetensors.exists() {
        tracing::debug!(path = %safetensors.display(), "loading safetensors weights");
        return Ok(candle_core::safetensors::load(&safetensors, device)?);
    }
    let pickle = model_dir.join("pytorch_model.bin");
    if pickle.exists() {
        tracing::debug!(path = %pickle.display(), "loading pytorch weights");
        let weights = candle_core::pickle::read_all(&pickle)?;
        return weights
            .into_iter()
            .map(|(name, t)| Ok((name, t.to_device(device)?)))
            .collect();
    }
    Err(anyhow!("No model.safetensors or pytorch_model.bin under {}", model_dir.display()))
}

pub fn resolve_model_dir(configured: &Path) -> Result<PathBuf> {
    if configured.join("config.json").exists() { return Ok(configured.to_path_buf()); }
    Err(anyhow!("Could not locate model directory {} (expected config.json inside)", configured.display()))
}
