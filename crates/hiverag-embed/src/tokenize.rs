use anyhow::{Result, anyhow};
use candle_core::{Device, Tensor};
use tokenizers::{Encoding, Tokenizer, TruncationParams};

/// Token tensors for one batch, each shaped `[B, T]` where `T` is the longest
/// encoding in the batch.
pub struct TokenBatch {
    pub input_ids: Tensor,
    pub attention_mask: Tensor,
    pub token_type_ids: Tensor,
}

/// Load `tokenizer.json`, truncating to `max_len` and leaving padding to
/// [`pad_batch`].
pub fn load_tokenizer(path: &std::path::Path, max_len: usize) -> Result<Tokenizer> {
    let mut tokenizer = Tokenizer::from_file(path)
        .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", path.display(), e))?;
    tokenizer
        .with_truncation(Some(TruncationParams { max_length: max_len, ..Default::default() }))
        .map_err(|e| anyhow!("Failed to configure truncation: {}", e))?;
    tokenizer.with_padding(None);
    Ok(tokenizer)
}

pub fn pad_id(tokenizer: &Tokenizer) -> u32 {
    tokenizer.token_to_id("[PAD]").or_else(|| tokenizer.token_to_id("<pad>")).unwrap_or(0)
}

pub fn tokenize_texts(tokenizer: &Tokenizer, texts: &[String], device: &Device) -> Result<TokenBatch> {
    let encodings = texts
        .iter()
        .map(|t| tokenizer.encode(t.as_str(), true))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| anyhow!("Tokenization failed: {}", e))?;
    pad_batch(&encodings, pad_id(tokenizer), device)
}

/// Right-pad every encoding to the longest one and stack into tensors.
pub fn pad_batch(encodings: &[Encoding], pad_id: u32, device: &Device) -> Result<TokenBatch> {
    let batch = encodings.len();
    let max_len = encodings.iter().map(Encoding::len).max().unwrap_or(0).max(1);
    let mut ids = Vec::with_capacity(batch * max_len);
    let mut mask = Vec::with_capacity(batch * max_len);
    let mut types = Vec::with_capacity(batch * max_len);
    for enc in encodings {
        let pad = max_len - enc.len();
        ids.extend_from_slice(enc.get_ids());
        ids.extend(std::iter::repeat(pad_id).take(pad));
        mask.extend_from_slice(enc.get_attention_mask());
        mask.extend(std::iter::repeat(0u32).take(pad));
        types.extend_from_slice(enc.get_type_ids());
        types.extend(std::iter::repeat(0u32).take(pad));
    }
    Ok(TokenBatch {
        input_ids: Tensor::from_vec(ids, (batch, max_len), device)?,
        attention_mask: Tensor::from_vec(mask, (batch, max_len), device)?,
        token_type_ids: Tensor::from_vec(types, (batch, max_len), device)?,
    })
}
