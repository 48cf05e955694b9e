//! Configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (nested keys split on `__`, e.g. `APP_RAG__BATCH_SIZE`).
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::default("rag", RagSettings::default()))
            .merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        tracing::debug!(env = %env_name, "configuration loaded");
        Ok(Self { figment })
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// The `[rag]` table, with paths expanded and invariants checked.
    pub fn settings(&self) -> Result<RagSettings> {
        let settings: RagSettings = self
            .figment
            .extract_inner("rag")
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        let settings = settings.expanded();
        settings.validate()?;
        Ok(settings)
    }
}

/// Recognized options of the retrieval pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    pub corpus_path: PathBuf,
    pub embedding_model: String,
    pub rerank_model: String,
    /// Directory holding one subdirectory per model, named after the last
    /// segment of the model identifier.
    pub model_dir: PathBuf,
    pub index_path: PathBuf,
    pub meta_path: PathBuf,
    pub batch_size: usize,
    pub force_rebuild: bool,
    pub retrieval_top_k: usize,
    pub rerank_top_k: usize,
    pub use_reranker: bool,
    /// 0 disables the encoder timeout.
    pub encode_timeout_secs: u64,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            corpus_path: PathBuf::from("RAG/documents.json"),
            embedding_model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            rerank_model: "cross-encoder/ms-marco-MiniLM-L-6-v2".to_string(),
            model_dir: PathBuf::from("models"),
            index_path: PathBuf::from("rag.index"),
            meta_path: PathBuf::from("rag_meta.json"),
            batch_size: 32,
            force_rebuild: false,
            retrieval_top_k: 3,
            rerank_top_k: 3,
            use_reranker: true,
            encode_timeout_secs: 30,
        }
    }
}

impl RagSettings {
    /// Recall width must cover the rerank width, otherwise the reranker is
    /// silently under-supplied.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::InvalidConfig("batch_size must be positive".into()));
        }
        if self.retrieval_top_k == 0 || self.rerank_top_k == 0 {
            return Err(Error::InvalidConfig("top_k values must be positive".into()));
        }
        if self.retrieval_top_k < self.rerank_top_k {
            return Err(Error::InvalidConfig(format!(
                "retrieval_top_k ({}) must be >= rerank_top_k ({})",
                self.retrieval_top_k, self.rerank_top_k
            )));
        }
        Ok(())
    }

    pub fn encode_timeout(&self) -> Option<Duration> {
        (self.encode_timeout_secs > 0).then(|| Duration::from_secs(self.encode_timeout_secs))
    }

    pub fn embedding_model_dir(&self) -> PathBuf {
        model_subdir(&self.model_dir, &self.embedding_model)
    }

    pub fn rerank_model_dir(&self) -> PathBuf {
        model_subdir(&self.model_dir, &self.rerank_model)
    }

    fn expanded(mut self) -> Self {
        for p in [&mut self.corpus_path, &mut self.model_dir, &mut self.index_path, &mut self.meta_path] {
            let expanded = expand_path(p.to_string_lossy());
            *p = expanded;
        }
        self
    }
}

fn model_subdir(root: &Path, model_id: &str) -> PathBuf {
    let name = model_id.rsplit('/').next().unwrap_or(model_id);
    root.join(name)
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    // Expand env vars first
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    // Expand ~ at start
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
