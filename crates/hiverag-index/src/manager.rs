//! Load-or-build lifecycle of the persisted index artifact pair.

use std::path::{Path, PathBuf};

use hiverag_core::config::RagSettings;
use hiverag_core::corpus::DocumentStream;
use hiverag_core::traits::Embedder;
use hiverag_core::{Error, Result};

use crate::artifact;
use crate::builder::{IndexBuilder, DEFAULT_BATCH_SIZE};
use crate::store::IndexedCorpus;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub index: PathBuf,
    pub meta: PathBuf,
}

pub struct IndexManager {
    corpus_path: PathBuf,
    paths: ArtifactPaths,
    batch_size: usize,
    show_progress: bool,
}

impl IndexManager {
    pub fn new(corpus_path: impl Into<PathBuf>, paths: ArtifactPaths) -> Self {
        Self { corpus_path: corpus_path.into(), paths, batch_size: DEFAULT_BATCH_SIZE, show_progress: false }
    }

    pub fn from_settings(settings: &RagSettings) -> Self {
        Self::new(
            settings.corpus_path.clone(),
            ArtifactPaths { index: settings.index_path.clone(), meta: settings.meta_path.clone() },
        )
        .batch_size(settings.batch_size)
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn paths(&self) -> &ArtifactPaths {
        &self.paths
    }

    /// Load the persisted pair, or build (and persist) a fresh one.
    ///
    /// Without `force_rebuild`, finding only one half of the pair is fatal:
    /// it usually means a build crashed between the two writes.
    pub fn load_or_build(&self, embedder: &dyn Embedder, force_rebuild: bool) -> Result<IndexedCorpus> {
        if force_rebuild {
            tracing::info!("forced rebuild requested");
            return self.build(embedder);
        }
        match (self.paths.index.exists(), self.paths.meta.exists()) {
            (true, true) => self.load(embedder),
            (false, false) => {
                tracing::info!(index = %self.paths.index.display(), "no persisted index, building");
                self.build(embedder)
            }
            (index_exists, _) => {
                let (present, missing) = if index_exists {
                    (&self.paths.index, &self.paths.meta)
                } else {
                    (&self.paths.meta, &self.paths.index)
                };
                Err(Error::CorruptIndex(format!(
                    "incomplete artifact pair: {} exists but {} is missing; rebuild with force_rebuild",
                    present.display(),
                    missing.display()
                )))
            }
        }
    }

    pub fn load(&self, embedder: &dyn Embedder) -> Result<IndexedCorpus> {
        tracing::info!(index = %self.paths.index.display(), meta = %self.paths.meta.display(), "loading persisted index");
        let stored = artifact::read_index(&self.paths.index)?;
        let (documents, metadata_digest) = artifact::read_metadata(&self.paths.meta)?;
        if stored.metadata_digest != metadata_digest {
            return Err(Error::CorruptIndex(format!(
                "{} and {} were not written by the same build; rebuild with force_rebuild",
                self.paths.index.display(),
                self.paths.meta.display()
            )));
        }
        let corpus = IndexedCorpus::new(stored.index, documents, stored.model_id)?;
        if let Some(dim) = corpus.dim() {
            if dim != embedder.dim() {
                return Err(Error::CorruptIndex(format!(
                    "index dimension {dim} does not match encoder '{}' dimension {}",
                    embedder.model_id(),
                    embedder.dim()
                )));
            }
        }
        if corpus.model_id() != embedder.model_id() {
            tracing::warn!(
                index_model = corpus.model_id(),
                encoder_model = embedder.model_id(),
                "index was built with a different encoder model"
            );
        }
        tracing::info!(documents = corpus.len(), dim = ?corpus.dim(), "index loaded");
        Ok(corpus)
    }

    /// Stream the corpus, encode it in batches and persist the result.
    pub fn build(&self, embedder: &dyn Embedder) -> Result<IndexedCorpus> {
        tracing::info!(corpus = %self.corpus_path.display(), batch_size = self.batch_size, "building index");
        let stream = DocumentStream::open(&self.corpus_path)?;
        let corpus = IndexBuilder::new(embedder)
            .batch_size(self.batch_size)
            .show_progress(self.show_progress)
            .build(stream)?;
        self.save(&corpus)?;
        Ok(corpus)
    }

    /// Index first, metadata second. The index header records the digest of
    /// the metadata bytes, so a crash between the two writes leaves a pair
    /// that `load` rejects.
    pub fn save(&self, corpus: &IndexedCorpus) -> Result<()> {
        let metadata = artifact::encode_metadata(corpus.documents())?;
        let digest = artifact::digest(&metadata);
        artifact::write_index(&self.paths.index, corpus.index(), corpus.model_id(), &digest)?;
        artifact::write_metadata(&self.paths.meta, &metadata)?;
        tracing::debug!(index = %self.paths.index.display(), meta = %self.paths.meta.display(), "artifacts written");
        Ok(())
    }
}

/// Sibling paths `<dir>/rag.index` and `<dir>/rag_meta.json`.
pub fn default_paths(dir: &Path) -> ArtifactPaths {
    ArtifactPaths { index: dir.join("rag.index"), meta: dir.join("rag_meta.json") }
}
