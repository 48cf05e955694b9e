//! Two-stage retrieval service: vector recall followed by cross-encoder
//! reranking, behind one long-lived [`RagPipeline`] object.

use std::sync::{Arc, Mutex, PoisonError};

use hiverag_core::config::RagSettings;
use hiverag_core::traits::Embedder;
use hiverag_core::{Document, Error, Result};
use hiverag_embed::{get_default_embedder, TimeoutEmbedder};
use hiverag_index::{IndexManager, IndexedCorpus};
use hiverag_rerank::{get_default_scorer, Reranker};

pub mod context;
pub mod retriever;
pub mod shared;

pub use context::{build_context, preview};
pub use retriever::Retriever;
pub use shared::SharedCorpus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    /// Candidates fetched by the recall stage; raised to `top_k` when smaller.
    pub recall_k: usize,
    pub top_k: usize,
    pub use_reranker: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self { recall_k: retriever::DEFAULT_K, top_k: hiverag_rerank::DEFAULT_TOP_K, use_reranker: true }
    }
}

impl From<&RagSettings> for QueryOptions {
    fn from(s: &RagSettings) -> Self {
        Self { recall_k: s.retrieval_top_k, top_k: s.rerank_top_k, use_reranker: s.use_reranker }
    }
}

pub struct RagPipeline {
    retriever: Retriever,
    reranker: Reranker,
    manager: Option<IndexManager>,
    options: QueryOptions,
    /// Held for a whole rebuild: build, artifact writes and the swap.
    rebuild_lock: Mutex<()>,
}

impl RagPipeline {
    pub fn new(embedder: Arc<dyn Embedder>, reranker: Reranker, corpus: IndexedCorpus, options: QueryOptions) -> Self {
        Self {
            retriever: Retriever::new(embedder, SharedCorpus::new(corpus)),
            reranker,
            manager: None,
            options,
            rebuild_lock: Mutex::new(()),
        }
    }

    /// Where `rebuild` streams from and persists to.
    pub fn with_manager(mut self, manager: IndexManager) -> Self {
        self.manager = Some(manager);
        self
    }

    /// Load both models once, then load or build the index.
    pub fn open(settings: &RagSettings) -> Result<Self> {
        settings.validate()?;
        let embedder = get_default_embedder(&settings.embedding_model_dir(), &settings.embedding_model)?;
        let embedder = TimeoutEmbedder::wrap(embedder, settings.encode_timeout())?;
        let reranker = Reranker::new(get_default_scorer(&settings.rerank_model_dir(), &settings.rerank_model)?);
        let manager = IndexManager::from_settings(settings);
        let corpus = manager.load_or_build(embedder.as_ref(), settings.force_rebuild)?;
        tracing::info!(documents = corpus.len(), encoder = embedder.model_id(), reranker = reranker.model_id(), "pipeline ready");
        Ok(Self::new(embedder, reranker, corpus, QueryOptions::from(settings)).with_manager(manager))
    }

    pub fn options(&self) -> QueryOptions {
        self.options
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn reranker(&self) -> &Reranker {
        &self.reranker
    }

    pub fn corpus(&self) -> Arc<IndexedCorpus> {
        self.retriever.corpus().snapshot()
    }

    /// Query with the configured options.
    pub fn query(&self, text: &str) -> Result<Vec<Document>> {
        self.query_with(text, self.options.use_reranker, self.options.top_k)
    }

    /// Without the reranker the recall order is returned as is (cut to
    /// `top_k`). Reranker failures are returned, never papered over with the
    /// recall order.
    pub fn query_with(&self, text: &str, use_reranker: bool, top_k: usize) -> Result<Vec<Document>> {
        let recall_k = self.options.recall_k.max(top_k);
        let mut retrieved = self.retriever.retrieve(text, recall_k)?;
        if !use_reranker {
            retrieved.truncate(top_k);
            return Ok(retrieved);
        }
        self.reranker.rerank(text, &retrieved, top_k)
    }

    /// Rebuild from the corpus source and swap the result in. Queries keep
    /// using the previous corpus until the swap. Concurrent calls run one
    /// after another. Returns the new size.
    pub fn rebuild(&self) -> Result<usize> {
        let manager = self
            .manager
            .as_ref()
            .ok_or_else(|| Error::InvalidConfig("pipeline has no artifact location to rebuild into".into()))?;
        // A rebuild that panicked mid-save leaves a pair `load` rejects.
        let _writer = self.rebuild_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let corpus = manager.build(self.retriever.embedder().as_ref())?;
        let size = corpus.len();
        self.retriever.corpus().replace(corpus);
        tracing::info!(documents = size, "index rebuilt and swapped in");
        Ok(size)
    }
}
