use std::sync::Arc;

use hiverag_core::traits::Embedder;
use hiverag_core::{Candidate, Document, Error, Result};

use crate::shared::SharedCorpus;

pub const DEFAULT_K: usize = 3;

/// First stage: encode the query and take the nearest documents.
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    corpus: SharedCorpus,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, corpus: SharedCorpus) -> Self {
        Self { embedder, corpus }
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    pub fn corpus(&self) -> &SharedCorpus {
        &self.corpus
    }

    pub fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Document>> {
        Ok(self.retrieve_candidates(query, k)?.into_iter().map(|c| c.document).collect())
    }

    /// Nearest-first candidates with their distances.
    pub fn retrieve_candidates(&self, query: &str, k: usize) -> Result<Vec<Candidate>> {
        let corpus = self.corpus.snapshot();
        if corpus.is_empty() {
            return Ok(Vec::new());
        }
        let mut vectors = self.embedder.embed_batch(&[query.to_string()])?;
        if vectors.len() != 1 {
            return Err(Error::Encoding(format!("encoder returned {} vectors for one query", vectors.len())));
        }
        let query_vec = vectors.swap_remove(0);
        let candidates = corpus.search(&query_vec, k)?;
        tracing::debug!(k, hits = candidates.len(), "retrieved");
        Ok(candidates)
    }
}
