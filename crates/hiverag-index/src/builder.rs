use indicatif::{ProgressBar, ProgressStyle};

use hiverag_core::traits::Embedder;
use hiverag_core::{Document, Error, Result};

use crate::store::IndexedCorpus;

pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Streams documents through the encoder in fixed-size batches.
///
/// Only one batch of documents and embeddings is held at a time besides the
/// growing corpus itself.
pub struct IndexBuilder<'a> {
    embedder: &'a dyn Embedder,
    batch_size: usize,
    show_progress: bool,
    progress: Option<ProgressBar>,
}

impl<'a> IndexBuilder<'a> {
    pub fn new(embedder: &'a dyn Embedder) -> Self {
        Self { embedder, batch_size: DEFAULT_BATCH_SIZE, show_progress: false, progress: None }
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Report into an existing bar instead of creating one.
    pub fn progress_bar(mut self, pb: ProgressBar) -> Self {
        self.progress = Some(pb);
        self
    }

    pub fn build<I>(&self, documents: I) -> Result<IndexedCorpus>
    where
        I: IntoIterator<Item = Result<Document>>,
    {
        let pb = self.make_progress_bar();
        let mut corpus = IndexedCorpus::empty(self.embedder.model_id());
        let mut batch: Vec<Document> = Vec::with_capacity(self.batch_size);
        let mut batches = 0usize;
        for doc in documents {
            batch.push(doc?);
            if batch.len() >= self.batch_size {
                self.flush(&mut corpus, &mut batch)?;
                batches += 1;
                pb.set_position(corpus.len() as u64);
            }
        }
        if !batch.is_empty() {
            self.flush(&mut corpus, &mut batch)?;
            batches += 1;
            pb.set_position(corpus.len() as u64);
        }
        pb.finish_with_message(format!("{} documents embedded", corpus.len()));
        tracing::info!(documents = corpus.len(), batches, dim = ?corpus.dim(), "index built");
        Ok(corpus)
    }

    fn flush(&self, corpus: &mut IndexedCorpus, batch: &mut Vec<Document>) -> Result<()> {
        let texts: Vec<String> = batch.iter().map(|d| d.content.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts)?;
        tracing::debug!(size = texts.len(), offset = corpus.len(), "encoded batch");
        if let (Some(dim), Some(first)) = (corpus.dim(), embeddings.first()) {
            if first.len() != dim {
                return Err(Error::Encoding(format!("encoder switched dimension mid-stream: {} -> {}", dim, first.len())));
            }
        }
        corpus.push_batch(&embeddings, batch)
    }

    fn make_progress_bar(&self) -> ProgressBar {
        if let Some(pb) = &self.progress {
            return pb.clone();
        }
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {pos} documents embedded {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb
    }
}
