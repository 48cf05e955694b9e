use hiverag_core::{Candidate, Document, Error, Position, Result};

use crate::flat::VectorIndex;

/// A vector index together with the documents it was built from.
///
/// Position `i` in the index is document `i` in `documents`; construction
/// refuses any pair whose sizes disagree.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedCorpus {
    index: VectorIndex,
    documents: Vec<Document>,
    model_id: String,
}

impl IndexedCorpus {
    pub fn new(index: VectorIndex, documents: Vec<Document>, model_id: impl Into<String>) -> Result<Self> {
        if index.len() != documents.len() {
            return Err(Error::CorruptIndex(format!(
                "index holds {} vectors but metadata holds {} documents",
                index.len(),
                documents.len()
            )));
        }
        Ok(Self { index, documents, model_id: model_id.into() })
    }

    pub fn empty(model_id: impl Into<String>) -> Self {
        Self { index: VectorIndex::new(), documents: Vec::new(), model_id: model_id.into() }
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn dim(&self) -> Option<usize> {
        self.index.dim()
    }

    /// A miss means index and metadata have drifted apart.
    pub fn document(&self, position: Position) -> Result<&Document> {
        self.documents.get(position).ok_or_else(|| {
            Error::CorruptIndex(format!("position {position} has no document ({} stored)", self.documents.len()))
        })
    }

    /// Nearest documents to an already-encoded query, nearest first.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Candidate>> {
        self.index
            .search(query, k)?
            .into_iter()
            .map(|hit| Ok(Candidate { document: self.document(hit.position)?.clone(), distance: hit.distance }))
            .collect()
    }

    pub(crate) fn push_batch(&mut self, embeddings: &[Vec<f32>], documents: &mut Vec<Document>) -> Result<()> {
        if embeddings.len() != documents.len() {
            return Err(Error::Encoding(format!(
                "encoder returned {} vectors for {} documents",
                embeddings.len(),
                documents.len()
            )));
        }
        self.index.insert(embeddings)?;
        self.documents.append(documents);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs(n: usize) -> Vec<Document> {
        (0..n).map(|i| Document::new(format!("t{i}"), format!("c{i}"))).collect()
    }

    #[test]
    fn size_mismatch_is_corrupt() {
        let mut idx = VectorIndex::new();
        idx.insert(&[vec![1.0], vec![2.0]]).unwrap();
        let err = IndexedCorpus::new(idx, docs(3), "m").unwrap_err();
        assert!(matches!(err, Error::CorruptIndex(_)));
    }

    #[test]
    fn search_joins_positions_to_documents() {
        let mut idx = VectorIndex::new();
        idx.insert(&[vec![0.0], vec![10.0], vec![1.0]]).unwrap();
        let corpus = IndexedCorpus::new(idx, docs(3), "m").unwrap();
        let hits = corpus.search(&[0.9], 2).unwrap();
        assert_eq!(hits[0].document.title, "t2");
        assert_eq!(hits[1].document.title, "t0");
        assert!(hits[0].distance <= hits[1].distance);
    }

    #[test]
    fn lookup_miss_is_corrupt() {
        let corpus = IndexedCorpus::empty("m");
        assert!(matches!(corpus.document(0), Err(Error::CorruptIndex(_))));
        assert!(corpus.search(&[1.0, 2.0], 3).unwrap().is_empty());
    }

    #[test]
    fn push_batch_keeps_lockstep() {
        let mut corpus = IndexedCorpus::empty("m");
        let mut batch = docs(2);
        corpus.push_batch(&[vec![1.0, 0.0], vec![0.0, 1.0]], &mut batch).unwrap();
        assert!(batch.is_empty(), "documents are moved into the corpus");
        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.index().len(), 2);

        let mut short = docs(2);
        assert!(matches!(corpus.push_batch(&[vec![1.0, 0.0]], &mut short), Err(Error::Encoding(_))));
        assert_eq!(corpus.len(), 2);
    }
}
