//! Second-stage reranking: score every `(query, candidate)` pair with a
//! pairwise relevance model and keep the best `top_k`.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use hiverag_core::traits::PairScorer;
use hiverag_core::{Document, Error, RankedResult, Result};

pub mod cross_encoder;

pub use cross_encoder::CrossEncoder;

pub const DEFAULT_TOP_K: usize = 3;

/// Long-lived reranker; the scorer behind it is loaded once.
#[derive(Clone)]
pub struct Reranker {
    scorer: Arc<dyn PairScorer>,
}

impl Reranker {
    pub fn new(scorer: Arc<dyn PairScorer>) -> Self {
        Self { scorer }
    }

    pub fn model_id(&self) -> &str {
        self.scorer.model_id()
    }

    pub fn rerank(&self, query: &str, candidates: &[Document], top_k: usize) -> Result<Vec<Document>> {
        Ok(self.rerank_scored(query, candidates, top_k)?.into_iter().map(|r| r.document).collect())
    }

    /// Candidates sorted by descending score, truncated to `top_k`.
    ///
    /// The sort is stable: equal scores keep the incoming (nearest-first)
    /// order. An empty candidate list never reaches the model.
    pub fn rerank_scored(&self, query: &str, candidates: &[Document], top_k: usize) -> Result<Vec<RankedResult>> {
        if candidates.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        let contents: Vec<&str> = candidates.iter().map(|d| d.content.as_str()).collect();
        let scores = self.scorer.score_pairs(query, &contents)?;
        if scores.len() != candidates.len() {
            return Err(Error::RerankModel(format!(
                "scorer returned {} scores for {} candidates",
                scores.len(),
                candidates.len()
            )));
        }
        if let Some(bad) = scores.iter().find(|s| s.is_nan()) {
            return Err(Error::RerankModel(format!("scorer returned non-numeric score {bad}")));
        }
        let mut ranked: Vec<RankedResult> = candidates
            .iter()
            .cloned()
            .zip(scores)
            .map(|(document, score)| RankedResult { document, score })
            .collect();
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked.truncate(top_k);
        tracing::debug!(candidates = candidates.len(), kept = ranked.len(), "reranked");
        Ok(ranked)
    }
}

/// Deterministic lexical scorer for tests and development: the fraction of
/// distinct query terms that occur in the document.
pub struct FakeScorer;

impl FakeScorer {
    fn terms(text: &str) -> HashSet<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.len() > 2)
            .map(str::to_lowercase)
            .collect()
    }
}

impl PairScorer for FakeScorer {
    fn model_id(&self) -> &str { "fake:lexical" }

    fn score_pairs(&self, query: &str, documents: &[&str]) -> Result<Vec<f32>> {
        let query_terms = Self::terms(query);
        if query_terms.is_empty() {
            return Ok(vec![0.0; documents.len()]);
        }
        Ok(documents
            .iter()
            .map(|doc| {
                let doc_terms = Self::terms(doc);
                query_terms.intersection(&doc_terms).count() as f32 / query_terms.len() as f32
            })
            .collect())
    }
}

pub fn use_fake_reranker() -> bool {
    std::env::var("APP_USE_FAKE_RERANKER").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

/// The cross-encoder named by the settings, or the fake scorer when
/// `APP_USE_FAKE_RERANKER` is set.
pub fn get_default_scorer(model_dir: &Path, model_id: &str) -> Result<Arc<dyn PairScorer>> {
    if use_fake_reranker() { tracing::info!("using FakeScorer"); return Ok(Arc::new(FakeScorer)); }
    let model = CrossEncoder::load(model_dir, model_id).map_err(|e| Error::RerankModel(format!("{e:#}")))?;
    Ok(Arc::new(model))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns fixed scores and counts how often it is called.
    struct ScriptedScorer {
        scores: Vec<f32>,
        calls: AtomicUsize,
    }

    impl ScriptedScorer {
        fn new(scores: &[f32]) -> Arc<Self> {
            Arc::new(Self { scores: scores.to_vec(), calls: AtomicUsize::new(0) })
        }
    }

    impl PairScorer for ScriptedScorer {
        fn model_id(&self) -> &str { "scripted" }
        fn score_pairs(&self, _query: &str, documents: &[&str]) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.scores.iter().copied().take(documents.len()).collect())
        }
    }

    struct BrokenScorer;

    impl PairScorer for BrokenScorer {
        fn model_id(&self) -> &str { "broken" }
        fn score_pairs(&self, _query: &str, _documents: &[&str]) -> Result<Vec<f32>> {
            Err(Error::RerankModel("weights missing".into()))
        }
    }

    fn abc() -> Vec<Document> {
        vec![Document::new("A", "a"), Document::new("B", "b"), Document::new("C", "c")]
    }

    fn titles(docs: &[Document]) -> Vec<&str> {
        docs.iter().map(|d| d.title.as_str()).collect()
    }

    #[test]
    fn equal_scores_keep_incoming_order() {
        let reranker = Reranker::new(ScriptedScorer::new(&[0.5, 0.5, 0.9]));
        let out = reranker.rerank("q", &abc(), 3).unwrap();
        assert_eq!(titles(&out), vec!["C", "A", "B"]);
    }

    #[test]
    fn truncates_to_top_k() {
        let reranker = Reranker::new(ScriptedScorer::new(&[0.1, 0.7, 0.4]));
        let out = reranker.rerank_scored("q", &abc(), 2).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].document.title, "B");
        assert_eq!(out[1].document.title, "C");
        assert!(out[0].score >= out[1].score);
    }

    #[test]
    fn fewer_candidates_than_top_k_returns_all() {
        let reranker = Reranker::new(ScriptedScorer::new(&[0.2, 0.8, 0.5]));
        let out = reranker.rerank("q", &abc(), 10).unwrap();
        assert_eq!(titles(&out), vec!["B", "C", "A"]);
    }

    #[test]
    fn empty_candidates_skip_the_model() {
        let scorer = ScriptedScorer::new(&[]);
        let reranker = Reranker::new(scorer.clone());
        assert!(reranker.rerank("q", &[], 3).unwrap().is_empty());
        assert_eq!(scorer.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn scorer_is_called_once_per_rerank() {
        let scorer = ScriptedScorer::new(&[0.3, 0.2, 0.1]);
        let reranker = Reranker::new(scorer.clone());
        reranker.rerank("q", &abc(), 3).unwrap();
        assert_eq!(scorer.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn model_failures_and_bad_output_propagate() {
        let broken = Reranker::new(Arc::new(BrokenScorer));
        assert!(matches!(broken.rerank("q", &abc(), 3), Err(Error::RerankModel(_))));

        let short = Reranker::new(ScriptedScorer::new(&[0.5]));
        assert!(matches!(short.rerank("q", &abc(), 3), Err(Error::RerankModel(_))));

        let nan = Reranker::new(ScriptedScorer::new(&[0.5, f32::NAN, 0.1]));
        assert!(matches!(nan.rerank("q", &abc(), 3), Err(Error::RerankModel(_))));
    }

    #[test]
    fn model_id_comes_from_the_scorer() {
        assert_eq!(Reranker::new(Arc::new(FakeScorer)).model_id(), "fake:lexical");
        assert_eq!(Reranker::new(ScriptedScorer::new(&[])).model_id(), "scripted");
    }

    #[test]
    fn fake_scorer_counts_shared_terms() {
        let scores = FakeScorer
            .score_pairs("improve my beekeeping", &["Beekeeping tips to improve yields", "Garden roses", "beekeeping"])
            .unwrap();
        // "my" is too short to count, leaving two query terms.
        assert_eq!(scores, vec![1.0, 0.0, 0.5]);
    }
}
