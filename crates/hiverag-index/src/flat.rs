//! Exact nearest-neighbor index over dense vectors.
//!
//! Vectors live in one contiguous row-major buffer; a vector's row number is
//! its position, which is also the key into the document metadata.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use hiverag_core::{Error, Position, Result, SearchHit};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorIndex {
    dim: Option<usize>,
    data: Vec<f32>,
    len: usize,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild an index from a raw row-major buffer (used by the artifact loader).
    pub(crate) fn from_raw(dim: usize, data: Vec<f32>) -> Self {
        if dim == 0 {
            return Self::default();
        }
        let len = data.len() / dim;
        Self { dim: Some(dim), data, len }
    }

    pub(crate) fn raw(&self) -> &[f32] {
        &self.data
    }

    /// Fixed once the first non-empty batch is inserted.
    pub fn dim(&self) -> Option<usize> {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn vector(&self, position: Position) -> Option<&[f32]> {
        let dim = self.dim?;
        (position < self.len).then(|| &self.data[position * dim..(position + 1) * dim])
    }

    /// Append a batch in order. The whole batch is validated before anything
    /// is appended, so a failed insert leaves the index untouched.
    pub fn insert(&mut self, embeddings: &[Vec<f32>]) -> Result<()> {
        let Some(first) = embeddings.first() else { return Ok(()) };
        let dim = match self.dim {
            Some(d) => d,
            None if first.is_empty() => return Err(Error::Encoding("zero-length embedding".into())),
            None => first.len(),
        };
        if let Some((i, bad)) = embeddings.iter().enumerate().find(|(_, e)| e.len() != dim) {
            return Err(Error::Encoding(format!(
                "dimension mismatch at batch offset {i}: got {} expected {dim}",
                bad.len()
            )));
        }
        self.data.reserve(embeddings.len() * dim);
        for e in embeddings {
            self.data.extend_from_slice(e);
        }
        self.dim = Some(dim);
        self.len += embeddings.len();
        Ok(())
    }

    /// The `k` nearest positions by squared L2 distance, nearest first, ties
    /// broken by lower position. `k` is clamped to the index size.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        let Some(dim) = self.dim else { return Ok(Vec::new()) };
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != dim {
            return Err(Error::Encoding(format!("query dimension {} does not match index dimension {dim}", query.len())));
        }
        let k = k.min(self.len);
        let mut heap: BinaryHeap<Ranked> = BinaryHeap::with_capacity(k + 1);
        for (position, row) in self.data.chunks_exact(dim).enumerate() {
            let candidate = Ranked { distance: squared_l2(query, row), position };
            if heap.len() < k {
                heap.push(candidate);
            } else if heap.peek().is_some_and(|worst| candidate < *worst) {
                heap.pop();
                heap.push(candidate);
            }
        }
        Ok(heap
            .into_sorted_vec()
            .into_iter()
            .map(|r| SearchHit { position: r.position, distance: r.distance })
            .collect())
    }
}

pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Total order on (distance, position) so the heap keeps the `k` smallest.
#[derive(Debug, Clone, Copy)]
struct Ranked {
    distance: f32,
    position: Position,
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance.total_cmp(&other.distance).then(self.position.cmp(&other.position))
    }
}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}
