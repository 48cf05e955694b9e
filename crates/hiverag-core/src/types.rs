//! Domain types shared by the encoder, index, reranker and pipeline crates.

use std::fmt;

use serde::de::value::MapAccessDeserializer;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

/// Ingestion-order position of a document. The vector index and the
/// metadata store are joined on this value.
pub type Position = usize;

/// A corpus record.
///
/// Identity is implicit: a document's id is the position at which it was
/// ingested, so it carries no id field of its own. Only JSON objects are
/// accepted; `title` may be absent or null (it becomes empty) and `content`
/// is required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    pub title: String,
    pub content: String,
}

#[derive(Deserialize)]
struct DocumentRecord {
    #[serde(default)]
    title: Option<String>,
    content: String,
}

struct DocumentVisitor;

impl<'de> Visitor<'de> for DocumentVisitor {
    type Value = DocumentRecord;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a document object with a `content` field")
    }

    fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<DocumentRecord, A::Error> {
        DocumentRecord::deserialize(MapAccessDeserializer::new(map))
    }
}

impl<'de> Deserialize<'de> for Document {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let record = deserializer.deserialize_map(DocumentVisitor)?;
        Ok(Self { title: record.title.unwrap_or_default(), content: record.content })
    }
}

impl Document {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self { title: title.into(), content: content.into() }
    }
}

/// A raw index hit: position plus squared L2 distance (smaller is nearer).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    pub position: Position,
    pub distance: f32,
}

/// A search hit joined back to its document.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub document: Document,
    pub distance: f32,
}

/// A reranked document.
///
/// `score` is model-defined, higher is better, and only comparable within
/// the rerank call that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedResult {
    pub document: Document,
    pub score: f32,
}
