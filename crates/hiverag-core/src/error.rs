use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Corpus parse error at item {item} (byte {offset}): {message}")]
    CorpusParse { item: usize, offset: u64, message: String },

    #[error("Encoding failed: {0}")]
    Encoding(String),

    #[error("Encoding timed out after {0:?}")]
    EncodingTimeout(Duration),

    #[error("Corrupt index: {0}")]
    CorruptIndex(String),

    #[error("Rerank model failed: {0}")]
    RerankModel(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    /// Only timeouts are worth retrying; every other variant is fatal to the
    /// build or query that raised it.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::EncodingTimeout(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_timeouts_are_retryable() {
        assert!(Error::EncodingTimeout(Duration::from_secs(1)).is_retryable());
        assert!(!Error::Encoding("boom".into()).is_retryable());
        assert!(!Error::CorruptIndex("size".into()).is_retryable());
        assert!(!Error::RerankModel("boom".into()).is_retryable());
    }

    #[test]
    fn corpus_parse_message_names_position() {
        let err = Error::CorpusParse { item: 4, offset: 120, message: "missing field `content`".into() };
        let msg = err.to_string();
        assert!(msg.contains("item 4"), "{msg}");
        assert!(msg.contains("byte 120"), "{msg}");
    }
}
