//! Streaming reader for the corpus source.
//!
//! The corpus is a JSON array of `{ "title": ..., "content": ... }` objects.
//! [`DocumentStream`] walks the array framing by hand and hands each element
//! to `serde_json`, so only one document is materialized at a time and the
//! first document is available before the rest of the file has been read.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::types::Document;

/// `BufRead` adapter that tracks how many bytes have been consumed.
struct CountingReader<R> {
    inner: R,
    offset: u64,
}

impl<R: BufRead> Read for CountingReader<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let available = self.fill_buf()?;
        let n = available.len().min(out.len());
        out[..n].copy_from_slice(&available[..n]);
        self.consume(n);
        Ok(n)
    }
}

impl<R: BufRead> BufRead for CountingReader<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.inner.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.offset += amt as u64;
        self.inner.consume(amt);
    }
}

impl<R: BufRead> CountingReader<R> {
    /// Skip JSON whitespace and return the next byte without consuming it.
    fn peek_non_ws(&mut self) -> io::Result<Option<u8>> {
        loop {
            let buf = self.fill_buf()?;
            if buf.is_empty() {
                return Ok(None);
            }
            match buf.iter().position(|b| !b.is_ascii_whitespace()) {
                Some(skip) => {
                    let byte = buf[skip];
                    self.consume(skip);
                    return Ok(Some(byte));
                }
                None => {
                    let len = buf.len();
                    self.consume(len);
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    First,
    Next,
    Done,
}

/// Lazy, finite, single-pass sequence of corpus documents.
///
/// Yields `Err(Error::CorpusParse)` once on malformed input and then stops.
/// Documents yielded before the error are not retracted.
pub struct DocumentStream<R> {
    reader: CountingReader<R>,
    state: State,
    item: usize,
}

impl DocumentStream<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::CorpusParse {
            item: 0,
            offset: 0,
            message: format!("cannot open {}: {e}", path.display()),
        })?;
        tracing::debug!(path = %path.display(), "streaming corpus");
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> DocumentStream<R> {
    pub fn new(reader: R) -> Self {
        Self { reader: CountingReader { inner: reader, offset: 0 }, state: State::Start, item: 0 }
    }

    /// Number of documents yielded so far.
    pub fn items_read(&self) -> usize {
        self.item
    }

    fn fail(&mut self, message: impl Into<String>) -> Error {
        self.state = State::Done;
        Error::CorpusParse { item: self.item, offset: self.reader.offset, message: message.into() }
    }

    fn peek(&mut self) -> Result<Option<u8>> {
        match self.reader.peek_non_ws() {
            Ok(b) => Ok(b),
            Err(e) => Err(self.fail(format!("read failed: {e}"))),
        }
    }

    fn advance(&mut self) -> Result<Option<Document>> {
        loop {
            match self.state {
                State::Done => return Ok(None),
                State::Start => match self.peek()? {
                    Some(b'[') => {
                        self.reader.consume(1);
                        self.state = State::First;
                    }
                    Some(other) => {
                        return Err(self.fail(format!("expected '[' at start of corpus, found '{}'", other as char)))
                    }
                    None => return Err(self.fail("corpus source is empty")),
                },
                State::First => {
                    if self.peek()? == Some(b']') {
                        self.reader.consume(1);
                        return self.finish();
                    }
                    return self.element();
                }
                State::Next => match self.peek()? {
                    Some(b',') => {
                        self.reader.consume(1);
                        return self.element();
                    }
                    Some(b']') => {
                        self.reader.consume(1);
                        return self.finish();
                    }
                    Some(other) => {
                        return Err(self.fail(format!("expected ',' or ']' after item, found '{}'", other as char)))
                    }
                    None => return Err(self.fail("unexpected end of corpus inside array")),
                },
            }
        }
    }

    fn element(&mut self) -> Result<Option<Document>> {
        if self.peek()?.is_none() {
            return Err(self.fail("unexpected end of corpus inside array"));
        }
        let start = self.reader.offset;
        let parsed = {
            let mut de = serde_json::Deserializer::from_reader(&mut self.reader);
            Document::deserialize(&mut de)
        };
        match parsed {
            Ok(doc) => {
                self.item += 1;
                self.state = State::Next;
                Ok(Some(doc))
            }
            Err(e) => {
                self.state = State::Done;
                Err(Error::CorpusParse { item: self.item, offset: start, message: e.to_string() })
            }
        }
    }

    fn finish(&mut self) -> Result<Option<Document>> {
        match self.peek()? {
            None => {
                self.state = State::Done;
                Ok(None)
            }
            Some(other) => Err(self.fail(format!("trailing data after corpus array: '{}'", other as char))),
        }
    }
}

impl<R: BufRead> Iterator for DocumentStream<R> {
    type Item = Result<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        self.advance().transpose()
    }
}

impl<R: BufRead> std::iter::FusedIterator for DocumentStream<R> {}
