//! On-disk format of the index artifact pair.
//!
//! Index file layout (little-endian):
//!
//! | field           | size            |
//! |-----------------|-----------------|
//! | magic           | 8 (`HVRGIDX\0`) |
//! | version         | u32             |
//! | dim             | u32             |
//! | count           | u64             |
//! | model id len    | u32             |
//! | model id        | utf-8 bytes     |
//! | metadata digest | 32 (blake3 of the metadata file) |
//! | vectors         | count*dim f32   |
//! | checksum        | 32 (blake3 of the vector bytes) |
//!
//! The metadata file is a pretty-printed JSON array of documents in index
//! order. The index header carries the digest of the exact metadata bytes
//! written by the same build, so an index paired with metadata from another
//! build is detected on load even when the document counts agree. Both files
//! are written to a temporary sibling and renamed into place.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use hiverag_core::{Document, Error, Result};

use crate::flat::VectorIndex;

const MAGIC: &[u8; 8] = b"HVRGIDX\0";
pub const FORMAT_VERSION: u32 = 2;
const DIGEST_LEN: usize = 32;

pub type Digest = [u8; DIGEST_LEN];

/// Contents of an index file.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredIndex {
    pub index: VectorIndex,
    /// Identifier of the encoder model that produced the vectors.
    pub model_id: String,
    /// Digest of the metadata file written alongside this index.
    pub metadata_digest: Digest,
}

pub fn digest(bytes: &[u8]) -> Digest {
    *blake3::hash(bytes).as_bytes()
}

pub fn write_index(path: &Path, index: &VectorIndex, model_id: &str, metadata_digest: &Digest) -> Result<()> {
    let dim = index.dim().unwrap_or(0);
    let dim32 = u32::try_from(dim).map_err(|_| Error::Encoding(format!("dimension {dim} too large to persist")))?;
    let model_bytes = model_id.as_bytes();
    write_atomically(path, |w| {
        let mut hasher = blake3::Hasher::new();
        w.write_all(MAGIC)?;
        w.write_all(&FORMAT_VERSION.to_le_bytes())?;
        w.write_all(&dim32.to_le_bytes())?;
        w.write_all(&(index.len() as u64).to_le_bytes())?;
        w.write_all(&(model_bytes.len() as u32).to_le_bytes())?;
        w.write_all(model_bytes)?;
        w.write_all(metadata_digest)?;
        for x in index.raw() {
            let bytes = x.to_le_bytes();
            hasher.update(&bytes);
            w.write_all(&bytes)?;
        }
        w.write_all(hasher.finalize().as_bytes())
    })
}

pub fn read_index(path: &Path) -> Result<StoredIndex> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let file_len = file.metadata().map_err(|e| Error::io(path, e))?.len();
    let mut r = BufReader::new(file);
    let corrupt = |what: &str| Error::CorruptIndex(format!("{}: {what}", path.display()));

    let mut magic = [0u8; 8];
    read_exact(&mut r, &mut magic, path)?;
    if &magic != MAGIC {
        return Err(corrupt("not an index file (bad magic)"));
    }
    let version = read_u32(&mut r, path)?;
    if version != FORMAT_VERSION {
        return Err(corrupt(&format!("unsupported format version {version}")));
    }
    let dim = read_u32(&mut r, path)? as u64;
    let count = read_u64(&mut r, path)?;
    let model_len = read_u32(&mut r, path)? as u64;

    let header_len = 8 + 4 + 4 + 8 + 4 + model_len + DIGEST_LEN as u64;
    let expected = count
        .checked_mul(dim)
        .and_then(|n| n.checked_mul(4))
        .and_then(|n| n.checked_add(header_len + DIGEST_LEN as u64));
    if expected != Some(file_len) {
        return Err(corrupt(&format!("file is {file_len} bytes, header describes {count} x {dim} vectors")));
    }
    if count > 0 && dim == 0 {
        return Err(corrupt("non-empty index with zero dimension"));
    }

    let mut model_bytes = vec![0u8; model_len as usize];
    read_exact(&mut r, &mut model_bytes, path)?;
    let model_id = String::from_utf8(model_bytes).map_err(|_| corrupt("model id is not utf-8"))?;
    let mut metadata_digest = [0u8; DIGEST_LEN];
    read_exact(&mut r, &mut metadata_digest, path)?;

    let mut payload = vec![0u8; (count * dim * 4) as usize];
    read_exact(&mut r, &mut payload, path)?;
    let mut checksum = [0u8; DIGEST_LEN];
    read_exact(&mut r, &mut checksum, path)?;
    if digest(&payload) != checksum {
        return Err(corrupt("checksum mismatch"));
    }

    let data = payload
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    Ok(StoredIndex { index: VectorIndex::from_raw(dim as usize, data), model_id, metadata_digest })
}

/// Serialize documents to the exact bytes [`write_metadata`] persists.
pub fn encode_metadata(documents: &[Document]) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec_pretty(documents)
        .map_err(|e| Error::Encoding(format!("cannot serialize metadata: {e}")))?;
    bytes.push(b'\n');
    Ok(bytes)
}

pub fn write_metadata(path: &Path, encoded: &[u8]) -> Result<()> {
    write_atomically(path, |w| w.write_all(encoded))
}

/// Returns the documents and the digest of the file they were read from.
pub fn read_metadata(path: &Path) -> Result<(Vec<Document>, Digest)> {
    let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
    let documents = serde_json::from_slice(&bytes)
        .map_err(|e| Error::CorruptIndex(format!("{}: invalid metadata: {e}", path.display())))?;
    Ok((documents, digest(&bytes)))
}

fn write_atomically<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<&File>) -> std::io::Result<()>,
{
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
    let tmp = tempfile::Builder::new()
        .prefix(".hiverag-")
        .tempfile_in(dir)
        .map_err(|e| Error::io(dir, e))?;
    {
        let mut w = BufWriter::new(tmp.as_file());
        write(&mut w).and_then(|()| w.flush()).map_err(|e| Error::io(path, e))?;
    }
    tmp.as_file().sync_all().map_err(|e| Error::io(path, e))?;
    tmp.persist(path).map_err(|e| Error::io(path, e.error))?;
    Ok(())
}

fn read_exact(r: &mut impl Read, buf: &mut [u8], path: &Path) -> Result<()> {
    r.read_exact(buf).map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => Error::CorruptIndex(format!("{}: truncated", path.display())),
        _ => Error::io(path, e),
    })
}

fn read_u32(r: &mut impl Read, path: &Path) -> Result<u32> {
    let mut b = [0u8; 4];
    read_exact(r, &mut b, path)?;
    Ok(u32::from_le_bytes(b))
}

fn read_u64(r: &mut impl Read, path: &Path) -> Result<u64> {
    let mut b = [0u8; 8];
    read_exact(r, &mut b, path)?;
    Ok(u64::from_le_bytes(b))
}
