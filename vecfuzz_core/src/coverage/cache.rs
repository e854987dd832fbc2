use super::{Disassembler, DisassemblyError, EdgeSet};
use bincode::{
    Decode, Encode,
    config::{Configuration, Fixint, LittleEndian, NoLimit},
    error::{DecodeError, EncodeError},
};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Edge cache I/O error: {0}")]
    Io(String),
    #[error("Edge cache encoding error: {0}")]
    Encode(String),
    #[error("Edge cache decoding error: {0}")]
    Decode(String),
    #[error(transparent)]
    Disassembly(#[from] DisassemblyError),
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Io(err.to_string())
    }
}

impl From<EncodeError> for CacheError {
    fn from(err: EncodeError) -> Self {
        CacheError::Encode(err.to_string())
    }
}

impl From<DecodeError> for CacheError {
    fn from(err: DecodeError) -> Self {
        CacheError::Decode(err.to_string())
    }
}

/// On-disk image of the cache: MD5 digest of a binary to its edge addresses.
#[derive(Encode, Decode, Debug, Default, PartialEq)]
struct CacheFile {
    entries: Vec<([u8; 16], Vec<u64>)>,
}

/// Edge sets keyed by the MD5 digest of the binary they were extracted from.
///
/// Identical bytes always produce identical edges, so a binary is only
/// disassembled the first time it is seen. With a backing path the map is
/// loaded on open and written back by [`EdgeCache::save`].
#[derive(Debug, Default)]
pub struct EdgeCache {
    entries: HashMap<[u8; 16], EdgeSet>,
    path: Option<PathBuf>,
    dirty: bool,
}

impl EdgeCache {
    fn bincode_config() -> Configuration<LittleEndian, Fixint, NoLimit> {
        bincode::config::standard()
            .with_little_endian()
            .with_fixed_int_encoding()
    }

    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Opens a persistent cache. A missing or empty file starts an empty cache.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let path = path.into();
        let mut cache = Self {
            path: Some(path.clone()),
            ..Self::default()
        };
        if !path.exists() {
            return Ok(cache);
        }
        let bytes = fs::read(&path)?;
        if bytes.is_empty() {
            return Ok(cache);
        }
        let (file, _): (CacheFile, usize) =
            bincode::decode_from_slice(&bytes, Self::bincode_config())?;
        for (digest, addresses) in file.entries {
            cache.entries.insert(digest, EdgeSet::from_addresses(addresses));
        }
        tracing::debug!(path = %path.display(), binaries = cache.entries.len(), "Loaded edge cache");
        Ok(cache)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, binary_bytes: &[u8]) -> Option<&EdgeSet> {
        self.entries.get(&md5::compute(binary_bytes).0)
    }

    /// Returns the edges for `binary`, disassembling it only on a cache miss.
    pub fn edges_for(
        &mut self,
        binary: &Path,
        disassembler: &dyn Disassembler,
    ) -> Result<EdgeSet, CacheError> {
        let bytes = fs::read(binary)?;
        let digest = md5::compute(&bytes);
        if let Some(edges) = self.entries.get(&digest.0) {
            tracing::debug!(digest = %format!("{digest:x}"), "Edge cache hit");
            return Ok(edges.clone());
        }
        let listing = disassembler.disassemble(binary)?;
        let edges = EdgeSet::extract(&listing);
        self.entries.insert(digest.0, edges.clone());
        self.dirty = true;
        Ok(edges)
    }

    /// Writes the cache to its backing file if it changed. In-memory caches do nothing.
    pub fn save(&mut self) -> Result<(), CacheError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if !self.dirty {
            return Ok(());
        }
        let mut entries: Vec<([u8; 16], Vec<u64>)> = self
            .entries
            .iter()
            .map(|(digest, edges)| (*digest, edges.iter().collect()))
            .collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        let bytes = bincode::encode_to_vec(CacheFile { entries }, Self::bincode_config())?;
        fs::write(path, bytes)?;
        self.dirty = false;
        tracing::debug!(path = %path.display(), binaries = self.entries.len(), "Saved edge cache");
        Ok(())
    }
}
