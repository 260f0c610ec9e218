use docdiff_common::{Blake3Digest, DigestCacheKey, DigestKind, DocDiffError};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::sync::RwLock;

/// Compute the BLAKE3 digest of a file's raw bytes
pub fn raw_digest(path: &Path) -> Result<Blake3Digest, DocDiffError> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    let mut buffer = vec![0; 64 * 1024]; // 64KB buffer

    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hasher.finalize().into())
}

/// Compute the BLAKE3 digest of extractor-normalized text
pub fn text_digest(text: &str) -> Blake3Digest {
    blake3::hash(text.as_bytes()).into()
}

/// In-memory digest cache, scoped to a single comparison run.
///
/// Safe for concurrent reads and writes from the worker pool; created at
/// run start and dropped with the run, so digests never leak across runs.
#[derive(Default)]
pub struct DigestCache {
    inner: RwLock<HashMap<DigestCacheKey, Blake3Digest>>,
}

impl DigestCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &Path, kind: DigestKind) -> Option<Blake3Digest> {
        let key = DigestCacheKey {
            path: path.to_path_buf(),
            kind,
        };
        self.inner.read().ok()?.get(&key).copied()
    }

    pub fn put(&self, path: &Path, kind: DigestKind, digest: Blake3Digest) {
        let key = DigestCacheKey {
            path: path.to_path_buf(),
            kind,
        };
        if let Ok(mut cache) = self.inner.write() {
            cache.insert(key, digest);
        }
    }

    /// Memoized raw digest of a file. Only successful digests are cached;
    /// an I/O failure is returned each time it occurs.
    pub fn raw(&self, path: &Path) -> Result<Blake3Digest, DocDiffError> {
        if let Some(digest) = self.get(path, DigestKind::Raw) {
            return Ok(digest);
        }
        let digest = raw_digest(path)?;
        self.put(path, DigestKind::Raw, digest);
        Ok(digest)
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
