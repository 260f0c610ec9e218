use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Represents a single file discovered during a scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Path relative to the scan root; unique within one side
    pub relative_path: PathBuf,
    /// Resolved filesystem location, used only for I/O
    pub absolute_path: PathBuf,
    pub size: u64,
    pub kind: FileKind,
}

/// Classified file type, derived from the extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileKind {
    WordDocument,
    Presentation,
    Spreadsheet,
    Pdf,
    Other,
}

impl FileKind {
    /// Derive the kind from a path's extension (case-insensitive).
    pub fn from_path(path: &std::path::Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("doc") | Some("docx") => FileKind::WordDocument,
            Some("ppt") | Some("pptx") => FileKind::Presentation,
            Some("xlsx") => FileKind::Spreadsheet,
            Some("pdf") => FileKind::Pdf,
            _ => FileKind::Other,
        }
    }
}

/// BLAKE3 digest value (32 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Blake3Digest(pub [u8; 32]);

impl Blake3Digest {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<blake3::Hash> for Blake3Digest {
    fn from(hash: blake3::Hash) -> Self {
        Self(*hash.as_bytes())
    }
}

/// Which digest of a file a cache entry refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DigestKind {
    /// Digest of the unmodified byte stream
    Raw,
    /// Digest of extractor-normalized text
    Content,
}

/// Outcome of a content-digest request.
///
/// `Unsupported` is a recognized non-error: the kind has no registered
/// extractor (or the backend feature is disabled), so comparison for the
/// file relies solely on the raw digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentDigest {
    Digest(Blake3Digest),
    Unsupported,
}

/// Cache key for per-run digest memoization
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DigestCacheKey {
    pub path: PathBuf,
    pub kind: DigestKind,
}

/// Classification category for a matched pair of entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchCategory {
    /// Identical raw bytes, or identical extracted content
    Unchanged,
    /// Same relative path, differing content
    Modified,
    /// Differing relative path, identical raw bytes
    Renamed,
    /// Present only in the after tree
    Added,
    /// Present only in the before tree
    Deleted,
}

/// Outcome of classification for one relative path or content identity.
///
/// Added records carry only `after`; Deleted records carry only `before`;
/// every other category carries both sides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRecord {
    pub category: MatchCategory,
    pub before: Option<FileEntry>,
    pub after: Option<FileEntry>,
    /// Non-fatal per-file errors encountered while classifying this record
    pub warnings: Vec<String>,
}

impl MatchRecord {
    pub fn unchanged(before: FileEntry, after: FileEntry) -> Self {
        Self {
            category: MatchCategory::Unchanged,
            before: Some(before),
            after: Some(after),
            warnings: Vec::new(),
        }
    }

    pub fn modified(before: FileEntry, after: FileEntry) -> Self {
        Self {
            category: MatchCategory::Modified,
            before: Some(before),
            after: Some(after),
            warnings: Vec::new(),
        }
    }

    pub fn renamed(before: FileEntry, after: FileEntry) -> Self {
        Self {
            category: MatchCategory::Renamed,
            before: Some(before),
            after: Some(after),
            warnings: Vec::new(),
        }
    }

    pub fn added(after: FileEntry) -> Self {
        Self {
            category: MatchCategory::Added,
            before: None,
            after: Some(after),
            warnings: Vec::new(),
        }
    }

    pub fn deleted(before: FileEntry) -> Self {
        Self {
            category: MatchCategory::Deleted,
            before: Some(before),
            after: None,
            warnings: Vec::new(),
        }
    }

    pub fn with_warning(mut self, warning: String) -> Self {
        self.warnings.push(warning);
        self
    }

    /// The relative path shown for this record: the after side when
    /// present (renames report their new name), otherwise the before side.
    pub fn display_path(&self) -> Option<&std::path::Path> {
        self.after
            .as_ref()
            .or(self.before.as_ref())
            .map(|e| e.relative_path.as_path())
    }
}

/// The five classified buckets produced by a comparison run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub unchanged: Vec<MatchRecord>,
    pub modified: Vec<MatchRecord>,
    pub renamed: Vec<MatchRecord>,
    pub added: Vec<MatchRecord>,
    pub deleted: Vec<MatchRecord>,
}

/// Aggregate counts per bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketCounts {
    pub unchanged: usize,
    pub modified: usize,
    pub renamed: usize,
    pub added: usize,
    pub deleted: usize,
}

impl ComparisonResult {
    pub fn counts(&self) -> BucketCounts {
        BucketCounts {
            unchanged: self.unchanged.len(),
            modified: self.modified.len(),
            renamed: self.renamed.len(),
            added: self.added.len(),
            deleted: self.deleted.len(),
        }
    }

    /// Total number of records across all buckets
    pub fn len(&self) -> usize {
        self.unchanged.len()
            + self.modified.len()
            + self.renamed.len()
            + self.added.len()
            + self.deleted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate every record across all five buckets
    pub fn iter(&self) -> impl Iterator<Item = &MatchRecord> {
        self.unchanged
            .iter()
            .chain(self.modified.iter())
            .chain(self.renamed.iter())
            .chain(self.added.iter())
            .chain(self.deleted.iter())
    }

    /// Records that have an after-side file available for copying
    /// (everything except Deleted)
    pub fn copyable(&self) -> impl Iterator<Item = &MatchRecord> {
        self.added
            .iter()
            .chain(self.modified.iter())
            .chain(self.renamed.iter())
            .chain(self.unchanged.iter())
    }
}

/// Status of a single copy request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CopyStatus {
    Copied,
    /// The record was not part of the user's selection
    Skipped,
    Failed,
}

/// Result of the copy operation for one requested relative path
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyOutcome {
    pub relative_path: PathBuf,
    pub destination: Option<PathBuf>,
    pub status: CopyStatus,
    pub bytes_copied: u64,
    pub error: Option<String>,
}

/// Stage a progress event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStage {
    Classify,
    Copy,
}

/// Discrete progress event emitted while a long-running operation works
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub stage: ProgressStage,
    pub processed: usize,
    pub total: usize,
    pub current: PathBuf,
}

impl ProgressEvent {
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            (self.processed as f64 / self.total as f64) * 100.0
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Ignore patterns (e.g., "*.tmp", "node_modules/")
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// Whether to follow symbolic links
    #[serde(default)]
    pub follow_symlinks: bool,

    /// Worker pool size for hashing and extraction; 0 selects the
    /// number of available cores
    #[serde(default)]
    pub worker_threads: usize,

    /// Enable portable mode (config alongside binary)
    #[serde(default)]
    pub portable_mode: bool,
}
