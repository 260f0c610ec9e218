use crate::build_worker_pool;
use crate::digest::DigestCache;
use crate::extract::ExtractorRegistry;
use crate::progress::{ProgressCounter, ProgressSink};
use docdiff_common::{
    Blake3Digest, ComparisonResult, ContentDigest, DigestKind, DocDiffError, FileEntry,
    MatchCategory, MatchRecord, ProgressStage,
};
use rayon::prelude::*;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// Classification engine for two scanned file sets.
///
/// Three passes of partition refinement: path matches first, then rename
/// detection over raw-digest identity, then the leftovers as added and
/// deleted. Digests are computed lazily on the worker pool and memoized
/// in a cache that lives exactly as long as one run.
pub struct ClassifyEngine {
    registry: ExtractorRegistry,
    worker_threads: usize,
}

impl ClassifyEngine {
    pub fn new() -> Self {
        Self {
            registry: ExtractorRegistry::with_defaults(),
            worker_threads: 0,
        }
    }

    pub fn from_config(config: &docdiff_common::AppConfig) -> Self {
        Self::new().with_worker_threads(config.worker_threads)
    }

    pub fn with_registry(mut self, registry: ExtractorRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Worker pool size; 0 selects the number of available cores.
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    pub fn classify(
        &self,
        before: Vec<FileEntry>,
        after: Vec<FileEntry>,
        sink: &dyn ProgressSink,
    ) -> Result<ComparisonResult, DocDiffError> {
        self.classify_with_cancel(before, after, sink, None)
    }

    /// Classify every entry of both sets into the five buckets.
    ///
    /// The result is a pure function of the two entry sets and the digest
    /// oracle: parallel completion order never changes bucket contents,
    /// only the interleaving of progress events.
    pub fn classify_with_cancel(
        &self,
        before: Vec<FileEntry>,
        after: Vec<FileEntry>,
        sink: &dyn ProgressSink,
        cancel: Option<&AtomicBool>,
    ) -> Result<ComparisonResult, DocDiffError> {
        info!(
            "Classifying {} before entries against {} after entries",
            before.len(),
            after.len()
        );

        let mut before = before;
        before.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

        let mut after_map: HashMap<PathBuf, FileEntry> = after
            .into_iter()
            .map(|e| (e.relative_path.clone(), e))
            .collect();

        let mut pairs = Vec::new();
        let mut leftover_before = Vec::new();
        for entry in before {
            match after_map.remove(&entry.relative_path) {
                Some(other) => pairs.push((entry, other)),
                None => leftover_before.push(entry),
            }
        }
        let mut leftover_after: Vec<FileEntry> = after_map.into_values().collect();
        leftover_after.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

        let total = pairs.len() + leftover_before.len() + leftover_after.len();
        let progress = ProgressCounter::new(sink, ProgressStage::Classify, total);
        let cache = DigestCache::new();
        let pool = build_worker_pool(self.worker_threads)?;

        // Pass 1: path matches
        let path_matches: Option<Vec<MatchRecord>> = pool.install(|| {
            pairs
                .par_iter()
                .map(|(before, after)| {
                    if is_cancelled(cancel) {
                        return None;
                    }
                    let record = self.classify_pair(&cache, before, after);
                    progress.tick(&before.relative_path);
                    Some(record)
                })
                .collect()
        });
        let path_matches = path_matches.ok_or(DocDiffError::Cancelled)?;

        // Pass 2: raw-digest identity over the leftovers
        let hashed_before = hash_leftovers(&pool, &cache, leftover_before, &progress, cancel)?;
        let hashed_after = hash_leftovers(&pool, &cache, leftover_after, &progress, cancel)?;

        // Group after-side leftovers by digest, preserving scan order
        // within each group for the ordinal pairing policy.
        let mut after_groups: HashMap<Blake3Digest, VecDeque<usize>> = HashMap::new();
        for (index, (_, digest)) in hashed_after.iter().enumerate() {
            if let Ok(digest) = digest {
                after_groups.entry(*digest).or_default().push_back(index);
            }
        }

        let mut renamed = Vec::new();
        let mut deleted = Vec::new();
        let mut claimed = vec![false; hashed_after.len()];

        for (entry, digest) in hashed_before {
            match digest {
                Ok(digest) => {
                    let paired = after_groups
                        .get_mut(&digest)
                        .and_then(|group| group.pop_front());
                    match paired {
                        Some(index) => {
                            claimed[index] = true;
                            renamed.push(MatchRecord::renamed(
                                entry,
                                hashed_after[index].0.clone(),
                            ));
                        }
                        None => deleted.push(MatchRecord::deleted(entry)),
                    }
                }
                // An unreadable leftover cannot join a rename group; it
                // surfaces as Deleted with the failure attached.
                Err(e) => {
                    deleted.push(MatchRecord::deleted(entry).with_warning(e.to_string()))
                }
            }
        }

        // Pass 3: whatever is still unmatched
        let mut added = Vec::new();
        for (index, (entry, digest)) in hashed_after.into_iter().enumerate() {
            if claimed[index] {
                continue;
            }
            match digest {
                Ok(_) => added.push(MatchRecord::added(entry)),
                Err(e) => added.push(MatchRecord::added(entry).with_warning(e.to_string())),
            }
        }

        let mut result = ComparisonResult::default();
        for record in path_matches {
            match record.category {
                MatchCategory::Unchanged => result.unchanged.push(record),
                _ => result.modified.push(record),
            }
        }
        result.renamed = renamed;
        result.deleted = deleted;
        result.added = added;

        let counts = result.counts();
        debug!(
            "Classified: {} unchanged, {} modified, {} renamed, {} added, {} deleted ({} digests cached)",
            counts.unchanged,
            counts.modified,
            counts.renamed,
            counts.added,
            counts.deleted,
            cache.len()
        );
        Ok(result)
    }

    /// Classify one path-matched pair: raw digests first, extracted
    /// content as the tie-breaker when the bytes differ.
    fn classify_pair(
        &self,
        cache: &DigestCache,
        before: &FileEntry,
        after: &FileEntry,
    ) -> MatchRecord {
        let raw_before = cache.raw(&before.absolute_path);
        let raw_after = cache.raw(&after.absolute_path);

        match (raw_before, raw_after) {
            (Ok(b), Ok(a)) if b == a => MatchRecord::unchanged(before.clone(), after.clone()),
            (Ok(_), Ok(_)) => self.classify_by_content(cache, before, after),
            (raw_before, raw_after) => {
                // A pair that exists on both sides but cannot be read on
                // one of them stays a path match; the raw comparison is
                // inconclusive, so the pair is reported Modified.
                let mut record = MatchRecord::modified(before.clone(), after.clone());
                if let Err(e) = raw_before {
                    record = record.with_warning(format!("before: {}", e));
                }
                if let Err(e) = raw_after {
                    record = record.with_warning(format!("after: {}", e));
                }
                record
            }
        }
    }

    /// Raw bytes differ; decide between a format-level difference
    /// (Unchanged) and a real content change (Modified).
    fn classify_by_content(
        &self,
        cache: &DigestCache,
        before: &FileEntry,
        after: &FileEntry,
    ) -> MatchRecord {
        // Content digests are only comparable between entries of the same
        // kind; a format change is never "same content renamed in place".
        if before.kind != after.kind {
            return MatchRecord::modified(before.clone(), after.clone());
        }

        let content_before = self.content_digest_cached(cache, before);
        let content_after = self.content_digest_cached(cache, after);

        match (content_before, content_after) {
            (Ok(ContentDigest::Digest(b)), Ok(ContentDigest::Digest(a))) if b == a => {
                MatchRecord::unchanged(before.clone(), after.clone())
            }
            // Differing content, or no content-level comparison possible:
            // the raw verdict (the bytes differ) stands.
            (Ok(_), Ok(_)) => MatchRecord::modified(before.clone(), after.clone()),
            (content_before, content_after) => {
                let mut record = MatchRecord::modified(before.clone(), after.clone());
                if let Err(e) = content_before {
                    record = record.with_warning(format!("before: {}", e));
                }
                if let Err(e) = content_after {
                    record = record.with_warning(format!("after: {}", e));
                }
                record
            }
        }
    }

    fn content_digest_cached(
        &self,
        cache: &DigestCache,
        entry: &FileEntry,
    ) -> Result<ContentDigest, DocDiffError> {
        if let Some(digest) = cache.get(&entry.absolute_path, DigestKind::Content) {
            return Ok(ContentDigest::Digest(digest));
        }
        let digest = self.registry.content_digest(&entry.absolute_path, entry.kind)?;
        if let ContentDigest::Digest(value) = digest {
            cache.put(&entry.absolute_path, DigestKind::Content, value);
        }
        Ok(digest)
    }
}

impl Default for ClassifyEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn is_cancelled(cancel: Option<&AtomicBool>) -> bool {
    cancel.map_or(false, |flag| flag.load(Ordering::Relaxed))
}

/// Compute raw digests for pass-2 candidates on the worker pool, keeping
/// scan order. Per-entry failures are carried alongside the entry rather
/// than aborting the run.
fn hash_leftovers(
    pool: &rayon::ThreadPool,
    cache: &DigestCache,
    entries: Vec<FileEntry>,
    progress: &ProgressCounter<'_>,
    cancel: Option<&AtomicBool>,
) -> Result<Vec<(FileEntry, Result<Blake3Digest, DocDiffError>)>, DocDiffError> {
    let hashed: Option<Vec<_>> = pool.install(|| {
        entries
            .into_par_iter()
            .map(|entry| {
                if is_cancelled(cancel) {
                    return None;
                }
                let digest = cache.raw(&entry.absolute_path);
                progress.tick(&entry.relative_path);
                Some((entry, digest))
            })
            .collect()
    });
    hashed.ok_or(DocDiffError::Cancelled)
}
