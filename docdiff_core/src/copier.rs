use crate::build_worker_pool;
use crate::progress::{ProgressCounter, ProgressSink};
use docdiff_common::{
    ComparisonResult, CopyOutcome, CopyStatus, DocDiffError, MatchRecord, ProgressStage,
};
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Selective copy over a classification result.
///
/// Copies the after-side file of every selected record into a destination
/// root, preserving relative paths. Deleted records have no after-side
/// file and are not part of the copyable set.
pub struct Copier {
    worker_threads: usize,
    preserve_timestamps: bool,
}

impl Copier {
    pub fn new() -> Self {
        Self {
            worker_threads: 0,
            preserve_timestamps: true,
        }
    }

    pub fn from_config(config: &docdiff_common::AppConfig) -> Self {
        Self::new().with_worker_threads(config.worker_threads)
    }

    /// Worker pool size; 0 selects the number of available cores.
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    pub fn with_preserve_timestamps(mut self, preserve: bool) -> Self {
        self.preserve_timestamps = preserve;
        self
    }

    pub fn copy_selected(
        &self,
        result: &ComparisonResult,
        selection: &HashSet<PathBuf>,
        after_root: &Path,
        destination_root: &Path,
        sink: &dyn ProgressSink,
    ) -> Result<Vec<CopyOutcome>, DocDiffError> {
        self.copy_selected_with_cancel(result, selection, after_root, destination_root, sink, None)
    }

    /// Copy the selected subset; every copyable record yields one outcome.
    ///
    /// Intermediate directories are created as needed; an existing file at
    /// the destination is overwritten (last write wins). A per-file failure
    /// produces a Failed outcome for that file only.
    pub fn copy_selected_with_cancel(
        &self,
        result: &ComparisonResult,
        selection: &HashSet<PathBuf>,
        after_root: &Path,
        destination_root: &Path,
        sink: &dyn ProgressSink,
        cancel: Option<&AtomicBool>,
    ) -> Result<Vec<CopyOutcome>, DocDiffError> {
        // Destination root (local or network share) is created on demand;
        // failing to create it fails the whole operation, not per file.
        fs::create_dir_all(destination_root)?;

        let records: Vec<&MatchRecord> = result.copyable().collect();
        info!(
            "Copying up to {} of {} copyable files to {:?}",
            selection.len(),
            records.len(),
            destination_root
        );

        let progress = ProgressCounter::new(sink, ProgressStage::Copy, records.len());
        let pool = build_worker_pool(self.worker_threads)?;

        let outcomes: Option<Vec<CopyOutcome>> = pool.install(|| {
            records
                .par_iter()
                .map(|record| {
                    if cancel.map_or(false, |flag| flag.load(Ordering::Relaxed)) {
                        return None;
                    }
                    let outcome =
                        self.copy_record(record, selection, after_root, destination_root);
                    if let Some(path) = record.display_path() {
                        progress.tick(path);
                    }
                    Some(outcome)
                })
                .collect()
        });
        outcomes.ok_or(DocDiffError::Cancelled)
    }

    fn copy_record(
        &self,
        record: &MatchRecord,
        selection: &HashSet<PathBuf>,
        after_root: &Path,
        destination_root: &Path,
    ) -> CopyOutcome {
        let Some(entry) = record.after.as_ref() else {
            // Copyable buckets always carry an after side; a record
            // without one cannot be copied.
            return CopyOutcome {
                relative_path: record
                    .display_path()
                    .map(|p| p.to_path_buf())
                    .unwrap_or_default(),
                destination: None,
                status: CopyStatus::Failed,
                bytes_copied: 0,
                error: Some("no after-side file for this record".to_string()),
            };
        };

        let relative_path = entry.relative_path.clone();
        if !selection.contains(&relative_path) {
            return CopyOutcome {
                relative_path,
                destination: None,
                status: CopyStatus::Skipped,
                bytes_copied: 0,
                error: None,
            };
        }

        let source = after_root.join(&relative_path);
        let destination = destination_root.join(&relative_path);

        match self.copy_file(&source, &destination) {
            Ok(bytes) => {
                debug!("Copied {} bytes {:?} -> {:?}", bytes, source, destination);
                CopyOutcome {
                    relative_path,
                    destination: Some(destination),
                    status: CopyStatus::Copied,
                    bytes_copied: bytes,
                    error: None,
                }
            }
            Err(e) => {
                warn!("Copy failed for {:?}: {}", source, e);
                CopyOutcome {
                    relative_path,
                    destination: Some(destination),
                    status: CopyStatus::Failed,
                    bytes_copied: 0,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    fn copy_file(&self, source: &Path, destination: &Path) -> Result<u64, DocDiffError> {
        if let Some(parent) = destination.parent() {
            // Idempotent under concurrent creation by sibling workers
            fs::create_dir_all(parent)?;
        }

        let bytes = fs::copy(source, destination)?;

        if self.preserve_timestamps {
            if let Ok(metadata) = fs::metadata(source) {
                if let Ok(modified) = metadata.modified() {
                    let _ = filetime::set_file_mtime(
                        destination,
                        filetime::FileTime::from_system_time(modified),
                    );
                }
            }
        }

        Ok(bytes)
    }
}

impl Default for Copier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NullSink;
    use docdiff_common::{FileEntry, FileKind};
    use tempfile::TempDir;

    fn entry(root: &Path, rel: &str, size: u64) -> FileEntry {
        FileEntry {
            relative_path: PathBuf::from(rel),
            absolute_path: root.join(rel),
            size,
            kind: FileKind::from_path(Path::new(rel)),
        }
    }

    fn result_with_added(root: &Path, rels: &[&str]) -> ComparisonResult {
        let mut result = ComparisonResult::default();
        for rel in rels {
            result.added.push(MatchRecord::added(entry(root, rel, 0)));
        }
        result
    }

    #[test]
    fn test_copy_selected_creates_directories_and_preserves_layout() {
        let temp = TempDir::new().unwrap();
        let after = temp.path().join("after");
        let dest = temp.path().join("dest/nested");
        fs::create_dir_all(after.join("reports")).unwrap();
        fs::write(after.join("reports/q1.txt"), b"quarterly").unwrap();

        let result = result_with_added(&after, &["reports/q1.txt"]);
        let selection: HashSet<PathBuf> = [PathBuf::from("reports/q1.txt")].into();

        let outcomes = Copier::new()
            .copy_selected(&result, &selection, &after, &dest, &NullSink)
            .unwrap();

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].status, CopyStatus::Copied);
        assert_eq!(outcomes[0].bytes_copied, 9);
        assert_eq!(
            fs::read_to_string(dest.join("reports/q1.txt")).unwrap(),
            "quarterly"
        );
    }

    #[test]
    fn test_unselected_records_are_skipped() {
        let temp = TempDir::new().unwrap();
        let after = temp.path().join("after");
        let dest = temp.path().join("dest");
        fs::create_dir_all(&after).unwrap();
        fs::write(after.join("wanted.txt"), b"yes").unwrap();
        fs::write(after.join("ignored.txt"), b"no").unwrap();

        let result = result_with_added(&after, &["wanted.txt", "ignored.txt"]);
        let selection: HashSet<PathBuf> = [PathBuf::from("wanted.txt")].into();

        let outcomes = Copier::new()
            .copy_selected(&result, &selection, &after, &dest, &NullSink)
            .unwrap();

        assert_eq!(outcomes.len(), 2);
        let by_path: std::collections::HashMap<_, _> = outcomes
            .iter()
            .map(|o| (o.relative_path.to_str().unwrap(), o.status))
            .collect();
        assert_eq!(by_path["wanted.txt"], CopyStatus::Copied);
        assert_eq!(by_path["ignored.txt"], CopyStatus::Skipped);
        assert!(dest.join("wanted.txt").exists());
        assert!(!dest.join("ignored.txt").exists());
    }

    #[test]
    fn test_collision_overwrites_last_write_wins() {
        let temp = TempDir::new().unwrap();
        let after = temp.path().join("after");
        let dest = temp.path().join("dest");
        fs::create_dir_all(&after).unwrap();
        fs::create_dir_all(&dest).unwrap();
        fs::write(after.join("doc.txt"), b"fresh").unwrap();
        fs::write(dest.join("doc.txt"), b"stale destination copy").unwrap();

        let result = result_with_added(&after, &["doc.txt"]);
        let selection: HashSet<PathBuf> = [PathBuf::from("doc.txt")].into();

        let outcomes = Copier::new()
            .copy_selected(&result, &selection, &after, &dest, &NullSink)
            .unwrap();

        assert_eq!(outcomes[0].status, CopyStatus::Copied);
        assert_eq!(fs::read_to_string(dest.join("doc.txt")).unwrap(), "fresh");
    }

    #[test]
    fn test_vanished_source_fails_that_file_only() {
        let temp = TempDir::new().unwrap();
        let after = temp.path().join("after");
        let dest = temp.path().join("dest");
        fs::create_dir_all(&after).unwrap();
        fs::write(after.join("ok.txt"), b"fine").unwrap();

        let result = result_with_added(&after, &["gone.txt", "ok.txt"]);
        let selection: HashSet<PathBuf> =
            [PathBuf::from("gone.txt"), PathBuf::from("ok.txt")].into();

        let outcomes = Copier::new()
            .copy_selected(&result, &selection, &after, &dest, &NullSink)
            .unwrap();

        let by_path: std::collections::HashMap<_, _> = outcomes
            .iter()
            .map(|o| (o.relative_path.to_str().unwrap(), o.clone()))
            .collect();
        assert_eq!(by_path["gone.txt"].status, CopyStatus::Failed);
        assert!(by_path["gone.txt"].error.is_some());
        assert_eq!(by_path["ok.txt"].status, CopyStatus::Copied);
        assert!(dest.join("ok.txt").exists());
    }

    #[test]
    fn test_timestamps_preserved() {
        let temp = TempDir::new().unwrap();
        let after = temp.path().join("after");
        let dest = temp.path().join("dest");
        fs::create_dir_all(&after).unwrap();
        fs::write(after.join("dated.txt"), b"content").unwrap();

        let old = filetime::FileTime::from_unix_time(1_600_000_000, 0);
        filetime::set_file_mtime(after.join("dated.txt"), old).unwrap();

        let result = result_with_added(&after, &["dated.txt"]);
        let selection: HashSet<PathBuf> = [PathBuf::from("dated.txt")].into();

        Copier::new()
            .copy_selected(&result, &selection, &after, &dest, &NullSink)
            .unwrap();

        let copied_mtime = filetime::FileTime::from_last_modification_time(
            &fs::metadata(dest.join("dated.txt")).unwrap(),
        );
        assert_eq!(copied_mtime.unix_seconds(), old.unix_seconds());
    }

    #[test]
    fn test_cancellation() {
        let temp = TempDir::new().unwrap();
        let after = temp.path().join("after");
        let dest = temp.path().join("dest");
        fs::create_dir_all(&after).unwrap();
        fs::write(after.join("a.txt"), b"a").unwrap();

        let result = result_with_added(&after, &["a.txt"]);
        let selection: HashSet<PathBuf> = [PathBuf::from("a.txt")].into();

        let cancel = AtomicBool::new(true);
        let err = Copier::new()
            .copy_selected_with_cancel(&result, &selection, &after, &dest, &NullSink, Some(&cancel))
            .unwrap_err();
        assert!(matches!(err, DocDiffError::Cancelled));
    }
}
