use docdiff_common::{AppConfig, DocDiffError, FileEntry, FileKind};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use jwalk::WalkDir;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

/// Parallel folder scanner using jwalk
pub struct FolderScanner {
    config: AppConfig,
    custom_ignore: Option<Gitignore>,
}

impl FolderScanner {
    pub fn new(config: AppConfig) -> Self {
        let custom_ignore = Self::build_custom_ignore(&config);
        Self {
            config,
            custom_ignore,
        }
    }

    /// Build a Gitignore from custom ignore patterns in config
    fn build_custom_ignore(config: &AppConfig) -> Option<Gitignore> {
        if config.ignore_patterns.is_empty() {
            return None;
        }

        let mut builder = GitignoreBuilder::new("");
        for pattern in &config.ignore_patterns {
            if let Err(err) = builder.add_line(None, pattern) {
                debug!("Failed to add ignore pattern '{}': {}", pattern, err);
            } else {
                debug!("Added custom ignore pattern: {}", pattern);
            }
        }

        match builder.build() {
            Ok(ignore) => Some(ignore),
            Err(e) => {
                debug!("Failed to build custom ignore: {}", e);
                None
            }
        }
    }

    /// Scan a directory and return all files beneath it
    pub fn scan(&self, root: &Path) -> Result<Vec<FileEntry>, DocDiffError> {
        self.scan_with_cancel(root, None)
    }

    /// Scan a directory and return all files beneath it, with cancellation.
    ///
    /// Entries are sorted by relative path so that downstream ordinal
    /// tie-breaking is reproducible regardless of walker parallelism.
    /// A missing or non-directory root is fatal; per-entry metadata
    /// failures are logged and the entry skipped.
    pub fn scan_with_cancel(
        &self,
        root: &Path,
        cancel: Option<&AtomicBool>,
    ) -> Result<Vec<FileEntry>, DocDiffError> {
        if !root.exists() {
            return Err(DocDiffError::FatalScan {
                path: root.to_path_buf(),
                reason: "directory does not exist".to_string(),
            });
        }
        if !root.is_dir() {
            return Err(DocDiffError::FatalScan {
                path: root.to_path_buf(),
                reason: "not a directory".to_string(),
            });
        }

        let mut entries = Vec::new();

        let walker = WalkDir::new(root)
            .follow_links(self.config.follow_symlinks)
            .skip_hidden(false);

        for entry in walker {
            if cancel.map_or(false, |flag| flag.load(Ordering::Relaxed)) {
                return Err(DocDiffError::Cancelled);
            }

            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Walk error under {:?}: {}", root, e);
                    continue;
                }
            };

            if entry.file_type().is_dir() {
                continue;
            }

            let path = entry.path();
            let relative_path = match path.strip_prefix(root) {
                Ok(rel) => rel.to_path_buf(),
                Err(e) => {
                    warn!("Path {:?} outside scan root {:?}: {}", path, root, e);
                    continue;
                }
            };

            if relative_path.as_os_str().is_empty() {
                continue;
            }

            // Skip if matches ignore patterns (check full path and all parent directories)
            if self.should_ignore_with_parents(&relative_path) {
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!("Metadata error for {:?}: {}", path, e);
                    continue;
                }
            };

            entries.push(FileEntry {
                kind: FileKind::from_path(&relative_path),
                relative_path,
                absolute_path: path,
                size: metadata.len(),
            });
        }

        entries.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

        debug!("Scanned {} files from {:?}", entries.len(), root);
        Ok(entries)
    }

    /// Check if a path or any of its parent directories should be ignored
    fn should_ignore_with_parents(&self, path: &Path) -> bool {
        if let Some(ref custom_ignore) = self.custom_ignore {
            if custom_ignore.matched(path, false).is_ignore() {
                return true;
            }

            let mut current = path;
            while let Some(parent) = current.parent() {
                if !parent.as_os_str().is_empty() {
                    if custom_ignore.matched(parent, true).is_ignore() {
                        return true;
                    }
                }
                current = parent;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_scanner_basic() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("file1.txt"), b"test").unwrap();
        fs::write(temp.path().join("file2.docx"), b"test").unwrap();
        fs::create_dir(temp.path().join("subdir")).unwrap();
        fs::write(temp.path().join("subdir/file3.pdf"), b"test").unwrap();

        let scanner = FolderScanner::new(AppConfig::default());
        let entries = scanner.scan(temp.path()).unwrap();

        // Files only; directories are not comparison subjects
        assert_eq!(entries.len(), 3, "Expected 3 entries, got {}", entries.len());
        assert!(entries.iter().all(|e| !e.relative_path.as_os_str().is_empty()));
    }

    #[test]
    fn test_scanner_sorted_and_kinds() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("b.pdf"), b"pdf").unwrap();
        fs::write(temp.path().join("a.docx"), b"doc").unwrap();
        fs::write(temp.path().join("c.txt"), b"txt").unwrap();

        let scanner = FolderScanner::new(AppConfig::default());
        let entries = scanner.scan(temp.path()).unwrap();

        let paths: Vec<_> = entries
            .iter()
            .map(|e| e.relative_path.to_string_lossy().to_string())
            .collect();
        assert_eq!(paths, vec!["a.docx", "b.pdf", "c.txt"]);

        assert_eq!(entries[0].kind, FileKind::WordDocument);
        assert_eq!(entries[1].kind, FileKind::Pdf);
        assert_eq!(entries[2].kind, FileKind::Other);
    }

    #[test]
    fn test_scanner_missing_root_is_fatal() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("no_such_dir");

        let scanner = FolderScanner::new(AppConfig::default());
        let err = scanner.scan(&missing).unwrap_err();
        assert!(matches!(err, DocDiffError::FatalScan { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_scanner_file_root_is_fatal() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("file.txt");
        fs::write(&file, b"not a dir").unwrap();

        let scanner = FolderScanner::new(AppConfig::default());
        let err = scanner.scan(&file).unwrap_err();
        assert!(matches!(err, DocDiffError::FatalScan { .. }));
    }

    #[test]
    fn test_scanner_ignore_patterns() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("keep.docx"), b"test").unwrap();
        fs::write(temp.path().join("skip.tmp"), b"test").unwrap();
        fs::create_dir(temp.path().join("build")).unwrap();
        fs::write(temp.path().join("build/out.pdf"), b"test").unwrap();

        let config = AppConfig {
            ignore_patterns: vec!["*.tmp".to_string(), "build/".to_string()],
            ..AppConfig::default()
        };

        let scanner = FolderScanner::new(config);
        let entries = scanner.scan(temp.path()).unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].relative_path.to_str(), Some("keep.docx"));
    }

    #[test]
    fn test_scanner_cancellation() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), b"test").unwrap();

        let cancel = AtomicBool::new(true);
        let scanner = FolderScanner::new(AppConfig::default());
        let err = scanner.scan_with_cancel(temp.path(), Some(&cancel)).unwrap_err();
        assert!(matches!(err, DocDiffError::Cancelled));
    }
}
