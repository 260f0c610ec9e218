pub mod classify;
pub mod copier;
pub mod digest;
pub mod extract;
pub mod progress;
pub mod scanner;

pub use classify::ClassifyEngine;
pub use copier::Copier;
pub use digest::DigestCache;
pub use extract::{ExtractorRegistry, TextExtractor};
pub use progress::{ChannelSink, NullSink, ProgressCounter, ProgressSink};
pub use scanner::FolderScanner;

use docdiff_common::{DocDiffError, Result};

/// Build a bounded worker pool; `threads == 0` selects the number of
/// available cores.
pub(crate) fn build_worker_pool(threads: usize) -> Result<rayon::ThreadPool> {
    let mut builder = rayon::ThreadPoolBuilder::new();
    if threads > 0 {
        builder = builder.num_threads(threads);
    }
    builder
        .build()
        .map_err(|e| DocDiffError::Config(format!("Failed to build worker pool: {}", e)))
}
