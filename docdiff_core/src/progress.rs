use docdiff_common::{ProgressEvent, ProgressStage};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Sink for discrete progress events.
///
/// Injected into the classifier and copier; the consumer owns the
/// polling/rendering cadence, so emission here must never block on it.
pub trait ProgressSink: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Sink that discards every event, for headless use
pub struct NullSink;

impl ProgressSink for NullSink {
    fn report(&self, _event: ProgressEvent) {}
}

/// Sink backed by a crossbeam channel. A full or disconnected channel
/// drops the event rather than stalling a worker.
pub struct ChannelSink {
    sender: crossbeam::channel::Sender<ProgressEvent>,
}

impl ChannelSink {
    pub fn new(sender: crossbeam::channel::Sender<ProgressEvent>) -> Self {
        Self { sender }
    }
}

impl ProgressSink for ChannelSink {
    fn report(&self, event: ProgressEvent) {
        let _ = self.sender.try_send(event);
    }
}

/// Shared completion counter for one operation's worker pool. Emission
/// order reflects actual completion order; the count reaches `total`
/// exactly once all items are processed.
pub struct ProgressCounter<'a> {
    sink: &'a dyn ProgressSink,
    stage: ProgressStage,
    total: usize,
    processed: AtomicUsize,
}

impl<'a> ProgressCounter<'a> {
    pub fn new(sink: &'a dyn ProgressSink, stage: ProgressStage, total: usize) -> Self {
        Self {
            sink,
            stage,
            total,
            processed: AtomicUsize::new(0),
        }
    }

    pub fn tick(&self, current: &Path) {
        let processed = self.processed.fetch_add(1, Ordering::Relaxed) + 1;
        self.sink.report(ProgressEvent {
            stage: self.stage,
            processed,
            total: self.total,
            current: current.to_path_buf(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_counter_reaches_total() {
        let (tx, rx) = crossbeam::channel::unbounded();
        let sink = ChannelSink::new(tx);
        let counter = ProgressCounter::new(&sink, ProgressStage::Classify, 3);

        counter.tick(&PathBuf::from("a"));
        counter.tick(&PathBuf::from("b"));
        counter.tick(&PathBuf::from("c"));

        let events: Vec<ProgressEvent> = rx.try_iter().collect();
        assert_eq!(events.len(), 3);
        assert_eq!(events.last().unwrap().processed, 3);
        assert_eq!(events.last().unwrap().total, 3);
        assert!((events.last().unwrap().percentage() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_disconnected_channel_does_not_block() {
        let (tx, rx) = crossbeam::channel::bounded(1);
        drop(rx);
        let sink = ChannelSink::new(tx);
        let counter = ProgressCounter::new(&sink, ProgressStage::Copy, 1);
        counter.tick(&PathBuf::from("a"));
    }
}
