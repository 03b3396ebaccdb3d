use std::sync::atomic::{AtomicUsize, Ordering};

/// Polled by full rebuilds only. Incremental updates are assumed fast enough
/// to run to completion uninterrupted.
pub trait ProgressReporter: Sync {
    fn begin_phase(&self, total: usize);
    fn advance(&self);
    fn is_cancelled(&self) -> bool;
}

/// Reporter for callers that do not track progress; never cancels.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn begin_phase(&self, _total: usize) {}
    fn advance(&self) {}
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Logs a line every quarter of the phase. Enough feedback for CLI rebuilds
/// without flooding the log.
#[derive(Default)]
pub struct LogProgress {
    total: AtomicUsize,
    done: AtomicUsize,
}

impl ProgressReporter for LogProgress {
    fn begin_phase(&self, total: usize) {
        self.total.store(total, Ordering::Relaxed);
        self.done.store(0, Ordering::Relaxed);
    }

    fn advance(&self) {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        let total = self.total.load(Ordering::Relaxed);
        if total >= 4 && done % (total / 4) == 0 {
            log::info!("connectivity scan: {}/{}", done, total);
        }
    }

    fn is_cancelled(&self) -> bool {
        false
    }
}
