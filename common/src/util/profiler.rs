use std::time::{Duration, Instant};

pub struct ScopedTimer {
    name: &'static str,
    start: Instant,
    debug: bool,
}

impl ScopedTimer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            start: Instant::now(),
            debug: false,
        }
    }

    /// Logs at debug level on drop; for hot paths like incremental updates
    /// where per-call timing would drown the log.
    pub fn debug(name: &'static str) -> Self {
        Self {
            name,
            start: Instant::now(),
            debug: true,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for ScopedTimer {
    fn drop(&mut self) {
        if self.debug {
            log::debug!("{} took {:?}", self.name, self.start.elapsed());
        } else {
            log::info!("{} took {:?}", self.name, self.start.elapsed());
        }
    }
}
