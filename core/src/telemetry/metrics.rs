use log::debug;

/// Per-stage item counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub processed: usize,
    pub skipped: usize,
    pub errors: usize,
}

#[derive(Debug, Default)]
pub struct MetricsRecorder {
    inner: MetricsSnapshot,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_processed(&mut self) {
        self.inner.processed += 1;
    }

    pub fn record_skipped(&mut self) {
        self.inner.skipped += 1;
    }

    pub fn record_error(&mut self) {
        self.inner.errors += 1;
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.inner
    }

    pub fn reset(&mut self) {
        self.inner = MetricsSnapshot::default();
    }

    pub fn report(&self, stage: &str) {
        let MetricsSnapshot {
            processed,
            skipped,
            errors,
        } = self.inner;
        debug!("{stage}: processed {processed}, skipped {skipped}, errors {errors}");
    }
}
