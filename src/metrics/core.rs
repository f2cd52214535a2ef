//! Timing helpers shared by the phase metrics.

use std::time::Instant;

/// Records elapsed seconds into a histogram when dropped.
pub struct TimingGuard {
    start: Instant,
    histogram_name: &'static str,
}

impl TimingGuard {
    pub fn new(histogram_name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            histogram_name,
        }
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    /// Record now instead of at end of scope.
    pub fn finish(self) {}
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        ::metrics::histogram!(self.histogram_name).record(self.elapsed_secs());
    }
}

/// Usage:
/// ```ignore
/// let _timing = time_operation("etl_run_duration_seconds");
/// // ... do work ...
/// ```
pub fn time_operation(histogram_name: &'static str) -> TimingGuard {
    TimingGuard::new(histogram_name)
}
