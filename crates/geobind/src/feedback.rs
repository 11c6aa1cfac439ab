//! Progress reporting for long-running transfers.
//!
//! Callers pass a single [`Feedback`] sink; operations that fan out over
//! several transfers carve the 0.0..=1.0 range into sub-ranges so the caller
//! sees one monotonic progression.

/// A sink for progress reports in the range `0.0..=1.0`.
pub trait Feedback: Send + Sync {
    fn progress(&self, fraction: f64, message: Option<&str>);
}

/// Discards all progress reports.
pub struct NoFeedback;

impl Feedback for NoFeedback {
    fn progress(&self, _fraction: f64, _message: Option<&str>) {}
}

/// Rescales progress reports into a sub-range of an outer sink.
pub struct PartialFeedback<'a> {
    inner: &'a dyn Feedback,
    start: f64,
    end: f64,
}

impl<'a> PartialFeedback<'a> {
    pub fn new(inner: &'a dyn Feedback, start: f64, end: f64) -> Self {
        Self { inner, start, end }
    }
}

impl Feedback for PartialFeedback<'_> {
    fn progress(&self, fraction: f64, message: Option<&str>) {
        let fraction = fraction.clamp(0.0, 1.0);
        let scaled = self.start + fraction * (self.end - self.start);
        self.inner.progress(scaled, message);
    }
}

/// The fraction of combined work represented by `left` out of
/// `left + right`. Degenerate inputs collapse to the full or empty range so
/// the caller never divides by zero.
pub fn split_feedback(left: u64, right: u64) -> f64 {
    if right == 0 {
        1.0
    } else if left == 0 {
        0.0
    } else {
        left as f64 / (left + right) as f64
    }
}

/// Cumulative `(start, end)` ranges proportional to `weights`. When every
/// weight is zero the range is split equally instead.
pub fn proportional_ranges(weights: &[u64]) -> Vec<(f64, f64)> {
    if weights.is_empty() {
        return Vec::new();
    }
    let total: u64 = weights.iter().sum();
    if total == 0 {
        let share = 1.0 / weights.len() as f64;
        return (0..weights.len())
            .map(|i| (i as f64 * share, (i + 1) as f64 * share))
            .collect();
    }
    let mut ranges = Vec::with_capacity(weights.len());
    let mut consumed = 0u64;
    for weight in weights {
        let start = consumed as f64 / total as f64;
        consumed += weight;
        let end = consumed as f64 / total as f64;
        ranges.push((start, end));
    }
    ranges
}
