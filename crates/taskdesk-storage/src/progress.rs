//! Transfer progress callbacks.

/// Receives the completion percentage of a single transfer.
///
/// Called zero or more times before the transfer settles, with values in
/// `0..=100`. Implementations must be cheap: backends call them inline
/// between chunks.
pub trait ProgressCallback: Send + Sync {
    fn on_progress(&self, percent: u8);
}

/// A progress callback that ignores all updates.
pub struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _percent: u8) {}
}

/// A progress callback that wraps a closure.
pub struct FnProgress<F> {
    callback: F,
}

impl<F> ProgressCallback for FnProgress<F>
where
    F: Fn(u8) + Send + Sync,
{
    fn on_progress(&self, percent: u8) {
        (self.callback)(percent)
    }
}

/// Create a progress callback from a closure.
pub fn progress_fn<F>(f: F) -> FnProgress<F>
where
    F: Fn(u8) + Send + Sync,
{
    FnProgress { callback: f }
}

/// Percentage of `total` covered by `done`, clamped to `0..=100`.
///
/// An empty payload counts as complete.
pub fn percent_of(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done.min(total) * 100) / total) as u8
}
