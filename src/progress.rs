//! Host-injected capabilities: cooperative cancellation and progress/log
//! reporting. Kept as small trait objects rather than globals so that a
//! single worker's `create`/`reconstruct` call carries its own state, per
//! the concurrency model in which every operation is single-threaded.

/// Polled at every block/volume/chunk boundary named by the operations in
/// this crate. Implementations must be cheap and non-blocking.
pub trait CancellationToken {
    fn is_cancelled(&self) -> bool;
}

/// A token that never cancels.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverCancel;

impl CancellationToken for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// A single step of work completed out of an (optionally unknown) total.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    pub current: u64,
    pub total: u64,
    pub message: String,
}

/// Log severity passed to [`Reporter::log`], independent of the crate's own
/// internal `log` crate diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

/// Host-supplied progress/log sink. Called synchronously on the operation's
/// own thread; handlers must not block or panic.
pub trait Reporter {
    fn report_progress(&mut self, _info: ProgressInfo) {}
    fn log(&mut self, _level: Level, _message: &str) {}
}

/// A reporter that discards everything, usable as a null sentinel.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReporter;

impl Reporter for NullReporter {}

/// Helper used by long-running loops: returns `Err(RescError::Cancelled)` if
/// `token` reports cancellation.
pub fn check_cancelled(token: &dyn CancellationToken) -> crate::error::RescResult<()> {
    if token.is_cancelled() {
        Err(crate::error::RescError::Cancelled)
    } else {
        Ok(())
    }
}
