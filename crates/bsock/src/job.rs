use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cancellation state of the job a connection works for.
pub trait JobControl: Send + Sync {
    /// Reports whether the job was canceled.
    fn is_canceled(&self) -> bool;
}

impl JobControl for AtomicBool {
    fn is_canceled(&self) -> bool {
        self.load(Ordering::Acquire)
    }
}

/// A job that is never canceled.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoJob;

impl JobControl for NoJob {
    fn is_canceled(&self) -> bool {
        false
    }
}

/// Shared job handle stored in connection options.
pub type SharedJob = Arc<dyn JobControl>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_flag_reports_cancellation() {
        let flag = AtomicBool::new(false);
        assert!(!flag.is_canceled());
        flag.store(true, Ordering::Release);
        assert!(flag.is_canceled());
        assert!(!NoJob.is_canceled());
    }
}
