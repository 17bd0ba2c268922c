/// Hooks the host uses to follow and steer a run. Called from worker threads.
pub trait ExecutionObserver: Send + Sync {
    /// A chunk finished; `fraction` is the share of all chunks done so far.
    fn on_progress(&self, _fraction: f32, _status: &str) {}

    /// Polled between chunks. Returning `true` stops new chunks from starting.
    fn should_cancel(&self) -> bool {
        false
    }

    /// Every chunk of group `group` finished.
    fn on_group_finished(&self, _group: usize) {}
}

/// Observer that ignores everything and never cancels.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl ExecutionObserver for NoopObserver {}
