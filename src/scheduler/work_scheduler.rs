use crate::foundation::error::{TilecompError, TilecompResult};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

/// One chunk-execution job.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WorkPackage {
    /// Execution group index.
    pub group: usize,
    /// Chunk index within the group.
    pub chunk: usize,
    /// Render priority of the group; higher runs first.
    pub priority: u8,
    /// Distance to the nearest hotspot; smaller runs first within a priority.
    pub distance: f32,
}

/// Runs the jobs a [`WorkScheduler`] hands out.
///
/// The scheduler is passed in so the executor can submit follow-up work.
pub trait ChunkExecutor: Send + Sync {
    /// Execute one package on a worker thread.
    fn execute(&self, package: WorkPackage, scheduler: &WorkScheduler);
}

/// Counters for one scheduler lifetime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Packages accepted by [`WorkScheduler::schedule`].
    pub scheduled: u64,
    /// Packages that reached the executor.
    pub executed: u64,
    /// Packages dropped from the queue by cancellation.
    pub discarded: u64,
    /// Most packages queued at once.
    pub peak_queued: usize,
}

struct QueuedJob {
    package: WorkPackage,
    seq: u64,
}

impl Ord for QueuedJob {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap: higher priority, then nearer, then older wins.
        self.package
            .priority
            .cmp(&other.package.priority)
            .then_with(|| other.package.distance.total_cmp(&self.package.distance))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueuedJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueuedJob {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueuedJob {}

#[derive(Default)]
struct QueueState {
    heap: BinaryHeap<QueuedJob>,
    next_seq: u64,
    outstanding: usize,
    cancelled: bool,
    stats: SchedulerStats,
}

struct Shared {
    queue: Mutex<QueueState>,
    drained: Condvar,
    executor: Arc<dyn ChunkExecutor>,
}

/// Priority work queue drained by a fixed rayon pool.
///
/// Every accepted package spawns one pool task; each task pops whichever queued package is
/// currently best, so submission order only matters between equal priorities.
#[derive(Clone)]
pub struct WorkScheduler {
    shared: Arc<Shared>,
    pool: Arc<rayon::ThreadPool>,
}

impl std::fmt::Debug for WorkScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkScheduler")
            .field("threads", &self.threads())
            .field("stats", &self.stats())
            .finish()
    }
}

struct Completion<'a>(&'a Shared);

impl Drop for Completion<'_> {
    fn drop(&mut self) {
        let mut q = lock(&self.0.queue);
        q.outstanding = q.outstanding.saturating_sub(1);
        q.stats.executed += 1;
        if q.outstanding == 0 {
            self.0.drained.notify_all();
        }
    }
}

fn lock(m: &Mutex<QueueState>) -> MutexGuard<'_, QueueState> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

fn build_thread_pool(threads: Option<usize>) -> TilecompResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(TilecompError::validation(
            "scheduler 'threads' must be >= 1 when set",
        ));
    }

    let mut builder = rayon::ThreadPoolBuilder::new()
        .thread_name(|i| format!("tilecomp-worker-{i}"))
        .panic_handler(|_| tracing::error!("compositor worker task panicked outside a chunk"));
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| TilecompError::execution(format!("failed to build rayon thread pool: {e}")))
}

impl WorkScheduler {
    /// Start a pool of `threads` workers (hardware parallelism when `None`).
    pub fn start(threads: Option<usize>, executor: Arc<dyn ChunkExecutor>) -> TilecompResult<Self> {
        let pool = build_thread_pool(threads)?;
        tracing::debug!(threads = pool.current_num_threads(), "work scheduler started");
        Ok(Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(QueueState::default()),
                drained: Condvar::new(),
                executor,
            }),
            pool: Arc::new(pool),
        })
    }

    /// Worker count.
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Queue a package. Returns `false` once the scheduler has been cancelled.
    pub fn schedule(&self, package: WorkPackage) -> bool {
        {
            let mut q = lock(&self.shared.queue);
            if q.cancelled {
                return false;
            }
            let seq = q.next_seq;
            q.next_seq += 1;
            q.heap.push(QueuedJob { package, seq });
            q.outstanding += 1;
            q.stats.scheduled += 1;
            q.stats.peak_queued = q.stats.peak_queued.max(q.heap.len());
        }
        let this = self.clone();
        self.pool.spawn(move || this.run_next());
        true
    }

    fn run_next(&self) {
        let job = lock(&self.shared.queue).heap.pop();
        let Some(job) = job else {
            // Cancelled and already accounted for.
            return;
        };
        let _done = Completion(&self.shared);
        self.shared.executor.execute(job.package, self);
    }

    /// Block until every accepted package has run or been discarded.
    pub fn wait(&self) {
        let mut q = lock(&self.shared.queue);
        while q.outstanding > 0 {
            q = self
                .shared
                .drained
                .wait(q)
                .unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Refuse new packages and drop the queued ones. Running packages finish normally.
    pub fn cancel(&self) {
        let mut q = lock(&self.shared.queue);
        if !q.cancelled {
            tracing::debug!(queued = q.heap.len(), "work scheduler cancelled");
        }
        q.cancelled = true;
        let dropped = q.heap.len();
        q.heap.clear();
        q.outstanding = q.outstanding.saturating_sub(dropped);
        q.stats.discarded += dropped as u64;
        if q.outstanding == 0 {
            self.shared.drained.notify_all();
        }
    }

    /// `true` after [`WorkScheduler::cancel`].
    pub fn is_cancelled(&self) -> bool {
        lock(&self.shared.queue).cancelled
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> SchedulerStats {
        lock(&self.shared.queue).stats
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scheduler/work_scheduler.rs"]
mod tests;
