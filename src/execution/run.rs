use crate::buffer::memory_buffer::MemoryBuffer;
use crate::execution::group::{Chunk, ExecutionGroup};
use crate::execution::observer::ExecutionObserver;
use crate::foundation::core::DataType;
use crate::memory::manager::{CacheKey, MemoryManager};
use crate::operation::graph::OperationGraph;
use crate::operation::inputs::ReadBufferSet;
use crate::scheduler::work_scheduler::{ChunkExecutor, WorkPackage, WorkScheduler};
use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// State shared by the workers of one run.
pub(crate) struct ExecutionRun {
    graph: Arc<OperationGraph>,
    groups: Arc<Vec<ExecutionGroup>>,
    memory: MemoryManager,
    observer: Arc<dyn ExecutionObserver>,
    outputs: Vec<Option<Mutex<MemoryBuffer>>>,
    total: usize,
    finished: AtomicUsize,
    failed: AtomicUsize,
    cancelled: AtomicBool,
    fail_fast: bool,
    failure: Mutex<Option<String>>,
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

impl ExecutionRun {
    pub(crate) fn new(
        graph: Arc<OperationGraph>,
        groups: Arc<Vec<ExecutionGroup>>,
        memory: MemoryManager,
        observer: Arc<dyn ExecutionObserver>,
        fail_fast: bool,
    ) -> Self {
        let outputs = groups
            .iter()
            .map(|g| {
                g.is_output().then(|| {
                    Mutex::new(MemoryBuffer::new(DataType::Color, g.resolution().rect()))
                })
            })
            .collect();
        let total = groups.iter().map(|g| g.chunks().len()).sum();
        Self {
            graph,
            groups,
            memory,
            observer,
            outputs,
            total,
            finished: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            cancelled: AtomicBool::new(false),
            fail_fast,
            failure: Mutex::new(None),
        }
    }

    pub(crate) fn memory(&self) -> &MemoryManager {
        &self.memory
    }

    pub(crate) fn total_chunks(&self) -> usize {
        self.total
    }

    pub(crate) fn finished_chunks(&self) -> usize {
        self.finished.load(Ordering::Acquire)
    }

    pub(crate) fn failed_chunks(&self) -> usize {
        self.failed.load(Ordering::Acquire)
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Latch cancellation when the observer asks for it.
    pub(crate) fn check_cancelled(&self) -> bool {
        if self.is_cancelled() {
            return true;
        }
        if self.observer.should_cancel() {
            if !self.cancelled.swap(true, Ordering::AcqRel) {
                tracing::info!(
                    finished = self.finished_chunks(),
                    total = self.total,
                    "execution cancelled"
                );
            }
            return true;
        }
        false
    }

    pub(crate) fn failure(&self) -> Option<String> {
        self.failure
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Move the output buffers out, keyed by label. Duplicate labels get the group id appended.
    pub(crate) fn take_outputs(&self) -> BTreeMap<String, MemoryBuffer> {
        let mut out = BTreeMap::new();
        for (group, slot) in self.groups.iter().zip(&self.outputs) {
            let (Some(slot), Some(name)) = (slot, group.output_name()) else {
                continue;
            };
            let buffer = std::mem::replace(
                &mut *slot.lock().unwrap_or_else(|e| e.into_inner()),
                MemoryBuffer::new(DataType::Color, Default::default()),
            );
            let key = if out.contains_key(name) {
                format!("{name}#{}", group.id())
            } else {
                name.to_owned()
            };
            out.insert(key, buffer);
        }
        out
    }

    /// Gather the upstream regions `chunk` reads into one buffer per read buffer.
    ///
    /// Missing or unreadable upstream chunks leave their area transparent.
    fn consolidate(&self, chunk: &Chunk) -> ReadBufferSet {
        let mut set = ReadBufferSet::with_capacity(chunk.read_areas().len());
        for read in chunk.read_areas() {
            let source = &self.groups[read.source_group];
            let mut buffer = MemoryBuffer::new(self.graph.output_type(read.read_buffer), read.area);
            for idx in source.chunks_for_area(read.area) {
                let key = CacheKey::new(source.root(), idx);
                match self.memory.get(key) {
                    Ok(Some(guard)) => buffer.copy_content_from(&guard),
                    Ok(None) => tracing::debug!(?key, "upstream chunk missing; reading zeros"),
                    Err(e) => tracing::warn!(?key, error = %e, "upstream chunk unreadable; reading zeros"),
                }
            }
            set.insert(read.read_buffer, buffer);
        }
        set
    }

    fn publish(&self, group: &ExecutionGroup, chunk: &Chunk, buffer: MemoryBuffer) {
        if let Some(Some(slot)) = self.outputs.get(group.id()) {
            slot.lock()
                .unwrap_or_else(|e| e.into_inner())
                .copy_content_from(&buffer);
            return;
        }
        if chunk.dependents().is_empty() {
            return;
        }
        let key = CacheKey::new(group.root(), chunk.index());
        if let Err(e) = self.memory.publish(key, buffer) {
            tracing::warn!(?key, error = %e, "failed to publish chunk buffer");
        }
    }

    fn release_inputs(&self, chunk: &Chunk) {
        for dep in chunk.depends_on() {
            let source = &self.groups[dep.group];
            if let Some(upstream) = source.chunk(dep.chunk)
                && upstream.reader_finished()
            {
                self.memory.remove(CacheKey::new(source.root(), dep.chunk));
            }
        }
    }

    fn record_failure(&self, package: WorkPackage, msg: &str, scheduler: &WorkScheduler) {
        self.failed.fetch_add(1, Ordering::AcqRel);
        tracing::error!(
            group = package.group,
            chunk = package.chunk,
            panic = %msg,
            "chunk computation panicked"
        );
        if self.fail_fast {
            let mut failure = self.failure.lock().unwrap_or_else(|e| e.into_inner());
            if failure.is_none() {
                *failure = Some(format!(
                    "chunk {} of group {} panicked: {msg}",
                    package.chunk, package.group
                ));
            }
            drop(failure);
            self.cancelled.store(true, Ordering::Release);
            scheduler.cancel();
        }
    }
}

impl ChunkExecutor for ExecutionRun {
    fn execute(&self, package: WorkPackage, scheduler: &WorkScheduler) {
        if self.check_cancelled() {
            scheduler.cancel();
            return;
        }
        let Some(group) = self.groups.get(package.group) else {
            return;
        };
        let Some(chunk) = group.chunk(package.chunk) else {
            return;
        };

        let buffers = self.consolidate(chunk);
        let data_type = self.graph.output_type(group.root());
        let mut buffer = self
            .memory
            .allocate(data_type, chunk.rect())
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "chunk allocation could not make room; over budget");
                MemoryBuffer::new(data_type, chunk.rect())
            });
        let result = catch_unwind(AssertUnwindSafe(|| {
            group.execute_chunk(&self.graph, chunk, &buffers, &mut buffer)
        }));
        drop(buffers);
        if let Err(payload) = result {
            self.record_failure(package, &panic_message(&*payload), scheduler);
        }

        self.publish(group, chunk, buffer);
        chunk.finish();
        self.release_inputs(chunk);

        let done = self.finished.fetch_add(1, Ordering::AcqRel) + 1;
        self.observer
            .on_progress(done as f32 / self.total.max(1) as f32, &format!("{done}/{} chunks", self.total));
        if group.chunk_finished() {
            tracing::debug!(group = group.id(), chunks = group.chunks().len(), "group finished");
            self.observer.on_group_finished(group.id());
        }

        if self.check_cancelled() {
            scheduler.cancel();
            return;
        }
        for dep in chunk.dependents() {
            let Some(target) = self.groups.get(dep.group) else {
                continue;
            };
            let Some(next) = target.chunk(dep.chunk) else {
                continue;
            };
            if next.dependency_finished() && next.try_schedule() {
                scheduler.schedule(WorkPackage {
                    group: dep.group,
                    chunk: dep.chunk,
                    priority: target.priority(),
                    distance: next.distance(),
                });
            }
        }
    }
}
