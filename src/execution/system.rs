use crate::buffer::memory_buffer::MemoryBuffer;
use crate::config::compositor::CompositorConfig;
use crate::execution::group::{ChunkRef, ExecutionGroup, ReadArea};
use crate::execution::observer::{ExecutionObserver, NoopObserver};
use crate::execution::run::ExecutionRun;
use crate::foundation::core::Resolution;
use crate::foundation::error::{TilecompError, TilecompResult};
use crate::memory::manager::{CacheStats, MemoryManager};
use crate::operation::buffer_io::{ReadBufferOperation, WriteBufferOperation};
use crate::operation::core::{OperationId, OperationRole, ResizeMode};
use crate::operation::graph::OperationGraph;
use crate::operation::resample::ResampleOperation;
use crate::scheduler::work_scheduler::{SchedulerStats, WorkPackage, WorkScheduler};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Counters describing one run.
#[derive(Clone, Debug, Default)]
pub struct ExecutionStats {
    /// Chunks across all groups.
    pub chunks_total: usize,
    /// Chunks computed.
    pub chunks_finished: usize,
    /// Chunks whose computation panicked.
    pub chunks_failed: usize,
    /// `true` when the run stopped early.
    pub cancelled: bool,
    /// Wall-clock time of the run.
    pub elapsed: Duration,
    /// Buffer cache counters.
    pub cache: CacheStats,
    /// Work queue counters.
    pub scheduler: SchedulerStats,
}

/// Buffers produced by a run, keyed by output label.
#[derive(Clone, Debug, Default)]
pub struct RenderOutput {
    /// One full-frame color buffer per active output.
    pub outputs: BTreeMap<String, MemoryBuffer>,
    /// Run counters.
    pub stats: ExecutionStats,
}

impl RenderOutput {
    /// Buffer of the output labelled `name`.
    pub fn output(&self, name: &str) -> Option<&MemoryBuffer> {
        self.outputs.get(name)
    }
}

/// A prepared operation graph: resolutions negotiated, adapters inserted, groups and chunk
/// dependencies built. Reusable across runs.
#[derive(Debug)]
pub struct ExecutionSystem {
    graph: Arc<OperationGraph>,
    groups: Arc<Vec<ExecutionGroup>>,
    order: Vec<usize>,
    config: CompositorConfig,
    rendering: bool,
}

impl ExecutionSystem {
    /// Prepare `graph` for execution.
    ///
    /// `rendering` selects final-render mode, in which viewer outputs are inactive.
    #[tracing::instrument(skip(graph, config), fields(operations = graph.len()))]
    pub fn new(
        mut graph: OperationGraph,
        rendering: bool,
        config: &CompositorConfig,
    ) -> TilecompResult<Self> {
        config.validate()?;
        let t0 = Instant::now();

        let outputs: Vec<OperationId> = graph
            .ids()
            .filter(|id| {
                graph
                    .operation(*id)
                    .is_some_and(|op| op.is_output(rendering))
            })
            .collect();
        if outputs.is_empty() {
            tracing::warn!("operation graph has no active outputs");
        }

        negotiate_resolutions(&mut graph, &outputs, config.render_size);
        let resamples = insert_resample_adapters(&mut graph, &outputs)?;
        let buffers = insert_buffer_adapters(&mut graph, &outputs)?;
        tracing::debug!(
            resamples,
            buffers,
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "graph adapted"
        );

        let mut groups = build_groups(&graph, &outputs);
        for g in &mut groups {
            let size = config.chunk_size_for(g.resolution());
            g.init_chunks(size, config.chunk_order, &config.hotspots);
        }
        link_chunk_dependencies(&graph, &mut groups);
        let order = group_order(&graph, &groups);
        propagate_priorities(&graph, &mut groups, &order);

        let chunks: usize = groups.iter().map(|g| g.chunks().len()).sum();
        tracing::debug!(
            groups = groups.len(),
            chunks,
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "execution system built"
        );

        Ok(Self {
            graph: Arc::new(graph),
            groups: Arc::new(groups),
            order,
            config: config.clone(),
            rendering,
        })
    }

    /// Adapted operation graph.
    pub fn graph(&self) -> &OperationGraph {
        &self.graph
    }

    /// All groups, indexed by group id.
    pub fn groups(&self) -> &[ExecutionGroup] {
        &self.groups
    }

    /// One group.
    pub fn group(&self, id: usize) -> Option<&ExecutionGroup> {
        self.groups.get(id)
    }

    /// Group ids with producers before consumers.
    pub fn execution_order(&self) -> &[usize] {
        &self.order
    }

    /// Configuration the system was built with.
    pub fn config(&self) -> &CompositorConfig {
        &self.config
    }

    /// `true` when built for final rendering.
    pub fn is_rendering(&self) -> bool {
        self.rendering
    }

    /// Chunks across all groups.
    pub fn total_chunks(&self) -> usize {
        self.groups.iter().map(|g| g.chunks().len()).sum()
    }

    /// Run every chunk without progress reporting.
    pub fn execute(&mut self) -> TilecompResult<RenderOutput> {
        self.execute_with(Arc::new(NoopObserver))
    }

    /// Run every chunk, reporting to `observer`.
    ///
    /// Returns the output buffers even when cancelled; chunks that never ran stay transparent.
    /// Only `fail_fast` turns a panicking chunk into an error.
    #[tracing::instrument(skip_all, fields(groups = self.groups.len()))]
    pub fn execute_with(
        &mut self,
        observer: Arc<dyn ExecutionObserver>,
    ) -> TilecompResult<RenderOutput> {
        let start = Instant::now();
        for g in self.groups.iter() {
            g.reset();
        }

        let memory = MemoryManager::new(
            self.config.memory_budget_bytes,
            self.config.scratch_dir.clone(),
        );
        let run = Arc::new(ExecutionRun::new(
            Arc::clone(&self.graph),
            Arc::clone(&self.groups),
            memory,
            observer,
            self.config.fail_fast,
        ));
        let scheduler = WorkScheduler::start(self.config.threads, run.clone())?;

        if !run.check_cancelled() {
            for &gid in &self.order {
                let group = &self.groups[gid];
                for idx in group.chunk_order() {
                    let chunk = &group.chunks()[idx];
                    if chunk.unfinished_dependencies() == 0 && chunk.try_schedule() {
                        scheduler.schedule(WorkPackage {
                            group: gid,
                            chunk: idx,
                            priority: group.priority(),
                            distance: chunk.distance(),
                        });
                    }
                }
            }
        }
        scheduler.wait();
        let scheduler_stats = scheduler.stats();
        drop(scheduler);

        let outputs = run.take_outputs();
        let cache = run.memory().stats();
        run.memory().clear();
        let stats = ExecutionStats {
            chunks_total: run.total_chunks(),
            chunks_finished: run.finished_chunks(),
            chunks_failed: run.failed_chunks(),
            cancelled: run.is_cancelled(),
            elapsed: start.elapsed(),
            cache,
            scheduler: scheduler_stats,
        };
        tracing::info!(
            chunks = stats.chunks_finished,
            total = stats.chunks_total,
            failed = stats.chunks_failed,
            cancelled = stats.cancelled,
            evictions = stats.cache.evictions,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "execution finished"
        );

        if let Some(msg) = run.failure() {
            return Err(TilecompError::execution(msg));
        }
        Ok(RenderOutput { outputs, stats })
    }
}

/// Build and run `graph` once.
pub fn execute(
    graph: OperationGraph,
    rendering: bool,
    config: &CompositorConfig,
) -> TilecompResult<RenderOutput> {
    ExecutionSystem::new(graph, rendering, config)?.execute()
}

fn reachable(graph: &OperationGraph, outputs: &[OperationId]) -> Vec<bool> {
    let mut seen = vec![false; graph.len()];
    let mut stack = outputs.to_vec();
    while let Some(op) = stack.pop() {
        if std::mem::replace(&mut seen[op.index()], true) {
            continue;
        }
        stack.extend(graph.inputs_of(op).iter().flatten().copied());
    }
    seen
}

/// Resolve resolutions depth-first from every output.
///
/// The main input is resolved first with the consumer's preference; the consumer then picks its
/// own resolution, which becomes the preference for its remaining inputs.
fn negotiate_resolutions(graph: &mut OperationGraph, outputs: &[OperationId], preferred: Resolution) {
    let mut resolved = vec![false; graph.len()];
    for &out in outputs {
        resolve(graph, out, preferred, &mut resolved);
    }
}

fn resolve(
    graph: &mut OperationGraph,
    id: OperationId,
    preferred: Resolution,
    resolved: &mut [bool],
) -> Resolution {
    if std::mem::replace(&mut resolved[id.index()], true) {
        return graph.resolution(id);
    }
    let links: Vec<Option<OperationId>> = graph.inputs_of(id).to_vec();
    let wanted = graph.operation(id).map(|op| op.resolution_input()).unwrap_or(0);
    let main = if links.get(wanted).copied().flatten().is_some() {
        Some(wanted)
    } else {
        links.iter().position(Option::is_some)
    };

    let main_res = main
        .and_then(|s| links[s])
        .map(|src| resolve(graph, src, preferred, resolved));
    let res = graph
        .operation(id)
        .map(|op| op.determine_resolution(main_res, preferred))
        .unwrap_or(preferred);
    graph.set_resolution(id, res);

    for (socket, link) in links.iter().enumerate() {
        if Some(socket) == main {
            continue;
        }
        if let Some(src) = link {
            resolve(graph, *src, res, resolved);
        }
    }
    res
}

/// Insert a resample adapter on every edge whose producer runs at a different resolution than
/// its consumer, unless the socket opts out.
fn insert_resample_adapters(graph: &mut OperationGraph, outputs: &[OperationId]) -> TilecompResult<usize> {
    let live = reachable(graph, outputs);
    let mut inserted = 0;
    for conn in graph.connections() {
        if !live[conn.to.index()] {
            continue;
        }
        let Some(socket) = graph.sockets(conn.to).get(conn.to_socket).copied() else {
            continue;
        };
        let (have, want) = (graph.resolution(conn.from), graph.resolution(conn.to));
        if have == want || socket.resize_mode == ResizeMode::None {
            continue;
        }
        let adapter = ResampleOperation::new(graph.output_type(conn.from), socket.resize_mode, want);
        let id = graph.insert_on_socket(conn.to, conn.to_socket, Box::new(adapter))?;
        graph.set_resolution(id, want);
        tracing::trace!(from = %conn.from, to = %conn.to, %have, %want, "resample inserted");
        inserted += 1;
    }
    Ok(inserted)
}

fn add_buffer_pair(
    graph: &mut OperationGraph,
    writers: &mut HashMap<OperationId, OperationId>,
    producer: OperationId,
    consumer: OperationId,
    socket: usize,
) -> TilecompResult<()> {
    let data_type = graph.output_type(producer);
    let res = graph.resolution(producer);
    let write = match writers.get(&producer) {
        Some(w) => *w,
        None => {
            let w = graph.add_boxed(Box::new(WriteBufferOperation::new(data_type)));
            graph.set_resolution(w, res);
            graph.connect(producer, w, 0)?;
            writers.insert(producer, w);
            w
        }
    };
    graph.disconnect(consumer, socket);
    let read = graph.add_boxed(Box::new(ReadBufferOperation::new(data_type)));
    graph.set_resolution(read, res);
    graph.connect(write, read, 0)?;
    graph.connect(read, consumer, socket)?;
    Ok(())
}

/// Cut the graph around complex operations with write/read buffer pairs.
///
/// Each complex operation gets one write buffer on its output shared by all readers, and every
/// input of a complex operation is read through a read buffer so the whole input region is
/// available before the chunk runs.
fn insert_buffer_adapters(graph: &mut OperationGraph, outputs: &[OperationId]) -> TilecompResult<usize> {
    let live = reachable(graph, outputs);
    let complex: Vec<OperationId> = graph
        .ids()
        .filter(|id| live[id.index()] && graph.is_complex(*id))
        .collect();
    let before = graph.len();
    let mut writers = HashMap::new();

    for &op in &complex {
        for (consumer, socket) in graph.consumers_of(op) {
            if graph.role(consumer) == OperationRole::WriteBuffer {
                continue;
            }
            add_buffer_pair(graph, &mut writers, op, consumer, socket)?;
        }
    }
    for &op in &complex {
        for socket in 0..graph.inputs_of(op).len() {
            let Some(src) = graph.input(op, socket) else {
                continue;
            };
            if graph.role(src) == OperationRole::ReadBuffer {
                continue;
            }
            add_buffer_pair(graph, &mut writers, src, op, socket)?;
        }
    }
    Ok(graph.len() - before)
}

fn build_groups(graph: &OperationGraph, outputs: &[OperationId]) -> Vec<ExecutionGroup> {
    let live = reachable(graph, outputs);
    let topo = graph.topological_order();
    let mut topo_pos = vec![usize::MAX; graph.len()];
    for (pos, id) in topo.iter().enumerate() {
        topo_pos[id.index()] = pos;
    }

    let mut roots: Vec<OperationId> = outputs.to_vec();
    roots.extend(
        graph
            .ids()
            .filter(|id| live[id.index()] && graph.role(*id) == OperationRole::WriteBuffer),
    );
    roots.sort_by_key(|id| topo_pos[id.index()]);
    roots.dedup();

    roots
        .into_iter()
        .enumerate()
        .map(|(gid, root)| ExecutionGroup::new(gid, graph, root, &topo_pos))
        .collect()
}

fn root_index(groups: &[ExecutionGroup]) -> HashMap<OperationId, usize> {
    groups.iter().map(|g| (g.root(), g.id())).collect()
}

/// Compute every chunk's upstream read areas and the chunk-level dependency edges.
fn link_chunk_dependencies(graph: &OperationGraph, groups: &mut [ExecutionGroup]) {
    let by_root = root_index(groups);
    let mut links: Vec<(usize, usize, Vec<ChunkRef>, Vec<ReadArea>)> = Vec::new();

    for group in groups.iter() {
        for chunk in group.chunks() {
            let mut deps = Vec::new();
            let mut areas = Vec::new();
            for &read in group.read_buffers() {
                let Some(write) = graph.input(read, 0) else {
                    continue;
                };
                let Some(&source) = by_root.get(&write) else {
                    continue;
                };
                let Some(area) = group.determine_depending_area(graph, chunk.rect(), read) else {
                    continue;
                };
                let Some(area) = area.intersect(&groups[source].resolution().rect()) else {
                    continue;
                };
                deps.extend(
                    groups[source]
                        .chunks_for_area(area)
                        .into_iter()
                        .map(|c| ChunkRef { group: source, chunk: c }),
                );
                areas.push(ReadArea {
                    read_buffer: read,
                    source_group: source,
                    area,
                });
            }
            deps.sort();
            deps.dedup();
            links.push((group.id(), chunk.index(), deps, areas));
        }
    }

    for (gid, cid, deps, areas) in links {
        for dep in &deps {
            groups[dep.group].add_dependent(dep.chunk, ChunkRef { group: gid, chunk: cid });
        }
        groups[gid].set_dependencies(cid, deps, areas);
    }
    for g in groups.iter() {
        g.reset();
    }
}

fn upstream_groups(graph: &OperationGraph, group: &ExecutionGroup, by_root: &HashMap<OperationId, usize>) -> Vec<usize> {
    let mut out: Vec<usize> = group
        .read_buffers()
        .iter()
        .filter_map(|r| graph.input(*r, 0))
        .filter_map(|w| by_root.get(&w).copied())
        .collect();
    out.sort_unstable();
    out.dedup();
    out
}

/// Producer groups before consumer groups; ties resolve to the smallest id.
fn group_order(graph: &OperationGraph, groups: &[ExecutionGroup]) -> Vec<usize> {
    let by_root = root_index(groups);
    let n = groups.len();
    let mut indeg = vec![0usize; n];
    let mut dependents = vec![Vec::new(); n];
    for g in groups {
        for up in upstream_groups(graph, g, &by_root) {
            dependents[up].push(g.id());
            indeg[g.id()] += 1;
        }
    }
    let mut ready: BinaryHeap<Reverse<usize>> = (0..n)
        .filter(|i| indeg[*i] == 0)
        .map(Reverse)
        .collect();
    let mut order = Vec::with_capacity(n);
    while let Some(Reverse(g)) = ready.pop() {
        order.push(g);
        for &d in &dependents[g] {
            indeg[d] -= 1;
            if indeg[d] == 0 {
                ready.push(Reverse(d));
            }
        }
    }
    order
}

/// Upstream groups inherit the highest priority of the outputs they feed.
fn propagate_priorities(graph: &OperationGraph, groups: &mut [ExecutionGroup], order: &[usize]) {
    let by_root = root_index(groups);
    for &gid in order.iter().rev() {
        let priority = groups[gid].priority();
        for up in upstream_groups(graph, &groups[gid], &by_root) {
            groups[up].raise_priority(priority);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/execution/system.rs"]
mod tests;
