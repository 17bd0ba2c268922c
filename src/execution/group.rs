use crate::buffer::memory_buffer::MemoryBuffer;
use crate::buffer::sampler::PixelSampler;
use crate::config::compositor::ChunkOrder;
use crate::execution::chunk_order::chunk_distance;
use crate::foundation::core::{Rect, Resolution, TRANSPARENT};
use crate::operation::core::{OperationId, OperationRole};
use crate::operation::graph::OperationGraph;
use crate::operation::inputs::{PixelInputs, ReadBufferSet};
use std::sync::atomic::{AtomicU8, AtomicU32, AtomicUsize, Ordering};

/// Lifecycle of one chunk within a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ChunkState {
    /// Not yet handed to the scheduler.
    Created = 0,
    /// Queued or running.
    Scheduled = 1,
    /// Output computed and published.
    Finished = 2,
}

impl ChunkState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => ChunkState::Created,
            1 => ChunkState::Scheduled,
            _ => ChunkState::Finished,
        }
    }
}

/// Address of a chunk: group index plus chunk index within the group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChunkRef {
    /// Group index.
    pub group: usize,
    /// Chunk index within the group.
    pub chunk: usize,
}

/// Region of an upstream group a chunk reads through one of its read buffers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadArea {
    /// Read-buffer operation inside the reading group.
    pub read_buffer: OperationId,
    /// Group producing the data.
    pub source_group: usize,
    /// Area in the source group's space, clipped to its resolution.
    pub area: Rect,
}

/// One rectangular tile of a group's output.
#[derive(Debug)]
pub struct Chunk {
    index: usize,
    rect: Rect,
    distance: f32,
    depends_on: Vec<ChunkRef>,
    dependents: Vec<ChunkRef>,
    read_areas: Vec<ReadArea>,
    pending: AtomicU32,
    state: AtomicU8,
    readers: AtomicU32,
}

impl Chunk {
    fn new(index: usize, rect: Rect, distance: f32) -> Self {
        Self {
            index,
            rect,
            distance,
            depends_on: Vec::new(),
            dependents: Vec::new(),
            read_areas: Vec::new(),
            pending: AtomicU32::new(0),
            state: AtomicU8::new(ChunkState::Created as u8),
            readers: AtomicU32::new(0),
        }
    }

    /// Index within the owning group.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Output area, in the group's space.
    pub fn rect(&self) -> Rect {
        self.rect
    }

    /// Scheduling distance; smaller runs first.
    pub fn distance(&self) -> f32 {
        self.distance
    }

    /// Upstream chunks whose data this chunk reads.
    pub fn depends_on(&self) -> &[ChunkRef] {
        &self.depends_on
    }

    /// Downstream chunks reading this chunk.
    pub fn dependents(&self) -> &[ChunkRef] {
        &self.dependents
    }

    /// Upstream regions consolidated before this chunk runs.
    pub fn read_areas(&self) -> &[ReadArea] {
        &self.read_areas
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ChunkState {
        ChunkState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Dependencies not yet finished in the current run.
    pub fn unfinished_dependencies(&self) -> u32 {
        self.pending.load(Ordering::Acquire)
    }

    pub(crate) fn reset(&self) {
        self.pending
            .store(self.depends_on.len() as u32, Ordering::Release);
        self.readers
            .store(self.dependents.len() as u32, Ordering::Release);
        self.state
            .store(ChunkState::Created as u8, Ordering::Release);
    }

    /// Claim the chunk for scheduling. Only the first caller wins.
    pub(crate) fn try_schedule(&self) -> bool {
        self.state
            .compare_exchange(
                ChunkState::Created as u8,
                ChunkState::Scheduled as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub(crate) fn finish(&self) {
        self.state
            .store(ChunkState::Finished as u8, Ordering::Release);
    }

    /// Record one finished dependency; `true` when it was the last.
    pub(crate) fn dependency_finished(&self) -> bool {
        self.pending
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| v.checked_sub(1))
            .is_ok_and(|prev| prev == 1)
    }

    /// Record one finished reader; `true` when it was the last.
    pub(crate) fn reader_finished(&self) -> bool {
        self.readers
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| v.checked_sub(1))
            .is_ok_and(|prev| prev == 1)
    }
}

/// Maximal connected set of operations computed together per chunk.
///
/// A group is rooted at a write buffer or an output operation and extends upstream until it hits
/// read buffers, which belong to the group but mark its boundary.
#[derive(Debug)]
pub struct ExecutionGroup {
    id: usize,
    root: OperationId,
    producer: OperationId,
    operations: Vec<OperationId>,
    read_buffers: Vec<OperationId>,
    resolution: Resolution,
    chunk_size: u32,
    chunks_x: u32,
    chunks_y: u32,
    chunks: Vec<Chunk>,
    output_name: Option<String>,
    priority: u8,
    finished: AtomicUsize,
}

impl ExecutionGroup {
    /// Collect the operations feeding `root`, stopping at read buffers.
    pub(crate) fn new(id: usize, graph: &OperationGraph, root: OperationId, topo_pos: &[usize]) -> Self {
        let mut seen = vec![false; graph.len()];
        let mut members = Vec::new();
        let mut read_buffers = Vec::new();
        let mut stack = vec![root];
        while let Some(op) = stack.pop() {
            if std::mem::replace(&mut seen[op.index()], true) {
                continue;
            }
            members.push(op);
            if op != root && graph.role(op) == OperationRole::ReadBuffer {
                read_buffers.push(op);
                continue;
            }
            stack.extend(graph.inputs_of(op).iter().flatten().copied());
        }
        members.sort_by_key(|op| topo_pos.get(op.index()).copied().unwrap_or(usize::MAX));
        read_buffers.sort();

        let producer = if graph.role(root) == OperationRole::WriteBuffer {
            graph.input(root, 0).unwrap_or(root)
        } else {
            root
        };
        let op = graph.operation(root);
        let is_output = graph.role(root) != OperationRole::WriteBuffer;
        Self {
            id,
            root,
            producer,
            operations: members,
            read_buffers,
            resolution: graph.resolution(root),
            chunk_size: 0,
            chunks_x: 0,
            chunks_y: 0,
            chunks: Vec::new(),
            output_name: is_output.then(|| {
                op.and_then(|o| o.output_name())
                    .map(str::to_owned)
                    .unwrap_or_else(|| format!("output{id}"))
            }),
            priority: op.map(|o| o.render_priority()).unwrap_or(0),
            finished: AtomicUsize::new(0),
        }
    }

    /// Split the frame into chunks of `chunk_size` and compute their scheduling distances.
    pub(crate) fn init_chunks(&mut self, chunk_size: u32, order: ChunkOrder, hotspots: &[[f32; 2]]) {
        let size = chunk_size.max(1);
        self.chunk_size = size;
        self.chunks_x = self.resolution.width.div_ceil(size);
        self.chunks_y = self.resolution.height.div_ceil(size);
        let count = self.chunks_x as usize * self.chunks_y as usize;
        self.chunks = (0..count)
            .map(|i| {
                let rect = self.chunk_rect(i);
                Chunk::new(i, rect, chunk_distance(order, hotspots, i, rect, self.resolution))
            })
            .collect();
    }

    pub(crate) fn set_dependencies(&mut self, chunk: usize, depends_on: Vec<ChunkRef>, read_areas: Vec<ReadArea>) {
        if let Some(c) = self.chunks.get_mut(chunk) {
            c.depends_on = depends_on;
            c.read_areas = read_areas;
        }
    }

    pub(crate) fn add_dependent(&mut self, chunk: usize, dependent: ChunkRef) {
        if let Some(c) = self.chunks.get_mut(chunk) {
            c.dependents.push(dependent);
        }
    }

    pub(crate) fn raise_priority(&mut self, priority: u8) {
        self.priority = self.priority.max(priority);
    }

    /// Group index within the execution system.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Write buffer or output operation the group is rooted at.
    pub fn root(&self) -> OperationId {
        self.root
    }

    /// Operation whose pixels fill the chunk buffers.
    pub fn producer(&self) -> OperationId {
        self.producer
    }

    /// Member operations, producers first.
    pub fn operations(&self) -> &[OperationId] {
        &self.operations
    }

    /// Read buffers marking the group's upstream boundary.
    pub fn read_buffers(&self) -> &[OperationId] {
        &self.read_buffers
    }

    /// Output resolution.
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Edge length of a full chunk.
    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    /// Chunk grid dimensions.
    pub fn chunk_grid(&self) -> (u32, u32) {
        (self.chunks_x, self.chunks_y)
    }

    /// All chunks, row-major.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// One chunk.
    pub fn chunk(&self, index: usize) -> Option<&Chunk> {
        self.chunks.get(index)
    }

    /// Label of the output this group renders, `None` for write-buffer groups.
    pub fn output_name(&self) -> Option<&str> {
        self.output_name.as_deref()
    }

    /// `true` when the group renders a final output.
    pub fn is_output(&self) -> bool {
        self.output_name.is_some()
    }

    /// Scheduling priority, inherited from the outputs the group feeds.
    pub fn priority(&self) -> u8 {
        self.priority
    }

    /// Chunk indices in scheduling order (distance, then index).
    pub fn chunk_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.chunks.len()).collect();
        order.sort_by(|a, b| {
            self.chunks[*a]
                .distance
                .total_cmp(&self.chunks[*b].distance)
                .then(a.cmp(b))
        });
        order
    }

    /// Area of chunk `index`, clipped to the group's resolution.
    ///
    /// Chunks are numbered row-major; the last row and column may be partial.
    pub fn chunk_rect(&self, index: usize) -> Rect {
        if self.chunks_x == 0 {
            return Rect::default();
        }
        let cx = (index % self.chunks_x as usize) as i64;
        let cy = (index / self.chunks_x as usize) as i64;
        let size = i64::from(self.chunk_size);
        let x0 = (cx * size).min(i64::from(i32::MAX)) as i32;
        let y0 = (cy * size).min(i64::from(i32::MAX)) as i32;
        let full = Rect::new(x0, y0, x0.saturating_add(size as i32), y0.saturating_add(size as i32));
        full.intersect(&self.resolution.rect()).unwrap_or_default()
    }

    /// Indices of the chunks overlapping `area`.
    pub fn chunks_for_area(&self, area: Rect) -> Vec<usize> {
        let Some(area) = area.intersect(&self.resolution.rect()) else {
            return Vec::new();
        };
        let size = self.chunk_size.max(1) as i32;
        let (x0, x1) = (area.xmin / size, (area.xmax - 1) / size);
        let (y0, y1) = (area.ymin / size, (area.ymax - 1) / size);
        let mut out = Vec::with_capacity(((x1 - x0 + 1) * (y1 - y0 + 1)) as usize);
        for cy in y0..=y1 {
            for cx in x0..=x1 {
                out.push(cy as usize * self.chunks_x as usize + cx as usize);
            }
        }
        out
    }

    /// Area of `read_buffer` needed to compute `rect` of the group's output.
    ///
    /// Walks every path from the root to the read buffer, mapping the area through each
    /// operation's footprint. Paths are merged by union. `None` when the read buffer is not
    /// reachable or the area is empty.
    pub fn determine_depending_area(
        &self,
        graph: &OperationGraph,
        rect: Rect,
        read_buffer: OperationId,
    ) -> Option<Rect> {
        let mut acc: Option<Rect> = None;
        self.depending_area_from(graph, self.root, rect, read_buffer, &mut acc);
        acc.filter(|r| !r.is_empty())
    }

    fn depending_area_from(
        &self,
        graph: &OperationGraph,
        op: OperationId,
        rect: Rect,
        target: OperationId,
        acc: &mut Option<Rect>,
    ) {
        if op == target {
            *acc = Some(acc.map_or(rect, |a| a.union(&rect)));
            return;
        }
        if rect.is_empty() || (op != self.root && graph.role(op) == OperationRole::ReadBuffer) {
            return;
        }
        let Some(operation) = graph.operation(op) else {
            return;
        };
        let shape = graph.shape(op);
        for (socket, link) in graph.inputs_of(op).iter().enumerate() {
            let Some(src) = link else {
                continue;
            };
            let area = operation.depending_area_of_interest(socket, rect, &shape);
            self.depending_area_from(graph, *src, area, target, acc);
        }
    }

    /// Compute every pixel of `chunk` into `out`.
    ///
    /// `buffers` holds the consolidated read-buffer regions. Complex producers get their tile
    /// data for the chunk before the first pixel.
    pub(crate) fn execute_chunk(
        &self,
        graph: &OperationGraph,
        chunk: &Chunk,
        buffers: &ReadBufferSet,
        out: &mut MemoryBuffer,
    ) {
        let Some(op) = graph.operation(self.producer) else {
            return;
        };
        let rect = chunk.rect;
        let inputs = PixelInputs::new(graph, self.producer, buffers);
        let tile = if graph.is_complex(self.producer) {
            op.initialize_tile_data(rect, &inputs)
        } else {
            None
        };
        let from = graph.output_type(self.producer);
        let to = out.data_type();
        for y in rect.ymin..rect.ymax {
            for x in rect.xmin..rect.xmax {
                let mut px = TRANSPARENT;
                op.execute_pixel(
                    &mut px,
                    x as f32,
                    y as f32,
                    PixelSampler::Nearest,
                    &inputs,
                    tile.as_ref(),
                );
                out.write_pixel(x, y, &from.convert(to, px));
            }
        }
        if let Some(tile) = tile {
            op.deinitialize_tile_data(tile);
        }
    }

    pub(crate) fn reset(&self) {
        self.finished.store(0, Ordering::Release);
        for c in &self.chunks {
            c.reset();
        }
    }

    /// Record one finished chunk; `true` when it completed the group.
    pub(crate) fn chunk_finished(&self) -> bool {
        self.finished.fetch_add(1, Ordering::AcqRel) + 1 == self.chunks.len()
    }

    /// Chunks finished in the current run.
    pub fn finished_chunks(&self) -> usize {
        self.finished.load(Ordering::Acquire)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/execution/group.rs"]
mod tests;
