use crate::buffer::sampler::PixelSampler;
use crate::foundation::core::{DataType, Pixel, Resolution};
use crate::foundation::error::{TilecompError, TilecompResult};
use crate::operation::core::{InputSocket, InputSockets, OpShape, Operation, OperationId, OperationRole};
use crate::operation::inputs::{PixelInputs, ReadBufferSet};
use smallvec::SmallVec;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Value type describing one edge: the output of `from` feeds socket `to_socket` of `to`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Connection {
    /// Producing operation.
    pub from: OperationId,
    /// Consuming operation.
    pub to: OperationId,
    /// Socket index on `to`.
    pub to_socket: usize,
}

struct OpNode {
    op: Box<dyn Operation>,
    sockets: InputSockets,
    links: SmallVec<[Option<OperationId>; 4]>,
    output_type: DataType,
    complex: bool,
    role: OperationRole,
    resolution: Resolution,
}

/// Arena of operations and their connections. The graph is kept acyclic.
#[derive(Default)]
pub struct OperationGraph {
    nodes: Vec<OpNode>,
}

impl std::fmt::Debug for OperationGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut list = f.debug_list();
        for (i, n) in self.nodes.iter().enumerate() {
            list.entry(&format_args!(
                "{} {} {:?} -> {:?}",
                OperationId(i as u32),
                n.op.name(),
                n.links.as_slice(),
                n.resolution
            ));
        }
        list.finish()
    }
}

impl OperationGraph {
    /// Empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of operations.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// `true` when the graph holds no operations.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every operation id, in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = OperationId> + '_ {
        (0..self.nodes.len() as u32).map(OperationId)
    }

    /// Add an operation with all sockets unconnected.
    pub fn add_operation(&mut self, op: impl Operation + 'static) -> OperationId {
        self.add_boxed(Box::new(op))
    }

    /// Add an already boxed operation.
    pub fn add_boxed(&mut self, op: Box<dyn Operation>) -> OperationId {
        let id = OperationId(self.nodes.len() as u32);
        let sockets = op.inputs();
        let links = SmallVec::from_elem(None, sockets.len());
        self.nodes.push(OpNode {
            output_type: op.output_type(),
            complex: op.is_complex(),
            role: op.role(),
            op,
            sockets,
            links,
            resolution: Resolution::default(),
        });
        id
    }

    fn node(&self, id: OperationId) -> TilecompResult<&OpNode> {
        self.nodes
            .get(id.index())
            .ok_or_else(|| TilecompError::graph(format!("unknown operation {id}")))
    }

    /// Connect the output of `from` to socket `to_socket` of `to`.
    ///
    /// Fails on unknown ids, bad socket indices, an already connected socket, or when the edge
    /// would close a cycle.
    pub fn connect(&mut self, from: OperationId, to: OperationId, to_socket: usize) -> TilecompResult<()> {
        self.node(from)?;
        let target = self.node(to)?;
        let Some(slot) = target.links.get(to_socket) else {
            return Err(TilecompError::graph(format!(
                "{to} ({}) has no input socket {to_socket}",
                target.op.name()
            )));
        };
        if let Some(existing) = slot {
            return Err(TilecompError::graph(format!(
                "socket {to_socket} of {to} is already connected to {existing}"
            )));
        }
        if from == to || self.depends_on(from, to) {
            return Err(TilecompError::graph(format!(
                "connecting {from} -> {to} would create a cycle"
            )));
        }
        self.nodes[to.index()].links[to_socket] = Some(from);
        Ok(())
    }

    /// Remove the edge feeding socket `to_socket` of `to`, returning its producer.
    pub fn disconnect(&mut self, to: OperationId, to_socket: usize) -> Option<OperationId> {
        self.nodes
            .get_mut(to.index())?
            .links
            .get_mut(to_socket)?
            .take()
    }

    /// `true` when `op` transitively reads from `upstream`.
    fn depends_on(&self, op: OperationId, upstream: OperationId) -> bool {
        let mut stack = vec![op];
        let mut seen = vec![false; self.nodes.len()];
        while let Some(cur) = stack.pop() {
            if cur == upstream {
                return true;
            }
            if std::mem::replace(&mut seen[cur.index()], true) {
                continue;
            }
            stack.extend(self.nodes[cur.index()].links.iter().flatten().copied());
        }
        false
    }

    /// Borrow an operation.
    pub fn operation(&self, id: OperationId) -> Option<&dyn Operation> {
        self.nodes.get(id.index()).map(|n| n.op.as_ref())
    }

    /// Producer of every socket of `id`, `None` for unconnected sockets.
    pub fn inputs_of(&self, id: OperationId) -> &[Option<OperationId>] {
        self.nodes
            .get(id.index())
            .map(|n| n.links.as_slice())
            .unwrap_or(&[])
    }

    /// Producer of one socket.
    pub fn input(&self, id: OperationId, socket: usize) -> Option<OperationId> {
        self.inputs_of(id).get(socket).copied().flatten()
    }

    /// Every `(consumer, socket)` reading the output of `id`.
    pub fn consumers_of(&self, id: OperationId) -> Vec<(OperationId, usize)> {
        let mut out = Vec::new();
        for (i, n) in self.nodes.iter().enumerate() {
            for (s, link) in n.links.iter().enumerate() {
                if *link == Some(id) {
                    out.push((OperationId(i as u32), s));
                }
            }
        }
        out
    }

    /// All edges, ordered by consumer then socket.
    pub fn connections(&self) -> Vec<Connection> {
        let mut out = Vec::new();
        for (i, n) in self.nodes.iter().enumerate() {
            for (s, link) in n.links.iter().enumerate() {
                if let Some(from) = link {
                    out.push(Connection {
                        from: *from,
                        to: OperationId(i as u32),
                        to_socket: s,
                    });
                }
            }
        }
        out
    }

    /// Producers before consumers. Ties resolve to the smallest id first.
    pub fn topological_order(&self) -> Vec<OperationId> {
        let n = self.nodes.len();
        let mut indeg = vec![0u32; n];
        let mut dependents = vec![Vec::<u32>::new(); n];
        for (i, node) in self.nodes.iter().enumerate() {
            for from in node.links.iter().flatten() {
                dependents[from.index()].push(i as u32);
                indeg[i] = indeg[i].saturating_add(1);
            }
        }

        let mut ready = BinaryHeap::<Reverse<u32>>::new();
        for (i, &deg) in indeg.iter().enumerate() {
            if deg == 0 {
                ready.push(Reverse(i as u32));
            }
        }

        let mut order = Vec::with_capacity(n);
        while let Some(Reverse(i)) = ready.pop() {
            order.push(OperationId(i));
            for &dep in &dependents[i as usize] {
                let d = &mut indeg[dep as usize];
                *d = d.saturating_sub(1);
                if *d == 0 {
                    ready.push(Reverse(dep));
                }
            }
        }
        order
    }

    /// Negotiated resolution of `id`; zero before negotiation or for unreachable operations.
    pub fn resolution(&self, id: OperationId) -> Resolution {
        self.nodes
            .get(id.index())
            .map(|n| n.resolution)
            .unwrap_or_default()
    }

    pub(crate) fn set_resolution(&mut self, id: OperationId, res: Resolution) {
        if let Some(n) = self.nodes.get_mut(id.index()) {
            n.resolution = res;
        }
    }

    /// Socket declarations of `id`.
    pub fn sockets(&self, id: OperationId) -> &[InputSocket] {
        self.nodes
            .get(id.index())
            .map(|n| n.sockets.as_slice())
            .unwrap_or(&[])
    }

    /// Output layout of `id`.
    pub fn output_type(&self, id: OperationId) -> DataType {
        self.nodes
            .get(id.index())
            .map(|n| n.output_type)
            .unwrap_or_default()
    }

    /// `true` when `id` is a complex operation.
    pub fn is_complex(&self, id: OperationId) -> bool {
        self.nodes.get(id.index()).is_some_and(|n| n.complex)
    }

    /// Engine role of `id`.
    pub fn role(&self, id: OperationId) -> OperationRole {
        self.nodes
            .get(id.index())
            .map(|n| n.role)
            .unwrap_or_default()
    }

    /// Resolved geometry of `id` and its inputs.
    pub fn shape(&self, id: OperationId) -> OpShape {
        OpShape {
            resolution: self.resolution(id),
            input_resolutions: self
                .inputs_of(id)
                .iter()
                .map(|link| link.map(|src| self.resolution(src)).unwrap_or_default())
                .collect(),
        }
    }

    /// Splice `adapter` into the edge feeding `to_socket` of `to`.
    ///
    /// The adapter's socket 0 takes over the old producer and its output feeds the socket.
    pub(crate) fn insert_on_socket(
        &mut self,
        to: OperationId,
        to_socket: usize,
        adapter: Box<dyn Operation>,
    ) -> TilecompResult<OperationId> {
        let from = self.disconnect(to, to_socket).ok_or_else(|| {
            TilecompError::graph(format!("socket {to_socket} of {to} is not connected"))
        })?;
        let id = self.add_boxed(adapter);
        self.connect(from, id, 0)?;
        self.connect(id, to, to_socket)?;
        Ok(id)
    }

    /// Evaluate one pixel of `id` inline. Complex operations see no tile data here.
    pub(crate) fn evaluate(
        &self,
        id: OperationId,
        x: f32,
        y: f32,
        sampler: PixelSampler,
        buffers: &ReadBufferSet,
    ) -> Pixel {
        let mut out = Pixel::default();
        if let Some(node) = self.nodes.get(id.index()) {
            let inputs = PixelInputs::new(self, id, buffers);
            node.op.execute_pixel(&mut out, x, y, sampler, &inputs, None);
        }
        out
    }
}

#[cfg(test)]
#[path = "../../tests/unit/operation/graph.rs"]
mod tests;
