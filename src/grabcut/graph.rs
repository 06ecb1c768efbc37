//! Flow network assembly and the min-cut seam.
//!
//! Node `i` is pixel `i`; the source terminal stands for foreground and the
//! sink terminal for background. Neighbor edges are undirected and stored
//! once in canonical `(min, max)` order.

use std::collections::{HashMap, VecDeque};

use pathfinding::directed::edmonds_karp::edmonds_karp_sparse;

use crate::error::GraphError;
use crate::grabcut::energy::{EnergyModel, UnaryCosts};
use crate::grabcut::matte::Label;
use crate::grabcut::smoothness::PairwiseWeights;

/// Side of the cut a pixel node ends up on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Terminal {
    /// Foreground terminal
    Source,
    /// Background terminal
    Sink,
}

impl Terminal {
    #[inline]
    pub const fn label(self) -> Label {
        match self {
            Self::Source => Label::Foreground,
            Self::Sink => Label::Background,
        }
    }
}

/// Capacities from the source to a pixel and from the pixel to the sink.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TerminalEdge {
    pub source: f64,
    pub sink: f64,
}

/// Undirected pixel-to-pixel edge, `from < to`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeighborEdge {
    pub from: usize,
    pub to: usize,
    pub capacity: f64,
}

/// Capacitated s-t network over the pixels of one iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowNetwork {
    terminals: Vec<TerminalEdge>,
    edges: Vec<NeighborEdge>,
}

impl FlowNetwork {
    /// Assembles the network for one iteration.
    ///
    /// # Errors
    ///
    /// * `GraphError::InvalidTerminalCapacity` - When a unary capacity is negative or not finite
    /// * `GraphError::InvalidEdgeCapacity` - When a pairwise capacity is negative or not finite
    pub fn build(
        unary: &UnaryCosts,
        pairwise: &PairwiseWeights,
        energy: &EnergyModel,
    ) -> Result<Self, GraphError> {
        let terminals = (0..unary.len())
            .map(|p| {
                let (source, sink) = unary.capacities(p);
                TerminalEdge { source, sink }
            })
            .collect();
        let edges = pairwise
            .edges()
            .map(|edge| NeighborEdge {
                from: edge.p,
                to: edge.q,
                capacity: energy.pairwise_capacity(edge.weight),
            })
            .collect();
        Self::validated(terminals, edges)
    }

    /// Validates raw terminal and neighbor capacities.
    ///
    /// Neighbor edges are reordered to `from < to` and sorted; self loops are
    /// dropped and repeated pairs merged by summing their capacities.
    ///
    /// # Errors
    ///
    /// * `GraphError::InvalidTerminalCapacity` - When a terminal capacity is negative or not finite
    /// * `GraphError::InvalidEdgeCapacity` - When an edge capacity is negative or not finite
    /// * `GraphError::NodeOutOfRange` - When an edge references a missing node
    pub fn from_parts(
        terminals: Vec<TerminalEdge>,
        edges: Vec<NeighborEdge>,
    ) -> Result<Self, GraphError> {
        let mut network = Self::validated(terminals, edges)?;
        network.edges.sort_unstable_by_key(|edge| (edge.from, edge.to));
        network.edges.dedup_by(|next, kept| {
            let repeated = next.from == kept.from && next.to == kept.to;
            if repeated {
                kept.capacity += next.capacity;
            }
            repeated
        });
        Ok(network)
    }

    /// Capacity checks and canonical ordering, keeping edges in input order.
    fn validated(
        terminals: Vec<TerminalEdge>,
        edges: Vec<NeighborEdge>,
    ) -> Result<Self, GraphError> {
        let node_count = terminals.len();
        for (node, terminal) in terminals.iter().enumerate() {
            for value in [terminal.source, terminal.sink] {
                if !value.is_finite() || value < 0.0 {
                    return Err(GraphError::InvalidTerminalCapacity { node, value });
                }
            }
        }

        let edges = edges
            .into_iter()
            .filter(|edge| edge.from != edge.to)
            .map(|edge| {
                if edge.from >= node_count || edge.to >= node_count {
                    return Err(GraphError::NodeOutOfRange {
                        from: edge.from,
                        to: edge.to,
                        node_count,
                    });
                }
                if !edge.capacity.is_finite() || edge.capacity < 0.0 {
                    return Err(GraphError::InvalidEdgeCapacity {
                        from: edge.from,
                        to: edge.to,
                        value: edge.capacity,
                    });
                }
                Ok(NeighborEdge {
                    from: edge.from.min(edge.to),
                    to: edge.from.max(edge.to),
                    capacity: edge.capacity,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { terminals, edges })
    }

    /// Number of pixel nodes, terminals excluded.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.terminals.len()
    }

    #[inline]
    pub fn terminals(&self) -> &[TerminalEdge] {
        &self.terminals
    }

    #[inline]
    pub fn edges(&self) -> &[NeighborEdge] {
        &self.edges
    }

    /// Value of the s-t cut induced by `sides`.
    pub fn cut_value(&self, sides: &[Terminal]) -> f64 {
        let terminal_cost: f64 = self
            .terminals
            .iter()
            .zip(sides)
            .map(|(edge, side)| match side {
                Terminal::Source => edge.sink,
                Terminal::Sink => edge.source,
            })
            .sum();
        let neighbor_cost: f64 = self
            .edges
            .iter()
            .filter(|edge| sides[edge.from] != sides[edge.to])
            .map(|edge| edge.capacity)
            .sum();
        terminal_cost + neighbor_cost
    }
}

/// Minimum s-t cut: flow value and the side of every pixel node.
#[derive(Debug, Clone, PartialEq)]
pub struct MinCut {
    pub flow: f64,
    pub sides: Vec<Terminal>,
}

/// Max-flow/min-cut engine.
///
/// Implementations must return one side per pixel node of `network`.
pub trait MinCutSolver {
    /// Cuts `network`.
    ///
    /// # Errors
    ///
    /// * `GraphError` - When the network cannot be solved
    fn solve(&mut self, network: &FlowNetwork) -> Result<MinCut, GraphError>;
}

impl<T: MinCutSolver + ?Sized> MinCutSolver for &mut T {
    fn solve(&mut self, network: &FlowNetwork) -> Result<MinCut, GraphError> {
        (**self).solve(network)
    }
}

/// Default capacity quantum: capacities are rounded to `1 / CAPACITY_SCALE`.
pub const CAPACITY_SCALE: f64 = 1e3;

/// Largest capacity sum the integer solver accepts.
const MAX_TOTAL_CAPACITY: f64 = (i64::MAX / 4) as f64;

/// Edmonds-Karp max-flow on integer-quantized capacities.
///
/// Before the max-flow runs, the network is reduced:
///
/// * the capacity shared by both terminal edges of a node is routed directly
/// * terminal capacities are capped at one quantum above the node's total
///   neighbor capacity; a node whose remaining terminal capacity exceeds that
///   total is fixed to its terminal and folded into its neighbors
/// * source-neighbor-sink paths are saturated greedily
///
/// Only the connected pieces that still hold an augmenting path are handed
/// to `pathfinding`. The partition is recovered from the residual graph:
/// nodes reachable from the source are foreground, everything else background.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdmondsKarpSolver {
    scale: f64,
}

impl Default for EdmondsKarpSolver {
    fn default() -> Self {
        Self {
            scale: CAPACITY_SCALE,
        }
    }
}

impl EdmondsKarpSolver {
    /// Solver rounding capacities to `1 / scale`.
    ///
    /// # Errors
    ///
    /// * `GraphError::SolverFailed` - When `scale` is not positive and finite
    pub fn with_scale(scale: f64) -> Result<Self, GraphError> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(GraphError::SolverFailed(format!(
                "capacity scale must be positive and finite, got {scale}"
            )));
        }
        Ok(Self { scale })
    }
}

impl MinCutSolver for EdmondsKarpSolver {
    fn solve(&mut self, network: &FlowNetwork) -> Result<MinCut, GraphError> {
        let (mut residual, direct_flow) = Residual::new(network, self.scale)?;
        residual.push_short_paths();

        let components = residual.active_components();
        log::trace!(
            "min-cut: {} free of {} nodes, {} components left for max-flow",
            residual.free_count(),
            network.node_count(),
            components.len()
        );
        let mut local = vec![usize::MAX; network.node_count()];
        for component in &components {
            residual.augment(component, &mut local);
        }

        Ok(MinCut {
            flow: direct_flow + residual.flow as f64 / self.scale,
            sides: residual.sides(),
        })
    }
}

/// Node fixed to one terminal by a capacity no cut can afford to sever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pin {
    Free,
    Source,
    Sink,
}

/// Integer residual network over the free nodes.
struct Residual {
    pins: Vec<Pin>,
    source: Vec<i64>,
    sink: Vec<i64>,
    /// Free-to-free edges, `a < b`
    ends: Vec<(usize, usize)>,
    /// Residual capacity from `a` to `b`
    forward: Vec<i64>,
    /// Residual capacity from `b` to `a`
    backward: Vec<i64>,
    /// `incident[offsets[p]..offsets[p + 1]]` are the edges touching `p`
    offsets: Vec<usize>,
    incident: Vec<usize>,
    /// Quantized flow routed so far
    flow: i64,
}

impl Residual {
    /// Quantizes `network`, returning the residual and the flow routed
    /// through nodes' shared terminal capacity, in network units.
    fn new(network: &FlowNetwork, scale: f64) -> Result<(Self, f64), GraphError> {
        let n = network.node_count();
        let edge_total = network.edges().iter().map(|e| e.capacity).sum::<f64>() * scale;
        // Capped terminals and folded edges stay below a few times the edge total
        if !(6.0 * edge_total + n as f64 <= MAX_TOTAL_CAPACITY) {
            return Err(GraphError::SolverFailed(format!(
                "total neighbor capacity {edge_total} overflows the integer flow range"
            )));
        }
        let quantize = |capacity: f64| (capacity * scale).round() as i64;

        let capacities: Vec<i64> = network
            .edges()
            .iter()
            .map(|edge| quantize(edge.capacity))
            .collect();
        let mut degree = vec![0i64; n];
        for (edge, &capacity) in network.edges().iter().zip(&capacities) {
            degree[edge.from] += capacity;
            degree[edge.to] += capacity;
        }

        let mut direct_flow = 0.0;
        let mut pins = vec![Pin::Free; n];
        let mut source = vec![0i64; n];
        let mut sink = vec![0i64; n];
        for (p, terminal) in network.terminals().iter().enumerate() {
            let shared = terminal.source.min(terminal.sink);
            direct_flow += shared;
            let limit = degree[p] + 1;
            source[p] = quantize(terminal.source - shared).min(limit);
            sink[p] = quantize(terminal.sink - shared).min(limit);
            if sink[p] > degree[p] {
                pins[p] = Pin::Sink;
            } else if source[p] > degree[p] {
                pins[p] = Pin::Source;
            }
        }

        let mut flow = 0i64;
        let mut ends = Vec::new();
        let mut forward = Vec::new();
        for (edge, &capacity) in network.edges().iter().zip(&capacities) {
            if capacity == 0 {
                continue;
            }
            let (a, b) = (edge.from, edge.to);
            match (pins[a], pins[b]) {
                (Pin::Free, Pin::Free) => {
                    ends.push((a, b));
                    forward.push(capacity);
                }
                (Pin::Free, Pin::Sink) => sink[a] += capacity,
                (Pin::Sink, Pin::Free) => sink[b] += capacity,
                (Pin::Free, Pin::Source) => source[a] += capacity,
                (Pin::Source, Pin::Free) => source[b] += capacity,
                (Pin::Source, Pin::Sink) | (Pin::Sink, Pin::Source) => flow += capacity,
                (Pin::Source, Pin::Source) | (Pin::Sink, Pin::Sink) => {}
            }
        }
        for p in 0..n {
            if pins[p] == Pin::Free {
                let shared = source[p].min(sink[p]);
                source[p] -= shared;
                sink[p] -= shared;
                flow += shared;
            } else {
                source[p] = 0;
                sink[p] = 0;
            }
        }

        let mut offsets = vec![0usize; n + 1];
        for &(a, b) in &ends {
            offsets[a + 1] += 1;
            offsets[b + 1] += 1;
        }
        for p in 0..n {
            offsets[p + 1] += offsets[p];
        }
        let mut cursor = offsets.clone();
        let mut incident = vec![0usize; offsets[n]];
        for (e, &(a, b)) in ends.iter().enumerate() {
            for end in [a, b] {
                incident[cursor[end]] = e;
                cursor[end] += 1;
            }
        }

        let backward = forward.clone();
        let residual = Self {
            pins,
            source,
            sink,
            ends,
            forward,
            backward,
            offsets,
            incident,
            flow,
        };
        Ok((residual, direct_flow))
    }

    fn free_count(&self) -> usize {
        self.pins.iter().filter(|&&pin| pin == Pin::Free).count()
    }

    #[inline]
    fn neighbors(&self, p: usize) -> &[usize] {
        &self.incident[self.offsets[p]..self.offsets[p + 1]]
    }

    /// Other end of edge `e` and the residual capacity from `from` towards it.
    #[inline]
    fn arc_from(&self, e: usize, from: usize) -> (usize, i64) {
        let (a, b) = self.ends[e];
        if from == a {
            (b, self.forward[e])
        } else {
            (a, self.backward[e])
        }
    }

    /// Other end of edge `e` and the residual capacity from it into `to`.
    #[inline]
    fn arc_into(&self, e: usize, to: usize) -> (usize, i64) {
        let (a, b) = self.ends[e];
        if to == b {
            (a, self.forward[e])
        } else {
            (b, self.backward[e])
        }
    }

    fn push(&mut self, e: usize, from: usize, amount: i64) {
        if from == self.ends[e].0 {
            self.forward[e] -= amount;
            self.backward[e] += amount;
        } else {
            self.backward[e] -= amount;
            self.forward[e] += amount;
        }
    }

    /// Saturates every source-to-neighbor-to-sink path of length two.
    fn push_short_paths(&mut self) {
        for e in 0..self.ends.len() {
            let (a, b) = self.ends[e];
            for (from, to) in [(a, b), (b, a)] {
                let (_, capacity) = self.arc_from(e, from);
                let amount = self.source[from].min(capacity).min(self.sink[to]);
                if amount > 0 {
                    self.source[from] -= amount;
                    self.sink[to] -= amount;
                    self.push(e, from, amount);
                    self.flow += amount;
                }
            }
        }
    }

    /// Free nodes reachable from the source (`towards_sink`) or reaching the
    /// sink (`!towards_sink`) through positive residual capacity.
    fn reach(&self, towards_sink: bool) -> Vec<bool> {
        let n = self.pins.len();
        let mut seen = vec![false; n];
        let mut queue: VecDeque<usize> = (0..n)
            .filter(|&p| {
                if towards_sink {
                    self.source[p] > 0
                } else {
                    self.sink[p] > 0
                }
            })
            .collect();
        for &p in &queue {
            seen[p] = true;
        }
        while let Some(p) = queue.pop_front() {
            for &e in self.neighbors(p) {
                let (q, capacity) = if towards_sink {
                    self.arc_from(e, p)
                } else {
                    self.arc_into(e, p)
                };
                if capacity > 0 && !seen[q] {
                    seen[q] = true;
                    queue.push_back(q);
                }
            }
        }
        seen
    }

    /// Connected groups of nodes that lie on some remaining augmenting path.
    fn active_components(&self) -> Vec<Vec<usize>> {
        let from_source = self.reach(true);
        let to_sink = self.reach(false);
        let active: Vec<bool> = from_source
            .iter()
            .zip(&to_sink)
            .map(|(&reached, &reaching)| reached && reaching)
            .collect();

        let mut visited = vec![false; active.len()];
        let mut components = Vec::new();
        for start in 0..active.len() {
            if !active[start] || visited[start] {
                continue;
            }
            visited[start] = true;
            let mut component = vec![start];
            let mut next = 0;
            while next < component.len() {
                let p = component[next];
                next += 1;
                for &e in self.neighbors(p) {
                    let (q, outgoing) = self.arc_from(e, p);
                    let (_, incoming) = self.arc_into(e, p);
                    if active[q] && !visited[q] && (outgoing > 0 || incoming > 0) {
                        visited[q] = true;
                        component.push(q);
                    }
                }
            }
            components.push(component);
        }
        components
    }

    /// Runs max-flow on one component and writes its flow back.
    ///
    /// `local` maps node ids to positions in `component`; stale entries from
    /// earlier components are detected, not cleared.
    fn augment(&mut self, component: &[usize], local: &mut [usize]) {
        let m = component.len();
        let (source, sink) = (m, m + 1);
        for (i, &p) in component.iter().enumerate() {
            local[p] = i;
        }

        let mut arcs = Vec::new();
        let mut edge_of = HashMap::new();
        for (i, &p) in component.iter().enumerate() {
            if self.source[p] > 0 {
                arcs.push(((source, i), self.source[p]));
            }
            if self.sink[p] > 0 {
                arcs.push(((i, sink), self.sink[p]));
            }
            for &e in self.neighbors(p) {
                let (q, capacity) = self.arc_from(e, p);
                let j = local[q];
                if j < m && component[j] == q {
                    arcs.push(((i, j), capacity));
                    edge_of.insert((i, j), e);
                }
            }
        }

        let vertices: Vec<usize> = (0..m + 2).collect();
        let (flows, routed, _) = edmonds_karp_sparse(&vertices, &source, &sink, arcs);
        for ((from, to), amount) in flows {
            if amount <= 0 {
                continue;
            }
            if from == source && to < m {
                self.source[component[to]] -= amount;
            } else if to == sink && from < m {
                self.sink[component[from]] -= amount;
            } else if let Some(&e) = edge_of.get(&(from, to)) {
                self.push(e, component[from], amount);
            }
        }
        self.flow += routed;
    }

    fn sides(&self) -> Vec<Terminal> {
        let reached = self.reach(true);
        self.pins
            .iter()
            .zip(reached)
            .map(|(pin, reached)| match pin {
                Pin::Source => Terminal::Source,
                Pin::Sink => Terminal::Sink,
                Pin::Free if reached => Terminal::Source,
                Pin::Free => Terminal::Sink,
            })
            .collect()
    }
}
