//! Execution order of logic nodes.
//!
//! Node-level adjacency is derived from strong links and from implicit
//! binding dependencies (anchor points and skins read their bindings). The
//! edge weight counts how many such leaf links connect a node pair. Weak links
//! never appear here.
//!
//! # Algorithm
//!
//! Kahn's algorithm: repeatedly remove nodes with in-degree zero. Ready nodes
//! are taken smallest id first, and ids grow with creation order, so the
//! resulting order is deterministic. Nodes left over when the queue runs dry
//! sit on a cycle.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use petgraph::algo::has_path_connecting;
use petgraph::graphmap::DiGraphMap;
use petgraph::Direction;

use crate::id::ObjectId;

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: DiGraphMap<ObjectId, usize>,
    order: Option<Vec<ObjectId>>,
}

/// The graph contains a cycle; carries the nodes that could not be ordered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleDetected(pub Vec<ObjectId>);

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, id: ObjectId) {
        self.graph.add_node(id);
        self.order = None;
    }

    pub fn remove_node(&mut self, id: ObjectId) {
        self.graph.remove_node(id);
        self.order = None;
    }

    pub fn add_edge(&mut self, from: ObjectId, to: ObjectId) {
        match self.graph.edge_weight_mut(from, to) {
            Some(weight) => *weight += 1,
            None => {
                self.graph.add_edge(from, to, 1);
            }
        }
        self.order = None;
    }

    pub fn remove_edge(&mut self, from: ObjectId, to: ObjectId) {
        if let Some(weight) = self.graph.edge_weight_mut(from, to) {
            *weight -= 1;
            if *weight == 0 {
                self.graph.remove_edge(from, to);
            }
        }
        self.order = None;
    }

    /// Whether adding `from -> to` would close a cycle.
    pub fn would_create_cycle(&self, from: ObjectId, to: ObjectId) -> bool {
        from == to
            || (self.graph.contains_node(to)
                && self.graph.contains_node(from)
                && has_path_connecting(&self.graph, to, from, None))
    }

    pub fn invalidate(&mut self) {
        self.order = None;
    }

    pub fn is_cached(&self) -> bool {
        self.order.is_some()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Cached execution order, recomputed after any structural change.
    pub fn order(&mut self) -> Result<&[ObjectId], CycleDetected> {
        if self.order.is_none() {
            let sorted = self.sort()?;
            tracing::debug!(nodes = sorted.len(), "computed node execution order");
            self.order = Some(sorted);
        }
        Ok(self.order.as_deref().unwrap_or_default())
    }

    fn sort(&self) -> Result<Vec<ObjectId>, CycleDetected> {
        let mut in_degree: HashMap<ObjectId, usize> = self
            .graph
            .nodes()
            .map(|n| (n, self.graph.neighbors_directed(n, Direction::Incoming).count()))
            .collect();

        let mut ready: BinaryHeap<Reverse<ObjectId>> = in_degree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(n, _)| Reverse(*n))
            .collect();

        let mut sorted = Vec::with_capacity(in_degree.len());
        while let Some(Reverse(node)) = ready.pop() {
            sorted.push(node);
            for next in self.graph.neighbors_directed(node, Direction::Outgoing) {
                if let Some(d) = in_degree.get_mut(&next) {
                    *d -= 1;
                    if *d == 0 {
                        ready.push(Reverse(next));
                    }
                }
            }
        }

        if sorted.len() != in_degree.len() {
            let mut leftover: Vec<ObjectId> = in_degree
                .into_iter()
                .filter(|(_, d)| *d > 0)
                .map(|(n, _)| n)
                .collect();
            leftover.sort();
            tracing::debug!(?leftover, "node graph contains a cycle");
            return Err(CycleDetected(leftover));
        }
        Ok(sorted)
    }
}
