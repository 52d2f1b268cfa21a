// src/dag/graph.rs

use std::collections::HashSet;

use tracing::{debug, trace};

use crate::errors::{Result, TycheError};

/// Index of a node inside a [`DepGraph`].
pub type NodeId = usize;

/// A named node and its outgoing edges, in insertion order.
///
/// Duplicate edges are allowed; resolution visits each target once.
#[derive(Debug, Clone)]
struct GraphNode {
    name: String,
    edges: Vec<NodeId>,
}

/// Visit state used by [`DepGraph::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    /// On the current depth-first path.
    Unresolved,
    Resolved,
}

/// Arena-backed dependency graph.
///
/// An edge `a -> b` means "`a` depends on `b`": `b` has to be handled before
/// `a`. Nodes are addressed by the [`NodeId`] returned from [`add_node`],
/// never by reference, so the graph can be rewritten freely after it is built.
///
/// [`add_node`]: DepGraph::add_node
#[derive(Debug, Clone, Default)]
pub struct DepGraph {
    nodes: Vec<GraphNode>,
}

impl DepGraph {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Add a node and return its id.
    pub fn add_node(&mut self, name: impl Into<String>) -> NodeId {
        self.nodes.push(GraphNode {
            name: name.into(),
            edges: Vec::new(),
        });
        self.nodes.len() - 1
    }

    /// Append `to` to the edge list of `from`. No deduplication happens here.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId) {
        self.nodes[from].edges.push(to);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn name(&self, id: NodeId) -> &str {
        &self.nodes[id].name
    }

    /// Direct edges of `id`, in insertion order.
    pub fn edges(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].edges
    }

    pub(crate) fn set_edges(&mut self, id: NodeId, edges: Vec<NodeId>) {
        self.nodes[id].edges = edges;
    }

    /// First node with the given name.
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.nodes.iter().position(|n| n.name == name)
    }

    /// Every node reachable from `id` through at least one edge.
    ///
    /// `id` itself is only included when it sits on a cycle.
    pub fn descendants(&self, id: NodeId) -> HashSet<NodeId> {
        let mut seen = HashSet::new();
        let mut stack: Vec<NodeId> = self.edges(id).to_vec();

        while let Some(node) = stack.pop() {
            if seen.insert(node) {
                stack.extend(self.edges(node).iter().copied());
            }
        }

        seen
    }

    /// Resolve the dependency order of everything reachable from `start`.
    ///
    /// The result is a post-order: every node appears exactly once, after all
    /// of its edge targets, with `start` last. A node met again while it is
    /// still on the current path is a cycle and aborts resolution.
    pub fn resolve(&self, start: NodeId) -> Result<Vec<NodeId>> {
        let mut marks = vec![Mark::Unvisited; self.nodes.len()];
        let mut resolved = Vec::new();
        self.visit(start, &mut marks, &mut resolved)?;
        debug!(
            start = %self.name(start),
            count = resolved.len(),
            "resolved dependency order"
        );
        Ok(resolved)
    }

    /// Like [`resolve`](Self::resolve), truncated after the first node named
    /// `stop_at` (inclusive).
    pub fn resolve_until(&self, start: NodeId, stop_at: Option<&str>) -> Result<Vec<NodeId>> {
        let order = self.resolve(start)?;
        match stop_at {
            Some(stop) => self.truncate_at(order, stop),
            None => Ok(order),
        }
    }

    /// Drop everything after the first occurrence of `stop_at`.
    ///
    /// A name missing from `order` is a [`TycheError::TaskNotFound`], so a
    /// misspelt stop point never turns into a full build.
    pub fn truncate_at(&self, mut order: Vec<NodeId>, stop_at: &str) -> Result<Vec<NodeId>> {
        let idx = order
            .iter()
            .position(|&id| self.name(id) == stop_at)
            .ok_or_else(|| TycheError::TaskNotFound(stop_at.to_string()))?;
        order.truncate(idx + 1);
        Ok(order)
    }

    fn visit(&self, node: NodeId, marks: &mut [Mark], resolved: &mut Vec<NodeId>) -> Result<()> {
        marks[node] = Mark::Unresolved;

        for &edge in self.edges(node) {
            match marks[edge] {
                Mark::Resolved => {}
                Mark::Unresolved => {
                    return Err(TycheError::CircularDependency {
                        from: self.name(node).to_string(),
                        to: self.name(edge).to_string(),
                    });
                }
                Mark::Unvisited => {
                    trace!(from = %self.name(node), to = %self.name(edge), "walking edge");
                    self.visit(edge, marks, resolved)?;
                }
            }
        }

        marks[node] = Mark::Resolved;
        resolved.push(node);
        Ok(())
    }
}
