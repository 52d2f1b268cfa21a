// src/dag/reduce.rs

//! Transitive reduction of a [`DepGraph`].

use std::collections::HashSet;

use tracing::debug;

use crate::dag::graph::{DepGraph, NodeId};
use crate::errors::Result;

impl DepGraph {
    /// Remove edges that are already implied by a sibling edge.
    ///
    /// For a node with direct edges `c1..cn`, the edge to `ci` is dropped when
    /// `ci` is reachable from some other `cj`. Repeated edges to the same node
    /// collapse into one. Nodes are processed top-down from `start`.
    /// Reachability is unchanged.
    ///
    /// Returns the removed `(from, to)` pairs. A cycle reachable from `start`
    /// is reported as an error before anything is modified.
    pub fn reduce(&mut self, start: NodeId) -> Result<Vec<(NodeId, NodeId)>> {
        self.resolve(start)?;

        let mut removed = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![start];

        while let Some(node) = stack.pop() {
            if !seen.insert(node) {
                continue;
            }

            let children = self.edges(node).to_vec();
            let reach: Vec<HashSet<NodeId>> =
                children.iter().map(|&c| self.descendants(c)).collect();

            let mut kept: Vec<NodeId> = Vec::with_capacity(children.len());
            for (i, &child) in children.iter().enumerate() {
                let implied = reach
                    .iter()
                    .enumerate()
                    .any(|(j, r)| j != i && children[j] != child && r.contains(&child));

                if implied || kept.contains(&child) {
                    debug!(
                        from = %self.name(node),
                        to = %self.name(child),
                        "dropping redundant edge"
                    );
                    removed.push((node, child));
                } else {
                    kept.push(child);
                }
            }

            stack.extend(kept.iter().rev().copied());
            self.set_edges(node, kept);
        }

        Ok(removed)
    }
}
