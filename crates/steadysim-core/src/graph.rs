//! Read-after-write dependency graph over pending writes.
//!
//! Nodes are queries with run-local monotonically increasing ids; an edge
//! new → prev exists when `new` reads a table an earlier, still-pending
//! write mutated on the same db instance. The graph is acyclic by
//! construction because edges always point backwards in timestamp order.
//! Reads flush their dependency subtree immediately, so graphs stay small
//! and the O(|graph|) insertion scan never matters.

use std::collections::{BTreeSet, HashMap};

use indexmap::IndexMap;

use crate::error::{CoreError, CoreResult};
use crate::query::Query;

/// Node id local to one simulation run. Never persist these.
pub type NodeId = u64;

/// Pending-write table plus read-after-write edges.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: IndexMap<NodeId, Query>,
    /// id → ids it read-after-write-depends on.
    dependencies: HashMap<NodeId, BTreeSet<NodeId>>,
    next_id: NodeId,
}

impl DependencyGraph {
    /// An empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a query with a fresh id, scanning all prior nodes for
    /// read-after-write relationships.
    pub fn add(&mut self, query: Query) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;

        let mut deps = BTreeSet::new();
        for (&prev_id, prev) in &self.nodes {
            let raw = prev.kind.is_write()
                && prev.db_instance_id == query.db_instance_id
                && prev.timestamp < query.timestamp
                && prev
                    .write_table
                    .as_ref()
                    .is_some_and(|table| query.read_tables.contains(table));
            if raw {
                deps.insert(prev_id);
            }
        }

        self.dependencies.insert(id, deps);
        self.nodes.insert(id, query);
        id
    }

    /// Depth-first transitive dependency closure, excluding `id` itself.
    /// Unknown ids close over nothing.
    #[must_use]
    pub fn transitive_deps(&self, id: NodeId) -> BTreeSet<NodeId> {
        let mut visited = BTreeSet::new();
        let mut stack: Vec<NodeId> = self
            .dependencies
            .get(&id)
            .map(|deps| deps.iter().copied().collect())
            .unwrap_or_default();
        while let Some(current) = stack.pop() {
            if visited.insert(current) {
                if let Some(deps) = self.dependencies.get(&current) {
                    stack.extend(deps.iter().copied());
                }
            }
        }
        visited
    }

    /// The query stored under `id`.
    #[must_use]
    pub fn query(&self, id: NodeId) -> Option<&Query> {
        self.nodes.get(&id)
    }

    /// Whether a node exists for `id`.
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Remove a node nothing else depends on. Removing a depended-upon
    /// node is a programming bug and fails with `GraphMisuse`.
    pub fn remove(&mut self, id: NodeId) -> CoreResult<()> {
        if !self.nodes.contains_key(&id) {
            return Err(CoreError::graph_misuse(format!(
                "remove of unknown node {id}"
            )));
        }
        let depended_upon = self
            .dependencies
            .iter()
            .any(|(&other, deps)| other != id && deps.contains(&id));
        if depended_upon {
            return Err(CoreError::graph_misuse(format!(
                "node {id} still has dependents"
            )));
        }
        self.nodes.shift_remove(&id);
        self.dependencies.remove(&id);
        Ok(())
    }

    /// Remove `id` together with its whole transitive dependency closure,
    /// purging all edges into the removed set.
    pub fn remove_with_deps(&mut self, id: NodeId) -> CoreResult<()> {
        if !self.nodes.contains_key(&id) {
            return Err(CoreError::graph_misuse(format!(
                "remove_with_deps of unknown node {id}"
            )));
        }
        let mut doomed = self.transitive_deps(id);
        doomed.insert(id);

        for node in &doomed {
            self.nodes.shift_remove(node);
            self.dependencies.remove(node);
        }
        for deps in self.dependencies.values_mut() {
            deps.retain(|dep| !doomed.contains(dep));
        }
        Ok(())
    }

    /// Pending writes ordered by (hour asc, id asc): the deterministic
    /// order the hybrid drain loop consumes them in.
    #[must_use]
    pub fn pending_writes(&self) -> Vec<(NodeId, &Query)> {
        let mut writes: Vec<(NodeId, &Query)> = self
            .nodes
            .iter()
            .filter(|(_, query)| query.kind.is_write())
            .map(|(&id, query)| (id, query))
            .collect();
        writes.sort_by_key(|(id, query)| (query.hour, *id));
        writes
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when no work is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
