//! The labeled DAG.
//!
//! Vertices are keyed by hierarchical string ID; edges are directed
//! (from, to) pairs meaning "from depends on to". The graph is mutable
//! during construction and resolution, then treated as read-only once it
//! is handed to the scheduler.

use crate::error::{Error, Result};
use crate::id;
use crate::node::{Node, NodeValue};
use petgraph::Direction;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// A mutable labeled DAG keyed by hierarchical string IDs.
#[derive(Debug, Clone)]
pub struct Graph<T: NodeValue> {
    inner: StableDiGraph<Node<T>, ()>,
    index: HashMap<String, NodeIndex>,
}

impl<T: NodeValue> Default for Graph<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: NodeValue> Graph<T> {
    /// Create an empty graph.
    pub fn new() -> Self {
        Graph {
            inner: StableDiGraph::new(),
            index: HashMap::new(),
        }
    }

    /// Add a node. Adding an ID that is already present replaces the
    /// carried value and keeps the vertex's edges.
    pub fn add(&mut self, node: Node<T>) {
        match self.index.get(node.id()) {
            Some(&ix) => {
                self.inner[ix] = node;
            }
            None => {
                let id = node.id().to_string();
                let ix = self.inner.add_node(node);
                self.index.insert(id, ix);
            }
        }
    }

    /// Look up a node by ID.
    pub fn get(&self, id: &str) -> Option<&Node<T>> {
        self.index.get(id).map(|&ix| &self.inner[ix])
    }

    /// Whether the graph contains `id`.
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Number of vertices.
    pub fn len(&self) -> usize {
        self.inner.node_count()
    }

    /// Whether the graph has no vertices.
    pub fn is_empty(&self) -> bool {
        self.inner.node_count() == 0
    }

    /// All vertex IDs, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.index.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Iterate over all nodes in unspecified order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node<T>> {
        self.inner.node_weights()
    }

    /// All edges as (from, to) ID pairs, sorted.
    pub fn edges(&self) -> Vec<(String, String)> {
        let mut out: Vec<(String, String)> = self
            .inner
            .edge_indices()
            .filter_map(|e| self.inner.edge_endpoints(e))
            .map(|(a, b)| {
                (
                    self.inner[a].id().to_string(),
                    self.inner[b].id().to_string(),
                )
            })
            .collect();
        out.sort();
        out
    }

    /// Add a dependency edge `from -> to`. Idempotent: connecting an
    /// existing edge is a no-op. Errors if either endpoint is absent.
    pub fn connect(&mut self, from: &str, to: &str) -> Result<()> {
        let a = self.must_index(from)?;
        let b = self.must_index(to)?;
        if !self.inner.contains_edge(a, b) {
            self.inner.add_edge(a, b, ());
        }
        Ok(())
    }

    /// Remove the edge `from -> to` if it exists.
    pub fn disconnect(&mut self, from: &str, to: &str) {
        if let (Some(&a), Some(&b)) = (self.index.get(from), self.index.get(to))
            && let Some(e) = self.inner.find_edge(a, b)
        {
            self.inner.remove_edge(e);
        }
    }

    /// Remove a vertex and all its edges.
    pub fn remove(&mut self, id: &str) {
        if let Some(ix) = self.index.remove(id) {
            self.inner.remove_node(ix);
        }
    }

    fn must_index(&self, id: &str) -> Result<NodeIndex> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| Error::MissingVertex(id.to_string()))
    }

    /// Direct dependencies of `id`: targets of its out-edges, sorted.
    pub fn dependencies(&self, id: &str) -> Vec<String> {
        self.neighbor_ids(id, Direction::Outgoing)
    }

    /// Direct dependents of `id`: sources of its in-edges, sorted.
    pub fn dependents(&self, id: &str) -> Vec<String> {
        self.neighbor_ids(id, Direction::Incoming)
    }

    fn neighbor_ids(&self, id: &str, dir: Direction) -> Vec<String> {
        let Some(&ix) = self.index.get(id) else {
            return Vec::new();
        };
        let mut out: Vec<String> = self
            .inner
            .neighbors_directed(ix, dir)
            .map(|n| self.inner[n].id().to_string())
            .collect();
        out.sort();
        out
    }

    /// Every vertex reachable from `id` by following dependency edges,
    /// sorted. `id` itself is not included.
    pub fn downstream_dependencies(&self, id: &str) -> Vec<String> {
        let Some(&start) = self.index.get(id) else {
            return Vec::new();
        };
        let mut seen: HashSet<NodeIndex> = HashSet::new();
        let mut stack = vec![start];
        while let Some(ix) = stack.pop() {
            for next in self.inner.neighbors_directed(ix, Direction::Outgoing) {
                if seen.insert(next) {
                    stack.push(next);
                }
            }
        }
        let mut out: Vec<String> = seen
            .into_iter()
            .map(|ix| self.inner[ix].id().to_string())
            .collect();
        out.sort();
        out
    }

    /// Every vertex whose ID lies under `id` in the containment tree,
    /// sorted. The root's descendents are all non-root vertices.
    pub fn descendents(&self, id: &str) -> Vec<String> {
        let mut out: Vec<String> = if id::is_root(id) {
            self.index.keys().filter(|k| !id::is_root(k)).cloned().collect()
        } else {
            let prefix = format!("{id}{}", id::SEPARATOR);
            self.index
                .keys()
                .filter(|k| k.starts_with(&prefix))
                .cloned()
                .collect()
        };
        out.sort();
        out
    }

    /// Direct children of `id` in the containment tree, sorted.
    pub fn children(&self, id: &str) -> Vec<String> {
        let mut out: Vec<String> = self
            .index
            .keys()
            .filter(|k| !id::is_root(k) && id::parent_id(k) == id)
            .cloned()
            .collect();
        out.sort();
        out
    }

    /// Concurrent map over vertices producing a graph of a new value
    /// type. Edges are preserved; group tags are re-derived from the
    /// mapped values. On failure the error of the lowest-ID failing
    /// vertex is returned.
    pub fn map<U, E, F>(&self, f: F) -> std::result::Result<Graph<U>, E>
    where
        U: NodeValue,
        E: Send,
        F: Fn(&Node<T>) -> std::result::Result<U, E> + Send + Sync,
    {
        let nodes: Vec<&Node<T>> = self.inner.node_weights().collect();
        let results: Vec<(&Node<T>, std::result::Result<U, E>)> =
            nodes.into_par_iter().map(|n| (n, f(n))).collect();

        let mut mapped = Vec::with_capacity(results.len());
        let mut first_err: Option<(String, E)> = None;
        for (node, result) in results {
            match result {
                Ok(value) => mapped.push(node.with_value(value)),
                Err(err) => {
                    let worse = first_err
                        .as_ref()
                        .is_none_or(|(id, _)| node.id() < id.as_str());
                    if worse {
                        first_err = Some((node.id().to_string(), err));
                    }
                }
            }
        }
        if let Some((_, err)) = first_err {
            return Err(err);
        }

        let mut out = Graph::new();
        for node in mapped {
            out.add(node);
        }
        for (from, to) in self.edges() {
            // endpoints survive the map by construction
            let _ = out.connect(&from, &to);
        }
        Ok(out)
    }

    /// Concurrent per-vertex pass over a copy of the graph. The callback
    /// reads the original graph and writes whole-node replacements and
    /// new edges through the [`Transformer`]. First error (lowest ID)
    /// wins.
    pub fn transform<E, F>(&self, f: F) -> std::result::Result<Graph<T>, E>
    where
        E: Send,
        F: Fn(&Node<T>, &Transformer<T>) -> std::result::Result<(), E> + Send + Sync,
    {
        let out = Transformer {
            graph: Mutex::new(self.clone()),
        };
        let failures: Mutex<Option<(String, E)>> = Mutex::new(None);

        let nodes: Vec<&Node<T>> = self.inner.node_weights().collect();
        nodes.into_par_iter().for_each(|meta| {
            if let Err(err) = f(meta, &out) {
                let mut slot = failures.lock().unwrap();
                let worse = slot.as_ref().is_none_or(|(id, _)| meta.id() < id.as_str());
                if worse {
                    *slot = Some((meta.id().to_string(), err));
                }
            }
        });

        if let Some((_, err)) = failures.into_inner().unwrap() {
            return Err(err);
        }
        Ok(out.graph.into_inner().unwrap())
    }

    /// Reject cycles and orphaned vertices.
    pub fn validate(&self) -> Result<()> {
        for id in self.index.keys() {
            if !id::is_root(id) && !self.index.contains_key(id::parent_id(id)) {
                return Err(Error::Orphan(id.clone()));
            }
        }
        if let Some(cycle) = self.find_cycle() {
            return Err(Error::Cycle(cycle.join(" -> ")));
        }
        Ok(())
    }

    /// DFS with a coloring set; returns the first cycle found as a path.
    fn find_cycle(&self) -> Option<Vec<String>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Color {
            Gray,
            Black,
        }

        let mut colors: HashMap<NodeIndex, Color> = HashMap::new();
        for start in self.inner.node_indices() {
            if colors.contains_key(&start) {
                continue;
            }
            // iterative DFS keeping the gray path for cycle reporting
            let mut stack: Vec<(NodeIndex, bool)> = vec![(start, false)];
            let mut path: Vec<NodeIndex> = Vec::new();
            while let Some((ix, children_done)) = stack.pop() {
                if children_done {
                    colors.insert(ix, Color::Black);
                    path.pop();
                    continue;
                }
                if colors.contains_key(&ix) {
                    // reached through another parent while queued
                    continue;
                }
                colors.insert(ix, Color::Gray);
                path.push(ix);
                stack.push((ix, true));
                for next in self.inner.neighbors_directed(ix, Direction::Outgoing) {
                    match colors.get(&next) {
                        Some(Color::Gray) => {
                            let mut cycle: Vec<String> = path
                                .iter()
                                .skip_while(|&&p| p != next)
                                .map(|&p| self.inner[p].id().to_string())
                                .collect();
                            cycle.push(self.inner[next].id().to_string());
                            return Some(cycle);
                        }
                        Some(Color::Black) => {}
                        None => stack.push((next, false)),
                    }
                }
            }
        }
        None
    }

    /// Render the graph in DOT format for `graphviz`.
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph {\n");
        for id in self.ids() {
            let label = if id::is_root(&id) { "root" } else { &id };
            out.push_str(&format!("  \"{label}\";\n"));
        }
        for (from, to) in self.edges() {
            let from = if from.is_empty() { "root" } else { &from };
            let to = if to.is_empty() { "root" } else { &to };
            out.push_str(&format!("  \"{from}\" -> \"{to}\";\n"));
        }
        out.push_str("}\n");
        out
    }
}

/// Write handle for [`Graph::transform`] callbacks. Writers add to the
/// new graph; readers read the old one.
pub struct Transformer<T: NodeValue> {
    graph: Mutex<Graph<T>>,
}

impl<T: NodeValue> Transformer<T> {
    /// Replace or insert a node in the new graph.
    pub fn add(&self, node: Node<T>) {
        self.graph.lock().unwrap().add(node);
    }

    /// Add an edge in the new graph.
    pub fn connect(&self, from: &str, to: &str) -> Result<()> {
        self.graph.lock().unwrap().connect(from, to)
    }
}
