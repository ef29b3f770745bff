//! # Graphkit
//!
//! A mutable labeled DAG keyed by hierarchical string IDs, plus the
//! value-carrying [`Node`] attached to each vertex.
//!
//! IDs are slash-separated paths (`"module.db/task.migrate"`); the empty
//! string is the synthetic root. Edges are directed and mean "from depends
//! on to". Containment edges run child → parent, so the tree skeleton of a
//! configuration executes root-first while explicit dependencies still
//! execute dependency-first.
//!
//! The two rewrite primitives are [`Graph::map`] (concurrent value map
//! producing a graph of a new value type) and [`Graph::transform`]
//! (concurrent per-vertex pass that may add vertices and edges to a copy
//! of the graph). Both propagate the first error deterministically: the
//! lowest-ID vertex whose callback failed wins.

pub mod error;
pub mod graph;
pub mod id;
pub mod node;

pub use error::{Error, Result};
pub use graph::{Graph, Transformer};
pub use node::{Node, NodeValue};
