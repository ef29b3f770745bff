//! The value carrier attached to each graph vertex.

/// Capability bound for vertex values.
///
/// Values flow through the pipeline as parse nodes, prepared tasks, and
/// finally evaluated results; all of them are cheap to clone and safe to
/// share across the worker pool. A value that belongs to an execution
/// group reports it through [`NodeValue::group`].
pub trait NodeValue: Clone + Send + Sync {
    /// The execution group this value belongs to, if any. An empty string
    /// is treated as no group.
    fn group(&self) -> Option<String> {
        None
    }
}

/// An immutable record of `{id, value, group}` attached to a graph vertex.
///
/// The group tag is derived from the value at construction time, so it is
/// stable for a given value. [`Node::with_value`] returns a fresh node
/// sharing no mutable state with the original.
#[derive(Debug, Clone)]
pub struct Node<T: NodeValue> {
    id: String,
    value: T,
    group: Option<String>,
}

impl<T: NodeValue> Node<T> {
    /// Create a node, deriving the group tag from the value.
    pub fn new(id: impl Into<String>, value: T) -> Self {
        let group = value.group().filter(|g| !g.is_empty());
        Node {
            id: id.into(),
            value,
            group,
        }
    }

    /// The vertex ID.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The carried value.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// The group tag, if the value reported one.
    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    /// A fresh node with the same ID and a new value. The group tag is
    /// re-derived from the new value.
    pub fn with_value<U: NodeValue>(&self, value: U) -> Node<U> {
        Node::new(self.id.clone(), value)
    }

    /// Consume the node, returning its value.
    pub fn into_value(self) -> T {
        self.value
    }
}

impl NodeValue for i64 {}
impl NodeValue for String {}
