//! The parse tree node.

use crate::value::Value;
use graphkit::NodeValue;

/// One block of a module: a kind, an optional name, typed fields, and
/// nested child blocks.
///
/// `case` blocks additionally carry a predicate expression; an unnamed
/// `default` block is normalized by the parser into a final `case` with
/// no predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    kind: String,
    name: String,
    predicate: Option<String>,
    fields: Vec<(String, Value)>,
    children: Vec<Node>,
}

impl Node {
    pub(crate) fn new(
        kind: String,
        name: String,
        predicate: Option<String>,
        fields: Vec<(String, Value)>,
        children: Vec<Node>,
    ) -> Self {
        Node {
            kind,
            name,
            predicate,
            fields,
            children,
        }
    }

    /// A synthetic container node with no fields of its own. Used for the
    /// graph root and inlined module boundaries.
    pub fn container(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Node {
            kind: kind.into(),
            name: name.into(),
            predicate: None,
            fields: Vec::new(),
            children: Vec::new(),
        }
    }

    /// The block kind, e.g. `"task"` or `"file.content"`.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The block name. Empty for unnamed blocks.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The `case` predicate expression, if any. `None` on a normalized
    /// `default` branch means "always true".
    pub fn predicate(&self) -> Option<&str> {
        self.predicate.as_deref()
    }

    /// The ID segment this block contributes to its vertex path.
    pub fn segment(&self) -> String {
        if self.name.is_empty() {
            self.kind.clone()
        } else {
            format!("{}.{}", self.kind, self.name)
        }
    }

    /// Look up a raw field value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Look up a string field. `None` distinguishes an absent key from a
    /// present-but-empty value.
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Look up a list-of-strings field. A bare string is treated as a
    /// one-element list.
    pub fn get_string_slice(&self, key: &str) -> Option<Vec<&str>> {
        match self.get(key)? {
            Value::String(s) => Some(vec![s.as_str()]),
            Value::List(items) => Some(items.iter().filter_map(Value::as_str).collect()),
            _ => None,
        }
    }

    /// Every string-valued leaf of this block's fields, depth first.
    /// Used by the dependency resolver to scan for template calls; the
    /// `case` predicate is an expression, not a template, and is scanned
    /// separately through [`Node::predicate`].
    pub fn strings(&self) -> Vec<&str> {
        let mut out = Vec::new();
        for (_, v) in &self.fields {
            v.collect_strings(&mut out);
        }
        out
    }

    /// All fields in declaration order.
    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    /// Nested child blocks in declaration order.
    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Move the children out, leaving the block childless. The loader
    /// promotes children to their own vertices.
    pub fn take_children(&mut self) -> Vec<Node> {
        std::mem::take(&mut self.children)
    }

    /// Set a field, replacing an existing value for the key. The loader
    /// uses this to seed `param` blocks with call-site arguments.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        if let Some(slot) = self.fields.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.fields.push((key, value));
        }
    }
}

impl NodeValue for Node {
    fn group(&self) -> Option<String> {
        self.get_string("group").map(str::to_string)
    }
}
