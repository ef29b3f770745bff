//! Hierarchical vertex IDs.
//!
//! An ID is a `/`-separated path of `kind.name` segments. The empty string
//! is the synthetic root. IDs are the sole identity of a vertex; equality
//! is string equality.

/// Path separator between ID segments.
pub const SEPARATOR: char = '/';

/// The ID of the synthetic root vertex.
pub const ROOT: &str = "";

/// Whether `id` names the synthetic root.
pub fn is_root(id: &str) -> bool {
    id.is_empty()
}

/// The parent of `id`: everything before the last segment, or the root for
/// a top-level ID.
pub fn parent_id(id: &str) -> &str {
    match id.rfind(SEPARATOR) {
        Some(idx) => &id[..idx],
        None => ROOT,
    }
}

/// Replace the last segment of `id` with `name`. A sibling of a top-level
/// ID is just `name` itself.
pub fn sibling_id(id: &str, name: &str) -> String {
    let parent = parent_id(id);
    if is_root(parent) {
        name.to_string()
    } else {
        format!("{parent}{SEPARATOR}{name}")
    }
}

/// Whether `a` and `b` share a parent.
pub fn are_siblings(a: &str, b: &str) -> bool {
    parent_id(a) == parent_id(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_id() {
        assert_eq!(parent_id("a/b/c"), "a/b");
        assert_eq!(parent_id("a"), ROOT);
        assert_eq!(parent_id(ROOT), ROOT);
    }

    #[test]
    fn test_sibling_id() {
        assert_eq!(sibling_id("a/b", "c"), "a/c");
        assert_eq!(sibling_id("a", "c"), "c");
    }

    #[test]
    fn test_are_siblings() {
        assert!(are_siblings("a/b", "a/c"));
        assert!(are_siblings("a", "b"));
        assert!(!are_siblings("a/b", "c"));
    }

    #[test]
    fn test_is_root() {
        assert!(is_root(ROOT));
        assert!(!is_root("a"));
    }
}
