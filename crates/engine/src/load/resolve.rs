//! Dependency resolution.
//!
//! Examines the strings and declared dependencies at each vertex and
//! adds the edges to fit them. Three generators run per vertex (explicit
//! `depends`, parameter references, cross-references), then a group
//! serialization pass makes same-group tasks execute one at a time in ID
//! order. Edge additions are idempotent; duplicates coalesce silently.

use crate::error::{Error, Result};
use crate::render::language;
use graphkit::{Graph, id};
use log::debug;
use modfile::Node;
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

/// Add every remaining edge to the loaded graph.
pub fn resolve_dependencies(graph: &Graph<Node>) -> Result<Graph<Node>> {
    debug!("resolving dependencies over {} vertices", graph.len());

    let groups: Mutex<BTreeMap<String, Vec<String>>> = Mutex::new(BTreeMap::new());

    let mut out = graph.transform(|meta, out| {
        if id::is_root(meta.id()) {
            return Ok::<(), Error>(());
        }
        let node = meta.value();

        let mut deps = depends_refs(graph, meta.id(), node)?;
        let scan = language::scan_node(node).map_err(|err| Error::Template {
            id: meta.id().to_string(),
            message: err.to_string(),
        })?;
        deps.extend(param_refs(graph, meta.id(), &scan.params)?);
        deps.extend(cross_refs(graph, meta.id(), &scan.lookups)?);

        for dep in deps {
            out.connect(meta.id(), &dep).map_err(Error::from)?;
        }

        if let Some(group) = meta.group() {
            groups
                .lock()
                .unwrap()
                .entry(group.to_string())
                .or_default()
                .push(meta.id().to_string());
        }
        Ok(())
    })?;

    // serialize each group: members run one at a time in ID order, with
    // edges retargeted to parents across module boundaries
    for (group, mut members) in groups.into_inner().unwrap() {
        members.sort();
        debug!("group {group}: {members:?}");
        for pair in members.windows(2) {
            let (prev, cur) = (&pair[0], &pair[1]);
            let (mut from, mut to) = (cur.clone(), prev.clone());
            if !id::are_siblings(&from, &to) {
                from = retarget(&from);
                to = retarget(&to);
            }
            if from != to {
                out.connect(&from, &to)?;
            }
        }
    }

    Ok(out)
}

/// Resolve explicit `depends` entries against enclosing scope.
fn depends_refs(graph: &Graph<Node>, vertex_id: &str, node: &Node) -> Result<Vec<String>> {
    let Some(names) = node.get_string_slice("depends") else {
        return Ok(Vec::new());
    };
    names
        .into_iter()
        .map(|name| {
            nearest_ancestor(graph, vertex_id, name, Some(node.kind())).ok_or_else(|| {
                Error::resolution(vertex_id, format!("nonexistent vertices in edges: {name}"))
            })
        })
        .collect()
}

/// Resolve recorded `param(…)` calls to their parameter vertices.
fn param_refs(graph: &Graph<Node>, vertex_id: &str, params: &[String]) -> Result<Vec<String>> {
    params
        .iter()
        .map(|name| {
            let target = format!("param.{name}");
            nearest_ancestor(graph, vertex_id, &target, None).ok_or_else(|| {
                Error::resolution(vertex_id, format!("unknown parameter: param.{name}"))
            })
        })
        .collect()
}

/// Resolve recorded `lookup(…)` calls. Each target also contributes its
/// peer along the walk, so wait/group siblings execute first.
fn cross_refs(graph: &Graph<Node>, vertex_id: &str, lookups: &[String]) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for call in lookups {
        let target = traverse_until_module(graph, call, vertex_id).ok_or_else(|| {
            Error::resolution(vertex_id, format!("unresolvable call to {call}"))
        })?;
        if seen.insert(target.clone()) {
            if let Some(peer) = peer_vertex(vertex_id, &target) {
                out.push(peer);
            }
            out.push(target);
        }
    }
    Ok(out)
}

/// Resolve `name` to the nearest ancestor vertex that exists: try the
/// sibling of the current scope, then recurse to the parent's siblings.
/// `kind` optionally adds a same-kind-qualified probe so a bare name like
/// `"install-jq"` finds its `task.install-jq` sibling.
fn nearest_ancestor(
    graph: &Graph<Node>,
    from: &str,
    name: &str,
    kind: Option<&str>,
) -> Option<String> {
    if id::is_root(from) {
        return None;
    }
    let sibling = id::sibling_id(from, name);
    if graph.contains(&sibling) && sibling != from {
        return Some(sibling);
    }
    if let Some(kind) = kind {
        let qualified = id::sibling_id(from, &format!("{kind}.{name}"));
        if graph.contains(&qualified) && qualified != from {
            return Some(qualified);
        }
    }
    nearest_ancestor(graph, id::parent_id(from), name, kind)
}

/// Resolve a reference path by climbing the containment tree from `from`,
/// trying the path at each scope, stopping at module boundaries.
pub(crate) fn traverse_until_module(
    graph: &Graph<Node>,
    path: &str,
    from: &str,
) -> Option<String> {
    let mut scope = id::parent_id(from).to_string();
    loop {
        let candidate = if id::is_root(&scope) {
            path.to_string()
        } else {
            format!("{scope}{}{path}", id::SEPARATOR)
        };
        if graph.contains(&candidate) && candidate != from {
            return Some(candidate);
        }
        if id::is_root(&scope) {
            return None;
        }
        if graph.get(&scope).map(|m| m.value().kind()) == Some("module") {
            return None;
        }
        scope = id::parent_id(&scope).to_string();
    }
}

/// Find the ancestor of `dst` that is a sibling of `src`, if any.
fn peer_vertex(src: &str, dst: &str) -> Option<String> {
    if id::is_root(dst) {
        return None;
    }
    if id::are_siblings(src, dst) {
        return Some(dst.to_string());
    }
    peer_vertex(src, id::parent_id(dst))
}

fn retarget(vertex: &str) -> String {
    let parent = id::parent_id(vertex);
    if id::is_root(parent) {
        vertex.to_string()
    } else {
        parent.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load::fetcher::MapFetcher;
    use crate::load::loader::Loader;

    fn resolve(text: &str) -> Result<Graph<Node>> {
        let fetcher = MapFetcher::new().insert("main.bq", text);
        let graph = Loader::new(&fetcher).load("main.bq", &[])?;
        resolve_dependencies(&graph)
    }

    #[test]
    fn test_depends_resolves_to_sibling() {
        let graph = resolve(
            r#"
            task "install-build-essential" { check = "true" }
            task "install-jq" {
              check = "true"
              depends = ["install-build-essential"]
            }
            "#,
        )
        .unwrap();
        assert!(
            graph
                .dependencies("task.install-jq")
                .contains(&"task.install-build-essential".to_string())
        );
    }

    #[test]
    fn test_depends_missing_sibling_is_fatal() {
        let err = resolve(
            r#"
            task "install-jq" {
              check = "true"
              depends = ["install-build-essential"]
            }
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("nonexistent vertices in edges"));
    }

    #[test]
    fn test_param_reference_adds_edge() {
        let graph = resolve(
            r#"
            param "lang" { default = "" }
            file.content "greeting" {
              destination = "/tmp/greeting"
              content = "hola {{ param('lang') }}"
            }
            "#,
        )
        .unwrap();
        assert!(
            graph
                .dependencies("file.content.greeting")
                .contains(&"param.lang".to_string())
        );
    }

    #[test]
    fn test_param_resolves_to_enclosing_module_scope() {
        let fetcher = MapFetcher::new()
            .insert(
                "main.bq",
                r#"
                param "lang" { default = "en" }
                module "sub" { source = "sub.bq" }
                "#,
            )
            .insert(
                "sub.bq",
                r#"task "greet" { check = "echo {{ param('lang') }}" }"#,
            );
        let graph = Loader::new(&fetcher).load("main.bq", &[]).unwrap();
        let graph = resolve_dependencies(&graph).unwrap();
        assert!(
            graph
                .dependencies("module.sub/task.greet")
                .contains(&"param.lang".to_string())
        );
    }

    #[test]
    fn test_unknown_param_is_fatal() {
        let err = resolve(r#"task "t" { check = "{{ param('ghost') }}" }"#).unwrap_err();
        assert!(err.to_string().contains("unknown parameter: param.ghost"));
    }

    #[test]
    fn test_lookup_adds_edge() {
        let graph = resolve(
            r#"
            task.query "probe" { query = "hostname" }
            file.content "report" {
              destination = "/tmp/report"
              content = "host: {{ lookup('task.query.probe').messages[0] }}"
            }
            "#,
        )
        .unwrap();
        assert!(
            graph
                .dependencies("file.content.report")
                .contains(&"task.query.probe".to_string())
        );
    }

    #[test]
    fn test_unresolvable_lookup_is_fatal() {
        let err = resolve(r#"task "t" { check = "{{ lookup('task.ghost') }}" }"#).unwrap_err();
        assert!(err.to_string().contains("unresolvable call to task.ghost"));
    }

    #[test]
    fn test_group_serialization_orders_by_id() {
        let graph = resolve(
            r#"
            task "b" { check = "true", group = "apt" }
            task "a" { check = "true", group = "apt" }
            "#,
        )
        .unwrap();
        // "task.a" < "task.b", so b waits on a
        assert!(graph.dependencies("task.b").contains(&"task.a".to_string()));
        assert!(!graph.dependencies("task.a").contains(&"task.b".to_string()));
    }

    #[test]
    fn test_group_retargets_to_parents_across_modules() {
        let fetcher = MapFetcher::new()
            .insert(
                "main.bq",
                r#"
                module "one" { source = "one.bq" }
                module "two" { source = "two.bq" }
                "#,
            )
            .insert("one.bq", r#"task "x" { check = "true", group = "apt" }"#)
            .insert("two.bq", r#"task "y" { check = "true", group = "apt" }"#);
        let graph = Loader::new(&fetcher).load("main.bq", &[]).unwrap();
        let graph = resolve_dependencies(&graph).unwrap();
        assert!(
            graph
                .dependencies("module.two")
                .contains(&"module.one".to_string())
        );
    }

    #[test]
    fn test_duplicate_references_coalesce() {
        let graph = resolve(
            r#"
            param "lang" { default = "" }
            task "t" {
              check = "{{ param('lang') }} {{ param('lang') }}"
              apply = "{{ param('lang') }}"
            }
            "#,
        )
        .unwrap();
        let edges = graph.edges();
        let count = edges
            .iter()
            .filter(|(from, to)| from == "task.t" && to == "param.lang")
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_resolved_graph_validates() {
        let graph = resolve(
            r#"
            param "lang" { default = "" }
            task "a" { check = "true", group = "apt" }
            task "b" { check = "{{ param('lang') }}", group = "apt", depends = ["a"] }
            "#,
        )
        .unwrap();
        assert!(graph.validate().is_ok());
    }
}
