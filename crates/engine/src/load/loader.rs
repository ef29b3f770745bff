//! Builds the initial containment graph from parse trees.

use crate::error::{Error, Result};
use crate::load::fetcher::ContentFetcher;
use graphkit::{Graph, Node as Meta, id};
use modfile::{Node, Value};
use std::collections::HashSet;

/// Maximum module inlining depth before the loader assumes recursion.
const MAX_MODULE_DEPTH: usize = 32;

/// Walks parse trees, creating one vertex per block with its ID equal to
/// the concatenated path from the root, and inlining `module` calls
/// through the injected fetcher.
///
/// The loader adds containment edges (child → parent) and the
/// `case`-chain edges that serialize predicate evaluation; every other
/// edge is the resolver's job.
pub struct Loader<'a> {
    fetcher: &'a dyn ContentFetcher,
}

impl<'a> Loader<'a> {
    pub fn new(fetcher: &'a dyn ContentFetcher) -> Self {
        Loader { fetcher }
    }

    /// Fetch and parse `source`, producing the raw graph. `seeds` are
    /// call-site values for the module's top-level params.
    pub fn load(&self, source: &str, seeds: &[(String, Value)]) -> Result<Graph<Node>> {
        let text = self.fetcher.fetch(source)?;
        let blocks = modfile::parse(&text)?;

        let mut graph = Graph::new();
        graph.add(Meta::new(id::ROOT, Node::container("root", "")));
        self.add_blocks(&mut graph, id::ROOT, blocks, seeds, 0)?;
        Ok(graph)
    }

    fn add_blocks(
        &self,
        graph: &mut Graph<Node>,
        parent_id: &str,
        blocks: Vec<Node>,
        seeds: &[(String, Value)],
        depth: usize,
    ) -> Result<()> {
        let parent_kind = graph
            .get(parent_id)
            .map(|meta| meta.value().kind().to_string())
            .unwrap_or_default();

        let param_names: HashSet<&str> = blocks
            .iter()
            .filter(|b| b.kind() == "param")
            .map(Node::name)
            .collect();
        for (name, _) in seeds {
            if !param_names.contains(name.as_str()) {
                return Err(Error::Load(format!(
                    "module call at {} supplies unknown param '{name}'",
                    display_id(parent_id)
                )));
            }
        }

        let mut prev_case: Option<String> = None;
        for mut block in blocks {
            if block.kind() == "case" && parent_kind != "switch" {
                return Err(Error::Load(format!(
                    "case '{}' outside of a switch block",
                    block.name()
                )));
            }
            if parent_kind == "switch" && block.kind() != "case" {
                return Err(Error::Load(format!(
                    "switch {} may only contain case blocks, found {}",
                    display_id(parent_id),
                    block.kind()
                )));
            }
            if block.name().is_empty() {
                return Err(Error::Load(format!(
                    "{} block under {} requires a name",
                    block.kind(),
                    display_id(parent_id)
                )));
            }

            if block.kind() == "param"
                && let Some((_, value)) = seeds.iter().find(|(k, _)| k.as_str() == block.name())
            {
                block.set("value", value.clone());
            }

            let vertex_id = join(parent_id, &block.segment());
            if graph.contains(&vertex_id) {
                return Err(Error::Load(format!("duplicate resource id {vertex_id}")));
            }

            if block.kind() == "module" {
                self.add_module(graph, parent_id, &vertex_id, block, depth)?;
                continue;
            }

            let children = block.take_children();
            let is_case = block.kind() == "case";

            graph.add(Meta::new(vertex_id.clone(), block));
            graph.connect(&vertex_id, parent_id)?;

            if is_case {
                // serialize predicate evaluation in declaration order
                if let Some(prev) = &prev_case {
                    graph.connect(&vertex_id, prev)?;
                }
                prev_case = Some(vertex_id.clone());
            }

            self.add_blocks(graph, &vertex_id, children, &[], depth)?;
        }
        Ok(())
    }

    fn add_module(
        &self,
        graph: &mut Graph<Node>,
        parent_id: &str,
        vertex_id: &str,
        mut block: Node,
        depth: usize,
    ) -> Result<()> {
        if depth >= MAX_MODULE_DEPTH {
            return Err(Error::Load(format!(
                "module nesting too deep at {vertex_id} (limit {MAX_MODULE_DEPTH})"
            )));
        }
        if !block.take_children().is_empty() {
            return Err(Error::Load(format!(
                "module {vertex_id} cannot contain nested blocks"
            )));
        }
        let source = block
            .get_string("source")
            .ok_or_else(|| Error::Load(format!("module {vertex_id} requires a source")))?
            .to_string();
        let seeds: Vec<(String, Value)> = match block.get("params") {
            Some(value) => value
                .as_map()
                .ok_or_else(|| {
                    Error::Load(format!("module {vertex_id} params must be a map"))
                })?
                .to_vec(),
            None => Vec::new(),
        };

        let text = self.fetcher.fetch(&source)?;
        let sub_blocks = modfile::parse(&text)?;

        graph.add(Meta::new(vertex_id.to_string(), block));
        graph.connect(vertex_id, parent_id)?;
        self.add_blocks(graph, vertex_id, sub_blocks, &seeds, depth + 1)
    }
}

fn join(parent_id: &str, segment: &str) -> String {
    if id::is_root(parent_id) {
        segment.to_string()
    } else {
        format!("{parent_id}{}{segment}", id::SEPARATOR)
    }
}

fn display_id(id: &str) -> &str {
    if id::is_root(id) { "the module root" } else { id }
}
