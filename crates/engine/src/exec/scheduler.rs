//! The bottom-up concurrent traversal shared by Plan and Apply.
//!
//! Workers execute vertices as soon as their dependencies complete,
//! coordinated through a completion channel and per-vertex dependency
//! counts. Conditional branches prune at the `case` vertex, before the
//! traversal descends into them.

use crate::error::{Error, Result};
use crate::events::{Details, EventSink, Stage, StatusResponse};
use crate::exec::{CancelToken, ExecOpts, Outcome, RunResult, SkipReason};
use crate::load::resolve;
use crate::render::{self, VertexRenderer, language, visible_params};
use graphkit::{Graph, id};
use log::{debug, trace};
use modfile::{Node, Value};
use resource::{Registry, Renderer, Task};
use std::collections::{HashMap, HashSet};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};

/// Check every vertex without mutating the target system.
pub fn plan(
    graph: &Graph<Node>,
    registry: &Registry,
    sink: &dyn EventSink,
    opts: &ExecOpts,
    cancel: &CancelToken,
) -> Result<Graph<RunResult>> {
    run_stage(graph, registry, sink, opts, cancel, Stage::Plan, HashMap::new())
}

/// Enforce desired state: check, apply where needed, then check again to
/// confirm. Tasks prepared during `planned` are reused.
pub fn apply(
    graph: &Graph<Node>,
    planned: &Graph<RunResult>,
    registry: &Registry,
    sink: &dyn EventSink,
    opts: &ExecOpts,
    cancel: &CancelToken,
) -> Result<Graph<RunResult>> {
    let prepared: HashMap<String, Arc<dyn Task>> = planned
        .nodes()
        .filter_map(|node| {
            node.value()
                .task
                .clone()
                .map(|task| (node.id().to_string(), task))
        })
        .collect();
    run_stage(graph, registry, sink, opts, cancel, Stage::Apply, prepared)
}

struct StageCtx<'a> {
    graph: &'a Graph<Node>,
    registry: &'a Registry,
    sink: &'a dyn EventSink,
    cancel: &'a CancelToken,
    stage: Stage,
    prepared: HashMap<String, Arc<dyn Task>>,
    results: Mutex<HashMap<String, RunResult>>,
    pruned: Mutex<HashSet<String>>,
    selections: Mutex<HashMap<String, String>>,
}

fn run_stage(
    graph: &Graph<Node>,
    registry: &Registry,
    sink: &dyn EventSink,
    opts: &ExecOpts,
    cancel: &CancelToken,
    stage: Stage,
    prepared: HashMap<String, Arc<dyn Task>>,
) -> Result<Graph<RunResult>> {
    debug!("{stage:?}: {} vertices, {} jobs", graph.len(), opts.jobs);

    let ctx = StageCtx {
        graph,
        registry,
        sink,
        cancel,
        stage,
        prepared,
        results: Mutex::default(),
        pruned: Mutex::default(),
        selections: Mutex::default(),
    };

    let mut dependency_counts: HashMap<String, usize> = graph
        .ids()
        .into_iter()
        .map(|vertex| {
            let count = graph.dependencies(&vertex).len();
            (vertex, count)
        })
        .collect();
    let mut dependents: HashMap<String, Vec<String>> = HashMap::new();
    for (from, to) in graph.edges() {
        dependents.entry(to).or_default().push(from);
    }

    let total = graph.len();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opts.jobs.max(1))
        .build()
        .map_err(|err| Error::Load(format!("could not build worker pool: {err}")))?;

    let (tx, rx) = mpsc::channel::<String>();

    // in_place_scope keeps the completion driver on the calling thread;
    // every pool worker stays free for vertex jobs, even with one job
    pool.in_place_scope(|scope| {
        // move both channel ends into the scope
        let rx = rx;
        let tx = tx;

        let spawn = |vertex: String| {
            let tx = tx.clone();
            let ctx = &ctx;
            scope.spawn(move |_| {
                trace!("running vertex {vertex:?}");
                let result = ctx.run_vertex(&vertex);
                ctx.results.lock().unwrap().insert(vertex.clone(), result);
                tx.send(vertex).expect("scheduler channel closed");
            });
        };

        for (vertex, count) in &dependency_counts {
            if *count == 0 {
                spawn(vertex.clone());
            }
        }

        let mut completed = 0;
        while completed < total {
            let done = rx.recv().expect("scheduler channel closed");
            completed += 1;
            if let Some(waiting) = dependents.get(&done) {
                for vertex in waiting {
                    let count = dependency_counts
                        .get_mut(vertex)
                        .expect("dependent vertex is in the graph");
                    *count -= 1;
                    if *count == 0 {
                        spawn(vertex.clone());
                    }
                }
            }
        }
    });

    let results = ctx.results.into_inner().unwrap();
    graph.map(|meta| {
        Ok::<_, Error>(
            results
                .get(meta.id())
                .cloned()
                .expect("every vertex has a result"),
        )
    })
}

impl StageCtx<'_> {
    fn run_vertex(&self, vertex_id: &str) -> RunResult {
        self.sink
            .emit(StatusResponse::started(vertex_id, self.stage));

        if self.pruned.lock().unwrap().contains(vertex_id) {
            return self.finish(vertex_id, Outcome::Skipped(SkipReason::BranchNotTaken), None);
        }
        if self.cancel.is_cancelled() {
            return self.finish(vertex_id, Outcome::Skipped(SkipReason::Cancelled), None);
        }
        for dep in self.graph.dependencies(vertex_id) {
            let blocked = {
                let results = self.results.lock().unwrap();
                results
                    .get(&dep)
                    .expect("dependency completed before dependent")
                    .outcome
                    .blocks_dependents()
            };
            if blocked {
                return self.finish(
                    vertex_id,
                    Outcome::Skipped(SkipReason::FailedDependency(dep)),
                    None,
                );
            }
        }

        let node = self
            .graph
            .get(vertex_id)
            .expect("scheduled vertex is in the graph")
            .value()
            .clone();

        match node.kind() {
            "root" | "module" | "switch" => {
                self.finish(vertex_id, Outcome::Status(Default::default()), None)
            }
            "case" => self.run_case(vertex_id, &node),
            _ => self.run_task(vertex_id, &node),
        }
    }

    /// Evaluate a case predicate; at most one branch per switch is
    /// selected, first match wins. Non-selected branches prune their
    /// descendants before the traversal reaches them.
    fn run_case(&self, vertex_id: &str, node: &Node) -> RunResult {
        let switch_id = id::parent_id(vertex_id).to_string();

        let already_selected = self
            .selections
            .lock()
            .unwrap()
            .contains_key(&switch_id);

        let taken = if already_selected {
            false
        } else {
            match node.predicate() {
                None => true,
                Some(expr) => {
                    let renderer = match self.build_renderer(vertex_id, node) {
                        Ok(renderer) => renderer,
                        Err(err) => {
                            return self.finish(
                                vertex_id,
                                Outcome::Errored(format!("{err:#}")),
                                None,
                            );
                        }
                    };
                    match renderer.eval_predicate(expr) {
                        Ok(value) => value,
                        Err(err) => {
                            return self.finish(
                                vertex_id,
                                Outcome::Errored(format!("{err:#}")),
                                None,
                            );
                        }
                    }
                }
            }
        };

        if taken {
            self.selections
                .lock()
                .unwrap()
                .insert(switch_id, vertex_id.to_string());
        } else {
            let descendants = self.graph.descendents(vertex_id);
            self.pruned.lock().unwrap().extend(descendants);
        }
        self.finish(vertex_id, Outcome::Status(Default::default()), None)
    }

    fn run_task(&self, vertex_id: &str, node: &Node) -> RunResult {
        let renderer = match self.build_renderer(vertex_id, node) {
            Ok(renderer) => renderer,
            Err(err) => {
                return self.finish(vertex_id, Outcome::Errored(format!("render: {err:#}")), None);
            }
        };

        let task: Arc<dyn Task> = match self.prepared.get(vertex_id) {
            Some(task) => Arc::clone(task),
            None => {
                let fields = match render_fields(node, &renderer) {
                    Ok(fields) => fields,
                    Err(err) => {
                        return self.finish(
                            vertex_id,
                            Outcome::Errored(format!("render: {err:#}")),
                            None,
                        );
                    }
                };
                match self.registry.prepare(node.kind(), fields, &renderer) {
                    Ok(task) => Arc::from(task),
                    Err(err) => {
                        return self.finish(
                            vertex_id,
                            Outcome::Errored(format!("prepare: {err:#}")),
                            None,
                        );
                    }
                }
            }
        };

        let mut status = match task.check(&renderer) {
            Ok(status) => status,
            Err(err) => {
                return self.finish(
                    vertex_id,
                    Outcome::Errored(format!("check: {err:#}")),
                    Some(task),
                );
            }
        };

        if self.stage == Stage::Apply
            && status.has_changes()
            && !status.is_fatal()
            && !self.cancel.is_cancelled()
        {
            match task.apply(&renderer) {
                Ok(applied) if applied.is_fatal() => {
                    return self.finish(vertex_id, Outcome::Status(applied), Some(task));
                }
                Ok(_) => {
                    // confirm convergence with a fresh check
                    status = match task.check(&renderer) {
                        Ok(status) => status,
                        Err(err) => {
                            return self.finish(
                                vertex_id,
                                Outcome::Errored(format!("check: {err:#}")),
                                Some(task),
                            );
                        }
                    };
                }
                Err(err) => {
                    return self.finish(
                        vertex_id,
                        Outcome::Errored(format!("apply: {err:#}")),
                        Some(task),
                    );
                }
            }
        }

        self.finish(vertex_id, Outcome::Status(status), Some(task))
    }

    /// Assemble the vertex's render capability from evaluated upstream
    /// results.
    fn build_renderer(&self, vertex_id: &str, node: &Node) -> anyhow::Result<VertexRenderer> {
        let params = visible_params(self.graph, vertex_id, |param_id| {
            self.results
                .lock()
                .unwrap()
                .get(param_id)
                .and_then(|result| result.task.as_ref())
                .and_then(|task| task.param_value())
        });

        let scan = language::scan_node(node)?;
        let mut lookups = HashMap::new();
        for call in scan.lookups {
            let target = resolve::traverse_until_module(self.graph, &call, vertex_id)
                .ok_or_else(|| anyhow::anyhow!("unresolvable call to {call}"))?;
            let status = self
                .results
                .lock()
                .unwrap()
                .get(&target)
                .and_then(|result| result.outcome.status().cloned())
                .ok_or_else(|| anyhow::anyhow!("lookup of unevaluated vertex: {target}"))?;
            lookups.insert(call, status);
        }

        let seeded = node.get("value").map(render::to_json);
        Ok(VertexRenderer::new(vertex_id, seeded, params, lookups))
    }

    fn finish(&self, vertex_id: &str, outcome: Outcome, task: Option<Arc<dyn Task>>) -> RunResult {
        self.sink.emit(StatusResponse::finished(
            vertex_id,
            self.stage,
            details_for(&outcome),
        ));
        RunResult::new(outcome, task)
    }
}

/// Interpolate every string leaf of the vertex's fields into the JSON
/// map the preparer decodes from.
fn render_fields(node: &Node, renderer: &dyn Renderer) -> anyhow::Result<serde_json::Value> {
    fn render_value(
        key: &str,
        value: &Value,
        renderer: &dyn Renderer,
    ) -> anyhow::Result<serde_json::Value> {
        Ok(match value {
            Value::String(raw) => serde_json::Value::String(renderer.render(key, raw)?),
            Value::List(items) => serde_json::Value::Array(
                items
                    .iter()
                    .map(|item| render_value(key, item, renderer))
                    .collect::<anyhow::Result<_>>()?,
            ),
            Value::Map(entries) => serde_json::Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), render_value(key, v, renderer)?)))
                    .collect::<anyhow::Result<_>>()?,
            ),
            other => render::to_json(other),
        })
    }

    let mut fields = serde_json::Map::new();
    for (key, value) in node.fields() {
        fields.insert(key.clone(), render_value(key, value, renderer)?);
    }
    Ok(serde_json::Value::Object(fields))
}

fn details_for(outcome: &Outcome) -> Details {
    match outcome {
        Outcome::Status(status) => {
            let mut details = Details::from_status(status);
            if status.is_fatal() {
                let reason = status.messages().join("; ");
                details.error = Some(if reason.is_empty() {
                    "fatal status".to_string()
                } else {
                    reason
                });
            }
            details
        }
        Outcome::Errored(message) => Details::from_error(message.clone()),
        Outcome::Skipped(reason) => Details {
            messages: vec![format!("skipped: {reason}")],
            ..Default::default()
        },
    }
}
