//! End-to-end pipeline scenarios: real module text through load, resolve,
//! plan, and apply, with a filesystem-backed fake resource standing in
//! for system mutations.

use engine::{
    CancelToken, ExecOpts, MapFetcher, Outcome, Run, RunResult, RunSummary, SkipReason, Stage,
    StatusResponse, VecSink, load_source,
};
use graphkit::Graph;
use modfile::Node;
use resource::{Registry, Renderer, TaskStatus};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

/// A resource whose convergence is "this file exists". Knobs simulate
/// failing checks, failing applies, and fatal statuses.
#[derive(Debug, Clone, Deserialize)]
struct FakePreparer {
    #[serde(default)]
    state_file: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    fail_check: bool,
    #[serde(default)]
    fail_apply: bool,
    #[serde(default)]
    fatal: bool,
}

impl resource::Preparer for FakePreparer {
    fn prepare(&self, _renderer: &dyn Renderer) -> anyhow::Result<resource::BoxedTask> {
        Ok(Box::new(FakeTask(self.clone())))
    }
}

#[derive(Debug)]
struct FakeTask(FakePreparer);

impl resource::Task for FakeTask {
    fn check(&self, _renderer: &dyn Renderer) -> anyhow::Result<TaskStatus> {
        if self.0.fail_check {
            anyhow::bail!("check failed");
        }
        if self.0.fatal {
            return Ok(TaskStatus::fatal("cannot converge"));
        }
        let mut status = match &self.0.state_file {
            Some(path) if !Path::new(path).exists() => {
                TaskStatus::no_change().with_diff("state", "absent", "present")
            }
            _ => TaskStatus::no_change(),
        };
        if let Some(message) = &self.0.message {
            status = status.with_message(message.clone());
        }
        Ok(status)
    }

    fn apply(&self, _renderer: &dyn Renderer) -> anyhow::Result<TaskStatus> {
        if self.0.fail_apply {
            anyhow::bail!("apply failed");
        }
        if let Some(path) = &self.0.state_file {
            std::fs::write(path, self.0.content.as_deref().unwrap_or(""))?;
        }
        Ok(TaskStatus::no_change())
    }
}

fn registry() -> Registry {
    let mut registry = Registry::with_builtins();
    registry.register::<FakePreparer>("fake");
    registry
}

fn load(text: &str) -> Graph<Node> {
    let fetcher = MapFetcher::new().insert("main.bq", text);
    load_source(&fetcher, "main.bq", &[]).unwrap()
}

fn outcome(graph: &Graph<RunResult>, id: &str) -> Outcome {
    graph.get(id).unwrap().value().outcome.clone()
}

fn event_index(events: &[StatusResponse], id: &str, stage: Stage, run: Run) -> usize {
    events
        .iter()
        .position(|e| e.id == id && e.stage == stage && e.run == run)
        .unwrap_or_else(|| panic!("no {run:?} event for {id} in {stage:?}"))
}

#[test]
fn group_members_execute_one_at_a_time_in_id_order() {
    let dir = tempfile::tempdir().unwrap();
    let graph = load(&format!(
        r#"
        fake "b" {{ state_file = "{0}/b", group = "apt" }}
        fake "a" {{ state_file = "{0}/a", group = "apt" }}
        "#,
        dir.path().display()
    ));

    // serialization is plain edges: b waits on a because "fake.a" < "fake.b"
    assert!(graph.dependencies("fake.b").contains(&"fake.a".to_string()));

    let sink = VecSink::new();
    let planned = engine::plan(
        &graph,
        &registry(),
        &sink,
        &ExecOpts::default(),
        &CancelToken::new(),
    )
    .unwrap();
    assert!(RunSummary::from_graph(&planned).is_success());

    let events = sink.events();
    let finished_a = event_index(&events, "fake.a", Stage::Plan, Run::Finished);
    let started_b = event_index(&events, "fake.b", Stage::Plan, Run::Started);
    assert!(
        finished_a < started_b,
        "fake.b started before fake.a finished"
    );
}

#[test]
fn unselected_branch_is_skipped_in_plan_and_apply() {
    let dir = tempfile::tempdir().unwrap();
    let guarded = dir.path().join("greeting");
    let graph = load(&format!(
        r#"
        param "lang" {{ default = "" }}
        switch "language" {{
          case "eq(param('lang'), 'spanish')" "spanish" {{
            fake "g" {{ state_file = "{}", content = "hola" }}
          }}
        }}
        "#,
        guarded.display()
    ));

    let registry = registry();
    let sink = VecSink::new();
    let opts = ExecOpts::default();
    let cancel = CancelToken::new();

    let planned = engine::plan(&graph, &registry, &sink, &opts, &cancel).unwrap();
    let applied = engine::apply(&graph, &planned, &registry, &sink, &opts, &cancel).unwrap();

    let pruned_id = "switch.language/case.spanish/fake.g";
    assert_eq!(
        outcome(&planned, pruned_id),
        Outcome::Skipped(SkipReason::BranchNotTaken)
    );
    assert_eq!(
        outcome(&applied, pruned_id),
        Outcome::Skipped(SkipReason::BranchNotTaken)
    );
    assert!(!guarded.exists(), "pruned vertex must never apply");

    // the skip is visible in both event streams
    let events = sink.events();
    event_index(&events, pruned_id, Stage::Plan, Run::Finished);
    event_index(&events, pruned_id, Stage::Apply, Run::Finished);
}

#[test]
fn selected_branch_executes_and_renders_params() {
    let dir = tempfile::tempdir().unwrap();
    let guarded = dir.path().join("greeting");
    let fetcher = MapFetcher::new().insert(
        "main.bq",
        format!(
            r#"
            param "lang" {{ default = "" }}
            switch "language" {{
              case "eq(param('lang'), 'spanish')" "spanish" {{
                fake "g" {{ state_file = "{0}", content = "hola {{{{ param('lang') }}}}" }}
              }}
              default {{
                fake "g" {{ state_file = "{0}", content = "hi" }}
              }}
            }}
            "#,
            guarded.display()
        ),
    );
    let graph = load_source(
        &fetcher,
        "main.bq",
        &[("lang".to_string(), modfile::Value::from("spanish"))],
    )
    .unwrap();

    let registry = registry();
    let opts = ExecOpts::default();
    let cancel = CancelToken::new();
    let planned = engine::plan(&graph, &registry, &engine::NullSink, &opts, &cancel).unwrap();
    let applied =
        engine::apply(&graph, &planned, &registry, &engine::NullSink, &opts, &cancel).unwrap();

    let spanish = "switch.language/case.spanish/fake.g";
    let default = "switch.language/case.default/fake.g";
    assert!(matches!(outcome(&applied, spanish), Outcome::Status(_)));
    assert_eq!(
        outcome(&applied, default),
        Outcome::Skipped(SkipReason::BranchNotTaken)
    );
    assert_eq!(std::fs::read_to_string(&guarded).unwrap(), "hola spanish");
}

#[test]
fn failure_skips_transitive_dependents_but_not_unrelated_subtrees() {
    let dir = tempfile::tempdir().unwrap();
    let graph = load(&format!(
        r#"
        fake "z" {{ state_file = "{0}/z" }}
        fake "y" {{ state_file = "{0}/y", fail_apply = true, depends = ["z"] }}
        fake "x" {{ state_file = "{0}/x", depends = ["y"] }}
        fake "unrelated" {{ state_file = "{0}/unrelated" }}
        "#,
        dir.path().display()
    ));

    let registry = registry();
    let opts = ExecOpts::default();
    let cancel = CancelToken::new();
    let planned = engine::plan(&graph, &registry, &engine::NullSink, &opts, &cancel).unwrap();
    let applied =
        engine::apply(&graph, &planned, &registry, &engine::NullSink, &opts, &cancel).unwrap();

    assert!(matches!(outcome(&applied, "fake.z"), Outcome::Status(_)));
    assert!(matches!(outcome(&applied, "fake.y"), Outcome::Errored(_)));
    assert_eq!(
        outcome(&applied, "fake.x"),
        Outcome::Skipped(SkipReason::FailedDependency("fake.y".to_string()))
    );
    assert!(matches!(
        outcome(&applied, "fake.unrelated"),
        Outcome::Status(_)
    ));

    assert!(dir.path().join("z").exists());
    assert!(dir.path().join("unrelated").exists());
    assert!(!dir.path().join("x").exists(), "x must never apply");

    let summary = RunSummary::from_graph(&applied);
    assert!(!summary.is_success());
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.skipped, 1);
}

#[test]
fn fatal_status_blocks_dependents_like_an_error() {
    let graph = load(
        r#"
        fake "bad" { fatal = true }
        fake "after" { depends = ["bad"] }
        "#,
    );
    let planned = engine::plan(
        &graph,
        &registry(),
        &engine::NullSink,
        &ExecOpts::default(),
        &CancelToken::new(),
    )
    .unwrap();

    assert!(outcome(&planned, "fake.bad").is_failed());
    assert_eq!(
        outcome(&planned, "fake.after"),
        Outcome::Skipped(SkipReason::FailedDependency("fake.bad".to_string()))
    );
}

#[test]
fn check_error_does_not_stop_unreachable_vertices() {
    let dir = tempfile::tempdir().unwrap();
    let graph = load(&format!(
        r#"
        fake "broken" {{ fail_check = true }}
        fake "healthy" {{ state_file = "{0}/healthy" }}
        "#,
        dir.path().display()
    ));
    let planned = engine::plan(
        &graph,
        &registry(),
        &engine::NullSink,
        &ExecOpts::default(),
        &CancelToken::new(),
    )
    .unwrap();

    assert!(matches!(outcome(&planned, "fake.broken"), Outcome::Errored(_)));
    match outcome(&planned, "fake.healthy") {
        Outcome::Status(status) => assert!(status.has_changes()),
        other => panic!("expected a status, got {other:?}"),
    }
}

#[test]
fn cancellation_skips_apply_without_executing() {
    let dir = tempfile::tempdir().unwrap();
    let graph = load(&format!(
        r#"
        fake "a" {{ state_file = "{0}/a" }}
        fake "b" {{ state_file = "{0}/b" }}
        "#,
        dir.path().display()
    ));

    let registry = registry();
    let opts = ExecOpts::default();
    let cancel = CancelToken::new();
    let sink = VecSink::new();

    let planned = engine::plan(&graph, &registry, &sink, &opts, &cancel).unwrap();
    cancel.cancel();
    let applied = engine::apply(&graph, &planned, &registry, &sink, &opts, &cancel).unwrap();

    for id in ["fake.a", "fake.b"] {
        assert_eq!(outcome(&applied, id), Outcome::Skipped(SkipReason::Cancelled));
        assert!(!dir.path().join(id.trim_start_matches("fake.")).exists());
    }
    // the root is cancelled along with everything else
    let summary = RunSummary::from_graph(&applied);
    assert!(summary.is_success());
    assert_eq!(summary.skipped, applied.len());
}

#[test]
fn apply_converges_and_second_plan_reports_no_change() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("converged");
    let graph = load(&format!(
        r#"fake "t" {{ state_file = "{}" }}"#,
        state.display()
    ));

    let registry = registry();
    let opts = ExecOpts::default();
    let cancel = CancelToken::new();

    let planned = engine::plan(&graph, &registry, &engine::NullSink, &opts, &cancel).unwrap();
    match outcome(&planned, "fake.t") {
        Outcome::Status(status) => assert!(status.has_changes()),
        other => panic!("expected WillChange, got {other:?}"),
    }

    let applied =
        engine::apply(&graph, &planned, &registry, &engine::NullSink, &opts, &cancel).unwrap();
    match outcome(&applied, "fake.t") {
        // the confirming re-check reports convergence
        Outcome::Status(status) => assert!(!status.has_changes()),
        other => panic!("expected NoChange, got {other:?}"),
    }
    assert!(state.exists());

    let replanned = engine::plan(&graph, &registry, &engine::NullSink, &opts, &cancel).unwrap();
    match outcome(&replanned, "fake.t") {
        Outcome::Status(status) => assert!(!status.has_changes()),
        other => panic!("expected NoChange, got {other:?}"),
    }
}

#[test]
fn lookup_renders_upstream_status_fields() {
    let dir = tempfile::tempdir().unwrap();
    let report = dir.path().join("report");
    let graph = load(&format!(
        r#"
        fake "probe" {{ message = "10.0.0.7" }}
        fake "report" {{
          state_file = "{}"
          content = "addr={{{{ lookup('fake.probe').messages[0] }}}}"
        }}
        "#,
        report.display()
    ));
    assert!(
        graph
            .dependencies("fake.report")
            .contains(&"fake.probe".to_string())
    );

    let registry = registry();
    let opts = ExecOpts::default();
    let cancel = CancelToken::new();
    let planned = engine::plan(&graph, &registry, &engine::NullSink, &opts, &cancel).unwrap();
    engine::apply(&graph, &planned, &registry, &engine::NullSink, &opts, &cancel).unwrap();

    assert_eq!(std::fs::read_to_string(&report).unwrap(), "addr=10.0.0.7");
}

#[test]
fn module_params_flow_into_nested_resources() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("greeting");
    let fetcher = MapFetcher::new()
        .insert(
            "main.bq",
            format!(
                r#"module "greet" {{ source = "greet.bq", params = {{ lang = "pt" }} }}"#
            ),
        )
        .insert(
            "greet.bq",
            format!(
                r#"
                param "lang" {{ default = "en" }}
                fake "g" {{ state_file = "{}", content = "lang={{{{ param('lang') }}}}" }}
                "#,
                out.display()
            ),
        );
    let graph = load_source(&fetcher, "main.bq", &[]).unwrap();

    let registry = registry();
    let opts = ExecOpts::default();
    let cancel = CancelToken::new();
    let planned = engine::plan(&graph, &registry, &engine::NullSink, &opts, &cancel).unwrap();
    engine::apply(&graph, &planned, &registry, &engine::NullSink, &opts, &cancel).unwrap();

    assert_eq!(std::fs::read_to_string(&out).unwrap(), "lang=pt");
}

#[test]
fn every_vertex_emits_started_before_finished() {
    let dir = tempfile::tempdir().unwrap();
    let graph = load(&format!(
        r#"
        fake "a" {{ state_file = "{0}/a" }}
        fake "b" {{ state_file = "{0}/b", depends = ["a"] }}
        "#,
        dir.path().display()
    ));
    let sink = VecSink::new();
    engine::plan(
        &graph,
        &registry(),
        &sink,
        &ExecOpts::default(),
        &CancelToken::new(),
    )
    .unwrap();

    let events = sink.events();
    for id in graph.ids() {
        let started = event_index(&events, &id, Stage::Plan, Run::Started);
        let finished = event_index(&events, &id, Stage::Plan, Run::Finished);
        assert!(started < finished, "{id} finished before it started");
    }
    // dependency ordering across vertices
    let finished_a = event_index(&events, "fake.a", Stage::Plan, Run::Finished);
    let started_b = event_index(&events, "fake.b", Stage::Plan, Run::Started);
    assert!(finished_a < started_b);
}

#[test]
fn single_worker_drains_the_whole_graph() {
    let dir = tempfile::tempdir().unwrap();
    let graph = load(&format!(
        r#"
        fake "a" {{ state_file = "{0}/a" }}
        fake "b" {{ state_file = "{0}/b", depends = ["a"] }}
        fake "c" {{ state_file = "{0}/c" }}
        "#,
        dir.path().display()
    ));

    let registry = registry();
    let opts = ExecOpts { jobs: 1 };
    let cancel = CancelToken::new();
    let sink = VecSink::new();

    let planned = engine::plan(&graph, &registry, &sink, &opts, &cancel).unwrap();
    assert!(RunSummary::from_graph(&planned).is_success());
    let applied = engine::apply(&graph, &planned, &registry, &sink, &opts, &cancel).unwrap();
    assert!(RunSummary::from_graph(&applied).is_success());

    assert!(dir.path().join("a").exists());
    assert!(dir.path().join("b").exists());
    assert!(dir.path().join("c").exists());

    // dependency ordering holds under a single worker too
    let events = sink.events();
    let finished_a = event_index(&events, "fake.a", Stage::Apply, Run::Finished);
    let started_b = event_index(&events, "fake.b", Stage::Apply, Run::Started);
    assert!(finished_a < started_b);
}

#[test]
fn prepared_tasks_are_shared_between_plan_and_apply() {
    let dir = tempfile::tempdir().unwrap();
    let graph = load(&format!(
        r#"fake "t" {{ state_file = "{}/t" }}"#,
        dir.path().display()
    ));
    let registry = registry();
    let opts = ExecOpts::default();
    let cancel = CancelToken::new();

    let planned = engine::plan(&graph, &registry, &engine::NullSink, &opts, &cancel).unwrap();
    let plan_task = planned.get("fake.t").unwrap().value().task.clone().unwrap();
    let applied =
        engine::apply(&graph, &planned, &registry, &engine::NullSink, &opts, &cancel).unwrap();
    let apply_task = applied.get("fake.t").unwrap().value().task.clone().unwrap();

    assert!(Arc::ptr_eq(&plan_task, &apply_task));
}
