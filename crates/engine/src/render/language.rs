//! The template function set.
//!
//! Two environments share one grammar. The scanning environment installs
//! pure accumulators: `param`, `param_list`, and `param_map` record their
//! first argument into a shared list and return typed zero values, so
//! templates finish executing with no real data. The rendering
//! environment resolves the same calls against evaluated graph values.

use minijinja::value::Value as MjValue;
use minijinja::{Environment, ErrorKind, UndefinedBehavior};
use modfile::Node;
use resource::TaskStatus;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Calls discovered while scanning one vertex's strings.
#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct Scan {
    /// First arguments of `param`/`param_list`/`param_map` calls.
    pub params: Vec<String>,
    /// First arguments of `lookup` calls.
    pub lookups: Vec<String>,
}

/// Execute every templated string and predicate of `node` with the
/// recording function set.
pub(crate) fn scan_node(node: &Node) -> Result<Scan, minijinja::Error> {
    let params: Arc<Mutex<Vec<String>>> = Arc::default();
    let lookups: Arc<Mutex<Vec<String>>> = Arc::default();

    let mut env = base_env();
    for name in ["param", "param_list", "param_map"] {
        let recorder = Arc::clone(&params);
        let zero = match name {
            "param" => MjValue::from(""),
            "param_list" => MjValue::from(Vec::<MjValue>::new()),
            _ => MjValue::from_serialize(serde_json::Map::new()),
        };
        env.add_function(name, move |arg: String| {
            recorder.lock().unwrap().push(arg);
            zero.clone()
        });
    }
    let recorder = Arc::clone(&lookups);
    env.add_function("lookup", move |arg: String| {
        recorder.lock().unwrap().push(arg);
        MjValue::from(0)
    });
    env.add_function("env", |_name: String| MjValue::from(""));

    for raw in node.strings() {
        env.render_str(raw, ())?;
    }
    if let Some(predicate) = node.predicate() {
        env.compile_expression_owned(predicate.to_string())?.eval(())?;
    }

    let scan = Scan {
        params: params.lock().unwrap().clone(),
        lookups: lookups.lock().unwrap().clone(),
    };
    Ok(scan)
}

/// Build the rendering environment for one vertex from its resolved
/// parameter values and the evaluated statuses of its lookup targets.
pub(crate) fn render_env(
    params: HashMap<String, serde_json::Value>,
    lookups: HashMap<String, TaskStatus>,
) -> Environment<'static> {
    let mut env = base_env();

    let params = Arc::new(params);
    for name in ["param", "param_list", "param_map"] {
        let params = Arc::clone(&params);
        env.add_function(name, move |arg: String| -> Result<MjValue, minijinja::Error> {
            params
                .get(&arg)
                .map(MjValue::from_serialize)
                .ok_or_else(|| {
                    minijinja::Error::new(
                        ErrorKind::InvalidOperation,
                        format!("unknown parameter: param.{arg}"),
                    )
                })
        });
    }

    let lookups = Arc::new(lookups);
    env.add_function("lookup", move |arg: String| -> Result<MjValue, minijinja::Error> {
        lookups
            .get(&arg)
            .map(MjValue::from_serialize)
            .ok_or_else(|| {
                minijinja::Error::new(
                    ErrorKind::InvalidOperation,
                    format!("lookup of unevaluated vertex: {arg}"),
                )
            })
    });

    env.add_function("env", |name: String| {
        MjValue::from(std::env::var(&name).unwrap_or_default())
    });

    env
}

fn base_env() -> Environment<'static> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Lenient);
    env.add_function("eq", |a: MjValue, b: MjValue| a == b);
    env
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node_with(fields: &[(&str, &str)], predicate: Option<&str>) -> Node {
        let blocks = modfile::parse(&format!(
            "task \"t\" {{ {} }}",
            fields
                .iter()
                .map(|(k, v)| format!("{k} = \"{v}\""))
                .collect::<Vec<_>>()
                .join("\n")
        ))
        .unwrap();
        let mut node = blocks.into_iter().next().unwrap();
        if let Some(p) = predicate {
            // predicates only appear on case blocks; fake one for the scan
            node = modfile::parse(&format!("switch \"s\" {{ case \"{p}\" \"c\" {{ }} }}"))
                .unwrap()
                .remove(0)
                .take_children()
                .remove(0);
        }
        node
    }

    #[test]
    fn test_scan_records_params() {
        let node = node_with(
            &[("content", "hola {{ param('lang') }} {{ param_list('names') }}")],
            None,
        );
        let scan = scan_node(&node).unwrap();
        assert_eq!(scan.params, vec!["lang".to_string(), "names".to_string()]);
        assert!(scan.lookups.is_empty());
    }

    #[test]
    fn test_scan_records_lookups() {
        let node = node_with(&[("content", "{{ lookup('task.probe').messages }}")], None);
        let scan = scan_node(&node).unwrap();
        assert_eq!(scan.lookups, vec!["task.probe".to_string()]);
    }

    #[test]
    fn test_scan_reads_predicates() {
        let node = node_with(&[], Some("eq(param('lang'), 'spanish')"));
        let scan = scan_node(&node).unwrap();
        assert_eq!(scan.params, vec!["lang".to_string()]);
    }

    #[test]
    fn test_scan_ignores_plain_strings() {
        let node = node_with(&[("check", "dpkg -s jq")], None);
        let scan = scan_node(&node).unwrap();
        assert_eq!(scan, Scan::default());
    }

    #[test]
    fn test_scan_propagates_template_errors() {
        let node = node_with(&[("content", "{{ param('x' }}")], None);
        assert!(scan_node(&node).is_err());
    }

    #[test]
    fn test_render_env_resolves_params() {
        let env = render_env(
            HashMap::from([("lang".to_string(), json!("spanish"))]),
            HashMap::new(),
        );
        let out = env.render_str("hola {{ param('lang') }}", ()).unwrap();
        assert_eq!(out, "hola spanish");
    }

    #[test]
    fn test_render_env_unknown_param_errors() {
        let env = render_env(HashMap::new(), HashMap::new());
        assert!(env.render_str("{{ param('missing') }}", ()).is_err());
    }

    #[test]
    fn test_render_env_lookup_fields() {
        let status = TaskStatus::no_change().with_message("10.0.0.7");
        let env = render_env(
            HashMap::new(),
            HashMap::from([("task.probe".to_string(), status)]),
        );
        let out = env
            .render_str("addr={{ lookup('task.probe').messages[0] }}", ())
            .unwrap();
        assert_eq!(out, "addr=10.0.0.7");
    }

    #[test]
    fn test_eq_expression() {
        let env = render_env(
            HashMap::from([("lang".to_string(), json!("spanish"))]),
            HashMap::new(),
        );
        let expr = env.compile_expression("eq(param('lang'), 'spanish')").unwrap();
        assert!(expr.eval(()).unwrap().is_true());
        let expr = env.compile_expression("eq(param('lang'), 'english')").unwrap();
        assert!(!expr.eval(()).unwrap().is_true());
    }
}
