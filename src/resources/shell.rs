//! `task` and `task.query` - shell-backed resources.
//!
//! A `task` runs its check script to decide whether the system is
//! converged (exit status zero means no change needed) and its apply
//! script to converge it. A `task.query` is the read-only variant: it
//! only observes, so downstream resources can `lookup` its output.

use anyhow::{Context, Result, bail};
use resource::{BoxedTask, Renderer, Task, TaskStatus};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

const DEFAULT_INTERPRETER: &str = "/bin/sh";

#[derive(Debug, Clone, Deserialize)]
pub struct Preparer {
    /// Shell binary; invoked as `interpreter -c <script>`.
    #[serde(default)]
    pub interpreter: Option<String>,
    /// Script whose exit status decides convergence.
    pub check: String,
    /// Script that converges the system.
    #[serde(default)]
    pub apply: Option<String>,
    /// Working directory for both scripts.
    #[serde(default)]
    pub dir: Option<String>,
    /// Extra environment for both scripts.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Per-script timeout in seconds.
    #[serde(default)]
    pub timeout: Option<f64>,
    /// Mutual-exclusion group.
    #[serde(default)]
    pub group: Option<String>,
}

impl resource::Preparer for Preparer {
    fn prepare(&self, _renderer: &dyn Renderer) -> Result<BoxedTask> {
        Ok(Box::new(Shell::from_preparer(self)))
    }
}

#[derive(Debug, Clone)]
pub struct Shell {
    interpreter: String,
    check: String,
    apply: Option<String>,
    dir: Option<String>,
    env: BTreeMap<String, String>,
    timeout: Option<Duration>,
    group: Option<String>,
}

impl Shell {
    fn from_preparer(preparer: &Preparer) -> Self {
        Shell {
            interpreter: preparer
                .interpreter
                .clone()
                .unwrap_or_else(|| DEFAULT_INTERPRETER.to_string()),
            check: preparer.check.clone(),
            apply: preparer.apply.clone(),
            dir: preparer.dir.clone(),
            env: preparer.env.clone(),
            timeout: preparer.timeout.map(Duration::from_secs_f64),
            group: preparer.group.clone(),
        }
    }

    pub(crate) fn run(&self, script: &str) -> Result<CommandOutput> {
        run_script(&self.interpreter, script, self.dir.as_deref(), &self.env, self.timeout)
    }

    pub(crate) fn check_status(&self) -> Result<TaskStatus> {
        let output = self.run(&self.check)?;
        let mut status = if output.success {
            TaskStatus::no_change()
        } else {
            TaskStatus::no_change().with_diff(
                "check",
                format!("exit status {}", output.code_str()),
                "exit status 0",
            )
        };
        if !output.stdout.trim().is_empty() {
            status = status.with_message(output.stdout.trim().to_string());
        }
        if !output.success && !output.stderr.trim().is_empty() {
            status = status.with_message(output.stderr.trim().to_string());
        }
        Ok(status)
    }
}

impl Task for Shell {
    fn check(&self, _renderer: &dyn Renderer) -> Result<TaskStatus> {
        self.check_status()
    }

    fn apply(&self, _renderer: &dyn Renderer) -> Result<TaskStatus> {
        let Some(script) = &self.apply else {
            bail!("task has no apply script");
        };
        let output = self.run(script)?;
        if !output.success {
            bail!(
                "apply script failed with exit status {}: {}",
                output.code_str(),
                output.stderr.trim()
            );
        }
        Ok(TaskStatus::no_change())
    }

    fn group(&self) -> Option<String> {
        self.group.clone()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryPreparer {
    #[serde(default)]
    pub interpreter: Option<String>,
    /// Script whose output is exported to `lookup` callers.
    pub query: String,
    #[serde(default)]
    pub dir: Option<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub timeout: Option<f64>,
}

impl resource::Preparer for QueryPreparer {
    fn prepare(&self, _renderer: &dyn Renderer) -> Result<BoxedTask> {
        let shell = Preparer {
            interpreter: self.interpreter.clone(),
            check: self.query.clone(),
            apply: None,
            dir: self.dir.clone(),
            env: self.env.clone(),
            timeout: self.timeout,
            group: None,
        };
        Ok(Box::new(Query(Shell::from_preparer(&shell))))
    }
}

/// Read-only shell observation. Its status carries the query's stdout so
/// dependents can interpolate it.
#[derive(Debug, Clone)]
pub struct Query(Shell);

impl Task for Query {
    fn check(&self, _renderer: &dyn Renderer) -> Result<TaskStatus> {
        let output = self.0.run(&self.0.check)?;
        if !output.success {
            return Ok(TaskStatus::fatal(format!(
                "query failed with exit status {}: {}",
                output.code_str(),
                output.stderr.trim()
            )));
        }
        Ok(TaskStatus::no_change().with_message(output.stdout.trim().to_string()))
    }

    fn apply(&self, renderer: &dyn Renderer) -> Result<TaskStatus> {
        // queries never mutate; applying is just another observation
        self.check(renderer)
    }
}

#[derive(Debug)]
pub(crate) struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub code: Option<i32>,
    pub success: bool,
}

impl CommandOutput {
    pub fn code_str(&self) -> String {
        match self.code {
            Some(code) => code.to_string(),
            None => "signal".to_string(),
        }
    }
}

/// Run `interpreter -c script`, enforcing the timeout by polling the
/// child and killing it at the deadline.
pub(crate) fn run_script(
    interpreter: &str,
    script: &str,
    dir: Option<&str>,
    env: &BTreeMap<String, String>,
    timeout: Option<Duration>,
) -> Result<CommandOutput> {
    let mut command = Command::new(interpreter);
    command
        .arg("-c")
        .arg(script)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = dir {
        command.current_dir(shellexpand::tilde(dir).to_string());
    }
    for (key, value) in env {
        command.env(key, value);
    }

    let Some(timeout) = timeout else {
        let output = command
            .output()
            .with_context(|| format!("could not run {interpreter}"))?;
        return Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            code: output.status.code(),
            success: output.status.success(),
        });
    };

    let mut child = command
        .spawn()
        .with_context(|| format!("could not run {interpreter}"))?;
    let deadline = Instant::now() + timeout;
    loop {
        if child.try_wait()?.is_some() {
            break;
        }
        if Instant::now() >= deadline {
            child.kill().ok();
            child.wait().ok();
            bail!("script timed out after {:.1}s", timeout.as_secs_f64());
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    let output = child.wait_with_output()?;
    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        code: output.status.code(),
        success: output.status.success(),
    })
}
