//! `wait` - block until a shell check passes.
//!
//! Check runs the script once; apply re-runs it on an interval until it
//! passes or retries are exhausted. Useful for gating on slow services
//! brought up earlier in the graph.

use crate::resources::shell;
use anyhow::{Result, bail};
use resource::{BoxedTask, Renderer, Task, TaskStatus};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

fn default_interval() -> f64 {
    5.0
}

fn default_max_retry() -> u32 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct Preparer {
    /// Script whose exit status is awaited.
    pub check: String,
    #[serde(default)]
    pub interpreter: Option<String>,
    #[serde(default)]
    pub dir: Option<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Seconds between retries.
    #[serde(default = "default_interval")]
    pub interval: f64,
    /// Seconds to wait before the first retry.
    #[serde(default)]
    pub grace_period: f64,
    /// Retries before giving up.
    #[serde(default = "default_max_retry")]
    pub max_retry: u32,
}

impl resource::Preparer for Preparer {
    fn prepare(&self, _renderer: &dyn Renderer) -> Result<BoxedTask> {
        Ok(Box::new(Wait {
            interpreter: self
                .interpreter
                .clone()
                .unwrap_or_else(|| "/bin/sh".to_string()),
            check: self.check.clone(),
            dir: self.dir.clone(),
            env: self.env.clone(),
            interval: Duration::from_secs_f64(self.interval),
            grace_period: Duration::from_secs_f64(self.grace_period),
            max_retry: self.max_retry,
        }))
    }
}

#[derive(Debug, Clone)]
pub struct Wait {
    interpreter: String,
    check: String,
    dir: Option<String>,
    env: BTreeMap<String, String>,
    interval: Duration,
    grace_period: Duration,
    max_retry: u32,
}

impl Wait {
    fn passes(&self) -> Result<bool> {
        let output =
            shell::run_script(&self.interpreter, &self.check, self.dir.as_deref(), &self.env, None)?;
        Ok(output.success)
    }
}

impl Task for Wait {
    fn check(&self, _renderer: &dyn Renderer) -> Result<TaskStatus> {
        let status = if self.passes()? {
            TaskStatus::no_change()
        } else {
            TaskStatus::no_change()
                .with_message("check has not passed yet")
                .with_diff("check", "failing", "passing")
        };
        Ok(status)
    }

    fn apply(&self, _renderer: &dyn Renderer) -> Result<TaskStatus> {
        std::thread::sleep(self.grace_period);
        for retry in 0..=self.max_retry {
            if self.passes()? {
                return Ok(TaskStatus::no_change()
                    .with_message(format!("check passed after {retry} retries")));
            }
            if retry < self.max_retry {
                std::thread::sleep(self.interval);
            }
        }
        bail!("check did not pass after {} retries", self.max_retry);
    }
}
