//! `user` - manage system user accounts.
//!
//! The task talks to the system through the [`SystemUtils`] trait so the
//! convergence logic stays testable without a root shell.

use anyhow::{Context, Result};
use resource::{BoxedTask, Renderer, Task, TaskStatus};
use serde::Deserialize;
use std::fmt;
use std::process::Command;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    #[default]
    Present,
    Absent,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Preparer {
    pub username: String,
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub gid: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub home_dir: Option<String>,
    #[serde(default)]
    pub state: State,
}

impl resource::Preparer for Preparer {
    fn prepare(&self, _renderer: &dyn Renderer) -> Result<BoxedTask> {
        Ok(Box::new(User {
            username: self.username.clone(),
            uid: self.uid.clone(),
            gid: self.gid.clone(),
            name: self.name.clone(),
            home_dir: self.home_dir.clone(),
            state: self.state,
            system: Arc::new(UnixSystem),
        }))
    }
}

/// System operations the task needs. A lookup miss is `Ok(None)`, not an
/// error; errors mean the system itself could not answer.
pub trait SystemUtils: Send + Sync {
    fn lookup(&self, username: &str) -> Result<Option<UserInfo>>;
    fn add_user(&self, username: &str, options: &UserOptions) -> Result<()>;
    fn del_user(&self, username: &str) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub uid: String,
}

#[derive(Debug, Clone, Default)]
pub struct UserOptions {
    pub uid: Option<String>,
    pub gid: Option<String>,
    pub name: Option<String>,
    pub home_dir: Option<String>,
}

pub struct User {
    username: String,
    uid: Option<String>,
    gid: Option<String>,
    name: Option<String>,
    home_dir: Option<String>,
    state: State,
    system: Arc<dyn SystemUtils>,
}

impl User {
    #[cfg(test)]
    fn with_system(username: &str, state: State, system: Arc<dyn SystemUtils>) -> Self {
        User {
            username: username.to_string(),
            uid: None,
            gid: None,
            name: None,
            home_dir: None,
            state,
            system,
        }
    }

    fn options(&self) -> UserOptions {
        UserOptions {
            uid: self.uid.clone(),
            gid: self.gid.clone(),
            name: self.name.clone(),
            home_dir: self.home_dir.clone(),
        }
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("username", &self.username)
            .field("state", &self.state)
            .finish()
    }
}

impl Task for User {
    fn check(&self, _renderer: &dyn Renderer) -> Result<TaskStatus> {
        let existing = self.system.lookup(&self.username)?;
        let status = match (self.state, existing) {
            (State::Present, None) => TaskStatus::no_change()
                .with_message("user does not exist")
                .with_diff("user", "absent", format!("user {}", self.username)),
            (State::Present, Some(info)) => {
                if let Some(uid) = &self.uid
                    && *uid != info.uid
                {
                    TaskStatus::fatal(format!(
                        "user {} exists with uid {}, wanted {uid}",
                        self.username, info.uid
                    ))
                } else {
                    TaskStatus::no_change()
                }
            }
            (State::Absent, Some(_)) => TaskStatus::no_change()
                .with_message("user exists")
                .with_diff("user", format!("user {}", self.username), "absent"),
            (State::Absent, None) => TaskStatus::no_change(),
        };
        Ok(status)
    }

    fn apply(&self, _renderer: &dyn Renderer) -> Result<TaskStatus> {
        match self.state {
            State::Present => self
                .system
                .add_user(&self.username, &self.options())
                .with_context(|| format!("could not add user {}", self.username))?,
            State::Absent => self
                .system
                .del_user(&self.username)
                .with_context(|| format!("could not delete user {}", self.username))?,
        }
        Ok(TaskStatus::no_change())
    }
}

/// Shells out to `id`, `useradd`, and `userdel`.
pub struct UnixSystem;

impl SystemUtils for UnixSystem {
    fn lookup(&self, username: &str) -> Result<Option<UserInfo>> {
        let output = Command::new("id")
            .arg("-u")
            .arg(username)
            .output()
            .context("could not run id")?;
        if !output.status.success() {
            return Ok(None);
        }
        Ok(Some(UserInfo {
            uid: String::from_utf8_lossy(&output.stdout).trim().to_string(),
        }))
    }

    fn add_user(&self, username: &str, options: &UserOptions) -> Result<()> {
        let mut command = Command::new("useradd");
        if let Some(uid) = &options.uid {
            command.arg("--uid").arg(uid);
        }
        if let Some(gid) = &options.gid {
            command.arg("--gid").arg(gid);
        }
        if let Some(name) = &options.name {
            command.arg("--comment").arg(name);
        }
        if let Some(home) = &options.home_dir {
            command.arg("--home-dir").arg(home);
        }
        let output = command.arg(username).output().context("could not run useradd")?;
        if !output.status.success() {
            anyhow::bail!(
                "useradd failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }

    fn del_user(&self, username: &str) -> Result<()> {
        let output = Command::new("userdel")
            .arg(username)
            .output()
            .context("could not run userdel")?;
        if !output.status.success() {
            anyhow::bail!(
                "userdel failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }
}
