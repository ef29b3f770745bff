//! `file.content` - ensure a file exists with the given content.

use anyhow::{Context, Result};
use resource::{BoxedTask, Renderer, Task, TaskStatus};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct Preparer {
    /// Path of the managed file; `~` is expanded.
    pub destination: String,
    /// Desired content. Interpolated before the preparer is decoded.
    #[serde(default)]
    pub content: String,
}

impl resource::Preparer for Preparer {
    fn prepare(&self, _renderer: &dyn Renderer) -> Result<BoxedTask> {
        let destination = shellexpand::tilde(&self.destination).to_string();
        Ok(Box::new(FileContent {
            destination: PathBuf::from(destination),
            content: self.content.clone(),
        }))
    }
}

#[derive(Debug, Clone)]
pub struct FileContent {
    destination: PathBuf,
    content: String,
}

impl FileContent {
    fn current(&self) -> Result<Option<String>> {
        if !self.destination.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.destination)
            .with_context(|| format!("could not read {}", self.destination.display()))?;
        Ok(Some(content))
    }
}

impl Task for FileContent {
    fn check(&self, _renderer: &dyn Renderer) -> Result<TaskStatus> {
        let status = match self.current()? {
            None => TaskStatus::no_change()
                .with_message(format!("{} does not exist", self.destination.display()))
                .with_diff("content", "<absent>", self.content.as_str()),
            Some(current) if current != self.content => {
                TaskStatus::no_change().with_diff("content", current, self.content.as_str())
            }
            Some(_) => TaskStatus::no_change(),
        };
        Ok(status)
    }

    fn apply(&self, _renderer: &dyn Renderer) -> Result<TaskStatus> {
        if let Some(parent) = self.destination.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("could not create {}", parent.display()))?;
        }
        fs::write(&self.destination, &self.content)
            .with_context(|| format!("could not write {}", self.destination.display()))?;
        Ok(TaskStatus::no_change())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resource::NoopRenderer;

    fn task(dir: &std::path::Path, content: &str) -> FileContent {
        FileContent {
            destination: dir.join("managed.txt"),
            content: content.to_string(),
        }
    }

    #[test]
    fn test_check_missing_file_will_change() {
        let dir = tempfile::tempdir().unwrap();
        let status = task(dir.path(), "hola").check(&NoopRenderer).unwrap();
        assert!(status.has_changes());
        assert_eq!(status.diffs()["content"].original, "<absent>");
        assert_eq!(status.diffs()["content"].current, "hola");
    }

    #[test]
    fn test_check_wrong_content_will_change() {
        let dir = tempfile::tempdir().unwrap();
        let t = task(dir.path(), "hola");
        fs::write(&t.destination, "hi").unwrap();
        let status = t.check(&NoopRenderer).unwrap();
        assert!(status.has_changes());
        assert_eq!(status.diffs()["content"].original, "hi");
    }

    #[test]
    fn test_apply_then_check_converges() {
        let dir = tempfile::tempdir().unwrap();
        let t = task(dir.path(), "hola");
        assert!(t.check(&NoopRenderer).unwrap().has_changes());
        t.apply(&NoopRenderer).unwrap();
        assert!(!t.check(&NoopRenderer).unwrap().has_changes());
        assert_eq!(fs::read_to_string(&t.destination).unwrap(), "hola");
    }

    #[test]
    fn test_apply_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let t = FileContent {
            destination: dir.path().join("a/b/managed.txt"),
            content: "x".into(),
        };
        t.apply(&NoopRenderer).unwrap();
        assert!(t.destination.exists());
    }
}
