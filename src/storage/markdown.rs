//! Markdown storage for tasks
//!
//! Each task is stored as `<store>/<id>.md`: YAML frontmatter for metadata
//! and the description as the markdown body. The directory is scanned on
//! every read; there is no index.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::domain::{Task, TaskError, TaskFrontmatter, TaskId, TaskRepository};

const FRONTMATTER_DELIMITER: &str = "---";

/// Store for task data as markdown files
#[derive(Debug, Clone)]
pub struct TaskStore {
    /// Directory containing task files
    dir: PathBuf,
}

impl TaskStore {
    /// Creates a new task store at the given directory
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the directory containing task files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the path to a task file
    fn task_path(&self, id: &TaskId) -> PathBuf {
        self.dir.join(format!("{}.md", id))
    }

    /// Checks if a task exists
    pub fn exists(&self, id: &TaskId) -> bool {
        self.task_path(id).exists()
    }

    /// Reads a task from a file
    fn read_from_file(&self, path: &Path) -> Result<Task> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read task file: {}", path.display()))?;

        parse_markdown(&content)
            .with_context(|| format!("Malformed task file: {}", path.display()))
    }

    /// Writes a task to its file atomically (temp file + rename)
    fn write_to_file(&self, task: &Task) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create directory: {}", self.dir.display()))?;

        let path = self.task_path(&task.id);
        let temp_path = path.with_extension("md.tmp");
        let content = render_markdown(task)?;

        // Write to temp file first
        fs::write(&temp_path, &content)
            .with_context(|| format!("Failed to write temp file: {}", temp_path.display()))?;

        // Atomic rename
        fs::rename(&temp_path, &path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                temp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }

    /// Reads all tasks, sorted by ID
    ///
    /// Files that fail to parse are skipped. A missing directory is an empty
    /// store.
    pub fn read_all(&self) -> Result<Vec<Task>> {
        let mut tasks = Vec::new();

        if !self.dir.exists() {
            return Ok(tasks);
        }

        for entry in fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to read directory: {}", self.dir.display()))?
        {
            let entry = entry.context("Failed to read directory entry")?;
            let path = entry.path();

            if path.is_file() && path.extension().is_some_and(|e| e == "md") {
                if let Ok(task) = self.read_from_file(&path) {
                    tasks.push(task);
                }
            }
        }

        tasks.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(tasks)
    }

    /// Returns the ID of every `.md` file, whether or not it parses, sorted
    pub fn read_ids(&self) -> Result<Vec<TaskId>> {
        let mut ids = Vec::new();

        if !self.dir.exists() {
            return Ok(ids);
        }

        for entry in fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to read directory: {}", self.dir.display()))?
        {
            let path = entry.context("Failed to read directory entry")?.path();
            if !path.extension().is_some_and(|e| e == "md") {
                continue;
            }
            // Stems that are not valid IDs can never collide with a generated one
            if let Some(id) = path.file_stem().and_then(|s| s.to_str()?.parse().ok()) {
                ids.push(id);
            }
        }

        ids.sort();
        Ok(ids)
    }

    /// Reads a single task by ID
    pub fn read(&self, id: &TaskId) -> Result<Option<Task>> {
        let path = self.task_path(id);
        if !path.exists() {
            return Ok(None);
        }

        let task = self.read_from_file(&path)?;
        if &task.id != id {
            anyhow::bail!(
                "Task file {} declares id '{}'",
                path.display(),
                task.id
            );
        }
        Ok(Some(task))
    }

    /// Writes a task
    pub fn write(&self, task: &Task) -> Result<()> {
        self.write_to_file(task)
    }

    /// Removes a task by ID
    pub fn remove(&self, id: &TaskId) -> Result<bool> {
        let path = self.task_path(id);
        if !path.exists() {
            return Ok(false);
        }

        fs::remove_file(&path)
            .with_context(|| format!("Failed to remove task file: {}", path.display()))?;

        Ok(true)
    }
}

impl TaskRepository for TaskStore {
    fn list_all(&self) -> Result<Vec<Task>, TaskError> {
        Ok(self.read_all()?)
    }

    fn ids(&self) -> Result<Vec<TaskId>, TaskError> {
        Ok(self.read_ids()?)
    }

    fn load(&self, id: &TaskId) -> Result<Task, TaskError> {
        self.read(id)?.ok_or_else(|| TaskError::not_found(id))
    }

    fn save(&self, task: &Task) -> Result<(), TaskError> {
        Ok(self.write(task)?)
    }

    fn delete(&self, id: &TaskId) -> Result<(), TaskError> {
        if self.remove(id)? {
            Ok(())
        } else {
            Err(TaskError::not_found(id))
        }
    }
}

/// Splits a document into its frontmatter YAML and body
fn split_frontmatter(content: &str) -> Result<(&str, &str)> {
    let mut lines = content.split_inclusive('\n');

    let first = lines.next().unwrap_or_default();
    if first.trim() != FRONTMATTER_DELIMITER {
        anyhow::bail!("Missing frontmatter (must start with ---)");
    }

    let yaml_start = first.len();
    let mut offset = yaml_start;
    for line in lines {
        if line.trim() == FRONTMATTER_DELIMITER {
            return Ok((&content[yaml_start..offset], &content[offset + line.len()..]));
        }
        offset += line.len();
    }

    anyhow::bail!("Missing frontmatter end delimiter (---)")
}

/// Parses a markdown string into a Task
fn parse_markdown(content: &str) -> Result<Task> {
    let (yaml, body) = split_frontmatter(content)?;

    let fm: TaskFrontmatter = serde_yaml::from_str(yaml).context("Failed to parse frontmatter")?;

    Ok(fm.into_task(body))
}

/// Renders a task to markdown
fn render_markdown(task: &Task) -> Result<String> {
    let frontmatter = TaskFrontmatter::from(task);
    let yaml = serde_yaml::to_string(&frontmatter).context("Failed to serialize frontmatter")?;

    let mut content = String::new();
    content.push_str("---\n");
    content.push_str(&yaml);
    content.push_str("---\n");

    if let Some(description) = &task.description {
        content.push('\n');
        content.push_str(description);
        if !content.ends_with('\n') {
            content.push('\n');
        }
    }

    Ok(content)
}
