use crate::task::TaskEntry;
use std::collections::BTreeSet;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("task `{name}` is already registered")]
    DuplicateTask { name: String },
    #[error("task name must be non-empty")]
    EmptyName,
}

#[derive(Debug)]
pub struct DiscoveredTask {
    pub name: String,
    pub origin: String,
    pub entry: TaskEntry,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedTask {
    pub name: String,
    pub origin: String,
}

#[derive(Debug)]
pub struct TaskRegistry {
    trusted_origins: BTreeSet<String>,
    entries: Vec<DiscoveredTask>,
}

impl TaskRegistry {
    pub fn new<I, S>(trusted_origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            trusted_origins: trusted_origins.into_iter().map(Into::into).collect(),
            entries: Vec::new(),
        }
    }

    pub fn register(
        &mut self,
        name: &str,
        entry: TaskEntry,
        origin: &str,
    ) -> Result<(), RegistryError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.entries.iter().any(|existing| existing.name == name) {
            return Err(RegistryError::DuplicateTask {
                name: name.to_string(),
            });
        }
        self.entries.push(DiscoveredTask {
            name: name.to_string(),
            origin: origin.to_string(),
            entry,
        });
        Ok(())
    }

    pub fn raw_names(&self) -> Vec<&str> {
        self.entries.iter().map(|entry| entry.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Builds the runnable task set in registration order, excluding every entry whose
    /// origin is not an exact match for a trusted module.
    pub fn discover(self) -> TaskSet {
        let mut tasks = Vec::new();
        let mut rejected = Vec::new();
        for entry in self.entries {
            if is_trusted(&self.trusted_origins, &entry.origin) {
                tasks.push(entry);
                continue;
            }
            tracing::warn!(
                target: "security",
                task = %entry.name,
                origin = %entry.origin,
                "excluding task registered from an untrusted origin"
            );
            rejected.push(RejectedTask {
                name: entry.name,
                origin: entry.origin,
            });
        }
        TaskSet { tasks, rejected }
    }
}

fn is_trusted(trusted_origins: &BTreeSet<String>, origin: &str) -> bool {
    !origin.is_empty() && trusted_origins.contains(origin)
}

#[derive(Debug, Default)]
pub struct TaskSet {
    tasks: Vec<DiscoveredTask>,
    rejected: Vec<RejectedTask>,
}

impl TaskSet {
    pub fn get(&self, name: &str) -> Option<&DiscoveredTask> {
        self.tasks.iter().find(|task| task.name == name)
    }

    pub fn find(&self, name: &str) -> Option<&DiscoveredTask> {
        self.get(name).or_else(|| {
            self.tasks
                .iter()
                .find(|task| task.name.eq_ignore_ascii_case(name))
        })
    }

    pub fn names(&self) -> Vec<&str> {
        self.tasks.iter().map(|task| task.name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DiscoveredTask> {
        self.tasks.iter()
    }

    pub fn matching(&self, filters: &[String]) -> Vec<&DiscoveredTask> {
        if filters.is_empty() {
            return self.tasks.iter().collect();
        }
        let needles: Vec<String> = filters
            .iter()
            .map(|filter| filter.trim().to_ascii_lowercase())
            .filter(|filter| !filter.is_empty())
            .collect();
        self.tasks
            .iter()
            .filter(|task| {
                let name = task.name.to_ascii_lowercase();
                needles.iter().any(|needle| name.contains(needle))
            })
            .collect()
    }

    pub fn rejected(&self) -> &[RejectedTask] {
        &self.rejected
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
