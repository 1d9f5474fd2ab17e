//! Graph result store: append-only values of completed tasks.

use crate::error::{Error, Result};
use std::collections::HashMap;

/// Values produced by completed tasks, keyed by task name.
///
/// A name is written once, by the scheduler, when its task completes.
#[derive(Debug, Clone)]
pub struct ResultStore<V> {
    values: HashMap<String, V>,
}

impl<V> Default for ResultStore<V> {
    fn default() -> Self {
        Self {
            values: HashMap::new(),
        }
    }
}

impl<V> ResultStore<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the value of a completed task.
    ///
    /// # Errors
    /// Returns an error if the name already has a value.
    pub fn insert(&mut self, name: &str, value: V) -> Result<()> {
        if self.values.contains_key(name) {
            return Err(Error::GraphDefinition(format!(
                "Task {} completed more than once",
                name
            )));
        }
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&V> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Names with a value, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.values.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn into_inner(self) -> HashMap<String, V> {
        self.values
    }
}

impl<V: Clone> ResultStore<V> {
    /// Read-only copy of the values of `names` that are present.
    pub fn snapshot(&self, names: &[String]) -> TaskInputs<V> {
        let values = names
            .iter()
            .filter_map(|name| self.values.get(name).map(|v| (name.clone(), v.clone())))
            .collect();
        TaskInputs { values }
    }
}

/// What a task sees of the store: its dependencies' values only.
#[derive(Debug, Clone)]
pub struct TaskInputs<V> {
    values: HashMap<String, V>,
}

impl<V> Default for TaskInputs<V> {
    fn default() -> Self {
        Self {
            values: HashMap::new(),
        }
    }
}

impl<V> TaskInputs<V> {
    pub fn from_map(values: HashMap<String, V>) -> Self {
        Self { values }
    }

    pub fn get(&self, dependency: &str) -> Option<&V> {
        self.values.get(dependency)
    }

    /// Value of `dependency`, or a `MissingValue` error on behalf of `task`.
    pub fn require(&self, task: &str, dependency: &str) -> Result<&V> {
        self.values.get(dependency).ok_or_else(|| Error::MissingValue {
            task: task.to_string(),
            detail: format!("{} is not a completed dependency", dependency),
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
