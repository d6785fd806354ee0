//! Task categories and the gate that decides which pipeline tasks run.
//!
//! Every pipeline task declares its [`TaskCategory`] explicitly, or none for
//! core work that always runs. A [`TaskPolicy`] names the enabled categories
//! and the [`TaskGate`] applies it to the whole task graph before anything
//! executes. The default policy enables no optional category.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};

/// A named class of optional pipeline work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskCategory {
    /// Verification of the generated bindings.
    Test,
    /// Benchmarks.
    Benchmark,
    /// Documentation generation.
    Documentation,
    /// API compatibility check against a baseline schema.
    CompatibilityCheck,
    /// Style checks on the schema sources.
    StyleCheck,
    /// Source archive packaging.
    SourceArchive,
}

impl TaskCategory {
    /// Every category, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Test,
        Self::Benchmark,
        Self::Documentation,
        Self::CompatibilityCheck,
        Self::StyleCheck,
        Self::SourceArchive,
    ];

    /// Returns the short name used on the command line.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Test => "test",
            Self::Benchmark => "bench",
            Self::Documentation => "docs",
            Self::CompatibilityCheck => "compat",
            Self::StyleCheck => "style",
            Self::SourceArchive => "sources",
        }
    }

    /// Classifies a Gradle-style task path by the substrings the legacy
    /// build used to deny.
    ///
    /// Matching is case-insensitive except for `checkstyle`.
    ///
    /// # Examples
    ///
    /// ```
    /// use otlp_bindings_core::TaskCategory;
    ///
    /// assert_eq!(
    ///     TaskCategory::classify_legacy_path(":compileTestJava"),
    ///     Some(TaskCategory::Test)
    /// );
    /// assert_eq!(TaskCategory::classify_legacy_path(":compileJava"), None);
    /// ```
    #[must_use]
    pub fn classify_legacy_path(path: &str) -> Option<Self> {
        let lower = path.to_ascii_lowercase();

        if lower.contains("japicmp") {
            Some(Self::CompatibilityCheck)
        } else if lower.contains("test") {
            Some(Self::Test)
        } else if lower.contains("javadoc") {
            Some(Self::Documentation)
        } else if lower.contains("benchmark") {
            Some(Self::Benchmark)
        } else if path.contains("checkstyle") {
            Some(Self::StyleCheck)
        } else if lower.contains("sourcesjar") {
            Some(Self::SourceArchive)
        } else {
            None
        }
    }

    fn expected_names() -> String {
        Self::ALL
            .iter()
            .map(Self::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::UnknownTaskCategory {
                name: name.to_string(),
                expected: Self::expected_names(),
            })
    }
}

/// The set of enabled optional task categories.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPolicy {
    enabled: BTreeSet<TaskCategory>,
}

impl TaskPolicy {
    /// Creates a policy with every optional category disabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a policy with every optional category enabled.
    #[must_use]
    pub fn all() -> Self {
        Self {
            enabled: TaskCategory::ALL.into_iter().collect(),
        }
    }

    /// Enables a category.
    #[must_use]
    pub fn enable(mut self, category: TaskCategory) -> Self {
        self.enabled.insert(category);
        self
    }

    /// Disables a category.
    #[must_use]
    pub fn disable(mut self, category: TaskCategory) -> Self {
        self.enabled.remove(&category);
        self
    }

    /// Returns true if the category is enabled.
    #[must_use]
    pub fn is_enabled(&self, category: TaskCategory) -> bool {
        self.enabled.contains(&category)
    }

    /// Returns true if a task of the given category may run.
    ///
    /// Uncategorized tasks always run.
    #[must_use]
    pub fn allows(&self, category: Option<TaskCategory>) -> bool {
        category.map_or(true, |c| self.is_enabled(c))
    }

    /// Returns the enabled categories in order.
    pub fn enabled(&self) -> impl Iterator<Item = TaskCategory> + '_ {
        self.enabled.iter().copied()
    }
}

impl FromIterator<TaskCategory> for TaskPolicy {
    fn from_iter<I: IntoIterator<Item = TaskCategory>>(iter: I) -> Self {
        Self {
            enabled: iter.into_iter().collect(),
        }
    }
}

/// A node of the pipeline task graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Task path (e.g. `:generateBindings`).
    pub path: String,
    /// Optional category; `None` marks core work.
    pub category: Option<TaskCategory>,
}

impl Task {
    /// Creates a core task that always runs.
    #[must_use]
    pub fn core(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            category: None,
        }
    }

    /// Creates an optional task in the given category.
    #[must_use]
    pub fn optional(path: impl Into<String>, category: TaskCategory) -> Self {
        Self {
            path: path.into(),
            category: Some(category),
        }
    }

    /// Creates a task whose category is inferred from a legacy task path.
    #[must_use]
    pub fn from_legacy_path(path: impl Into<String>) -> Self {
        let path = path.into();
        let category = TaskCategory::classify_legacy_path(&path);
        Self { path, category }
    }
}

/// Whether a task runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskDecision {
    /// The task runs.
    Execute,
    /// The task is disabled by the policy.
    Skip,
}

/// Applies a [`TaskPolicy`] to a task graph.
#[derive(Debug, Clone, Default)]
pub struct TaskGate {
    policy: TaskPolicy,
}

impl TaskGate {
    /// Creates a gate for the given policy.
    #[must_use]
    pub const fn new(policy: TaskPolicy) -> Self {
        Self { policy }
    }

    /// Returns the policy.
    #[must_use]
    pub const fn policy(&self) -> &TaskPolicy {
        &self.policy
    }

    /// Decides a single task without logging.
    #[must_use]
    pub fn decide(&self, task: &Task) -> TaskDecision {
        if self.policy.allows(task.category) {
            TaskDecision::Execute
        } else {
            TaskDecision::Skip
        }
    }

    /// Decides every task in the graph and logs one line per task.
    ///
    /// # Examples
    ///
    /// ```
    /// use otlp_bindings_core::{Task, TaskDecision, TaskGate, TaskPolicy};
    ///
    /// let gate = TaskGate::new(TaskPolicy::new());
    /// let plan = gate.plan(&[
    ///     Task::from_legacy_path(":compileJava"),
    ///     Task::from_legacy_path(":compileTestJava"),
    /// ]);
    /// assert_eq!(plan[0].1, TaskDecision::Execute);
    /// assert_eq!(plan[1].1, TaskDecision::Skip);
    /// ```
    #[must_use]
    pub fn plan(&self, tasks: &[Task]) -> Vec<(Task, TaskDecision)> {
        tasks
            .iter()
            .map(|task| {
                let decision = self.decide(task);
                let category = task.category.map_or("core", |c| c.as_str());
                match decision {
                    TaskDecision::Execute => {
                        info!(task = %task.path, category, "Executing task");
                    }
                    TaskDecision::Skip => {
                        info!(task = %task.path, category, "Skipping task");
                    }
                }
                (task.clone(), decision)
            })
            .collect()
    }
}
