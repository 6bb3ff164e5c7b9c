//! Dependency declarations and their parsing.

use super::{TaskDomainError, TaskId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Set of tasks that must be done before a task may become ready.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DependencySet(BTreeSet<TaskId>);

impl DependencySet {
    /// Creates an empty dependency set.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Returns whether the set has no dependencies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of dependencies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether `id` is one of the dependencies.
    #[must_use]
    pub fn contains(&self, id: TaskId) -> bool {
        self.0.contains(&id)
    }

    /// Iterates over the dependencies in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.0.iter().copied()
    }

    /// Renders the set in declaration grammar, e.g. `#3, #7`.
    #[must_use]
    pub fn to_declaration(&self) -> String {
        self.iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl FromIterator<TaskId> for DependencySet {
    fn from_iter<I: IntoIterator<Item = TaskId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for DependencySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("(none)");
        }
        f.write_str(&self.to_declaration())
    }
}

/// Parses a free-text dependency declaration.
///
/// The grammar is a sequence of `#<digits>` references separated by commas,
/// semicolons or whitespace. An empty or blank declaration yields an empty
/// set. Repeated references collapse into one.
///
/// # Errors
///
/// Returns [`TaskDomainError::MalformedDependency`] for the first token that
/// is not a well-formed reference to a positive task number.
pub fn parse_dependencies(raw: &str) -> Result<DependencySet, TaskDomainError> {
    raw.split(|ch: char| ch == ',' || ch == ';' || ch.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(parse_reference)
        .collect()
}

fn parse_reference(token: &str) -> Result<TaskId, TaskDomainError> {
    let malformed = || TaskDomainError::MalformedDependency {
        raw_token: token.to_owned(),
    };
    let digits = token.strip_prefix('#').ok_or_else(malformed)?;
    if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(malformed());
    }
    let value: u64 = digits.parse().map_err(|_| malformed())?;
    TaskId::new(value).map_err(|_| malformed())
}
