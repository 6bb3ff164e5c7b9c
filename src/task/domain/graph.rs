//! Dependency graph resolution over the full task set.

use super::{DependencySet, Task, TaskId, WorkflowStatus};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

/// The full set of tasks on a board, keyed by identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Board {
    tasks: BTreeMap<TaskId, Task>,
}

impl Board {
    /// Creates an empty board.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            tasks: BTreeMap::new(),
        }
    }

    /// Looks up a task by identifier.
    #[must_use]
    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(&id)
    }

    /// Returns the workflow status of a task, if it is on the board.
    #[must_use]
    pub fn status_of(&self, id: TaskId) -> Option<WorkflowStatus> {
        self.get(id).map(Task::status)
    }

    /// Iterates over tasks in ascending identifier order.
    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    /// Returns the number of tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns whether the board has no tasks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Inserts or replaces a task.
    pub fn upsert(&mut self, task: Task) {
        self.tasks.insert(task.id(), task);
    }

    pub(crate) fn get_mut(&mut self, id: TaskId) -> Option<&mut Task> {
        self.tasks.get_mut(&id)
    }

    /// Returns every task currently in progress or in review.
    #[must_use]
    pub fn active_tasks(&self) -> Vec<TaskId> {
        self.iter()
            .filter(|task| task.status().is_active())
            .map(Task::id)
            .collect()
    }

    /// Returns an active task other than `id`, if one exists.
    #[must_use]
    pub fn active_task_other_than(&self, id: TaskId) -> Option<TaskId> {
        self.iter()
            .filter(|task| task.id() != id && task.status().is_active())
            .map(Task::id)
            .next()
    }
}

impl FromIterator<Task> for Board {
    fn from_iter<I: IntoIterator<Item = Task>>(iter: I) -> Self {
        Self {
            tasks: iter.into_iter().map(|task| (task.id(), task)).collect(),
        }
    }
}

/// A dependency cycle among unfinished tasks.
///
/// Members are listed in traversal order, rotated so the smallest identifier
/// comes first. The closing edge back to the first member is implied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cycle(Vec<TaskId>);

impl Cycle {
    fn normalized(mut members: Vec<TaskId>) -> Self {
        let start = members
            .iter()
            .enumerate()
            .min_by_key(|(_, id)| **id)
            .map_or(0, |(position, _)| position);
        members.rotate_left(start);
        Self(members)
    }

    /// Returns the tasks on the cycle.
    #[must_use]
    pub fn members(&self) -> &[TaskId] {
        &self.0
    }

    /// Returns whether `id` lies on the cycle.
    #[must_use]
    pub fn contains(&self, id: TaskId) -> bool {
        self.0.contains(&id)
    }
}

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for id in &self.0 {
            write!(f, "{id} -> ")?;
        }
        match self.0.first() {
            Some(first) => write!(f, "{first}"),
            None => Ok(()),
        }
    }
}

/// Returns whether every dependency of `task` is done.
///
/// A dependency that is not on the board counts as not done.
#[must_use]
pub fn is_ready(task: &Task, board: &Board) -> bool {
    task.dependencies()
        .iter()
        .all(|id| board.status_of(id) == Some(WorkflowStatus::Done))
}

/// Returns the dependencies of `task` that are not done, in ascending order.
#[must_use]
pub fn unmet_dependencies(task: &Task, board: &Board) -> Vec<TaskId> {
    task.dependencies()
        .iter()
        .filter(|id| board.status_of(*id) != Some(WorkflowStatus::Done))
        .collect()
}

/// Returns every task that declares `id` as a dependency.
#[must_use]
pub fn find_dependents(id: TaskId, board: &Board) -> Vec<TaskId> {
    board
        .iter()
        .filter(|task| task.dependencies().contains(id))
        .map(Task::id)
        .collect()
}

/// Searches the dependency relation among unfinished tasks for a cycle.
#[must_use]
pub fn detect_cycle(board: &Board) -> Option<Cycle> {
    let mut search = CycleSearch::new(board);
    board
        .iter()
        .filter(|task| !task.status().is_terminal())
        .find_map(|task| search.visit(task.id()))
}

/// Searches for a cycle reachable from `start` among unfinished tasks.
#[must_use]
pub fn detect_cycle_from(start: TaskId, board: &Board) -> Option<Cycle> {
    CycleSearch::new(board).visit(start)
}

/// Searches for a cycle as if `id` declared `dependencies` instead of its
/// current declaration.
#[must_use]
pub fn detect_cycle_with(id: TaskId, dependencies: &DependencySet, board: &Board) -> Option<Cycle> {
    let mut proposed = board.clone();
    if let Some(task) = proposed.get_mut(id) {
        task.replace_dependencies(dependencies.clone());
    }
    detect_cycle_from(id, &proposed)
}

/// Depth-first search state shared across start nodes.
struct CycleSearch<'a> {
    board: &'a Board,
    finished: HashSet<TaskId>,
    path: Vec<TaskId>,
    on_path: BTreeSet<TaskId>,
}

impl<'a> CycleSearch<'a> {
    fn new(board: &'a Board) -> Self {
        Self {
            board,
            finished: HashSet::new(),
            path: Vec::new(),
            on_path: BTreeSet::new(),
        }
    }

    fn visit(&mut self, id: TaskId) -> Option<Cycle> {
        if self.on_path.contains(&id) {
            let start = self.path.iter().position(|member| *member == id)?;
            let members = self.path.get(start..)?.to_vec();
            return Some(Cycle::normalized(members));
        }
        if self.finished.contains(&id) {
            return None;
        }
        let task = self.board.get(id)?;
        if task.status().is_terminal() {
            return None;
        }

        self.path.push(id);
        self.on_path.insert(id);
        for dependency in task.dependencies().iter() {
            if let Some(cycle) = self.visit(dependency) {
                return Some(cycle);
            }
        }
        self.path.pop();
        self.on_path.remove(&id);
        self.finished.insert(id);
        None
    }
}
