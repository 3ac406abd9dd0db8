//! Task dependency graph.
//!
//! Nodes are [`TaskId`]s and an edge `a -> b` means `a` must complete
//! successfully before `b` may start. Graphs are usually assembled in stages:
//!
//! ```ignore
//! let graph = TaskGraph::new()
//!     .then(TaskId::Clean)
//!     .then(TaskId::Copy)
//!     .then_all(&[TaskId::Styles, TaskId::Scripts]);
//! ```

use crate::tasks::TaskId;
use std::collections::{HashMap, HashSet};

/// A directed acyclic graph of tasks.
#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    /// Tasks in insertion order
    tasks: Vec<TaskId>,
    /// Prerequisites of each task
    dependencies: HashMap<TaskId, Vec<TaskId>>,
    /// Tasks added by the most recent stage
    last_stage: Vec<TaskId>,
}

impl TaskGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// A graph holding one task with no dependencies.
    pub fn single(task: TaskId) -> Self {
        Self::new().then(task)
    }

    /// Add a task that depends on every task of the previous stage.
    pub fn then(self, task: TaskId) -> Self {
        self.then_all(&[task])
    }

    /// Add a stage of tasks that run in parallel, each depending on every
    /// task of the previous stage.
    pub fn then_all(mut self, tasks: &[TaskId]) -> Self {
        let previous = std::mem::take(&mut self.last_stage);
        for &task in tasks {
            self.add_task(task);
            for &dep in &previous {
                self.add_dependency(task, dep);
            }
        }
        self.last_stage = tasks.to_vec();
        self
    }

    /// Add a task with no dependencies. Adding a task twice is a no-op.
    pub fn add_task(&mut self, task: TaskId) {
        if !self.dependencies.contains_key(&task) {
            self.tasks.push(task);
            self.dependencies.insert(task, Vec::new());
        }
    }

    /// Record that `task` must wait for `dep`. Both are added if missing.
    pub fn add_dependency(&mut self, task: TaskId, dep: TaskId) {
        self.add_task(dep);
        self.add_task(task);
        let deps = self.dependencies.entry(task).or_default();
        if !deps.contains(&dep) {
            deps.push(dep);
        }
    }

    /// All tasks in insertion order.
    pub fn tasks(&self) -> &[TaskId] {
        &self.tasks
    }

    pub fn contains(&self, task: TaskId) -> bool {
        self.dependencies.contains_key(&task)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Direct prerequisites of a task.
    pub fn dependencies(&self, task: TaskId) -> &[TaskId] {
        self.dependencies.get(&task).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Tasks that directly depend on `task`, in insertion order.
    pub fn dependents(&self, task: TaskId) -> Vec<TaskId> {
        self.tasks.iter().copied().filter(|t| self.dependencies(*t).contains(&task)).collect()
    }

    /// Get tasks in execution order (prerequisites before dependents).
    ///
    /// Returns an error if the graph contains a cycle.
    pub fn topological_order(&self) -> Result<Vec<TaskId>, GraphError> {
        let mut result = Vec::new();
        let mut visited = HashSet::new();
        let mut visiting = HashSet::new();

        for &task in &self.tasks {
            self.visit(task, &mut visited, &mut visiting, &mut result)?;
        }

        Ok(result)
    }

    fn visit(
        &self,
        task: TaskId,
        visited: &mut HashSet<TaskId>,
        visiting: &mut HashSet<TaskId>,
        result: &mut Vec<TaskId>,
    ) -> Result<(), GraphError> {
        if visited.contains(&task) {
            return Ok(());
        }

        if !visiting.insert(task) {
            return Err(GraphError::CyclicDependency(task));
        }

        for &dep in self.dependencies(task) {
            self.visit(dep, visited, visiting, result)?;
        }

        visiting.remove(&task);
        visited.insert(task);
        result.push(task);

        Ok(())
    }

    /// The task plus everything that transitively depends on it, in
    /// execution order. A task outside the graph yields just itself.
    pub fn downstream(&self, task: TaskId) -> Result<Vec<TaskId>, GraphError> {
        if !self.contains(task) {
            return Ok(vec![task]);
        }

        let mut reached: HashSet<TaskId> = HashSet::from([task]);
        let mut frontier = vec![task];
        while let Some(current) = frontier.pop() {
            for dependent in self.dependents(current) {
                if reached.insert(dependent) {
                    frontier.push(dependent);
                }
            }
        }

        Ok(self.topological_order()?.into_iter().filter(|t| reached.contains(t)).collect())
    }

    /// Restrict the graph to `keep`, preserving edges between kept tasks.
    pub fn subgraph(&self, keep: &[TaskId]) -> TaskGraph {
        let mut graph = TaskGraph::new();
        for &task in self.tasks.iter().filter(|t| keep.contains(t)) {
            graph.add_task(task);
            for &dep in self.dependencies(task) {
                if keep.contains(&dep) {
                    graph.add_dependency(task, dep);
                }
            }
        }
        for &task in keep {
            graph.add_task(task);
        }
        graph
    }
}

/// Error during graph ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Circular dependency detected
    CyclicDependency(TaskId),
}

impl std::fmt::Display for GraphError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphError::CyclicDependency(task) => {
                write!(f, "Circular dependency detected involving task '{}'", task)
            }
        }
    }
}

impl std::error::Error for GraphError {}

#[cfg(test)]
mod tests {
    use super::*;
    use TaskId::*;

    fn position(order: &[TaskId], task: TaskId) -> usize {
        order.iter().position(|t| *t == task).unwrap()
    }

    #[test]
    fn test_stages_add_edges_to_previous_stage() {
        let graph = TaskGraph::new().then(Clean).then(Copy).then_all(&[Styles, Html]);

        assert_eq!(graph.len(), 4);
        assert!(graph.dependencies(Clean).is_empty());
        assert_eq!(graph.dependencies(Copy), &[Clean]);
        assert_eq!(graph.dependencies(Styles), &[Copy]);
        assert_eq!(graph.dependencies(Html), &[Copy]);
    }

    #[test]
    fn test_stage_after_parallel_group_waits_for_all() {
        let graph = TaskGraph::new().then_all(&[Styles, Scripts]).then(Sprite);
        assert_eq!(graph.dependencies(Sprite), &[Styles, Scripts]);
    }

    #[test]
    fn test_topological_order() {
        let graph = TaskGraph::new()
            .then(Clean)
            .then(Copy)
            .then(OptimizeImages)
            .then_all(&[Styles, Webp, Sprite]);

        let order = graph.topological_order().unwrap();
        assert_eq!(order.len(), 6);
        assert_eq!(order[0], Clean);
        assert!(position(&order, Copy) < position(&order, OptimizeImages));
        for task in [Styles, Webp, Sprite] {
            assert!(position(&order, OptimizeImages) < position(&order, task));
        }
    }

    #[test]
    fn test_cycle_detected() {
        let mut graph = TaskGraph::new();
        graph.add_dependency(Styles, Scripts);
        graph.add_dependency(Scripts, Styles);

        assert!(matches!(graph.topological_order(), Err(GraphError::CyclicDependency(_))));
    }

    #[test]
    fn test_duplicate_edges_ignored() {
        let mut graph = TaskGraph::new();
        graph.add_dependency(Copy, Clean);
        graph.add_dependency(Copy, Clean);
        assert_eq!(graph.dependencies(Copy), &[Clean]);
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn test_downstream_of_root_is_everything() {
        let graph = TaskGraph::new().then(Clean).then(Copy).then_all(&[Styles, Html]);
        let downstream = graph.downstream(Clean).unwrap();
        assert_eq!(downstream.len(), 4);
        assert_eq!(downstream[0], Clean);
    }

    #[test]
    fn test_downstream_of_leaf_is_itself() {
        let graph = TaskGraph::new().then(Clean).then_all(&[Styles, Html]);
        assert_eq!(graph.downstream(Styles).unwrap(), vec![Styles]);
    }

    #[test]
    fn test_downstream_outside_graph() {
        let graph = TaskGraph::new().then(Clean);
        assert_eq!(graph.downstream(ChangedImages).unwrap(), vec![ChangedImages]);
    }

    #[test]
    fn test_subgraph_keeps_internal_edges() {
        let graph = TaskGraph::new().then(Clean).then(Copy).then_all(&[Styles, Html]);
        let sub = graph.subgraph(&[Copy, Styles]);

        assert_eq!(sub.len(), 2);
        assert!(sub.dependencies(Copy).is_empty());
        assert_eq!(sub.dependencies(Styles), &[Copy]);
    }

    #[test]
    fn test_dependents() {
        let graph = TaskGraph::new().then(Copy).then_all(&[Styles, Html]);
        assert_eq!(graph.dependents(Copy), vec![Styles, Html]);
        assert!(graph.dependents(Styles).is_empty());
    }
}
