//! Task dependency graph
//!
//! Pure graph logic over a parsed [`WorkflowSpec`]: Kahn's algorithm for
//! cycle rejection and topological layering, plus the transitive-dependents
//! query that failure propagation needs. Building the graph is the point
//! where a workflow earns the name DAG; everything after can assume
//! acyclicity.

use std::collections::{HashMap, VecDeque};

use neosec_core::config::workflow::{WorkflowError, WorkflowSpec};

/// An immutable, validated task dependency graph.
///
/// Node indices follow workflow declaration order, which keeps layering
/// deterministic for a given file.
#[derive(Debug)]
pub struct TaskGraph {
    ids: Vec<String>,
    index: HashMap<String, usize>,
    /// Edges dependency -> dependent.
    dependents: Vec<Vec<usize>>,
    /// Direct dependencies per node.
    dependencies: Vec<Vec<usize>>,
}

impl TaskGraph {
    /// Build the graph and reject cycles.
    ///
    /// Assumes the spec already passed structural validation (unique ids,
    /// known dependency ids); an unknown id here is still reported rather
    /// than panicking.
    pub fn build(spec: &WorkflowSpec) -> Result<Self, WorkflowError> {
        let ids: Vec<String> = spec.tasks.iter().map(|t| t.id.clone()).collect();
        let index: HashMap<String, usize> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();

        let mut dependents = vec![Vec::new(); ids.len()];
        let mut dependencies = vec![Vec::new(); ids.len()];

        for (i, task) in spec.tasks.iter().enumerate() {
            for dep in &task.depends_on {
                let Some(&d) = index.get(dep.as_str()) else {
                    return Err(WorkflowError::UnknownDependency {
                        task_id: task.id.clone(),
                        dependency: dep.clone(),
                    });
                };
                dependents[d].push(i);
                dependencies[i].push(d);
            }
        }

        let graph = Self {
            ids,
            index,
            dependents,
            dependencies,
        };
        graph.reject_cycles()?;
        Ok(graph)
    }

    /// Kahn's algorithm. If any node never reaches indegree zero, the graph
    /// has a cycle; the error names a task that is actually on one.
    fn reject_cycles(&self) -> Result<(), WorkflowError> {
        let mut indegree: Vec<usize> = self.dependencies.iter().map(Vec::len).collect();
        let mut queue: VecDeque<usize> = (0..self.ids.len()).filter(|&i| indegree[i] == 0).collect();
        let mut visited = 0usize;

        while let Some(node) = queue.pop_front() {
            visited += 1;
            for &dependent in &self.dependents[node] {
                indegree[dependent] -= 1;
                if indegree[dependent] == 0 {
                    queue.push_back(dependent);
                }
            }
        }

        if visited == self.ids.len() {
            return Ok(());
        }

        // Some survivor merely depends on the cycle; walk dependency edges
        // among survivors until a node repeats to name a true cycle member.
        let start = (0..self.ids.len())
            .find(|&i| indegree[i] > 0)
            .expect("unvisited node exists");
        let mut seen = vec![false; self.ids.len()];
        let mut node = start;
        loop {
            if seen[node] {
                return Err(WorkflowError::Cycle {
                    task_id: self.ids[node].clone(),
                });
            }
            seen[node] = true;
            node = *self.dependencies[node]
                .iter()
                .find(|&&d| indegree[d] > 0)
                .expect("cycle member has an unresolved dependency");
        }
    }

    /// Topological layers: tasks in one layer are mutually independent, and
    /// every dependency of a task sits in an earlier layer.
    pub fn layers(&self) -> Vec<Vec<&str>> {
        let mut indegree: Vec<usize> = self.dependencies.iter().map(Vec::len).collect();
        let mut current: Vec<usize> = (0..self.ids.len()).filter(|&i| indegree[i] == 0).collect();
        let mut layers = Vec::new();

        while !current.is_empty() {
            let mut next = Vec::new();
            for &node in &current {
                for &dependent in &self.dependents[node] {
                    indegree[dependent] -= 1;
                    if indegree[dependent] == 0 {
                        next.push(dependent);
                    }
                }
            }
            layers.push(current.iter().map(|&i| self.ids[i].as_str()).collect());
            current = next;
        }

        layers
    }

    /// Direct dependencies of a task.
    pub fn dependencies_of(&self, id: &str) -> Vec<&str> {
        self.index
            .get(id)
            .map(|&i| {
                self.dependencies[i]
                    .iter()
                    .map(|&d| self.ids[d].as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every task that transitively depends on `id`, in index order.
    pub fn transitive_dependents(&self, id: &str) -> Vec<&str> {
        let Some(&start) = self.index.get(id) else {
            return Vec::new();
        };

        let mut seen = vec![false; self.ids.len()];
        let mut queue = VecDeque::from([start]);
        while let Some(node) = queue.pop_front() {
            for &dependent in &self.dependents[node] {
                if !seen[dependent] {
                    seen[dependent] = true;
                    queue.push_back(dependent);
                }
            }
        }

        (0..self.ids.len())
            .filter(|&i| seen[i])
            .map(|i| self.ids[i].as_str())
            .collect()
    }

    pub fn task_count(&self) -> usize {
        self.ids.len()
    }
}
