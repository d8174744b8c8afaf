// src/dag/graph.rs

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap};

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use tracing::debug;

use crate::errors::{BuildError, Result};
use crate::step::{InputFilter, TransformStep};
use crate::types::{RelPath, StepName, SOURCE_INPUT};

/// Per-node data kept alongside the petgraph graph.
#[derive(Debug, Clone)]
struct StepNode {
    name: StepName,
    /// Direct dependencies (declaration order, deduplicated, no `source`).
    deps: Vec<NodeIndex>,
    /// Direct dependents (declaration order).
    dependents: Vec<NodeIndex>,
    reads_source: bool,
    filter: InputFilter,
}

/// The DAG of build steps.
///
/// Node indices equal declaration order. An edge `A -> B` means "B consumes
/// A's output". Built once per pipeline; the topological order is computed
/// at construction.
#[derive(Debug, Clone)]
pub struct StepGraph {
    graph: DiGraph<StepName, ()>,
    nodes: Vec<StepNode>,
    index: HashMap<StepName, NodeIndex>,
    order: Vec<StepName>,
    position: HashMap<StepName, usize>,
}

impl StepGraph {
    /// Validate the steps and build the graph.
    ///
    /// Fails with [`BuildError::Dependency`] on an empty or duplicate name,
    /// use of the reserved name `source`, an input that names no registered
    /// step, or a cycle (the error carries the full cycle path).
    pub fn build(steps: &[TransformStep]) -> Result<Self> {
        let mut graph = DiGraph::new();
        let mut nodes = Vec::with_capacity(steps.len());
        let mut index = HashMap::new();

        for step in steps {
            let name = step.name();
            if name.trim().is_empty() {
                return Err(BuildError::Dependency("step names must not be empty".to_string()));
            }
            if name == SOURCE_INPUT {
                return Err(BuildError::Dependency(format!(
                    "'{SOURCE_INPUT}' is reserved for the root source tree and cannot name a step"
                )));
            }
            if index.contains_key(name) {
                return Err(BuildError::Dependency(format!(
                    "step '{name}' is registered more than once"
                )));
            }
            let idx = graph.add_node(name.to_string());
            index.insert(name.to_string(), idx);
            nodes.push(StepNode {
                name: name.to_string(),
                deps: Vec::new(),
                dependents: Vec::new(),
                reads_source: step.reads_source(),
                filter: step.input_filter().clone(),
            });
        }

        for step in steps {
            let idx = index[step.name()];
            for input in step.declared_inputs() {
                if input == SOURCE_INPUT {
                    continue;
                }
                let dep = *index.get(input).ok_or_else(|| {
                    BuildError::Dependency(format!(
                        "step '{}' declares unknown input '{}'",
                        step.name(),
                        input
                    ))
                })?;
                if nodes[idx.index()].deps.contains(&dep) {
                    continue;
                }
                nodes[idx.index()].deps.push(dep);
                graph.add_edge(dep, idx, ());
            }
        }

        if let Err(cycle) = toposort(&graph, None) {
            let path = find_cycle(&graph, cycle.node_id())
                .map(|ids| {
                    ids.iter()
                        .map(|id| graph[*id].as_str())
                        .collect::<Vec<_>>()
                        .join(" -> ")
                })
                .unwrap_or_else(|| graph[cycle.node_id()].clone());
            return Err(BuildError::Dependency(format!("cycle detected: {path}")));
        }

        for i in 0..nodes.len() {
            for dep in nodes[i].deps.clone() {
                nodes[dep.index()].dependents.push(NodeIndex::new(i));
            }
        }

        let order = stable_topological_order(&nodes);
        let position = order
            .iter()
            .enumerate()
            .map(|(pos, name)| (name.clone(), pos))
            .collect();

        debug!(?order, "step graph built");

        Ok(Self {
            graph,
            nodes,
            index,
            order,
            position,
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Step names in declaration order.
    pub fn steps(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|n| n.name.as_str())
    }

    /// A linear execution order consistent with the DAG. Ties between
    /// independent steps are broken by declaration order.
    pub fn topological_order(&self) -> &[StepName] {
        &self.order
    }

    /// Position of `name` in [`topological_order`](Self::topological_order).
    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.position.get(name).copied()
    }

    /// Direct dependencies of a step (excluding `source`).
    pub fn dependencies_of(&self, name: &str) -> Vec<&str> {
        self.node(name)
            .map(|n| n.deps.iter().map(|d| self.graph[*d].as_str()).collect())
            .unwrap_or_default()
    }

    /// Direct dependents of a step.
    pub fn dependents_of(&self, name: &str) -> Vec<&str> {
        self.node(name)
            .map(|n| n.dependents.iter().map(|d| self.graph[*d].as_str()).collect())
            .unwrap_or_default()
    }

    /// Every step downstream of `name`, not including `name` itself.
    pub fn transitive_dependents(&self, name: &str) -> BTreeSet<StepName> {
        let mut out = BTreeSet::new();
        let Some(&start) = self.index.get(name) else {
            return out;
        };
        let mut stack: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(start, Direction::Outgoing)
            .collect();
        while let Some(idx) = stack.pop() {
            if out.insert(self.graph[idx].clone()) {
                stack.extend(self.graph.neighbors_directed(idx, Direction::Outgoing));
            }
        }
        out
    }

    /// Whether `name` consumes the root source tree.
    pub fn reads_source(&self, name: &str) -> bool {
        self.node(name).map(|n| n.reads_source).unwrap_or(false)
    }

    /// Steps with no dependents, in topological order.
    pub fn leaves(&self) -> Vec<&str> {
        self.order
            .iter()
            .filter(|name| self.node(name).is_some_and(|n| n.dependents.is_empty()))
            .map(|s| s.as_str())
            .collect()
    }

    /// Steps that must re-run after `changed` source paths.
    ///
    /// A step reading `source` is directly affected when any changed path
    /// passes its input filter (an unrestricted filter accepts every path).
    /// Every transitive dependent of an affected step is affected too.
    pub fn affected_by(&self, changed: &BTreeSet<RelPath>) -> BTreeSet<StepName> {
        let mut affected_idx = vec![false; self.nodes.len()];
        let mut affected = BTreeSet::new();

        if changed.is_empty() {
            return affected;
        }

        for name in &self.order {
            let idx = self.index[name].index();
            let node = &self.nodes[idx];

            let direct = node.reads_source && changed.iter().any(|p| node.filter.matches(p));
            let inherited = node.deps.iter().any(|d| affected_idx[d.index()]);

            if direct || inherited {
                affected_idx[idx] = true;
                affected.insert(name.clone());
            }
        }

        affected
    }

    fn node(&self, name: &str) -> Option<&StepNode> {
        self.index.get(name).map(|idx| &self.nodes[idx.index()])
    }
}

/// Kahn's algorithm with a min-heap over declaration index.
fn stable_topological_order(nodes: &[StepNode]) -> Vec<StepName> {
    let mut indegree: Vec<usize> = nodes.iter().map(|n| n.deps.len()).collect();
    let mut heap: BinaryHeap<Reverse<usize>> = indegree
        .iter()
        .enumerate()
        .filter(|(_, d)| **d == 0)
        .map(|(i, _)| Reverse(i))
        .collect();

    let mut order = Vec::with_capacity(nodes.len());
    while let Some(Reverse(i)) = heap.pop() {
        order.push(nodes[i].name.clone());
        for dependent in &nodes[i].dependents {
            let d = dependent.index();
            indegree[d] -= 1;
            if indegree[d] == 0 {
                heap.push(Reverse(d));
            }
        }
    }
    order
}

/// DFS back-edge search. Returns the cycle as a closed path
/// (`[a, b, c, a]`), starting the search at `hint` and falling back to every
/// other node.
fn find_cycle(graph: &DiGraph<StepName, ()>, hint: NodeIndex) -> Option<Vec<NodeIndex>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        White,
        Gray,
        Black,
    }

    fn visit(
        graph: &DiGraph<StepName, ()>,
        node: NodeIndex,
        marks: &mut [Mark],
        stack: &mut Vec<NodeIndex>,
    ) -> Option<Vec<NodeIndex>> {
        marks[node.index()] = Mark::Gray;
        stack.push(node);

        let mut next: Vec<NodeIndex> = graph.neighbors_directed(node, Direction::Outgoing).collect();
        next.sort();
        for succ in next {
            match marks[succ.index()] {
                Mark::Gray => {
                    let start = stack.iter().position(|n| *n == succ)?;
                    let mut cycle = stack[start..].to_vec();
                    cycle.push(succ);
                    return Some(cycle);
                }
                Mark::White => {
                    if let Some(cycle) = visit(graph, succ, marks, stack) {
                        return Some(cycle);
                    }
                }
                Mark::Black => {}
            }
        }

        stack.pop();
        marks[node.index()] = Mark::Black;
        None
    }

    let mut marks = vec![Mark::White; graph.node_count()];
    let mut stack = Vec::new();

    let starts = std::iter::once(hint).chain(graph.node_indices());
    for start in starts {
        if marks[start.index()] == Mark::White {
            if let Some(cycle) = visit(graph, start, &mut marks, &mut stack) {
                return Some(cycle);
            }
        }
    }
    None
}
