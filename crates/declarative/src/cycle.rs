//! Cycle and validity checker
//!
//! Depth-first search with three-colour marking. The post-order of the
//! search is a topological order (dependencies first); visiting roots and
//! neighbours in index order keeps it deterministic across runs.

use crate::error::{Error, Result};
use crate::graph::ResourceGraph;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Check the graph for cycles and return a topological order of node indices
pub fn check(graph: &ResourceGraph) -> Result<Vec<usize>> {
    topological_order(graph.edges()).map_err(|cycle| Error::CyclicDependency {
        path: cycle
            .into_iter()
            .map(|i| graph.node(i).id.clone())
            .collect(),
    })
}

/// Topological order over adjacency lists, dependencies first.
///
/// On failure returns the cycle as node indices, starting and ending at the
/// same node.
pub fn topological_order(edges: &[Vec<usize>]) -> std::result::Result<Vec<usize>, Vec<usize>> {
    let mut marks = vec![Mark::Unvisited; edges.len()];
    let mut stack = Vec::new();
    let mut order = Vec::with_capacity(edges.len());

    for node in 0..edges.len() {
        visit(node, edges, &mut marks, &mut stack, &mut order)?;
    }

    Ok(order)
}

fn visit(
    node: usize,
    edges: &[Vec<usize>],
    marks: &mut [Mark],
    stack: &mut Vec<usize>,
    order: &mut Vec<usize>,
) -> std::result::Result<(), Vec<usize>> {
    match marks[node] {
        Mark::Done => return Ok(()),
        Mark::InProgress => {
            let start = stack.iter().position(|&n| n == node).unwrap_or(0);
            let mut cycle = stack[start..].to_vec();
            cycle.push(node);
            return Err(cycle);
        }
        Mark::Unvisited => {}
    }

    marks[node] = Mark::InProgress;
    stack.push(node);
    for &dep in &edges[node] {
        visit(dep, edges, marks, stack, order)?;
    }
    stack.pop();
    marks[node] = Mark::Done;
    order.push(node);
    Ok(())
}
