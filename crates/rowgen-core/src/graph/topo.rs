use petgraph::algo::toposort;
use petgraph::graph::DiGraph;

use crate::error::{Result, RowGenError};

/// Topologically order `count` generator slots given `(dependency,
/// dependent)` edges. Construction already rejects cycles; a cycle here
/// would mean the builder let one through, so it is still an error, not a
/// panic.
pub(crate) fn evaluation_order(count: usize, edges: &[(usize, usize)]) -> Result<Vec<usize>> {
    let mut graph = DiGraph::<usize, ()>::with_capacity(count, edges.len());
    let nodes: Vec<_> = (0..count).map(|slot| graph.add_node(slot)).collect();
    for &(dependency, dependent) in edges {
        graph.add_edge(nodes[dependency], nodes[dependent], ());
    }
    let sorted = toposort(&graph, None)
        .map_err(|_| RowGenError::config("", "the generator dependencies form a cycle"))?;
    Ok(sorted.into_iter().map(|node| graph[node]).collect())
}
