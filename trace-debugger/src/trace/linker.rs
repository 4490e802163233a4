//! Tree linker - attaches runs to their parents and fixes render order.

use std::cmp::Ordering;
use std::collections::HashMap;

use shared_types::RunNode;

/// Ascending by sequence, with unsequenced items after all sequenced ones.
pub fn seq_order(a: Option<i64>, b: Option<i64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Link registry nodes (in discovery order) into a sorted forest.
///
/// A node is attached only to an existing, different run. Parent chains that
/// loop back on themselves are cut at the first-discovered member of the loop,
/// which becomes a root.
pub fn link_runs(nodes: Vec<RunNode>) -> Vec<RunNode> {
    let index: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(idx, node)| (node.run_id.as_str(), idx))
        .collect();

    let mut parent_of: Vec<Option<usize>> = nodes
        .iter()
        .enumerate()
        .map(|(idx, node)| {
            node.parent_run_id
                .as_deref()
                .and_then(|parent| index.get(parent).copied())
                .filter(|&parent| parent != idx)
        })
        .collect();
    drop(index);

    for idx in break_cycles(&mut parent_of) {
        tracing::debug!(
            run_id = %nodes[idx].run_id,
            "Parent chain loops back; keeping run as a root"
        );
    }

    let mut children_of: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    let mut roots = Vec::new();
    for (idx, parent) in parent_of.iter().enumerate() {
        match parent {
            Some(parent) => children_of[*parent].push(idx),
            None => roots.push(idx),
        }
    }

    let mut slots: Vec<Option<RunNode>> = nodes.into_iter().map(Some).collect();
    let mut forest: Vec<RunNode> = roots
        .into_iter()
        .filter_map(|idx| assemble(idx, &mut slots, &children_of))
        .collect();
    forest.sort_by(|a, b| seq_order(a.first_seq, b.first_seq));
    forest
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnPath,
    Done,
}

/// Detach the lowest-index member of every parent loop. Each node is walked
/// once. Returns the detached nodes.
fn break_cycles(parent_of: &mut [Option<usize>]) -> Vec<usize> {
    let mut marks = vec![Mark::Unvisited; parent_of.len()];
    let mut path = Vec::new();
    let mut cut = Vec::new();

    for start in 0..parent_of.len() {
        let mut current = Some(start);
        while let Some(idx) = current {
            match marks[idx] {
                Mark::Done => break,
                Mark::OnPath => {
                    let loop_start = path.iter().position(|&p| p == idx).unwrap_or(0);
                    if let Some(&member) = path[loop_start..].iter().min() {
                        parent_of[member] = None;
                        cut.push(member);
                    }
                    break;
                }
                Mark::Unvisited => {
                    marks[idx] = Mark::OnPath;
                    path.push(idx);
                    current = parent_of[idx];
                }
            }
        }
        for idx in path.drain(..) {
            marks[idx] = Mark::Done;
        }
    }

    cut.sort_unstable();
    cut
}

/// Recursion depth follows run nesting depth, which stays shallow for
/// delegated sub-agents.
fn assemble(
    idx: usize,
    slots: &mut [Option<RunNode>],
    children_of: &[Vec<usize>],
) -> Option<RunNode> {
    let mut node = slots[idx].take()?;
    node.children = children_of[idx]
        .iter()
        .filter_map(|&child| assemble(child, slots, children_of))
        .collect();
    node.children
        .sort_by(|a, b| seq_order(a.first_seq, b.first_seq));
    node.tools.sort_by(|a, b| seq_order(a.seq, b.seq));
    node.llm_calls.sort_by(|a, b| seq_order(a.seq, b.seq));
    Some(node)
}
