//! Structural pruning of runs that carry no timing data.

use shared_types::RunNode;

/// True if the run, or any descendant, carries a timing entry or a total.
pub fn has_content(node: &RunNode) -> bool {
    carries_timing(node) || node.children.iter().any(has_content)
}

/// Copy of `node` with empty branches removed below it.
pub fn prune(node: &RunNode) -> RunNode {
    RunNode {
        children: prune_roots(&node.children),
        ..shallow_copy(node)
    }
}

/// Keep the runs that have content, each pruned. Every node is visited once:
/// a run survives if it carries timing itself or any pruned child survived.
///
/// Recursion depth follows run nesting depth.
pub fn prune_roots(roots: &[RunNode]) -> Vec<RunNode> {
    roots.iter().filter_map(prune_branch).collect()
}

fn prune_branch(node: &RunNode) -> Option<RunNode> {
    let children = prune_roots(&node.children);
    if children.is_empty() && !carries_timing(node) {
        return None;
    }
    Some(RunNode {
        children,
        ..shallow_copy(node)
    })
}

fn carries_timing(node: &RunNode) -> bool {
    node.has_timings() || node.total_duration_ms.is_some()
}

fn shallow_copy(node: &RunNode) -> RunNode {
    RunNode {
        run_id: node.run_id.clone(),
        parent_run_id: node.parent_run_id.clone(),
        correlation_id: node.correlation_id.clone(),
        causation_id: node.causation_id.clone(),
        agent_level: node.agent_level.clone(),
        children: Vec::new(),
        stages: node.stages.clone(),
        tools: node.tools.clone(),
        llm_calls: node.llm_calls.clone(),
        total_duration_ms: node.total_duration_ms,
        first_seq: node.first_seq,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::StageTiming;

    fn stage() -> StageTiming {
        StageTiming {
            id: "s".to_string(),
            label: "stage".to_string(),
            duration_ms: 5.0,
            hint: None,
        }
    }

    #[test]
    fn test_lifecycle_only_run_is_removed() {
        let empty = RunNode::new("empty");
        let mut timed = RunNode::new("timed");
        timed.stages.push(stage());

        let pruned = prune_roots(&[empty, timed]);
        assert_eq!(pruned.len(), 1);
        assert_eq!(pruned[0].run_id, "timed");
    }

    #[test]
    fn test_total_duration_counts_as_content() {
        let mut node = RunNode::new("final-only");
        node.total_duration_ms = Some(10.0);
        assert!(has_content(&node));
    }

    #[test]
    fn test_empty_parent_kept_for_informative_descendant() {
        let mut grandchild = RunNode::new("grandchild");
        grandchild.stages.push(stage());
        let mut child = RunNode::new("child");
        child.children.push(grandchild);
        child.children.push(RunNode::new("noise"));
        let mut root = RunNode::new("root");
        root.children.push(child);
        root.children.push(RunNode::new("empty-sibling"));

        let pruned = prune_roots(&[root]);
        assert_eq!(pruned.len(), 1);
        let root = &pruned[0];
        assert_eq!(root.children.len(), 1);
        assert_eq!(root.children[0].run_id, "child");
        assert_eq!(root.children[0].children.len(), 1);
        assert_eq!(root.children[0].children[0].run_id, "grandchild");
    }

    #[test]
    fn test_prune_roots_agrees_with_has_content() {
        let mut leaf = RunNode::new("leaf");
        leaf.total_duration_ms = Some(1.0);
        let mut mid = RunNode::new("mid");
        mid.children.push(leaf);
        mid.children.push(RunNode::new("mid-noise"));
        let mut top = RunNode::new("top");
        top.children.push(mid);
        let mut bare = RunNode::new("bare");
        bare.children.push(RunNode::new("bare-child"));

        let roots = vec![top, bare];
        let kept: Vec<&str> = roots
            .iter()
            .filter(|r| has_content(r))
            .map(|r| r.run_id.as_str())
            .collect();
        let pruned = prune_roots(&roots);
        let pruned_ids: Vec<&str> = pruned.iter().map(|r| r.run_id.as_str()).collect();
        assert_eq!(pruned_ids, kept);
        assert_eq!(pruned[0].children[0].children.len(), 1);
    }

    #[test]
    fn test_prune_keeps_node_fields() {
        let mut node = RunNode::new("run");
        node.agent_level = Some("core".to_string());
        node.first_seq = Some(3);
        node.stages.push(stage());

        let pruned = prune(&node);
        assert_eq!(pruned, node);
    }
}
