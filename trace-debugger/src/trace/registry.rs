//! Run registry - one node per logical run, scoped to a single pass.

use std::collections::HashMap;

use shared_types::{Envelope, RunNode};

/// Arena of run nodes keyed by run id, in discovery order.
#[derive(Debug, Default)]
pub struct RunRegistry {
    nodes: Vec<RunNode>,
    index: HashMap<String, usize>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Node for the envelope's run, created on first sight.
    ///
    /// Metadata is merged first-wins: a field already set on the node is never
    /// replaced by a later envelope.
    pub fn get_or_create(&mut self, envelope: &Envelope) -> &mut RunNode {
        let key = envelope.run_key();
        let idx = match self.index.get(key) {
            Some(&idx) => {
                adopt_metadata(&mut self.nodes[idx], envelope);
                idx
            }
            None => {
                let idx = self.nodes.len();
                self.nodes.push(node_from_envelope(key, envelope));
                self.index.insert(key.to_string(), idx);
                idx
            }
        };

        let node = &mut self.nodes[idx];
        node.first_seq = min_seq(node.first_seq, envelope.seq);
        node
    }

    pub fn get(&self, run_id: &str) -> Option<&RunNode> {
        self.index.get(run_id).map(|&idx| &self.nodes[idx])
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Consume the registry, yielding nodes in discovery order.
    pub fn into_nodes(self) -> Vec<RunNode> {
        self.nodes
    }
}

fn node_from_envelope(key: &str, envelope: &Envelope) -> RunNode {
    RunNode {
        run_id: key.to_string(),
        parent_run_id: clean(envelope.parent_run_id.as_deref()),
        correlation_id: clean(envelope.correlation_id.as_deref()),
        causation_id: clean(envelope.causation_id.as_deref()),
        agent_level: clean(envelope.agent_level.as_deref()),
        ..RunNode::default()
    }
}

fn adopt_metadata(node: &mut RunNode, envelope: &Envelope) {
    adopt_first(&mut node.parent_run_id, envelope.parent_run_id.as_deref());
    adopt_first(&mut node.correlation_id, envelope.correlation_id.as_deref());
    adopt_first(&mut node.causation_id, envelope.causation_id.as_deref());
    adopt_first(&mut node.agent_level, envelope.agent_level.as_deref());
}

fn adopt_first(slot: &mut Option<String>, candidate: Option<&str>) {
    if slot.is_none() {
        *slot = clean(candidate);
    }
}

fn clean(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

fn min_seq(current: Option<i64>, seq: Option<i64>) -> Option<i64> {
    match (current, seq) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}
