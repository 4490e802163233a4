//! Execution trace reconstruction
//!
//! Rebuilds a per-run span tree from the flat, arrival-ordered envelope buffer
//! of an agent execution. Every call is a pure fold over the whole buffer:
//!
//! 1. registry - one node per run id, metadata merged first-wins
//! 2. classify - each envelope adds at most one timing entry to its run
//! 3. linker   - runs attached to parents, children/tools/llm calls sorted by seq
//! 4. prune    - branches without timing data dropped
//!
//! Nothing survives between calls; re-running on the same buffer yields an
//! identical snapshot.

pub mod classify;
pub mod linker;
pub mod prune;
pub mod registry;
pub mod request_id;
pub mod summary;

use shared_types::{Envelope, TraceSnapshot};

pub use classify::{classify, TimingEvent};
pub use linker::{link_runs, seq_order};
pub use prune::{has_content, prune, prune_roots};
pub use registry::RunRegistry;
pub use request_id::{derive_log_id, request_suffix, LLM_REQUEST_MARKER};
pub use summary::SummaryBuilder;

/// Reconstruct the execution trace for a buffered envelope history.
pub fn build_trace(envelopes: &[Envelope]) -> TraceSnapshot {
    let mut registry = RunRegistry::new();
    let mut summary = SummaryBuilder::new();

    for (index, envelope) in envelopes.iter().enumerate() {
        let node = registry.get_or_create(envelope);
        classify(envelope, index, node, &mut summary);
    }

    let run_count = registry.len();
    let forest = link_runs(registry.into_nodes());
    let roots = prune_roots(&forest);

    tracing::debug!(
        envelopes = envelopes.len(),
        runs = run_count,
        linked_roots = forest.len(),
        roots = roots.len(),
        "Rebuilt execution trace"
    );

    TraceSnapshot {
        roots,
        summary: summary.finish(),
    }
}
