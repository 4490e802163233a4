//! Shared types between the trace engine and the debugger UI
//!
//! These types are used by both:
//! - the trace reconstruction engine (native Rust)
//! - the conversation debugger views (TypeScript, via ts-rs)
//!
//! Serializable with serde for JSON over WebSocket/HTTP

use serde::{Deserialize, Deserializer, Serialize};
use ts_rs::TS;

// ============================================================================
// Envelope
// ============================================================================

/// Run key used for envelopes that do not carry a run id.
pub const ROOT_RUN_KEY: &str = "__root__";

/// Envelope - one event record in an agent's execution stream
///
/// Envelopes are best-effort telemetry: every field except the event type is
/// optional and loosely typed on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Event type (e.g., "workflow.tool.completed")
    #[serde(alias = "event")]
    pub event_type: String,

    #[serde(default, deserialize_with = "lenient_string")]
    pub event_id: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub run_id: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub parent_run_id: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub correlation_id: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub causation_id: Option<String>,

    /// Per-stream ordering hint, not a correctness guarantee
    #[serde(default, deserialize_with = "lenient_seq")]
    pub seq: Option<i64>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub agent_level: Option<String>,

    /// Log identifier attached by the emitter, when known
    #[serde(default, deserialize_with = "lenient_string")]
    pub log_id: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub node_id: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub node_kind: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub timestamp: Option<String>,

    /// Event-specific payload
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Envelope {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            ..Self::default()
        }
    }

    /// Registry key for the run this envelope belongs to.
    pub fn run_key(&self) -> &str {
        self.run_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(ROOT_RUN_KEY)
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(text)) => Some(text),
        Some(serde_json::Value::Number(number)) => Some(number.to_string()),
        _ => None,
    })
}

fn lenient_seq<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(number)) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|v| v.is_finite() && v.fract() == 0.0)
                .map(|v| v as i64)
        }),
        Some(serde_json::Value::String(text)) => text.trim().parse::<i64>().ok(),
        _ => None,
    })
}

// ============================================================================
// Trace Tree
// ============================================================================

/// A measured workflow stage
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[ts(export, export_to = "../../bindings/trace.ts")]
pub struct StageTiming {
    pub id: String,
    pub label: String,
    pub duration_ms: f64,
    pub hint: Option<String>,
}

/// A measured tool invocation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[ts(export, export_to = "../../bindings/trace.ts")]
pub struct ToolTiming {
    pub id: String,
    pub label: String,
    pub duration_ms: f64,
    pub hint: Option<String>,
    pub call_id: Option<String>,
    #[ts(type = "number | null")]
    pub seq: Option<i64>,
}

/// A measured model call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[ts(export, export_to = "../../bindings/trace.ts")]
pub struct LlmCallTiming {
    pub id: String,
    pub label: String,
    pub duration_ms: f64,
    pub hint: Option<String>,
    /// Log identifier used to resolve request/response detail
    pub log_id: Option<String>,
    /// Raw request identifier as emitted by the model client
    pub request_id: Option<String>,
    pub model: Option<String>,
    #[ts(type = "number | null")]
    pub seq: Option<i64>,
}

/// One logical run (task or delegated sub-task) in the trace
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, TS)]
#[ts(export, export_to = "../../bindings/trace.ts")]
pub struct RunNode {
    pub run_id: String,
    pub parent_run_id: Option<String>,
    pub correlation_id: Option<String>,
    pub causation_id: Option<String>,
    pub agent_level: Option<String>,
    pub children: Vec<RunNode>,
    pub stages: Vec<StageTiming>,
    pub tools: Vec<ToolTiming>,
    pub llm_calls: Vec<LlmCallTiming>,
    pub total_duration_ms: Option<f64>,
    #[ts(type = "number | null")]
    pub first_seq: Option<i64>,
}

impl RunNode {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            ..Self::default()
        }
    }

    pub fn has_timings(&self) -> bool {
        !self.stages.is_empty() || !self.tools.is_empty() || !self.llm_calls.is_empty()
    }

    /// Depth-first search for a run by id.
    pub fn find(&self, run_id: &str) -> Option<&RunNode> {
        if self.run_id == run_id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(run_id))
    }

    fn count_runs(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(RunNode::count_runs)
            .sum::<usize>()
    }

    fn collect_llm_calls<'a>(&'a self, out: &mut Vec<&'a LlmCallTiming>) {
        out.extend(self.llm_calls.iter());
        for child in &self.children {
            child.collect_llm_calls(out);
        }
    }
}

/// Scalar rollups over everything classified in one pass
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, TS)]
#[ts(export, export_to = "../../bindings/trace.ts")]
pub struct TraceSummary {
    pub stage_count: u32,
    pub tool_count: u32,
    pub llm_count: u32,
    /// First final-result duration seen in the pass, across all runs
    pub total_duration_ms: Option<f64>,
}

/// Output of one reconstruction pass
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, TS)]
#[ts(export, export_to = "../../bindings/trace.ts")]
pub struct TraceSnapshot {
    pub roots: Vec<RunNode>,
    pub summary: TraceSummary,
}

impl TraceSnapshot {
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Number of runs that survived pruning, at any depth.
    pub fn run_count(&self) -> usize {
        self.roots.iter().map(RunNode::count_runs).sum()
    }

    pub fn find_run(&self, run_id: &str) -> Option<&RunNode> {
        self.roots.iter().find_map(|root| root.find(run_id))
    }

    /// All model calls in the tree, in render order.
    pub fn llm_calls(&self) -> Vec<&LlmCallTiming> {
        let mut out = Vec::new();
        for root in &self.roots {
            root.collect_llm_calls(&mut out);
        }
        out
    }
}

// ============================================================================
// Detail Records
// ============================================================================

/// One request or response record from the log store
///
/// Only the identifying fields are typed; everything else is passed through.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DetailRecord {
    #[serde(default)]
    pub request_id: Option<String>,
    /// "request" or "response"
    #[serde(default)]
    pub entry_type: Option<String>,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl DetailRecord {
    pub fn is_request(&self) -> bool {
        self.entry_type.as_deref() == Some(DETAIL_ENTRY_REQUEST)
    }

    pub fn is_response(&self) -> bool {
        self.entry_type.as_deref() == Some(DETAIL_ENTRY_RESPONSE)
    }
}

/// Detail records for one log identifier
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DetailBundle {
    pub log_id: String,
    #[serde(default, alias = "entries")]
    pub requests: Vec<DetailRecord>,
}

/// Cache state for one log identifier
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DetailState {
    Pending,
    Resolved { bundle: DetailBundle },
    Failed { error: String },
}

impl DetailState {
    pub fn is_pending(&self) -> bool {
        matches!(self, DetailState::Pending)
    }

    pub fn bundle(&self) -> Option<&DetailBundle> {
        match self {
            DetailState::Resolved { bundle } => Some(bundle),
            _ => None,
        }
    }
}

// ============================================================================
// Constants
// ============================================================================

pub const EVENT_WORKFLOW_PREFIX: &str = "workflow.";
pub const EVENT_LIFECYCLE_UPDATED: &str = "workflow.lifecycle.updated";
pub const EVENT_NODE_STARTED: &str = "workflow.node.started";
pub const EVENT_NODE_COMPLETED: &str = "workflow.node.completed";
pub const EVENT_NODE_FAILED: &str = "workflow.node.failed";
pub const EVENT_NODE_OUTPUT_SUMMARY: &str = "workflow.node.output.summary";
pub const EVENT_TOOL_STARTED: &str = "workflow.tool.started";
pub const EVENT_TOOL_PROGRESS: &str = "workflow.tool.progress";
pub const EVENT_TOOL_COMPLETED: &str = "workflow.tool.completed";
pub const EVENT_RESULT_FINAL: &str = "workflow.result.final";

pub const DETAIL_ENTRY_REQUEST: &str = "request";
pub const DETAIL_ENTRY_RESPONSE: &str = "response";

// ============================================================================
// Tests
// ============================================================================
