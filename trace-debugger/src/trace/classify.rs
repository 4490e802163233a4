//! Timing classifier - turns one envelope into at most one timing entry.
//!
//! Envelopes are best-effort telemetry. Anything missing, mistyped, or
//! non-positive is treated as "no timing data" and skipped without error.

use serde_json::Value;
use shared_types::{Envelope, LlmCallTiming, RunNode, StageTiming, ToolTiming};

use super::request_id::derive_log_id;
use super::summary::SummaryBuilder;

/// Event kinds that carry timing data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimingEvent {
    StageCompleted,
    StageFailed,
    ModelCallSummary,
    ToolCompleted,
    ResultFinal,
}

impl TimingEvent {
    /// Matches both `workflow.`-prefixed and bare event types.
    pub fn from_event_type(event_type: &str) -> Option<Self> {
        let event_type = event_type.trim();
        let kind = event_type
            .strip_prefix(shared_types::EVENT_WORKFLOW_PREFIX)
            .unwrap_or(event_type);
        match kind {
            "node.completed" => Some(Self::StageCompleted),
            "node.failed" => Some(Self::StageFailed),
            "node.output.summary" => Some(Self::ModelCallSummary),
            "tool.completed" => Some(Self::ToolCompleted),
            "result.final" => Some(Self::ResultFinal),
            _ => None,
        }
    }
}

/// Classify `envelope` (at buffer position `index`) into `node`.
pub fn classify(envelope: &Envelope, index: usize, node: &mut RunNode, summary: &mut SummaryBuilder) {
    let Some(kind) = TimingEvent::from_event_type(&envelope.event_type) else {
        return;
    };
    let payload = &envelope.payload;

    match kind {
        TimingEvent::StageCompleted | TimingEvent::StageFailed => {
            let Some(duration_ms) = first_duration(payload, &["duration_ms", "duration"]) else {
                return;
            };
            node.stages.push(StageTiming {
                id: entry_id(envelope, index),
                label: stage_label(envelope),
                duration_ms,
                hint: stage_hint(payload, kind == TimingEvent::StageFailed),
            });
            summary.record_stage();
        }
        TimingEvent::ModelCallSummary => {
            let Some(duration_ms) = first_duration(payload, &["llm_duration_ms", "duration_ms"])
            else {
                return;
            };
            let model = first_str(payload, &["llm_model", "model"]);
            let request_id = first_str(payload, &["llm_request_id", "request_id"]);
            let log_id = non_blank(envelope.log_id.as_deref())
                .or_else(|| payload_str(payload, "log_id"))
                .or_else(|| request_id.as_deref().and_then(derive_log_id));
            let label = payload_int(payload, "iteration")
                .map(|iteration| format!("iteration {iteration}"))
                .unwrap_or_else(|| "llm".to_string());
            let hint = join_hint([model.clone(), request_id.clone()]);

            node.llm_calls.push(LlmCallTiming {
                id: entry_id(envelope, index),
                label,
                duration_ms,
                hint,
                log_id,
                request_id,
                model,
                seq: envelope.seq,
            });
            summary.record_llm_call();
        }
        TimingEvent::ToolCompleted => {
            let Some(duration_ms) = first_duration(payload, &["duration", "duration_ms"]) else {
                return;
            };
            let label = first_str(payload, &["tool_name", "name"]).unwrap_or_else(|| "tool".to_string());
            let call_id = payload_str(payload, "call_id").or_else(|| {
                if envelope.node_kind.as_deref() == Some("tool") {
                    non_blank(envelope.node_id.as_deref())
                } else {
                    None
                }
            });

            node.tools.push(ToolTiming {
                id: entry_id(envelope, index),
                label,
                duration_ms,
                hint: tool_hint(payload),
                call_id,
                seq: envelope.seq,
            });
            summary.record_tool();
        }
        TimingEvent::ResultFinal => {
            if let Some(duration_ms) = first_duration(payload, &["duration", "duration_ms"]) {
                apply_final_duration(node, summary, duration_ms);
            }
        }
    }
}

/// Final-result durations are first-wins, both per run and across the pass.
pub fn apply_final_duration(node: &mut RunNode, summary: &mut SummaryBuilder, duration_ms: f64) {
    if node.total_duration_ms.is_none() {
        node.total_duration_ms = Some(duration_ms);
    }
    summary.offer_total_duration(duration_ms);
}

/// Positive finite duration in milliseconds, or `None`.
pub fn positive_duration(value: Option<&Value>) -> Option<f64> {
    let number = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (number.is_finite() && number > 0.0).then_some(number)
}

fn first_duration(payload: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| positive_duration(payload.get(*key)))
}

fn entry_id(envelope: &Envelope, index: usize) -> String {
    non_blank(envelope.event_id.as_deref())
        .unwrap_or_else(|| format!("{}#{index}", envelope.event_type.trim()))
}

fn stage_label(envelope: &Envelope) -> String {
    let payload = &envelope.payload;
    payload_str(payload, "step_description")
        .or_else(|| payload_str(payload, "node_id"))
        .or_else(|| non_blank(envelope.node_id.as_deref()))
        .unwrap_or_else(|| "stage".to_string())
}

fn stage_hint(payload: &Value, failed: bool) -> Option<String> {
    if failed {
        return payload_str(payload, "error").or_else(|| Some("failed".to_string()));
    }
    payload_str(payload, "status").filter(|status| !status.eq_ignore_ascii_case("completed"))
}

fn tool_hint(payload: &Value) -> Option<String> {
    let metadata = payload.get("metadata")?;
    let llm_duration = positive_duration(metadata.get("llm_duration_ms"))
        .map(|ms| format!("llm {}ms", ms.round() as i64));
    let llm_request = payload_str(metadata, "llm_request_id").map(|id| format!("req {id}"));
    join_hint([llm_duration, llm_request])
}

fn join_hint<const N: usize>(parts: [Option<String>; N]) -> Option<String> {
    let parts: Vec<String> = parts.into_iter().flatten().collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" · "))
    }
}

fn payload_str(payload: &Value, key: &str) -> Option<String> {
    match payload.get(key)? {
        Value::String(text) => non_blank(Some(text)),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn first_str(payload: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| payload_str(payload, key))
}

fn payload_int(payload: &Value, key: &str) -> Option<i64> {
    match payload.get(key)? {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(event_type: &str, seq: Option<i64>, payload: Value) -> Envelope {
        Envelope {
            event_type: event_type.to_string(),
            run_id: Some("run-1".to_string()),
            seq,
            payload,
            ..Envelope::default()
        }
    }

    fn run(envelopes: &[Envelope]) -> (RunNode, shared_types::TraceSummary) {
        let mut node = RunNode::new("run-1");
        let mut summary = SummaryBuilder::new();
        for (idx, env) in envelopes.iter().enumerate() {
            classify(env, idx, &mut node, &mut summary);
        }
        (node, summary.finish())
    }

    #[test]
    fn test_event_type_matching() {
        assert_eq!(
            TimingEvent::from_event_type("workflow.tool.completed"),
            Some(TimingEvent::ToolCompleted)
        );
        assert_eq!(
            TimingEvent::from_event_type("tool.completed"),
            Some(TimingEvent::ToolCompleted)
        );
        assert_eq!(
            TimingEvent::from_event_type("workflow.node.failed"),
            Some(TimingEvent::StageFailed)
        );
        assert_eq!(TimingEvent::from_event_type("workflow.tool.started"), None);
        assert_eq!(TimingEvent::from_event_type("workflow.lifecycle.updated"), None);
    }

    #[test]
    fn test_positive_duration_is_defensive() {
        assert_eq!(positive_duration(Some(&json!(120))), Some(120.0));
        assert_eq!(positive_duration(Some(&json!(12.5))), Some(12.5));
        assert_eq!(positive_duration(Some(&json!("40"))), Some(40.0));
        assert_eq!(positive_duration(Some(&json!(0))), None);
        assert_eq!(positive_duration(Some(&json!(-5))), None);
        assert_eq!(positive_duration(Some(&json!("NaN"))), None);
        assert_eq!(positive_duration(Some(&json!("inf"))), None);
        assert_eq!(positive_duration(Some(&json!("fast"))), None);
        assert_eq!(positive_duration(Some(&json!(true))), None);
        assert_eq!(positive_duration(Some(&Value::Null)), None);
        assert_eq!(positive_duration(None), None);
    }

    #[test]
    fn test_stage_label_fallbacks() {
        let mut with_node = envelope("workflow.node.completed", None, json!({"duration_ms": 10}));
        with_node.node_id = Some("plan".to_string());

        let (node, summary) = run(&[
            envelope(
                "workflow.node.completed",
                None,
                json!({"duration_ms": 10, "step_description": "Gather sources"}),
            ),
            envelope(
                "workflow.node.completed",
                None,
                json!({"duration": 20, "node_id": "step-2"}),
            ),
            with_node,
            envelope("workflow.node.completed", None, json!({"duration": 5})),
        ]);

        let labels: Vec<&str> = node.stages.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["Gather sources", "step-2", "plan", "stage"]);
        assert_eq!(summary.stage_count, 4);
    }

    #[test]
    fn test_failed_stage_carries_error_hint() {
        let (node, _) = run(&[
            envelope(
                "workflow.node.failed",
                None,
                json!({"duration_ms": 30, "error": "tool timeout"}),
            ),
            envelope("workflow.node.failed", None, json!({"duration_ms": 30})),
        ]);
        assert_eq!(node.stages[0].hint.as_deref(), Some("tool timeout"));
        assert_eq!(node.stages[1].hint.as_deref(), Some("failed"));
    }

    #[test]
    fn test_stage_without_duration_is_dropped() {
        let (node, summary) = run(&[envelope(
            "workflow.node.completed",
            None,
            json!({"step_description": "noop", "status": "completed"}),
        )]);
        assert!(node.stages.is_empty());
        assert_eq!(summary.stage_count, 0);
    }

    #[test]
    fn test_model_call_summary_derives_log_id() {
        let (node, summary) = run(&[envelope(
            "workflow.node.output.summary",
            Some(4),
            json!({
                "iteration": 2,
                "llm_duration_ms": 850,
                "llm_model": "gpt-4o",
                "llm_request_id": "log-42:llm-abc"
            }),
        )]);

        let call = &node.llm_calls[0];
        assert_eq!(call.label, "iteration 2");
        assert_eq!(call.duration_ms, 850.0);
        assert_eq!(call.log_id.as_deref(), Some("log-42"));
        assert_eq!(call.request_id.as_deref(), Some("log-42:llm-abc"));
        assert_eq!(call.model.as_deref(), Some("gpt-4o"));
        assert_eq!(call.hint.as_deref(), Some("gpt-4o · log-42:llm-abc"));
        assert_eq!(call.seq, Some(4));
        assert_eq!(summary.llm_count, 1);
    }

    #[test]
    fn test_model_call_prefers_direct_log_id() {
        let mut env = envelope(
            "workflow.node.output.summary",
            None,
            json!({"llm_duration_ms": 10, "llm_request_id": "other:llm-1"}),
        );
        env.log_id = Some("log-direct".to_string());

        let (node, _) = run(&[env]);
        let call = &node.llm_calls[0];
        assert_eq!(call.log_id.as_deref(), Some("log-direct"));
        assert_eq!(call.label, "llm");
        assert_eq!(call.hint.as_deref(), Some("other:llm-1"));
    }

    #[test]
    fn test_model_call_without_marker_has_no_log_id() {
        let (node, _) = run(&[envelope(
            "workflow.node.output.summary",
            None,
            json!({"llm_duration_ms": 10, "llm_request_id": "req-99"}),
        )]);
        assert!(node.llm_calls[0].log_id.is_none());
    }

    #[test]
    fn test_tool_completed_entry() {
        let (node, summary) = run(&[envelope(
            "workflow.tool.completed",
            Some(3),
            json!({
                "call_id": "call-1",
                "tool_name": "subagent",
                "duration": 1200,
                "metadata": {"llm_duration_ms": 900, "llm_request_id": "log-7:llm-z"}
            }),
        )]);

        let tool = &node.tools[0];
        assert_eq!(tool.label, "subagent");
        assert_eq!(tool.call_id.as_deref(), Some("call-1"));
        assert_eq!(tool.hint.as_deref(), Some("llm 900ms · req log-7:llm-z"));
        assert_eq!(tool.seq, Some(3));
        assert_eq!(tool.id, "workflow.tool.completed#0");
        assert_eq!(summary.tool_count, 1);
    }

    #[test]
    fn test_tool_label_fallbacks() {
        let (node, _) = run(&[
            envelope("tool.completed", None, json!({"name": "bash", "duration": 1})),
            envelope("tool.completed", None, json!({"duration": 1})),
        ]);
        assert_eq!(node.tools[0].label, "bash");
        assert_eq!(node.tools[1].label, "tool");
        assert!(node.tools[1].hint.is_none());
    }

    #[test]
    fn test_negative_tool_duration_is_dropped() {
        let (node, summary) = run(&[envelope(
            "workflow.tool.completed",
            Some(1),
            json!({"tool_name": "search", "duration": -5}),
        )]);
        assert!(node.tools.is_empty());
        assert_eq!(summary.tool_count, 0);
    }

    #[test]
    fn test_entry_id_prefers_event_id() {
        let mut env = envelope("workflow.tool.completed", None, json!({"duration": 3}));
        env.event_id = Some("evt-1".to_string());
        let (node, _) = run(&[env]);
        assert_eq!(node.tools[0].id, "evt-1");
    }

    #[test]
    fn test_final_duration_is_first_wins_per_node() {
        let (node, summary) = run(&[
            envelope("workflow.result.final", None, json!({"duration": 0})),
            envelope("workflow.result.final", None, json!({"duration": 500})),
            envelope("workflow.result.final", None, json!({"duration": 700})),
        ]);
        assert_eq!(node.total_duration_ms, Some(500.0));
        assert_eq!(summary.total_duration_ms, Some(500.0));
    }

    #[test]
    fn test_process_total_is_independent_of_node() {
        let mut summary = SummaryBuilder::new();
        let mut first = RunNode::new("a");
        let mut second = RunNode::new("b");
        apply_final_duration(&mut first, &mut summary, 300.0);
        apply_final_duration(&mut second, &mut summary, 900.0);

        assert_eq!(first.total_duration_ms, Some(300.0));
        assert_eq!(second.total_duration_ms, Some(900.0));
        assert_eq!(summary.finish().total_duration_ms, Some(300.0));
    }

    #[test]
    fn test_other_events_are_ignored() {
        let (node, summary) = run(&[
            envelope("workflow.lifecycle.updated", None, json!({"duration": 10})),
            envelope("workflow.tool.started", None, json!({"duration": 10})),
        ]);
        assert!(!node.has_timings());
        assert_eq!(summary, shared_types::TraceSummary::default());
    }
}
