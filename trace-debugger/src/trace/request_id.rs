//! Request identifier convention shared with the log store.
//!
//! Model clients name their requests `<logId>:llm-<suffix>`, and sub-agent
//! calls nest as `<parent>:sub:<child>:llm-<suffix>`. Everything before the
//! rightmost marker is the log identifier the store files the records under.

pub const LLM_REQUEST_MARKER: &str = ":llm-";

/// Log identifier encoded in a raw request id, if the id follows the convention.
pub fn derive_log_id(request_id: &str) -> Option<String> {
    let request_id = request_id.trim();
    let idx = request_id.rfind(LLM_REQUEST_MARKER)?;
    let log_id = &request_id[..idx];
    if log_id.is_empty() {
        None
    } else {
        Some(log_id.to_string())
    }
}

/// Portion of a raw request id after the rightmost marker.
pub fn request_suffix(request_id: &str) -> Option<&str> {
    let request_id = request_id.trim();
    let idx = request_id.rfind(LLM_REQUEST_MARKER)?;
    let suffix = &request_id[idx + LLM_REQUEST_MARKER.len()..];
    if suffix.is_empty() {
        None
    } else {
        Some(suffix)
    }
}
