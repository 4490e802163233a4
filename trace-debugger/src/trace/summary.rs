//! Aggregate rollups collected while classifying.

use shared_types::TraceSummary;

/// Running counters for one pass. Counts are taken before pruning.
#[derive(Debug, Default, Clone)]
pub struct SummaryBuilder {
    stage_count: u32,
    tool_count: u32,
    llm_count: u32,
    total_duration_ms: Option<f64>,
}

impl SummaryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_stage(&mut self) {
        self.stage_count = self.stage_count.saturating_add(1);
    }

    pub fn record_tool(&mut self) {
        self.tool_count = self.tool_count.saturating_add(1);
    }

    pub fn record_llm_call(&mut self) {
        self.llm_count = self.llm_count.saturating_add(1);
    }

    /// Process-wide total: set by the first final result in the pass, whichever
    /// run it belongs to.
    pub fn offer_total_duration(&mut self, duration_ms: f64) -> bool {
        if self.total_duration_ms.is_some() {
            return false;
        }
        self.total_duration_ms = Some(duration_ms);
        true
    }

    pub fn finish(self) -> TraceSummary {
        TraceSummary {
            stage_count: self.stage_count,
            tool_count: self.tool_count,
            llm_count: self.llm_count,
            total_duration_ms: self.total_duration_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_accumulate() {
        let mut summary = SummaryBuilder::new();
        summary.record_stage();
        summary.record_tool();
        summary.record_tool();
        summary.record_llm_call();

        let summary = summary.finish();
        assert_eq!(summary.stage_count, 1);
        assert_eq!(summary.tool_count, 2);
        assert_eq!(summary.llm_count, 1);
        assert_eq!(summary.total_duration_ms, None);
    }

    #[test]
    fn test_total_duration_is_first_wins() {
        let mut summary = SummaryBuilder::new();
        assert!(summary.offer_total_duration(500.0));
        assert!(!summary.offer_total_duration(900.0));
        assert_eq!(summary.finish().total_duration_ms, Some(500.0));
    }
}
