//! Matching log-store records to a single model call.
//!
//! Request ids are not formatted uniformly across call sites, so matching
//! falls back in three tiers: exact id, marker suffix, then the whole bundle
//! (the store already scopes a bundle to one log id).

use shared_types::{DetailBundle, DetailRecord, LlmCallTiming};

use crate::trace::request_id::request_suffix;

/// Which tier produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    Exact,
    Suffix,
    Bundle,
}

#[derive(Debug, Clone)]
pub struct RecordMatch<'a> {
    pub tier: MatchTier,
    pub records: Vec<&'a DetailRecord>,
}

impl<'a> RecordMatch<'a> {
    /// Requests and responses, each in bundle order.
    pub fn split_request_response(&self) -> (Vec<&'a DetailRecord>, Vec<&'a DetailRecord>) {
        let requests = self.records.iter().copied().filter(|r| r.is_request()).collect();
        let responses = self.records.iter().copied().filter(|r| r.is_response()).collect();
        (requests, responses)
    }
}

/// Records in `bundle` belonging to `call`.
pub fn match_records<'a>(bundle: &'a DetailBundle, call: &LlmCallTiming) -> RecordMatch<'a> {
    match_request_id(bundle, call.request_id.as_deref())
}

pub fn match_request_id<'a>(bundle: &'a DetailBundle, request_id: Option<&str>) -> RecordMatch<'a> {
    let request_id = request_id.map(str::trim).filter(|id| !id.is_empty());

    if let Some(request_id) = request_id {
        let exact: Vec<&DetailRecord> = bundle
            .requests
            .iter()
            .filter(|record| record_id(record) == Some(request_id))
            .collect();
        if !exact.is_empty() {
            return RecordMatch {
                tier: MatchTier::Exact,
                records: exact,
            };
        }

        if let Some(suffix) = request_suffix(request_id) {
            let by_suffix: Vec<&DetailRecord> = bundle
                .requests
                .iter()
                .filter(|record| {
                    record_id(record).is_some_and(|id| {
                        id == suffix || request_suffix(id) == Some(suffix)
                    })
                })
                .collect();
            if !by_suffix.is_empty() {
                return RecordMatch {
                    tier: MatchTier::Suffix,
                    records: by_suffix,
                };
            }
        }
    }

    RecordMatch {
        tier: MatchTier::Bundle,
        records: bundle.requests.iter().collect(),
    }
}

fn record_id(record: &DetailRecord) -> Option<&str> {
    record.request_id.as_deref().map(str::trim)
}
