//! Request/response detail for model calls, resolved on demand.

pub mod cache;
pub mod matching;

pub use cache::{DetailCache, DetailCacheStats, EvictionPolicy, DEFAULT_MAX_ENTRIES};
pub use matching::{match_records, match_request_id, MatchTier, RecordMatch};
