//! Detail cache keyed by log identifier, with an explicit eviction policy.
//!
//! Transitions are monotonic: an entry starts `Pending` and settles once into
//! `Resolved` or `Failed`. Only settled entries are ever evicted; a pending
//! entry always stays until its lookup reports back.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use shared_types::{DetailBundle, DetailState};

pub const DEFAULT_MAX_ENTRIES: usize = 256;

/// Bounds on the settled entries kept in the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictionPolicy {
    /// Least-recently-used settled entries beyond this count are dropped.
    pub max_entries: Option<usize>,
    /// Settled entries older than this are dropped on access.
    pub ttl: Option<Duration>,
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        Self {
            max_entries: Some(DEFAULT_MAX_ENTRIES),
            ttl: None,
        }
    }
}

impl EvictionPolicy {
    pub fn unbounded() -> Self {
        Self {
            max_entries: None,
            ttl: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailCacheStats {
    pub pending: usize,
    pub resolved: usize,
    pub failed: usize,
    pub lookups_issued: u64,
    pub evicted: u64,
}

#[derive(Debug)]
struct CacheEntry {
    state: DetailState,
    settled_at: Option<Instant>,
    last_access: u64,
}

#[derive(Debug)]
pub struct DetailCache {
    entries: HashMap<String, CacheEntry>,
    policy: EvictionPolicy,
    clock: u64,
    lookups_issued: u64,
    evicted: u64,
}

impl DetailCache {
    pub fn new(policy: EvictionPolicy) -> Self {
        Self {
            entries: HashMap::new(),
            policy,
            clock: 0,
            lookups_issued: 0,
            evicted: 0,
        }
    }

    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }

    /// Mark `log_id` pending if unknown. Returns true when the caller must
    /// issue the lookup; false when the key is already pending or settled.
    pub fn begin(&mut self, log_id: &str, now: Instant) -> bool {
        self.expire(log_id, now);
        if let Some(entry) = self.entries.get_mut(log_id) {
            self.clock += 1;
            entry.last_access = self.clock;
            return false;
        }

        self.clock += 1;
        self.entries.insert(
            log_id.to_string(),
            CacheEntry {
                state: DetailState::Pending,
                settled_at: None,
                last_access: self.clock,
            },
        );
        self.lookups_issued += 1;
        true
    }

    /// Settle a pending entry. Settling an unknown or already settled key is
    /// ignored and returns `None`.
    pub fn settle(
        &mut self,
        log_id: &str,
        result: Result<DetailBundle, String>,
        now: Instant,
    ) -> Option<DetailState> {
        let entry = self.entries.get_mut(log_id)?;
        if !entry.state.is_pending() {
            return None;
        }

        entry.state = match result {
            Ok(bundle) => DetailState::Resolved { bundle },
            Err(error) => DetailState::Failed { error },
        };
        entry.settled_at = Some(now);
        self.clock += 1;
        entry.last_access = self.clock;
        let state = entry.state.clone();
        self.enforce_capacity();
        Some(state)
    }

    /// Current state for `log_id`, refreshing its recency.
    pub fn get(&mut self, log_id: &str, now: Instant) -> Option<DetailState> {
        self.expire(log_id, now);
        let entry = self.entries.get_mut(log_id)?;
        self.clock += 1;
        entry.last_access = self.clock;
        Some(entry.state.clone())
    }

    /// Current state for `log_id` without touching recency or expiry.
    pub fn peek(&self, log_id: &str) -> Option<&DetailState> {
        self.entries.get(log_id).map(|entry| &entry.state)
    }

    /// Drop a settled entry. Pending entries are kept.
    pub fn evict(&mut self, log_id: &str) -> bool {
        match self.entries.get(log_id) {
            Some(entry) if !entry.state.is_pending() => {
                self.entries.remove(log_id);
                self.evicted += 1;
                true
            }
            _ => false,
        }
    }

    /// Drop every settled entry whose TTL has elapsed.
    pub fn purge_expired(&mut self, now: Instant) -> usize {
        let Some(ttl) = self.policy.ttl else {
            return 0;
        };
        let before = self.entries.len();
        self.entries.retain(|_, entry| !is_expired(entry, ttl, now));
        let removed = before - self.entries.len();
        self.evicted += removed as u64;
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> DetailCacheStats {
        let mut stats = DetailCacheStats {
            lookups_issued: self.lookups_issued,
            evicted: self.evicted,
            ..DetailCacheStats::default()
        };
        for entry in self.entries.values() {
            match entry.state {
                DetailState::Pending => stats.pending += 1,
                DetailState::Resolved { .. } => stats.resolved += 1,
                DetailState::Failed { .. } => stats.failed += 1,
            }
        }
        stats
    }

    fn expire(&mut self, log_id: &str, now: Instant) {
        let Some(ttl) = self.policy.ttl else {
            return;
        };
        let expired = self
            .entries
            .get(log_id)
            .is_some_and(|entry| is_expired(entry, ttl, now));
        if expired {
            self.entries.remove(log_id);
            self.evicted += 1;
        }
    }

    fn enforce_capacity(&mut self) {
        let Some(max_entries) = self.policy.max_entries else {
            return;
        };
        let settled = self
            .entries
            .values()
            .filter(|entry| !entry.state.is_pending())
            .count();
        if settled <= max_entries {
            return;
        }

        let mut candidates: Vec<(u64, String)> = self
            .entries
            .iter()
            .filter(|(_, entry)| !entry.state.is_pending())
            .map(|(key, entry)| (entry.last_access, key.clone()))
            .collect();
        candidates.sort();

        for (_, key) in candidates.into_iter().take(settled - max_entries) {
            tracing::debug!(log_id = %key, "Evicting least recently used detail entry");
            self.entries.remove(&key);
            self.evicted += 1;
        }
    }
}

fn is_expired(entry: &CacheEntry, ttl: Duration, now: Instant) -> bool {
    entry
        .settled_at
        .is_some_and(|settled_at| now.saturating_duration_since(settled_at) >= ttl)
}
