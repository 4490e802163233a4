//! DetailResolverActor - on-demand request/response detail with single-flight caching
//!
//! The debugger asks for detail when a model-call entry is expanded. Lookups
//! against the log store are slow and may be requested by several views at
//! once, so the actor keeps one cache entry per log id:
//!
//! - the first `Request` for a key marks it pending and spawns one lookup
//! - later requests for the same key are no-ops
//! - the lookup reports back with `Settled`, moving the entry to resolved or
//!   failed exactly once
//! - `AwaitSettled` callers are parked until the entry settles
//!
//! Failed lookups are not retried; a key is only fetched again after it is
//! evicted, explicitly or by the cache's [`EvictionPolicy`].
//!
//! # Example
//!
//! ```rust,ignore
//! use ractor::Actor;
//!
//! let (resolver, _handle) = Actor::spawn(
//!     None,
//!     DetailResolverActor,
//!     DetailResolverArguments::new(Arc::new(store)),
//! ).await?;
//!
//! request_detail(&resolver, "log-42").await?;
//! let state = await_detail(&resolver, "log-42").await?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use shared_types::{DetailBundle, DetailState};

use crate::detail::{DetailCache, DetailCacheStats, EvictionPolicy};
use crate::log_store::DetailSource;

/// Actor that owns the detail cache
#[derive(Debug, Default)]
pub struct DetailResolverActor;

/// Arguments for spawning DetailResolverActor
#[derive(Clone)]
pub struct DetailResolverArguments {
    pub source: Arc<dyn DetailSource>,
    pub policy: EvictionPolicy,
}

impl DetailResolverArguments {
    pub fn new(source: Arc<dyn DetailSource>) -> Self {
        Self {
            source,
            policy: EvictionPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: EvictionPolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// State for DetailResolverActor
pub struct DetailResolverState {
    source: Arc<dyn DetailSource>,
    cache: DetailCache,
    waiters: HashMap<String, Vec<RpcReplyPort<Option<DetailState>>>>,
}

// ============================================================================
// Messages
// ============================================================================

/// Messages handled by DetailResolverActor
#[derive(Debug)]
pub enum DetailResolverMsg {
    /// Start a lookup unless the key is already cached. Replies true when
    /// this request issued the lookup.
    Request {
        log_id: String,
        reply: RpcReplyPort<bool>,
    },
    /// Current cache state for a key
    Get {
        log_id: String,
        reply: RpcReplyPort<Option<DetailState>>,
    },
    /// Reply once the key is no longer pending
    AwaitSettled {
        log_id: String,
        reply: RpcReplyPort<Option<DetailState>>,
    },
    /// Drop a settled entry so it can be fetched again
    Evict {
        log_id: String,
        reply: RpcReplyPort<bool>,
    },
    /// Cache counters
    Stats {
        reply: RpcReplyPort<DetailCacheStats>,
    },
    /// Lookup finished (sent by the spawned lookup task)
    Settled {
        log_id: String,
        result: Result<DetailBundle, String>,
    },
}

impl DetailResolverActor {
    fn handle_request(
        &self,
        myself: &ActorRef<DetailResolverMsg>,
        log_id: String,
        state: &mut DetailResolverState,
    ) -> bool {
        let log_id = log_id.trim().to_string();
        if log_id.is_empty() {
            return false;
        }
        if !state.cache.begin(&log_id, Instant::now()) {
            return false;
        }

        tracing::debug!(log_id = %log_id, "Issuing detail lookup");
        let source = state.source.clone();
        let myself = myself.clone();
        tokio::spawn(async move {
            let result = source
                .fetch_detail(&log_id)
                .await
                .map_err(|e| e.to_string());
            let key = log_id.clone();
            if myself
                .send_message(DetailResolverMsg::Settled { log_id, result })
                .is_err()
            {
                tracing::warn!(log_id = %key, "Detail resolver stopped before lookup settled");
            }
        });
        true
    }

    fn handle_settled(
        &self,
        log_id: String,
        result: Result<DetailBundle, String>,
        state: &mut DetailResolverState,
    ) {
        let now = Instant::now();
        match &result {
            Ok(bundle) => tracing::debug!(
                log_id = %log_id,
                records = bundle.requests.len(),
                "Detail lookup resolved"
            ),
            Err(error) => tracing::warn!(
                log_id = %log_id,
                error = %error,
                "Detail lookup failed"
            ),
        }

        let settled = state
            .cache
            .settle(&log_id, result, now)
            .or_else(|| state.cache.peek(&log_id).cloned());

        if let Some(waiters) = state.waiters.remove(&log_id) {
            for waiter in waiters {
                let _ = waiter.send(settled.clone());
            }
        }
    }

    fn handle_await(
        &self,
        log_id: String,
        reply: RpcReplyPort<Option<DetailState>>,
        state: &mut DetailResolverState,
    ) {
        let log_id = log_id.trim().to_string();
        match state.cache.get(&log_id, Instant::now()) {
            Some(DetailState::Pending) => {
                state.waiters.entry(log_id).or_default().push(reply);
            }
            other => {
                let _ = reply.send(other);
            }
        }
    }
}

#[async_trait]
impl Actor for DetailResolverActor {
    type Msg = DetailResolverMsg;
    type State = DetailResolverState;
    type Arguments = DetailResolverArguments;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!(
            actor_id = %myself.get_id(),
            max_entries = ?args.policy.max_entries,
            ttl_secs = ?args.policy.ttl.map(|ttl| ttl.as_secs()),
            "DetailResolverActor starting"
        );

        Ok(DetailResolverState {
            source: args.source,
            cache: DetailCache::new(args.policy),
            waiters: HashMap::new(),
        })
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            DetailResolverMsg::Request { log_id, reply } => {
                let issued = self.handle_request(&myself, log_id, state);
                let _ = reply.send(issued);
            }
            DetailResolverMsg::Get { log_id, reply } => {
                let current = state.cache.get(log_id.trim(), Instant::now());
                let _ = reply.send(current);
            }
            DetailResolverMsg::AwaitSettled { log_id, reply } => {
                self.handle_await(log_id, reply, state);
            }
            DetailResolverMsg::Evict { log_id, reply } => {
                let evicted = state.cache.evict(log_id.trim());
                let _ = reply.send(evicted);
            }
            DetailResolverMsg::Stats { reply } => {
                state.cache.purge_expired(Instant::now());
                let _ = reply.send(state.cache.stats());
            }
            DetailResolverMsg::Settled { log_id, result } => {
                self.handle_settled(log_id, result, state);
            }
        }
        Ok(())
    }

    async fn post_stop(
        &self,
        myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        tracing::info!(
            actor_id = %myself.get_id(),
            cached = state.cache.len(),
            "DetailResolverActor stopped"
        );
        Ok(())
    }
}

// ============================================================================
// Convenience Functions
// ============================================================================

/// Convenience function to request detail for a log id
pub async fn request_detail(
    resolver: &ActorRef<DetailResolverMsg>,
    log_id: impl Into<String>,
) -> Result<bool, ractor::RactorErr<DetailResolverMsg>> {
    ractor::call!(resolver, |reply| DetailResolverMsg::Request {
        log_id: log_id.into(),
        reply,
    })
}

/// Convenience function to read the cached state for a log id
pub async fn get_detail(
    resolver: &ActorRef<DetailResolverMsg>,
    log_id: impl Into<String>,
) -> Result<Option<DetailState>, ractor::RactorErr<DetailResolverMsg>> {
    ractor::call!(resolver, |reply| DetailResolverMsg::Get {
        log_id: log_id.into(),
        reply,
    })
}

/// Convenience function to wait until a log id is resolved or failed
pub async fn await_detail(
    resolver: &ActorRef<DetailResolverMsg>,
    log_id: impl Into<String>,
) -> Result<Option<DetailState>, ractor::RactorErr<DetailResolverMsg>> {
    ractor::call!(resolver, |reply| DetailResolverMsg::AwaitSettled {
        log_id: log_id.into(),
        reply,
    })
}

/// Convenience function to request detail and wait for it to settle
pub async fn resolve_detail(
    resolver: &ActorRef<DetailResolverMsg>,
    log_id: impl Into<String>,
) -> Result<Option<DetailState>, ractor::RactorErr<DetailResolverMsg>> {
    let log_id = log_id.into();
    request_detail(resolver, log_id.clone()).await?;
    await_detail(resolver, log_id).await
}

/// Convenience function to evict a settled entry
pub async fn evict_detail(
    resolver: &ActorRef<DetailResolverMsg>,
    log_id: impl Into<String>,
) -> Result<bool, ractor::RactorErr<DetailResolverMsg>> {
    ractor::call!(resolver, |reply| DetailResolverMsg::Evict {
        log_id: log_id.into(),
        reply,
    })
}

/// Convenience function to read cache counters
pub async fn detail_stats(
    resolver: &ActorRef<DetailResolverMsg>,
) -> Result<DetailCacheStats, ractor::RactorErr<DetailResolverMsg>> {
    ractor::call!(resolver, |reply| DetailResolverMsg::Stats { reply })
}

// ============================================================================
// Tests
// ============================================================================
