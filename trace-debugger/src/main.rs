use std::collections::BTreeSet;
use std::sync::Arc;

use ractor::Actor;
use shared_types::{DetailState, TraceSnapshot};
use trace_debugger::actors::detail_resolver::{
    await_detail, detail_stats, request_detail, DetailResolverActor, DetailResolverArguments,
};
use trace_debugger::config::Config;
use trace_debugger::detail::match_records;
use trace_debugger::log_store::{HttpLogStore, LogStoreError};
use trace_debugger::{build_trace, replay};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout carries only the snapshot.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env()?;
    let path = std::env::args()
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("usage: trace-debugger <buffer-file>"))?;

    let loaded = replay::load_envelopes(&path)?;
    let snapshot = build_trace(&loaded.envelopes);
    tracing::info!(
        runs = snapshot.run_count(),
        stages = snapshot.summary.stage_count,
        tools = snapshot.summary.tool_count,
        llm_calls = snapshot.summary.llm_count,
        total_duration_ms = ?snapshot.summary.total_duration_ms,
        "Trace rebuilt"
    );

    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    if config.resolve_details {
        resolve_details(&config, &snapshot).await?;
    }

    Ok(())
}

async fn resolve_details(config: &Config, snapshot: &TraceSnapshot) -> anyhow::Result<()> {
    let base_url = config
        .log_store_url
        .clone()
        .ok_or(LogStoreError::NotConfigured)?;
    let store = HttpLogStore::new(base_url, config.log_store_timeout)?;

    let (resolver, handle) = Actor::spawn(
        None,
        DetailResolverActor,
        DetailResolverArguments::new(Arc::new(store)).with_policy(config.eviction_policy()),
    )
    .await
    .map_err(|e| anyhow::anyhow!("Failed to spawn detail resolver: {e}"))?;

    let calls = snapshot.llm_calls();
    let log_ids: BTreeSet<&str> = calls.iter().filter_map(|c| c.log_id.as_deref()).collect();

    for log_id in &log_ids {
        request_detail(&resolver, *log_id)
            .await
            .map_err(|e| anyhow::anyhow!("Detail resolver unavailable: {e}"))?;
    }

    for call in &calls {
        let Some(log_id) = call.log_id.as_deref() else {
            continue;
        };
        let state = await_detail(&resolver, log_id)
            .await
            .map_err(|e| anyhow::anyhow!("Detail resolver unavailable: {e}"))?;

        match state {
            Some(DetailState::Resolved { bundle }) => {
                let found = match_records(&bundle, call);
                let (requests, responses) = found.split_request_response();
                tracing::info!(
                    entry = %call.id,
                    log_id = %log_id,
                    tier = ?found.tier,
                    requests = requests.len(),
                    responses = responses.len(),
                    "Matched model call detail"
                );
            }
            Some(DetailState::Failed { error }) => {
                tracing::warn!(entry = %call.id, log_id = %log_id, error = %error, "No detail for model call");
            }
            Some(DetailState::Pending) | None => {
                tracing::warn!(entry = %call.id, log_id = %log_id, "Detail lookup did not settle");
            }
        }
    }

    if let Ok(stats) = detail_stats(&resolver).await {
        tracing::info!(
            resolved = stats.resolved,
            failed = stats.failed,
            lookups = stats.lookups_issued,
            "Detail resolution finished"
        );
    }

    resolver.stop(None);
    let _ = handle.await;
    Ok(())
}
