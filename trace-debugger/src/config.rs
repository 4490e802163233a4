use std::time::Duration;

use crate::detail::EvictionPolicy;

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the structured log store; detail lookups are disabled without it
    pub log_store_url: Option<String>,
    /// Per-request timeout for log store lookups
    pub log_store_timeout: Duration,
    /// Settled detail entries kept before LRU eviction (`None` = unbounded)
    pub detail_cache_max_entries: Option<usize>,
    /// Settled detail entries older than this are dropped
    pub detail_cache_ttl: Option<Duration>,
    /// Resolve request/response detail for every model call after building the tree
    pub resolve_details: bool,
}

impl Default for Config {
    fn default() -> Self {
        let policy = EvictionPolicy::default();
        Self {
            log_store_url: None,
            log_store_timeout: Duration::from_secs(30),
            detail_cache_max_entries: policy.max_entries,
            detail_cache_ttl: policy.ttl,
            resolve_details: false,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_source<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let max_entries: usize = env_parse(&lookup, "TRACE_DETAIL_CACHE_MAX_ENTRIES", 256)?;
        let ttl_secs: u64 = env_parse(&lookup, "TRACE_DETAIL_CACHE_TTL_SECS", 0)?;

        Ok(Self {
            log_store_url: env_opt(&lookup, "TRACE_LOG_STORE_URL"),
            log_store_timeout: Duration::from_secs(env_parse(
                &lookup,
                "TRACE_LOG_STORE_TIMEOUT_SECS",
                30,
            )?),
            detail_cache_max_entries: (max_entries > 0).then_some(max_entries),
            detail_cache_ttl: (ttl_secs > 0).then(|| Duration::from_secs(ttl_secs)),
            resolve_details: env_bool(&lookup, "TRACE_RESOLVE_DETAILS", false)?,
        })
    }

    pub fn eviction_policy(&self) -> EvictionPolicy {
        EvictionPolicy {
            max_entries: self.detail_cache_max_entries,
            ttl: self.detail_cache_ttl,
        }
    }
}

fn env_opt<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env_opt(lookup, key) {
        Some(val) => val
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Failed to parse env var {key}={val}: {e}")),
        None => Ok(default),
    }
}

fn env_bool<F>(lookup: &F, key: &str, default: bool) -> anyhow::Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    match env_opt(lookup, key).map(|v| v.to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(anyhow::anyhow!(
                "Invalid {key} '{other}'. Expected true/false"
            )),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_source(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert!(config.log_store_url.is_none());
        assert_eq!(config.log_store_timeout, Duration::from_secs(30));
        assert_eq!(config.eviction_policy(), EvictionPolicy::default());
        assert!(!config.resolve_details);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("TRACE_LOG_STORE_URL", " http://localhost:8080 "),
            ("TRACE_LOG_STORE_TIMEOUT_SECS", "5"),
            ("TRACE_DETAIL_CACHE_MAX_ENTRIES", "0"),
            ("TRACE_DETAIL_CACHE_TTL_SECS", "120"),
            ("TRACE_RESOLVE_DETAILS", "yes"),
        ])
        .unwrap();

        assert_eq!(config.log_store_url.as_deref(), Some("http://localhost:8080"));
        assert_eq!(config.log_store_timeout, Duration::from_secs(5));
        assert_eq!(
            config.eviction_policy(),
            EvictionPolicy {
                max_entries: None,
                ttl: Some(Duration::from_secs(120)),
            }
        );
        assert!(config.resolve_details);
    }

    #[test]
    fn test_blank_url_is_unset() {
        let config = config_from(&[("TRACE_LOG_STORE_URL", "  ")]).unwrap();
        assert!(config.log_store_url.is_none());
    }

    #[test]
    fn test_invalid_values_are_errors() {
        let err = config_from(&[("TRACE_LOG_STORE_TIMEOUT_SECS", "soon")]).unwrap_err();
        assert!(err.to_string().contains("TRACE_LOG_STORE_TIMEOUT_SECS"));

        let err = config_from(&[("TRACE_RESOLVE_DETAILS", "maybe")]).unwrap_err();
        assert!(err.to_string().contains("TRACE_RESOLVE_DETAILS"));
    }
}
