use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;

/// What the engine does with notification candidates when the history
/// batch for the same cycle could not be persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HistoryFailurePolicy {
    /// Send the alerts anyway and log a consistency warning.
    DispatchAnyway,
    /// Hold the alerts back; they are lost for this excursion unless the price moves again.
    SkipDispatch,
}

/// Tunables of a single reconciliation cycle.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Upper bound on fetch calls in flight at once.
    pub fetch_concurrency: usize,
    /// Deadline for one product fetch; expiry counts as a failure for that product only.
    pub fetch_timeout: Duration,
    /// Android notification channel carried in every push payload.
    pub push_channel_id: String,
    pub history_failure_policy: HistoryFailurePolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fetch_concurrency: 16,
            fetch_timeout: Duration::from_millis(5_000),
            push_channel_id: "price-alerts".to_string(),
            history_failure_policy: HistoryFailurePolicy::DispatchAnyway,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Database connection string (catalog, history and cache tables).
    pub database_url: String,

    /// Emit JSON logs instead of pretty text.
    pub json_logs: bool,

    /// Base URL of the price fetch gateway.
    pub fetch_endpoint: String,

    /// Base URL of the push provider.
    pub push_endpoint: String,

    /// Period between scheduled cycles.
    pub cycle_interval: Duration,

    pub engine: EngineConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup; missing keys fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = EngineConfig::default();

        let database_url = lookup("DATABASE_URL")
            .unwrap_or_else(|| "sqlite://pricewatch_dev.db?mode=rwc".to_string());

        let json_logs = lookup("APP_ENV").is_some_and(|v| v == "production");

        let fetch_endpoint =
            lookup("PRICE_FETCH_ENDPOINT").unwrap_or_else(|| "http://127.0.0.1:8081".to_string());
        let push_endpoint =
            lookup("PUSH_ENDPOINT").unwrap_or_else(|| "http://127.0.0.1:8082".to_string());

        // 10 minutes
        let interval_secs: u64 = parse_or(&lookup, "CYCLE_INTERVAL_SECS", 600)?;
        if interval_secs == 0 {
            anyhow::bail!("CYCLE_INTERVAL_SECS must be greater than zero");
        }

        let fetch_concurrency: usize =
            parse_or(&lookup, "FETCH_CONCURRENCY", defaults.fetch_concurrency)?;
        let fetch_timeout_ms: u64 = parse_or(
            &lookup,
            "FETCH_TIMEOUT_MS",
            defaults.fetch_timeout.as_millis() as u64,
        )?;
        let dispatch_on_history_failure: bool =
            parse_or(&lookup, "DISPATCH_ON_HISTORY_FAILURE", true)?;

        Ok(Self {
            database_url,
            json_logs,
            fetch_endpoint,
            push_endpoint,
            cycle_interval: Duration::from_secs(interval_secs),
            engine: EngineConfig {
                fetch_concurrency: fetch_concurrency.max(1),
                fetch_timeout: Duration::from_millis(fetch_timeout_ms),
                push_channel_id: lookup("PUSH_CHANNEL_ID").unwrap_or(defaults.push_channel_id),
                history_failure_policy: if dispatch_on_history_failure {
                    HistoryFailurePolicy::DispatchAnyway
                } else {
                    HistoryFailurePolicy::SkipDispatch
                },
            },
        })
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("invalid value for {key}: {raw:?}")),
        None => Ok(default),
    }
}
