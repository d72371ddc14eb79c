use std::env;

use anyhow::{Context, Result, ensure};

use crate::topology::DEFAULT_AUTO_EXPAND_THRESHOLD;
use crate::topology::snapshot::SnapshotSource;

pub const DEFAULT_SNAPSHOT_SOURCE: &str = "snapshot.json";
pub const DEFAULT_TASK_API_URL: &str = "http://localhost:8080/api/v1";
pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 10_000;
pub const DEFAULT_REFRESH_DEBOUNCE_MS: u64 = 200;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_FETCH_MAX_RETRIES: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologySettings {
    pub snapshot_source: SnapshotSource,
    pub current_cluster_id: Option<String>,
    pub task_api_url: String,
    pub refresh_interval_ms: u64,
    pub refresh_debounce_ms: u64,
    pub request_timeout_ms: u64,
    pub fetch_max_retries: u32,
    pub auto_expand_threshold: usize,
}

impl TopologySettings {
    pub fn from_env() -> Result<Self> {
        // Load .env if present, but do not fail if file does not exist.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Reads every setting through `lookup` instead of the process env.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let read_optional_env = |name: &str| read_optional(&lookup, name);
        let parse_u64_env = |name: &str, default: u64| parse_u64(&lookup, name, default);
        let parse_u32_env = |name: &str, default: u32| parse_u32(&lookup, name, default);

        let snapshot_source = read_optional_env("TOPOLOGY_SNAPSHOT_SOURCE")
            .unwrap_or_else(|| DEFAULT_SNAPSHOT_SOURCE.to_owned());
        let snapshot_source = SnapshotSource::parse(&snapshot_source);

        let current_cluster_id = read_optional_env("TOPOLOGY_CURRENT_CLUSTER");

        let task_api_url = lookup("TOPOLOGY_TASK_API_URL")
            .unwrap_or_else(|| DEFAULT_TASK_API_URL.to_owned());
        ensure!(
            !task_api_url.trim().is_empty(),
            "TOPOLOGY_TASK_API_URL cannot be empty"
        );
        ensure!(
            task_api_url.starts_with("http://") || task_api_url.starts_with("https://"),
            "TOPOLOGY_TASK_API_URL must be an http(s) URL, got `{task_api_url}`"
        );

        let refresh_interval_ms =
            parse_u64_env("TOPOLOGY_REFRESH_INTERVAL_MS", DEFAULT_REFRESH_INTERVAL_MS)?;
        ensure!(
            refresh_interval_ms > 0,
            "TOPOLOGY_REFRESH_INTERVAL_MS must be greater than 0"
        );

        let refresh_debounce_ms =
            parse_u64_env("TOPOLOGY_REFRESH_DEBOUNCE_MS", DEFAULT_REFRESH_DEBOUNCE_MS)?;

        let request_timeout_ms =
            parse_u64_env("TOPOLOGY_REQUEST_TIMEOUT_MS", DEFAULT_REQUEST_TIMEOUT_MS)?;
        ensure!(
            request_timeout_ms > 0,
            "TOPOLOGY_REQUEST_TIMEOUT_MS must be greater than 0"
        );

        let fetch_max_retries =
            parse_u32_env("TOPOLOGY_FETCH_MAX_RETRIES", DEFAULT_FETCH_MAX_RETRIES)?;

        let auto_expand_threshold = parse_u64_env(
            "TOPOLOGY_AUTO_EXPAND_THRESHOLD",
            DEFAULT_AUTO_EXPAND_THRESHOLD as u64,
        )? as usize;

        Ok(Self {
            snapshot_source,
            current_cluster_id,
            task_api_url,
            refresh_interval_ms,
            refresh_debounce_ms,
            request_timeout_ms,
            fetch_max_retries,
            auto_expand_threshold,
        })
    }
}

fn read_optional(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_owned())
        }
    })
}

fn parse_u32(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: u32) -> Result<u32> {
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse::<u32>()
            .with_context(|| format!("failed to parse {name} as u32")),
        None => Ok(default),
    }
}

fn parse_u64(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: u64) -> Result<u64> {
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .with_context(|| format!("failed to parse {name} as u64")),
        None => Ok(default),
    }
}
