use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Deserializer, Serialize};
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

const RETRY_BASE_DELAY_MS: u64 = 250;

/// One cluster as reported by the data-fetching collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSnapshot {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub ob_version: Option<String>,
    #[serde(default)]
    pub role: ClusterRole,
    #[serde(default)]
    pub auto_detect_enabled: bool,
    #[serde(default)]
    pub zones: Vec<ZoneSnapshot>,
    #[serde(default)]
    pub tenants: Vec<TenantSnapshot>,
}

impl ClusterSnapshot {
    pub fn server_count(&self) -> usize {
        self.zones.iter().map(|zone| zone.servers.len()).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClusterRole {
    #[default]
    Primary,
    Standby,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneSnapshot {
    pub name: String,
    #[serde(default)]
    pub region_name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub root_server: Option<String>,
    #[serde(default)]
    pub cpu_count: Option<u32>,
    #[serde(default)]
    pub memory_size: Option<String>,
    #[serde(default)]
    pub unit_count: Option<u32>,
    #[serde(default)]
    pub connection_count: Option<u64>,
    #[serde(default)]
    pub qps: Option<f64>,
    #[serde(default)]
    pub servers: Vec<ServerSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSnapshot {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub ip: String,
    pub port: u16,
    #[serde(default)]
    pub sql_port: Option<u16>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub connection_count: Option<u64>,
    #[serde(default)]
    pub qps: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantSnapshot {
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(i64),
}

fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(text) => text,
        RawId::Number(number) => number.to_string(),
    })
}

/// A snapshot document holds either one cluster or a primary/standby list.
#[derive(Deserialize)]
#[serde(untagged)]
enum SnapshotDocument {
    Many(Vec<ClusterSnapshot>),
    Single(Box<ClusterSnapshot>),
}

impl From<SnapshotDocument> for Vec<ClusterSnapshot> {
    fn from(document: SnapshotDocument) -> Self {
        match document {
            SnapshotDocument::Many(clusters) => clusters,
            SnapshotDocument::Single(cluster) => vec![*cluster],
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("failed to read snapshot `{path}`: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse snapshot from {origin}: {reason}")]
    Parse { origin: String, reason: String },

    #[error("snapshot request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("snapshot endpoint returned HTTP {status}: {body}")]
    HttpStatus { status: StatusCode, body: String },
}

impl SnapshotError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Transport(error) => error.is_timeout() || error.is_connect(),
            Self::HttpStatus { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            Self::Read { .. } | Self::Parse { .. } => false,
        }
    }
}

pub fn parse_snapshot_json(raw: &str) -> Result<Vec<ClusterSnapshot>, SnapshotError> {
    serde_json::from_str::<SnapshotDocument>(raw)
        .map(Vec::from)
        .map_err(|error| SnapshotError::Parse {
            origin: "json".to_owned(),
            reason: error.to_string(),
        })
}

pub fn parse_snapshot_yaml(raw: &str) -> Result<Vec<ClusterSnapshot>, SnapshotError> {
    serde_yaml::from_str::<SnapshotDocument>(raw)
        .map(Vec::from)
        .map_err(|error| SnapshotError::Parse {
            origin: "yaml".to_owned(),
            reason: error.to_string(),
        })
}

/// Snapshot embedded in another JSON document, e.g. an API request body.
pub fn snapshot_from_value(
    value: serde_json::Value,
) -> Result<Vec<ClusterSnapshot>, SnapshotError> {
    serde_json::from_value::<SnapshotDocument>(value)
        .map(Vec::from)
        .map_err(|error| SnapshotError::Parse {
            origin: "request body".to_owned(),
            reason: error.to_string(),
        })
}

pub fn load_snapshot_file(path: &Path) -> Result<Vec<ClusterSnapshot>, SnapshotError> {
    let raw = fs::read_to_string(path).map_err(|source| SnapshotError::Read {
        path: path.display().to_string(),
        source,
    })?;

    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| matches!(ext, "yaml" | "yml"));
    let parsed = if is_yaml {
        parse_snapshot_yaml(&raw)
    } else {
        parse_snapshot_json(&raw)
    };

    parsed.map_err(|error| match error {
        SnapshotError::Parse { reason, .. } => SnapshotError::Parse {
            origin: format!("`{}`", path.display()),
            reason,
        },
        other => other,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotSource {
    File(PathBuf),
    Http(String),
}

impl SnapshotSource {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            Self::Http(trimmed.to_owned())
        } else {
            Self::File(PathBuf::from(trimmed))
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::Http(url) => url.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SnapshotFetcher {
    source: SnapshotSource,
    http_client: reqwest::Client,
    timeout_ms: u64,
    max_retries: u32,
}

impl SnapshotFetcher {
    pub fn new(source: SnapshotSource, timeout_ms: u64, max_retries: u32) -> Self {
        Self {
            source,
            http_client: reqwest::Client::new(),
            timeout_ms,
            max_retries,
        }
    }

    pub fn source(&self) -> &SnapshotSource {
        &self.source
    }

    pub async fn fetch(&self) -> Result<Vec<ClusterSnapshot>, SnapshotError> {
        let total_attempts = self.max_retries.saturating_add(1);
        let mut attempt: u32 = 1;

        loop {
            match self.fetch_once().await {
                Ok(clusters) => return Ok(clusters),
                Err(error) => {
                    let should_retry = attempt < total_attempts && error.is_retryable();
                    if !should_retry {
                        return Err(error);
                    }

                    let delay_ms = retry_delay_ms(attempt);
                    warn!(
                        attempt,
                        total_attempts,
                        delay_ms,
                        error = %error,
                        "snapshot fetch failed; retrying"
                    );

                    sleep(Duration::from_millis(delay_ms)).await;
                    attempt = attempt.saturating_add(1);
                }
            }
        }
    }

    async fn fetch_once(&self) -> Result<Vec<ClusterSnapshot>, SnapshotError> {
        match &self.source {
            SnapshotSource::File(path) => load_snapshot_file(path),
            SnapshotSource::Http(url) => {
                let timeout_duration = Duration::from_millis(self.timeout_ms);
                match timeout(timeout_duration, self.fetch_http(url)).await {
                    Ok(result) => result,
                    Err(_) => Err(SnapshotError::Timeout {
                        timeout_ms: self.timeout_ms,
                    }),
                }
            }
        }
    }

    async fn fetch_http(&self, url: &str) -> Result<Vec<ClusterSnapshot>, SnapshotError> {
        debug!(url = %url, "fetching cluster snapshot");

        let response = self.http_client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read error response body>".to_owned());
            return Err(SnapshotError::HttpStatus { status, body });
        }

        let raw = response.text().await?;
        parse_snapshot_json(&raw)
    }
}

fn retry_delay_ms(attempt: u32) -> u64 {
    let exponent = attempt.saturating_sub(1).min(5);
    RETRY_BASE_DELAY_MS.saturating_mul(1_u64 << exponent)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use crate::test_support::{remove_dir_if_exists, temp_path};

    use super::{
        ClusterRole, SnapshotError, SnapshotSource, load_snapshot_file, parse_snapshot_json,
        retry_delay_ms,
    };

    #[test]
    fn parses_single_cluster_document_with_numeric_ids() {
        let raw = r#"{
            "id": 1001,
            "name": "obcluster",
            "status": "RUNNING",
            "obVersion": "4.2.1.0",
            "zones": [{
                "name": "zone1",
                "regionName": "hangzhou",
                "status": "RUNNING",
                "rootServer": "10.0.0.1:2882",
                "servers": [{
                    "id": 7,
                    "ip": "10.0.0.1",
                    "port": 2882,
                    "status": "RUNNING",
                    "extra": true
                }]
            }],
            "tenants": [{"name": "sys"}]
        }"#;

        let clusters = parse_snapshot_json(raw).expect("snapshot should parse");
        assert_eq!(clusters.len(), 1);
        let cluster = &clusters[0];
        assert_eq!(cluster.id, "1001");
        assert_eq!(cluster.ob_version.as_deref(), Some("4.2.1.0"));
        assert_eq!(cluster.role, ClusterRole::Primary);
        assert_eq!(cluster.zones[0].region_name.as_deref(), Some("hangzhou"));
        assert_eq!(cluster.zones[0].servers[0].id, "7");
        assert_eq!(cluster.server_count(), 1);
    }

    #[test]
    fn parses_primary_standby_list() {
        let raw = r#"[
            {"id": "a", "name": "primary", "zones": []},
            {"id": "b", "name": "standby", "role": "STANDBY"}
        ]"#;

        let clusters = parse_snapshot_json(raw).expect("snapshot list should parse");
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[1].role, ClusterRole::Standby);
        assert!(clusters[1].zones.is_empty());
    }

    #[test]
    fn loads_yaml_snapshot_by_extension() {
        let root = temp_path("snapshot-yaml");
        fs::create_dir_all(&root).expect("temp dir should be created");
        let path = root.join("snapshot.yaml");
        fs::write(
            &path,
            "id: c1\nname: demo\nstatus: STOPPED\nzones:\n  - name: z1\n    servers: []\n",
        )
        .expect("snapshot should be written");

        let clusters = load_snapshot_file(&path).expect("yaml snapshot should load");
        assert_eq!(clusters[0].status.as_deref(), Some("STOPPED"));
        assert_eq!(clusters[0].zones[0].name, "z1");

        remove_dir_if_exists(&root);
    }

    #[test]
    fn parse_error_names_file_origin() {
        let root = temp_path("snapshot-bad");
        fs::create_dir_all(&root).expect("temp dir should be created");
        let path = root.join("snapshot.json");
        fs::write(&path, "{ not json").expect("snapshot should be written");

        let error = load_snapshot_file(&path).expect_err("invalid json should fail");
        assert!(matches!(error, SnapshotError::Parse { .. }));
        assert!(error.to_string().contains("snapshot.json"));
        assert!(!error.is_retryable());

        remove_dir_if_exists(&root);
    }

    #[test]
    fn source_parse_distinguishes_urls_from_paths() {
        assert_eq!(
            SnapshotSource::parse("https://ocp.local/api/cluster"),
            SnapshotSource::Http("https://ocp.local/api/cluster".to_owned())
        );
        assert!(matches!(
            SnapshotSource::parse("./snapshot.json"),
            SnapshotSource::File(_)
        ));
    }

    #[test]
    fn retry_delay_uses_exponential_backoff_with_cap() {
        assert_eq!(retry_delay_ms(1), 250);
        assert_eq!(retry_delay_ms(2), 500);
        assert_eq!(retry_delay_ms(99), 8_000);
    }
}
