use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use tokio::time::timeout;
use tracing::debug;

use super::ActionRequest;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("task request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("task service returned HTTP {status}: {body}")]
    HttpStatus { status: StatusCode, body: String },

    #[error("task service rejected the action: {reason}")]
    Rejected { reason: String },

    #[error("response format error: {0}")]
    ResponseFormat(String),
}

/// Acknowledgement from the task service. Every field is optional; an empty
/// success body is a valid receipt.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskReceipt {
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub accepted: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Boundary to the service that actually performs cluster operations.
pub trait TaskExecutor: Send + Sync {
    fn submit(
        &self,
        request: &ActionRequest,
    ) -> impl Future<Output = Result<TaskReceipt, DispatchError>> + Send;
}

#[derive(Debug, Clone)]
pub struct HttpTaskExecutor {
    http_client: reqwest::Client,
    base_url: String,
    timeout_ms: u64,
}

impl HttpTaskExecutor {
    pub fn new(base_url: impl Into<String>, timeout_ms: u64) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url: base_url.into(),
            timeout_ms,
        }
    }

    pub fn actions_url(&self, cluster_id: &str) -> String {
        format!(
            "{}/clusters/{cluster_id}/actions",
            self.base_url.trim_end_matches('/')
        )
    }

    async fn post_action(&self, request: &ActionRequest) -> Result<TaskReceipt, DispatchError> {
        let url = self.actions_url(&request.cluster_id);
        debug!(
            url = %url,
            action = request.action_key.as_str(),
            target_id = %request.target_id,
            "submitting cluster action"
        );

        let response = self.http_client.post(&url).json(request).send().await?;
        let response = ensure_success(response).await?;
        let body = response.text().await?;
        parse_receipt(&body)
    }
}

impl TaskExecutor for HttpTaskExecutor {
    // Single attempt; commands are never retried.
    async fn submit(&self, request: &ActionRequest) -> Result<TaskReceipt, DispatchError> {
        match timeout(
            Duration::from_millis(self.timeout_ms),
            self.post_action(request),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(DispatchError::Timeout {
                timeout_ms: self.timeout_ms,
            }),
        }
    }
}

fn parse_receipt(body: &str) -> Result<TaskReceipt, DispatchError> {
    if body.trim().is_empty() {
        return Ok(TaskReceipt::default());
    }

    let receipt: TaskReceipt = serde_json::from_str(body)
        .map_err(|error| DispatchError::ResponseFormat(error.to_string()))?;
    if receipt.accepted == Some(false) {
        return Err(DispatchError::Rejected {
            reason: receipt
                .message
                .unwrap_or_else(|| "no reason given".to_owned()),
        });
    }
    Ok(receipt)
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, DispatchError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read error response body>".to_owned());
    Err(DispatchError::HttpStatus { status, body })
}
