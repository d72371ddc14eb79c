//! Turns a chosen menu action into a request for the task service.
//!
//! Nothing in this module touches the topology model. A successful command
//! only asks the host to refresh the snapshot; the new status arrives with it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

pub mod client;

use self::client::{DispatchError, TaskExecutor};
use crate::menu::{self, ActionKey, MenuEntry};
use crate::topology::{NodeKind, NodeMetadata, TopologyNode, TopologyTree};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    pub action_key: ActionKey,
    pub target_kind: NodeKind,
    /// Domain identifier (cluster id, zone name or server id), not the node id.
    pub target_id: String,
    pub cluster_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation_payload: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialogField {
    pub key: &'static str,
    pub label: &'static str,
    pub secret: bool,
}

const fn field(key: &'static str, label: &'static str) -> DialogField {
    DialogField {
        key,
        label,
        secret: false,
    }
}

const CHANGE_PASSWORD_FIELDS: &[DialogField] = &[DialogField {
    key: "password",
    label: "New password",
    secret: true,
}];
const UPGRADE_FIELDS: &[DialogField] = &[field("targetVersion", "Target version")];
const ADD_ZONE_FIELDS: &[DialogField] = &[
    field("zoneName", "Zone name"),
    field("regionName", "Region"),
];
const ADD_SERVER_FIELDS: &[DialogField] = &[field("zoneName", "Zone"), field("ip", "IP address")];
const CREATE_TENANT_FIELDS: &[DialogField] = &[field("tenantName", "Tenant name")];
const DOWNLOAD_LOGS_FIELDS: &[DialogField] = &[
    field("startTime", "Start time"),
    field("endTime", "End time"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogKind {
    ChangePassword,
    Upgrade,
    AddZone,
    AddServer,
    CreateTenant,
    DownloadLogs,
}

impl DialogKind {
    pub fn for_action(key: ActionKey) -> Option<Self> {
        match key {
            ActionKey::ChangePassword => Some(Self::ChangePassword),
            ActionKey::Upgrade => Some(Self::Upgrade),
            ActionKey::AddZone => Some(Self::AddZone),
            ActionKey::AddServer => Some(Self::AddServer),
            ActionKey::CreateTenant => Some(Self::CreateTenant),
            ActionKey::DownloadLogs => Some(Self::DownloadLogs),
            _ => None,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::ChangePassword => "Change root password",
            Self::Upgrade => "Upgrade cluster",
            Self::AddZone => "Add zone",
            Self::AddServer => "Add server",
            Self::CreateTenant => "Create tenant",
            Self::DownloadLogs => "Download logs",
        }
    }

    pub fn fields(self) -> &'static [DialogField] {
        match self {
            Self::ChangePassword => CHANGE_PASSWORD_FIELDS,
            Self::Upgrade => UPGRADE_FIELDS,
            Self::AddZone => ADD_ZONE_FIELDS,
            Self::AddServer => ADD_SERVER_FIELDS,
            Self::CreateTenant => CREATE_TENANT_FIELDS,
            Self::DownloadLogs => DOWNLOAD_LOGS_FIELDS,
        }
    }

    /// Builds the confirmation payload from dialog input. Every field is
    /// required; values are trimmed.
    pub fn payload(self, values: &BTreeMap<String, String>) -> Result<Value, String> {
        let mut payload = Map::new();
        for field in self.fields() {
            let value = values
                .get(field.key)
                .map(|value| value.trim())
                .unwrap_or_default();
            if value.is_empty() {
                return Err(format!("{} is required", field.label));
            }
            payload.insert(field.key.to_owned(), Value::String(value.to_owned()));
        }
        Ok(Value::Object(payload))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchPlan {
    /// Collect input first, then execute with the dialog payload.
    OpenDialog {
        dialog: DialogKind,
        request: ActionRequest,
    },
    ConfirmThenExecute {
        message: String,
        request: ActionRequest,
    },
    Ignore,
}

/// Decides what a click on `key` for `node` should do. The menu is resolved
/// again so a stale or disabled entry is never dispatched.
pub fn plan_action(key: ActionKey, node: &TopologyNode, tree: &TopologyTree) -> DispatchPlan {
    let cluster_id = owning_cluster_id(tree, &node.id);
    let is_current_cluster = cluster_id
        .as_deref()
        .is_some_and(|id| tree.current_cluster_id.as_deref() == Some(id));
    let offered = menu::resolve(node, node.kind == NodeKind::Cluster && is_current_cluster)
        .iter()
        .filter_map(MenuEntry::item)
        .any(|item| item.key == key && item.enabled);
    let Some(cluster_id) = cluster_id.filter(|_| offered) else {
        return DispatchPlan::Ignore;
    };

    let request = ActionRequest {
        action_key: key,
        target_kind: node.kind,
        target_id: domain_id(node),
        cluster_id,
        confirmation_payload: None,
    };

    match DialogKind::for_action(key) {
        Some(dialog) => DispatchPlan::OpenDialog { dialog, request },
        None => DispatchPlan::ConfirmThenExecute {
            message: confirmation_message(key, node),
            request,
        },
    }
}

fn confirmation_message(key: ActionKey, node: &TopologyNode) -> String {
    match key {
        ActionKey::ToggleAutoDetect => {
            let enabled = matches!(
                node.metadata,
                NodeMetadata::Cluster {
                    auto_detect_enabled: true,
                    ..
                }
            );
            let verb = if enabled { "Disable" } else { "Enable" };
            format!("{verb} auto detection for cluster {}?", node.display_name)
        }
        _ => format!(
            "{} {} {}?",
            key.label(),
            node.kind.as_str(),
            node.display_name
        ),
    }
}

fn domain_id(node: &TopologyNode) -> String {
    match &node.metadata {
        NodeMetadata::Cluster { cluster_id, .. } => cluster_id.clone(),
        NodeMetadata::Server { server_id, .. } => server_id.clone(),
        NodeMetadata::Zone { .. } | NodeMetadata::Root => node.display_name.clone(),
    }
}

fn owning_cluster_id(tree: &TopologyTree, node_id: &str) -> Option<String> {
    tree.root
        .children
        .iter()
        .find(|cluster| cluster.find(node_id).is_some())
        .and_then(|cluster| match &cluster.metadata {
            NodeMetadata::Cluster { cluster_id, .. } => Some(cluster_id.clone()),
            _ => None,
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub notification: Notification,
    pub refresh_requested: bool,
    pub task_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CommandDispatcher<E> {
    executor: E,
}

impl<E: TaskExecutor> CommandDispatcher<E> {
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub async fn execute(&self, request: ActionRequest) -> DispatchOutcome {
        let subject = format!(
            "{} {} {}",
            request.action_key.label(),
            request.target_kind.as_str(),
            request.target_id
        );

        match self.executor.submit(&request).await {
            Ok(receipt) => {
                info!(
                    action = request.action_key.as_str(),
                    cluster_id = %request.cluster_id,
                    target_id = %request.target_id,
                    task_id = receipt.task_id.as_deref().unwrap_or("-"),
                    "cluster action submitted"
                );
                DispatchOutcome {
                    notification: Notification {
                        level: NotificationLevel::Success,
                        message: format!("{subject}: submitted"),
                    },
                    refresh_requested: true,
                    task_id: receipt.task_id,
                }
            }
            Err(error) => {
                warn!(
                    action = request.action_key.as_str(),
                    cluster_id = %request.cluster_id,
                    target_id = %request.target_id,
                    error = %error,
                    "cluster action failed"
                );
                DispatchOutcome {
                    notification: Notification {
                        level: NotificationLevel::Error,
                        message: format!("{subject} failed: {}", describe_error(&error)),
                    },
                    refresh_requested: false,
                    task_id: None,
                }
            }
        }
    }
}

fn describe_error(error: &DispatchError) -> String {
    match error {
        DispatchError::Rejected { reason } => reason.clone(),
        other => other.to_string(),
    }
}
