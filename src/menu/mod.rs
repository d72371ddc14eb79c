//! Status-driven action menus.
//!
//! `resolve` is pure and cheap; callers run it every time a menu opens instead
//! of keeping the result around, since statuses move between opens.

use serde::{Deserialize, Serialize};

use crate::render::status::{ClusterStatus, ServerStatus, ZoneStatus};
use crate::topology::snapshot::ClusterRole;
use crate::topology::{NodeKind, NodeMetadata, TopologyNode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKey {
    CreateTenant,
    AddZone,
    AddServer,
    Upgrade,
    ChangePassword,
    Restart,
    Stop,
    Start,
    Delete,
    StopProcess,
    StopService,
    ToggleAutoDetect,
    DownloadLogs,
    NoOperation,
}

impl ActionKey {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreateTenant => "create_tenant",
            Self::AddZone => "add_zone",
            Self::AddServer => "add_server",
            Self::Upgrade => "upgrade",
            Self::ChangePassword => "change_password",
            Self::Restart => "restart",
            Self::Stop => "stop",
            Self::Start => "start",
            Self::Delete => "delete",
            Self::StopProcess => "stop_process",
            Self::StopService => "stop_service",
            Self::ToggleAutoDetect => "toggle_auto_detect",
            Self::DownloadLogs => "download_logs",
            Self::NoOperation => "no_operation",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::CreateTenant => "Create tenant",
            Self::AddZone => "Add zone",
            Self::AddServer => "Add server",
            Self::Upgrade => "Upgrade",
            Self::ChangePassword => "Change password",
            Self::Restart => "Restart",
            Self::Stop => "Stop",
            Self::Start => "Start",
            Self::Delete => "Delete",
            Self::StopProcess => "Stop process",
            Self::StopService => "Stop service",
            Self::ToggleAutoDetect => "Toggle auto detection",
            Self::DownloadLogs => "Download logs",
            Self::NoOperation => "No operation available in the current state",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionMenuItem {
    pub key: ActionKey,
    pub label: String,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled_reason: Option<String>,
}

impl ActionMenuItem {
    pub fn enabled(key: ActionKey) -> Self {
        Self {
            key,
            label: key.label().to_owned(),
            enabled: true,
            disabled_reason: None,
        }
    }

    pub fn disabled(key: ActionKey, reason: Option<&str>) -> Self {
        Self {
            enabled: false,
            disabled_reason: reason.map(str::to_owned),
            ..Self::enabled(key)
        }
    }

    fn with_label(mut self, label: &str) -> Self {
        self.label = label.to_owned();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MenuEntry {
    Item(ActionMenuItem),
    Divider,
}

impl MenuEntry {
    pub fn is_divider(&self) -> bool {
        matches!(self, Self::Divider)
    }

    pub fn item(&self) -> Option<&ActionMenuItem> {
        match self {
            Self::Item(item) => Some(item),
            Self::Divider => None,
        }
    }
}

pub const STANDBY_CREATE_TENANT_REASON: &str = "Tenants can only be created on the primary cluster";

const ZONE_ALLOWED: &[ActionKey] = &[ActionKey::Restart, ActionKey::Stop, ActionKey::Start];
const SERVER_ALLOWED: &[ActionKey] = &[
    ActionKey::Restart,
    ActionKey::StopProcess,
    ActionKey::StopService,
];

pub fn resolve(node: &TopologyNode, is_current_cluster: bool) -> Vec<MenuEntry> {
    let raw = match node.kind {
        NodeKind::Root => Vec::new(),
        NodeKind::Cluster => raw_cluster_entries(node, is_current_cluster),
        NodeKind::Zone => restrict_operations(
            ZoneStatus::parse(node.status.as_deref()).operations(),
            ZONE_ALLOWED,
        ),
        NodeKind::Server => restrict_operations(
            ServerStatus::parse(node.status.as_deref()).operations(),
            SERVER_ALLOWED,
        ),
    };
    finalize(raw)
}

/// Keeps every operation but disables the ones outside `allowed`.
pub fn restrict_operations(operations: &[ActionKey], allowed: &[ActionKey]) -> Vec<MenuEntry> {
    operations
        .iter()
        .map(|key| {
            if allowed.contains(key) {
                MenuEntry::Item(ActionMenuItem::enabled(*key))
            } else {
                MenuEntry::Item(ActionMenuItem::disabled(*key, None))
            }
        })
        .collect()
}

/// Cluster entries before divider stripping.
pub fn raw_cluster_entries(node: &TopologyNode, is_current_cluster: bool) -> Vec<MenuEntry> {
    if node.kind != NodeKind::Cluster || !is_current_cluster {
        return Vec::new();
    }
    let (is_primary, auto_detect_enabled) = match &node.metadata {
        NodeMetadata::Cluster {
            role,
            auto_detect_enabled,
            ..
        } => (*role == ClusterRole::Primary, *auto_detect_enabled),
        _ => (true, false),
    };
    let item = |key| MenuEntry::Item(ActionMenuItem::enabled(key));

    match ClusterStatus::parse(node.status.as_deref()) {
        ClusterStatus::Running => {
            let create_tenant = if is_primary {
                item(ActionKey::CreateTenant)
            } else {
                MenuEntry::Item(ActionMenuItem::disabled(
                    ActionKey::CreateTenant,
                    Some(STANDBY_CREATE_TENANT_REASON),
                ))
            };
            let toggle_label = if auto_detect_enabled {
                "Disable auto detection"
            } else {
                "Enable auto detection"
            };
            vec![
                create_tenant,
                item(ActionKey::AddZone),
                item(ActionKey::AddServer),
                MenuEntry::Divider,
                item(ActionKey::Upgrade),
                item(ActionKey::ChangePassword),
                MenuEntry::Divider,
                item(ActionKey::Restart),
                item(ActionKey::Stop),
                item(ActionKey::Delete),
                MenuEntry::Divider,
                MenuEntry::Item(
                    ActionMenuItem::enabled(ActionKey::ToggleAutoDetect).with_label(toggle_label),
                ),
                item(ActionKey::DownloadLogs),
            ]
        }
        ClusterStatus::Stopped => vec![
            item(ActionKey::Upgrade),
            MenuEntry::Divider,
            item(ActionKey::Start),
            item(ActionKey::Delete),
        ],
        ClusterStatus::Unavailable => vec![
            item(ActionKey::Restart),
            item(ActionKey::Stop),
            item(ActionKey::Delete),
        ],
        ClusterStatus::Abandoned | ClusterStatus::Failover => vec![item(ActionKey::Delete)],
        _ => Vec::new(),
    }
}

fn finalize(mut entries: Vec<MenuEntry>) -> Vec<MenuEntry> {
    while entries.first().is_some_and(MenuEntry::is_divider) {
        entries.remove(0);
    }
    while entries.last().is_some_and(MenuEntry::is_divider) {
        entries.pop();
    }
    if entries.is_empty() {
        entries.push(MenuEntry::Item(ActionMenuItem::disabled(
            ActionKey::NoOperation,
            None,
        )));
    }
    entries
}
