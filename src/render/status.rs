//! Status vocabularies. Clusters, zones and servers each report their own set
//! of lifecycle states; they share only the visual tone used for badges.

use serde::{Deserialize, Serialize};

use crate::menu::ActionKey;
use crate::topology::NodeKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusTone {
    Healthy,
    Idle,
    Faulty,
    Transitional,
    Inactive,
    Unknown,
}

impl StatusTone {
    pub fn badge_color(self) -> &'static str {
        match self {
            Self::Healthy => "#52c41a",
            Self::Idle => "#faad14",
            Self::Faulty => "#ff4d4f",
            Self::Transitional => "#1890ff",
            Self::Inactive => "#595959",
            Self::Unknown => "#bfbfbf",
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Idle => "idle",
            Self::Faulty => "faulty",
            Self::Transitional => "transitional",
            Self::Inactive => "inactive",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusAppearance {
    pub label: &'static str,
    pub tone: StatusTone,
}

impl StatusAppearance {
    const fn new(label: &'static str, tone: StatusTone) -> Self {
        Self { label, tone }
    }

    pub fn icon_key(self, kind: NodeKind) -> String {
        format!("{}-{}", kind.as_str(), self.tone.as_str())
    }

    pub fn badge_color(self) -> &'static str {
        self.tone.badge_color()
    }
}

const UNKNOWN_APPEARANCE: StatusAppearance = StatusAppearance::new("Unknown", StatusTone::Unknown);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterStatus {
    Running,
    Stopped,
    Unavailable,
    Abandoned,
    Failover,
    Starting,
    Stopping,
    Restarting,
    Upgrading,
    Deleting,
    Unknown,
}

impl ClusterStatus {
    pub fn parse(raw: Option<&str>) -> Self {
        match normalize(raw).as_deref() {
            Some("RUNNING") => Self::Running,
            Some("STOPPED") => Self::Stopped,
            Some("UNAVAILABLE") => Self::Unavailable,
            Some("ABANDONED") => Self::Abandoned,
            Some("FAILOVER") => Self::Failover,
            Some("STARTING") => Self::Starting,
            Some("STOPPING") => Self::Stopping,
            Some("RESTARTING") => Self::Restarting,
            Some("UPGRADING") => Self::Upgrading,
            Some("DELETING") => Self::Deleting,
            _ => Self::Unknown,
        }
    }

    pub fn appearance(self) -> StatusAppearance {
        match self {
            Self::Running => StatusAppearance::new("Running", StatusTone::Healthy),
            Self::Stopped => StatusAppearance::new("Stopped", StatusTone::Idle),
            Self::Unavailable => StatusAppearance::new("Unavailable", StatusTone::Faulty),
            Self::Abandoned => StatusAppearance::new("Abandoned", StatusTone::Inactive),
            Self::Failover => StatusAppearance::new("Failed over", StatusTone::Inactive),
            Self::Starting => StatusAppearance::new("Starting", StatusTone::Transitional),
            Self::Stopping => StatusAppearance::new("Stopping", StatusTone::Transitional),
            Self::Restarting => StatusAppearance::new("Restarting", StatusTone::Transitional),
            Self::Upgrading => StatusAppearance::new("Upgrading", StatusTone::Transitional),
            Self::Deleting => StatusAppearance::new("Deleting", StatusTone::Transitional),
            Self::Unknown => UNKNOWN_APPEARANCE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneStatus {
    Running,
    Stopped,
    Unavailable,
    Starting,
    Stopping,
    Restarting,
    Deleting,
    Unknown,
}

impl ZoneStatus {
    pub fn parse(raw: Option<&str>) -> Self {
        match normalize(raw).as_deref() {
            Some("RUNNING") => Self::Running,
            Some("STOPPED") => Self::Stopped,
            Some("UNAVAILABLE") => Self::Unavailable,
            Some("STARTING") => Self::Starting,
            Some("STOPPING") => Self::Stopping,
            Some("RESTARTING") => Self::Restarting,
            Some("DELETING") => Self::Deleting,
            _ => Self::Unknown,
        }
    }

    pub fn appearance(self) -> StatusAppearance {
        match self {
            Self::Running => StatusAppearance::new("Running", StatusTone::Healthy),
            Self::Stopped => StatusAppearance::new("Stopped", StatusTone::Idle),
            Self::Unavailable => StatusAppearance::new("Unavailable", StatusTone::Faulty),
            Self::Starting => StatusAppearance::new("Starting", StatusTone::Transitional),
            Self::Stopping => StatusAppearance::new("Stopping", StatusTone::Transitional),
            Self::Restarting => StatusAppearance::new("Restarting", StatusTone::Transitional),
            Self::Deleting => StatusAppearance::new("Deleting", StatusTone::Transitional),
            Self::Unknown => UNKNOWN_APPEARANCE,
        }
    }

    pub fn is_operable(self) -> bool {
        matches!(self, Self::Running | Self::Stopped | Self::Unavailable)
    }

    /// Every operation the backend offers a zone in this state, before the
    /// menu narrows it down.
    pub fn operations(self) -> &'static [ActionKey] {
        match self {
            Self::Running | Self::Unavailable => {
                &[ActionKey::Restart, ActionKey::Stop, ActionKey::Delete]
            }
            Self::Stopped => &[ActionKey::Start, ActionKey::Delete],
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStatus {
    Running,
    Stopped,
    Unavailable,
    ProcessStopped,
    ServiceStopped,
    Starting,
    Stopping,
    Restarting,
    Deleting,
    Unknown,
}

impl ServerStatus {
    pub fn parse(raw: Option<&str>) -> Self {
        match normalize(raw).as_deref() {
            Some("RUNNING") => Self::Running,
            Some("STOPPED") => Self::Stopped,
            Some("UNAVAILABLE") => Self::Unavailable,
            Some("PROCESS_STOPPED" | "STOPPED_PROCESS") => Self::ProcessStopped,
            Some("SERVICE_STOPPED" | "STOPPED_SERVICE") => Self::ServiceStopped,
            Some("STARTING") => Self::Starting,
            Some("STOPPING") => Self::Stopping,
            Some("RESTARTING") => Self::Restarting,
            Some("DELETING") => Self::Deleting,
            _ => Self::Unknown,
        }
    }

    pub fn appearance(self) -> StatusAppearance {
        match self {
            Self::Running => StatusAppearance::new("Running", StatusTone::Healthy),
            Self::Stopped => StatusAppearance::new("Stopped", StatusTone::Idle),
            Self::Unavailable => StatusAppearance::new("Unavailable", StatusTone::Faulty),
            Self::ProcessStopped => StatusAppearance::new("Process stopped", StatusTone::Idle),
            Self::ServiceStopped => StatusAppearance::new("Service stopped", StatusTone::Idle),
            Self::Starting => StatusAppearance::new("Starting", StatusTone::Transitional),
            Self::Stopping => StatusAppearance::new("Stopping", StatusTone::Transitional),
            Self::Restarting => StatusAppearance::new("Restarting", StatusTone::Transitional),
            Self::Deleting => StatusAppearance::new("Deleting", StatusTone::Transitional),
            Self::Unknown => UNKNOWN_APPEARANCE,
        }
    }

    pub fn is_operable(self) -> bool {
        matches!(
            self,
            Self::Running
                | Self::Stopped
                | Self::Unavailable
                | Self::ProcessStopped
                | Self::ServiceStopped
        )
    }

    pub fn operations(self) -> &'static [ActionKey] {
        match self {
            Self::Running | Self::Unavailable => &[
                ActionKey::Restart,
                ActionKey::StopProcess,
                ActionKey::StopService,
                ActionKey::Delete,
            ],
            Self::ProcessStopped => &[ActionKey::Start, ActionKey::StopService, ActionKey::Delete],
            Self::Stopped | Self::ServiceStopped => &[ActionKey::Start, ActionKey::Delete],
            _ => &[],
        }
    }
}

/// Appearance of a raw status string in the vocabulary of `kind`.
pub fn status_appearance(kind: NodeKind, raw: Option<&str>) -> StatusAppearance {
    match kind {
        NodeKind::Root => UNKNOWN_APPEARANCE,
        NodeKind::Cluster => ClusterStatus::parse(raw).appearance(),
        NodeKind::Zone => ZoneStatus::parse(raw).appearance(),
        NodeKind::Server => ServerStatus::parse(raw).appearance(),
    }
}

fn normalize(raw: Option<&str>) -> Option<String> {
    raw.map(|value| value.trim().to_ascii_uppercase())
        .filter(|value| !value.is_empty())
}
