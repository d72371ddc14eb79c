use serde::{Deserialize, Serialize};
use tracing::debug;

pub mod snapshot;
pub mod watch;

use self::snapshot::{ClusterRole, ClusterSnapshot, ServerSnapshot, ZoneSnapshot};

pub const ROOT_NODE_ID: &str = "root";
pub const DEFAULT_AUTO_EXPAND_THRESHOLD: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Root,
    Cluster,
    Zone,
    Server,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::Cluster => "cluster",
            Self::Zone => "zone",
            Self::Server => "server",
        }
    }

    pub fn supports_collapse(self) -> bool {
        matches!(self, Self::Cluster | Self::Zone)
    }
}

/// Kind-specific fields used by shapes and tooltips. Layout never reads these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeMetadata {
    Root,
    Cluster {
        cluster_id: String,
        version: Option<String>,
        role: ClusterRole,
        auto_detect_enabled: bool,
        tenant_count: usize,
    },
    Zone {
        region: Option<String>,
        root_server: Option<String>,
        cpu_count: Option<u32>,
        memory_size: Option<String>,
        unit_count: Option<u32>,
        server_count: usize,
        connection_count: Option<u64>,
        qps: Option<f64>,
    },
    Server {
        server_id: String,
        ip: String,
        port: u16,
        sql_port: Option<u16>,
        connection_count: Option<u64>,
        qps: Option<f64>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyNode {
    pub id: String,
    pub kind: NodeKind,
    pub status: Option<String>,
    pub display_name: String,
    /// `None` for kinds that cannot collapse.
    pub collapsed: Option<bool>,
    pub children: Vec<TopologyNode>,
    pub metadata: NodeMetadata,
}

impl TopologyNode {
    pub fn is_collapsed(&self) -> bool {
        self.collapsed.unwrap_or(false)
    }

    pub fn find(&self, node_id: &str) -> Option<&TopologyNode> {
        if self.id == node_id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(node_id))
    }

    pub fn find_mut(&mut self, node_id: &str) -> Option<&mut TopologyNode> {
        if self.id == node_id {
            return Some(self);
        }
        self.children
            .iter_mut()
            .find_map(|child| child.find_mut(node_id))
    }

    /// Pre-order walk over the whole subtree, including collapsed parts.
    pub fn descendants(&self) -> Vec<&TopologyNode> {
        let mut nodes = Vec::new();
        collect_preorder(self, &mut nodes, false);
        nodes
    }

    /// Pre-order walk that stops below collapsed nodes.
    pub fn visible_nodes(&self) -> Vec<&TopologyNode> {
        let mut nodes = Vec::new();
        collect_preorder(self, &mut nodes, true);
        nodes
    }

    pub fn visible_node_ids(&self) -> Vec<String> {
        self.visible_nodes()
            .into_iter()
            .map(|node| node.id.clone())
            .collect()
    }

    pub fn count_kind(&self, kind: NodeKind) -> usize {
        self.descendants()
            .into_iter()
            .filter(|node| node.kind == kind)
            .count()
    }

    pub fn visit_mut(&mut self, visitor: &mut impl FnMut(&mut TopologyNode)) {
        visitor(self);
        for child in &mut self.children {
            child.visit_mut(visitor);
        }
    }
}

fn collect_preorder<'a>(
    node: &'a TopologyNode,
    nodes: &mut Vec<&'a TopologyNode>,
    stop_at_collapsed: bool,
) {
    nodes.push(node);
    if stop_at_collapsed && node.is_collapsed() {
        return;
    }
    for child in &node.children {
        collect_preorder(child, nodes, stop_at_collapsed);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeStyle {
    Solid,
    /// Root edges when several clusters share the view.
    Dashed,
    /// Root edge of a single-cluster view; drawn and then erased.
    HiddenOverlay,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyEdge {
    pub from: String,
    pub to: String,
    pub style: EdgeStyle,
}

/// A built tree plus the id of the cluster the view is centred on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyTree {
    pub root: TopologyNode,
    pub current_cluster_id: Option<String>,
}

impl TopologyTree {
    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty()
    }

    pub fn is_multi_cluster(&self) -> bool {
        self.root.children.len() > 1
    }

    pub fn find(&self, node_id: &str) -> Option<&TopologyNode> {
        self.root.find(node_id)
    }

    pub fn is_current_cluster(&self, node_id: &str) -> bool {
        self.current_cluster_id.as_deref() == Some(node_id)
    }

    /// Visible parent/child edges in render order.
    pub fn visible_edges(&self) -> Vec<TopologyEdge> {
        let mut edges = Vec::new();
        let root_style = if self.is_multi_cluster() {
            EdgeStyle::Dashed
        } else {
            EdgeStyle::HiddenOverlay
        };
        collect_edges(&self.root, root_style, &mut edges);
        edges
    }
}

fn collect_edges(node: &TopologyNode, root_style: EdgeStyle, edges: &mut Vec<TopologyEdge>) {
    if node.is_collapsed() {
        return;
    }
    for child in &node.children {
        let style = if node.kind == NodeKind::Root {
            root_style
        } else {
            EdgeStyle::Solid
        };
        edges.push(TopologyEdge {
            from: node.id.clone(),
            to: child.id.clone(),
            style,
        });
        collect_edges(child, root_style, edges);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopologyModelBuilder {
    auto_expand_threshold: usize,
}

impl Default for TopologyModelBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_AUTO_EXPAND_THRESHOLD)
    }
}

impl TopologyModelBuilder {
    pub fn new(auto_expand_threshold: usize) -> Self {
        Self {
            auto_expand_threshold,
        }
    }

    /// Builds a fresh tree. Falls back to the first cluster when the requested
    /// current cluster is missing so exactly one cluster is always current.
    pub fn build(
        &self,
        clusters: &[ClusterSnapshot],
        current_cluster_id: Option<&str>,
    ) -> TopologyTree {
        let current_cluster_id = current_cluster_id
            .filter(|id| clusters.iter().any(|cluster| cluster.id == *id))
            .map(str::to_owned)
            .or_else(|| clusters.first().map(|cluster| cluster.id.clone()));

        let current_server_count = current_cluster_id
            .as_deref()
            .and_then(|id| clusters.iter().find(|cluster| cluster.id == id))
            .map(ClusterSnapshot::server_count)
            .unwrap_or(0);
        let expand_only_first_zone = current_server_count > self.auto_expand_threshold;

        let children = clusters
            .iter()
            .map(|cluster| {
                let is_current = current_cluster_id.as_deref() == Some(cluster.id.as_str());
                build_cluster_node(
                    cluster,
                    is_current,
                    expand_only_first_zone,
                    self.auto_expand_threshold,
                )
            })
            .collect::<Vec<_>>();

        debug!(
            cluster_count = children.len(),
            current_server_count, expand_only_first_zone, "built topology tree"
        );

        TopologyTree {
            root: TopologyNode {
                id: ROOT_NODE_ID.to_owned(),
                kind: NodeKind::Root,
                status: None,
                display_name: String::new(),
                collapsed: None,
                children,
                metadata: NodeMetadata::Root,
            },
            current_cluster_id,
        }
    }
}

/// Over the threshold only the first zone opens, and only when that zone on
/// its own stays within the threshold.
fn build_cluster_node(
    cluster: &ClusterSnapshot,
    is_current: bool,
    expand_only_first_zone: bool,
    auto_expand_threshold: usize,
) -> TopologyNode {
    let scope = IdScope {
        cluster_id: &cluster.id,
        is_current,
    };
    let children = cluster
        .zones
        .iter()
        .enumerate()
        .map(|(index, zone)| {
            let collapsed =
                expand_only_first_zone && (index > 0 || zone.servers.len() > auto_expand_threshold);
            build_zone_node(zone, scope, collapsed)
        })
        .collect();

    TopologyNode {
        id: cluster.id.clone(),
        kind: NodeKind::Cluster,
        status: cluster.status.clone(),
        display_name: cluster.name.clone(),
        collapsed: Some(!is_current),
        children,
        metadata: NodeMetadata::Cluster {
            cluster_id: cluster.id.clone(),
            version: cluster.ob_version.clone(),
            role: cluster.role,
            auto_detect_enabled: cluster.auto_detect_enabled,
            tenant_count: cluster.tenants.len(),
        },
    }
}

fn build_zone_node(zone: &ZoneSnapshot, scope: IdScope<'_>, collapsed: bool) -> TopologyNode {
    TopologyNode {
        id: zone_node_id(scope, &zone.name),
        kind: NodeKind::Zone,
        status: zone.status.clone(),
        display_name: zone.name.clone(),
        collapsed: Some(collapsed),
        children: zone
            .servers
            .iter()
            .map(|server| build_server_node(server, scope))
            .collect(),
        metadata: NodeMetadata::Zone {
            region: zone.region_name.clone(),
            root_server: zone.root_server.clone(),
            cpu_count: zone.cpu_count,
            memory_size: zone.memory_size.clone(),
            unit_count: zone.unit_count,
            server_count: zone.servers.len(),
            connection_count: zone.connection_count,
            qps: zone.qps,
        },
    }
}

fn build_server_node(server: &ServerSnapshot, scope: IdScope<'_>) -> TopologyNode {
    TopologyNode {
        id: server_node_id(scope, &server.id),
        kind: NodeKind::Server,
        status: server.status.clone(),
        display_name: format!("{}:{}", server.ip, server.port),
        collapsed: None,
        children: Vec::new(),
        metadata: NodeMetadata::Server {
            server_id: server.id.clone(),
            ip: server.ip.clone(),
            port: server.port,
            sql_port: server.sql_port,
            connection_count: server.connection_count,
            qps: server.qps,
        },
    }
}

#[derive(Debug, Clone, Copy)]
struct IdScope<'a> {
    cluster_id: &'a str,
    is_current: bool,
}

/// Zones of the current cluster keep their bare name; zones of other clusters in
/// the same view are qualified by cluster id to stay globally unique.
fn zone_node_id(scope: IdScope<'_>, zone_name: &str) -> String {
    if scope.is_current {
        zone_name.to_owned()
    } else {
        format!("{}/{zone_name}", scope.cluster_id)
    }
}

fn server_node_id(scope: IdScope<'_>, server_id: &str) -> String {
    if scope.is_current {
        format!("server:{server_id}")
    } else {
        format!("server:{}/{server_id}", scope.cluster_id)
    }
}
