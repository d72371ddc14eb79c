//! Top-to-bottom compact tree layout.
//!
//! Every node gets the same small nominal footprint; the drawn box is centred on
//! the computed anchor by the renderer, so per-kind shape sizes never feed back
//! into placement.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::topology::{EdgeStyle, NodeKind, ROOT_NODE_ID, TopologyNode, TopologyTree};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: f32, dy: f32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl Bounds {
    pub fn around(point: Point) -> Self {
        Self {
            min_x: point.x,
            min_y: point.y,
            max_x: point.x,
            max_y: point.y,
        }
    }

    pub fn include(&mut self, point: Point) {
        self.min_x = self.min_x.min(point.x);
        self.min_y = self.min_y.min(point.y);
        self.max_x = self.max_x.max(point.x);
        self.max_y = self.max_y.max(point.y);
    }

    pub fn inflate(self, dx: f32, dy: f32) -> Self {
        Self {
            min_x: self.min_x - dx,
            min_y: self.min_y - dy,
            max_x: self.max_x + dx,
            max_y: self.max_y + dy,
        }
    }

    pub fn width(&self) -> f32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f32 {
        self.max_y - self.min_y
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.min_x
            && point.x <= self.max_x
            && point.y >= self.min_y
            && point.y <= self.max_y
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1200.0,
            height: 800.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Placeholder footprint every node occupies during placement.
    pub nominal_node: Size,
    pub horizontal_gap: f32,
    pub vertical_gap: f32,
    /// Half extent of the largest drawn box; only used when fitting.
    pub drawn_half_extent: Size,
    pub fit_padding: f32,
    pub multi_cluster_top_padding: f32,
    pub single_cluster_top_padding: f32,
    pub max_zoom: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            nominal_node: Size::new(16.0, 16.0),
            horizontal_gap: 230.0,
            vertical_gap: 100.0,
            drawn_half_extent: Size::new(125.0, 60.0),
            fit_padding: 20.0,
            multi_cluster_top_padding: 20.0,
            single_cluster_top_padding: 60.0,
            max_zoom: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodePosition {
    pub id: String,
    pub kind: NodeKind,
    pub anchor: Point,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgePath {
    pub from: String,
    pub to: String,
    pub style: EdgeStyle,
    pub points: Vec<Point>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyLayout {
    /// Visible nodes in pre-order.
    pub nodes: Vec<NodePosition>,
    pub edges: Vec<EdgePath>,
    /// Extent of the drawn content used for fitting.
    pub content_bounds: Bounds,
    pub multi_cluster: bool,
}

impl TopologyLayout {
    pub fn anchor_of(&self, node_id: &str) -> Option<Point> {
        self.nodes
            .iter()
            .find(|node| node.id == node_id)
            .map(|node| node.anchor)
    }

    pub fn count_kind(&self, kind: NodeKind) -> usize {
        self.nodes.iter().filter(|node| node.kind == kind).count()
    }
}

/// Scale + pan that maps layout coordinates onto the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitTransform {
    pub scale: f32,
    pub translate: Point,
}

impl Default for FitTransform {
    fn default() -> Self {
        Self {
            scale: 1.0,
            translate: Point::default(),
        }
    }
}

impl FitTransform {
    pub fn apply(&self, point: Point) -> Point {
        Point::new(
            point.x * self.scale + self.translate.x,
            point.y * self.scale + self.translate.y,
        )
    }

    pub fn invert(&self, point: Point) -> Point {
        Point::new(
            (point.x - self.translate.x) / self.scale,
            (point.y - self.translate.y) / self.scale,
        )
    }
}

pub fn compute_layout(tree: &TopologyTree, config: &LayoutConfig) -> TopologyLayout {
    let mut nodes = Vec::new();
    let root_width = subtree_width(&tree.root, config);
    place_subtree(&tree.root, -root_width / 2.0, 0, config, &mut nodes);

    let mut edges = Vec::new();
    for edge in tree.visible_edges() {
        let (Some(from), Some(to)) = (anchor_in(&nodes, &edge.from), anchor_in(&nodes, &edge.to))
        else {
            continue;
        };
        edges.push(EdgePath {
            points: elbow_path(from, to, config),
            from: edge.from,
            to: edge.to,
            style: edge.style,
        });
    }

    let multi_cluster = tree.is_multi_cluster();
    let content_bounds = content_bounds(&nodes, multi_cluster, config);

    debug!(
        node_count = nodes.len(),
        edge_count = edges.len(),
        multi_cluster,
        "computed topology layout"
    );

    TopologyLayout {
        nodes,
        edges,
        content_bounds,
        multi_cluster,
    }
}

fn subtree_width(node: &TopologyNode, config: &LayoutConfig) -> f32 {
    let own = config.nominal_node.width;
    if node.is_collapsed() || node.children.is_empty() {
        return own;
    }

    let children = node
        .children
        .iter()
        .map(|child| subtree_width(child, config))
        .sum::<f32>()
        + config.horizontal_gap * (node.children.len() - 1) as f32;
    children.max(own)
}

fn place_subtree(
    node: &TopologyNode,
    left: f32,
    depth: usize,
    config: &LayoutConfig,
    nodes: &mut Vec<NodePosition>,
) {
    let width = subtree_width(node, config);
    let level_height = config.nominal_node.height + config.vertical_gap;
    nodes.push(NodePosition {
        id: node.id.clone(),
        kind: node.kind,
        anchor: Point::new(left + width / 2.0, depth as f32 * level_height),
    });

    if node.is_collapsed() || node.children.is_empty() {
        return;
    }

    let children_width = node
        .children
        .iter()
        .map(|child| subtree_width(child, config))
        .sum::<f32>()
        + config.horizontal_gap * (node.children.len() - 1) as f32;
    let mut cursor = left + (width - children_width) / 2.0;
    for child in &node.children {
        place_subtree(child, cursor, depth + 1, config, nodes);
        cursor += subtree_width(child, config) + config.horizontal_gap;
    }
}

fn anchor_in(nodes: &[NodePosition], node_id: &str) -> Option<Point> {
    nodes
        .iter()
        .find(|node| node.id == node_id)
        .map(|node| node.anchor)
}

/// Vertical, horizontal, vertical: parent bottom anchor to child top anchor.
fn elbow_path(parent: Point, child: Point, config: &LayoutConfig) -> Vec<Point> {
    let half_height = config.nominal_node.height / 2.0;
    let start = parent.offset(0.0, half_height);
    let end = child.offset(0.0, -half_height);
    let mid_y = (start.y + end.y) / 2.0;
    vec![
        start,
        Point::new(start.x, mid_y),
        Point::new(end.x, mid_y),
        end,
    ]
}

fn content_bounds(nodes: &[NodePosition], multi_cluster: bool, config: &LayoutConfig) -> Bounds {
    // The root draws nothing; a single-cluster view leaves its row out.
    let mut visible = nodes
        .iter()
        .filter(|node| multi_cluster || node.id != ROOT_NODE_ID)
        .map(|node| node.anchor);
    let Some(first) = visible.next().or_else(|| nodes.first().map(|node| node.anchor)) else {
        return Bounds::around(Point::default());
    };

    let mut bounds = Bounds::around(first);
    for anchor in visible {
        bounds.include(anchor);
    }
    bounds.inflate(config.drawn_half_extent.width, config.drawn_half_extent.height)
}

pub fn fit_to_viewport(
    layout: &TopologyLayout,
    viewport: Viewport,
    config: &LayoutConfig,
) -> FitTransform {
    let top_padding = if layout.multi_cluster {
        config.multi_cluster_top_padding
    } else {
        config.single_cluster_top_padding
    };
    let bounds = layout.content_bounds;
    let content_width = bounds.width().max(1.0);
    let content_height = bounds.height().max(1.0);
    let available_width = (viewport.width - 2.0 * config.fit_padding).max(1.0);
    let available_height = (viewport.height - top_padding - config.fit_padding).max(1.0);

    let scale = (available_width / content_width)
        .min(available_height / content_height)
        .min(config.max_zoom);

    let translate_x =
        config.fit_padding + (available_width - content_width * scale) / 2.0 - bounds.min_x * scale;
    let translate_y = top_padding - bounds.min_y * scale;

    FitTransform {
        scale,
        translate: Point::new(translate_x, translate_y),
    }
}
