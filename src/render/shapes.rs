//! Shape strategies keyed by node kind.
//!
//! Each strategy turns one laid-out node into primitives plus hit areas, both
//! in layout coordinates. The table is a plain value handed to the renderer.

use std::collections::BTreeMap;
use std::fmt;

use crate::layout::{Bounds, EdgePath, Point, Size};
use crate::topology::snapshot::ClusterRole;
use crate::topology::{EdgeStyle, NodeKind, NodeMetadata, TopologyNode};

use super::Theme;
use super::commands::{
    DrawCommand, DrawStyle, EDGE_LAYER, EDGE_OVERLAY_LAYER, HitTarget, NODE_AFFIX_LAYER,
    NODE_BOX_LAYER, NODE_CONTENT_LAYER, TextAlign,
};
use super::status::{ServerStatus, StatusAppearance, ZoneStatus, status_appearance};
use super::text::truncate_label;

const ICON_SIZE: f32 = 24.0;
const CONTENT_INSET: f32 = 42.0;
const AFFIX_RESERVE: f32 = 30.0;
const MORE_ACTIONS_GLYPH: &str = "⋯";
const MORE_ACTIONS_HIT_SIZE: f32 = 24.0;
const TOGGLE_STUB_LENGTH: f32 = 10.0;
const TOGGLE_RADIUS: f32 = 7.0;

pub struct ShapeContext<'a> {
    pub node: &'a TopologyNode,
    pub anchor: Point,
    pub theme: &'a Theme,
    pub is_current_cluster: bool,
    pub hovered: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShapeOutput {
    pub commands: Vec<DrawCommand>,
    pub hit_areas: Vec<(HitTarget, Bounds)>,
}

pub trait NodeShape: Send + Sync {
    fn box_size(&self) -> Size;
    fn draw(&self, ctx: &ShapeContext<'_>) -> ShapeOutput;
}

/// Layout anchor only; nothing is painted.
pub struct RootShape;

impl NodeShape for RootShape {
    fn box_size(&self) -> Size {
        Size::new(0.0, 0.0)
    }

    fn draw(&self, _ctx: &ShapeContext<'_>) -> ShapeOutput {
        ShapeOutput::default()
    }
}

pub struct ClusterShape;

impl NodeShape for ClusterShape {
    fn box_size(&self) -> Size {
        Size::new(240.0, 64.0)
    }

    fn draw(&self, ctx: &ShapeContext<'_>) -> ShapeOutput {
        let subtitle = match &ctx.node.metadata {
            NodeMetadata::Cluster { version, role, .. } => {
                let version = version
                    .as_deref()
                    .map(|value| format!("v{value}"))
                    .unwrap_or_else(|| "version unknown".to_owned());
                match role {
                    ClusterRole::Primary => Some(version),
                    ClusterRole::Standby => Some(format!("{version} · standby")),
                }
            }
            _ => None,
        };

        draw_card(
            ctx,
            CardSpec {
                size: self.box_size(),
                subtitle,
                appearance: status_appearance(NodeKind::Cluster, ctx.node.status.as_deref()),
                show_more_actions: true,
            },
        )
    }
}

pub struct ZoneShape;

impl NodeShape for ZoneShape {
    fn box_size(&self) -> Size {
        Size::new(200.0, 72.0)
    }

    fn draw(&self, ctx: &ShapeContext<'_>) -> ShapeOutput {
        let size = self.box_size();
        let subtitle = match &ctx.node.metadata {
            NodeMetadata::Zone { region, .. } => region.clone(),
            _ => None,
        };
        let mut output = draw_card(
            ctx,
            CardSpec {
                size,
                subtitle,
                appearance: ZoneStatus::parse(ctx.node.status.as_deref()).appearance(),
                show_more_actions: ZoneStatus::parse(ctx.node.status.as_deref()).is_operable(),
            },
        );

        if !ctx.node.children.is_empty() {
            draw_collapse_toggle(ctx, size, &mut output);
        }
        output
    }
}

pub struct ServerShape;

impl NodeShape for ServerShape {
    fn box_size(&self) -> Size {
        Size::new(190.0, 64.0)
    }

    fn draw(&self, ctx: &ShapeContext<'_>) -> ShapeOutput {
        let status = ServerStatus::parse(ctx.node.status.as_deref());
        draw_card(
            ctx,
            CardSpec {
                size: self.box_size(),
                subtitle: None,
                appearance: status.appearance(),
                show_more_actions: status.is_operable(),
            },
        )
    }
}

/// Draws the real connector and, for a suppressed root edge, an erasing copy in
/// the background color on top of it.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectorShape;

impl ConnectorShape {
    pub fn draw(&self, edge: &EdgePath, theme: &Theme) -> Vec<DrawCommand> {
        let id = format!("edge:{}->{}", edge.from, edge.to);
        let mut commands = vec![DrawCommand::Path {
            id: id.clone(),
            layer: EDGE_LAYER,
            points: edge.points.clone(),
            dashed: edge.style == EdgeStyle::Dashed,
            style: DrawStyle::stroke(&theme.edge_color, theme.edge_width_px),
        }];

        if edge.style == EdgeStyle::HiddenOverlay {
            commands.push(DrawCommand::Path {
                id: format!("{id}:overlay"),
                layer: EDGE_OVERLAY_LAYER,
                points: edge.points.clone(),
                dashed: false,
                style: DrawStyle::stroke(
                    &theme.background,
                    theme.edge_width_px + theme.overlay_extra_width_px,
                ),
            });
        }
        commands
    }
}

pub struct ShapeRegistry {
    shapes: BTreeMap<NodeKind, Box<dyn NodeShape>>,
    connector: ConnectorShape,
}

impl ShapeRegistry {
    pub fn empty() -> Self {
        Self {
            shapes: BTreeMap::new(),
            connector: ConnectorShape,
        }
    }

    pub fn standard() -> Self {
        Self::empty()
            .with_shape(NodeKind::Root, Box::new(RootShape))
            .with_shape(NodeKind::Cluster, Box::new(ClusterShape))
            .with_shape(NodeKind::Zone, Box::new(ZoneShape))
            .with_shape(NodeKind::Server, Box::new(ServerShape))
    }

    pub fn with_shape(mut self, kind: NodeKind, shape: Box<dyn NodeShape>) -> Self {
        self.shapes.insert(kind, shape);
        self
    }

    pub fn shape_for(&self, kind: NodeKind) -> Option<&dyn NodeShape> {
        self.shapes.get(&kind).map(|shape| shape.as_ref())
    }

    pub fn connector(&self) -> &ConnectorShape {
        &self.connector
    }
}

impl Default for ShapeRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Debug for ShapeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShapeRegistry")
            .field("kinds", &self.shapes.keys().collect::<Vec<_>>())
            .finish()
    }
}

struct CardSpec {
    size: Size,
    subtitle: Option<String>,
    appearance: StatusAppearance,
    show_more_actions: bool,
}

fn draw_card(ctx: &ShapeContext<'_>, spec: CardSpec) -> ShapeOutput {
    let theme = ctx.theme;
    let node = ctx.node;
    let origin = ctx
        .anchor
        .offset(-spec.size.width / 2.0, -spec.size.height / 2.0);
    let label_width = spec.size.width - CONTENT_INSET - AFFIX_RESERVE;
    let stroke_color = if ctx.is_current_cluster {
        &theme.accent_color
    } else if ctx.hovered {
        &theme.hover_stroke_color
    } else {
        &theme.node_stroke_color
    };
    let stroke_width = if ctx.is_current_cluster { 2.0 } else { 1.0 };

    let mut output = ShapeOutput::default();
    output.commands.push(DrawCommand::Rect {
        id: format!("node:{}:box", node.id),
        layer: NODE_BOX_LAYER,
        origin,
        size: spec.size,
        corner_radius: 6.0,
        style: DrawStyle::filled(&theme.node_fill_color, stroke_color, stroke_width),
    });
    output.commands.push(DrawCommand::Icon {
        id: format!("node:{}:icon", node.id),
        layer: NODE_CONTENT_LAYER,
        icon: spec.appearance.icon_key(node.kind),
        center: Point::new(origin.x + 22.0, ctx.anchor.y),
        size: ICON_SIZE,
        style: DrawStyle::fill(spec.appearance.badge_color()),
    });
    output.commands.push(DrawCommand::Text {
        id: format!("node:{}:name", node.id),
        layer: NODE_CONTENT_LAYER,
        position: Point::new(origin.x + CONTENT_INSET, origin.y + 18.0),
        text: truncate_label(&node.display_name, label_width, theme.label_char_width_px)
            .into_owned(),
        font_size: theme.title_font_size,
        align: TextAlign::Left,
        style: DrawStyle::text(&theme.text_color),
    });
    if let Some(subtitle) = &spec.subtitle {
        output.commands.push(DrawCommand::Text {
            id: format!("node:{}:subtitle", node.id),
            layer: NODE_CONTENT_LAYER,
            position: Point::new(origin.x + CONTENT_INSET, origin.y + 35.0),
            text: truncate_label(subtitle, label_width, theme.secondary_char_width_px)
                .into_owned(),
            font_size: theme.secondary_font_size,
            align: TextAlign::Left,
            style: DrawStyle::text(&theme.secondary_text_color),
        });
    }

    let badge_y = origin.y + spec.size.height - 12.0;
    output.commands.push(DrawCommand::Circle {
        id: format!("node:{}:badge", node.id),
        layer: NODE_CONTENT_LAYER,
        center: Point::new(origin.x + CONTENT_INSET + 4.0, badge_y),
        radius: 4.0,
        style: DrawStyle::fill(spec.appearance.badge_color()),
    });
    output.commands.push(DrawCommand::Text {
        id: format!("node:{}:status", node.id),
        layer: NODE_CONTENT_LAYER,
        position: Point::new(origin.x + CONTENT_INSET + 14.0, badge_y),
        text: spec.appearance.label.to_owned(),
        font_size: theme.secondary_font_size,
        align: TextAlign::Left,
        style: DrawStyle::text(&theme.secondary_text_color),
    });

    output.hit_areas.push((
        HitTarget::NodeBox {
            node_id: node.id.clone(),
        },
        Bounds {
            min_x: origin.x,
            min_y: origin.y,
            max_x: origin.x + spec.size.width,
            max_y: origin.y + spec.size.height,
        },
    ));

    if spec.show_more_actions {
        let center = Point::new(origin.x + spec.size.width - 16.0, origin.y + 16.0);
        output.commands.push(DrawCommand::Text {
            id: format!("node:{}:more", node.id),
            layer: NODE_AFFIX_LAYER,
            position: center,
            text: MORE_ACTIONS_GLYPH.to_owned(),
            font_size: 16.0,
            align: TextAlign::Center,
            style: DrawStyle::text(&theme.secondary_text_color),
        });
        let half = MORE_ACTIONS_HIT_SIZE / 2.0;
        output.hit_areas.push((
            HitTarget::MoreActions {
                node_id: node.id.clone(),
            },
            Bounds::around(center).inflate(half, half),
        ));
    }

    output
}

fn draw_collapse_toggle(ctx: &ShapeContext<'_>, size: Size, output: &mut ShapeOutput) {
    let theme = ctx.theme;
    let node = ctx.node;
    let stub_start = Point::new(ctx.anchor.x, ctx.anchor.y + size.height / 2.0);
    let stub_end = stub_start.offset(0.0, TOGGLE_STUB_LENGTH);
    let center = stub_end.offset(0.0, TOGGLE_RADIUS);

    output.commands.push(DrawCommand::Path {
        id: format!("node:{}:toggle-stub", node.id),
        layer: NODE_AFFIX_LAYER,
        points: vec![stub_start, stub_end],
        dashed: false,
        style: DrawStyle::stroke(&theme.edge_color, theme.edge_width_px),
    });
    output.commands.push(DrawCommand::Circle {
        id: format!("node:{}:toggle", node.id),
        layer: NODE_AFFIX_LAYER,
        center,
        radius: TOGGLE_RADIUS,
        style: DrawStyle::filled(&theme.node_fill_color, &theme.edge_color, 1.0),
    });
    output.commands.push(DrawCommand::Text {
        id: format!("node:{}:toggle-glyph", node.id),
        layer: NODE_AFFIX_LAYER,
        position: center,
        text: if node.is_collapsed() { "+" } else { "−" }.to_owned(),
        font_size: 12.0,
        align: TextAlign::Center,
        style: DrawStyle::text(&theme.text_color),
    });
    output.hit_areas.push((
        HitTarget::CollapseToggle {
            node_id: node.id.clone(),
        },
        Bounds::around(center).inflate(TOGGLE_RADIUS + 1.0, TOGGLE_RADIUS + 1.0),
    ));
}
