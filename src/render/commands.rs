use serde::{Deserialize, Serialize};

use crate::layout::{Bounds, FitTransform, Point, Size};
use crate::menu::ActionKey;

pub const EDGE_LAYER: i32 = 10;
pub const EDGE_OVERLAY_LAYER: i32 = 11;
pub const NODE_BOX_LAYER: i32 = 20;
pub const NODE_CONTENT_LAYER: i32 = 21;
pub const NODE_AFFIX_LAYER: i32 = 22;
pub const TOOLTIP_LAYER: i32 = 100;
pub const MENU_LAYER: i32 = 110;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DrawStyle {
    pub fill_color: Option<String>,
    pub stroke_color: Option<String>,
    pub stroke_width_px: Option<f32>,
    pub text_color: Option<String>,
}

impl DrawStyle {
    pub fn filled(fill: &str, stroke: &str, stroke_width_px: f32) -> Self {
        Self {
            fill_color: Some(fill.to_owned()),
            stroke_color: Some(stroke.to_owned()),
            stroke_width_px: Some(stroke_width_px),
            text_color: None,
        }
    }

    pub fn stroke(color: &str, width_px: f32) -> Self {
        Self {
            stroke_color: Some(color.to_owned()),
            stroke_width_px: Some(width_px),
            ..Self::default()
        }
    }

    pub fn fill(color: &str) -> Self {
        Self {
            fill_color: Some(color.to_owned()),
            ..Self::default()
        }
    }

    pub fn text(color: &str) -> Self {
        Self {
            text_color: Some(color.to_owned()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DrawCommand {
    Rect {
        id: String,
        layer: i32,
        origin: Point,
        size: Size,
        corner_radius: f32,
        style: DrawStyle,
    },
    Icon {
        id: String,
        layer: i32,
        icon: String,
        center: Point,
        size: f32,
        style: DrawStyle,
    },
    Text {
        id: String,
        layer: i32,
        position: Point,
        text: String,
        font_size: f32,
        align: TextAlign,
        style: DrawStyle,
    },
    Circle {
        id: String,
        layer: i32,
        center: Point,
        radius: f32,
        style: DrawStyle,
    },
    Path {
        id: String,
        layer: i32,
        points: Vec<Point>,
        dashed: bool,
        style: DrawStyle,
    },
}

impl DrawCommand {
    pub fn id(&self) -> &str {
        match self {
            Self::Rect { id, .. }
            | Self::Icon { id, .. }
            | Self::Text { id, .. }
            | Self::Circle { id, .. }
            | Self::Path { id, .. } => id,
        }
    }

    pub fn layer(&self) -> i32 {
        match self {
            Self::Rect { layer, .. }
            | Self::Icon { layer, .. }
            | Self::Text { layer, .. }
            | Self::Circle { layer, .. }
            | Self::Path { layer, .. } => *layer,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HitTarget {
    NodeBox { node_id: String },
    MoreActions { node_id: String },
    CollapseToggle { node_id: String },
    MenuItem { node_id: String, key: ActionKey },
    MenuPanel { node_id: String },
}

impl HitTarget {
    pub fn node_id(&self) -> &str {
        match self {
            Self::NodeBox { node_id }
            | Self::MoreActions { node_id }
            | Self::CollapseToggle { node_id }
            | Self::MenuItem { node_id, .. }
            | Self::MenuPanel { node_id } => node_id,
        }
    }
}

/// Pointer-sensitive area in screen coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitRegion {
    pub target: HitTarget,
    pub bounds: Bounds,
}

/// Topmost region under `point`; later regions sit above earlier ones.
pub fn hit_test(regions: &[HitRegion], point: Point) -> Option<&HitTarget> {
    regions
        .iter()
        .rev()
        .find(|region| region.bounds.contains(point))
        .map(|region| &region.target)
}

/// Everything needed to paint one frame. `diagram` is in layout coordinates and
/// must be mapped through `transform`; `overlay` is already in screen space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawCommandBatch {
    pub sequence: u64,
    pub transform: FitTransform,
    pub background: String,
    pub diagram: Vec<DrawCommand>,
    pub overlay: Vec<DrawCommand>,
    pub hit_regions: Vec<HitRegion>,
}

impl DrawCommandBatch {
    pub fn find(&self, id: &str) -> Option<&DrawCommand> {
        self.diagram
            .iter()
            .chain(self.overlay.iter())
            .find(|command| command.id() == id)
    }

    pub fn ids_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.diagram
            .iter()
            .chain(self.overlay.iter())
            .map(DrawCommand::id)
            .filter(move |id| id.starts_with(prefix))
    }
}

#[cfg(test)]
mod tests {
    use crate::layout::{Bounds, Point};

    use super::{HitRegion, HitTarget, hit_test};

    #[test]
    fn hit_test_prefers_topmost_region() {
        let regions = vec![
            HitRegion {
                target: HitTarget::NodeBox {
                    node_id: "zone1".to_owned(),
                },
                bounds: Bounds {
                    min_x: 0.0,
                    min_y: 0.0,
                    max_x: 100.0,
                    max_y: 50.0,
                },
            },
            HitRegion {
                target: HitTarget::MoreActions {
                    node_id: "zone1".to_owned(),
                },
                bounds: Bounds {
                    min_x: 80.0,
                    min_y: 0.0,
                    max_x: 100.0,
                    max_y: 20.0,
                },
            },
        ];

        assert!(matches!(
            hit_test(&regions, Point::new(90.0, 10.0)),
            Some(HitTarget::MoreActions { .. })
        ));
        assert!(matches!(
            hit_test(&regions, Point::new(10.0, 10.0)),
            Some(HitTarget::NodeBox { .. })
        ));
        assert!(hit_test(&regions, Point::new(200.0, 10.0)).is_none());
    }
}
