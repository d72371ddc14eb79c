//! Pure rendering: `(tree, layout, view state) -> DrawCommandBatch`.
//!
//! Nothing here holds a drawing surface. The viewer and the headless API apply
//! batches to whatever surface they own.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::interaction::state::ViewState;
use crate::layout::{Bounds, FitTransform, Point, TopologyLayout};
use crate::menu;
use crate::topology::TopologyTree;

pub mod commands;
pub mod overlay;
pub mod shapes;
pub mod status;
pub mod text;

use self::commands::{DrawCommand, DrawCommandBatch, HitRegion};
use self::shapes::{ShapeContext, ShapeRegistry};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Theme {
    pub background: String,
    pub node_fill_color: String,
    pub node_stroke_color: String,
    pub accent_color: String,
    pub hover_stroke_color: String,
    pub text_color: String,
    pub secondary_text_color: String,
    pub edge_color: String,
    pub menu_fill_color: String,
    pub menu_stroke_color: String,
    pub menu_text_color: String,
    pub menu_disabled_text_color: String,
    pub menu_divider_color: String,
    pub tooltip_fill_color: String,
    pub tooltip_text_color: String,
    pub edge_width_px: f32,
    /// Extra width of the erasing path over a suppressed root edge.
    pub overlay_extra_width_px: f32,
    pub title_font_size: f32,
    pub secondary_font_size: f32,
    pub label_char_width_px: f32,
    pub secondary_char_width_px: f32,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            background: "#ffffff".to_owned(),
            node_fill_color: "#ffffff".to_owned(),
            node_stroke_color: "#d9d9d9".to_owned(),
            accent_color: "#1677ff".to_owned(),
            hover_stroke_color: "#69b1ff".to_owned(),
            text_color: "#262626".to_owned(),
            secondary_text_color: "#8c8c8c".to_owned(),
            edge_color: "#bfbfbf".to_owned(),
            menu_fill_color: "#ffffff".to_owned(),
            menu_stroke_color: "#e8e8e8".to_owned(),
            menu_text_color: "#262626".to_owned(),
            menu_disabled_text_color: "#bfbfbf".to_owned(),
            menu_divider_color: "#f0f0f0".to_owned(),
            tooltip_fill_color: "#262626".to_owned(),
            tooltip_text_color: "#ffffff".to_owned(),
            edge_width_px: 1.5,
            overlay_extra_width_px: 2.0,
            title_font_size: 13.0,
            secondary_font_size: 11.0,
            label_char_width_px: 7.0,
            secondary_char_width_px: 6.0,
        }
    }
}

pub struct RenderInput<'a> {
    pub tree: &'a TopologyTree,
    pub layout: &'a TopologyLayout,
    pub transform: FitTransform,
    pub view: &'a ViewState,
    pub sequence: u64,
}

#[derive(Debug, Default)]
pub struct TopologyRenderer {
    theme: Theme,
    shapes: ShapeRegistry,
}

impl TopologyRenderer {
    pub fn new(theme: Theme, shapes: ShapeRegistry) -> Self {
        Self { theme, shapes }
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    pub fn render(&self, input: RenderInput<'_>) -> DrawCommandBatch {
        let RenderInput {
            tree,
            layout,
            transform,
            view,
            sequence,
        } = input;

        let mut diagram = Vec::new();
        for edge in &layout.edges {
            diagram.extend(self.shapes.connector().draw(edge, &self.theme));
        }

        let mut hit_regions = Vec::new();
        let hovered = view.hovered_node_id();
        for position in &layout.nodes {
            let (Some(node), Some(shape)) = (
                tree.find(&position.id),
                self.shapes.shape_for(position.kind),
            ) else {
                continue;
            };
            let output = shape.draw(&ShapeContext {
                node,
                anchor: position.anchor,
                theme: &self.theme,
                is_current_cluster: tree.is_current_cluster(&node.id),
                hovered: hovered == Some(node.id.as_str()),
            });
            diagram.extend(output.commands);
            hit_regions.extend(output.hit_areas.into_iter().map(|(target, bounds)| HitRegion {
                target,
                bounds: to_screen(&transform, bounds),
            }));
        }
        // Stable sort keeps insertion order inside a layer.
        diagram.sort_by_key(DrawCommand::layer);

        let mut overlay = Vec::new();
        if let Some((node_id, anchor)) = view.open_menu()
            && let Some(node) = tree.find(node_id)
        {
            let entries = menu::resolve(node, tree.is_current_cluster(node_id));
            let rendered =
                overlay::render_menu(node_id, &entries, anchor, view.viewport, &self.theme);
            overlay.extend(rendered.commands);
            hit_regions.extend(rendered.hit_regions);
        } else if let Some(anchor) = view.tooltip_anchor()
            && let Some(node) = view.hovered_node_id().and_then(|id| tree.find(id))
        {
            let lines = overlay::tooltip_lines(node);
            overlay.extend(overlay::render_tooltip(
                &lines,
                anchor,
                view.viewport,
                &self.theme,
            ));
        }

        debug!(
            sequence,
            diagram_commands = diagram.len(),
            overlay_commands = overlay.len(),
            hit_regions = hit_regions.len(),
            "rendered topology batch"
        );

        DrawCommandBatch {
            sequence,
            transform,
            background: self.theme.background.clone(),
            diagram,
            overlay,
            hit_regions,
        }
    }
}

fn to_screen(transform: &FitTransform, bounds: Bounds) -> Bounds {
    let top_left = transform.apply(Point::new(bounds.min_x, bounds.min_y));
    let bottom_right = transform.apply(Point::new(bounds.max_x, bounds.max_y));
    Bounds {
        min_x: top_left.x,
        min_y: top_left.y,
        max_x: bottom_right.x,
        max_y: bottom_right.y,
    }
}

#[cfg(test)]
mod tests {
    use crate::interaction::state::{InteractionMode, ViewState};
    use crate::layout::{LayoutConfig, Point, Viewport, compute_layout, fit_to_viewport};
    use crate::render::commands::{DrawCommand, DrawCommandBatch, HitTarget};
    use crate::test_support::{cluster_fixture, standby_fixture};
    use crate::topology::{TopologyModelBuilder, TopologyTree};

    use super::{RenderInput, TopologyRenderer};

    #[test]
    fn root_draws_nothing_but_cluster_and_children_do() {
        let tree = TopologyModelBuilder::default().build(&[cluster_fixture("c1", &[2])], None);
        let batch = render(&tree, &ViewState::default());

        assert_eq!(batch.ids_with_prefix("node:root").count(), 0);
        assert!(batch.find("node:c1:box").is_some());
        assert!(batch.find("node:zone1:box").is_some());
        assert!(batch.find("node:server:c1-z1-s2:box").is_some());
    }

    #[test]
    fn single_cluster_root_edge_is_erased_and_pair_root_edges_are_dashed() {
        let single = TopologyModelBuilder::default().build(&[cluster_fixture("c1", &[1])], None);
        let batch = render(&single, &ViewState::default());
        assert!(batch.find("edge:root->c1:overlay").is_some());

        let pair = TopologyModelBuilder::default().build(
            &[cluster_fixture("c1", &[1]), standby_fixture("c2", &[1])],
            Some("c1"),
        );
        let batch = render(&pair, &ViewState::default());
        assert_eq!(batch.ids_with_prefix("edge:root->").count(), 2);
        assert!(matches!(
            batch.find("edge:root->c2"),
            Some(DrawCommand::Path { dashed: true, .. })
        ));
    }

    #[test]
    fn diagram_commands_are_ordered_by_layer() {
        let tree = TopologyModelBuilder::default().build(&[cluster_fixture("c1", &[3, 2])], None);
        let batch = render(&tree, &ViewState::default());

        let layers = batch.diagram.iter().map(DrawCommand::layer).collect::<Vec<_>>();
        assert!(layers.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn open_menu_is_rendered_and_suppresses_tooltip() {
        let tree = TopologyModelBuilder::default().build(&[cluster_fixture("c1", &[2])], None);
        let mut view = ViewState::default();
        view.pointer = Some(Point::new(300.0, 300.0));
        view.mode = InteractionMode::MenuOpen {
            node_id: "zone1".to_owned(),
            anchor: Point::new(300.0, 300.0),
        };

        let batch = render(&tree, &view);
        assert!(batch.find("menu:panel").is_some());
        assert!(batch.find("tooltip:panel").is_none());
        assert!(matches!(
            batch.hit_regions.last().map(|region| &region.target),
            Some(HitTarget::MenuItem { .. })
        ));
    }

    #[test]
    fn hovering_a_zone_shows_its_tooltip() {
        let tree = TopologyModelBuilder::default().build(&[cluster_fixture("c1", &[2])], None);
        let mut view = ViewState::default();
        view.pointer = Some(Point::new(40.0, 40.0));
        view.mode = InteractionMode::Hovering {
            node_id: "zone1".to_owned(),
        };

        let batch = render(&tree, &view);
        assert!(batch.find("tooltip:panel").is_some());
        assert!(batch.find("menu:panel").is_none());
    }

    #[test]
    fn node_hit_regions_are_in_screen_space() {
        let tree = TopologyModelBuilder::default().build(&[cluster_fixture("c1", &[2])], None);
        let batch = render(&tree, &ViewState::default());
        let viewport = Viewport::default();

        for region in &batch.hit_regions {
            assert!(region.bounds.min_x >= -0.01, "{region:?}");
            assert!(region.bounds.max_x <= viewport.width + 0.01, "{region:?}");
        }
    }

    fn render(tree: &TopologyTree, view: &ViewState) -> DrawCommandBatch {
        let config = LayoutConfig::default();
        let layout = compute_layout(tree, &config);
        let transform = fit_to_viewport(&layout, view.viewport, &config);
        TopologyRenderer::default().render(RenderInput {
            tree,
            layout: &layout,
            transform,
            view,
            sequence: 1,
        })
    }
}
