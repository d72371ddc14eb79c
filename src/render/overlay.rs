//! Menu and tooltip overlays. Both are drawn in screen coordinates on top of
//! the diagram and positioned by pure functions of anchor and viewport.

use crate::layout::{Bounds, Point, Size, Viewport};
use crate::menu::MenuEntry;
use crate::topology::{NodeMetadata, TopologyNode};

use super::Theme;
use super::commands::{
    DrawCommand, DrawStyle, HitRegion, HitTarget, MENU_LAYER, TOOLTIP_LAYER, TextAlign,
};
use super::text::truncate_label;

pub const MENU_WIDTH: f32 = 180.0;
pub const MENU_ITEM_HEIGHT: f32 = 28.0;
pub const MENU_REASON_HEIGHT: f32 = 14.0;
pub const MENU_DIVIDER_HEIGHT: f32 = 9.0;
pub const MENU_PADDING: f32 = 4.0;
pub const TOOLTIP_OFFSET: Point = Point::new(12.0, 12.0);
const TOOLTIP_LINE_HEIGHT: f32 = 16.0;
const TOOLTIP_PADDING: f32 = 8.0;
const TEXT_INSET: f32 = 12.0;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct OverlayOutput {
    pub commands: Vec<DrawCommand>,
    pub hit_regions: Vec<HitRegion>,
}

pub fn menu_size(entries: &[MenuEntry]) -> Size {
    let height = entries.iter().map(entry_height).sum::<f32>() + 2.0 * MENU_PADDING;
    Size::new(MENU_WIDTH, height)
}

fn entry_height(entry: &MenuEntry) -> f32 {
    match entry {
        MenuEntry::Divider => MENU_DIVIDER_HEIGHT,
        MenuEntry::Item(item) if item.disabled_reason.is_some() => {
            MENU_ITEM_HEIGHT + MENU_REASON_HEIGHT
        }
        MenuEntry::Item(_) => MENU_ITEM_HEIGHT,
    }
}

/// Top-left corner for a panel of `size` opened at `anchor`. Opens down and to
/// the right, flips to the other side of the anchor on overflow and finally
/// clamps into the viewport.
pub fn place_overlay(anchor: Point, size: Size, viewport: Viewport) -> Point {
    let mut x = anchor.x;
    let mut y = anchor.y;
    if x + size.width > viewport.width {
        x = anchor.x - size.width;
    }
    if y + size.height > viewport.height {
        y = anchor.y - size.height;
    }
    let max_x = (viewport.width - size.width).max(0.0);
    let max_y = (viewport.height - size.height).max(0.0);
    Point::new(x.clamp(0.0, max_x), y.clamp(0.0, max_y))
}

pub fn render_menu(
    node_id: &str,
    entries: &[MenuEntry],
    anchor: Point,
    viewport: Viewport,
    theme: &Theme,
) -> OverlayOutput {
    let size = menu_size(entries);
    let origin = place_overlay(anchor, size, viewport);
    let mut output = OverlayOutput::default();

    output.commands.push(DrawCommand::Rect {
        id: "menu:panel".to_owned(),
        layer: MENU_LAYER,
        origin,
        size,
        corner_radius: 4.0,
        style: DrawStyle::filled(&theme.menu_fill_color, &theme.menu_stroke_color, 1.0),
    });
    output.hit_regions.push(HitRegion {
        target: HitTarget::MenuPanel {
            node_id: node_id.to_owned(),
        },
        bounds: bounds_of(origin, size),
    });

    let label_width = MENU_WIDTH - 2.0 * TEXT_INSET;
    let mut cursor = origin.y + MENU_PADDING;
    for (index, entry) in entries.iter().enumerate() {
        let height = entry_height(entry);
        match entry {
            MenuEntry::Divider => {
                let y = cursor + height / 2.0;
                output.commands.push(DrawCommand::Path {
                    id: format!("menu:{index}:divider"),
                    layer: MENU_LAYER,
                    points: vec![
                        Point::new(origin.x + MENU_PADDING, y),
                        Point::new(origin.x + MENU_WIDTH - MENU_PADDING, y),
                    ],
                    dashed: false,
                    style: DrawStyle::stroke(&theme.menu_divider_color, 1.0),
                });
            }
            MenuEntry::Item(item) => {
                let color = if item.enabled {
                    &theme.menu_text_color
                } else {
                    &theme.menu_disabled_text_color
                };
                output.commands.push(DrawCommand::Text {
                    id: format!("menu:{index}:{}", item.key.as_str()),
                    layer: MENU_LAYER,
                    position: Point::new(origin.x + TEXT_INSET, cursor + MENU_ITEM_HEIGHT / 2.0),
                    text: truncate_label(&item.label, label_width, theme.label_char_width_px)
                        .into_owned(),
                    font_size: theme.title_font_size,
                    align: TextAlign::Left,
                    style: DrawStyle::text(color),
                });
                if let Some(reason) = &item.disabled_reason {
                    output.commands.push(DrawCommand::Text {
                        id: format!("menu:{index}:reason"),
                        layer: MENU_LAYER,
                        position: Point::new(origin.x + TEXT_INSET, cursor + MENU_ITEM_HEIGHT),
                        text: truncate_label(reason, label_width, theme.secondary_char_width_px)
                            .into_owned(),
                        font_size: theme.secondary_font_size,
                        align: TextAlign::Left,
                        style: DrawStyle::text(&theme.menu_disabled_text_color),
                    });
                }
                if item.enabled {
                    output.hit_regions.push(HitRegion {
                        target: HitTarget::MenuItem {
                            node_id: node_id.to_owned(),
                            key: item.key,
                        },
                        bounds: bounds_of(
                            Point::new(origin.x, cursor),
                            Size::new(MENU_WIDTH, height),
                        ),
                    });
                }
            }
        }
        cursor += height;
    }

    output
}

/// Live metrics for the hover tooltip. Clusters and the root have none.
pub fn tooltip_lines(node: &TopologyNode) -> Vec<String> {
    match &node.metadata {
        NodeMetadata::Zone {
            connection_count,
            qps,
            ..
        } => vec![
            format!("Connections: {}", format_count(*connection_count)),
            format!("QPS: {}", format_rate(*qps)),
        ],
        NodeMetadata::Server {
            port,
            connection_count,
            qps,
            ..
        } => vec![
            format!("Connections: {}", format_count(*connection_count)),
            format!("QPS: {}", format_rate(*qps)),
            format!("Port: {port}"),
        ],
        NodeMetadata::Root | NodeMetadata::Cluster { .. } => Vec::new(),
    }
}

pub fn render_tooltip(
    lines: &[String],
    pointer: Point,
    viewport: Viewport,
    theme: &Theme,
) -> Vec<DrawCommand> {
    if lines.is_empty() {
        return Vec::new();
    }

    let longest = lines
        .iter()
        .map(|line| line.chars().count())
        .max()
        .unwrap_or(0) as f32;
    let size = Size::new(
        longest * theme.secondary_char_width_px + 2.0 * TOOLTIP_PADDING,
        lines.len() as f32 * TOOLTIP_LINE_HEIGHT + 2.0 * TOOLTIP_PADDING,
    );
    let origin = place_overlay(
        pointer.offset(TOOLTIP_OFFSET.x, TOOLTIP_OFFSET.y),
        size,
        viewport,
    );

    let mut commands = vec![DrawCommand::Rect {
        id: "tooltip:panel".to_owned(),
        layer: TOOLTIP_LAYER,
        origin,
        size,
        corner_radius: 4.0,
        style: DrawStyle::fill(&theme.tooltip_fill_color),
    }];
    for (index, line) in lines.iter().enumerate() {
        commands.push(DrawCommand::Text {
            id: format!("tooltip:{index}"),
            layer: TOOLTIP_LAYER,
            position: Point::new(
                origin.x + TOOLTIP_PADDING,
                origin.y + TOOLTIP_PADDING + (index as f32 + 0.5) * TOOLTIP_LINE_HEIGHT,
            ),
            text: line.clone(),
            font_size: theme.secondary_font_size,
            align: TextAlign::Left,
            style: DrawStyle::text(&theme.tooltip_text_color),
        });
    }
    commands
}

fn bounds_of(origin: Point, size: Size) -> Bounds {
    Bounds {
        min_x: origin.x,
        min_y: origin.y,
        max_x: origin.x + size.width,
        max_y: origin.y + size.height,
    }
}

fn format_count(value: Option<u64>) -> String {
    value.map_or_else(|| "-".to_owned(), |value| value.to_string())
}

fn format_rate(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_owned(), |value| format!("{value:.1}"))
}
