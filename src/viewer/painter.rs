//! Applies a `DrawCommandBatch` to an egui painter.

use eframe::egui;

use crate::layout::{FitTransform, Point};
use crate::render::commands::{DrawCommand, DrawCommandBatch, DrawStyle, TextAlign};

const DASH_LENGTH: f32 = 6.0;
const DASH_GAP: f32 = 4.0;
const FALLBACK_COLOR: egui::Color32 = egui::Color32::from_rgb(140, 140, 140);

/// Maps batch coordinates onto the allocated canvas rect.
#[derive(Debug, Clone, Copy)]
struct Projection {
    transform: Option<FitTransform>,
    origin: egui::Pos2,
}

impl Projection {
    fn pos(&self, point: Point) -> egui::Pos2 {
        let point = match self.transform {
            Some(transform) => transform.apply(point),
            None => point,
        };
        egui::pos2(self.origin.x + point.x, self.origin.y + point.y)
    }

    fn len(&self, value: f32) -> f32 {
        match self.transform {
            Some(transform) => value * transform.scale,
            None => value,
        }
    }
}

pub fn paint_batch(painter: &egui::Painter, rect: egui::Rect, batch: &DrawCommandBatch) {
    let background = parse_hex_color(&batch.background).unwrap_or(egui::Color32::WHITE);
    painter.rect_filled(rect, 0.0, background);

    let diagram = Projection {
        transform: Some(batch.transform),
        origin: rect.min,
    };
    for command in &batch.diagram {
        paint_command(painter, diagram, command);
    }

    let overlay = Projection {
        transform: None,
        origin: rect.min,
    };
    for command in &batch.overlay {
        paint_command(painter, overlay, command);
    }
}

fn paint_command(painter: &egui::Painter, projection: Projection, command: &DrawCommand) {
    match command {
        DrawCommand::Rect {
            origin,
            size,
            corner_radius,
            style,
            ..
        } => {
            let min = projection.pos(*origin);
            let rect = egui::Rect::from_min_size(
                min,
                egui::vec2(projection.len(size.width), projection.len(size.height)),
            );
            let radius = projection.len(*corner_radius);
            if let Some(fill) = fill_color(style) {
                painter.rect_filled(rect, radius, fill);
            }
            if let Some(stroke) = stroke(style, projection) {
                painter.rect_stroke(rect, radius, stroke, egui::StrokeKind::Inside);
            }
        }
        DrawCommand::Icon {
            center,
            size,
            style,
            ..
        } => {
            let center = projection.pos(*center);
            let side = projection.len(*size);
            let rect = egui::Rect::from_center_size(center, egui::vec2(side, side));
            painter.rect_filled(rect, side / 4.0, fill_color(style).unwrap_or(FALLBACK_COLOR));
        }
        DrawCommand::Text {
            position,
            text,
            font_size,
            align,
            style,
            ..
        } => {
            let anchor = match align {
                TextAlign::Left => egui::Align2::LEFT_CENTER,
                TextAlign::Center => egui::Align2::CENTER_CENTER,
                TextAlign::Right => egui::Align2::RIGHT_CENTER,
            };
            let color = style
                .text_color
                .as_deref()
                .and_then(parse_hex_color)
                .unwrap_or(FALLBACK_COLOR);
            painter.text(
                projection.pos(*position),
                anchor,
                text,
                egui::FontId::proportional(projection.len(*font_size).max(1.0)),
                color,
            );
        }
        DrawCommand::Circle {
            center,
            radius,
            style,
            ..
        } => {
            let center = projection.pos(*center);
            let radius = projection.len(*radius);
            if let Some(fill) = fill_color(style) {
                painter.circle_filled(center, radius, fill);
            }
            if let Some(stroke) = stroke(style, projection) {
                painter.circle_stroke(center, radius, stroke);
            }
        }
        DrawCommand::Path {
            points,
            dashed,
            style,
            ..
        } => {
            let Some(stroke) = stroke(style, projection) else {
                return;
            };
            let points = points
                .iter()
                .map(|point| projection.pos(*point))
                .collect::<Vec<_>>();
            if *dashed {
                painter.extend(egui::Shape::dashed_line(
                    &points,
                    stroke,
                    projection.len(DASH_LENGTH),
                    projection.len(DASH_GAP),
                ));
            } else {
                painter.add(egui::Shape::line(points, stroke));
            }
        }
    }
}

fn fill_color(style: &DrawStyle) -> Option<egui::Color32> {
    style.fill_color.as_deref().and_then(parse_hex_color)
}

fn stroke(style: &DrawStyle, projection: Projection) -> Option<egui::Stroke> {
    let color = style.stroke_color.as_deref().and_then(parse_hex_color)?;
    let width = projection.len(style.stroke_width_px.unwrap_or(1.0)).max(0.5);
    Some(egui::Stroke::new(width, color))
}

/// Parses `#rgb`, `#rrggbb` and `#rrggbbaa`.
pub fn parse_hex_color(raw: &str) -> Option<egui::Color32> {
    let hex = raw.trim().strip_prefix('#')?;
    if !hex.is_ascii() {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();

    match hex.len() {
        3 => {
            let expand = |index: usize| channel(index..index + 1).map(|value| value * 17);
            Some(egui::Color32::from_rgb(expand(0)?, expand(1)?, expand(2)?))
        }
        6 => Some(egui::Color32::from_rgb(
            channel(0..2)?,
            channel(2..4)?,
            channel(4..6)?,
        )),
        8 => Some(egui::Color32::from_rgba_unmultiplied(
            channel(0..2)?,
            channel(2..4)?,
            channel(4..6)?,
            channel(6..8)?,
        )),
        _ => None,
    }
}
