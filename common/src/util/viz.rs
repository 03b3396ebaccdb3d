use crate::db::items::{Board, ItemGeometry};
use crate::geom::layer::{B_CU, F_CU, Layer};
use crate::geom::point::Point;
use crate::geom::rect::Rect;
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};
use std::path::Path;

fn layer_color(layer: Layer) -> Rgba<u8> {
    match layer {
        F_CU => Rgba([255, 20, 80, 200]),
        B_CU => Rgba([0, 110, 255, 200]),
        Layer(n) if n % 2 == 1 => Rgba([0, 255, 100, 170]),
        Layer(_) => Rgba([255, 215, 0, 170]),
    }
}

fn item_bbox(geometry: &ItemGeometry) -> Rect {
    match geometry {
        ItemGeometry::Pad { center, size, .. } => {
            Rect::at_point(*center).inflate(size.x.max(size.y) * 0.5)
        }
        ItemGeometry::Track { start, end, width } => {
            Rect::from_points(&[*start, *end]).inflate(width * 0.5)
        }
        ItemGeometry::Arc { center, radius, width, .. } => {
            Rect::at_point(*center).inflate(radius + width * 0.5)
        }
        ItemGeometry::Via { center, diameter } => Rect::at_point(*center).inflate(diameter * 0.5),
        ItemGeometry::Zone { outline } => Rect::from_points(outline),
        ItemGeometry::Graphic(shape) => shape.bbox(),
    }
}

/// Debug rendering of the board copper plus ratsnest lines. Not a renderer;
/// a quick way to eyeball what the engine decided.
pub fn draw_board(
    board: &Board,
    ratsnest: &[(Point<f64>, Point<f64>)],
    filename: &str,
    size: u32,
) {
    let mut bounds: Option<Rect> = None;
    for (_, item) in board.items() {
        let bb = item_bbox(&item.geometry);
        bounds = Some(match bounds {
            Some(b) => b.merge(&bb),
            None => bb,
        });
    }
    let Some(bounds) = bounds else { return };
    let bounds = bounds.inflate(2.0);
    if bounds.width() <= 0.0 || bounds.height() <= 0.0 {
        return;
    }

    let mut img = RgbaImage::from_pixel(size, size, Rgba([20, 20, 20, 255]));
    let scale = (size as f64 / bounds.width()).min(size as f64 / bounds.height());
    let map = |p: Point<f64>| {
        (
            ((p.x - bounds.min.x) * scale) as f32,
            (size as f64 - (p.y - bounds.min.y) * scale) as f32,
        )
    };

    // Zones first so copper features stay visible on top of them.
    for (_, item) in board.items() {
        if let ItemGeometry::Zone { outline } = &item.geometry {
            let color = layer_color(item.layers.start);
            for i in 0..outline.len() {
                let a = map(outline[i]);
                let b = map(outline[(i + 1) % outline.len()]);
                draw_line_segment_mut(&mut img, a, b, color);
            }
        }
    }

    for (_, item) in board.items() {
        match &item.geometry {
            ItemGeometry::Track { start, end, .. } => {
                draw_line_segment_mut(
                    &mut img,
                    map(*start),
                    map(*end),
                    layer_color(item.layers.start),
                );
            }
            ItemGeometry::Pad { center, size: pad, .. } => {
                let (x, y) = map(*center);
                let r = ((pad.x.max(pad.y) * 0.5 * scale) as i32).max(2);
                let color = if item.layers.is_single() {
                    layer_color(item.layers.start)
                } else {
                    Rgba([220, 220, 220, 255])
                };
                draw_filled_circle_mut(&mut img, (x as i32, y as i32), r, color);
            }
            ItemGeometry::Via { center, diameter } => {
                let (x, y) = map(*center);
                let r = ((diameter * 0.5 * scale) as i32).max(1);
                draw_filled_circle_mut(&mut img, (x as i32, y as i32), r, Rgba([160, 160, 160, 255]));
            }
            _ => {}
        }
    }

    for (a, b) in ratsnest {
        draw_line_segment_mut(&mut img, map(*a), map(*b), Rgba([255, 255, 255, 120]));
    }

    let _ = img.save(Path::new(filename));
}
