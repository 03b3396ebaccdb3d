use pcb_common::db::items::{BoardItem, ItemGeometry};
use pcb_common::geom::layer::LayerRange;
use pcb_common::geom::point::Point;
use pcb_common::geom::rect::Rect;
use pcb_common::geom::shape::{CollisionShape, TOUCH_TOLERANCE, validate_outline};

/// Normalized per-item collision data, cached by the engine. One record per
/// live item; rebuilt whenever the item's geometry or layer set changes.
/// A record with no shape is "shape invalid": the item stays indexed and
/// clustered as a singleton but is excluded from collision testing.
#[derive(Clone, Debug)]
pub struct ShapeRecord {
    pub layers: LayerRange,
    pub bbox: Rect,
    pub net_name: Option<String>,
    pub anchor: Option<Point<f64>>,
    shape: Option<CollisionShape>,
}

impl ShapeRecord {
    /// Deterministic and side-effect free on the source item.
    pub fn build(item: &BoardItem) -> Self {
        let shape = match &item.geometry {
            ItemGeometry::Pad { center, size, round } => Some(if *round {
                CollisionShape::Circle {
                    center: *center,
                    radius: size.x.min(size.y) * 0.5,
                }
            } else {
                let half = Point::new(size.x * 0.5, size.y * 0.5);
                CollisionShape::Polygon(vec![
                    Point::new(center.x - half.x, center.y - half.y),
                    Point::new(center.x + half.x, center.y - half.y),
                    Point::new(center.x + half.x, center.y + half.y),
                    Point::new(center.x - half.x, center.y + half.y),
                ])
            }),
            ItemGeometry::Track { start, end, width } => Some(CollisionShape::Segment {
                a: *start,
                b: *end,
                width: *width,
            }),
            ItemGeometry::Arc {
                center,
                radius,
                start_angle,
                end_angle,
                width,
            } => Some(arc_polyline(*center, *radius, *start_angle, *end_angle, *width)),
            ItemGeometry::Via { center, diameter } => Some(CollisionShape::Circle {
                center: *center,
                radius: diameter * 0.5,
            }),
            ItemGeometry::Zone { outline } => zone_shape(outline, item),
            ItemGeometry::Graphic(shape) => Some(shape.clone()),
        };

        let bbox = match &shape {
            Some(s) => s.bbox(),
            // Invalid zones still need a bounding volume so they stay
            // findable in the index until removed.
            None => match &item.geometry {
                ItemGeometry::Zone { outline } if !outline.is_empty() => {
                    Rect::from_points(outline)
                }
                _ => Rect::at_point(Point::new(0.0, 0.0)),
            },
        };

        Self {
            layers: item.layers,
            bbox,
            net_name: item.net_name.clone(),
            anchor: item.anchor(),
            shape,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.shape.is_some()
    }

    pub fn shape(&self) -> Option<&CollisionShape> {
        self.shape.as_ref()
    }

    /// True if the two items physically connect: layer ranges overlap and
    /// the collision shapes touch. Shape-invalid records never collide.
    pub fn collides_with(&self, other: &ShapeRecord) -> bool {
        let (Some(a), Some(b)) = (&self.shape, &other.shape) else {
            return false;
        };
        // The bbox prefilter carries the touch tolerance; shapes within
        // tolerance of each other can have strictly disjoint boxes.
        self.layers.overlaps(&other.layers)
            && self.bbox.inflate(TOUCH_TOLERANCE).overlaps(&other.bbox)
            && a.collides(b)
    }
}

fn zone_shape(outline: &[Point<f64>], item: &BoardItem) -> Option<CollisionShape> {
    match outline.len() {
        0 => None,
        1 => Some(CollisionShape::Point(outline[0])),
        2 => Some(CollisionShape::Segment {
            a: outline[0],
            b: outline[1],
            width: 0.0,
        }),
        _ => match validate_outline(outline) {
            Ok(()) => Some(CollisionShape::Polygon(outline.to_vec())),
            Err(e) => {
                log::warn!("zone on net {:?}: {}", item.net_name, e);
                None
            }
        },
    }
}

/// Arcs become a chain of stroked chords. Five-degree steps keep the chord
/// error well under the touch tolerance for board-scale radii.
fn arc_polyline(
    center: Point<f64>,
    radius: f64,
    start_angle: f64,
    end_angle: f64,
    width: f64,
) -> CollisionShape {
    let sweep = end_angle - start_angle;
    let steps = ((sweep.abs() / (std::f64::consts::PI / 36.0)).ceil() as usize).max(4);
    let step = sweep / steps as f64;

    let at = |angle: f64| {
        Point::new(
            center.x + radius * angle.cos(),
            center.y + radius * angle.sin(),
        )
    };

    let mut parts = Vec::with_capacity(steps);
    for i in 0..steps {
        let a = at(start_angle + step * i as f64);
        let b = at(start_angle + step * (i + 1) as f64);
        parts.push(CollisionShape::Segment { a, b, width });
    }
    CollisionShape::Compound(parts)
}
