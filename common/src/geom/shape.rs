use super::point::Point;
use super::rect::Rect;
use thiserror::Error;

// Two copper features closer than this are considered touching. Board
// coordinates are millimeters, so this is a tenth of a micron.
pub const TOUCH_TOLERANCE: f64 = 1e-4;

#[derive(Debug, Error)]
pub enum ShapeError {
    #[error("polygon outline is self-intersecting near ({0:.3}, {1:.3})")]
    SelfIntersecting(f64, f64),
}

/// The closed set of collision primitives board items normalize into.
/// Segments and circles carry their copper width, so collision tests work
/// on the real outline, not the centerline.
#[derive(Clone, Debug)]
pub enum CollisionShape {
    Point(Point<f64>),
    Segment {
        a: Point<f64>,
        b: Point<f64>,
        width: f64,
    },
    Circle {
        center: Point<f64>,
        radius: f64,
    },
    Polygon(Vec<Point<f64>>),
    Compound(Vec<CollisionShape>),
}

impl CollisionShape {
    pub fn bbox(&self) -> Rect {
        match self {
            CollisionShape::Point(p) => Rect::at_point(*p),
            CollisionShape::Segment { a, b, width } => {
                Rect::from_points(&[*a, *b]).inflate(width * 0.5)
            }
            CollisionShape::Circle { center, radius } => Rect::at_point(*center).inflate(*radius),
            CollisionShape::Polygon(pts) => Rect::from_points(pts),
            CollisionShape::Compound(parts) => {
                let mut bbox = parts
                    .first()
                    .map(|s| s.bbox())
                    .unwrap_or_else(|| Rect::at_point(Point::new(0.0, 0.0)));
                for part in parts.iter().skip(1) {
                    bbox = bbox.merge(&part.bbox());
                }
                bbox
            }
        }
    }

    /// True if the two shapes touch or intersect. Dispatch over the closed
    /// kind set; degenerate inputs (zero-length segment, zero-radius circle)
    /// fall out of the distance math as points.
    pub fn collides(&self, other: &CollisionShape) -> bool {
        use CollisionShape::*;
        match (self, other) {
            (Compound(parts), _) => parts.iter().any(|p| p.collides(other)),
            (_, Compound(parts)) => parts.iter().any(|p| self.collides(p)),

            (Point(p), Point(q)) => p.dist(q) <= TOUCH_TOLERANCE,
            (Point(p), Segment { a, b, width }) => {
                point_segment_dist(*p, *a, *b) <= width * 0.5 + TOUCH_TOLERANCE
            }
            (Point(p), Circle { center, radius }) => p.dist(center) <= radius + TOUCH_TOLERANCE,
            (Point(p), Polygon(pts)) => point_touches_polygon(*p, pts),

            (Segment { a, b, width }, Segment { a: c, b: d, width: w2 }) => {
                segment_segment_dist(*a, *b, *c, *d) <= (width + w2) * 0.5 + TOUCH_TOLERANCE
            }
            (Segment { a, b, width }, Circle { center, radius }) => {
                point_segment_dist(*center, *a, *b) <= radius + width * 0.5 + TOUCH_TOLERANCE
            }
            (Segment { a, b, width }, Polygon(pts)) => {
                segment_touches_polygon(*a, *b, *width, pts)
            }

            (Circle { center, radius }, Circle { center: c2, radius: r2 }) => {
                center.dist(c2) <= radius + r2 + TOUCH_TOLERANCE
            }
            (Circle { center, radius }, Polygon(pts)) => {
                circle_touches_polygon(*center, *radius, pts)
            }

            (Polygon(a), Polygon(b)) => polygons_touch(a, b),

            // Remaining combinations are mirror images; swapping the
            // arguments reaches a canonical arm.
            _ => other.collides(self),
        }
    }
}

pub fn orientation(p: Point<f64>, q: Point<f64>, r: Point<f64>) -> i32 {
    let val = (q.y - p.y) * (r.x - q.x) - (q.x - p.x) * (r.y - q.y);
    if val.abs() < TOUCH_TOLERANCE {
        return 0;
    }
    if val > 0.0 { 1 } else { 2 }
}

pub fn point_segment_dist(p: Point<f64>, a: Point<f64>, b: Point<f64>) -> f64 {
    let l2 = a.dist_sq(&b);
    if l2 == 0.0 {
        return p.dist(&a);
    }

    let t = ((p.x - a.x) * (b.x - a.x) + (p.y - a.y) * (b.y - a.y)) / l2;
    let t = t.clamp(0.0, 1.0);

    let proj = Point::new(a.x + t * (b.x - a.x), a.y + t * (b.y - a.y));
    p.dist(&proj)
}

pub fn segments_intersect(p1: Point<f64>, p2: Point<f64>, p3: Point<f64>, p4: Point<f64>) -> bool {
    let on_segment = |p: Point<f64>, a: Point<f64>, b: Point<f64>| {
        p.x >= a.x.min(b.x) - TOUCH_TOLERANCE
            && p.x <= a.x.max(b.x) + TOUCH_TOLERANCE
            && p.y >= a.y.min(b.y) - TOUCH_TOLERANCE
            && p.y <= a.y.max(b.y) + TOUCH_TOLERANCE
    };

    let o1 = orientation(p1, p2, p3);
    let o2 = orientation(p1, p2, p4);
    let o3 = orientation(p3, p4, p1);
    let o4 = orientation(p3, p4, p2);

    if o1 != o2 && o3 != o4 {
        return true;
    }

    (o1 == 0 && on_segment(p3, p1, p2))
        || (o2 == 0 && on_segment(p4, p1, p2))
        || (o3 == 0 && on_segment(p1, p3, p4))
        || (o4 == 0 && on_segment(p2, p3, p4))
}

pub fn segment_segment_dist(
    a1: Point<f64>,
    a2: Point<f64>,
    b1: Point<f64>,
    b2: Point<f64>,
) -> f64 {
    if segments_intersect(a1, a2, b1, b2) {
        return 0.0;
    }
    point_segment_dist(a1, b1, b2)
        .min(point_segment_dist(a2, b1, b2))
        .min(point_segment_dist(b1, a1, a2))
        .min(point_segment_dist(b2, a1, a2))
}

/// Ray-cast point-in-polygon. The boundary counts as inside.
pub fn point_in_polygon(p: Point<f64>, poly: &[Point<f64>]) -> bool {
    if poly.len() < 3 {
        return false;
    }

    for i in 0..poly.len() {
        let a = poly[i];
        let b = poly[(i + 1) % poly.len()];
        if point_segment_dist(p, a, b) <= TOUCH_TOLERANCE {
            return true;
        }
    }

    let mut inside = false;
    let mut j = poly.len() - 1;
    for i in 0..poly.len() {
        let (pi, pj) = (poly[i], poly[j]);
        if (pi.y > p.y) != (pj.y > p.y)
            && p.x < (pj.x - pi.x) * (p.y - pi.y) / (pj.y - pi.y) + pi.x
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

fn point_touches_polygon(p: Point<f64>, poly: &[Point<f64>]) -> bool {
    match poly.len() {
        0 => false,
        1 => p.dist(&poly[0]) <= TOUCH_TOLERANCE,
        2 => point_segment_dist(p, poly[0], poly[1]) <= TOUCH_TOLERANCE,
        _ => point_in_polygon(p, poly),
    }
}

fn segment_touches_polygon(a: Point<f64>, b: Point<f64>, width: f64, poly: &[Point<f64>]) -> bool {
    if poly.len() < 3 {
        return poly
            .iter()
            .any(|p| point_segment_dist(*p, a, b) <= width * 0.5 + TOUCH_TOLERANCE);
    }
    if point_in_polygon(a, poly) || point_in_polygon(b, poly) {
        return true;
    }
    for i in 0..poly.len() {
        let e1 = poly[i];
        let e2 = poly[(i + 1) % poly.len()];
        if segment_segment_dist(a, b, e1, e2) <= width * 0.5 + TOUCH_TOLERANCE {
            return true;
        }
    }
    false
}

fn circle_touches_polygon(center: Point<f64>, radius: f64, poly: &[Point<f64>]) -> bool {
    if poly.len() < 3 {
        return poly.iter().any(|p| p.dist(&center) <= radius + TOUCH_TOLERANCE);
    }
    if point_in_polygon(center, poly) {
        return true;
    }
    for i in 0..poly.len() {
        let a = poly[i];
        let b = poly[(i + 1) % poly.len()];
        if point_segment_dist(center, a, b) <= radius + TOUCH_TOLERANCE {
            return true;
        }
    }
    false
}

fn polygons_touch(a: &[Point<f64>], b: &[Point<f64>]) -> bool {
    if a.len() < 3 || b.len() < 3 {
        return false;
    }
    // Any vertex containment covers full enclosure; otherwise some pair of
    // edges must cross or touch.
    if a.iter().any(|p| point_in_polygon(*p, b)) || b.iter().any(|p| point_in_polygon(*p, a)) {
        return true;
    }
    for i in 0..a.len() {
        let a1 = a[i];
        let a2 = a[(i + 1) % a.len()];
        for j in 0..b.len() {
            let b1 = b[j];
            let b2 = b[(j + 1) % b.len()];
            if segments_intersect(a1, a2, b1, b2) {
                return true;
            }
        }
    }
    false
}

/// Reject outlines whose non-adjacent edges cross. The zone filler cannot
/// produce sane copper from these, so the connectivity layer marks the item
/// shape-invalid instead of guessing.
pub fn validate_outline(poly: &[Point<f64>]) -> Result<(), ShapeError> {
    let n = poly.len();
    if n < 4 {
        return Ok(());
    }
    for i in 0..n {
        let a1 = poly[i];
        let a2 = poly[(i + 1) % n];
        for j in i + 1..n {
            // Skip edges sharing a vertex with edge i.
            if j == i || (j + 1) % n == i || (i + 1) % n == j {
                continue;
            }
            let b1 = poly[j];
            let b2 = poly[(j + 1) % n];
            if segments_intersect(a1, a2, b1, b2) {
                return Err(ShapeError::SelfIntersecting(a2.x, a2.y));
            }
        }
    }
    Ok(())
}
