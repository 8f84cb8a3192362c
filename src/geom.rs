//! Shared geometry utilities on closed point rings.

use kurbo::Point;
use rstar::{RTreeObject, AABB};

/// Signed area of a closed ring via the shoelace formula.
///
/// In pixel space (y down) clockwise rings are positive.
pub fn signed_area(pts: &[Point]) -> f64 {
    let n = pts.len();
    if n < 3 {
        return 0.0;
    }
    let mut area = 0.0;
    for i in 0..n {
        let a = pts[i];
        let b = pts[(i + 1) % n];
        area += a.x * b.y - b.x * a.y;
    }
    area / 2.0
}

/// Length of a ring including its closing edge.
pub fn closed_perimeter(pts: &[Point]) -> f64 {
    let n = pts.len();
    if n < 2 {
        return 0.0;
    }
    (0..n).map(|i| pts[i].distance(pts[(i + 1) % n])).sum()
}

/// Distance from `p` to the segment `a`–`b`.
pub fn segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let ab = b - a;
    let len_sq = ab.hypot2();
    if len_sq < 1e-20 {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}

/// Even-odd point in ring test. Points on the boundary are unspecified.
pub fn point_in_ring(p: Point, pts: &[Point]) -> bool {
    let n = pts.len();
    let mut inside = false;
    let mut j = n.wrapping_sub(1);
    for i in 0..n {
        let a = pts[i];
        let b = pts[j];
        if (a.y > p.y) != (b.y > p.y) {
            let x = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
            if p.x < x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// True if segments `a`–`b` and `c`–`d` share any point.
pub fn segments_intersect(a: Point, b: Point, c: Point, d: Point) -> bool {
    let d1 = orient(c, d, a);
    let d2 = orient(c, d, b);
    let d3 = orient(a, b, c);
    let d4 = orient(a, b, d);

    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }
    (d1 == 0.0 && on_segment(c, d, a))
        || (d2 == 0.0 && on_segment(c, d, b))
        || (d3 == 0.0 && on_segment(a, b, c))
        || (d4 == 0.0 && on_segment(a, b, d))
}

/// True if `a`–`b` and `c`–`d` meet anywhere other than a single shared
/// endpoint. Segments chained end to end touch without conflicting unless
/// they run back over each other.
pub fn segments_conflict(a: Point, b: Point, c: Point, d: Point) -> bool {
    if !segments_intersect(a, b, c, d) {
        return false;
    }
    let (far_ab, far_cd) = match (a == c || a == d, b == c || b == d) {
        (false, false) | (true, true) => return true,
        (true, false) => (b, if a == c { d } else { c }),
        (false, true) => (a, if b == c { d } else { c }),
    };
    point_on_segment(far_ab, c, d) || point_on_segment(far_cd, a, b)
}

/// `p` lies on the closed segment `a`–`b`.
pub fn point_on_segment(p: Point, a: Point, b: Point) -> bool {
    orient(a, b, p) == 0.0 && on_segment(a, b, p)
}

/// Exact coordinate identity; `+ 0.0` folds -0.0 into 0.0.
pub fn point_key(p: Point) -> (u64, u64) {
    ((p.x + 0.0).to_bits(), (p.y + 0.0).to_bits())
}

/// Ring edge `idx` (from vertex `idx` to the next one) for an R-tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub ring: usize,
    pub idx: usize,
    pub a: Point,
    pub b: Point,
}

impl Segment {
    /// Every edge of a closed ring, closing edge included.
    pub fn ring_edges(ring: usize, pts: &[Point]) -> impl Iterator<Item = Segment> + '_ {
        let n = pts.len();
        (0..n).map(move |idx| Segment {
            ring,
            idx,
            a: pts[idx],
            b: pts[(idx + 1) % n],
        })
    }
}

impl RTreeObject for Segment {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners([self.a.x, self.a.y], [self.b.x, self.b.y])
    }
}

/// Bounding box of a point set, as an R-tree query envelope.
pub fn envelope_of(pts: &[Point]) -> AABB<[f64; 2]> {
    let corners: Vec<[f64; 2]> = pts.iter().map(|p| [p.x, p.y]).collect();
    AABB::from_points(&corners)
}

fn orient(a: Point, b: Point, c: Point) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// `p` is known to be collinear with `a`–`b`; check it lies within the span.
fn on_segment(a: Point, b: Point, p: Point) -> bool {
    p.x >= a.x.min(b.x) && p.x <= a.x.max(b.x) && p.y >= a.y.min(b.y) && p.y <= a.y.max(b.y)
}
