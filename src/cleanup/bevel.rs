//! Bevels at self-touching vertices.
//!
//! Traced rings may visit the same corner twice (a ring pinched at a
//! diagonal saddle), share a corner with another ring of the polygon, or
//! rest a vertex on another ring's edge. Topology consumers reject any such
//! contact, so every touching vertex is replaced by two points pulled back
//! along its incident edges, opening a small gap.

use kurbo::Point;
use rstar::{RTree, AABB};

use crate::geom::{point_on_segment, Segment};
use crate::mpoly::Mpoly;

/// Longest bevel, as a fraction of the incident edge.
///
/// Keeps the two bevels on a short edge from meeting or crossing.
const MAX_EDGE_FRACTION: f64 = 0.4;

/// Open every vertex that touches an edge other than its own two.
///
/// Each point moves at most `bevel` from its original location. Ring count,
/// hole flags and parents are untouched. `bevel <= 0` is a no-op.
pub fn bevel_self_intersections(mp: &Mpoly, bevel: f64) -> Mpoly {
    if bevel <= 0.0 {
        return mp.clone();
    }

    let index: RTree<Segment> = RTree::bulk_load(
        mp.rings
            .iter()
            .enumerate()
            .flat_map(|(idx, ring)| Segment::ring_edges(idx, &ring.pts))
            .collect(),
    );

    let mut num_beveled = 0usize;
    let rings = mp
        .rings
        .iter()
        .enumerate()
        .map(|(r, ring)| {
            let n = ring.pts.len();
            let mut out = Vec::with_capacity(n + 4);
            for i in 0..n {
                let p = ring.pts[i];
                if !touches(&index, r, i, n, p) {
                    out.push(p);
                    continue;
                }
                let prev = ring.pts[(i + n - 1) % n];
                let next = ring.pts[(i + 1) % n];
                out.push(toward(p, prev, bevel));
                out.push(toward(p, next, bevel));
                num_beveled += 1;
            }
            ring.with_points(out)
        })
        .collect();

    if num_beveled > 0 {
        log::debug!("beveled {} self-touching vertices", num_beveled);
    }
    Mpoly::new(rings)
}

/// Vertex `i` of ring `r` lies on an edge that does not end or start at it.
fn touches(index: &RTree<Segment>, r: usize, i: usize, n: usize, p: Point) -> bool {
    let own_prev = (i + n - 1) % n;
    index
        .locate_in_envelope_intersecting(&AABB::from_point([p.x, p.y]))
        .any(|s| !(s.ring == r && (s.idx == i || s.idx == own_prev)) && point_on_segment(p, s.a, s.b))
}

/// `p` moved toward `q` by the bevel size, capped by the edge length.
fn toward(p: Point, q: Point, bevel: f64) -> Point {
    let v = q - p;
    let len = v.hypot();
    if len == 0.0 {
        return p;
    }
    let step = bevel.min(len * MAX_EDGE_FRACTION);
    p + v * (step / len)
}
