//! Douglas-Peucker point reduction for closed rings.
//!
//! Reduction is `geo`'s RDP, run over each ring closed on vertex 0 so the
//! closing edge takes part in the distance tests like any other edge.
//! Every reduced ring is checked against the rest of the polygon before it
//! is accepted: a chord that crosses or touches another segment, or that
//! would move part of another ring to its other side, is split at its
//! farthest vertex and the ring is reduced again. Vertices shared between
//! rings keep their neighbours, so the corners the beveler opens keep
//! their original edges.

use std::collections::HashMap;

use geo::{Coord, LineString, SimplifyIdx};
use kurbo::Point;
use rayon::prelude::*;
use rstar::RTree;

use crate::geom::{
    envelope_of, point_in_ring, point_key, segment_distance, segments_conflict, Segment,
};
use crate::mpoly::Mpoly;

/// Simplify every ring. `tolerance <= 0` returns the polygon unchanged.
///
/// First reductions run in parallel; the topology checks then walk the
/// rings in order, each against the already accepted state of the others.
/// Ring order, hole flags and parents are untouched, and a ring that would
/// end up with fewer than three vertices keeps its original points.
pub fn simplify(mp: &Mpoly, tolerance: f64) -> Mpoly {
    if tolerance <= 0.0 {
        return mp.clone();
    }

    let mut pins = pinned_vertices(mp);
    let first_pass: Vec<Vec<usize>> = mp
        .rings
        .par_iter()
        .zip(pins.par_iter())
        .map(|(ring, pinned)| reduce(&ring.pts, pinned, tolerance))
        .collect();

    let mut index: RTree<Segment> = RTree::bulk_load(
        mp.rings
            .iter()
            .enumerate()
            .flat_map(|(idx, ring)| Segment::ring_edges(idx, &ring.pts))
            .collect(),
    );

    let mut num_split = 0usize;
    let mut rings = Vec::with_capacity(mp.rings.len());
    for ((idx, ring), mut kept) in mp.rings.iter().enumerate().zip(first_pass) {
        let pts = &ring.pts;
        loop {
            if kept.len() < 3 {
                kept = (0..pts.len()).collect();
            }
            if kept.len() == pts.len() {
                break;
            }
            let bad = bad_chords(&index, idx, pts, &kept);
            if bad.is_empty() {
                break;
            }
            for &k in &bad {
                let v = farthest_in_run(pts, kept[k], kept[(k + 1) % kept.len()]);
                pins[idx][v] = true;
            }
            num_split += bad.len();
            kept = reduce(pts, &pins[idx], tolerance);
        }

        let reduced: Vec<Point> = kept.iter().map(|&i| pts[i]).collect();
        if reduced.len() < pts.len() {
            for seg in Segment::ring_edges(idx, pts) {
                index.remove(&seg);
            }
            for seg in Segment::ring_edges(idx, &reduced) {
                index.insert(seg);
            }
        }
        rings.push(ring.with_points(reduced));
    }

    if num_split > 0 {
        log::debug!("split {} chords that would have broken topology", num_split);
    }
    Mpoly::new(rings)
}

/// Vertices that occur more than once in the polygon, plus their ring
/// neighbours.
fn pinned_vertices(mp: &Mpoly) -> Vec<Vec<bool>> {
    let mut seen: HashMap<(u64, u64), u32> = HashMap::new();
    for ring in &mp.rings {
        for &p in &ring.pts {
            *seen.entry(point_key(p)).or_default() += 1;
        }
    }
    mp.rings
        .iter()
        .map(|ring| {
            let n = ring.pts.len();
            let mut pinned = vec![false; n];
            for (i, &p) in ring.pts.iter().enumerate() {
                if seen.get(&point_key(p)).copied().unwrap_or(0) > 1 {
                    pinned[(i + n - 1) % n] = true;
                    pinned[i] = true;
                    pinned[(i + 1) % n] = true;
                }
            }
            pinned
        })
        .collect()
}

/// Ascending indices of the vertices RDP keeps. Pinned vertices split the
/// ring into open runs that are reduced separately; without pins the ring
/// is one run from vertex 0 back to itself.
fn reduce(pts: &[Point], pinned: &[bool], tolerance: f64) -> Vec<usize> {
    let n = pts.len();
    if n <= 3 {
        return (0..n).collect();
    }
    let start = pinned.iter().position(|&p| p).unwrap_or(0);
    let mut kept = Vec::with_capacity(n);
    let mut run_start = start;
    loop {
        let mut len = 1;
        while len < n && !pinned[(run_start + len) % n] {
            len += 1;
        }
        let run: LineString<f64> = (0..=len)
            .map(|k| {
                let p = pts[(run_start + k) % n];
                Coord { x: p.x, y: p.y }
            })
            .collect();
        // The run's last vertex starts the next run.
        kept.extend(
            run.simplify_idx(&tolerance)
                .into_iter()
                .filter(|&k| k < len)
                .map(|k| (run_start + k) % n),
        );
        run_start = (run_start + len) % n;
        if run_start == start {
            break;
        }
    }
    kept.sort_unstable();
    kept
}

/// Positions in `kept` whose chord would break the polygon's topology.
fn bad_chords(index: &RTree<Segment>, ring: usize, pts: &[Point], kept: &[usize]) -> Vec<usize> {
    let n = pts.len();
    let m = kept.len();
    let reduced: Vec<Point> = kept.iter().map(|&i| pts[i]).collect();
    let own: RTree<Segment> = RTree::bulk_load(Segment::ring_edges(ring, &reduced).collect());

    (0..m)
        .filter(|&k| {
            let (i, j) = (kept[k], kept[(k + 1) % m]);
            if (i + 1) % n == j {
                return false;
            }
            let (a, b) = (pts[i], pts[j]);
            let crosses = |s: &Segment| segments_conflict(a, b, s.a, s.b);
            let chord_env = envelope_of(&[a, b]);
            if own
                .locate_in_envelope_intersecting(&chord_env)
                .any(|s| s.idx != k && crosses(s))
                || index
                    .locate_in_envelope_intersecting(&chord_env)
                    .any(|s| s.ring != ring && crosses(s))
            {
                return true;
            }

            // Anything between the dropped run and its chord changes sides.
            let run = run_points(pts, i, j);
            let run_env = envelope_of(&run);
            let inside = |s: &Segment| point_in_ring(s.a.midpoint(s.b), &run);
            own.locate_in_envelope_intersecting(&run_env)
                .any(|s| s.idx != k && inside(s))
                || index
                    .locate_in_envelope_intersecting(&run_env)
                    .any(|s| s.ring != ring && inside(s))
        })
        .collect()
}

/// Vertices `start..=end` of a closed ring, wrapping past the last one.
fn run_points(pts: &[Point], start: usize, end: usize) -> Vec<Point> {
    let n = pts.len();
    let len = (end + n - start) % n;
    (0..=len).map(|k| pts[(start + k) % n]).collect()
}

/// Interior vertex of the run `start..end` farthest from its chord.
fn farthest_in_run(pts: &[Point], start: usize, end: usize) -> usize {
    let n = pts.len();
    let (a, b) = (pts[start], pts[end]);
    let len = (end + n - start) % n;
    (1..len)
        .map(|k| (start + k) % n)
        .max_by(|&u, &v| segment_distance(pts[u], a, b).total_cmp(&segment_distance(pts[v], a, b)))
        .unwrap_or((start + 1) % n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitgrid::BitGrid;
    use crate::mpoly::Ring;
    use crate::trace::trace_mask;

    fn pts(coords: &[(f64, f64)]) -> Vec<Point> {
        coords.iter().map(|&(x, y)| Point::new(x, y)).collect()
    }

    fn simplify_ring(ring: &[Point], tolerance: f64) -> Vec<Point> {
        let mp = Mpoly::new(vec![Ring::new(ring.to_vec(), false, None)]);
        simplify(&mp, tolerance).rings.remove(0).pts
    }

    /// Staircase approximation of a circle, as the tracer would produce.
    fn pixel_circle(radius: i32) -> Vec<Point> {
        let r2 = (radius * radius) as f64;
        let mask = BitGrid::from_fn((2 * radius) as usize, (2 * radius) as usize, |x, y| {
            let cx = (x as i32 - radius) as f64 + 0.5;
            let cy = (y as i32 - radius) as f64 + 0.5;
            cx * cx + cy * cy <= r2
        });
        let mp = trace_mask(mask, 0.0, false).unwrap();
        mp.rings[0].pts.clone()
    }

    fn distance_to_ring(p: Point, ring: &[Point]) -> f64 {
        let n = ring.len();
        (0..n)
            .map(|i| segment_distance(p, ring[i], ring[(i + 1) % n]))
            .fold(f64::INFINITY, f64::min)
    }

    fn noise(width: usize, height: usize, seed: u64) -> BitGrid {
        let mut state = seed;
        BitGrid::from_fn(width, height, |_, _| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state % 5 < 2
        })
    }

    /// First pair of distinct segments that meet other than end to end.
    fn first_conflict(mp: &Mpoly) -> Option<(Segment, Segment)> {
        let segs: Vec<Segment> = mp
            .rings
            .iter()
            .enumerate()
            .flat_map(|(idx, ring)| Segment::ring_edges(idx, &ring.pts))
            .collect();
        for (i, s) in segs.iter().enumerate() {
            for t in &segs[i + 1..] {
                if segments_conflict(s.a, s.b, t.a, t.b) {
                    return Some((*s, *t));
                }
            }
        }
        None
    }

    #[test]
    fn zero_tolerance_is_identity() {
        let ring = pixel_circle(12);
        assert_eq!(simplify_ring(&ring, 0.0), ring);

        let mp = Mpoly::new(vec![Ring::new(ring, false, None)]);
        assert_eq!(simplify(&mp, 0.0), mp);
    }

    #[test]
    fn reduces_staircase_within_tolerance() {
        let ring = pixel_circle(20);
        for tolerance in [0.5, 1.0, 2.0, 4.0] {
            let reduced = simplify_ring(&ring, tolerance);
            assert!(reduced.len() < ring.len(), "tolerance {}", tolerance);
            assert!(reduced.len() >= 3);
            for &p in &ring {
                let d = distance_to_ring(p, &reduced);
                assert!(d <= tolerance + 1e-9, "point {:?} is {} away", p, d);
            }
        }
    }

    #[test]
    fn rectangle_keeps_its_corners() {
        let ring = pts(&[
            (0.0, 0.0),
            (4.0, 0.0),
            (8.0, 0.0),
            (8.0, 3.0),
            (8.0, 6.0),
            (0.0, 6.0),
            (0.0, 2.0),
        ]);
        assert_eq!(
            simplify_ring(&ring, 0.5),
            pts(&[(0.0, 0.0), (8.0, 0.0), (8.0, 6.0), (0.0, 6.0)])
        );
    }

    #[test]
    fn tiny_rings_are_not_collapsed() {
        let square = pts(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]);
        assert_eq!(simplify_ring(&square, 5.0), square);
    }

    #[test]
    fn metadata_is_preserved() {
        let mp = Mpoly::new(vec![
            Ring::new(pixel_circle(10), false, None),
            Ring::new(pixel_circle(4), true, Some(0)),
        ]);
        let reduced = simplify(&mp, 1.0);
        assert_eq!(reduced.rings.len(), 2);
        assert!(!reduced.rings[0].is_hole);
        assert!(reduced.rings[1].is_hole);
        assert_eq!(reduced.rings[1].parent_id, Some(0));
    }

    #[test]
    fn chord_around_a_neighbour_is_split() {
        // The shallow notch at (5, 1) is within tolerance of the bottom edge.
        let notched = pts(&[(0.0, 0.0), (5.0, 1.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]);
        assert_eq!(simplify_ring(&notched, 2.0).len(), 4);

        let in_notch = pts(&[(4.5, 0.3), (5.5, 0.3), (5.0, 0.6)]);
        let across_chord = pts(&[(3.0, -1.0), (4.0, -1.0), (4.0, 0.5)]);
        for other in [in_notch, across_chord] {
            let mp = Mpoly::new(vec![
                Ring::new(notched.clone(), false, None),
                Ring::new(other.clone(), false, None),
            ]);
            let reduced = simplify(&mp, 2.0);
            assert_eq!(reduced.rings[0].pts, notched);
            assert_eq!(reduced.rings[1].pts, other);
        }
    }

    #[test]
    fn shared_corners_keep_their_edges() {
        let mp = trace_mask(BitGrid::from_ascii(&["#...", ".###", ".###", ".###"]), 0.0, false)
            .unwrap();
        let reduced = simplify(&mp, 2.0);
        let corner = Point::new(1.0, 1.0);
        for ring in &reduced.rings {
            let n = ring.pts.len();
            let i = ring.pts.iter().position(|&p| p == corner).unwrap();
            let prev = ring.pts[(i + n - 1) % n];
            let next = ring.pts[(i + 1) % n];
            // Both incident edges are still axis-aligned pixel edges.
            for q in [prev, next] {
                assert!(q.x == corner.x || q.y == corner.y, "{:?} -> {:?}", corner, q);
            }
        }
    }

    #[test]
    fn reduced_noise_never_crosses_or_touches_anew() {
        for seed in [1u64, 7, 42, 1234, 98765] {
            let mp = trace_mask(noise(40, 30, seed), 0.0, false).unwrap();
            assert_eq!(first_conflict(&mp), None, "traced seed {}", seed);
            for tolerance in [1.0, 2.0, 4.0] {
                let reduced = simplify(&mp, tolerance);
                assert_eq!(reduced.rings.len(), mp.rings.len());
                assert!(reduced.counts().points < mp.counts().points);
                assert_eq!(
                    first_conflict(&reduced),
                    None,
                    "seed {} tolerance {}",
                    seed,
                    tolerance
                );
            }
        }
    }
}
