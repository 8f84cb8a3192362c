//! Excursion pinching: removes "mouse bites" left by lossy compression.
//!
//! An excursion is a short run of ring vertices that leaves a point and
//! comes back close to it while enclosing little area for its length:
//! a thin notch or spike. The run is spliced out and the ring is closed
//! with the chord between its entry and exit vertices.
//!
//! This is a noise filter, not a correctness pass. Whenever a splice could
//! change topology (the chord crosses the ring, or another ring sits inside
//! the excursion) the candidate is left alone.

use kurbo::{Point, Rect};

use crate::error::OutlineError;
use crate::geom::{closed_perimeter, point_in_ring, segments_intersect, signed_area};
use crate::mpoly::{Mpoly, Ring};

/// Detection thresholds for excursions, in pixel units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PinchPolicy {
    /// Longest excursion, counted in ring edges from entry to exit.
    pub max_span: usize,
    /// Largest distance between the entry and exit vertices.
    pub max_gap: f64,
    /// Largest area the excursion loop (closed by its chord) may enclose.
    pub max_area: f64,
    /// Loops with area / perimeter at or above this are real features.
    pub min_fill_ratio: f64,
}

impl Default for PinchPolicy {
    fn default() -> Self {
        Self {
            max_span: 12,
            max_gap: 1.5,
            max_area: 16.0,
            min_fill_ratio: 0.5,
        }
    }
}

impl PinchPolicy {
    pub fn validate(&self) -> Result<(), OutlineError> {
        if self.max_span < 2 {
            return Err(OutlineError::config("excursion span must be at least 2"));
        }
        if self.max_gap < 0.0 || self.max_area < 0.0 || self.min_fill_ratio < 0.0 {
            return Err(OutlineError::config("excursion thresholds must be >= 0"));
        }
        Ok(())
    }
}

/// Receives each excursion removed by the pincher (entry to exit, inclusive).
pub trait ExcursionSink {
    fn excursion(&mut self, loop_pts: &[Point]);
}

/// Remove excursions from every ring. Ring count and metadata are kept.
pub fn pinch_excursions(
    mp: &Mpoly,
    policy: &PinchPolicy,
    mut sink: Option<&mut dyn ExcursionSink>,
) -> Mpoly {
    let mut removed = 0usize;
    let mut rings = Vec::with_capacity(mp.rings.len());
    for idx in 0..mp.rings.len() {
        let (pts, excursions) = pinch_ring(mp, idx, policy);
        removed += excursions.len();
        if let Some(sink) = sink.as_mut() {
            for loop_pts in &excursions {
                sink.excursion(loop_pts);
            }
        }
        rings.push(mp.rings[idx].with_points(pts));
    }
    log::debug!("pinched {} excursions", removed);
    Mpoly::new(rings)
}

/// Pinch one ring, returning its new points and the loops taken out.
fn pinch_ring(mp: &Mpoly, ring_idx: usize, policy: &PinchPolicy) -> (Vec<Point>, Vec<Vec<Point>>) {
    let others: Vec<&Ring> = mp
        .rings
        .iter()
        .enumerate()
        .filter(|&(i, _)| i != ring_idx)
        .map(|(_, r)| r)
        .collect();

    let mut pts = mp.rings[ring_idx].pts.clone();
    let mut excursions = Vec::new();
    let mut i = 0;
    while i < pts.len() && pts.len() > 4 {
        let Some(span) = find_excursion(&pts, i, policy, &others) else {
            i += 1;
            continue;
        };
        let n = pts.len();
        excursions.push((0..=span).map(|k| pts[(i + k) % n]).collect::<Vec<Point>>());
        if i + span < n {
            pts.drain(i + 1..i + span);
        } else {
            pts.rotate_left(i);
            pts.drain(1..span);
            i = 0;
        }
        // A zero-width excursion leaves the exit vertex on top of the entry.
        let next = (i + 1) % pts.len();
        if pts[next] == pts[i] {
            pts.remove(next);
            if next < i {
                i -= 1;
            }
        }
    }
    (pts, excursions)
}

/// Longest excursion leaving vertex `i`, as the number of edges it spans.
fn find_excursion(pts: &[Point], i: usize, policy: &PinchPolicy, others: &[&Ring]) -> Option<usize> {
    let n = pts.len();
    // Entry and exit stay, so at least three vertices must survive.
    let max_span = policy.max_span.min(n.saturating_sub(2));
    if max_span < 2 {
        return None;
    }
    let ring_perimeter = closed_perimeter(pts);

    for span in (2..=max_span).rev() {
        let j = (i + span) % n;
        if pts[i].distance(pts[j]) > policy.max_gap {
            continue;
        }
        let loop_pts: Vec<Point> = (0..=span).map(|k| pts[(i + k) % n]).collect();
        let area = signed_area(&loop_pts).abs();
        if area > policy.max_area {
            continue;
        }
        let perimeter = closed_perimeter(&loop_pts);
        if perimeter <= 0.0 || area / perimeter >= policy.min_fill_ratio {
            continue;
        }
        let path_len = perimeter - pts[i].distance(pts[j]);
        if path_len >= ring_perimeter / 2.0 {
            continue;
        }
        if !chord_is_clear(pts, i, j) {
            continue;
        }
        if encloses_other_ring(&loop_pts, others) {
            continue;
        }
        return Some(span);
    }
    None
}

/// The chord from `i` to `j` must not touch the part of the ring that stays.
fn chord_is_clear(pts: &[Point], i: usize, j: usize) -> bool {
    let n = pts.len();
    let a = pts[i];
    let b = pts[j];
    if a == b {
        return true;
    }
    // Folding back over an adjacent edge would leave a zero-width spike.
    if same_direction(a, b, pts[(i + n - 1) % n]) || same_direction(b, a, pts[(j + 1) % n]) {
        return false;
    }
    let mut k = (j + 1) % n;
    while (k + 1) % n != i {
        let c = pts[k];
        let d = pts[(k + 1) % n];
        if segments_intersect(a, b, c, d) {
            return false;
        }
        k = (k + 1) % n;
    }
    true
}

/// `c` lies on the ray from `a` through `b`.
fn same_direction(a: Point, b: Point, c: Point) -> bool {
    let u = b - a;
    let v = c - a;
    u.cross(v) == 0.0 && u.dot(v) > 0.0
}

fn encloses_other_ring(loop_pts: &[Point], others: &[&Ring]) -> bool {
    let bounds = loop_pts
        .iter()
        .fold(Rect::from_points(loop_pts[0], loop_pts[0]), |r, &p| r.union_pt(p));
    others.iter().any(|ring| {
        ring.pts
            .iter()
            .any(|&p| bounds.contains(p) && point_in_ring(p, loop_pts))
    })
}
