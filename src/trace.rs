//! Contour tracing on the pixel-corner lattice.
//!
//! Boundaries run between pixels rather than through pixel centres, so a
//! straight edge of N pixels produces 2 vertices, not N. The walker keeps
//! member pixels on its right-hand side (y down), which makes outer rings
//! clockwise on screen (positive area) and holes counter-clockwise.
//!
//! ## Diagonal tie-break
//!
//! At a saddle corner, where two member pixels touch only diagonally, the
//! walker always turns right. Member pixels are therefore 4-connected and
//! non-member pixels 8-connected: diagonal neighbours become separate rings
//! (or one ring visiting the corner twice) that share the corner vertex.
//! The beveler opens those shared corners later. Changing this rule
//! changes output topology.
//!
//! ## Nesting
//!
//! Rings are discovered in raster order over vertical lattice edges, so the
//! first edge found for a ring is its leftmost edge in that row and the
//! pixel to its left is outside it. The nearest boundary edge further left
//! in the same row belongs to a ring `B` bounding that outside region:
//! either `B` encloses it (opposite hole-ness, `B` is the parent) or `B` is
//! a sibling (same hole-ness, `B`'s parent is the parent). Parents are
//! therefore always discovered, and stored, before their children.

use std::collections::HashMap;

use kurbo::Point;

use crate::bitgrid::BitGrid;
use crate::error::OutlineError;
use crate::mpoly::{Mpoly, Ring};

/// Lattice corner `(x, y)`; pixel `(x, y)` has this as its top-left corner.
type Corner = (i64, i64);

/// Unit step on the lattice, y down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Dir {
    dx: i64,
    dy: i64,
}

const NORTH: Dir = Dir { dx: 0, dy: -1 };
const SOUTH: Dir = Dir { dx: 0, dy: 1 };

impl Dir {
    fn right(self) -> Dir {
        Dir {
            dx: -self.dy,
            dy: self.dx,
        }
    }

    fn left(self) -> Dir {
        Dir {
            dx: self.dy,
            dy: -self.dx,
        }
    }
}

/// Trace a mask into a ring forest.
///
/// The mask is consumed and released as soon as the rings exist. Rings with
/// `|area| < min_ring_area` are dropped; with `no_donuts` only top-level
/// rings are kept. Parent links are remapped after each removal.
pub fn trace_mask(mask: BitGrid, min_ring_area: f64, no_donuts: bool) -> Result<Mpoly, OutlineError> {
    let traced = trace_rings(&mask)?;
    drop(mask);

    let mut mp = traced;
    if min_ring_area > 0.0 {
        mp = filter_small_rings(&mp, min_ring_area)?;
    }
    if no_donuts {
        // Only parentless rings survive, so no link needs remapping.
        mp = mp.retain_rings(|_, ring| ring.parent_id.is_none())?;
    }
    mp.validate()?;
    Ok(mp)
}

/// Drop rings whose absolute area is below `min_area`.
pub fn filter_small_rings(mp: &Mpoly, min_area: f64) -> Result<Mpoly, OutlineError> {
    mp.retain_rings(|_, ring| ring.area().abs() >= min_area)
}

/// Keep only the single largest outer ring.
pub fn select_major_ring(mp: Mpoly) -> Result<Mpoly, OutlineError> {
    if mp.rings.len() <= 1 {
        return Ok(mp);
    }
    let Some((best_idx, best)) = mp
        .rings
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.area().total_cmp(&b.1.area()))
    else {
        return Ok(mp);
    };
    log::debug!(
        "major ring was {} with {} pts, {:.1} area",
        best_idx,
        best.pts.len(),
        best.area()
    );
    if best.parent_id.is_some() || best.is_hole {
        return Err(OutlineError::topology("largest ring should not have a parent"));
    }
    Ok(Mpoly::new(vec![best.clone()]))
}

/// Walk every member/non-member boundary of the mask.
fn trace_rings(mask: &BitGrid) -> Result<Mpoly, OutlineError> {
    let w = mask.width() as i64;
    let h = mask.height() as i64;
    // Vertical lattice edge (x, row) -> owning ring.
    let mut owner: HashMap<Corner, usize> = HashMap::new();
    let mut rings: Vec<Ring> = Vec::new();

    for y in 0..h {
        let mut left: Option<usize> = None;
        for x in 0..=w {
            let west = mask.get(x - 1, y);
            let east = mask.get(x, y);
            if west == east {
                continue;
            }
            let id = match owner.get(&(x, y)) {
                Some(&id) => id,
                None => {
                    // Member on the west means the new ring's inside is non-member.
                    let is_hole = west;
                    let parent_id = match left {
                        None => None,
                        Some(b) if rings[b].is_hole != is_hole => Some(b),
                        Some(b) => rings[b].parent_id,
                    };
                    if is_hole && parent_id.is_none() {
                        return Err(OutlineError::topology(format!(
                            "hole at ({}, {}) has no enclosing ring",
                            x, y
                        )));
                    }
                    let id = rings.len();
                    let pts = follow(mask, (x, y), is_hole, id, &mut owner)?;
                    rings.push(Ring::new(pts, is_hole, parent_id));
                    id
                }
            };
            left = Some(id);
        }
    }

    Ok(Mpoly::new(rings))
}

/// Follow one boundary starting on the vertical edge left of pixel `edge`.
///
/// Records every vertical edge walked in `owner` and returns the corners
/// where the direction changes.
fn follow(
    mask: &BitGrid,
    edge: Corner,
    is_hole: bool,
    id: usize,
    owner: &mut HashMap<Corner, usize>,
) -> Result<Vec<Point>, OutlineError> {
    let (x, y) = edge;
    // Outer: member is east, so walk north. Hole: member is west, walk south.
    let (start, start_dir) = if is_hole {
        ((x, y), SOUTH)
    } else {
        ((x, y + 1), NORTH)
    };
    let max_steps = 4 * (mask.width() as u64 + 1) * (mask.height() as u64 + 1) + 4;

    let mut pts = Vec::new();
    let mut p = start;
    let mut d = start_dir;
    let mut steps = 0u64;
    loop {
        if d.dx == 0 {
            owner.insert((p.0, p.1.min(p.1 + d.dy)), id);
        }
        p = (p.0 + d.dx, p.1 + d.dy);
        let next = turn(mask, p, d);
        if next != d {
            pts.push(Point::new(p.0 as f64, p.1 as f64));
        }
        d = next;
        if p == start && d == start_dir {
            break;
        }
        steps += 1;
        if steps > max_steps {
            return Err(OutlineError::topology(format!(
                "boundary starting at ({}, {}) does not close",
                x, y
            )));
        }
    }
    Ok(pts)
}

/// Direction to leave corner `v` after arriving along `d`.
///
/// Looks at the two pixels ahead of the corner. The pixel offsets come
/// from the centre of each pixel, `v + (d ± right) / 2`, floored.
fn turn(mask: &BitGrid, v: Corner, d: Dir) -> Dir {
    let r = d.right();
    let ahead_right = mask.get(v.0 + (d.dx + r.dx - 1) / 2, v.1 + (d.dy + r.dy - 1) / 2);
    let ahead_left = mask.get(v.0 + (d.dx - r.dx - 1) / 2, v.1 + (d.dy - r.dy - 1) / 2);

    //   left right │ action
    //   ───────────┼──────────────────────────────
    //    0    1    │ boundary continues: straight
    //    1    1    │ member ahead: turn left
    //    0    0    │ member ends: turn right
    //    1    0    │ diagonal saddle: turn right (tie-break)
    match (ahead_left, ahead_right) {
        (false, true) => d,
        (true, true) => d.left(),
        (false, false) | (true, false) => d.right(),
    }
}
