//! Ring forest: rings with hole flags and index-based parent links.
//!
//! Parents are indices into the owning `Mpoly`'s ring list, never
//! references. Every operation that drops or reorders rings rebuilds the
//! links through an explicit old → new index table.

use kurbo::{Affine, Point};

use crate::error::OutlineError;
use crate::geom::signed_area;

/// One closed boundary loop. The closing edge is implicit (first ≠ last).
#[derive(Debug, Clone, PartialEq)]
pub struct Ring {
    pub pts: Vec<Point>,
    /// True if the ring cuts a hole out of its parent.
    pub is_hole: bool,
    /// Index of the enclosing ring in the same `Mpoly`, `None` for top-level rings.
    pub parent_id: Option<usize>,
}

impl Ring {
    pub fn new(pts: Vec<Point>, is_hole: bool, parent_id: Option<usize>) -> Self {
        Ring {
            pts,
            is_hole,
            parent_id,
        }
    }

    /// Signed shoelace area: positive for outer rings, negative for holes.
    pub fn area(&self) -> f64 {
        signed_area(&self.pts)
    }

    /// Copy of the ring with only its points replaced.
    pub fn with_points(&self, pts: Vec<Point>) -> Ring {
        Ring {
            pts,
            is_hole: self.is_hole,
            parent_id: self.parent_id,
        }
    }
}

/// All outer rings and holes of one feature.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mpoly {
    pub rings: Vec<Ring>,
}

/// Ring and vertex tallies for progress reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RingCounts {
    pub outer: usize,
    pub holes: usize,
    pub points: usize,
}

impl std::fmt::Display for RingCounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} outer rings and {} holes with a total of {} vertices",
            self.outer, self.holes, self.points
        )
    }
}

impl Mpoly {
    pub fn new(rings: Vec<Ring>) -> Self {
        Mpoly { rings }
    }

    pub fn is_empty(&self) -> bool {
        self.rings.is_empty()
    }

    pub fn counts(&self) -> RingCounts {
        let mut counts = RingCounts::default();
        for ring in &self.rings {
            if ring.is_hole {
                counts.holes += 1;
            } else {
                counts.outer += 1;
            }
            counts.points += ring.pts.len();
        }
        counts
    }

    /// Keep the rings for which `keep(index, ring)` holds, remapping parents.
    ///
    /// An outer ring whose parent is dropped becomes top-level. A hole whose
    /// parent is dropped has nothing left to cut into, which is an error.
    pub fn retain_rings(
        &self,
        mut keep: impl FnMut(usize, &Ring) -> bool,
    ) -> Result<Mpoly, OutlineError> {
        let mut remap: Vec<Option<usize>> = vec![None; self.rings.len()];
        let mut rings = Vec::new();
        for (idx, ring) in self.rings.iter().enumerate() {
            if keep(idx, ring) {
                remap[idx] = Some(rings.len());
                rings.push(ring.clone());
            }
        }
        for ring in &mut rings {
            let Some(old_parent) = ring.parent_id else {
                continue;
            };
            let new_parent = *remap.get(old_parent).ok_or_else(|| {
                OutlineError::topology(format!("parent index {} out of range", old_parent))
            })?;
            match new_parent {
                Some(p) => ring.parent_id = Some(p),
                None if ring.is_hole => {
                    return Err(OutlineError::topology("kept a hole but not its parent"))
                }
                None => ring.parent_id = None,
            }
        }
        Ok(Mpoly { rings })
    }

    /// Check the forest invariants.
    pub fn validate(&self) -> Result<(), OutlineError> {
        let n = self.rings.len();
        for (idx, ring) in self.rings.iter().enumerate() {
            match ring.parent_id {
                None if ring.is_hole => {
                    return Err(OutlineError::topology(format!(
                        "ring {} is a hole without a parent",
                        idx
                    )))
                }
                None => {}
                Some(p) if p >= n || p == idx => {
                    return Err(OutlineError::topology(format!(
                        "ring {} has invalid parent {}",
                        idx, p
                    )))
                }
                Some(_) => {}
            }
        }
        for idx in 0..n {
            self.root_of(idx)?;
        }
        Ok(())
    }

    /// Follow parent links to the top-level ring, rejecting cycles.
    fn root_of(&self, idx: usize) -> Result<usize, OutlineError> {
        let mut cur = idx;
        for _ in 0..=self.rings.len() {
            match self.rings[cur].parent_id {
                None => return Ok(cur),
                Some(p) if p < self.rings.len() => cur = p,
                Some(p) => {
                    return Err(OutlineError::topology(format!(
                        "ring {} has invalid parent {}",
                        cur, p
                    )))
                }
            }
        }
        Err(OutlineError::topology(format!("parent cycle through ring {}", idx)))
    }

    /// Split into one polygon per top-level ring.
    ///
    /// Each part holds a top-level ring followed by all of its direct and
    /// transitive descendants, in their original relative order, with
    /// parents renumbered into the part's own index space.
    pub fn split_polys(&self) -> Result<Vec<Mpoly>, OutlineError> {
        self.validate()?;
        let mut part_of_root: Vec<Option<usize>> = vec![None; self.rings.len()];
        let mut local_idx: Vec<usize> = vec![0; self.rings.len()];
        let mut parts: Vec<Mpoly> = Vec::new();

        for (idx, ring) in self.rings.iter().enumerate() {
            if ring.parent_id.is_none() {
                part_of_root[idx] = Some(parts.len());
                parts.push(Mpoly::default());
            }
        }
        for (idx, ring) in self.rings.iter().enumerate() {
            let root = self.root_of(idx)?;
            let part = part_of_root[root]
                .ok_or_else(|| OutlineError::topology("root ring is not top-level"))?;
            local_idx[idx] = parts[part].rings.len();
            parts[part].rings.push(ring.clone());
        }
        for (idx, ring) in self.rings.iter().enumerate() {
            if let Some(parent) = ring.parent_id {
                let part = part_of_root[self.root_of(idx)?]
                    .ok_or_else(|| OutlineError::topology("root ring is not top-level"))?;
                parts[part].rings[local_idx[idx]].parent_id = Some(local_idx[parent]);
            }
        }
        Ok(parts)
    }

    /// Concatenate polygons, offsetting each part's parent indices.
    pub fn merge(parts: impl IntoIterator<Item = Mpoly>) -> Mpoly {
        let mut rings: Vec<Ring> = Vec::new();
        for part in parts {
            let offset = rings.len();
            rings.extend(part.rings.into_iter().map(|mut ring| {
                ring.parent_id = ring.parent_id.map(|p| p + offset);
                ring
            }));
        }
        Mpoly { rings }
    }

    /// Apply an affine map to every point.
    pub fn transformed(&self, affine: Affine) -> Mpoly {
        let rings = self
            .rings
            .iter()
            .map(|r| r.with_points(r.pts.iter().map(|&p| affine * p).collect()))
            .collect();
        Mpoly { rings }
    }
}
