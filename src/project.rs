//! Output coordinate systems and the pixel → world projector.

use kurbo::{Affine, Point};
use rayon::prelude::*;

use crate::error::OutlineError;
use crate::georef::{Projection, ReferenceFrame};
use crate::mpoly::Mpoly;

/// Bisection depth cap for geographic edges (at most 2^16 chords per edge).
const MAX_DEPTH: u32 = 16;

/// Coordinate system of emitted geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputCs {
    /// Raster column / row, as traced.
    Pixel,
    /// Easting / northing from the geotransform.
    Projected,
    /// WGS84 longitude / latitude in degrees.
    Geographic,
}

impl std::fmt::Display for OutputCs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OutputCs::Pixel => "pixel",
            OutputCs::Projected => "projected",
            OutputCs::Geographic => "geographic",
        };
        f.write_str(name)
    }
}

impl ReferenceFrame {
    /// Fail early if this frame cannot produce coordinates in `cs`.
    pub fn check(&self, cs: OutputCs) -> Result<(), OutlineError> {
        match cs {
            OutputCs::Pixel => Ok(()),
            OutputCs::Projected => self.affine.map(|_| ()).ok_or(OutlineError::MissingAffine),
            OutputCs::Geographic => {
                let affine = self.affine.ok_or(OutlineError::MissingAffine)?;
                if self.projection.is_none() {
                    return Err(OutlineError::MissingGeoTransform);
                }
                // Densification maps lon/lat back into the raster.
                let det = affine.determinant();
                if det == 0.0 || !det.is_finite() {
                    return Err(OutlineError::config("geotransform is not invertible"));
                }
                Ok(())
            }
        }
    }
}

/// Pixel ↔ lon/lat through the affine and the projection.
struct GeoMapping {
    affine: Affine,
    inverse: Affine,
    projection: Projection,
}

impl GeoMapping {
    fn new(frame: &ReferenceFrame) -> Result<GeoMapping, OutlineError> {
        frame.check(OutputCs::Geographic)?;
        let affine = frame.affine.ok_or(OutlineError::MissingAffine)?;
        let projection = frame.projection.ok_or(OutlineError::MissingGeoTransform)?;
        Ok(GeoMapping {
            affine,
            inverse: affine.inverse(),
            projection,
        })
    }

    fn forward(&self, p: Point) -> Point {
        self.projection.to_lon_lat(self.affine * p)
    }

    fn back(&self, q: Point) -> Point {
        self.inverse * self.projection.from_lon_lat(q)
    }
}

/// Map pixel-space geometry into `cs`.
///
/// Projected output is exact. Geographic output densifies every edge
/// (the closing edge included) until the straight lon/lat chord, mapped
/// back into the raster, stays within `tolerance` pixels of the true edge.
pub fn project(
    mp: &Mpoly,
    frame: &ReferenceFrame,
    cs: OutputCs,
    tolerance: f64,
) -> Result<Mpoly, OutlineError> {
    frame.check(cs)?;
    match cs {
        OutputCs::Pixel => Ok(mp.clone()),
        OutputCs::Projected => {
            let affine = frame.affine.ok_or(OutlineError::MissingAffine)?;
            Ok(mp.transformed(affine))
        }
        OutputCs::Geographic => {
            let mapping = GeoMapping::new(frame)?;
            let rings = mp
                .rings
                .par_iter()
                .map(|ring| ring.with_points(densify_ring(&ring.pts, &mapping, tolerance)))
                .collect();
            Ok(Mpoly::new(rings))
        }
    }
}

fn densify_ring(pts: &[Point], mapping: &GeoMapping, tolerance: f64) -> Vec<Point> {
    let n = pts.len();
    let projected: Vec<Point> = pts.iter().map(|&p| mapping.forward(p)).collect();
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let j = (i + 1) % n;
        out.push(projected[i]);
        bisect(
            mapping,
            (pts[i], projected[i]),
            (pts[j], projected[j]),
            tolerance,
            0,
            &mut out,
        );
    }
    out
}

/// Push the interior points of one edge, in order from `a` to `b`.
fn bisect(
    mapping: &GeoMapping,
    a: (Point, Point),
    b: (Point, Point),
    tolerance: f64,
    depth: u32,
    out: &mut Vec<Point>,
) {
    if depth >= MAX_DEPTH {
        return;
    }
    let mid = a.0.midpoint(b.0);
    let chord = mapping.back(a.1.midpoint(b.1));
    if chord.distance(mid) <= tolerance {
        return;
    }
    let m = (mid, mapping.forward(mid));
    bisect(mapping, a, m, tolerance, depth + 1, out);
    out.push(m.1);
    bisect(mapping, m, b, tolerance, depth + 1, out);
}
