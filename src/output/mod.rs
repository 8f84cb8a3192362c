//! Feature emitters.
//!
//! Every emitter goes through [`to_multi_polygon`], which groups each
//! outer ring with its direct holes. Islands inside holes are outer rings
//! of their own and become separate polygons. Ring orientation and
//! coordinates are passed through untouched.

mod wkb;
mod wkt;

use geo::{Coord, LineString, MultiPolygon, Polygon};

use crate::error::OutlineError;
use crate::mpoly::{Mpoly, Ring};
use crate::pipeline::Feature;

pub use wkb::WkbWriter;
pub use wkt::WktWriter;

/// Destination for traced features.
pub trait FeatureSink {
    fn write_feature(&mut self, feature: &Feature) -> Result<(), OutlineError>;

    /// Flush buffered output. Called once after the last feature.
    fn finish(&mut self) -> Result<(), OutlineError> {
        Ok(())
    }
}

/// Multi-polygon-with-holes view of a ring forest.
///
/// Each ring is closed by repeating its first point.
pub fn to_multi_polygon(mp: &Mpoly) -> Result<MultiPolygon<f64>, OutlineError> {
    let mut holes: Vec<Vec<&Ring>> = vec![Vec::new(); mp.rings.len()];
    for (idx, ring) in mp.rings.iter().enumerate() {
        if !ring.is_hole {
            continue;
        }
        let parent = ring
            .parent_id
            .ok_or_else(|| OutlineError::topology(format!("hole {} has no parent", idx)))?;
        match mp.rings.get(parent) {
            Some(outer) if !outer.is_hole => holes[parent].push(ring),
            _ => {
                return Err(OutlineError::topology(format!(
                    "hole {} is not inside an outer ring",
                    idx
                )))
            }
        }
    }

    let polygons = mp
        .rings
        .iter()
        .zip(&holes)
        .filter(|(ring, _)| !ring.is_hole)
        .map(|(ring, holes)| {
            Polygon::new(
                line_string(ring),
                holes.iter().map(|h| line_string(h)).collect(),
            )
        })
        .collect();
    Ok(MultiPolygon::new(polygons))
}

fn line_string(ring: &Ring) -> LineString<f64> {
    // Polygon::new closes the ring.
    LineString::new(
        ring.pts
            .iter()
            .map(|p| Coord { x: p.x, y: p.y })
            .collect(),
    )
}
