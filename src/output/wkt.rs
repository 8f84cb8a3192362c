use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use geo::{LineString, MultiPolygon};

use super::{to_multi_polygon, FeatureSink};
use crate::error::OutlineError;
use crate::pipeline::Feature;

/// Writes one `MULTIPOLYGON` per line.
pub struct WktWriter<W: Write> {
    out: W,
}

impl WktWriter<BufWriter<File>> {
    pub fn create(path: &Path) -> Result<Self, OutlineError> {
        Ok(WktWriter::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> WktWriter<W> {
    pub fn new(out: W) -> Self {
        WktWriter { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> FeatureSink for WktWriter<W> {
    fn write_feature(&mut self, feature: &Feature) -> Result<(), OutlineError> {
        let multi = to_multi_polygon(&feature.geometry)?;
        writeln!(self.out, "{}", multi_polygon_wkt(&multi))?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), OutlineError> {
        self.out.flush()?;
        Ok(())
    }
}

/// Format a multi-polygon as WKT.
///
/// Coordinates use the shortest representation that parses back to the
/// same `f64`.
pub fn multi_polygon_wkt(multi: &MultiPolygon<f64>) -> String {
    if multi.0.is_empty() {
        return "MULTIPOLYGON EMPTY".to_string();
    }
    let mut s = String::from("MULTIPOLYGON (");
    for (i, poly) in multi.0.iter().enumerate() {
        if i > 0 {
            s.push_str(", ");
        }
        s.push('(');
        push_ring(&mut s, poly.exterior());
        for hole in poly.interiors() {
            s.push_str(", ");
            push_ring(&mut s, hole);
        }
        s.push(')');
    }
    s.push(')');
    s
}

fn push_ring(s: &mut String, ring: &LineString<f64>) {
    s.push('(');
    for (i, c) in ring.0.iter().enumerate() {
        if i > 0 {
            s.push_str(", ");
        }
        // Writing into a String cannot fail.
        let _ = write!(s, "{} {}", c.x, c.y);
    }
    s.push(')');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mpoly::{Mpoly, Ring};
    use kurbo::Point;

    fn feature(rings: Vec<Ring>) -> Feature {
        Feature {
            class: None,
            geometry: Mpoly::new(rings),
        }
    }

    fn square(x0: f64, y0: f64, size: f64) -> Vec<Point> {
        vec![
            Point::new(x0, y0),
            Point::new(x0 + size, y0),
            Point::new(x0 + size, y0 + size),
            Point::new(x0, y0 + size),
        ]
    }

    #[test]
    fn formats_polygon_with_hole() {
        let mut hole = square(1.0, 1.0, 2.0);
        hole.reverse();
        let f = feature(vec![
            Ring::new(square(0.0, 0.0, 4.0), false, None),
            Ring::new(hole, true, Some(0)),
        ]);
        let mut writer = WktWriter::new(Vec::new());
        writer.write_feature(&f).unwrap();
        writer.finish().unwrap();
        let text = String::from_utf8(writer.into_inner()).unwrap();
        assert_eq!(
            text,
            "MULTIPOLYGON (((0 0, 4 0, 4 4, 0 4, 0 0), (1 3, 3 3, 3 1, 1 1, 1 3)))\n"
        );
    }

    #[test]
    fn empty_geometry() {
        let mut writer = WktWriter::new(Vec::new());
        writer.write_feature(&feature(Vec::new())).unwrap();
        assert_eq!(writer.into_inner(), b"MULTIPOLYGON EMPTY\n");
    }

    #[test]
    fn coordinates_round_trip_exactly() {
        let pts = vec![
            Point::new(-122.41940000000001, 37.774929),
            Point::new(0.1 + 0.2, 1e-300),
            Point::new(431_510.5, 4_410_000.25),
        ];
        let f = feature(vec![Ring::new(pts.clone(), false, None)]);
        let mut writer = WktWriter::new(Vec::new());
        writer.write_feature(&f).unwrap();
        let text = String::from_utf8(writer.into_inner()).unwrap();

        let inner = text
            .trim()
            .trim_start_matches("MULTIPOLYGON (((")
            .trim_end_matches(")))");
        let parsed: Vec<Point> = inner
            .split(", ")
            .map(|pair| {
                let mut it = pair.split(' ').map(|v| v.parse::<f64>().unwrap());
                Point::new(it.next().unwrap(), it.next().unwrap())
            })
            .collect();
        assert_eq!(&parsed[..3], &pts[..]);
        assert_eq!(parsed[3], pts[0]);
    }

    #[test]
    fn writes_one_line_per_feature_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wkt");
        let mut writer = WktWriter::create(&path).unwrap();
        writer
            .write_feature(&feature(vec![Ring::new(square(0.0, 0.0, 1.0), false, None)]))
            .unwrap();
        writer
            .write_feature(&feature(vec![Ring::new(square(5.0, 5.0, 1.0), false, None)]))
            .unwrap();
        writer.finish().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().all(|l| l.starts_with("MULTIPOLYGON (((")));
    }
}
