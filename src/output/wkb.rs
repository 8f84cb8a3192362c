use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};
use geo::{LineString, MultiPolygon};

use super::{to_multi_polygon, FeatureSink};
use crate::error::OutlineError;
use crate::pipeline::Feature;

const BYTE_ORDER_NDR: u8 = 1;
const WKB_POLYGON: u32 = 3;
const WKB_MULTI_POLYGON: u32 = 6;

/// Writes little-endian WKB multi-polygons back to back.
pub struct WkbWriter<W: Write> {
    out: W,
}

impl WkbWriter<BufWriter<File>> {
    pub fn create(path: &Path) -> Result<Self, OutlineError> {
        Ok(WkbWriter::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> WkbWriter<W> {
    pub fn new(out: W) -> Self {
        WkbWriter { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> FeatureSink for WkbWriter<W> {
    fn write_feature(&mut self, feature: &Feature) -> Result<(), OutlineError> {
        let multi = to_multi_polygon(&feature.geometry)?;
        write_multi_polygon(&mut self.out, &multi)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), OutlineError> {
        self.out.flush()?;
        Ok(())
    }
}

pub fn write_multi_polygon<W: Write>(
    out: &mut W,
    multi: &MultiPolygon<f64>,
) -> std::io::Result<()> {
    out.write_u8(BYTE_ORDER_NDR)?;
    out.write_u32::<LittleEndian>(WKB_MULTI_POLYGON)?;
    out.write_u32::<LittleEndian>(count(multi.0.len())?)?;
    for poly in &multi.0 {
        out.write_u8(BYTE_ORDER_NDR)?;
        out.write_u32::<LittleEndian>(WKB_POLYGON)?;
        out.write_u32::<LittleEndian>(count(1 + poly.interiors().len())?)?;
        write_ring(out, poly.exterior())?;
        for hole in poly.interiors() {
            write_ring(out, hole)?;
        }
    }
    Ok(())
}

fn write_ring<W: Write>(out: &mut W, ring: &LineString<f64>) -> std::io::Result<()> {
    out.write_u32::<LittleEndian>(count(ring.0.len())?)?;
    for c in &ring.0 {
        out.write_f64::<LittleEndian>(c.x)?;
        out.write_f64::<LittleEndian>(c.y)?;
    }
    Ok(())
}

fn count(n: usize) -> std::io::Result<u32> {
    u32::try_from(n).map_err(|_| {
        std::io::Error::new(std::io::ErrorKind::InvalidData, "too many elements for WKB")
    })
}
