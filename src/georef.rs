//! Georeferencing: where raster pixels sit on the earth.
//!
//! A raster can carry an affine geotransform (pixel → projected
//! coordinates) and a projection (projected ↔ WGS84 lon/lat). Both come
//! from a JSON sidecar next to the raster; either may be missing.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use kurbo::{Affine, Point};
use serde::Deserialize;

use crate::error::OutlineError;

// ── WGS84 ellipsoid constants ────────────────────────────────────────────

const A: f64 = 6_378_137.0; // semi-major axis (m)
const F: f64 = 1.0 / 298.257_223_563; // flattening
const E2: f64 = 2.0 * F - F * F; // eccentricity squared
const E_PRIME2: f64 = E2 / (1.0 - E2); // second eccentricity squared
const K0: f64 = 0.9996; // UTM scale factor
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// Projected coordinate system of the raster.
///
/// Points are `(x, y)` = `(easting, northing)` on the projected side and
/// `(lon, lat)` in degrees on the geographic side.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Projection {
    /// The geotransform already yields lon/lat degrees.
    LonLat,
    /// Spherical Web Mercator (EPSG:3857).
    WebMercator,
    /// WGS84 UTM (EPSG 326xx / 327xx).
    Utm { zone: u32, north: bool },
}

impl Projection {
    /// Projection for an EPSG code, if it is one of the supported systems.
    pub fn from_epsg(epsg: u32) -> Option<Projection> {
        match epsg {
            4326 => Some(Projection::LonLat),
            3857 => Some(Projection::WebMercator),
            32601..=32660 => Some(Projection::Utm {
                zone: epsg - 32600,
                north: true,
            }),
            32701..=32760 => Some(Projection::Utm {
                zone: epsg - 32700,
                north: false,
            }),
            _ => None,
        }
    }

    /// Projected coordinates to (lon, lat) degrees.
    pub fn to_lon_lat(&self, p: Point) -> Point {
        match *self {
            Projection::LonLat => p,
            Projection::WebMercator => Point::new(
                (p.x / A).to_degrees(),
                (2.0 * (p.y / A).exp().atan() - std::f64::consts::FRAC_PI_2).to_degrees(),
            ),
            Projection::Utm { zone, north } => utm_to_wgs84(p, zone, north),
        }
    }

    /// (lon, lat) degrees to projected coordinates.
    pub fn from_lon_lat(&self, p: Point) -> Point {
        match *self {
            Projection::LonLat => p,
            Projection::WebMercator => {
                let lat = p.y.to_radians();
                Point::new(
                    A * p.x.to_radians(),
                    A * (std::f64::consts::FRAC_PI_4 + lat / 2.0).tan().ln(),
                )
            }
            Projection::Utm { zone, north } => wgs84_to_utm(p, zone, north),
        }
    }
}

/// Central meridian of a UTM zone, in radians.
fn central_meridian(zone: u32) -> f64 {
    ((zone as f64 - 1.0) * 6.0 - 180.0 + 3.0).to_radians()
}

// ── Transverse Mercator (Snyder 1987, USGS Prof. Paper 1395, pp. 61-64) ──

fn wgs84_to_utm(lon_lat: Point, zone: u32, north: bool) -> Point {
    let lat = lon_lat.y.to_radians();
    let lon = lon_lat.x.to_radians();

    let sin_lat = lat.sin();
    let cos_lat = lat.cos();
    let tan_lat = lat.tan();

    let n = A / (1.0 - E2 * sin_lat * sin_lat).sqrt();
    let t = tan_lat * tan_lat;
    let c = E_PRIME2 * cos_lat * cos_lat;
    let a = cos_lat * (lon - central_meridian(zone));
    let m = meridional_arc(lat);

    let a2 = a * a;
    let a4 = a2 * a2;
    let a6 = a4 * a2;

    // Snyder eq. 8-9
    let easting = K0
        * n
        * (a + (1.0 - t + c) * a2 * a / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * E_PRIME2) * a4 * a / 120.0)
        + FALSE_EASTING;

    // Snyder eq. 8-10
    let northing = K0
        * (m + n
            * tan_lat
            * (a2 / 2.0
                + (5.0 - t + 9.0 * c + 4.0 * c * c) * a4 / 24.0
                + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * E_PRIME2) * a6 / 720.0));

    let northing = if north {
        northing
    } else {
        northing + FALSE_NORTHING_SOUTH
    };
    Point::new(easting, northing)
}

fn utm_to_wgs84(en: Point, zone: u32, north: bool) -> Point {
    let x = en.x - FALSE_EASTING;
    let y = if north {
        en.y
    } else {
        en.y - FALSE_NORTHING_SOUTH
    };

    let e4 = E2 * E2;
    let e6 = e4 * E2;
    let m = y / K0;
    let mu = m / (A * (1.0 - E2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0));

    // Footpoint latitude, Snyder eq. 3-26
    let sq = (1.0 - E2).sqrt();
    let e1 = (1.0 - sq) / (1.0 + sq);
    let e1_2 = e1 * e1;
    let e1_3 = e1_2 * e1;
    let e1_4 = e1_3 * e1;
    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1_3 / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1_2 / 16.0 - 55.0 * e1_4 / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1_3 / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1_4 / 512.0) * (8.0 * mu).sin();

    let sin1 = phi1.sin();
    let cos1 = phi1.cos();
    let tan1 = phi1.tan();
    let c1 = E_PRIME2 * cos1 * cos1;
    let t1 = tan1 * tan1;
    let w = 1.0 - E2 * sin1 * sin1;
    let n1 = A / w.sqrt();
    let r1 = A * (1.0 - E2) / (w * w.sqrt());
    let d = x / (n1 * K0);

    let d2 = d * d;
    let d4 = d2 * d2;
    let d6 = d4 * d2;

    // Snyder eq. 8-17, 8-18
    let lat = phi1
        - (n1 * tan1 / r1)
            * (d2 / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * E_PRIME2) * d4 / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1
                    - 252.0 * E_PRIME2
                    - 3.0 * c1 * c1)
                    * d6
                    / 720.0);
    let lon = central_meridian(zone)
        + (d - (1.0 + 2.0 * t1 + c1) * d2 * d / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * E_PRIME2 + 24.0 * t1 * t1)
                * d4
                * d
                / 120.0)
            / cos1;

    Point::new(lon.to_degrees(), lat.to_degrees())
}

/// Meridional arc from the equator to `lat` (radians). Snyder eq. 3-21.
fn meridional_arc(lat: f64) -> f64 {
    let e4 = E2 * E2;
    let e6 = e4 * E2;

    A * ((1.0 - E2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * lat
        - (3.0 * E2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * lat).sin()
        + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * lat).sin()
        - (35.0 * e6 / 3072.0) * (6.0 * lat).sin())
}

// ── Sidecar metadata ─────────────────────────────────────────────────────

/// Georeferencing and palette read from a JSON sidecar.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RasterMeta {
    /// GDAL-order geotransform: origin x, pixel width, row rotation,
    /// origin y, column rotation, pixel height.
    #[serde(default)]
    pub geotransform: Option<[f64; 6]>,
    #[serde(default)]
    pub projection: Option<Projection>,
    /// EPSG code of the projected system; `projection` wins if both are set.
    #[serde(default)]
    pub epsg: Option<u32>,
    /// RGBA palette indexed by pixel value.
    #[serde(default)]
    pub color_table: Option<Vec<[u8; 4]>>,
}

impl RasterMeta {
    pub fn load(path: &Path) -> Result<RasterMeta, OutlineError> {
        let file = File::open(path)?;
        let meta = serde_json::from_reader(BufReader::new(file))?;
        Ok(meta)
    }
}

/// What a run knows about mapping pixels to the world.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReferenceFrame {
    /// Pixel → projected coordinates.
    pub affine: Option<Affine>,
    /// Projected ↔ lon/lat.
    pub projection: Option<Projection>,
}

impl ReferenceFrame {
    pub fn from_meta(meta: &RasterMeta) -> Result<ReferenceFrame, OutlineError> {
        let projection = match (meta.projection, meta.epsg) {
            (Some(projection), _) => Some(projection),
            (None, Some(code)) => Some(Projection::from_epsg(code).ok_or_else(|| {
                OutlineError::config(format!("EPSG:{} is not a supported projection", code))
            })?),
            (None, None) => None,
        };
        Ok(ReferenceFrame {
            affine: meta.geotransform.map(geotransform_affine),
            projection,
        })
    }
}

/// Convert a GDAL geotransform into a kurbo affine.
///
/// `x = gt[0] + col * gt[1] + row * gt[2]`,
/// `y = gt[3] + col * gt[4] + row * gt[5]`.
pub fn geotransform_affine(gt: [f64; 6]) -> Affine {
    Affine::new([gt[1], gt[4], gt[2], gt[5], gt[0], gt[3]])
}
