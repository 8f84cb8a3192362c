//! trace-outline: raster mask → topologically valid vector polygons.
//!
//! Traces the boundaries of a binary mask (or of every value of an 8-bit
//! class raster) into nested rings with holes, cleans them up, and maps
//! them into pixel, projected or lon/lat coordinates.
//!
//! # Example
//!
//! ```no_run
//! use trace_outline::output::WktWriter;
//! use trace_outline::pipeline::{LogDiagnostics, Output, Pipeline, Source};
//! use trace_outline::{OutputCs, Raster, ReferenceFrame, TraceConfig};
//! use std::path::Path;
//!
//! let raster = Raster::open(Path::new("mask.png"))?;
//! let config = TraceConfig::default();
//! let mut wkt = WktWriter::create(Path::new("outline.wkt"))?;
//! let mut diagnostics = LogDiagnostics;
//! let mut outputs = [Output { cs: OutputCs::Pixel, sink: &mut wkt }];
//! Pipeline::new(&config, ReferenceFrame::default(), &mut diagnostics)
//!     .run(Source::Mask(raster.data_mask(&[])), &mut outputs)?;
//! # Ok::<(), trace_outline::OutlineError>(())
//! ```

#![forbid(unsafe_code)]

mod config;
mod geom;

pub mod bitgrid;
pub mod cleanup;
pub mod error;
pub mod georef;
pub mod mpoly;
pub mod output;
pub mod pipeline;
pub mod project;
pub mod raster;
pub mod render;
pub mod trace;

// Re-export kurbo so downstream users get the same Point type
// used by Ring.pts.
pub use kurbo;

pub use bitgrid::BitGrid;
pub use config::TraceConfig;
pub use error::OutlineError;
pub use georef::{Projection, RasterMeta, ReferenceFrame};
pub use mpoly::{Mpoly, Ring, RingCounts};
pub use project::OutputCs;
pub use raster::{ClassRaster, Raster};
