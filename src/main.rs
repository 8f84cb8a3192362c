use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::str::FromStr;
use trace_outline::cleanup::PinchPolicy;
use trace_outline::output::{FeatureSink, WkbWriter, WktWriter};
use trace_outline::pipeline::{LogDiagnostics, Output, Pipeline, Source};
use trace_outline::render::DebugReport;
use trace_outline::{OutputCs, Raster, RasterMeta, ReferenceFrame, TraceConfig};

#[derive(Debug, Clone, Copy, PartialEq, ValueEnum)]
enum CsArg {
    /// Raster column / row
    #[value(alias = "xy")]
    Pixel,
    /// Easting / northing from the geotransform
    #[value(alias = "en")]
    Projected,
    /// WGS84 longitude / latitude
    #[value(alias = "ll")]
    Geographic,
}

impl From<CsArg> for OutputCs {
    fn from(cs: CsArg) -> Self {
        match cs {
            CsArg::Pixel => OutputCs::Pixel,
            CsArg::Projected => OutputCs::Projected,
            CsArg::Geographic => OutputCs::Geographic,
        }
    }
}

/// A geometry output file, optionally prefixed with its coordinate system
/// (`ll:out.wkt`). Without a prefix the output uses `--out-cs`.
#[derive(Debug, Clone, PartialEq)]
struct OutputArg {
    cs: Option<CsArg>,
    path: PathBuf,
}

impl FromStr for OutputArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some((prefix, path)) = s.split_once(':') {
            if let Ok(cs) = <CsArg as ValueEnum>::from_str(prefix, true) {
                if path.is_empty() {
                    return Err(format!("missing file name after '{}:'", prefix));
                }
                return Ok(OutputArg {
                    cs: Some(cs),
                    path: PathBuf::from(path),
                });
            }
        }
        Ok(OutputArg {
            cs: None,
            path: PathBuf::from(s),
        })
    }
}

#[derive(Parser)]
#[command(
    name = "trace-outline",
    about = "Trace the outline of a raster mask into vector polygons"
)]
struct Cli {
    /// Input raster (PNG, PNM, TIFF, BMP); the first band is read as luma
    input: PathBuf,

    /// Georeferencing sidecar (JSON). Defaults to <input>.json if present
    #[arg(long)]
    meta: Option<PathBuf>,

    /// Pixel values that are nodata (comma separated). Default: 0
    #[arg(long, value_delimiter = ',')]
    nodata: Vec<u8>,

    /// Output a feature for each value of the raster
    #[arg(long)]
    classify: bool,

    /// Trace nodata pixels instead of data pixels
    #[arg(long)]
    invert: bool,

    /// Erode pixels with fewer than two adjacent data neighbours
    #[arg(long)]
    erosion: bool,

    /// Keep only the largest outer ring
    #[arg(long)]
    major_ring: bool,

    /// Drop holes (and everything inside them)
    #[arg(long)]
    no_donuts: bool,

    /// Drop rings smaller than this many square pixels
    #[arg(long, default_value = "0")]
    min_ring_area: f64,

    /// Douglas-Peucker tolerance in pixels (0 = off)
    #[arg(long, default_value = "2.0")]
    dp_toler: f64,

    /// How far to pull apart self-touching vertices, in pixels (0 = off)
    #[arg(long, default_value = "0.1")]
    bevel_size: f64,

    /// Remove thin notches and spikes left by lossy compression
    #[arg(long)]
    pinch_excursions: bool,

    /// Coordinate system of geometry outputs without their own prefix
    #[arg(long, value_enum, default_value = "pixel")]
    out_cs: CsArg,

    /// Max error in pixels when densifying edges for lon/lat output
    #[arg(long, default_value = "1.0")]
    llproj_toler: f64,

    /// Write WKT, one multipolygon per line. Repeatable; `[CS:]FILE`
    #[arg(long, value_name = "[CS:]FILE")]
    wkt_out: Vec<OutputArg>,

    /// Write little-endian WKB, one multipolygon after another. Repeatable; `[CS:]FILE`
    #[arg(long, value_name = "[CS:]FILE")]
    wkb_out: Vec<OutputArg>,

    /// Write the traced outline back out as a mask image
    #[arg(long)]
    mask_out: Option<PathBuf>,

    /// Write a PNG showing the mask, rings and pinched excursions
    #[arg(long)]
    report: Option<PathBuf>,

    /// Scale factor of the debug report
    #[arg(long, default_value = "4")]
    report_scale: u32,

    /// Emit one polygon per outer ring instead of one multipolygon
    #[arg(long)]
    split_polys: bool,

    /// Log per-stage details
    #[arg(short, long)]
    verbose: bool,
}

fn load_meta(cli: &Cli) -> Result<RasterMeta, Box<dyn std::error::Error>> {
    if let Some(path) = &cli.meta {
        return Ok(RasterMeta::load(path)?);
    }
    let mut sidecar = cli.input.clone().into_os_string();
    sidecar.push(".json");
    let sidecar = PathBuf::from(sidecar);
    if sidecar.exists() {
        log::info!("Using georeferencing from {}", sidecar.display());
        Ok(RasterMeta::load(&sidecar)?)
    } else {
        Ok(RasterMeta::default())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();

    run(&cli)
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = TraceConfig {
        invert: cli.invert,
        erosion: cli.erosion,
        major_ring_only: cli.major_ring,
        no_donuts: cli.no_donuts,
        min_ring_area: cli.min_ring_area,
        pinch_excursions: cli.pinch_excursions,
        pinch: PinchPolicy::default(),
        dp_tolerance: cli.dp_toler,
        bevel_size: cli.bevel_size,
        llproj_tolerance: cli.llproj_toler,
        split_polys: cli.split_polys,
    };
    config.validate()?;

    let meta = load_meta(cli)?;
    let frame = ReferenceFrame::from_meta(&meta)?;
    let default_cs = OutputCs::from(cli.out_cs);
    let cs_of = |arg: &OutputArg| arg.cs.map(OutputCs::from).unwrap_or(default_cs);
    for arg in cli.wkt_out.iter().chain(&cli.wkb_out) {
        frame.check(cs_of(arg))?;
    }

    let raster = if cli.classify {
        Raster::open_indexed(&cli.input)?
    } else {
        Raster::open(&cli.input)?
    };
    log::info!(
        "Loaded {} ({}x{})",
        cli.input.display(),
        raster.width(),
        raster.height()
    );
    let report = cli
        .report
        .as_ref()
        .map(|_| DebugReport::new(raster.width(), raster.height(), cli.report_scale));
    let source = if cli.classify {
        Source::Classified(raster.into_classes(&cli.nodata, meta.color_table.clone()))
    } else {
        Source::Mask(raster.data_mask(&cli.nodata))
    };

    let mut sinks: Vec<(OutputCs, Box<dyn FeatureSink>)> = Vec::new();
    for arg in &cli.wkt_out {
        let sink: Box<dyn FeatureSink> = Box::new(WktWriter::create(&arg.path)?);
        sinks.push((cs_of(arg), sink));
    }
    for arg in &cli.wkb_out {
        let sink: Box<dyn FeatureSink> = Box::new(WkbWriter::create(&arg.path)?);
        sinks.push((cs_of(arg), sink));
    }
    let mut outputs: Vec<Output<'_>> = sinks
        .iter_mut()
        .map(|(cs, sink)| Output {
            cs: *cs,
            sink: &mut **sink,
        })
        .collect();

    let mut diagnostics = LogDiagnostics;
    let mut pipeline = Pipeline::new(&config, frame, &mut diagnostics);
    if let Some(path) = &cli.mask_out {
        pipeline = pipeline.with_mask_out(path);
    }
    if let Some(report) = report {
        pipeline = pipeline.with_report(report);
    }
    let summary = pipeline.run(source, &mut outputs)?;

    if let (Some(path), Some(report)) = (&cli.report, pipeline.into_report()) {
        report.save(path)?;
        log::info!("Wrote report to {}", path.display());
    }
    if !outputs.is_empty() && summary.shapes == 0 {
        log::warn!("No shapes were written");
    }
    Ok(())
}
