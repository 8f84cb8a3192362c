//! End-to-end driver: mask or class raster → features in every output.

use std::path::PathBuf;
use std::time::Instant;

use crate::bitgrid::BitGrid;
use crate::cleanup::{bevel_self_intersections, pinch_excursions, simplify, ExcursionSink};
use crate::config::TraceConfig;
use crate::error::OutlineError;
use crate::georef::ReferenceFrame;
use crate::mpoly::{Mpoly, RingCounts};
use crate::output::FeatureSink;
use crate::project::{project, OutputCs};
use crate::raster::ClassRaster;
use crate::render::{rasterize, save_mask, DebugReport};
use crate::trace::{select_major_ring, trace_mask};

/// What to trace.
pub enum Source {
    /// One feature from a binary mask.
    Mask(BitGrid),
    /// One feature per class value present in the raster.
    Classified(ClassRaster),
}

/// Attributes of a feature traced in classify mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassInfo {
    pub value: u8,
    pub color: Option<[u8; 4]>,
}

/// One emitted shape, already in the output's coordinate system.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub class: Option<ClassInfo>,
    pub geometry: Mpoly,
}

/// A sink paired with the coordinate system it wants.
pub struct Output<'a> {
    pub cs: OutputCs,
    pub sink: &'a mut dyn FeatureSink,
}

/// Pipeline stages that report ring counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Trace,
    MajorRing,
    Pinch,
    Simplify,
    Bevel,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Trace => "Trace",
            Stage::MajorRing => "Major ring",
            Stage::Pinch => "Pinch",
            Stage::Simplify => "Simplify",
            Stage::Bevel => "Bevel",
        };
        f.write_str(name)
    }
}

/// Receives progress counts. Not part of the geometry contract.
pub trait Diagnostics {
    fn stage(&mut self, class: Option<u8>, stage: Stage, counts: RingCounts);
}

/// Forwards stage counts to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDiagnostics;

impl Diagnostics for LogDiagnostics {
    fn stage(&mut self, class: Option<u8>, stage: Stage, counts: RingCounts) {
        match class {
            Some(value) => log::info!("  {:<11} class {}: {}", stage, value, counts),
            None => log::info!("  {:<11} {}", stage, counts),
        }
    }
}

/// Totals for a finished run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Features that kept at least one ring.
    pub features: usize,
    /// Shapes written (per split part, counted once across outputs).
    pub shapes: usize,
}

pub struct Pipeline<'a> {
    config: &'a TraceConfig,
    frame: ReferenceFrame,
    diagnostics: &'a mut dyn Diagnostics,
    mask_out: Option<PathBuf>,
    report: Option<DebugReport>,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &'a TraceConfig,
        frame: ReferenceFrame,
        diagnostics: &'a mut dyn Diagnostics,
    ) -> Self {
        Pipeline {
            config,
            frame,
            diagnostics,
            mask_out: None,
            report: None,
        }
    }

    /// Write the traced (and pinched) rings back out as a mask image.
    pub fn with_mask_out(mut self, path: impl Into<PathBuf>) -> Self {
        self.mask_out = Some(path.into());
        self
    }

    /// Draw masks, rings and pinched excursions into `report`.
    pub fn with_report(mut self, report: DebugReport) -> Self {
        self.report = Some(report);
        self
    }

    pub fn into_report(self) -> Option<DebugReport> {
        self.report
    }

    /// Trace `source` and send every non-empty feature to every output.
    ///
    /// All option and capability checks happen before any tracing.
    pub fn run(
        &mut self,
        source: Source,
        outputs: &mut [Output<'_>],
    ) -> Result<RunSummary, OutlineError> {
        self.config.validate()?;
        for output in outputs.iter() {
            self.frame.check(output.cs)?;
        }
        if let Source::Classified(_) = source {
            if self.config.invert {
                return Err(OutlineError::config("classify is not compatible with invert"));
            }
            if self.mask_out.is_some() {
                return Err(OutlineError::config("classify is not compatible with mask-out"));
            }
        }

        let t_start = Instant::now();
        let mut summary = RunSummary::default();
        match source {
            Source::Mask(mask) => {
                self.trace_feature(mask, None, outputs, &mut summary)?;
            }
            Source::Classified(raster) => {
                for value in raster.classes() {
                    let info = ClassInfo {
                        value,
                        color: raster.color(value),
                    };
                    match info.color {
                        Some([r, g, b, a]) => {
                            log::info!("Feature class {} (color {},{},{},{})", value, r, g, b, a)
                        }
                        None => log::info!("Feature class {}", value),
                    }
                    self.trace_feature(raster.mask(value), Some(info), outputs, &mut summary)?;
                }
            }
        }

        for output in outputs.iter_mut() {
            output.sink.finish()?;
        }
        log::info!(
            "Wrote {} shapes from {} features ({}ms)",
            summary.shapes,
            summary.features,
            t_start.elapsed().as_millis()
        );
        Ok(summary)
    }

    fn trace_feature(
        &mut self,
        mut mask: BitGrid,
        class: Option<ClassInfo>,
        outputs: &mut [Output<'_>],
        summary: &mut RunSummary,
    ) -> Result<(), OutlineError> {
        let config = self.config;
        let class_id = class.map(|c| c.value);
        let (width, height) = (mask.width(), mask.height());

        // ── Mask ──────────────────────────────────────────
        if config.invert {
            mask.invert();
        }
        if config.erosion {
            mask.erode();
        }
        if let Some(report) = self.report.as_mut() {
            report.add_mask(&mask);
        }

        // ── Trace ─────────────────────────────────────────
        let mut mp = trace_mask(mask, config.min_ring_area, config.no_donuts)?;
        self.diagnostics.stage(class_id, Stage::Trace, mp.counts());

        if config.major_ring_only {
            mp = select_major_ring(mp)?;
            self.diagnostics.stage(class_id, Stage::MajorRing, mp.counts());
        }

        // ── Cleanup ───────────────────────────────────────
        if !mp.is_empty() && config.pinch_excursions {
            let sink = self.report.as_mut().map(|r| r as &mut dyn ExcursionSink);
            mp = pinch_excursions(&mp, &config.pinch, sink);
            self.diagnostics.stage(class_id, Stage::Pinch, mp.counts());
        }

        if let Some(path) = &self.mask_out {
            save_mask(&rasterize(&mp, width, height), path)?;
        }

        if !mp.is_empty() && config.dp_tolerance > 0.0 {
            mp = simplify(&mp, config.dp_tolerance);
            self.diagnostics.stage(class_id, Stage::Simplify, mp.counts());
        }
        if !mp.is_empty() && config.bevel_size > 0.0 {
            mp = bevel_self_intersections(&mp, config.bevel_size);
            self.diagnostics.stage(class_id, Stage::Bevel, mp.counts());
        }

        if mp.is_empty() {
            log::debug!("no rings left, nothing to write");
            return Ok(());
        }
        summary.features += 1;
        log::info!("Found {}.", mp.counts());
        if let Some(report) = self.report.as_mut() {
            report.add_rings(&mp);
        }

        // ── Output ────────────────────────────────────────
        let shapes = if config.split_polys {
            mp.split_polys()?
        } else {
            vec![mp]
        };
        for shape in &shapes {
            for output in outputs.iter_mut() {
                let geometry = project(shape, &self.frame, output.cs, config.llproj_tolerance)?;
                output.sink.write_feature(&Feature { class, geometry })?;
            }
            summary.shapes += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{segments_intersect, Segment};
    use crate::georef::geotransform_affine;
    use crate::raster::Raster;
    use kurbo::Point;

    impl FeatureSink for Vec<Feature> {
        fn write_feature(&mut self, feature: &Feature) -> Result<(), OutlineError> {
            self.push(feature.clone());
            Ok(())
        }
    }

    impl Diagnostics for Vec<(Option<u8>, Stage, RingCounts)> {
        fn stage(&mut self, class: Option<u8>, stage: Stage, counts: RingCounts) {
            self.push((class, stage, counts));
        }
    }

    /// Frame with a hole, plus a separate block on the right.
    fn two_blobs() -> BitGrid {
        BitGrid::from_ascii(&[
            "..........",
            ".####..##.",
            ".#..#..##.",
            ".####.....",
            "..........",
        ])
    }

    fn run_pixel(
        config: &TraceConfig,
        source: Source,
    ) -> (Result<RunSummary, OutlineError>, Vec<Feature>, Vec<(Option<u8>, Stage, RingCounts)>) {
        let mut features: Vec<Feature> = Vec::new();
        let mut diag: Vec<(Option<u8>, Stage, RingCounts)> = Vec::new();
        let result = {
            let mut outputs = [Output {
                cs: OutputCs::Pixel,
                sink: &mut features,
            }];
            Pipeline::new(config, ReferenceFrame::default(), &mut diag).run(source, &mut outputs)
        };
        (result, features, diag)
    }

    #[test]
    fn mask_becomes_one_feature() {
        let config = TraceConfig::default();
        let (result, features, diag) = run_pixel(&config, Source::Mask(two_blobs()));
        assert_eq!(
            result.unwrap(),
            RunSummary {
                features: 1,
                shapes: 1
            }
        );
        assert_eq!(features.len(), 1);
        let counts = features[0].geometry.counts();
        assert_eq!((counts.outer, counts.holes), (2, 1));
        assert_eq!(features[0].class, None);

        let stages: Vec<Stage> = diag.iter().map(|d| d.1).collect();
        assert_eq!(stages, vec![Stage::Trace, Stage::Simplify, Stage::Bevel]);
    }

    #[test]
    fn split_emits_one_shape_per_outer_ring() {
        let config = TraceConfig {
            split_polys: true,
            ..TraceConfig::default()
        };
        let (result, features, _) = run_pixel(&config, Source::Mask(two_blobs()));
        assert_eq!(result.unwrap().shapes, 2);
        assert_eq!(features.len(), 2);
        assert_eq!(features[0].geometry.rings.len(), 2);
        assert_eq!(features[1].geometry.rings.len(), 1);
        for f in &features {
            f.geometry.validate().unwrap();
        }
    }

    #[test]
    fn major_ring_keeps_the_biggest_blob() {
        let config = TraceConfig {
            major_ring_only: true,
            ..TraceConfig::default()
        };
        let (result, features, diag) = run_pixel(&config, Source::Mask(two_blobs()));
        result.unwrap();
        let rings = &features[0].geometry.rings;
        assert_eq!(rings.len(), 1);
        assert_eq!(rings[0].area(), 12.0);
        assert!(diag.iter().any(|d| d.1 == Stage::MajorRing));
    }

    #[test]
    fn empty_mask_writes_nothing() {
        let config = TraceConfig::default();
        let (result, features, _) = run_pixel(&config, Source::Mask(BitGrid::new(6, 4)));
        assert_eq!(result.unwrap(), RunSummary::default());
        assert!(features.is_empty());
    }

    #[test]
    fn classes_are_traced_in_ascending_order() {
        let raster = Raster::new(
            6,
            3,
            vec![
                7, 7, 0, 2, 2, 2, //
                7, 7, 0, 2, 0, 2, //
                0, 0, 0, 2, 2, 2,
            ],
        )
        .unwrap();
        let classes = raster.into_classes(&[0], Some(vec![[9, 9, 9, 255]; 4]));
        let config = TraceConfig::default();
        let (result, features, diag) = run_pixel(&config, Source::Classified(classes));
        assert_eq!(result.unwrap().features, 2);

        let ids: Vec<u8> = features.iter().filter_map(|f| f.class.map(|c| c.value)).collect();
        assert_eq!(ids, vec![2, 7]);
        assert_eq!(features[0].class.and_then(|c| c.color), Some([9, 9, 9, 255]));
        assert_eq!(features[1].class.and_then(|c| c.color), None);
        // The ring of class 2 has a hole.
        assert_eq!(features[0].geometry.counts().holes, 1);
        assert!(diag.iter().any(|d| d.0 == Some(7)));
    }

    #[test]
    fn classify_rejects_invert_before_tracing() {
        let config = TraceConfig {
            invert: true,
            ..TraceConfig::default()
        };
        let classes = Raster::new(2, 1, vec![1, 2]).unwrap().into_classes(&[], None);
        let (result, features, diag) = run_pixel(&config, Source::Classified(classes));
        assert!(matches!(result, Err(OutlineError::InvalidConfig(_))));
        assert!(features.is_empty());
        assert!(diag.is_empty());
    }

    #[test]
    fn missing_affine_fails_before_tracing() {
        let config = TraceConfig::default();
        let mut features: Vec<Feature> = Vec::new();
        let mut diag: Vec<(Option<u8>, Stage, RingCounts)> = Vec::new();
        let mut outputs = [Output {
            cs: OutputCs::Projected,
            sink: &mut features,
        }];
        let result = Pipeline::new(&config, ReferenceFrame::default(), &mut diag)
            .run(Source::Mask(two_blobs()), &mut outputs);
        assert!(matches!(result, Err(OutlineError::MissingAffine)));
        assert!(diag.is_empty());
    }

    #[test]
    fn singular_geotransform_fails_before_tracing() {
        let config = TraceConfig::default();
        let frame = ReferenceFrame {
            affine: Some(geotransform_affine([10.0, 0.0, 0.0, 20.0, 0.0, 0.0])),
            projection: Some(crate::georef::Projection::LonLat),
        };
        let mut features: Vec<Feature> = Vec::new();
        let mut diag: Vec<(Option<u8>, Stage, RingCounts)> = Vec::new();
        let mut outputs = [Output {
            cs: OutputCs::Geographic,
            sink: &mut features,
        }];
        let result = Pipeline::new(&config, frame, &mut diag)
            .run(Source::Mask(two_blobs()), &mut outputs);
        assert!(matches!(result, Err(OutlineError::InvalidConfig(_))));
        assert!(diag.is_empty());
    }

    #[test]
    fn every_output_gets_its_own_coordinates() {
        let config = TraceConfig {
            dp_tolerance: 0.0,
            bevel_size: 0.0,
            ..TraceConfig::default()
        };
        let frame = ReferenceFrame {
            affine: Some(geotransform_affine([100.0, 2.0, 0.0, 50.0, 0.0, -2.0])),
            projection: None,
        };
        let mut pixel: Vec<Feature> = Vec::new();
        let mut projected: Vec<Feature> = Vec::new();
        let mut diag = LogDiagnostics;
        let mask = BitGrid::from_ascii(&["##", "##"]);
        let summary = {
            let mut outputs = [
                Output {
                    cs: OutputCs::Pixel,
                    sink: &mut pixel,
                },
                Output {
                    cs: OutputCs::Projected,
                    sink: &mut projected,
                },
            ];
            Pipeline::new(&config, frame, &mut diag)
                .run(Source::Mask(mask), &mut outputs)
                .unwrap()
        };
        assert_eq!(summary.shapes, 1);
        assert_eq!(pixel[0].geometry.rings[0].pts[2], Point::new(2.0, 2.0));
        assert_eq!(projected[0].geometry.rings[0].pts[2], Point::new(104.0, 46.0));
    }

    #[test]
    fn mask_out_and_report_hooks() {
        let dir = tempfile::tempdir().unwrap();
        let mask_path = dir.path().join("mask.png");
        let config = TraceConfig {
            pinch_excursions: true,
            ..TraceConfig::default()
        };
        let mut features: Vec<Feature> = Vec::new();
        let mut diag = LogDiagnostics;
        let mask = two_blobs();
        let mut pipeline = Pipeline::new(&config, ReferenceFrame::default(), &mut diag)
            .with_mask_out(&mask_path)
            .with_report(DebugReport::new(10, 5, 4));
        {
            let mut outputs = [Output {
                cs: OutputCs::Pixel,
                sink: &mut features,
            }];
            pipeline.run(Source::Mask(mask.clone()), &mut outputs).unwrap();
        }
        let report = pipeline.into_report().unwrap();
        assert_eq!(report.image().dimensions(), (40, 20));

        let written = image::open(&mask_path).unwrap().to_luma8();
        let back = BitGrid::from_fn(10, 5, |x, y| written.get_pixel(x as u32, y as u32)[0] > 127);
        assert_eq!(back, mask);
    }

    fn xorshift_noise(width: usize, height: usize, seed: u64) -> BitGrid {
        let mut state = seed;
        BitGrid::from_fn(width, height, |_, _| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state % 5 < 2
        })
    }

    #[test]
    fn default_output_has_no_crossing_or_touching_edges() {
        let config = TraceConfig::default();
        for seed in [1u64, 7, 42, 1234, 98765] {
            let (result, features, _) = run_pixel(&config, Source::Mask(xorshift_noise(40, 30, seed)));
            result.unwrap();
            let mp = &features[0].geometry;
            mp.validate().unwrap();

            let segs: Vec<Segment> = mp
                .rings
                .iter()
                .enumerate()
                .flat_map(|(idx, ring)| Segment::ring_edges(idx, &ring.pts))
                .collect();
            let adjacent = |s: &Segment, t: &Segment| {
                let n = mp.rings[s.ring].pts.len();
                s.ring == t.ring && ((s.idx + 1) % n == t.idx || (t.idx + 1) % n == s.idx)
            };
            for (i, s) in segs.iter().enumerate() {
                for t in &segs[i + 1..] {
                    if adjacent(s, t) {
                        continue;
                    }
                    assert!(
                        !segments_intersect(s.a, s.b, t.a, t.b),
                        "seed {}: ring {} seg {} meets ring {} seg {}",
                        seed,
                        s.ring,
                        s.idx,
                        t.ring,
                        t.idx
                    );
                }
            }
        }
    }
}
