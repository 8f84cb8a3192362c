use crate::cleanup::PinchPolicy;
use crate::error::OutlineError;

/// All tracing parameters in one struct.
///
/// Tolerances are in pixel units of the source raster.
#[derive(Debug, Clone)]
pub struct TraceConfig {
    // -- Mask stage --
    /// Trace non-member pixels instead of member pixels.
    pub invert: bool,
    /// Erode pixels lacking two consecutive member neighbours before tracing.
    pub erosion: bool,

    // -- Ring selection --
    /// Keep only the largest outer ring.
    pub major_ring_only: bool,
    /// Keep only top-level rings (drops every hole and island).
    pub no_donuts: bool,
    /// Rings with an absolute area below this are dropped (square pixels).
    pub min_ring_area: f64,

    // -- Cleanup --
    /// Remove small out-and-back excursions left by lossy compression.
    pub pinch_excursions: bool,
    /// Detection thresholds for the excursion pincher.
    pub pinch: PinchPolicy,
    /// Douglas-Peucker tolerance. 0 = keep every traced vertex.
    pub dp_tolerance: f64,
    /// How far to pull self-touching vertices apart. 0 = no beveling.
    pub bevel_size: f64,

    // -- Output --
    /// Chord error allowed when projecting edges to lon/lat.
    pub llproj_tolerance: f64,
    /// Emit one polygon per outer ring instead of one multipolygon.
    pub split_polys: bool,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            invert: false,
            erosion: false,
            major_ring_only: false,
            no_donuts: false,
            min_ring_area: 0.0,
            pinch_excursions: false,
            pinch: PinchPolicy::default(),
            dp_tolerance: 2.0,
            bevel_size: 0.1,
            llproj_tolerance: 1.0,
            split_polys: false,
        }
    }
}

impl TraceConfig {
    /// Reject option combinations before any geometry work starts.
    pub fn validate(&self) -> Result<(), OutlineError> {
        if self.major_ring_only && self.min_ring_area > 0.0 {
            return Err(OutlineError::config(
                "major-ring and min-ring-area cannot be used together",
            ));
        }
        if self.major_ring_only && self.no_donuts {
            return Err(OutlineError::config(
                "major-ring and no-donuts cannot be used together",
            ));
        }
        if !(0.0..1.0).contains(&self.bevel_size) {
            return Err(OutlineError::config(
                "bevel size must be in the range 0 <= bevel < 1",
            ));
        }
        if self.dp_tolerance < 0.0 || !self.dp_tolerance.is_finite() {
            return Err(OutlineError::config("dp tolerance must be >= 0"));
        }
        if self.min_ring_area < 0.0 {
            return Err(OutlineError::config("min ring area must be >= 0"));
        }
        if self.llproj_tolerance <= 0.0 || !self.llproj_tolerance.is_finite() {
            return Err(OutlineError::config("llproj tolerance must be > 0"));
        }
        self.pinch.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(TraceConfig::default().validate().is_ok());
    }

    #[test]
    fn major_ring_excludes_area_filter_and_no_donuts() {
        let config = TraceConfig {
            major_ring_only: true,
            min_ring_area: 4.0,
            ..TraceConfig::default()
        };
        assert!(matches!(config.validate(), Err(OutlineError::InvalidConfig(_))));

        let config = TraceConfig {
            major_ring_only: true,
            no_donuts: true,
            ..TraceConfig::default()
        };
        assert!(matches!(config.validate(), Err(OutlineError::InvalidConfig(_))));
    }

    #[test]
    fn bevel_must_stay_below_one_pixel() {
        let config = TraceConfig {
            bevel_size: 1.0,
            ..TraceConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
