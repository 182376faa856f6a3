//! Validated configuration for detection, presence scanning, and restoration.
//!
//! Every public entry point takes one of these structs; [`DetectorConfig::validate`]
//! and friends reject out-of-range values up front so processing never starts
//! with a silently coerced parameter.

use crate::blend::{BlendMode, InpaintMethod};
use crate::error::{Error, Result};
use crate::scanner::ScanMethod;

/// Global frame downscale applied before matching.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Downscale {
    /// Match at full resolution.
    Off,
    /// Shrink so the longer frame side does not exceed this many pixels.
    MaxSide(u32),
    /// Shrink both dimensions by a fixed ratio in `(0, 1)`.
    Ratio(f32),
}

impl Downscale {
    /// Interpret a single numeric knob: `0` disables, values below 1 are a
    /// ratio, values of 1 and above are a pixel target for the longer side.
    #[must_use]
    pub fn from_factor(factor: f32) -> Self {
        if factor <= 0.0 {
            Self::Off
        } else if factor < 1.0 {
            Self::Ratio(factor)
        } else {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            Self::MaxSide(factor.round() as u32)
        }
    }

    /// Resolve to a multiplicative factor (`<= 1.0`) for a frame size.
    #[must_use]
    pub fn factor_for(&self, width: u32, height: u32) -> f32 {
        match *self {
            Self::Off => 1.0,
            Self::MaxSide(target) => {
                let longest = width.max(height).max(1);
                if longest > target {
                    #[allow(clippy::cast_precision_loss)]
                    {
                        target as f32 / longest as f32
                    }
                } else {
                    1.0
                }
            }
            Self::Ratio(r) => r,
        }
    }

    fn validate(&self) -> Result<()> {
        match *self {
            Self::Off => Ok(()),
            Self::MaxSide(target) if target < 16 => Err(Error::Config(format!(
                "downscale pixel target {target} is below the 16px minimum"
            ))),
            Self::MaxSide(_) => Ok(()),
            Self::Ratio(r) if r <= 0.0 || r > 1.0 => Err(Error::Config(format!(
                "downscale ratio {r} must be in (0, 1]"
            ))),
            Self::Ratio(_) => Ok(()),
        }
    }
}

/// Configuration for the multi-scale detector.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Acceptance threshold on the combined score (0.0-1.0).
    pub threshold: f32,
    /// Sampling budget: how many frames to analyze when not scanning all.
    pub frames_to_scan: usize,
    /// Scan every frame instead of sampling (required before restoration).
    pub full_scan: bool,
    /// Global frame downscale applied before matching.
    pub downscale: Downscale,
    /// Gaussian blur sigma applied to frames before matching; 0 disables.
    pub blur_sigma: f32,
    /// Smallest template scale variant to try.
    pub scale_min: f32,
    /// Largest template scale variant to try.
    pub scale_max: f32,
    /// Number of scale variants spanning `[scale_min, scale_max]`.
    pub scale_steps: usize,
    /// Weight of the edge-correlation signal in the combined score; 0 disables
    /// the edge pass entirely.
    pub edge_weight: f32,
    /// Weight of the response-surface z-score signal; 0 disables.
    pub z_weight: f32,
    /// Constant added to the combined score before clamping.
    pub score_bias: f32,
    /// Lower clamp applied to the combined score.
    pub score_floor: f32,
    /// Canny hysteresis low threshold (gradient magnitude, 0-255 scale).
    pub canny_low: f32,
    /// Canny hysteresis high threshold.
    pub canny_high: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            threshold: 0.75,
            frames_to_scan: 24,
            full_scan: false,
            downscale: Downscale::Off,
            blur_sigma: 0.0,
            scale_min: 0.8,
            scale_max: 1.2,
            scale_steps: 9,
            edge_weight: 0.3,
            z_weight: 0.2,
            score_bias: 0.0,
            score_floor: 0.0,
            canny_low: 50.0,
            canny_high: 150.0,
        }
    }
}

impl DetectorConfig {
    /// Check all fields for range and consistency.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(Error::Config(format!(
                "threshold {} must be in [0, 1]",
                self.threshold
            )));
        }
        if self.frames_to_scan == 0 {
            return Err(Error::Config("frames_to_scan must be at least 1".into()));
        }
        if self.scale_min <= 0.0 {
            return Err(Error::Config(format!(
                "scale_min {} must be positive",
                self.scale_min
            )));
        }
        if self.scale_min > self.scale_max {
            return Err(Error::Config(format!(
                "scale_min {} must not exceed scale_max {}",
                self.scale_min, self.scale_max
            )));
        }
        if self.scale_steps == 0 {
            return Err(Error::Config("scale_steps must be at least 1".into()));
        }
        for (name, w) in [
            ("edge_weight", self.edge_weight),
            ("z_weight", self.z_weight),
            ("score_floor", self.score_floor),
        ] {
            if !(0.0..=1.0).contains(&w) {
                return Err(Error::Config(format!("{name} {w} must be in [0, 1]")));
            }
        }
        if !(0.0..=1.0).contains(&self.score_bias) {
            return Err(Error::Config(format!(
                "score_bias {} must be in [0, 1]",
                self.score_bias
            )));
        }
        if self.blur_sigma < 0.0 {
            return Err(Error::Config(format!(
                "blur_sigma {} must not be negative",
                self.blur_sigma
            )));
        }
        if self.canny_low < 0.0 || self.canny_low > self.canny_high {
            return Err(Error::Config(format!(
                "canny thresholds low={} high={} must satisfy 0 <= low <= high",
                self.canny_low, self.canny_high
            )));
        }
        self.downscale.validate()
    }
}

/// Configuration for the binary presence scanner.
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Which heuristic decides presence.
    pub method: ScanMethod,
    /// Brightness floor for the flash heuristic (luma, 0-255).
    pub brightness_min: u8,
    /// Fraction of region pixels that must reach `brightness_min`.
    pub coverage: f32,
    /// Fraction of region pixels that must be Canny edges.
    pub edge_ratio: f32,
    /// Qualifying sampled frames required before reporting presence.
    pub min_hits: usize,
    /// How many frames to sample for the decision.
    pub frames_to_scan: usize,
    /// Canny hysteresis low threshold for the edge heuristic.
    pub canny_low: f32,
    /// Canny hysteresis high threshold.
    pub canny_high: f32,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            method: ScanMethod::Flash,
            brightness_min: 230,
            coverage: 0.35,
            edge_ratio: 0.08,
            min_hits: 2,
            frames_to_scan: 10,
            canny_low: 50.0,
            canny_high: 150.0,
        }
    }
}

impl ScannerConfig {
    /// Check all fields for range and consistency.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        for (name, v) in [("coverage", self.coverage), ("edge_ratio", self.edge_ratio)] {
            if !(0.0..=1.0).contains(&v) {
                return Err(Error::Config(format!("{name} {v} must be in [0, 1]")));
            }
        }
        if self.min_hits == 0 {
            return Err(Error::Config("min_hits must be at least 1".into()));
        }
        if self.frames_to_scan < self.min_hits {
            return Err(Error::Config(format!(
                "frames_to_scan {} cannot satisfy min_hits {}",
                self.frames_to_scan, self.min_hits
            )));
        }
        if self.canny_low < 0.0 || self.canny_low > self.canny_high {
            return Err(Error::Config(format!(
                "canny thresholds low={} high={} must satisfy 0 <= low <= high",
                self.canny_low, self.canny_high
            )));
        }
        Ok(())
    }
}

/// Configuration for the restoration engine.
#[derive(Debug, Clone)]
pub struct RestoreConfig {
    /// Absolute padding around a detected region, in pixels.
    pub padding_px: u32,
    /// Relative padding as a fraction of the region dimension.
    pub padding_pct: f32,
    /// Regions smaller than this on either side are presumed noise and skipped.
    pub min_size: u32,
    /// How far (in frames, each direction) donor search walks.
    pub search_span: usize,
    /// Donor frames whose own detections overlap the target at or above this
    /// IoU are rejected.
    pub max_iou: f32,
    /// Donor pool size cap.
    pub pool_size: usize,
    /// Gradient profile for the seamless composite.
    pub blend_mode: BlendMode,
    /// Algorithm used when no donor patch survives.
    pub inpaint_method: InpaintMethod,
    /// Neighborhood radius for inpainting.
    pub inpaint_radius: u32,
}

impl Default for RestoreConfig {
    fn default() -> Self {
        Self {
            padding_px: 6,
            padding_pct: 0.15,
            min_size: 12,
            search_span: 36,
            max_iou: 0.25,
            pool_size: 5,
            blend_mode: BlendMode::Normal,
            inpaint_method: InpaintMethod::March,
            inpaint_radius: 3,
        }
    }
}

impl RestoreConfig {
    /// Check all fields for range and consistency.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.padding_pct < 0.0 {
            return Err(Error::Config(format!(
                "padding_pct {} must not be negative",
                self.padding_pct
            )));
        }
        if self.min_size == 0 {
            return Err(Error::Config("min_size must be at least 1".into()));
        }
        if self.search_span == 0 {
            return Err(Error::Config("search_span must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.max_iou) {
            return Err(Error::Config(format!(
                "max_iou {} must be in [0, 1]",
                self.max_iou
            )));
        }
        if self.pool_size == 0 {
            return Err(Error::Config("pool_size must be at least 1".into()));
        }
        if self.inpaint_radius == 0 {
            return Err(Error::Config("inpaint_radius must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_configs_validate() {
        assert!(DetectorConfig::default().validate().is_ok());
        assert!(ScannerConfig::default().validate().is_ok());
        assert!(RestoreConfig::default().validate().is_ok());
    }

    #[test]
    fn detector_rejects_inverted_scale_range() {
        let cfg = DetectorConfig {
            scale_min: 1.4,
            scale_max: 0.9,
            ..DetectorConfig::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("scale_min"));
    }

    #[test]
    fn detector_rejects_out_of_range_weights() {
        let cfg = DetectorConfig {
            edge_weight: 1.5,
            ..DetectorConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = DetectorConfig {
            threshold: -0.1,
            ..DetectorConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn detector_rejects_inconsistent_canny_thresholds() {
        let cfg = DetectorConfig {
            canny_low: 200.0,
            canny_high: 100.0,
            ..DetectorConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn scanner_rejects_unsatisfiable_min_hits() {
        let cfg = ScannerConfig {
            min_hits: 5,
            frames_to_scan: 3,
            ..ScannerConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn restore_rejects_zero_pool() {
        let cfg = RestoreConfig {
            pool_size: 0,
            ..RestoreConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn downscale_from_factor_maps_zero_ratio_and_target() {
        assert_eq!(Downscale::from_factor(0.0), Downscale::Off);
        assert_eq!(Downscale::from_factor(0.5), Downscale::Ratio(0.5));
        assert_eq!(Downscale::from_factor(720.0), Downscale::MaxSide(720));
    }

    #[test]
    fn downscale_factor_only_shrinks() {
        let d = Downscale::MaxSide(640);
        assert!((d.factor_for(1280, 720) - 0.5).abs() < 1e-6);
        assert!((d.factor_for(320, 240) - 1.0).abs() < f32::EPSILON);
        assert!((Downscale::Off.factor_for(1920, 1080) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn downscale_rejects_tiny_target_and_bad_ratio() {
        assert!(Downscale::MaxSide(8).validate().is_err());
        assert!(Downscale::Ratio(1.5).validate().is_err());
        assert!(Downscale::Ratio(0.25).validate().is_ok());
    }
}
