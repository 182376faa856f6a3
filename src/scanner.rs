//! Binary presence scanning.
//!
//! A cheap yes/no test for "is the mark present in this region", used where
//! precise localization is unnecessary (e.g. deciding whether a clip should
//! be mirrored because its watermark side is missing). Independent of the
//! multi-scale matcher.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use image::RgbImage;

use crate::config::ScannerConfig;
use crate::detector::sample_indices;
use crate::error::{Error, Result};
use crate::filter::{self, EDGE_ON};
use crate::region::BBox;
use crate::video::VideoIo;

/// Heuristic used by the presence scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMethod {
    /// Brightness spike: enough region pixels at or above the brightness floor.
    Flash,
    /// Edge density: enough Canny edge pixels inside the region.
    Edges,
    /// Either condition suffices.
    Hybrid,
}

impl FromStr for ScanMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "flash" => Ok(Self::Flash),
            "edges" => Ok(Self::Edges),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(Error::Config(format!("unknown scan method '{other}'"))),
        }
    }
}

impl fmt::Display for ScanMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Flash => "flash",
            Self::Edges => "edges",
            Self::Hybrid => "hybrid",
        };
        f.write_str(name)
    }
}

/// Decide whether the mark is present in `region` across a frame sequence.
///
/// Samples frames under the configured budget and counts qualifying frames;
/// presence is reported only once `min_hits` frames qualify, so a single
/// spurious flash (compression artifact) cannot flip the decision.
///
/// # Errors
///
/// Returns [`Error::Config`] when the configuration is invalid.
pub fn has_mark(frames: &[RgbImage], region: &BBox, cfg: &ScannerConfig) -> Result<bool> {
    cfg.validate()?;
    if frames.is_empty() {
        return Ok(false);
    }

    let mut hits = 0_usize;
    for idx in sample_indices(frames.len(), cfg.frames_to_scan) {
        let frame = &frames[idx];
        let clamped = BBox::clamped(
            i64::from(region.x),
            i64::from(region.y),
            i64::from(region.width),
            i64::from(region.height),
            frame.width(),
            frame.height(),
        );
        let gray = filter::to_gray(&filter::crop_rgb(frame, &clamped));

        let hit = match cfg.method {
            ScanMethod::Flash => flash_hit(&gray, cfg),
            ScanMethod::Edges => edge_hit(&gray, cfg),
            ScanMethod::Hybrid => flash_hit(&gray, cfg) || edge_hit(&gray, cfg),
        };
        if hit {
            hits += 1;
            if hits >= cfg.min_hits {
                return Ok(true);
            }
        }
    }

    Ok(false)
}

/// Decode a video and run [`has_mark`] over its frames.
///
/// # Errors
///
/// Returns [`Error::Video`] when the video cannot be decoded, or
/// [`Error::Config`] for an invalid configuration.
pub fn has_mark_video(
    io: &dyn VideoIo,
    path: &Path,
    region: &BBox,
    cfg: &ScannerConfig,
) -> Result<bool> {
    let decoded = io.decode(path)?;
    has_mark(&decoded.frames, region, cfg)
}

fn flash_hit(gray: &image::GrayImage, cfg: &ScannerConfig) -> bool {
    let total = gray.pixels().len();
    if total == 0 {
        return false;
    }
    let bright = gray.pixels().filter(|p| p[0] >= cfg.brightness_min).count();
    #[allow(clippy::cast_precision_loss)]
    {
        bright as f32 / total as f32 >= cfg.coverage
    }
}

fn edge_hit(gray: &image::GrayImage, cfg: &ScannerConfig) -> bool {
    let total = gray.pixels().len();
    if total == 0 {
        return false;
    }
    let edges = filter::canny(gray, cfg.canny_low, cfg.canny_high);
    let on = edges.pixels().filter(|p| p[0] == EDGE_ON).count();
    #[allow(clippy::cast_precision_loss)]
    {
        on as f32 / total as f32 >= cfg.edge_ratio
    }
}
