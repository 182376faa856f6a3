//! Detection series construction.
//!
//! Samples frames under a budget (or exhaustively), runs the multi-scale
//! matcher on each, and collects per-frame detection records in scan order.
//! The series is the sole input format the restoration engine understands,
//! whether it came from the matcher or from manually drawn zones.

use std::collections::BTreeMap;

use image::{imageops, GrayImage, RgbImage};
use serde::Serialize;

use crate::config::DetectorConfig;
use crate::error::Result;
use crate::filter;
use crate::matcher::Matcher;
use crate::region::{BBox, Zone};
use crate::template::TemplateAsset;

/// One evaluated frame: where the template matched best and how confidently.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionRecord {
    /// Index of the frame in the decoded sequence.
    pub frame_index: usize,
    /// Timestamp in seconds, when the frame rate is known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<f64>,
    /// Matched region in full-resolution coordinates.
    pub bbox: BBox,
    /// Combined score in `[0, 1]`.
    pub score: f32,
    /// Raw correlation score.
    pub raw_score: f32,
    /// Edge-map correlation, when the edge pass ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edge_score: Option<f32>,
    /// Compressed response-surface z-score, when enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z_score: Option<f32>,
    /// Scale variant that produced the match.
    pub scale: f32,
    /// Whether `score` reached the acceptance threshold.
    pub accepted: bool,
}

/// Ordered sequence of detection records, insertion order = scan order.
///
/// The series is not deduplicated: consumers pick what they need (the
/// restoration engine groups accepted records by frame index).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DetectionSeries {
    records: Vec<DetectionRecord>,
}

impl DetectionSeries {
    /// Append a record, preserving scan order.
    pub fn push(&mut self, record: DetectionRecord) {
        self.records.push(record);
    }

    /// All records in scan order.
    #[must_use]
    pub fn records(&self) -> &[DetectionRecord] {
        &self.records
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when no record was produced.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records that reached the acceptance threshold.
    pub fn accepted(&self) -> impl Iterator<Item = &DetectionRecord> {
        self.records.iter().filter(|r| r.accepted)
    }

    /// Group accepted detections by frame index, ascending.
    #[must_use]
    pub fn detection_map(&self) -> BTreeMap<usize, Vec<BBox>> {
        let mut map: BTreeMap<usize, Vec<BBox>> = BTreeMap::new();
        for record in self.accepted() {
            map.entry(record.frame_index).or_default().push(record.bbox);
        }
        map
    }

    /// Synthesize a series from manually drawn zones.
    ///
    /// Every zone is flagged on every frame (zones are static by nature), so
    /// zone-driven removal flows through the same restoration path as
    /// detector output.
    #[must_use]
    pub fn from_zones(zones: &[Zone], frame_count: usize, frame_w: u32, frame_h: u32) -> Self {
        let mut series = Self::default();
        for frame_index in 0..frame_count {
            for zone in zones {
                series.push(DetectionRecord {
                    frame_index,
                    time: None,
                    bbox: zone.to_bbox(frame_w, frame_h),
                    score: 1.0,
                    raw_score: 1.0,
                    edge_score: None,
                    z_score: None,
                    scale: 1.0,
                    accepted: true,
                });
            }
        }
        series
    }
}

/// Choose which frame indices to analyze under a sampling budget.
///
/// Every frame when `total <= desired`; otherwise evenly spaced positions
/// over `[0, total - 1]`, rounded, deduplicated, ascending. Deterministic by
/// construction.
#[must_use]
pub fn sample_indices(total: usize, desired: usize) -> Vec<usize> {
    if total == 0 || desired == 0 {
        return Vec::new();
    }
    if total <= desired {
        return (0..total).collect();
    }
    if desired == 1 {
        return vec![0];
    }

    #[allow(clippy::cast_precision_loss)]
    let last = (total - 1) as f64;
    #[allow(clippy::cast_precision_loss)]
    let span = (desired - 1) as f64;

    let mut indices = Vec::with_capacity(desired);
    for i in 0..desired {
        #[allow(clippy::cast_precision_loss)]
        let pos = i as f64 * last / span;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let idx = pos.round() as usize;
        if indices.last() != Some(&idx) {
            indices.push(idx);
        }
    }
    indices
}

/// Run detection over a decoded frame sequence.
///
/// Samples frames per the configuration (or scans all of them when
/// `full_scan` is set), prepares each for matching (grayscale, optional
/// global downscale, optional blur, optional edge map), and records the best
/// match per frame. Frames where no scale variant fits yield no record.
///
/// Given the same frames, template, and configuration the resulting series
/// is byte-for-byte reproducible.
///
/// # Errors
///
/// Returns [`crate::Error::Config`] when the configuration is invalid.
pub fn detect_series(
    frames: &[RgbImage],
    fps: f64,
    template: &TemplateAsset,
    cfg: &DetectorConfig,
) -> Result<DetectionSeries> {
    cfg.validate()?;

    let mut series = DetectionSeries::default();
    if frames.is_empty() {
        return Ok(series);
    }

    let indices = if cfg.full_scan {
        (0..frames.len()).collect()
    } else {
        sample_indices(frames.len(), cfg.frames_to_scan)
    };

    let mut matcher = Matcher::new(template, cfg);
    for idx in indices {
        let frame = &frames[idx];
        let (gray, edges) = prepare_frame(frame, cfg);
        let Some(m) = matcher.match_frame(&gray, edges.as_ref(), frame.dimensions()) else {
            continue;
        };

        #[allow(clippy::cast_precision_loss)]
        let time = (fps > 0.0).then(|| idx as f64 / fps);
        series.push(DetectionRecord {
            frame_index: idx,
            time,
            bbox: m.bbox,
            score: m.score,
            raw_score: m.raw_score,
            edge_score: m.edge_score,
            z_score: m.z_score,
            scale: m.scale,
            accepted: m.score >= cfg.threshold,
        });
    }

    Ok(series)
}

/// Grayscale, downscale, blur, and edge-extract one frame for matching.
fn prepare_frame(frame: &RgbImage, cfg: &DetectorConfig) -> (GrayImage, Option<GrayImage>) {
    let mut gray = filter::to_gray(frame);

    let factor = cfg.downscale.factor_for(frame.width(), frame.height());
    if factor < 1.0 {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let w = ((f64::from(frame.width()) * f64::from(factor)).round() as u32).max(1);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let h = ((f64::from(frame.height()) * f64::from(factor)).round() as u32).max(1);
        gray = imageops::resize(&gray, w, h, imageops::FilterType::Triangle);
    }

    if cfg.blur_sigma > 0.0 {
        gray = filter::blur_gray(&gray, cfg.blur_sigma);
    }

    let edges = (cfg.edge_weight > 0.0).then(|| filter::canny(&gray, cfg.canny_low, cfg.canny_high));
    (gray, edges)
}

/// Stateful convenience wrapper over [`detect_series`].
///
/// Holds the template and configuration, remembers the most recent series,
/// and can render accepted detections as per-frame binary masks. This is a
/// call-shape convenience only; all matching lives in [`detect_series`].
pub struct Detector {
    template: TemplateAsset,
    cfg: DetectorConfig,
    last_series: Option<DetectionSeries>,
}

impl Detector {
    /// Create a detector, validating the configuration up front.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] when the configuration is invalid.
    pub fn new(template: TemplateAsset, cfg: DetectorConfig) -> Result<Self> {
        cfg.validate()?;
        Ok(Self {
            template,
            cfg,
            last_series: None,
        })
    }

    /// Detect over a frame sequence and cache the resulting series.
    ///
    /// # Errors
    ///
    /// Propagates [`detect_series`] errors.
    pub fn scan(&mut self, frames: &[RgbImage], fps: f64) -> Result<&DetectionSeries> {
        let series = detect_series(frames, fps, &self.template, &self.cfg)?;
        Ok(self.last_series.insert(series))
    }

    /// The series produced by the most recent [`Detector::scan`] call.
    #[must_use]
    pub fn last_series(&self) -> Option<&DetectionSeries> {
        self.last_series.as_ref()
    }

    /// Render the last scan's accepted regions as binary masks per frame.
    ///
    /// Pixels inside an accepted bbox are 255, everything else 0. Frames
    /// without accepted detections are absent from the map.
    #[must_use]
    pub fn zone_masks(&self, frame_w: u32, frame_h: u32) -> BTreeMap<usize, GrayImage> {
        let mut masks = BTreeMap::new();
        let Some(series) = self.last_series.as_ref() else {
            return masks;
        };
        for (frame_index, boxes) in series.detection_map() {
            let mut mask = GrayImage::new(frame_w, frame_h);
            for b in boxes {
                for y in b.y..b.bottom().min(frame_h) {
                    for x in b.x..b.right().min(frame_w) {
                        mask.put_pixel(x, y, image::Luma([255]));
                    }
                }
            }
            masks.insert(frame_index, mask);
        }
        masks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::ZoneMode;
    use image::{DynamicImage, Rgb};

    fn tile_rgb() -> RgbImage {
        RgbImage::from_fn(20, 20, |x, y| {
            if x == 0 || y == 0 || x == 19 || y == 19 {
                Rgb([10, 10, 10])
            } else if x < 10 {
                Rgb([230, 230, 230])
            } else {
                Rgb([60, 60, 60])
            }
        })
    }

    fn test_template() -> TemplateAsset {
        let gray = filter::to_gray(&tile_rgb());
        TemplateAsset::from_image(&DynamicImage::ImageLuma8(gray), 10).unwrap()
    }

    fn marked_frame() -> RgbImage {
        let mut frame = RgbImage::from_pixel(100, 100, Rgb([128, 128, 128]));
        let tile = tile_rgb();
        for (x, y, p) in tile.enumerate_pixels() {
            frame.put_pixel(50 + x, 50 + y, *p);
        }
        frame
    }

    fn clean_frame() -> RgbImage {
        RgbImage::from_pixel(100, 100, Rgb([128, 128, 128]))
    }

    fn exact_cfg() -> DetectorConfig {
        DetectorConfig {
            full_scan: true,
            scale_min: 1.0,
            scale_max: 1.0,
            scale_steps: 1,
            edge_weight: 0.0,
            z_weight: 0.0,
            ..DetectorConfig::default()
        }
    }

    #[test]
    fn sample_indices_returns_all_when_budget_covers() {
        assert_eq!(sample_indices(4, 10), vec![0, 1, 2, 3]);
        assert_eq!(sample_indices(5, 5), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn sample_indices_spans_range_evenly() {
        let indices = sample_indices(100, 5);
        assert_eq!(indices, vec![0, 25, 50, 74, 99]);
    }

    #[test]
    fn sample_indices_are_ascending_and_in_range() {
        for (total, desired) in [(100, 5), (1000, 24), (37, 7), (2, 1), (48, 47)] {
            let indices = sample_indices(total, desired);
            assert!(!indices.is_empty());
            assert!(indices.windows(2).all(|w| w[0] < w[1]), "{total}/{desired} not ascending");
            assert!(*indices.last().unwrap() < total);
            assert_eq!(indices[0], 0);
        }
    }

    #[test]
    fn sample_indices_edge_cases() {
        assert!(sample_indices(0, 5).is_empty());
        assert!(sample_indices(5, 0).is_empty());
        assert_eq!(sample_indices(100, 1), vec![0]);
    }

    #[test]
    fn detect_series_flags_marked_frames_only() {
        let mut frames = Vec::new();
        for i in 0..10 {
            frames.push(if (3..=6).contains(&i) {
                marked_frame()
            } else {
                clean_frame()
            });
        }

        let series = detect_series(&frames, 25.0, &test_template(), &exact_cfg()).unwrap();
        let accepted: Vec<usize> = series.accepted().map(|r| r.frame_index).collect();
        assert_eq!(accepted, vec![3, 4, 5, 6]);

        for r in series.accepted() {
            assert_eq!(r.bbox, BBox::clamped(50, 50, 20, 20, 100, 100));
            assert!(r.score >= 0.9);
            assert!(r.score >= r.raw_score.clamp(0.0, 1.0));
        }
    }

    #[test]
    fn detect_series_is_deterministic() {
        let frames = vec![marked_frame(), clean_frame(), marked_frame()];
        let template = test_template();
        let cfg = DetectorConfig {
            full_scan: true,
            ..DetectorConfig::default()
        };
        let a = detect_series(&frames, 30.0, &template, &cfg).unwrap();
        let b = detect_series(&frames, 30.0, &template, &cfg).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn detect_series_derives_time_from_fps() {
        let frames = vec![clean_frame(), marked_frame()];
        let series = detect_series(&frames, 25.0, &test_template(), &exact_cfg()).unwrap();
        let record = &series.records()[0];
        assert_eq!(record.frame_index, 1);
        assert!((record.time.unwrap() - 0.04).abs() < 1e-9);

        let series = detect_series(&frames, 0.0, &test_template(), &exact_cfg()).unwrap();
        assert!(series.records()[0].time.is_none());
    }

    #[test]
    fn detect_series_rejects_bad_config() {
        let cfg = DetectorConfig {
            threshold: 2.0,
            ..DetectorConfig::default()
        };
        assert!(detect_series(&[], 0.0, &test_template(), &cfg).is_err());
    }

    #[test]
    fn detection_map_groups_accepted_by_frame() {
        let mut series = DetectionSeries::default();
        let bbox = BBox::clamped(0, 0, 10, 10, 100, 100);
        for (idx, accepted) in [(2_usize, true), (2, true), (5, false), (7, true)] {
            series.push(DetectionRecord {
                frame_index: idx,
                time: None,
                bbox,
                score: if accepted { 0.9 } else { 0.1 },
                raw_score: 0.5,
                edge_score: None,
                z_score: None,
                scale: 1.0,
                accepted,
            });
        }

        let map = series.detection_map();
        assert_eq!(map.len(), 2);
        assert_eq!(map[&2].len(), 2);
        assert_eq!(map[&7].len(), 1);
        assert!(!map.contains_key(&5));
    }

    #[test]
    fn from_zones_flags_every_frame() {
        let zones = [
            Zone {
                x: 10,
                y: 10,
                width: 20,
                height: 20,
                mode: ZoneMode::Delogo,
            },
            Zone {
                x: -5,
                y: 60,
                width: 30,
                height: 30,
                mode: ZoneMode::Blur,
            },
        ];
        let series = DetectionSeries::from_zones(&zones, 3, 100, 100);
        assert_eq!(series.len(), 6);
        assert!(series.records().iter().all(|r| r.accepted));

        let map = series.detection_map();
        assert_eq!(map.len(), 3);
        assert_eq!(map[&0].len(), 2);
        assert_eq!(map[&0][1], BBox::clamped(-5, 60, 30, 30, 100, 100));
    }

    #[test]
    fn detector_facade_caches_series_and_renders_masks() {
        let frames = vec![marked_frame(), clean_frame()];
        let mut detector = Detector::new(test_template(), exact_cfg()).unwrap();
        assert!(detector.last_series().is_none());

        let len = detector.scan(&frames, 25.0).unwrap().len();
        assert_eq!(detector.last_series().unwrap().len(), len);

        let masks = detector.zone_masks(100, 100);
        let mask = &masks[&0];
        assert_eq!(mask.get_pixel(55, 55)[0], 255);
        assert_eq!(mask.get_pixel(10, 10)[0], 0);
        assert!(!masks.contains_key(&1));
    }

    #[test]
    fn empty_frame_sequence_yields_empty_series() {
        let series =
            detect_series(&[], 25.0, &test_template(), &DetectorConfig::default()).unwrap();
        assert!(series.is_empty());
    }
}
