//! Temporal restoration.
//!
//! Replaces detected regions with content reconstructed from nearby clean
//! frames. For every flagged region the engine walks outward from the
//! flagged frame, collects donor frames whose own detections stay clear of
//! the region, median-aggregates the donor patches to suppress stragglers,
//! and composites the result seamlessly. Regions with no usable donor fall
//! back to single-frame inpainting.
//!
//! Donor patches are always cropped from the pristine input frames, never
//! from frames the engine already rewrote.

use std::collections::BTreeMap;

use image::RgbImage;

use crate::blend::{self, BlendError};
use crate::config::RestoreConfig;
use crate::detector::DetectionSeries;
use crate::error::{Error, Result};
use crate::filter;
use crate::region::{BBox, Zone, ZoneMode};

/// Smallest blur strength applied to blur-mode zones.
const ZONE_BLUR_SIGMA_MIN: f32 = 2.0;
/// Blur-mode sigma is the zone's short side divided by this.
const ZONE_BLUR_SIDE_DIVISOR: f32 = 8.0;

/// Per-video restoration counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RestoreStats {
    /// Regions examined, including skipped ones.
    pub regions: usize,
    /// Regions composited with a seamless blend.
    pub blended: usize,
    /// Regions pasted directly after a blend failure.
    pub pasted: usize,
    /// Regions reconstructed by single-frame inpainting.
    pub inpainted: usize,
    /// Regions softened in place (blur-mode zones).
    pub blurred: usize,
    /// Regions below the minimum size, left untouched.
    pub skipped_small: usize,
}

impl RestoreStats {
    /// Regions that were actually rewritten.
    #[must_use]
    pub fn restored(&self) -> usize {
        self.blended + self.pasted + self.inpainted + self.blurred
    }
}

/// What to do with a region when no donor frame qualifies.
#[derive(Debug, Clone, Copy)]
enum Fallback {
    Inpaint,
    Blur,
}

/// Restore every accepted detection in the series.
///
/// Frames without accepted detections are returned byte-identical. The
/// detected bounding box is gated against `min_size` before padding is
/// applied, so marginal detections never grow into processable regions.
///
/// # Errors
///
/// Returns [`Error::Config`] when the configuration fails validation and
/// [`Error::Processing`] when the series references frames beyond the input.
pub fn restore_frames(
    frames: &[RgbImage],
    series: &DetectionSeries,
    cfg: &RestoreConfig,
) -> Result<(Vec<RgbImage>, RestoreStats)> {
    cfg.validate()?;
    let mut out: Vec<RgbImage> = frames.to_vec();
    let mut stats = RestoreStats::default();
    let flagged = series.detection_map();

    for (&frame_index, regions) in &flagged {
        if frame_index >= frames.len() {
            return Err(Error::Processing(format!(
                "detection series references frame {frame_index} beyond input ({} frames)",
                frames.len()
            )));
        }
        for detected in regions {
            restore_region(
                frames,
                &mut out[frame_index],
                frame_index,
                detected,
                &flagged,
                cfg,
                Fallback::Inpaint,
                &mut stats,
            );
        }
    }
    Ok((out, stats))
}

/// Restore manually drawn zones across the whole clip.
///
/// Every zone applies to every frame. `delogo` zones run the full donor
/// chain (a static overlay contaminates all frames, so they naturally land
/// in the inpainting arm), `blur` zones are softened in place without
/// padding or size gates, and `hybrid` zones run the donor chain with blur
/// as the no-donor fallback. Donor qualification considers all zones
/// regardless of mode.
///
/// # Errors
///
/// Returns [`Error::Config`] when the configuration fails validation.
pub fn restore_zones(
    frames: &[RgbImage],
    zones: &[Zone],
    cfg: &RestoreConfig,
) -> Result<(Vec<RgbImage>, RestoreStats)> {
    cfg.validate()?;
    let mut out: Vec<RgbImage> = frames.to_vec();
    let mut stats = RestoreStats::default();
    if frames.is_empty() || zones.is_empty() {
        return Ok((out, stats));
    }
    let (frame_w, frame_h) = frames[0].dimensions();
    let flagged = DetectionSeries::from_zones(zones, frames.len(), frame_w, frame_h)
        .detection_map();

    for zone in zones {
        let bbox = zone.to_bbox(frame_w, frame_h);
        match zone.mode {
            ZoneMode::Blur => {
                let sigma = zone_blur_sigma(&bbox);
                for frame in &mut out {
                    blend::blur_region(frame, &bbox, sigma);
                    stats.regions += 1;
                    stats.blurred += 1;
                }
            }
            ZoneMode::Delogo | ZoneMode::Hybrid => {
                let fallback = match zone.mode {
                    ZoneMode::Hybrid => Fallback::Blur,
                    _ => Fallback::Inpaint,
                };
                for frame_index in 0..frames.len() {
                    restore_region(
                        frames,
                        &mut out[frame_index],
                        frame_index,
                        &bbox,
                        &flagged,
                        cfg,
                        fallback,
                        &mut stats,
                    );
                }
            }
        }
    }
    Ok((out, stats))
}

/// Restore one region of one frame, updating the counters.
#[allow(clippy::too_many_arguments)]
fn restore_region(
    input: &[RgbImage],
    frame_out: &mut RgbImage,
    frame_index: usize,
    detected: &BBox,
    flagged: &BTreeMap<usize, Vec<BBox>>,
    cfg: &RestoreConfig,
    fallback: Fallback,
    stats: &mut RestoreStats,
) {
    stats.regions += 1;
    if detected.width < cfg.min_size || detected.height < cfg.min_size {
        stats.skipped_small += 1;
        return;
    }
    let (frame_w, frame_h) = frame_out.dimensions();
    let region = detected.expand(cfg.padding_px, cfg.padding_pct, frame_w, frame_h);

    let donors = donor_patches(input, frame_index, &region, flagged, cfg);
    if donors.is_empty() {
        match fallback {
            Fallback::Inpaint => {
                blend::inpaint(frame_out, &region, cfg.inpaint_method, cfg.inpaint_radius);
                stats.inpainted += 1;
            }
            Fallback::Blur => {
                blend::blur_region(frame_out, &region, zone_blur_sigma(&region));
                stats.blurred += 1;
            }
        }
        return;
    }

    let patch = median_patch(&donors);
    match blend::seamless_blend(frame_out, &patch, &region, cfg.blend_mode) {
        Ok(()) => stats.blended += 1,
        Err(BlendError::Degenerate | BlendError::NonFinite) => {
            blend::paste(frame_out, &patch, &region);
            stats.pasted += 1;
        }
    }
}

/// Collect donor patches for a region, nearest frames first.
///
/// The walk alternates one frame backward, one frame forward, widening the
/// offset until `search_span`. A candidate qualifies when every flagged
/// region of that frame overlaps the target region with IoU below
/// `max_iou`; unflagged frames qualify outright. Stops at `pool_size`.
fn donor_patches(
    input: &[RgbImage],
    frame_index: usize,
    region: &BBox,
    flagged: &BTreeMap<usize, Vec<BBox>>,
    cfg: &RestoreConfig,
) -> Vec<RgbImage> {
    let mut patches = Vec::with_capacity(cfg.pool_size);
    'walk: for offset in 1..=cfg.search_span {
        let backward = frame_index.checked_sub(offset);
        let forward = frame_index + offset;
        let forward = (forward < input.len()).then_some(forward);
        for idx in backward.into_iter().chain(forward) {
            let frame = &input[idx];
            if frame.width() < region.right() || frame.height() < region.bottom() {
                continue;
            }
            let clean = flagged
                .get(&idx)
                .is_none_or(|regions| regions.iter().all(|r| r.iou(region) < cfg.max_iou));
            if !clean {
                continue;
            }
            patches.push(filter::crop_rgb(frame, region));
            if patches.len() == cfg.pool_size {
                break 'walk;
            }
        }
    }
    patches
}

/// Per-pixel per-channel median of equally sized patches. Even pool sizes
/// take the rounded mean of the middle pair.
fn median_patch(patches: &[RgbImage]) -> RgbImage {
    let (w, h) = patches[0].dimensions();
    let mut out = RgbImage::new(w, h);
    let mut values: Vec<u8> = Vec::with_capacity(patches.len());
    for y in 0..h {
        for x in 0..w {
            let px = out.get_pixel_mut(x, y);
            for ch in 0..3 {
                values.clear();
                values.extend(patches.iter().map(|p| p.get_pixel(x, y)[ch]));
                values.sort_unstable();
                let mid = values.len() / 2;
                px[ch] = if values.len() % 2 == 1 {
                    values[mid]
                } else {
                    middle_mean(values[mid - 1], values[mid])
                };
            }
        }
    }
    out
}

/// Rounded mean of two bytes.
fn middle_mean(a: u8, b: u8) -> u8 {
    #[allow(clippy::cast_possible_truncation)]
    {
        ((u16::from(a) + u16::from(b) + 1) / 2) as u8
    }
}

/// Blur strength scaled to the zone's short side.
fn zone_blur_sigma(region: &BBox) -> f32 {
    #[allow(clippy::cast_precision_loss)]
    let side = region.width.min(region.height) as f32;
    (side / ZONE_BLUR_SIDE_DIVISOR).max(ZONE_BLUR_SIGMA_MIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::DetectionRecord;
    use image::Rgb;

    const BG: Rgb<u8> = Rgb([40, 90, 140]);
    const MARK: Rgb<u8> = Rgb([255, 0, 255]);

    fn solid_frames(count: usize) -> Vec<RgbImage> {
        (0..count).map(|_| RgbImage::from_pixel(60, 60, BG)).collect()
    }

    fn stamp(frame: &mut RgbImage, bbox: &BBox, color: Rgb<u8>) {
        for y in bbox.y..bbox.bottom() {
            for x in bbox.x..bbox.right() {
                frame.put_pixel(x, y, color);
            }
        }
    }

    fn record(frame_index: usize, bbox: BBox) -> DetectionRecord {
        DetectionRecord {
            frame_index,
            time: None,
            bbox,
            score: 0.95,
            raw_score: 0.95,
            edge_score: None,
            z_score: None,
            scale: 1.0,
            accepted: true,
        }
    }

    fn series_of(records: Vec<DetectionRecord>) -> DetectionSeries {
        let mut series = DetectionSeries::default();
        for r in records {
            series.push(r);
        }
        series
    }

    #[test]
    fn empty_series_passes_frames_through_byte_identical() {
        let frames = solid_frames(4);
        let (out, stats) =
            restore_frames(&frames, &DetectionSeries::default(), &RestoreConfig::default())
                .unwrap();
        assert_eq!(out, frames);
        assert_eq!(stats, RestoreStats::default());
    }

    #[test]
    fn regions_below_min_size_are_left_untouched() {
        let bbox = BBox::clamped(20, 20, 8, 8, 60, 60);
        let mut frames = solid_frames(3);
        stamp(&mut frames[1], &bbox, MARK);

        let cfg = RestoreConfig {
            min_size: 12,
            ..RestoreConfig::default()
        };
        let (out, stats) = restore_frames(&frames, &series_of(vec![record(1, bbox)]), &cfg).unwrap();

        assert_eq!(out[1], frames[1], "undersized region must not be rewritten");
        assert_eq!(stats.regions, 1);
        assert_eq!(stats.skipped_small, 1);
        assert_eq!(stats.restored(), 0);
    }

    #[test]
    fn donor_median_recovers_the_background() {
        let bbox = BBox::clamped(20, 20, 12, 12, 60, 60);
        let mut frames = solid_frames(7);
        stamp(&mut frames[3], &bbox, MARK);

        let (out, stats) = restore_frames(
            &frames,
            &series_of(vec![record(3, bbox)]),
            &RestoreConfig::default(),
        )
        .unwrap();

        assert_eq!(stats.blended, 1, "clean donors should blend, got {stats:?}");
        let px = out[3].get_pixel(26, 26);
        for ch in 0..3 {
            let diff = (i32::from(px[ch]) - i32::from(BG[ch])).abs();
            assert!(diff <= 2, "channel {ch} off by {diff}");
        }
        // untouched frames come through byte-identical
        assert_eq!(out[2], frames[2]);
        assert_eq!(out[4], frames[4]);
    }

    #[test]
    fn flagged_donors_are_rejected_and_inpainting_takes_over() {
        let bbox = BBox::clamped(20, 20, 12, 12, 60, 60);
        let mut frames = solid_frames(5);
        let records = (0..5)
            .map(|i| {
                stamp(&mut frames[i], &bbox, MARK);
                record(i, bbox)
            })
            .collect();

        let cfg = RestoreConfig {
            max_iou: 0.2,
            ..RestoreConfig::default()
        };
        let (out, stats) = restore_frames(&frames, &series_of(records), &cfg).unwrap();

        assert_eq!(stats.inpainted, 5, "no donor should survive, got {stats:?}");
        assert_eq!(stats.blended + stats.pasted, 0);
        let px = out[2].get_pixel(26, 26);
        for ch in 0..3 {
            let diff = (i32::from(px[ch]) - i32::from(BG[ch])).abs();
            assert!(diff <= 2, "channel {ch} off by {diff}");
        }
    }

    #[test]
    fn donor_walk_prefers_nearby_frames() {
        let bbox = BBox::clamped(20, 20, 12, 12, 60, 60);
        let near = Rgb([100, 100, 100]);
        let far = Rgb([220, 220, 220]);
        let mut frames: Vec<RgbImage> = (0..11)
            .map(|i| {
                let color = if (3..=7).contains(&i) { near } else { far };
                RgbImage::from_pixel(60, 60, color)
            })
            .collect();
        stamp(&mut frames[5], &bbox, MARK);

        let (out, stats) = restore_frames(
            &frames,
            &series_of(vec![record(5, bbox)]),
            &RestoreConfig::default(),
        )
        .unwrap();

        // pool_size 5 fills with four near-band donors plus a single far one;
        // the median keeps the near value
        assert_eq!(stats.blended, 1);
        let px = out[5].get_pixel(26, 26);
        let diff = (i32::from(px[0]) - i32::from(near[0])).abs();
        assert!(diff <= 2, "expected near-band color, got {px:?}");
    }

    #[test]
    fn median_discards_an_unflagged_dirty_donor() {
        let bbox = BBox::clamped(20, 20, 12, 12, 60, 60);
        let mut frames = solid_frames(7);
        stamp(&mut frames[3], &bbox, MARK);
        // frame 1 is dirty at the same spot but nothing flagged it
        let padded = bbox.expand(6, 0.15, 60, 60);
        stamp(&mut frames[1], &padded, Rgb([0, 255, 0]));

        let (out, stats) = restore_frames(
            &frames,
            &series_of(vec![record(3, bbox)]),
            &RestoreConfig::default(),
        )
        .unwrap();

        assert_eq!(stats.blended, 1);
        let px = out[3].get_pixel(26, 26);
        for ch in 0..3 {
            let diff = (i32::from(px[ch]) - i32::from(BG[ch])).abs();
            assert!(diff <= 2, "median should reject the outlier, channel {ch}");
        }
    }

    #[test]
    fn blend_failure_falls_back_to_paste() {
        let bbox = BBox::clamped(10, 10, 2, 2, 60, 60);
        let mut frames = solid_frames(5);
        stamp(&mut frames[2], &bbox, MARK);

        let cfg = RestoreConfig {
            min_size: 1,
            padding_px: 0,
            padding_pct: 0.0,
            ..RestoreConfig::default()
        };
        let (out, stats) = restore_frames(&frames, &series_of(vec![record(2, bbox)]), &cfg).unwrap();

        assert_eq!(stats.pasted, 1, "2x2 region cannot blend, got {stats:?}");
        assert_eq!(*out[2].get_pixel(10, 10), BG);
        assert_eq!(*out[2].get_pixel(11, 11), BG);
    }

    #[test]
    fn series_pointing_past_the_input_is_an_error() {
        let frames = solid_frames(2);
        let bbox = BBox::clamped(0, 0, 12, 12, 60, 60);
        let err = restore_frames(
            &frames,
            &series_of(vec![record(9, bbox)]),
            &RestoreConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Processing(_)), "got {err:?}");
    }

    #[test]
    fn median_patch_averages_the_middle_pair_on_even_pools() {
        let a = RgbImage::from_pixel(2, 2, Rgb([10, 10, 10]));
        let b = RgbImage::from_pixel(2, 2, Rgb([20, 20, 20]));
        let c = RgbImage::from_pixel(2, 2, Rgb([200, 200, 200]));
        let d = RgbImage::from_pixel(2, 2, Rgb([201, 201, 201]));
        let median = median_patch(&[a, b, c, d]);
        assert_eq!(*median.get_pixel(0, 0), Rgb([110, 110, 110]));
    }

    #[test]
    fn blur_zone_softens_every_frame_in_place() {
        let zone = Zone {
            x: 12,
            y: 12,
            width: 18,
            height: 18,
            mode: ZoneMode::Blur,
        };
        let frames: Vec<RgbImage> = (0..3)
            .map(|_| {
                RgbImage::from_fn(60, 60, |x, y| {
                    let v = if (x + y) % 2 == 0 { 0 } else { 255 };
                    Rgb([v, v, v])
                })
            })
            .collect();

        let (out, stats) = restore_zones(&frames, &[zone], &RestoreConfig::default()).unwrap();

        assert_eq!(stats.blurred, 3);
        assert_eq!(stats.regions, 3);
        for frame in &out {
            let inside = frame.get_pixel(20, 20)[0];
            assert!((60..=200).contains(&inside), "expected smoothing, got {inside}");
            assert_eq!(frame.get_pixel(40, 40), frames[0].get_pixel(40, 40));
        }
    }

    #[test]
    fn static_delogo_zone_lands_in_the_inpainting_arm() {
        let zone = Zone {
            x: 20,
            y: 20,
            width: 12,
            height: 12,
            mode: ZoneMode::Delogo,
        };
        let bbox = zone.to_bbox(60, 60);
        let mut frames = solid_frames(4);
        for frame in &mut frames {
            stamp(frame, &bbox, MARK);
        }

        let cfg = RestoreConfig {
            max_iou: 0.2,
            ..RestoreConfig::default()
        };
        let (out, stats) = restore_zones(&frames, &[zone], &cfg).unwrap();

        assert_eq!(stats.inpainted, 4, "static overlay has no donors, got {stats:?}");
        let px = out[1].get_pixel(26, 26);
        for ch in 0..3 {
            let diff = (i32::from(px[ch]) - i32::from(BG[ch])).abs();
            assert!(diff <= 2, "channel {ch} off by {diff}");
        }
    }

    #[test]
    fn hybrid_zone_falls_back_to_blur_without_donors() {
        let zone = Zone {
            x: 20,
            y: 20,
            width: 14,
            height: 14,
            mode: ZoneMode::Hybrid,
        };
        let bbox = zone.to_bbox(60, 60);
        let mut frames = solid_frames(3);
        for frame in &mut frames {
            // checkered overlay so the blur fallback is observable
            for y in bbox.y..bbox.bottom() {
                for x in bbox.x..bbox.right() {
                    let v = if (x + y) % 2 == 0 { 0 } else { 255 };
                    frame.put_pixel(x, y, Rgb([v, v, v]));
                }
            }
        }

        let cfg = RestoreConfig {
            max_iou: 0.2,
            ..RestoreConfig::default()
        };
        let (out, stats) = restore_zones(&frames, &[zone], &cfg).unwrap();

        assert_eq!(stats.blurred, 3, "hybrid without donors blurs, got {stats:?}");
        assert_eq!(stats.inpainted, 0);
        let inside = out[0].get_pixel(27, 27)[0];
        assert!((60..=200).contains(&inside), "expected smoothing, got {inside}");
    }
}
