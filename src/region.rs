//! Rectangular regions: clamped bounding boxes, overlap math, and the
//! zone records exchanged with manual editing tools.

use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle in frame pixel coordinates.
///
/// Always in-bounds for the frame it was built against: `x + width <= frame_w`,
/// `y + height <= frame_h`, and both dimensions are at least 1. Construct via
/// [`BBox::clamped`]; the fields themselves are never out of range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BBox {
    /// Left edge in pixels.
    pub x: u32,
    /// Top edge in pixels.
    pub y: u32,
    /// Width in pixels (>= 1).
    pub width: u32,
    /// Height in pixels (>= 1).
    pub height: u32,
}

impl BBox {
    /// Build a bbox from signed coordinates, clamped into a frame.
    ///
    /// Inputs may be negative or overshoot the frame (drag gestures, padded
    /// regions, inverse-scaled match locations); the result always satisfies
    /// the in-bounds invariants with at least 1x1 extent.
    #[must_use]
    pub fn clamped(x: i64, y: i64, width: i64, height: i64, frame_w: u32, frame_h: u32) -> Self {
        let fw = i64::from(frame_w.max(1));
        let fh = i64::from(frame_h.max(1));

        let x0 = x.clamp(0, fw - 1);
        let y0 = y.clamp(0, fh - 1);
        let x1 = x.saturating_add(width).clamp(x0 + 1, fw);
        let y1 = y.saturating_add(height).clamp(y0 + 1, fh);

        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        Self {
            x: x0 as u32,
            y: y0 as u32,
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
        }
    }

    /// Exclusive right edge (`x + width`).
    #[must_use]
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Exclusive bottom edge (`y + height`).
    #[must_use]
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    /// Area in pixels.
    #[must_use]
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Intersection area with another bbox, zero when disjoint.
    #[must_use]
    pub fn intersection_area(&self, other: &BBox) -> u64 {
        let ix = self.x.max(other.x);
        let iy = self.y.max(other.y);
        let ix2 = self.right().min(other.right());
        let iy2 = self.bottom().min(other.bottom());
        if ix >= ix2 || iy >= iy2 {
            return 0;
        }
        u64::from(ix2 - ix) * u64::from(iy2 - iy)
    }

    /// Intersection-over-Union with another bbox in `[0, 1]`.
    ///
    /// Zero when the boxes do not overlap; the union area is floored at 1
    /// so the ratio is always defined.
    #[must_use]
    pub fn iou(&self, other: &BBox) -> f32 {
        let inter = self.intersection_area(other);
        let union = (self.area() + other.area() - inter).max(1);
        #[allow(clippy::cast_precision_loss)]
        {
            inter as f32 / union as f32
        }
    }

    /// Expand by the padding policy and reclamp into the frame.
    ///
    /// Each axis is padded by `max(pad_px, round(dim * pad_pct))` on both
    /// sides.
    #[must_use]
    pub fn expand(&self, pad_px: u32, pad_pct: f32, frame_w: u32, frame_h: u32) -> Self {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let pad_for = |dim: u32| -> i64 {
            let pct = (f64::from(dim) * f64::from(pad_pct)).round() as i64;
            i64::from(pad_px).max(pct)
        };
        let px = pad_for(self.width);
        let py = pad_for(self.height);

        Self::clamped(
            i64::from(self.x) - px,
            i64::from(self.y) - py,
            i64::from(self.width) + 2 * px,
            i64::from(self.height) + 2 * py,
            frame_w,
            frame_h,
        )
    }
}

/// Removal strategy attached to a manually drawn zone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneMode {
    /// Full temporal restoration (donor search, blend, inpaint fallback).
    #[default]
    Delogo,
    /// Blur the zone in place without borrowing donor pixels.
    Blur,
    /// Temporal restoration with a blur fallback when no donor exists.
    Hybrid,
}

/// A manually specified removal zone, as produced by external editing tools.
///
/// Coordinates are signed because drag gestures may overshoot the frame;
/// [`Zone::to_bbox`] clamps them. Unknown extra fields in the JSON records
/// are ignored; an unknown `mode` value is rejected at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    /// Left edge, may be negative.
    pub x: i64,
    /// Top edge, may be negative.
    pub y: i64,
    /// Width, may overshoot the frame.
    pub width: i64,
    /// Height, may overshoot the frame.
    pub height: i64,
    /// Removal strategy; defaults to `delogo` when absent.
    #[serde(default)]
    pub mode: ZoneMode,
}

impl Zone {
    /// Clamp the zone into a frame of the given dimensions.
    #[must_use]
    pub fn to_bbox(&self, frame_w: u32, frame_h: u32) -> BBox {
        BBox::clamped(self.x, self.y, self.width, self.height, frame_w, frame_h)
    }
}
