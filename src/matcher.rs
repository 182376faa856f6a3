//! Multi-scale template matching.
//!
//! Locates the best placement of a prepared template inside a frame across a
//! range of candidate scales. Three signals feed one combined score: masked
//! zero-mean normalized correlation, Canny edge-map correlation, and a local
//! z-score measuring how sharply the best peak stands out from the rest of
//! the correlation response surface. Blending is monotonic non-decreasing:
//! edge and statistical evidence can raise a score above the raw correlation
//! but never lower it.

use std::collections::HashMap;

use image::{imageops, GrayImage};

use crate::config::DetectorConfig;
use crate::filter;
use crate::region::BBox;
use crate::template::TemplateAsset;

/// Weighted-variance floor below which a template variant cannot be matched.
const MIN_TEMPLATE_VARIANCE: f32 = 1e-6;
/// Variance floor below which a frame window counts as flat and is skipped.
const MIN_WINDOW_VARIANCE: f32 = 1e-6;
/// Stabilizer added to the response-surface standard deviation.
const Z_EPSILON: f32 = 1e-6;
/// Divisor inside the `tanh` compression of the z-score.
const Z_COMPRESSION: f32 = 3.0;
/// Cache keys quantize resolved scales to four decimal places.
const SCALE_KEY_PRECISION: f32 = 10_000.0;

/// Best match found in one frame across all scale variants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameMatch {
    /// Matched region in full-resolution frame coordinates.
    pub bbox: BBox,
    /// Combined score in `[0, 1]`.
    pub score: f32,
    /// Raw correlation at the best location.
    pub raw_score: f32,
    /// Best edge-map correlation, when the edge pass ran for this variant.
    pub edge_score: Option<f32>,
    /// Compressed response-surface z-score, when z-weighting is enabled.
    pub z_score: Option<f32>,
    /// Scale variant that produced the best match.
    pub scale: f32,
}

/// Precomputed matching statistics for one resized template buffer.
///
/// `t_prime` holds the weighted zero-mean template so the scan's inner loop
/// reduces to a dot product; `sum_w` and `var_t` complete the normalization.
/// A missing mask is an all-ones weight plane, which makes the same code path
/// plain coefficient-normalized correlation.
struct ScanPlan {
    width: usize,
    height: usize,
    sum_w: f32,
    var_t: f32,
    t_prime: Vec<f32>,
    weights: Vec<f32>,
}

/// Scan output: the best placement plus response-surface statistics.
struct Response {
    x: u32,
    y: u32,
    best: f32,
    mean: f32,
    std: f32,
}

impl ScanPlan {
    /// Build a plan from a grayscale buffer and optional binary mask.
    ///
    /// Returns `None` when fewer than two pixels carry weight or the weighted
    /// variance is too small to normalize against (a flat template variant
    /// matches everything equally and is useless).
    fn build(gray: &GrayImage, mask: Option<&GrayImage>) -> Option<Self> {
        let (w, h) = gray.dimensions();
        let len = (w * h) as usize;
        if len == 0 {
            return None;
        }

        let mut weights = vec![1.0_f32; len];
        if let Some(m) = mask {
            debug_assert_eq!(m.dimensions(), gray.dimensions());
            for (slot, p) in weights.iter_mut().zip(m.pixels()) {
                if p[0] == 0 {
                    *slot = 0.0;
                }
            }
        }
        let sum_w: f32 = weights.iter().sum();
        if sum_w < 2.0 {
            return None;
        }

        let values: Vec<f32> = gray.pixels().map(|p| f32::from(p[0])).collect();
        let mean = values
            .iter()
            .zip(&weights)
            .map(|(v, wt)| v * wt)
            .sum::<f32>()
            / sum_w;

        let mut var_t = 0.0_f32;
        let mut t_prime = vec![0.0_f32; len];
        for i in 0..len {
            let d = values[i] - mean;
            var_t += weights[i] * d * d;
            t_prime[i] = weights[i] * d;
        }
        if var_t <= MIN_TEMPLATE_VARIANCE {
            return None;
        }

        Some(Self {
            width: w as usize,
            height: h as usize,
            sum_w,
            var_t,
            t_prime,
            weights,
        })
    }

    /// Correlate the template against every placement in the frame plane.
    ///
    /// Flat windows are skipped for peak tracking but still count toward the
    /// response surface (as zero), matching how a dense response matrix
    /// behaves. Returns `None` when the template does not fit or no window
    /// had usable variance.
    fn scan(&self, frame: &[f32], frame_w: usize, frame_h: usize) -> Option<Response> {
        if frame_w < self.width || frame_h < self.height {
            return None;
        }
        let max_x = frame_w - self.width;
        let max_y = frame_h - self.height;

        let mut best: Option<(usize, usize, f32)> = None;
        let mut sum_s = 0.0_f64;
        let mut sum_s2 = 0.0_f64;

        for y in 0..=max_y {
            for x in 0..=max_x {
                let mut dot = 0.0_f32;
                let mut sum_i = 0.0_f32;
                let mut sum_i2 = 0.0_f32;

                for ty in 0..self.height {
                    let t_base = ty * self.width;
                    let f_base = (y + ty) * frame_w + x;
                    for tx in 0..self.width {
                        let v = frame[f_base + tx];
                        let wt = self.weights[t_base + tx];
                        dot += self.t_prime[t_base + tx] * v;
                        sum_i += wt * v;
                        sum_i2 += wt * v * v;
                    }
                }

                let var_i = sum_i2 - sum_i * sum_i / self.sum_w;
                if var_i <= MIN_WINDOW_VARIANCE {
                    continue;
                }
                let score = dot / (self.var_t * var_i).sqrt();
                if !score.is_finite() {
                    continue;
                }

                sum_s += f64::from(score);
                sum_s2 += f64::from(score) * f64::from(score);
                if best.is_none_or(|(_, _, b)| score > b) {
                    best = Some((x, y, score));
                }
            }
        }

        let (bx, by, bscore) = best?;
        #[allow(clippy::cast_precision_loss)]
        let n = ((max_x + 1) * (max_y + 1)) as f64;
        let mean = sum_s / n;
        let var = (sum_s2 / n - mean * mean).max(0.0);

        #[allow(clippy::cast_possible_truncation)]
        Some(Response {
            x: bx as u32,
            y: by as u32,
            best: bscore,
            mean: mean as f32,
            std: var.sqrt() as f32,
        })
    }
}

/// One cached template variant at a resolved scale.
struct Variant {
    width: u32,
    height: u32,
    plan: Option<ScanPlan>,
    edge_plan: Option<ScanPlan>,
}

/// Multi-scale matcher for one template over one video.
///
/// Owns a cache of resized template variants keyed by the resolved scale
/// (variant scale times any global frame downscale), so repeated frames at
/// the same resolution reuse prepared plans. Create one matcher per video;
/// the cache is deliberately not shared across videos.
pub struct Matcher<'a> {
    template: &'a TemplateAsset,
    cfg: DetectorConfig,
    template_edges: Option<GrayImage>,
    cache: HashMap<u32, Variant>,
}

impl<'a> Matcher<'a> {
    /// Create a matcher for a template under the given configuration.
    ///
    /// The template's Canny edge map is computed here once (masked by the
    /// template mask when present) and resized per scale variant later.
    #[must_use]
    pub fn new(template: &'a TemplateAsset, cfg: &DetectorConfig) -> Self {
        let template_edges = (cfg.edge_weight > 0.0).then(|| {
            let mut edges = filter::canny(template.gray(), cfg.canny_low, cfg.canny_high);
            if let Some(mask) = template.mask() {
                for (e, m) in edges.pixels_mut().zip(mask.pixels()) {
                    if m[0] == 0 {
                        e[0] = 0;
                    }
                }
            }
            edges
        });

        Self {
            template,
            cfg: cfg.clone(),
            template_edges,
            cache: HashMap::new(),
        }
    }

    /// The ascending list of configured scale variants.
    fn scale_variants(&self) -> Vec<f32> {
        let steps = self.cfg.scale_steps;
        if steps == 1 {
            return vec![self.cfg.scale_min];
        }
        #[allow(clippy::cast_precision_loss)]
        (0..steps)
            .map(|i| {
                self.cfg.scale_min
                    + (self.cfg.scale_max - self.cfg.scale_min) * i as f32 / (steps - 1) as f32
            })
            .collect()
    }

    /// Fetch or build the cached variant for a resolved scale.
    fn variant(&mut self, resolved: f32) -> &Variant {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let key = (resolved * SCALE_KEY_PRECISION).round() as u32;
        if self.cache.contains_key(&key) {
            return &self.cache[&key];
        }
        let built = self.build_variant(resolved);
        self.cache.entry(key).or_insert(built)
    }

    fn build_variant(&self, resolved: f32) -> Variant {
        let (tw, th) = self.template.size();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let rw = (f64::from(tw) * f64::from(resolved)).round() as u32;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let rh = (f64::from(th) * f64::from(resolved)).round() as u32;

        if rw < 2 || rh < 2 {
            return Variant {
                width: rw,
                height: rh,
                plan: None,
                edge_plan: None,
            };
        }

        let gray = imageops::resize(
            self.template.gray(),
            rw,
            rh,
            imageops::FilterType::Triangle,
        );
        // Nearest keeps binary buffers binary; no re-thresholding needed.
        let mask = self
            .template
            .mask()
            .map(|m| imageops::resize(m, rw, rh, imageops::FilterType::Nearest));

        let plan = ScanPlan::build(&gray, mask.as_ref());
        let edge_plan = self.template_edges.as_ref().and_then(|e| {
            let edges = imageops::resize(e, rw, rh, imageops::FilterType::Nearest);
            ScanPlan::build(&edges, mask.as_ref())
        });

        Variant {
            width: rw,
            height: rh,
            plan,
            edge_plan,
        }
    }

    /// Find the best template placement in one frame.
    ///
    /// `gray` is the analysis frame, possibly already downscaled and blurred;
    /// `edges` is its Canny map when edge scoring is enabled. `full_size` is
    /// the original frame dimension used to resolve scales and to map the
    /// result back to full-resolution coordinates.
    ///
    /// Returns `None` when no scale variant fits inside the frame or every
    /// candidate window was flat — a frame without a result is not an error.
    pub fn match_frame(
        &mut self,
        gray: &GrayImage,
        edges: Option<&GrayImage>,
        full_size: (u32, u32),
    ) -> Option<FrameMatch> {
        let (full_w, full_h) = full_size;
        if full_w == 0 || full_h == 0 || gray.width() == 0 || gray.height() == 0 {
            return None;
        }
        let global = f64::from(gray.width()) / f64::from(full_w);

        let frame_w = gray.width() as usize;
        let frame_h = gray.height() as usize;
        let frame_plane = filter::plane(gray);
        let edge_plane = edges.map(filter::plane);

        let cfg = self.cfg.clone();
        let mut best: Option<FrameMatch> = None;

        for variant_scale in self.scale_variants() {
            #[allow(clippy::cast_possible_truncation)]
            let resolved = (f64::from(variant_scale) * global) as f32;
            let variant = self.variant(resolved);

            let Some(plan) = variant.plan.as_ref() else {
                continue;
            };
            let Some(response) = plan.scan(&frame_plane, frame_w, frame_h) else {
                continue;
            };

            let raw = response.best;
            let z_score = (cfg.z_weight > 0.0).then(|| {
                let z = ((raw - response.mean) / (response.std + Z_EPSILON)).max(0.0);
                (z / Z_COMPRESSION).tanh()
            });
            let edge_score = match (&edge_plane, &variant.edge_plan) {
                (Some(plane), Some(plan)) => {
                    plan.scan(plane, frame_w, frame_h).map(|r| r.best)
                }
                _ => None,
            };

            let score = combine_scores(raw, edge_score, z_score, &cfg);

            let better = best.as_ref().is_none_or(|b| score > b.score);
            if better {
                let inv = 1.0 / global;
                #[allow(clippy::cast_possible_truncation)]
                let bbox = BBox::clamped(
                    (f64::from(response.x) * inv).round() as i64,
                    (f64::from(response.y) * inv).round() as i64,
                    (f64::from(variant.width) * inv).round() as i64,
                    (f64::from(variant.height) * inv).round() as i64,
                    full_w,
                    full_h,
                );
                best = Some(FrameMatch {
                    bbox,
                    score,
                    raw_score: raw,
                    edge_score,
                    z_score,
                    scale: variant_scale,
                });
            }
        }

        best
    }
}

/// Blend raw correlation, edge correlation, and z-score into one score.
///
/// Each enabled signal is mixed in by its weight and the result floored at
/// the pre-blend value, so a weak auxiliary signal never drags the score
/// below the raw correlation. The bias is added last, then the floor and the
/// final `[0, 1]` clamp are applied.
#[must_use]
pub fn combine_scores(
    raw: f32,
    edge: Option<f32>,
    z: Option<f32>,
    cfg: &DetectorConfig,
) -> f32 {
    let mut combined = raw;
    if cfg.edge_weight > 0.0 {
        if let Some(e) = edge {
            let blended = (1.0 - cfg.edge_weight) * combined + cfg.edge_weight * e.max(0.0);
            combined = blended.max(combined);
        }
    }
    if cfg.z_weight > 0.0 {
        if let Some(zv) = z {
            let blended = (1.0 - cfg.z_weight) * combined + cfg.z_weight * zv.max(0.0);
            combined = blended.max(combined);
        }
    }
    (combined + cfg.score_bias)
        .max(cfg.score_floor)
        .clamp(0.0, 1.0)
}
