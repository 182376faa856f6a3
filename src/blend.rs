//! Patch compositing.
//!
//! The restoration engine's pixel-level backend: seamless gradient-domain
//! blending with two guidance profiles, a direct paste fallback, in-place
//! region blur, and two single-frame inpainting algorithms for regions with
//! no usable donor.
//!
//! The seamless blend solves the discrete Poisson equation over the region
//! interior with Gauss-Seidel sweeps, holding the region's outer ring at the
//! destination's values so the composite meets the frame without a seam.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use image::RgbImage;

use crate::error::Error;
use crate::region::BBox;

/// Gauss-Seidel sweeps for the Poisson solve.
const SOLVER_ITERATIONS: usize = 400;
/// Early-exit threshold on the largest per-sweep update.
const SOLVER_TOLERANCE: f32 = 0.01;
/// Gauss-Seidel sweeps for diffusion inpainting.
const DIFFUSION_ITERATIONS: usize = 300;

/// Guidance-field profile for the seamless blend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    /// Use the patch's gradients everywhere.
    Normal,
    /// Per pixel pair, keep the stronger of the patch's and the
    /// destination's gradients (preserves background texture showing
    /// through flat patch areas).
    Mixed,
}

impl FromStr for BlendMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s.to_lowercase().as_str() {
            "normal" => Ok(Self::Normal),
            "mixed" => Ok(Self::Mixed),
            other => Err(Error::Config(format!("unknown blend mode '{other}'"))),
        }
    }
}

impl fmt::Display for BlendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Normal => "normal",
            Self::Mixed => "mixed",
        })
    }
}

/// Single-frame inpainting algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InpaintMethod {
    /// Onion-peel march: fill from the region rim inward, each pixel an
    /// inverse-distance-weighted average of already-known neighbors.
    March,
    /// Harmonic diffusion: seed with the boundary mean, then relax until the
    /// region is a smooth interpolation of its surroundings.
    Diffusion,
}

impl FromStr for InpaintMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s.to_lowercase().as_str() {
            "march" => Ok(Self::March),
            "diffusion" => Ok(Self::Diffusion),
            other => Err(Error::Config(format!("unknown inpaint method '{other}'"))),
        }
    }
}

impl fmt::Display for InpaintMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::March => "march",
            Self::Diffusion => "diffusion",
        })
    }
}

/// Why a seamless blend could not run.
///
/// Blend failures are recoverable by design: the restoration engine falls
/// back to a direct paste and never surfaces them as errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendError {
    /// The region (or patch) is too small for the solver's interior.
    Degenerate,
    /// The solver produced non-finite values.
    NonFinite,
}

/// Copy a patch into the frame at the region's position, no blending.
pub fn paste(frame: &mut RgbImage, patch: &RgbImage, region: &BBox) {
    debug_assert_eq!(patch.dimensions(), (region.width, region.height));
    for y in 0..region.height.min(patch.height()) {
        for x in 0..region.width.min(patch.width()) {
            frame.put_pixel(region.x + x, region.y + y, *patch.get_pixel(x, y));
        }
    }
}

/// Composite a patch into the frame with a seamless gradient-domain blend.
///
/// The region's outer one-pixel ring keeps the frame's original values and
/// acts as the boundary condition; only the interior is rewritten. `mode`
/// selects the guidance field (see [`BlendMode`]).
///
/// # Errors
///
/// [`BlendError::Degenerate`] when the region is smaller than 3x3 or the
/// patch does not match the region's size; [`BlendError::NonFinite`] when
/// the solve diverges. The frame is untouched on error.
pub fn seamless_blend(
    frame: &mut RgbImage,
    patch: &RgbImage,
    region: &BBox,
    mode: BlendMode,
) -> Result<(), BlendError> {
    let w = region.width as usize;
    let h = region.height as usize;
    if w < 3 || h < 3 || patch.dimensions() != (region.width, region.height) {
        return Err(BlendError::Degenerate);
    }

    // Per-channel planes: `base` is the destination region, `src` the patch.
    let mut solved: Vec<Vec<f32>> = Vec::with_capacity(3);
    for ch in 0..3 {
        let mut base = vec![0.0_f32; w * h];
        let mut src = vec![0.0_f32; w * h];
        for y in 0..h {
            for x in 0..w {
                #[allow(clippy::cast_possible_truncation)]
                let (fx, fy) = (region.x + x as u32, region.y + y as u32);
                base[y * w + x] = f32::from(frame.get_pixel(fx, fy)[ch]);
                #[allow(clippy::cast_possible_truncation)]
                {
                    src[y * w + x] = f32::from(patch.get_pixel(x as u32, y as u32)[ch]);
                }
            }
        }

        // Initialize with the patch, pin the ring to the destination.
        let mut u = src.clone();
        for x in 0..w {
            u[x] = base[x];
            u[(h - 1) * w + x] = base[(h - 1) * w + x];
        }
        for y in 0..h {
            u[y * w] = base[y * w];
            u[y * w + w - 1] = base[y * w + w - 1];
        }

        let guidance = |p: usize, q: usize| -> f32 {
            let g_src = src[p] - src[q];
            match mode {
                BlendMode::Normal => g_src,
                BlendMode::Mixed => {
                    let g_base = base[p] - base[q];
                    if g_base.abs() > g_src.abs() {
                        g_base
                    } else {
                        g_src
                    }
                }
            }
        };

        for _ in 0..SOLVER_ITERATIONS {
            let mut max_delta = 0.0_f32;
            for y in 1..h - 1 {
                for x in 1..w - 1 {
                    let p = y * w + x;
                    let neighbors = [p - 1, p + 1, p - w, p + w];
                    let mut acc = 0.0_f32;
                    for &q in &neighbors {
                        acc += u[q] + guidance(p, q);
                    }
                    let next = acc / 4.0;
                    let delta = (next - u[p]).abs();
                    if delta > max_delta {
                        max_delta = delta;
                    }
                    u[p] = next;
                }
            }
            if max_delta < SOLVER_TOLERANCE {
                break;
            }
        }

        if u.iter().any(|v| !v.is_finite()) {
            return Err(BlendError::NonFinite);
        }
        solved.push(u);
    }

    // All channels solved; write the interior back.
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            #[allow(clippy::cast_possible_truncation)]
            let (fx, fy) = (region.x + x as u32, region.y + y as u32);
            let px = frame.get_pixel_mut(fx, fy);
            for (ch, plane) in solved.iter().enumerate() {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                {
                    px[ch] = plane[y * w + x].round().clamp(0.0, 255.0) as u8;
                }
            }
        }
    }

    Ok(())
}

/// Gaussian-blur a region of the frame in place. The blur replicates the
/// region's rim at its edges and never writes outside the region.
pub fn blur_region(frame: &mut RgbImage, region: &BBox, sigma: f32) {
    if sigma <= 0.0 {
        return;
    }
    let w = region.width as usize;
    let h = region.height as usize;

    for ch in 0..3 {
        let mut plane = vec![0.0_f32; w * h];
        for y in 0..h {
            for x in 0..w {
                #[allow(clippy::cast_possible_truncation)]
                let (fx, fy) = (region.x + x as u32, region.y + y as u32);
                plane[y * w + x] = f32::from(frame.get_pixel(fx, fy)[ch]);
            }
        }
        let blurred = crate::filter::gaussian_blur(&plane, w, h, sigma);
        for y in 0..h {
            for x in 0..w {
                #[allow(clippy::cast_possible_truncation)]
                let (fx, fy) = (region.x + x as u32, region.y + y as u32);
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                {
                    frame.get_pixel_mut(fx, fy)[ch] =
                        blurred[y * w + x].round().clamp(0.0, 255.0) as u8;
                }
            }
        }
    }
}

/// Reconstruct a region from its surroundings with no donor data.
///
/// `radius` bounds the sampling neighborhood of the march method; the
/// diffusion method ignores it. A region covering the entire frame has no
/// known surroundings and is left unchanged.
pub fn inpaint(frame: &mut RgbImage, region: &BBox, method: InpaintMethod, radius: u32) {
    match method {
        InpaintMethod::March => inpaint_march(frame, region, radius.max(1)),
        InpaintMethod::Diffusion => inpaint_diffusion(frame, region),
    }
}

/// True when the frame coordinate lies inside the region.
fn in_region(region: &BBox, fx: u32, fy: u32) -> bool {
    fx >= region.x && fx < region.right() && fy >= region.y && fy < region.bottom()
}

fn inpaint_march(frame: &mut RgbImage, region: &BBox, radius: u32) {
    let (fw, fh) = frame.dimensions();
    let rw = region.width as usize;
    let rh = region.height as usize;

    // BFS distance from the known rim; enqueue order is fill order.
    let mut dist = vec![u32::MAX; rw * rh];
    let mut order: Vec<(usize, usize)> = Vec::with_capacity(rw * rh);
    let mut queue = VecDeque::new();

    for ry in 0..rh {
        for rx in 0..rw {
            #[allow(clippy::cast_possible_truncation)]
            let (fx, fy) = (region.x + rx as u32, region.y + ry as u32);
            let has_known_neighbor = [(1_i64, 0_i64), (-1, 0), (0, 1), (0, -1)]
                .iter()
                .any(|&(dx, dy)| {
                    let nx = i64::from(fx) + dx;
                    let ny = i64::from(fy) + dy;
                    if nx < 0 || ny < 0 || nx >= i64::from(fw) || ny >= i64::from(fh) {
                        return false;
                    }
                    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
                    {
                        !in_region(region, nx as u32, ny as u32)
                    }
                });
            if has_known_neighbor {
                dist[ry * rw + rx] = 1;
                queue.push_back((rx, ry));
                order.push((rx, ry));
            }
        }
    }
    if queue.is_empty() {
        return;
    }

    while let Some((rx, ry)) = queue.pop_front() {
        let d = dist[ry * rw + rx];
        for (dx, dy) in [(1_i64, 0_i64), (-1, 0), (0, 1), (0, -1)] {
            #[allow(clippy::cast_possible_wrap)]
            let nx = rx as i64 + dx;
            #[allow(clippy::cast_possible_wrap)]
            let ny = ry as i64 + dy;
            if nx < 0 || ny < 0 {
                continue;
            }
            #[allow(clippy::cast_sign_loss)]
            let (nx, ny) = (nx as usize, ny as usize);
            if nx >= rw || ny >= rh || dist[ny * rw + nx] != u32::MAX {
                continue;
            }
            dist[ny * rw + nx] = d + 1;
            queue.push_back((nx, ny));
            order.push((nx, ny));
        }
    }

    // Fill rim-first; each pixel averages known or already-filled samples in
    // its window, weighted by inverse squared distance.
    let mut done = vec![false; rw * rh];
    let r = i64::from(radius);
    for (rx, ry) in order {
        #[allow(clippy::cast_possible_truncation)]
        let (fx, fy) = (region.x + rx as u32, region.y + ry as u32);
        let mut acc = [0.0_f32; 3];
        let mut total_weight = 0.0_f32;

        for dy in -r..=r {
            for dx in -r..=r {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let sx = i64::from(fx) + dx;
                let sy = i64::from(fy) + dy;
                if sx < 0 || sy < 0 || sx >= i64::from(fw) || sy >= i64::from(fh) {
                    continue;
                }
                #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
                let (sx, sy) = (sx as u32, sy as u32);

                let known = if in_region(region, sx, sy) {
                    let idx = (sy - region.y) as usize * rw + (sx - region.x) as usize;
                    done[idx]
                } else {
                    true
                };
                if !known {
                    continue;
                }

                #[allow(clippy::cast_precision_loss)]
                let weight = 1.0 / (dx * dx + dy * dy) as f32;
                let sample = frame.get_pixel(sx, sy);
                for ch in 0..3 {
                    acc[ch] += weight * f32::from(sample[ch]);
                }
                total_weight += weight;
            }
        }

        if total_weight > 0.0 {
            let px = frame.get_pixel_mut(fx, fy);
            for ch in 0..3 {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                {
                    px[ch] = (acc[ch] / total_weight).round().clamp(0.0, 255.0) as u8;
                }
            }
        }
        done[ry * rw + rx] = true;
    }
}

fn inpaint_diffusion(frame: &mut RgbImage, region: &BBox) {
    let (fw, fh) = frame.dimensions();
    let rw = region.width as usize;
    let rh = region.height as usize;

    // Mean of the frame pixels just outside the region seeds the fill.
    let mut boundary_sum = [0.0_f64; 3];
    let mut boundary_count = 0_u64;
    let mut visit = |fx: i64, fy: i64| {
        if fx < 0 || fy < 0 || fx >= i64::from(fw) || fy >= i64::from(fh) {
            return;
        }
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let (fx, fy) = (fx as u32, fy as u32);
        if in_region(region, fx, fy) {
            return;
        }
        let px = frame.get_pixel(fx, fy);
        for ch in 0..3 {
            boundary_sum[ch] += f64::from(px[ch]);
        }
        boundary_count += 1;
    };
    for rx in 0..rw {
        #[allow(clippy::cast_possible_wrap)]
        let fx = i64::from(region.x) + rx as i64;
        visit(fx, i64::from(region.y) - 1);
        visit(fx, i64::from(region.bottom()));
    }
    for ry in 0..rh {
        #[allow(clippy::cast_possible_wrap)]
        let fy = i64::from(region.y) + ry as i64;
        visit(i64::from(region.x) - 1, fy);
        visit(i64::from(region.right()), fy);
    }
    if boundary_count == 0 {
        return;
    }

    for ch in 0..3 {
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
        let seed = (boundary_sum[ch] / boundary_count as f64) as f32;
        let mut u = vec![seed; rw * rh];

        for _ in 0..DIFFUSION_ITERATIONS {
            let mut max_delta = 0.0_f32;
            for ry in 0..rh {
                for rx in 0..rw {
                    let mut acc = 0.0_f32;
                    let mut count = 0.0_f32;
                    for (dx, dy) in [(1_i64, 0_i64), (-1, 0), (0, 1), (0, -1)] {
                        #[allow(clippy::cast_possible_wrap)]
                        let fx = i64::from(region.x) + rx as i64 + dx;
                        #[allow(clippy::cast_possible_wrap)]
                        let fy = i64::from(region.y) + ry as i64 + dy;
                        if fx < 0 || fy < 0 || fx >= i64::from(fw) || fy >= i64::from(fh) {
                            continue;
                        }
                        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
                        let (fx, fy) = (fx as u32, fy as u32);
                        if in_region(region, fx, fy) {
                            let idx =
                                (fy - region.y) as usize * rw + (fx - region.x) as usize;
                            acc += u[idx];
                        } else {
                            acc += f32::from(frame.get_pixel(fx, fy)[ch]);
                        }
                        count += 1.0;
                    }
                    if count > 0.0 {
                        let next = acc / count;
                        let idx = ry * rw + rx;
                        let delta = (next - u[idx]).abs();
                        if delta > max_delta {
                            max_delta = delta;
                        }
                        u[idx] = next;
                    }
                }
            }
            if max_delta < SOLVER_TOLERANCE {
                break;
            }
        }

        for ry in 0..rh {
            for rx in 0..rw {
                #[allow(clippy::cast_possible_truncation)]
                let (fx, fy) = (region.x + rx as u32, region.y + ry as u32);
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                {
                    frame.get_pixel_mut(fx, fy)[ch] =
                        u[ry * rw + rx].round().clamp(0.0, 255.0) as u8;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn solid_frame(v: u8) -> RgbImage {
        RgbImage::from_pixel(50, 50, Rgb([v, v, v]))
    }

    fn scribble(frame: &mut RgbImage, region: &BBox) {
        for y in region.y..region.bottom() {
            for x in region.x..region.right() {
                frame.put_pixel(x, y, Rgb([255, 0, 255]));
            }
        }
    }

    #[test]
    fn paste_copies_patch_exactly() {
        let mut frame = solid_frame(10);
        let patch = RgbImage::from_pixel(8, 8, Rgb([200, 100, 50]));
        let region = BBox::clamped(20, 20, 8, 8, 50, 50);
        paste(&mut frame, &patch, &region);
        assert_eq!(*frame.get_pixel(20, 20), Rgb([200, 100, 50]));
        assert_eq!(*frame.get_pixel(27, 27), Rgb([200, 100, 50]));
        assert_eq!(*frame.get_pixel(28, 28), Rgb([10, 10, 10]));
    }

    #[test]
    fn seamless_blend_dissolves_flat_patch_into_background() {
        // A flat patch has zero gradients, so the solve relaxes to the
        // boundary values: the patch disappears into the background.
        let mut frame = solid_frame(100);
        let patch = RgbImage::from_pixel(12, 12, Rgb([200, 200, 200]));
        let region = BBox::clamped(20, 20, 12, 12, 50, 50);

        seamless_blend(&mut frame, &patch, &region, BlendMode::Normal).unwrap();

        let center = frame.get_pixel(26, 26);
        for ch in 0..3 {
            let diff = (i32::from(center[ch]) - 100).abs();
            assert!(diff <= 2, "interior should relax to boundary, ch {ch} diff {diff}");
        }
        // Boundary ring stays untouched.
        assert_eq!(*frame.get_pixel(20, 20), Rgb([100, 100, 100]));
    }

    #[test]
    fn seamless_blend_preserves_patch_gradients() {
        // A patch with a strong internal step keeps that step after the
        // blend, shifted to meet the boundary.
        let mut frame = solid_frame(100);
        let patch = RgbImage::from_fn(12, 12, |x, _| {
            if x < 6 {
                Rgb([50, 50, 50])
            } else {
                Rgb([180, 180, 180])
            }
        });
        let region = BBox::clamped(20, 20, 12, 12, 50, 50);

        seamless_blend(&mut frame, &patch, &region, BlendMode::Normal).unwrap();

        let left = i32::from(frame.get_pixel(24, 26)[0]);
        let right = i32::from(frame.get_pixel(27, 26)[0]);
        assert!(
            right - left > 60,
            "patch step should survive blending, got {left} -> {right}"
        );
    }

    #[test]
    fn mixed_mode_keeps_stronger_destination_texture() {
        // Destination has texture, patch is flat: mixed guidance keeps the
        // destination's gradients, normal guidance flattens them away.
        let textured = RgbImage::from_fn(50, 50, |x, y| {
            let v = if (x / 3 + y / 3) % 2 == 0 { 60 } else { 190 };
            Rgb([v, v, v])
        });
        let patch = RgbImage::from_pixel(14, 14, Rgb([120, 120, 120]));
        let region = BBox::clamped(18, 18, 14, 14, 50, 50);

        let mut normal = textured.clone();
        seamless_blend(&mut normal, &patch, &region, BlendMode::Normal).unwrap();
        let mut mixed = textured.clone();
        seamless_blend(&mut mixed, &patch, &region, BlendMode::Mixed).unwrap();

        let spread = |img: &RgbImage| -> i32 {
            let mut min = 255_i32;
            let mut max = 0_i32;
            for y in 21..29 {
                for x in 21..29 {
                    let v = i32::from(img.get_pixel(x, y)[0]);
                    min = min.min(v);
                    max = max.max(v);
                }
            }
            max - min
        };
        assert!(
            spread(&mixed) > spread(&normal),
            "mixed should retain more texture ({} vs {})",
            spread(&mixed),
            spread(&normal)
        );
    }

    #[test]
    fn seamless_blend_rejects_degenerate_regions() {
        let mut frame = solid_frame(100);
        let patch = RgbImage::new(2, 2);
        let region = BBox::clamped(5, 5, 2, 2, 50, 50);
        assert_eq!(
            seamless_blend(&mut frame, &patch, &region, BlendMode::Normal),
            Err(BlendError::Degenerate)
        );

        // size mismatch between patch and region
        let patch = RgbImage::new(5, 5);
        let region = BBox::clamped(5, 5, 8, 8, 50, 50);
        assert_eq!(
            seamless_blend(&mut frame, &patch, &region, BlendMode::Normal),
            Err(BlendError::Degenerate)
        );
    }

    #[test]
    fn inpaint_march_fills_from_uniform_surroundings() {
        let mut frame = RgbImage::from_pixel(50, 50, Rgb([50, 80, 120]));
        let region = BBox::clamped(15, 15, 10, 10, 50, 50);
        scribble(&mut frame, &region);

        inpaint(&mut frame, &region, InpaintMethod::March, 3);

        for y in 15..25 {
            for x in 15..25 {
                let px = frame.get_pixel(x, y);
                for (ch, want) in [50_i32, 80, 120].iter().enumerate() {
                    let diff = (i32::from(px[ch]) - want).abs();
                    assert!(diff <= 2, "({x},{y}) ch {ch}: {} vs {want}", px[ch]);
                }
            }
        }
    }

    #[test]
    fn inpaint_diffusion_fills_from_uniform_surroundings() {
        let mut frame = RgbImage::from_pixel(50, 50, Rgb([50, 80, 120]));
        let region = BBox::clamped(15, 15, 10, 10, 50, 50);
        scribble(&mut frame, &region);

        inpaint(&mut frame, &region, InpaintMethod::Diffusion, 3);

        let px = frame.get_pixel(19, 19);
        for (ch, want) in [50_i32, 80, 120].iter().enumerate() {
            let diff = (i32::from(px[ch]) - want).abs();
            assert!(diff <= 2, "ch {ch}: {} vs {want}", px[ch]);
        }
    }

    #[test]
    fn inpaint_whole_frame_region_is_left_unchanged() {
        let mut frame = RgbImage::from_pixel(20, 20, Rgb([7, 7, 7]));
        let region = BBox::clamped(0, 0, 20, 20, 20, 20);
        let before = frame.clone();
        inpaint(&mut frame, &region, InpaintMethod::March, 3);
        assert_eq!(frame, before);
        inpaint(&mut frame, &region, InpaintMethod::Diffusion, 3);
        assert_eq!(frame, before);
    }

    #[test]
    fn blur_region_touches_only_the_region() {
        let mut frame = RgbImage::from_fn(40, 40, |x, y| {
            let v = if (x + y) % 2 == 0 { 0 } else { 255 };
            Rgb([v, v, v])
        });
        let before = frame.clone();
        let region = BBox::clamped(10, 10, 12, 12, 40, 40);

        blur_region(&mut frame, &region, 2.0);

        // checker contrast collapses toward the mean inside
        let inside = frame.get_pixel(15, 15)[0];
        assert!((60..=200).contains(&inside), "expected smoothing, got {inside}");
        // outside is untouched
        for y in 0..40 {
            for x in 0..40 {
                if !(10..22).contains(&x) || !(10..22).contains(&y) {
                    assert_eq!(frame.get_pixel(x, y), before.get_pixel(x, y));
                }
            }
        }
    }

    #[test]
    fn mode_and_method_parse_from_str() {
        assert_eq!("normal".parse::<BlendMode>().unwrap(), BlendMode::Normal);
        assert_eq!("Mixed".parse::<BlendMode>().unwrap(), BlendMode::Mixed);
        assert!("overlay".parse::<BlendMode>().is_err());
        assert_eq!(BlendMode::Mixed.to_string(), "mixed");

        assert_eq!("march".parse::<InpaintMethod>().unwrap(), InpaintMethod::March);
        assert_eq!(
            "diffusion".parse::<InpaintMethod>().unwrap(),
            InpaintMethod::Diffusion
        );
        assert!("telea".parse::<InpaintMethod>().is_err());
        assert_eq!(InpaintMethod::March.to_string(), "march");
    }
}
