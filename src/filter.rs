//! Shared pixel-plane operations: grayscale conversion, Gaussian blur,
//! Sobel gradients, and Canny edge maps.
//!
//! All heavy math runs on flat `f32` planes in row-major order at the 0-255
//! intensity scale, converted back to `image` buffers at the boundaries.

use image::{GrayImage, RgbImage};

use crate::region::BBox;

/// Blur sigma applied inside the Canny pipeline before gradient estimation.
const CANNY_BLUR_SIGMA: f32 = 1.4;

/// Value marking an edge pixel in a binary edge map.
pub(crate) const EDGE_ON: u8 = 255;

/// Convert an RGB frame to grayscale.
///
/// Uses luminance weights `0.299*R + 0.587*G + 0.114*B`.
pub(crate) fn to_gray(img: &RgbImage) -> GrayImage {
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        let px = img.get_pixel(x, y);
        let lum = 0.299 * f32::from(px[0]) + 0.587 * f32::from(px[1]) + 0.114 * f32::from(px[2]);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        image::Luma([lum.round().clamp(0.0, 255.0) as u8])
    })
}

/// Flatten a grayscale image into an `f32` plane (0-255 scale).
pub(crate) fn plane(img: &GrayImage) -> Vec<f32> {
    img.pixels().map(|p| f32::from(p[0])).collect()
}

/// Convert an `f32` plane back into a grayscale image, clamping to `[0, 255]`.
pub(crate) fn plane_to_gray(data: &[f32], width: u32, height: u32) -> GrayImage {
    debug_assert_eq!(data.len(), (width * height) as usize);
    GrayImage::from_fn(width, height, |x, y| {
        let v = data[(y * width + x) as usize];
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        image::Luma([v.round().clamp(0.0, 255.0) as u8])
    })
}

/// Separable Gaussian blur over an `f32` plane. Borders are replicated.
///
/// A sigma of zero (or a degenerate plane) returns the input unchanged.
pub(crate) fn gaussian_blur(data: &[f32], width: usize, height: usize, sigma: f32) -> Vec<f32> {
    if sigma <= 0.0 || width == 0 || height == 0 {
        return data.to_vec();
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let radius = (sigma * 3.0).ceil().max(1.0) as usize;
    let mut kernel = Vec::with_capacity(2 * radius + 1);
    for i in 0..=2 * radius {
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap)]
        let x = (i as isize - radius as isize) as f32;
        kernel.push((-x * x / (2.0 * sigma * sigma)).exp());
    }
    let sum: f32 = kernel.iter().sum();
    for k in &mut kernel {
        *k /= sum;
    }

    #[allow(clippy::cast_possible_wrap)]
    let clamp_idx = |v: isize, max: usize| -> usize { v.clamp(0, max as isize - 1) as usize };

    // Horizontal pass
    let mut tmp = vec![0.0_f32; width * height];
    for y in 0..height {
        for x in 0..width {
            let mut acc = 0.0_f32;
            for (i, k) in kernel.iter().enumerate() {
                #[allow(clippy::cast_possible_wrap)]
                let sx = clamp_idx(x as isize + i as isize - radius as isize, width);
                acc += k * data[y * width + sx];
            }
            tmp[y * width + x] = acc;
        }
    }

    // Vertical pass
    let mut out = vec![0.0_f32; width * height];
    for y in 0..height {
        for x in 0..width {
            let mut acc = 0.0_f32;
            for (i, k) in kernel.iter().enumerate() {
                #[allow(clippy::cast_possible_wrap)]
                let sy = clamp_idx(y as isize + i as isize - radius as isize, height);
                acc += k * tmp[sy * width + x];
            }
            out[y * width + x] = acc;
        }
    }

    out
}

/// Gaussian-blur a grayscale image. Sigma zero returns a plain clone.
pub(crate) fn blur_gray(img: &GrayImage, sigma: f32) -> GrayImage {
    if sigma <= 0.0 {
        return img.clone();
    }
    let (w, h) = (img.width(), img.height());
    let blurred = gaussian_blur(&plane(img), w as usize, h as usize, sigma);
    plane_to_gray(&blurred, w, h)
}

/// Compute 3x3 Sobel gradients for an `f32` plane.
///
/// Returns `(gx, gy)` planes; border pixels are zero.
pub(crate) fn sobel_gradients(data: &[f32], width: usize, height: usize) -> (Vec<f32>, Vec<f32>) {
    let mut gx = vec![0.0_f32; width * height];
    let mut gy = vec![0.0_f32; width * height];
    if width < 3 || height < 3 {
        return (gx, gy);
    }

    for y in 1..height - 1 {
        for x in 1..width - 1 {
            // y >= 1 and x >= 1 with dy/dx in {-1, 0, 1}, so indices stay valid.
            #[allow(clippy::cast_sign_loss, clippy::cast_possible_wrap)]
            let idx = |dy: isize, dx: isize| -> f32 {
                data[((y as isize + dy) as usize) * width + (x as isize + dx) as usize]
            };

            gx[y * width + x] = -idx(-1, -1) + idx(-1, 1) - 2.0 * idx(0, -1) + 2.0 * idx(0, 1)
                - idx(1, -1)
                + idx(1, 1);

            gy[y * width + x] = -idx(-1, -1) - 2.0 * idx(-1, 0) - idx(-1, 1)
                + idx(1, -1)
                + 2.0 * idx(1, 0)
                + idx(1, 1);
        }
    }

    (gx, gy)
}

/// Canny edge detector producing a binary edge map (0 or 255 per pixel).
///
/// Stages: Gaussian blur, Sobel gradients, non-maximum suppression along the
/// quantized gradient direction, then two-threshold hysteresis where weak
/// edges survive only when 8-connected to a strong edge. Thresholds apply to
/// the Sobel magnitude of the 0-255 intensity plane.
pub(crate) fn canny(img: &GrayImage, low: f32, high: f32) -> GrayImage {
    let width = img.width() as usize;
    let height = img.height() as usize;
    let mut edges = GrayImage::new(img.width(), img.height());
    if width < 3 || height < 3 {
        return edges;
    }

    let smoothed = gaussian_blur(&plane(img), width, height, CANNY_BLUR_SIGMA);
    let (gx, gy) = sobel_gradients(&smoothed, width, height);

    let mag: Vec<f32> = gx
        .iter()
        .zip(&gy)
        .map(|(x, y)| (x * x + y * y).sqrt())
        .collect();

    // Non-maximum suppression: keep pixels that dominate their two neighbors
    // along the quantized gradient direction.
    let mut thin = vec![0.0_f32; width * height];
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let i = y * width + x;
            if mag[i] <= 0.0 {
                continue;
            }
            let mut angle = gy[i].atan2(gx[i]).to_degrees();
            if angle < 0.0 {
                angle += 180.0;
            }
            let (n1, n2) = if !(22.5..157.5).contains(&angle) {
                (mag[i - 1], mag[i + 1])
            } else if angle < 67.5 {
                (mag[i - width + 1], mag[i + width - 1])
            } else if angle < 112.5 {
                (mag[i - width], mag[i + width])
            } else {
                (mag[i - width - 1], mag[i + width + 1])
            };
            if mag[i] >= n1 && mag[i] >= n2 {
                thin[i] = mag[i];
            }
        }
    }

    // Hysteresis: flood from strong pixels through connected weak pixels.
    let mut state = vec![0_u8; width * height]; // 0 none, 1 weak, 2 strong
    let mut stack = Vec::new();
    for (i, &m) in thin.iter().enumerate() {
        if m >= high {
            state[i] = 2;
            stack.push(i);
        } else if m >= low {
            state[i] = 1;
        }
    }
    while let Some(i) = stack.pop() {
        let x = i % width;
        let y = i / width;
        for dy in -1_isize..=1 {
            for dx in -1_isize..=1 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                #[allow(clippy::cast_possible_wrap)]
                let (nx, ny) = (x as isize + dx, y as isize + dy);
                if nx < 0 || ny < 0 {
                    continue;
                }
                #[allow(clippy::cast_sign_loss)]
                let (nx, ny) = (nx as usize, ny as usize);
                if nx >= width || ny >= height {
                    continue;
                }
                let ni = ny * width + nx;
                if state[ni] == 1 {
                    state[ni] = 2;
                    stack.push(ni);
                }
            }
        }
    }

    for (i, &s) in state.iter().enumerate() {
        if s == 2 {
            #[allow(clippy::cast_possible_truncation)]
            let (x, y) = ((i % width) as u32, (i / width) as u32);
            edges.put_pixel(x, y, image::Luma([EDGE_ON]));
        }
    }

    edges
}

/// Copy the pixels of a bbox out of a frame into a new image.
pub(crate) fn crop_rgb(img: &RgbImage, b: &BBox) -> RgbImage {
    RgbImage::from_fn(b.width, b.height, |x, y| *img.get_pixel(b.x + x, b.y + y))
}
