//! Watermark template preparation.
//!
//! Normalizes an arbitrary logo image into the canonical matching template:
//! a grayscale buffer, an optional binary opacity mask, and the original
//! dimensions. Templates with an alpha channel are tightly cropped to their
//! non-transparent bounding box so correlation never wastes work on empty
//! margins.

use std::path::Path;

use image::{DynamicImage, GrayImage};

use crate::error::{Error, Result};
use crate::filter;

/// A prepared watermark template, immutable once built.
///
/// Build one per run with [`TemplateAsset::from_path`] or
/// [`TemplateAsset::from_image`] and reuse it across every frame and scale
/// query; rebuilding per frame is correct but wasteful.
#[derive(Debug, Clone)]
pub struct TemplateAsset {
    gray: GrayImage,
    mask: Option<GrayImage>,
    original_size: (u32, u32),
}

impl TemplateAsset {
    /// Load and prepare a template from an image file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTemplate`] when the file is missing or cannot
    /// be decoded, or when the decoded image fails [`TemplateAsset::from_image`].
    pub fn from_path(path: &Path, mask_threshold: u8) -> Result<Self> {
        let img = image::open(path).map_err(|e| {
            Error::InvalidTemplate(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_image(&img, mask_threshold)
    }

    /// Prepare a template from a decoded image.
    ///
    /// Channel handling:
    /// - 4 channels: the alpha channel thresholded at `mask_threshold` becomes
    ///   a binary mask and both buffers are cropped to the mask's bounding
    ///   box. A mask that thresholds to empty is dropped (maskless matching);
    ///   an alpha channel that is zero everywhere rejects the template.
    /// - 3 channels: grayscale conversion, no mask.
    /// - 1 channel: used as grayscale directly, no mask.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTemplate`] for empty input, unsupported channel
    /// layouts, a fully transparent alpha channel, or a resulting grayscale
    /// buffer with either dimension of 1 or less.
    pub fn from_image(image: &DynamicImage, mask_threshold: u8) -> Result<Self> {
        let (w, h) = (image.width(), image.height());
        if w == 0 || h == 0 {
            return Err(Error::InvalidTemplate("image is empty".to_string()));
        }
        let original_size = (w, h);

        let (gray, mask) = match image.color().channel_count() {
            4 => {
                let rgba = image.to_rgba8();
                if rgba.pixels().all(|p| p[3] == 0) {
                    return Err(Error::InvalidTemplate(
                        "alpha channel is fully transparent".to_string(),
                    ));
                }

                let gray = filter::to_gray(&image.to_rgb8());
                let mask = GrayImage::from_fn(w, h, |x, y| {
                    let a = rgba.get_pixel(x, y)[3];
                    image::Luma([if a > mask_threshold { 255 } else { 0 }])
                });

                match mask_bounds(&mask) {
                    Some((x0, y0, x1, y1)) => {
                        let cw = x1 - x0 + 1;
                        let ch = y1 - y0 + 1;
                        let gray = GrayImage::from_fn(cw, ch, |x, y| {
                            *gray.get_pixel(x0 + x, y0 + y)
                        });
                        let mask = GrayImage::from_fn(cw, ch, |x, y| {
                            *mask.get_pixel(x0 + x, y0 + y)
                        });
                        (gray, Some(mask))
                    }
                    // All alpha samples sit at or below the threshold: match
                    // every pixel instead of matching nothing.
                    None => (gray, None),
                }
            }
            3 => (filter::to_gray(&image.to_rgb8()), None),
            1 => (image.to_luma8(), None),
            n => {
                return Err(Error::InvalidTemplate(format!(
                    "unsupported channel count {n}"
                )));
            }
        };

        if gray.width() <= 1 || gray.height() <= 1 {
            return Err(Error::InvalidTemplate(format!(
                "template is degenerate after preparation ({}x{})",
                gray.width(),
                gray.height()
            )));
        }

        Ok(Self {
            gray,
            mask,
            original_size,
        })
    }

    /// The grayscale matching buffer (cropped when a mask was present).
    #[must_use]
    pub fn gray(&self) -> &GrayImage {
        &self.gray
    }

    /// The binary opacity mask, if the source image carried usable alpha.
    #[must_use]
    pub fn mask(&self) -> Option<&GrayImage> {
        self.mask.as_ref()
    }

    /// Dimensions of the source image before cropping.
    #[must_use]
    pub fn original_size(&self) -> (u32, u32) {
        self.original_size
    }

    /// Dimensions of the prepared matching buffer.
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        self.gray.dimensions()
    }
}

/// Bounding box of non-zero mask pixels as inclusive `(x0, y0, x1, y1)`.
fn mask_bounds(mask: &GrayImage) -> Option<(u32, u32, u32, u32)> {
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (x, y, p) in mask.enumerate_pixels() {
        if p[0] == 0 {
            continue;
        }
        bounds = Some(match bounds {
            None => (x, y, x, y),
            Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        });
    }
    bounds
}
