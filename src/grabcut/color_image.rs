use image::{DynamicImage, Pixel, Primitive, Rgb};
use imageproc::definitions::Image;

use crate::error::GrabCutError;
use crate::grabcut::linalg::{squared_distance, Color};
use crate::utils::validate_non_empty_image;

/// Immutable row-major grid of 3-channel colors used by every segmentation stage.
///
/// Channel values keep the numeric range of the source buffer (0-255 for
/// 8-bit input, 0-65535 for 16-bit input, as-is for float input).
#[derive(Debug, Clone, PartialEq)]
pub struct ColorImage {
    width: u32,
    height: u32,
    pixels: Vec<Color>,
}

impl ColorImage {
    /// Converts a typed RGB buffer.
    ///
    /// # Errors
    ///
    /// * `GrabCutError::EmptyImage` - When either dimension is zero
    pub fn from_rgb<S>(image: &Image<Rgb<S>>) -> Result<Self, GrabCutError>
    where
        Rgb<S>: Pixel<Subpixel = S>,
        S: Primitive,
        f64: From<S>,
    {
        let (width, height) = image.dimensions();
        validate_non_empty_image(width, height, "GrabCut")
            .map_err(|_| GrabCutError::EmptyImage { width, height })?;

        let pixels = image
            .pixels()
            .map(|&Rgb([red, green, blue])| [f64::from(red), f64::from(green), f64::from(blue)])
            .collect();

        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Converts a decoded image, rejecting anything that is not 3-channel RGB.
    ///
    /// # Errors
    ///
    /// * `GrabCutError::UnsupportedChannelCount` - When the image is grayscale or carries alpha
    /// * `GrabCutError::EmptyImage` - When either dimension is zero
    pub fn from_dynamic(image: &DynamicImage) -> Result<Self, GrabCutError> {
        match image {
            DynamicImage::ImageRgb8(buffer) => Self::from_rgb(buffer),
            DynamicImage::ImageRgb16(buffer) => Self::from_rgb(buffer),
            DynamicImage::ImageRgb32F(buffer) => Self::from_rgb(buffer),
            other => Err(GrabCutError::UnsupportedChannelCount {
                channels: other.color().channel_count(),
            }),
        }
    }

    /// Builds an image directly from row-major colors.
    ///
    /// # Errors
    ///
    /// * `GrabCutError::EmptyImage` - When either dimension is zero
    /// * `GrabCutError::LengthMismatch` - When `pixels.len() != width * height`
    pub fn from_colors(width: u32, height: u32, pixels: Vec<Color>) -> Result<Self, GrabCutError> {
        validate_non_empty_image(width, height, "GrabCut")
            .map_err(|_| GrabCutError::EmptyImage { width, height })?;
        let expected = width as usize * height as usize;
        if pixels.len() != expected {
            return Err(GrabCutError::LengthMismatch {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    #[inline]
    pub const fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub const fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub const fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    #[inline]
    pub fn pixels(&self) -> &[Color] {
        &self.pixels
    }

    #[inline]
    pub fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> &Color {
        &self.pixels[self.index(x, y)]
    }

    /// Squared color distance between two pixels given by linear index.
    #[inline]
    pub(crate) fn distance_between(&self, p: usize, q: usize) -> f64 {
        squared_distance(&self.pixels[p], &self.pixels[q])
    }
}
