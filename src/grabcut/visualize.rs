//! Rendering of mattes and component maps into image buffers.

use image::{Luma, Pixel, Primitive, Rgb, Rgba};
use imageproc::{definitions::Image, map::map_colors2};

use crate::error::GrabCutError;
use crate::grabcut::matte::{AlphaMatte, ComponentMap, Label};
use crate::utils::validate_matching_dimensions;

/// Shades of orange for background components.
pub const BACKGROUND_PALETTE: [Rgb<u8>; 5] = [
    Rgb([204, 102, 0]),
    Rgb([255, 128, 0]),
    Rgb([255, 153, 51]),
    Rgb([255, 178, 102]),
    Rgb([255, 204, 153]),
];

/// Shades of blue for foreground components.
pub const FOREGROUND_PALETTE: [Rgb<u8>; 5] = [
    Rgb([0, 0, 255]),
    Rgb([0, 0, 200]),
    Rgb([0, 0, 150]),
    Rgb([0, 0, 100]),
    Rgb([0, 0, 50]),
];

/// Color of pixels whose class has no fitted model.
pub const UNASSIGNED_COLOR: Rgb<u8> = Rgb([128, 128, 128]);

impl AlphaMatte {
    /// 8-bit mask: 255 for foreground, 0 for background.
    pub fn to_mask(&self) -> Image<Luma<u8>> {
        self.to_mask_of()
    }

    /// Mask at the full range of `S`: its maximum for foreground, its minimum for background.
    pub fn to_mask_of<S>(&self) -> Image<Luma<S>>
    where
        Luma<S>: Pixel<Subpixel = S>,
        S: Primitive,
    {
        let (width, height) = self.dimensions();
        Image::from_fn(width, height, |x, y| match self.get(x, y) {
            Label::Foreground => Luma([S::DEFAULT_MAX_VALUE]),
            Label::Background => Luma([S::DEFAULT_MIN_VALUE]),
        })
    }
}

impl ComponentMap {
    /// Paints each pixel by class and component, cycling through the palettes
    /// when there are more components than shades.
    pub fn to_color_image(&self) -> Image<Rgb<u8>> {
        let (width, height) = self.dimensions();
        Image::from_fn(width, height, |x, y| {
            let assignment = self.get(x, y);
            let palette = match assignment.class {
                Label::Foreground => &FOREGROUND_PALETTE,
                Label::Background => &BACKGROUND_PALETTE,
            };
            assignment
                .component
                .map_or(UNASSIGNED_COLOR, |k| palette[k % palette.len()])
        })
    }
}

/// Cuts the foreground out of an RGB image.
pub trait ApplyMatte {
    type Subpixel: Primitive;

    /// Adds an alpha channel that is opaque on foreground and transparent on background.
    ///
    /// This consumes the original image.
    ///
    /// # Arguments
    ///
    /// * `matte` - Segmentation with the same dimensions as the image
    ///
    /// # Returns
    ///
    /// RGBA image carrying the matte as alpha
    ///
    /// # Errors
    ///
    /// * `GrabCutError::DimensionMismatch` - When image and matte dimensions don't match
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use imageops_grabcut::{ApplyMatte, BoundingBox, GrabCut, GrabCutConfig, Image};
    /// use image::Rgb;
    ///
    /// # fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let image: Image<Rgb<u8>> = Image::new(32, 32);
    /// let result = image.grab_cut(BoundingBox::new(4, 4, 27, 27), &GrabCutConfig::default())?;
    /// let cutout = image.apply_matte(&result.matte)?;
    /// # Ok(())
    /// # }
    /// ```
    fn apply_matte(self, matte: &AlphaMatte) -> Result<Image<Rgba<Self::Subpixel>>, GrabCutError>
    where
        Rgba<Self::Subpixel>: Pixel<Subpixel = Self::Subpixel>;
}

impl<S> ApplyMatte for Image<Rgb<S>>
where
    Rgb<S>: Pixel<Subpixel = S>,
    Luma<S>: Pixel<Subpixel = S>,
    S: Primitive,
{
    type Subpixel = S;

    fn apply_matte(self, matte: &AlphaMatte) -> Result<Image<Rgba<S>>, GrabCutError>
    where
        Rgba<S>: Pixel<Subpixel = S>,
    {
        let (width, height) = self.dimensions();
        let (matte_width, matte_height) = matte.dimensions();
        validate_matching_dimensions(width, height, matte_width, matte_height, "ApplyMatte")
            .map_err(|_| GrabCutError::DimensionMismatch {
                expected: (width, height),
                actual: (matte_width, matte_height),
            })?;

        let mask = matte.to_mask_of::<S>();
        Ok(map_colors2(&self, &mask, |Rgb([red, green, blue]), Luma([alpha])| {
            Rgba([red, green, blue, alpha])
        }))
    }
}
