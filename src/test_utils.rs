//! Test utilities for imageops-grabcut
//!
//! Shared fixtures for the unit tests. Only compiled when running tests.

use image::Rgb;
use imageproc::definitions::Image;

use crate::grabcut::matte::BoundingBox;

/// Foreground color of [`create_box_image`]
pub const BOX_COLOR: Rgb<u8> = Rgb([230, 220, 40]);
/// Background color of [`create_box_image`]
pub const BORDER_COLOR: Rgb<u8> = Rgb([20, 30, 90]);

/// Creates a test RGB image with predefined pixel values for testing.
///
/// This function creates a 2x2 test image with known pixel values:
/// - (0,0): [200, 150, 100]
/// - (1,0): [100, 200, 150]
/// - (0,1): [150, 100, 200]
/// - (1,1): [50, 75, 25]
pub fn create_test_rgb_image() -> Image<Rgb<u8>> {
    let mut image: Image<Rgb<u8>> = Image::new(2, 2);
    image.put_pixel(0, 0, Rgb([200, 150, 100]));
    image.put_pixel(1, 0, Rgb([100, 200, 150]));
    image.put_pixel(0, 1, Rgb([150, 100, 200]));
    image.put_pixel(1, 1, Rgb([50, 75, 25]));
    image
}

/// Creates a two-tone image: [`BOX_COLOR`] inside `bbox`, [`BORDER_COLOR`] elsewhere.
pub fn create_box_image(width: u32, height: u32, bbox: BoundingBox) -> Image<Rgb<u8>> {
    Image::from_fn(width, height, |x, y| {
        if bbox.contains(x, y) {
            BOX_COLOR
        } else {
            BORDER_COLOR
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_test_rgb_image_with_valid_input_creates_image() {
        let image = create_test_rgb_image();
        assert_eq!(image.dimensions(), (2, 2));
        assert_eq!(image.get_pixel(0, 0), &Rgb([200, 150, 100]));
        assert_eq!(image.get_pixel(1, 1), &Rgb([50, 75, 25]));
    }

    #[test]
    fn create_box_image_paints_box_interior() {
        let image = create_box_image(4, 3, BoundingBox::new(1, 1, 2, 1));
        assert_eq!(image.get_pixel(1, 1), &BOX_COLOR);
        assert_eq!(image.get_pixel(2, 1), &BOX_COLOR);
        assert_eq!(image.get_pixel(0, 1), &BORDER_COLOR);
        assert_eq!(image.get_pixel(1, 0), &BORDER_COLOR);
    }
}
