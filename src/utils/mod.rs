//! Internal utility functions for imageops-grabcut.
//!
//! This module contains validation helpers and the data-parallel seam shared
//! by the segmentation stages.

mod parallel;
pub use parallel::{fold_indexed, map_indexed};

/// Validates that an image has non-zero dimensions.
///
/// # Arguments
///
/// * `width` - The width of the image
/// * `height` - The height of the image
/// * `context` - A description of the context for error messages
///
/// # Returns
///
/// `Ok(())` if the dimensions are valid, otherwise an error
pub fn validate_non_empty_image(width: u32, height: u32, context: &str) -> Result<(), String> {
    if width == 0 || height == 0 {
        Err(format!("{}: Image dimensions must be non-zero", context))
    } else {
        Ok(())
    }
}

/// Validates that two grids have matching dimensions.
///
/// # Arguments
///
/// * `width1` - The width of the first grid
/// * `height1` - The height of the first grid
/// * `width2` - The width of the second grid
/// * `height2` - The height of the second grid
/// * `context` - A description of the context for error messages
///
/// # Returns
///
/// `Ok(())` if the dimensions match, otherwise an error
pub fn validate_matching_dimensions(
    width1: u32,
    height1: u32,
    width2: u32,
    height2: u32,
    context: &str,
) -> Result<(), String> {
    if width1 != width2 || height1 != height2 {
        Err(format!(
            "{}: Dimensions must match. Got {}x{} and {}x{}",
            context, width1, height1, width2, height2
        ))
    } else {
        Ok(())
    }
}

/// Validates that a floating-point parameter is finite and strictly positive.
pub fn validate_positive(value: f64, name: &str) -> Result<(), String> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(format!("{} must be finite and positive, got {}", name, value))
    }
}

/// Validates that a floating-point parameter lies in the closed range `[min, max]`.
pub fn validate_in_range(value: f64, min: f64, max: f64, name: &str) -> Result<(), String> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(format!(
            "{} must be within [{}, {}], got {}",
            name, min, max, value
        ))
    }
}

/// Validates that a count parameter is at least one.
pub fn validate_non_zero(value: usize, name: &str) -> Result<(), String> {
    if value == 0 {
        Err(format!("{} must be at least 1", name))
    } else {
        Ok(())
    }
}
